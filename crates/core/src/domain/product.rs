use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub stock: i64,
    pub min_stock: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }

    pub fn inventory_value(&self) -> Decimal {
        self.price * Decimal::from(self.stock)
    }

    /// Stock after applying a signed change; stock never goes below zero.
    pub fn stock_after(&self, change: i64) -> Result<i64, DomainError> {
        match self.stock.checked_add(change) {
            Some(stock) if stock >= 0 => Ok(stock),
            _ => Err(DomainError::InvariantViolation(format!(
                "stock of `{}` cannot go below zero (have {}, change {change})",
                self.id, self.stock
            ))),
        }
    }
}
