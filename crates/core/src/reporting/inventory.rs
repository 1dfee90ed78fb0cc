use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub name: String,
    pub value: Decimal,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub products: usize,
    pub low_stock: usize,
    pub total_value: Decimal,
    pub categories: Vec<CategoryShare>,
}

impl InventorySummary {
    pub fn from_products(products: &[Product]) -> Self {
        Self {
            products: products.len(),
            low_stock: low_stock(products).len(),
            total_value: total_value(products),
            categories: category_distribution(products),
        }
    }
}

pub fn low_stock(products: &[Product]) -> Vec<&Product> {
    products.iter().filter(|product| product.is_low_stock()).collect()
}

pub fn total_value(products: &[Product]) -> Decimal {
    products.iter().map(Product::inventory_value).sum()
}

/// Distinct categories in first-seen order.
pub fn categories(products: &[Product]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for product in products {
        if !seen.contains(&product.category.as_str()) {
            seen.push(product.category.as_str());
        }
    }
    seen
}

pub fn category_distribution(products: &[Product]) -> Vec<CategoryShare> {
    let mut shares: Vec<CategoryShare> = Vec::new();
    for product in products {
        match shares.iter_mut().find(|share| share.name == product.category) {
            Some(share) => {
                share.value += product.inventory_value();
                share.count += 1;
            }
            None => shares.push(CategoryShare {
                name: product.category.clone(),
                value: product.inventory_value(),
                count: 1,
            }),
        }
    }
    shares
}
