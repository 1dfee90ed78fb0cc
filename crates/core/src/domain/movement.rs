use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::ActorId;
use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementId(pub String);

impl fmt::Display for MovementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Inbound,
    Outbound,
    Adjustment,
    Usage,
    Return,
}

/// Which way a movement moves stock, for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    Neutral,
}

impl MovementKind {
    pub const ALL: [MovementKind; 5] =
        [Self::Inbound, Self::Outbound, Self::Adjustment, Self::Usage, Self::Return];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Adjustment => "adjustment",
            Self::Usage => "usage",
            Self::Return => "return",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Inbound | Self::Return => Direction::Incoming,
            Self::Outbound | Self::Usage => Direction::Outgoing,
            Self::Adjustment => Direction::Neutral,
        }
    }

    /// Outgoing quantities are reported as magnitudes; everything else keeps its sign.
    pub fn reported_quantity(&self, quantity: i64) -> i64 {
        match self.direction() {
            Direction::Outgoing => quantity.abs(),
            Direction::Incoming | Direction::Neutral => quantity,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            "adjustment" => Ok(Self::Adjustment),
            "usage" => Ok(Self::Usage),
            "return" => Ok(Self::Return),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown movement kind `{other}` (expected inbound|outbound|adjustment|usage|return)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Completed,
    Pending,
    Cancelled,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for MovementStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "pending" => Ok(Self::Pending),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown movement status `{other}` (expected completed|pending|cancelled)"
            ))),
        }
    }
}

/// One entry of the stock log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub kind: MovementKind,
    pub product_id: ProductId,
    pub actor_id: ActorId,
    pub quantity: i64,
    pub reason: String,
    pub status: MovementStatus,
    pub actor_name: Option<String>,
    pub product_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stock change someone wants to log.
///
/// `quantity` is a magnitude for every kind except adjustments, which carry their own sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: ProductId,
    pub actor_id: ActorId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: Option<String>,
}

impl NewMovement {
    /// The change to apply to stock: negative for outgoing kinds.
    pub fn signed_quantity(&self) -> Result<i64, DomainError> {
        if self.quantity == 0 {
            return Err(DomainError::InvariantViolation("quantity must not be zero".to_string()));
        }

        match self.kind.direction() {
            Direction::Neutral => Ok(self.quantity),
            _ if self.quantity < 0 => Err(DomainError::InvariantViolation(format!(
                "{} quantity must be positive, got {}",
                self.kind, self.quantity
            ))),
            Direction::Incoming => Ok(self.quantity),
            Direction::Outgoing => Ok(-self.quantity),
        }
    }

    pub fn into_movement(self, at: DateTime<Utc>) -> Result<Movement, DomainError> {
        let quantity = self.signed_quantity()?;

        Ok(Movement {
            id: MovementId(format!("mov-{}", Uuid::new_v4())),
            kind: self.kind,
            product_id: self.product_id,
            actor_id: self.actor_id,
            quantity,
            reason: self.reason.map(|value| value.trim().to_string()).unwrap_or_default(),
            status: MovementStatus::Completed,
            actor_name: None,
            product_name: None,
            created_at: at,
        })
    }
}
