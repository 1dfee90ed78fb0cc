use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::ActorId;
use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 3] = [Self::Pending, Self::Accepted, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted) | (Self::Pending, Self::Rejected)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown request status `{other}` (expected pending|accepted|rejected)"
            ))),
        }
    }
}

/// A requisition for a quantity of one inventory item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub requester_id: ActorId,
    pub product_id: ProductId,
    pub title: String,
    pub reason: Option<String>,
    pub quantity: u32,
    pub status: RequestStatus,
    pub requester_name: Option<String>,
    pub product_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn transition_to(
        &mut self,
        next: RequestStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidRequestTransition { from: self.status, to: next });
        }

        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Case-insensitive match against title, reason, product name and requester name.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [
            Some(self.title.as_str()),
            self.reason.as_deref(),
            self.product_name.as_deref(),
            self.requester_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Caller-supplied fields for a new request. Everything else is assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub requester_id: ActorId,
    pub product_id: ProductId,
    pub title: String,
    pub reason: Option<String>,
    pub quantity: i64,
}

impl NewRequest {
    /// Normalizes text fields and checks the creation invariants.
    pub fn validate(self) -> Result<ValidatedRequest, DomainError> {
        if self.quantity < 1 {
            return Err(DomainError::InvariantViolation(format!(
                "quantity must be at least 1, got {}",
                self.quantity
            )));
        }
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            DomainError::InvariantViolation(format!("quantity {} is too large", self.quantity))
        })?;

        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::InvariantViolation("title is required".to_string()));
        }
        if self.requester_id.0.trim().is_empty() {
            return Err(DomainError::InvariantViolation("requester is required".to_string()));
        }
        if self.product_id.0.trim().is_empty() {
            return Err(DomainError::InvariantViolation("product is required".to_string()));
        }

        let reason =
            self.reason.map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

        Ok(ValidatedRequest {
            requester_id: self.requester_id,
            product_id: self.product_id,
            title,
            reason,
            quantity,
        })
    }
}

/// A `NewRequest` that passed validation; the only input the store accepts for inserts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRequest {
    pub requester_id: ActorId,
    pub product_id: ProductId,
    pub title: String,
    pub reason: Option<String>,
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::actor::ActorId;
    use crate::domain::product::ProductId;
    use crate::errors::DomainError;

    use super::{NewRequest, Request, RequestId, RequestStatus};

    fn request(status: RequestStatus) -> Request {
        let now = Utc::now();
        Request {
            id: RequestId("r1".to_string()),
            requester_id: ActorId("u1".to_string()),
            product_id: ProductId("p1".to_string()),
            title: "Need bolts".to_string(),
            reason: Some("restock".to_string()),
            quantity: 5,
            status,
            requester_name: Some("Ana Torres".to_string()),
            product_name: Some("Hex bolt M8".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn new_request(quantity: i64, title: &str) -> NewRequest {
        NewRequest {
            requester_id: ActorId("u1".to_string()),
            product_id: ProductId("p1".to_string()),
            title: title.to_string(),
            reason: Some("  restock ".to_string()),
            quantity,
        }
    }

    #[test]
    fn pending_moves_to_either_terminal_state() {
        let later = Utc::now() + Duration::seconds(5);

        let mut accepted = request(RequestStatus::Pending);
        accepted.transition_to(RequestStatus::Accepted, later).expect("pending -> accepted");
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert_eq!(accepted.updated_at, later);

        let mut rejected = request(RequestStatus::Pending);
        rejected.transition_to(RequestStatus::Rejected, later).expect("pending -> rejected");
        assert_eq!(rejected.status, RequestStatus::Rejected);
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for terminal in [RequestStatus::Accepted, RequestStatus::Rejected] {
            for next in RequestStatus::ALL {
                let mut request = request(terminal);
                let before = request.updated_at;
                let error = request
                    .transition_to(next, Utc::now())
                    .expect_err("terminal requests must not transition");
                assert!(matches!(error, DomainError::InvalidRequestTransition { .. }));
                assert_eq!(request.status, terminal);
                assert_eq!(request.updated_at, before);
            }
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Accepted".parse::<RequestStatus>().expect("parse"), RequestStatus::Accepted);
        assert!("cancelled".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn text_match_covers_joined_names() {
        let request = request(RequestStatus::Pending);
        assert!(request.matches_text("BOLTS"));
        assert!(request.matches_text("restock"));
        assert!(request.matches_text("hex bolt"));
        assert!(request.matches_text("torres"));
        assert!(request.matches_text("   "));
        assert!(!request.matches_text("screwdriver"));
    }

    #[test]
    fn validation_rejects_non_positive_quantity_and_blank_title() {
        assert!(new_request(0, "Need bolts").validate().is_err());
        assert!(new_request(-3, "Need bolts").validate().is_err());
        assert!(new_request(5, "   ").validate().is_err());
    }

    #[test]
    fn validation_trims_text_fields() {
        let validated = new_request(5, " Need bolts ").validate().expect("valid input");
        assert_eq!(validated.title, "Need bolts");
        assert_eq!(validated.reason.as_deref(), Some("restock"));
        assert_eq!(validated.quantity, 5);
    }
}
