//! Role-gated authorization for request transitions.
//!
//! Every rule about who may move a request out of `pending` lives here. Callers use
//! [`permitted_transitions`] to decide which actions to offer; the lifecycle manager
//! re-evaluates with [`evaluate`] before touching the store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::actor::{Actor, ActorId};
use crate::domain::movement::MovementKind;
use crate::domain::request::{Request, RequestStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Approve,
    Reject,
    Cancel,
}

impl Transition {
    pub const ALL: [Transition; 3] = [Self::Approve, Self::Reject, Self::Cancel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
        }
    }

    pub fn target_status(&self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Accepted,
            Self::Reject | Self::Cancel => RequestStatus::Rejected,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Denial {
    NotAdministrator,
    AdministratorMustReject,
    NotRequester { actor_id: ActorId, requester_id: ActorId },
    ForeignRequester { actor_id: ActorId, requester_id: ActorId },
    ActorMismatch { session_actor_id: ActorId, claimed_actor_id: ActorId },
    AlreadyTerminal { status: RequestStatus },
    RestrictedMovement { kind: MovementKind },
}

impl Denial {
    pub fn reason(&self) -> String {
        match self {
            Self::NotAdministrator => "only administrators can approve or reject requests".into(),
            Self::AdministratorMustReject => {
                "administrators cannot cancel requests; use reject instead".into()
            }
            Self::NotRequester { actor_id, requester_id } => {
                format!("actor `{actor_id}` cannot cancel a request filed by `{requester_id}`")
            }
            Self::ForeignRequester { actor_id, requester_id } => {
                format!("actor `{actor_id}` cannot file a request on behalf of `{requester_id}`")
            }
            Self::ActorMismatch { session_actor_id, claimed_actor_id } => {
                format!("session actor `{session_actor_id}` cannot act as `{claimed_actor_id}`")
            }
            Self::AlreadyTerminal { status } => {
                format!("request is already {status} and cannot change again")
            }
            Self::RestrictedMovement { kind } => {
                format!("only administrators can record {kind} movements")
            }
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

pub fn can_approve(request: &Request, actor: &Actor) -> bool {
    actor.is_admin() && request.is_pending()
}

pub fn can_reject(request: &Request, actor: &Actor) -> bool {
    actor.is_admin() && request.is_pending()
}

pub fn can_cancel(request: &Request, actor: &Actor) -> bool {
    !actor.is_admin() && request.is_pending() && actor.id == request.requester_id
}

/// Explains why `actor` may not apply `transition` to `request`.
///
/// Role and identity denials win over status denials, so a caller who is never allowed to
/// act learns that before learning the request is already closed.
pub fn evaluate(request: &Request, actor: &Actor, transition: Transition) -> Result<(), Denial> {
    match transition {
        Transition::Approve | Transition::Reject => {
            if !actor.is_admin() {
                return Err(Denial::NotAdministrator);
            }
        }
        Transition::Cancel => {
            if actor.is_admin() {
                return Err(Denial::AdministratorMustReject);
            }
            if actor.id != request.requester_id {
                return Err(Denial::NotRequester {
                    actor_id: actor.id.clone(),
                    requester_id: request.requester_id.clone(),
                });
            }
        }
    }

    if request.status.is_terminal() {
        return Err(Denial::AlreadyTerminal { status: request.status });
    }

    Ok(())
}

pub fn permitted_transitions(request: &Request, actor: &Actor) -> Vec<Transition> {
    Transition::ALL
        .into_iter()
        .filter(|transition| evaluate(request, actor, *transition).is_ok())
        .collect()
}

/// Employees log what they use or bring back; receiving, shipping and corrections are
/// administrator work.
pub fn can_record_movement(actor: &Actor, kind: MovementKind) -> Result<(), Denial> {
    if actor.is_admin() || matches!(kind, MovementKind::Usage | MovementKind::Return) {
        return Ok(());
    }

    Err(Denial::RestrictedMovement { kind })
}

/// Employees file requests for themselves; administrators may file on anyone's behalf.
pub fn can_create(actor: &Actor, requester_id: &ActorId) -> Result<(), Denial> {
    if actor.is_admin() || &actor.id == requester_id {
        return Ok(());
    }

    Err(Denial::ForeignRequester { actor_id: actor.id.clone(), requester_id: requester_id.clone() })
}
