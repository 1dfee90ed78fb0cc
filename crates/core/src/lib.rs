pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod policy;
pub mod reporting;
pub mod session;
pub mod store;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::actor::{Actor, ActorId, ActorStatus, Role};
pub use domain::movement::{Movement, MovementId, MovementKind, MovementStatus, NewMovement};
pub use domain::product::{Product, ProductId};
pub use domain::request::{NewRequest, Request, RequestId, RequestStatus, ValidatedRequest};
pub use errors::{DomainError, InterfaceError, LifecycleError};
pub use lifecycle::{LoadFilter, RequestLifecycleManager};
pub use policy::{can_approve, can_cancel, can_record_movement, can_reject, Denial, Transition};
pub use reporting::{build_report, ReportData, ReportFilter};
pub use session::Session;
pub use store::{RequestQuery, RequestStore, StatusPatch, StoreError, UpdateGuard};
