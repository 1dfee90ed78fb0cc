//! Grouped counts over already-fetched movements and requests.
//!
//! Everything here is pure. Callers fetch the records (narrowed by [`ReportFilter::request_query`]
//! where the store can help) and hand them in.

pub mod inventory;
pub mod movements;

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::ActorId;
use crate::domain::movement::{Movement, MovementKind};
use crate::domain::product::ProductId;
use crate::domain::request::{Request, RequestStatus};
use crate::store::RequestQuery;

pub use inventory::{
    categories, category_distribution, low_stock, total_value, CategoryShare, InventorySummary,
};
pub use movements::{monthly_movements, MonthlyMovement};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub date_from: Option<NaiveDate>,
    /// Inclusive: records created at any time on this day are kept.
    pub date_to: Option<NaiveDate>,
    pub actor_id: Option<ActorId>,
    pub product_id: Option<ProductId>,
    pub movement_kind: Option<MovementKind>,
    pub request_status: Option<RequestStatus>,
    pub q: Option<String>,
}

impl ReportFilter {
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.date_from.map(|day| day.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.date_to
            .and_then(|day| day.and_hms_nano_opt(23, 59, 59, 999_999_999))
            .map(|end| end.and_utc())
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.starts_at().map_or(true, |from| at >= from)
            && self.ends_at().map_or(true, |to| at <= to)
    }

    /// The part of the filter a [`crate::store::RequestStore`] can evaluate.
    pub fn request_query(&self) -> RequestQuery {
        RequestQuery {
            requester_id: self.actor_id.clone(),
            status: self.request_status,
            product_id: self.product_id.clone(),
            created_from: self.starts_at(),
            created_to: self.ends_at(),
            ..RequestQuery::default()
        }
    }

    pub fn matches_movement(&self, movement: &Movement) -> bool {
        self.contains(movement.created_at)
            && self.actor_id.as_ref().map_or(true, |id| id == &movement.actor_id)
            && self.product_id.as_ref().map_or(true, |id| id == &movement.product_id)
            && self.movement_kind.map_or(true, |kind| kind == movement.kind)
            && self.q.as_deref().map_or(true, |needle| movement_matches_text(movement, needle))
    }

    pub fn matches_request(&self, request: &Request) -> bool {
        self.request_query().matches(request)
            && self.q.as_deref().map_or(true, |needle| request.matches_text(needle))
    }
}

fn movement_matches_text(movement: &Movement, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    [
        movement.product_name.as_deref(),
        movement.actor_name.as_deref(),
        Some(movement.reason.as_str()),
        Some(movement.kind.as_str()),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub movements: usize,
    pub requests: usize,
    pub quantities_by_kind: BTreeMap<MovementKind, i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    pub movements: Vec<Movement>,
    pub requests: Vec<Request>,
    pub by_kind: BTreeMap<MovementKind, usize>,
    pub by_status: BTreeMap<RequestStatus, usize>,
    pub by_actor: BTreeMap<String, usize>,
    pub monthly: Vec<MonthlyMovement>,
    pub totals: ReportTotals,
}

pub fn count_by_kind(movements: &[Movement]) -> BTreeMap<MovementKind, usize> {
    let mut counts = BTreeMap::new();
    for movement in movements {
        *counts.entry(movement.kind).or_insert(0) += 1;
    }
    counts
}

/// Sums quantities per kind; outgoing kinds count as magnitudes.
pub fn quantity_by_kind(movements: &[Movement]) -> BTreeMap<MovementKind, i64> {
    let mut totals = BTreeMap::new();
    for movement in movements {
        *totals.entry(movement.kind).or_insert(0) += movement.kind.reported_quantity(movement.quantity);
    }
    totals
}

pub fn count_by_status(requests: &[Request]) -> BTreeMap<RequestStatus, usize> {
    let mut counts = BTreeMap::new();
    for request in requests {
        *counts.entry(request.status).or_insert(0) += 1;
    }
    counts
}

/// Movements per actor name. Movements whose actor could not be resolved are skipped.
pub fn count_by_actor(movements: &[Movement]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for name in movements.iter().filter_map(|movement| movement.actor_name.as_ref()) {
        *counts.entry(name.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn build_report(filter: &ReportFilter, movements: &[Movement], requests: &[Request]) -> ReportData {
    let movements: Vec<Movement> =
        movements.iter().filter(|movement| filter.matches_movement(movement)).cloned().collect();
    let requests: Vec<Request> =
        requests.iter().filter(|request| filter.matches_request(request)).cloned().collect();

    ReportData {
        by_kind: count_by_kind(&movements),
        by_status: count_by_status(&requests),
        by_actor: count_by_actor(&movements),
        monthly: monthly_movements(&movements, filter.starts_at(), filter.ends_at()),
        totals: ReportTotals {
            movements: movements.len(),
            requests: requests.len(),
            quantities_by_kind: quantity_by_kind(&movements),
        },
        movements,
        requests,
    }
}
