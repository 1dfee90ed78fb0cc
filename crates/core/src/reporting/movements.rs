use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::movement::{Direction, Movement};

const MONTH_LABELS: [&str; 12] =
    ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyMovement {
    /// Calendar month, 1 through 12.
    pub month: u32,
    pub label: String,
    pub incoming: i64,
    pub outgoing: i64,
}

/// Twelve calendar-month buckets of incoming and outgoing stock.
///
/// Buckets are keyed by month only, so a range spanning years folds into the same twelve rows.
/// Adjustments move neither column.
pub fn monthly_movements(
    movements: &[Movement],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Vec<MonthlyMovement> {
    let mut buckets: Vec<MonthlyMovement> = MONTH_LABELS
        .iter()
        .zip(1u32..)
        .map(|(label, month)| MonthlyMovement {
            month,
            label: (*label).to_string(),
            incoming: 0,
            outgoing: 0,
        })
        .collect();

    let in_range = |at: DateTime<Utc>| {
        from.map_or(true, |from| at >= from) && to.map_or(true, |to| at <= to)
    };

    for movement in movements.iter().filter(|movement| in_range(movement.created_at)) {
        let bucket = &mut buckets[movement.created_at.month0() as usize];
        let quantity = movement.kind.reported_quantity(movement.quantity);
        match movement.kind.direction() {
            Direction::Incoming => bucket.incoming += quantity,
            Direction::Outgoing => bucket.outgoing += quantity,
            Direction::Neutral => {}
        }
    }

    buckets
}
