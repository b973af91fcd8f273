//! Seating plans: validation and transactional application.
//!
//! A plan is checked in four passes, each with its own failure:
//! 1. every item is well formed ([`item::parse_plan`]);
//! 2. no seat or student appears twice in the plan;
//! 3. no item takes a seat held by another student;
//! 4. every target student is registered for the schedule.
//!
//! [`validate_plan`] runs the passes against the current state without
//! writing. [`commit::execute_plan`] runs them again inside the transaction
//! that applies the plan.

pub mod commit;
pub mod item;
pub mod occupancy;

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use hallpass_db::queries::allocations;

use crate::error::AllocationError;
use crate::lookup;

pub use commit::{CommitReport, execute_plan, reassign_seat};
pub use item::{PlanItem, check_internal_uniqueness, parse_plan};
pub use occupancy::Occupancy;

/// Run every check on an already loaded picture of the schedule.
pub fn evaluate(
    raw: &[Value],
    known_halls: &HashSet<i32>,
    occupancy: &Occupancy,
) -> Result<Vec<PlanItem>, AllocationError> {
    let items = parse_plan(raw, known_halls)?;
    check_internal_uniqueness(&items)?;
    occupancy.check(&items)?;
    Ok(items)
}

/// Check a plan against the store without writing anything.
///
/// Returns the normalized items on success.
pub async fn validate_plan(
    pool: &PgPool,
    schedule_id: i32,
    raw: &[Value],
) -> Result<Vec<PlanItem>, AllocationError> {
    let (known_halls, occupancy) = load_state(pool, schedule_id).await?;
    evaluate(raw, &known_halls, &occupancy)
}

pub(crate) async fn load_state(
    pool: &PgPool,
    schedule_id: i32,
) -> Result<(HashSet<i32>, Occupancy), AllocationError> {
    lookup::require_schedule(pool, schedule_id).await?;
    let known_halls = lookup::hall_ids(pool).await?;
    let rows = allocations::list_allocations_for_schedule(pool, schedule_id).await?;
    Ok((known_halls, Occupancy::from_allocations(schedule_id, &rows)))
}

/// Outcome of a validation, shaped for display next to a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanVerdict {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanVerdict {
    pub fn from_result<T>(result: &Result<T, AllocationError>) -> Self {
        match result {
            Ok(_) => Self {
                valid: true,
                kind: None,
                error: None,
            },
            Err(err) => Self {
                valid: false,
                kind: Some(err.kind()),
                error: Some(err.to_string()),
            },
        }
    }
}
