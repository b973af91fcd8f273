//! Applying plans and single reassignments inside one transaction.
//!
//! Both paths lock every allocation row of the schedule with
//! `SELECT ... FOR UPDATE` before re-checking occupancy, so two commits
//! against the same schedule run one after the other and the second sees
//! the first's seats. The partial unique index on
//! `(schedule_id, hall_id, seat_number)` stays as a backstop.

use std::slice;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};

use hallpass_db::models::Allocation;
use hallpass_db::queries::{allocations, is_unique_violation};

use super::item::{PlanItem, check_internal_uniqueness, parse_plan};
use super::occupancy::Occupancy;
use crate::error::AllocationError;
use crate::seat::SeatLabel;
use crate::{lookup, txn};

/// Result of a committed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub schedule_id: i32,
    pub updated_count: usize,
}

/// Apply a plan atomically.
///
/// Structural and in-plan checks run first, outside the transaction. The
/// occupancy and registration checks run again under the schedule lock, and
/// any failure rolls back every item already written.
pub async fn execute_plan(
    pool: &PgPool,
    schedule_id: i32,
    raw: &[Value],
) -> Result<CommitReport, AllocationError> {
    lookup::require_schedule(pool, schedule_id).await?;
    let known_halls = lookup::hall_ids(pool).await?;
    let items = parse_plan(raw, &known_halls)?;
    check_internal_uniqueness(&items)?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    match apply_plan(&mut *tx, schedule_id, &items).await {
        Ok(updated_count) => {
            tx.commit()
                .await
                .context("failed to commit seat allocation plan")?;
            info!(schedule_id, updated_count, "seat allocation plan committed");
            Ok(CommitReport {
                schedule_id,
                updated_count,
            })
        }
        Err(err) => {
            warn!(schedule_id, kind = err.kind(), error = %err, "seat allocation plan rolled back");
            txn::rollback(tx, "execute plan").await;
            Err(err)
        }
    }
}

async fn apply_plan(
    conn: &mut PgConnection,
    schedule_id: i32,
    items: &[PlanItem],
) -> Result<usize, AllocationError> {
    let locked = allocations::lock_schedule_allocations(conn, schedule_id).await?;
    Occupancy::from_allocations(schedule_id, &locked).check(items)?;

    for (index, item) in items.iter().enumerate() {
        debug!(
            schedule_id,
            index,
            student_id = %item.student_id,
            hall_id = item.hall_id,
            seat = %item.seat,
            "seating student"
        );
        let updated = allocations::assign_seat(
            conn,
            schedule_id,
            &item.student_id,
            item.hall_id,
            item.seat.as_str(),
        )
        .await
        .map_err(|err| seat_write_error(err, item))?;

        if updated == 0 {
            return Err(AllocationError::AllocationNotFound {
                student_id: item.student_id.clone(),
                schedule_id,
            });
        }
    }

    Ok(items.len())
}

/// Move one allocation to `(hall_id, seat)`.
///
/// Same protocol as a plan of one item: lock the schedule, check the seat
/// is free of other students, write, commit.
pub async fn reassign_seat(
    pool: &PgPool,
    allocation_id: i32,
    hall_id: i32,
    seat: &SeatLabel,
) -> Result<Allocation, AllocationError> {
    lookup::require_hall(pool, hall_id).await?;
    let current = allocations::get_allocation(pool, allocation_id)
        .await?
        .ok_or_else(|| AllocationError::not_found("allocation", allocation_id))?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    match apply_reassignment(&mut *tx, &current, hall_id, seat).await {
        Ok(updated) => {
            tx.commit().await.context("failed to commit reassignment")?;
            info!(allocation_id, hall_id, seat = %seat, "allocation reassigned");
            Ok(updated)
        }
        Err(err) => {
            warn!(allocation_id, kind = err.kind(), error = %err, "reassignment rolled back");
            txn::rollback(tx, "reassign seat").await;
            Err(err)
        }
    }
}

async fn apply_reassignment(
    conn: &mut PgConnection,
    current: &Allocation,
    hall_id: i32,
    seat: &SeatLabel,
) -> Result<Allocation, AllocationError> {
    let locked = allocations::lock_schedule_allocations(conn, current.schedule_id).await?;
    // Deleted between the read and the lock.
    if !locked
        .iter()
        .any(|a| a.allocation_id == current.allocation_id)
    {
        return Err(AllocationError::not_found("allocation", current.allocation_id));
    }

    let item = PlanItem {
        student_id: current.student_id.clone(),
        hall_id,
        seat: seat.clone(),
    };
    Occupancy::from_allocations(current.schedule_id, &locked).check(slice::from_ref(&item))?;

    allocations::assign_seat_by_id(conn, current.allocation_id, hall_id, seat.as_str())
        .await
        .map_err(|err| seat_write_error(err, &item))?
        .ok_or_else(|| AllocationError::not_found("allocation", current.allocation_id))
}

fn seat_write_error(err: anyhow::Error, item: &PlanItem) -> AllocationError {
    if is_unique_violation(&err) {
        AllocationError::SeatAlreadyOccupied {
            hall_id: item.hall_id,
            seat: item.seat.to_string(),
            student_id: item.student_id.clone(),
            occupant: None,
        }
    } else {
        AllocationError::Internal(err)
    }
}
