//! Registering students against a sitting and reading who is seated where.

use std::collections::HashSet;

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use hallpass_db::models::Allocation;
use hallpass_db::queries::allocations::{self, OccupiedSeat, UnallocatedStudent};
use hallpass_db::queries::{is_unique_violation, students};

use crate::error::AllocationError;
use crate::{lookup, txn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    pub schedule_id: i32,
    pub registered: Vec<Allocation>,
}

impl RegistrationReport {
    pub fn count(&self) -> usize {
        self.registered.len()
    }
}

/// Register every student in `student_ids` for the schedule, or none.
///
/// Ids are trimmed and de-duplicated. If any student is already registered
/// the whole batch fails with [`AllocationError::DuplicateRegistration`]
/// naming those students.
pub async fn register_students(
    pool: &PgPool,
    schedule_id: i32,
    student_ids: &[String],
) -> Result<RegistrationReport, AllocationError> {
    let ids = normalize_ids(student_ids)?;
    lookup::require_schedule(pool, schedule_id).await?;

    let missing = students::find_missing_students(pool, &ids).await?;
    if !missing.is_empty() {
        return Err(AllocationError::NotFound {
            entity: "student",
            id: missing.join(", "),
        });
    }

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let already = allocations::find_registered(&mut *tx, schedule_id, &ids).await?;
    if !already.is_empty() {
        warn!(schedule_id, duplicates = already.len(), "registration rejected");
        txn::rollback(tx, "register students").await;
        return Err(AllocationError::DuplicateRegistration {
            schedule_id,
            student_ids: already,
        });
    }

    let inserted = allocations::insert_registrations(&mut *tx, schedule_id, &ids).await;
    let registered = match inserted {
        Ok(rows) => rows,
        Err(err) => {
            txn::rollback(tx, "register students").await;
            // A concurrent registration won the race for one of the pairs.
            if is_unique_violation(&err) {
                let mut conn = pool.acquire().await.context("failed to acquire connection")?;
                let already = allocations::find_registered(&mut *conn, schedule_id, &ids).await?;
                warn!(schedule_id, duplicates = already.len(), "registration lost a race");
                return Err(AllocationError::DuplicateRegistration {
                    schedule_id,
                    student_ids: already,
                });
            }
            return Err(err.into());
        }
    };

    tx.commit()
        .await
        .context("failed to commit registration")?;
    info!(schedule_id, count = registered.len(), "students registered");

    Ok(RegistrationReport {
        schedule_id,
        registered,
    })
}

fn normalize_ids(student_ids: &[String]) -> Result<Vec<String>, AllocationError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(student_ids.len());
    for raw in student_ids {
        let id = raw.trim();
        if id.is_empty() {
            return Err(AllocationError::InvalidInput(
                "student ids must not be blank".to_owned(),
            ));
        }
        if seen.insert(id) {
            ids.push(id.to_owned());
        }
    }
    if ids.is_empty() {
        return Err(AllocationError::InvalidInput(
            "at least one student id is required".to_owned(),
        ));
    }
    Ok(ids)
}

/// Students registered for the schedule that have no seat yet.
pub async fn list_unallocated(
    pool: &PgPool,
    schedule_id: i32,
) -> Result<Vec<UnallocatedStudent>, AllocationError> {
    lookup::require_schedule(pool, schedule_id).await?;
    Ok(allocations::list_unallocated(pool, schedule_id).await?)
}

/// Seat labels taken in one hall for one schedule, in sorted order.
pub async fn list_occupied_seats(
    pool: &PgPool,
    schedule_id: i32,
    hall_id: i32,
) -> Result<Vec<String>, AllocationError> {
    lookup::require_schedule(pool, schedule_id).await?;
    lookup::require_hall(pool, hall_id).await?;
    Ok(allocations::list_occupied_seats(pool, schedule_id, hall_id).await?)
}

/// Every taken seat in the schedule, across halls.
pub async fn list_schedule_occupancy(
    pool: &PgPool,
    schedule_id: i32,
) -> Result<Vec<OccupiedSeat>, AllocationError> {
    lookup::require_schedule(pool, schedule_id).await?;
    Ok(allocations::list_occupied_for_schedule(pool, schedule_id).await?)
}

pub async fn remove_allocation(pool: &PgPool, allocation_id: i32) -> Result<(), AllocationError> {
    let removed = allocations::delete_allocation(pool, allocation_id).await?;
    if removed == 0 {
        return Err(AllocationError::not_found("allocation", allocation_id));
    }
    info!(allocation_id, "allocation removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn ids_are_trimmed_and_deduplicated_in_order() {
        let ids = normalize_ids(&owned(&[" S2", "S1", "S2 ", "S3"])).unwrap();
        assert_eq!(ids, owned(&["S2", "S1", "S3"]));
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = normalize_ids(&[]).unwrap_err();
        assert_eq!(err.to_string(), "invalid input: at least one student id is required");
    }

    #[test]
    fn blank_id_is_rejected() {
        let err = normalize_ids(&owned(&["S1", "  "])).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
