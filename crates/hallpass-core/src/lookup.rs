//! Existence checks shared by the registry, validator and committer.

use std::collections::HashSet;

use sqlx::PgPool;

use hallpass_db::models::{ExamHall, ExamSchedule};
use hallpass_db::queries::{halls, schedules};

use crate::error::AllocationError;

pub(crate) async fn require_schedule(
    pool: &PgPool,
    schedule_id: i32,
) -> Result<ExamSchedule, AllocationError> {
    schedules::get_schedule(pool, schedule_id)
        .await?
        .ok_or_else(|| AllocationError::not_found("schedule", schedule_id))
}

pub(crate) async fn require_hall(pool: &PgPool, hall_id: i32) -> Result<ExamHall, AllocationError> {
    halls::get_hall(pool, hall_id)
        .await?
        .ok_or_else(|| AllocationError::not_found("hall", hall_id))
}

pub(crate) async fn hall_ids(pool: &PgPool) -> Result<HashSet<i32>, AllocationError> {
    let all = halls::list_halls(pool).await?;
    Ok(all.into_iter().map(|h| h.hall_id).collect())
}
