//! Database query functions for the `exam_schedule` table.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;

use crate::models::ExamSchedule;

/// Insert a new sitting. Exam and subject must exist (foreign keys).
pub async fn insert_schedule(
    pool: &PgPool,
    exam_id: i32,
    subject_id: i32,
    exam_date: NaiveDate,
    start_time: NaiveTime,
) -> Result<ExamSchedule> {
    let schedule = sqlx::query_as::<_, ExamSchedule>(
        "INSERT INTO exam_schedule (exam_id, subject_id, exam_date, start_time) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(exam_id)
    .bind(subject_id)
    .bind(exam_date)
    .bind(start_time)
    .fetch_one(pool)
    .await
    .context("failed to insert exam schedule")?;

    Ok(schedule)
}

pub async fn get_schedule(pool: &PgPool, schedule_id: i32) -> Result<Option<ExamSchedule>> {
    let schedule =
        sqlx::query_as::<_, ExamSchedule>("SELECT * FROM exam_schedule WHERE schedule_id = $1")
            .bind(schedule_id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch exam schedule")?;

    Ok(schedule)
}

/// List all sittings in chronological order.
pub async fn list_schedules(pool: &PgPool) -> Result<Vec<ExamSchedule>> {
    let schedules = sqlx::query_as::<_, ExamSchedule>(
        "SELECT * FROM exam_schedule ORDER BY exam_date, start_time, schedule_id",
    )
    .fetch_all(pool)
    .await
    .context("failed to list exam schedules")?;

    Ok(schedules)
}
