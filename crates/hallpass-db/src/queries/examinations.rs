//! Database query functions for the `examinations` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::Examination;

/// Insert a new examination. The table CHECK rejects `start_date > end_date`.
pub async fn insert_examination(
    pool: &PgPool,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Examination> {
    let exam = sqlx::query_as::<_, Examination>(
        "INSERT INTO examinations (exam_name, start_date, end_date) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(name)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert examination {name:?}"))?;

    Ok(exam)
}

pub async fn get_examination(pool: &PgPool, exam_id: i32) -> Result<Option<Examination>> {
    let exam = sqlx::query_as::<_, Examination>("SELECT * FROM examinations WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch examination")?;

    Ok(exam)
}

/// List all examinations, most recent first.
pub async fn list_examinations(pool: &PgPool) -> Result<Vec<Examination>> {
    let exams = sqlx::query_as::<_, Examination>(
        "SELECT * FROM examinations ORDER BY start_date DESC, exam_id",
    )
    .fetch_all(pool)
    .await
    .context("failed to list examinations")?;

    Ok(exams)
}
