//! Database query functions for the `exam_halls` table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::ExamHall;

/// Insert a new hall. `capacity` must be positive (CHECK constraint).
pub async fn insert_hall(pool: &PgPool, name: &str, capacity: i32) -> Result<ExamHall> {
    let hall = sqlx::query_as::<_, ExamHall>(
        "INSERT INTO exam_halls (hall_name, capacity) VALUES ($1, $2) RETURNING *",
    )
    .bind(name)
    .bind(capacity)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert hall {name:?}"))?;

    Ok(hall)
}

pub async fn get_hall(pool: &PgPool, hall_id: i32) -> Result<Option<ExamHall>> {
    let hall = sqlx::query_as::<_, ExamHall>("SELECT * FROM exam_halls WHERE hall_id = $1")
        .bind(hall_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch hall")?;

    Ok(hall)
}

/// List all halls, ordered by id.
pub async fn list_halls(pool: &PgPool) -> Result<Vec<ExamHall>> {
    let halls = sqlx::query_as::<_, ExamHall>("SELECT * FROM exam_halls ORDER BY hall_id")
        .fetch_all(pool)
        .await
        .context("failed to list halls")?;

    Ok(halls)
}
