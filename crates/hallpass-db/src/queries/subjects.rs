//! Database query functions for the `subjects` table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Subject;

/// Insert a new subject. Subject codes are unique.
pub async fn insert_subject(pool: &PgPool, code: &str, name: &str) -> Result<Subject> {
    let subject = sqlx::query_as::<_, Subject>(
        "INSERT INTO subjects (subject_code, subject_name) VALUES ($1, $2) RETURNING *",
    )
    .bind(code)
    .bind(name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert subject {code:?}"))?;

    Ok(subject)
}

pub async fn get_subject(pool: &PgPool, subject_id: i32) -> Result<Option<Subject>> {
    let subject = sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE subject_id = $1")
        .bind(subject_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch subject")?;

    Ok(subject)
}

/// List all subjects, ordered by code.
pub async fn list_subjects(pool: &PgPool) -> Result<Vec<Subject>> {
    let subjects = sqlx::query_as::<_, Subject>("SELECT * FROM subjects ORDER BY subject_code")
        .fetch_all(pool)
        .await
        .context("failed to list subjects")?;

    Ok(subjects)
}
