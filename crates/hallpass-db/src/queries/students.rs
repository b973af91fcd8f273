//! Database query functions for the `students` table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Student;

/// Parameters for inserting a new student row.
#[derive(Debug, Clone)]
pub struct NewStudent<'a> {
    pub student_id: &'a str,
    pub roll_no: &'a str,
    pub name: &'a str,
    pub student_class: &'a str,
}

/// Insert a new student. Rejected by the primary key / UNIQUE(roll_no)
/// constraints when the id or roll number is already taken.
pub async fn insert_student(pool: &PgPool, new: &NewStudent<'_>) -> Result<Student> {
    let student = sqlx::query_as::<_, Student>(
        "INSERT INTO students (student_id, roll_no, name, student_class) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(new.student_id)
    .bind(new.roll_no)
    .bind(new.name)
    .bind(new.student_class)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert student {:?}", new.student_id))?;

    Ok(student)
}

/// Fetch a student by id.
pub async fn get_student(pool: &PgPool, student_id: &str) -> Result<Option<Student>> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE student_id = $1")
        .bind(student_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch student {student_id:?}"))?;

    Ok(student)
}

/// List all students, ordered by roll number.
pub async fn list_students(pool: &PgPool) -> Result<Vec<Student>> {
    let students = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY roll_no")
        .fetch_all(pool)
        .await
        .context("failed to list students")?;

    Ok(students)
}

/// Return the subset of `student_ids` that has no row in `students`,
/// preserving input order.
pub async fn find_missing_students(pool: &PgPool, student_ids: &[String]) -> Result<Vec<String>> {
    let existing: Vec<(String,)> =
        sqlx::query_as("SELECT student_id FROM students WHERE student_id = ANY($1)")
            .bind(student_ids)
            .fetch_all(pool)
            .await
            .context("failed to look up students")?;

    let existing: std::collections::HashSet<String> =
        existing.into_iter().map(|(id,)| id).collect();

    Ok(student_ids
        .iter()
        .filter(|id| !existing.contains(*id))
        .cloned()
        .collect())
}
