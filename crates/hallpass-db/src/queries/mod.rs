//! Query functions, one module per table.

pub mod allocations;
pub mod examinations;
pub mod halls;
pub mod schedules;
pub mod students;
pub mod subjects;

/// Whether `err` wraps a PostgreSQL unique-constraint violation.
///
/// Query functions attach context with `anyhow`, so the underlying
/// [`sqlx::Error`] is recovered by downcasting.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}

/// Whether `err` wraps a PostgreSQL foreign-key violation.
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_foreign_key_violation())
}
