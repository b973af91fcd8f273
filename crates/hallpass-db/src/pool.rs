use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/hallpass-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by the entity store, parents before children.
pub const TABLES: &[&str] = &[
    "students",
    "subjects",
    "exam_halls",
    "examinations",
    "exam_schedule",
    "student_allocations",
];

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Open the connection pool. Close it with [`PgPool::close`] on shutdown.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to apply hallpass migrations")?;
    info!(count = MIGRATOR.iter().count(), "migrations up to date");
    Ok(())
}

/// `CREATE DATABASE` takes no bind parameters, so the name is spliced in
/// and must be a plain identifier.
fn plain_identifier(name: &str) -> Result<&str> {
    let ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !ok {
        bail!("database name {name:?} must contain only letters, digits and underscores");
    }
    Ok(name)
}

/// Create the configured database through the `postgres` maintenance
/// database if it does not exist yet. Returns whether it was created.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let name = config
        .database_name()
        .context("database URL does not name a database")?;
    let name = plain_identifier(name)?;

    let maintenance_url = config.maintenance_url();
    let maint = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to maintenance database at {maintenance_url}"))?;

    let result = create_if_missing(&maint, name).await;
    maint.close().await;
    result
}

async fn create_if_missing(maint: &PgPool, name: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(maint)
            .await
            .context("failed to look up database in pg_database")?;
    if exists {
        info!(db = name, "database already exists");
        return Ok(false);
    }

    maint
        .execute(format!("CREATE DATABASE {name}").as_str())
        .await
        .with_context(|| format!("failed to create database {name}"))?;
    info!(db = name, "database created");
    Ok(true)
}

/// Row count of every entity table, in [`TABLES`] order.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let sql = TABLES
        .iter()
        .map(|t| format!("SELECT '{t}'::text, COUNT(*) FROM {t}"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ");
    let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
        .fetch_all(pool)
        .await
        .context("failed to count rows per table")?;

    // UNION ALL gives no ordering guarantee.
    let mut counts = rows;
    counts.sort_by_key(|(name, _)| TABLES.iter().position(|t| t == name));
    Ok(counts)
}
