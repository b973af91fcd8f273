use sqlx::{Postgres, Transaction};
use tracing::warn;

/// Roll back a failed transaction. A rollback error is logged and swallowed
/// so the caller can return the error that caused the rollback.
pub(crate) async fn rollback(tx: Transaction<'_, Postgres>, operation: &str) {
    if let Err(err) = tx.rollback().await {
        warn!(operation, error = %err, "rollback failed");
    }
}
