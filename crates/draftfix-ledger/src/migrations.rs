//! SurrealDB schema for the publication ledger.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::storage_traits::LedgerResult;

/// Initialize the `published` table.
///
/// Safe to call multiple times (idempotent).
///
/// ```text
/// TABLE published {
///   identity:        STRING (unique)
///   destination_ref: STRING
///   title:           STRING
///   published_at:    DATETIME (indexed)
/// }
/// ```
///
/// Rows are never updated or deleted; the unique index on `identity` makes a
/// second insert for the same identity fail at the database.
pub async fn init_schema(db: &Surreal<Any>) -> LedgerResult<()> {
    debug!("Initializing published table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS published
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_identity ON TABLE published COLUMNS identity UNIQUE;

        DEFINE INDEX IF NOT EXISTS idx_published_at ON TABLE published COLUMNS published_at;
    "#;

    db.query(sql).await?.check()?;
    info!("published table initialized");
    Ok(())
}
