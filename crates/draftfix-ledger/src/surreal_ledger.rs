//! SurrealDB-backed PublishLedger implementation
//!
//! Rows live in the `published` table; conversion to [`LedgerEntry`] happens
//! at the boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::migrations;
use crate::storage_traits::{Identity, LedgerEntry, LedgerResult, PublishLedger};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Database row for one publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PublishedRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<surrealdb::sql::Thing>,
    identity: String,
    destination_ref: String,
    title: String,
    #[serde(with = "surreal_datetime")]
    published_at: DateTime<Utc>,
}

impl From<LedgerEntry> for PublishedRow {
    fn from(entry: LedgerEntry) -> Self {
        PublishedRow {
            id: None,
            identity: entry.identity.0,
            destination_ref: entry.destination_ref,
            title: entry.title,
            published_at: entry.published_at,
        }
    }
}

impl From<PublishedRow> for LedgerEntry {
    fn from(row: PublishedRow) -> Self {
        LedgerEntry {
            identity: Identity(row.identity),
            published_at: row.published_at,
            destination_ref: row.destination_ref,
            title: row.title,
        }
    }
}

/// SurrealDB-backed implementation of [`PublishLedger`].
pub struct SurrealPublishLedger {
    db: Surreal<Any>,
}

impl SurrealPublishLedger {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `draftfix/ledger`, and runs `init_schema`.
    pub async fn in_memory() -> LedgerResult<Self> {
        let ledger = Self::connect("mem://").await?;
        info!("SurrealPublishLedger connected (in-memory)");
        Ok(ledger)
    }

    /// Connect to any SurrealDB endpoint (`surrealkv://path`, `ws://host`, ...).
    pub async fn connect(url: &str) -> LedgerResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| LedgerError::Backend(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns("draftfix")
            .use_db("ledger")
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;

        migrations::init_schema(&db).await?;
        debug!(url, "SurrealPublishLedger connected");
        Ok(Self { db })
    }

    async fn fetch(&self, identity: &Identity) -> LedgerResult<Option<PublishedRow>> {
        let id_owned = identity.0.clone();
        let mut res = self
            .db
            .query("SELECT * FROM published WHERE identity = $identity LIMIT 1")
            .bind(("identity", id_owned))
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;

        let rows: Vec<PublishedRow> = res
            .take(0)
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, row: PublishedRow) -> LedgerResult<()> {
        let identity = row.identity.clone();
        let created: Result<Option<PublishedRow>, surrealdb::Error> =
            self.db.create("published").content(row).await;
        match created {
            Ok(_) => Ok(()),
            // The unique index catches a racing writer that slipped past `fetch`.
            Err(e) if e.to_string().contains("idx_identity") => {
                Err(LedgerError::DuplicateIdentity { identity })
            }
            Err(e) => Err(LedgerError::Backend(e.to_string())),
        }
    }
}

#[async_trait]
impl PublishLedger for SurrealPublishLedger {
    async fn has_published(&self, identity: &Identity) -> LedgerResult<bool> {
        Ok(self.fetch(identity).await?.is_some())
    }

    async fn record(&self, entry: LedgerEntry) -> LedgerResult<()> {
        if self.fetch(&entry.identity).await?.is_some() {
            return Err(LedgerError::DuplicateIdentity {
                identity: entry.identity.0,
            });
        }

        debug!(identity = %entry.identity, "recording publication");
        self.insert(PublishedRow::from(entry)).await
    }

    async fn get(&self, identity: &Identity) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.fetch(identity).await?.map(LedgerEntry::from))
    }

    async fn entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        let mut res = self
            .db
            .query("SELECT * FROM published ORDER BY published_at ASC")
            .await
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        let rows: Vec<PublishedRow> = res
            .take(0)
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::identity_of;
    use chrono::TimeZone;

    fn row(title: &str, dest: &str) -> PublishedRow {
        PublishedRow::from(LedgerEntry {
            identity: identity_of(title, None),
            published_at: Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).unwrap(),
            destination_ref: dest.to_string(),
            title: title.to_string(),
        })
    }

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let ledger = SurrealPublishLedger::in_memory().await.unwrap();
        migrations::init_schema(&ledger.db).await.unwrap();
        assert!(ledger.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unique_index_rejects_second_row_for_identity() {
        let ledger = SurrealPublishLedger::in_memory().await.unwrap();
        ledger.insert(row("Pier Reopens", "post/1")).await.unwrap();

        // Skips the `fetch` pre-check, as a racing writer would.
        let err = ledger
            .insert(row("pier reopens!", "post/2"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateIdentity { .. }));

        let all = ledger.entries().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].destination_ref, "post/1");
    }
}
