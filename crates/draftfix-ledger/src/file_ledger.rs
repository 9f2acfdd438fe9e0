//! Line-oriented file ledger.
//!
//! Layout: one entry per line,
//!
//! ```text
//! <rfc3339 timestamp> | <identity> | <destination ref> | <title>
//! ```
//!
//! The whole file is indexed into memory on open, so `has_published` is a
//! hash lookup. Appends are written and `fsync`ed before `record` returns.
//! Two-field lines (`<timestamp> | <title>`) written by older pipelines are
//! accepted; their identity is derived from the title.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::identity::identity_of;
use crate::storage_traits::{Identity, LedgerEntry, LedgerResult, PublishLedger};

const SEPARATOR: &str = " | ";

#[derive(Debug, Default)]
struct Index {
    entries: Vec<LedgerEntry>,
    by_identity: HashMap<Identity, usize>,
}

/// Append-only ledger persisted as a text log.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    index: Mutex<Index>,
}

impl FileLedger {
    /// Open (or lazily create) the ledger at `path` and index its contents.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut index = Index::default();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                for (n, raw) in contents.lines().enumerate() {
                    if raw.trim().is_empty() {
                        continue;
                    }
                    let entry = parse_line(raw, n + 1)?;
                    if index.by_identity.contains_key(&entry.identity) {
                        warn!(line = n + 1, identity = %entry.identity, "duplicate ledger line ignored");
                        continue;
                    }
                    let pos = index.entries.len();
                    index.by_identity.insert(entry.identity.clone(), pos);
                    index.entries.push(entry);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "ledger file absent, starting empty");
            }
            Err(e) => return Err(LedgerError::Io(e)),
        }

        info!(path = %path.display(), entries = index.entries.len(), "file ledger opened");
        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Append one line and `fsync` it. Blocking; run off the async workers.
fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_data()
}

#[async_trait]
impl PublishLedger for FileLedger {
    async fn has_published(&self, identity: &Identity) -> LedgerResult<bool> {
        let index = self.index.lock().await;
        Ok(index.by_identity.contains_key(identity))
    }

    async fn record(&self, entry: LedgerEntry) -> LedgerResult<()> {
        // Held across the append so concurrent records stay ordered.
        let mut index = self.index.lock().await;
        if index.by_identity.contains_key(&entry.identity) {
            return Err(LedgerError::DuplicateIdentity {
                identity: entry.identity.0.clone(),
            });
        }

        // Disk first: the in-memory index never runs ahead of the log.
        let path = self.path.clone();
        let line = format_line(&entry);
        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| LedgerError::Backend(format!("append task failed: {e}")))??;

        let pos = index.entries.len();
        index.by_identity.insert(entry.identity.clone(), pos);
        index.entries.push(entry);
        Ok(())
    }

    async fn get(&self, identity: &Identity) -> LedgerResult<Option<LedgerEntry>> {
        let index = self.index.lock().await;
        Ok(index
            .by_identity
            .get(identity)
            .map(|&pos| index.entries[pos].clone()))
    }

    async fn entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.index.lock().await.entries.clone())
    }
}

fn format_line(entry: &LedgerEntry) -> String {
    [
        entry.published_at.to_rfc3339(),
        entry.identity.0.clone(),
        entry.destination_ref.replace('|', "%7C").replace(['\n', '\r'], " "),
        entry.title.replace(['\n', '\r'], " "),
    ]
    .join(SEPARATOR)
}

fn parse_line(raw: &str, line: usize) -> LedgerResult<LedgerEntry> {
    let corrupt = |reason: &str| LedgerError::Corrupt {
        line,
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = raw.splitn(4, SEPARATOR).collect();
    match fields.as_slice() {
        [ts, identity, destination, title] => {
            let identity = identity.trim();
            if identity.len() != 64 || !identity.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(corrupt("identity is not a sha-256 hex digest"));
            }
            Ok(LedgerEntry {
                identity: Identity(identity.to_string()),
                published_at: parse_timestamp(ts).ok_or_else(|| corrupt("bad timestamp"))?,
                destination_ref: destination.trim().replace("%7C", "|"),
                title: title.to_string(),
            })
        }
        [ts, title] => Ok(LedgerEntry {
            identity: identity_of(title, None),
            published_at: parse_timestamp(ts).ok_or_else(|| corrupt("bad timestamp"))?,
            destination_ref: String::new(),
            title: title.to_string(),
        }),
        _ => Err(corrupt("expected 2 or 4 ' | '-separated fields")),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
