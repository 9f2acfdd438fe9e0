//! Pipeline configuration.
//!
//! Loaded from a TOML file (every field optional), then patched by
//! `DRAFTFIX_*` environment variables. The attempt table is validated while
//! deserializing, so a loaded config always carries a usable table.
//!
//! ```toml
//! [restoration]
//! chunk_concurrency = 2
//!
//! [[restoration.attempts]]
//! model_tier = "premium"
//! chunk_max_chars = 6000
//! min_accept_ratio = 0.9
//! prompt_strictness = "strict"
//! timeout_ms = 120000
//!
//! [gate]
//! min_publish_score = 75
//!
//! [ledger]
//! backend = "file"
//! path = "published.log"
//!
//! [batch]
//! workers = 4
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analyzer::SeverityThresholds;
use crate::domain::{DraftfixError, Result};
use crate::gate::GateThresholds;
use crate::pipeline::PipelineSettings;
use crate::policy::AttemptPolicyTable;

pub const CONFIG_ENV: &str = "DRAFTFIX_CONFIG";
pub const LEDGER_PATH_ENV: &str = "DRAFTFIX_LEDGER_PATH";
pub const MIN_PUBLISH_SCORE_ENV: &str = "DRAFTFIX_MIN_PUBLISH_SCORE";
pub const WORKERS_ENV: &str = "DRAFTFIX_WORKERS";
pub const REWRITE_URL_ENV: &str = "DRAFTFIX_REWRITE_URL";
pub const REWRITE_API_KEY_ENV: &str = "DRAFTFIX_REWRITE_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestorationConfig {
    pub chunk_concurrency: usize,
    pub attempts: AttemptPolicyTable,
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            chunk_concurrency: 2,
            attempts: AttemptPolicyTable::standard(),
        }
    }
}

/// Where published identities are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    File,
    Surreal,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// Line log for the `file` backend.
    pub path: PathBuf,
    /// Connection string for the `surreal` backend (`mem://`, `surrealkv://…`, `ws://…`).
    pub url: String,
    pub identity_includes_date: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::File,
            path: PathBuf::from("published.log"),
            url: "surrealkv://draftfix-ledger".to_string(),
            identity_includes_date: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// OpenAI-compatible rewrite endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Base URL; `/chat/completions` is appended.
    pub url: String,
    pub api_key: Option<String>,
    /// Model tier → model name.
    pub models: BTreeMap<String, String>,
    pub max_tokens: u32,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        let models = [
            ("premium", "gpt-4o"),
            ("standard", "gpt-4o-mini"),
            ("fast", "gpt-4o-mini"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            models,
            max_tokens: 8192,
        }
    }
}

/// Destination for publishable drafts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Write `<slug>.md` files here when no webhook is set.
    pub directory: PathBuf,
    /// POST articles to this URL instead of writing files.
    pub webhook_url: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("published"),
            webhook_url: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub restoration: RestorationConfig,
    pub severity: SeverityThresholds,
    pub gate: GateThresholds,
    pub ledger: LedgerConfig,
    pub batch: BatchConfig,
    pub rewrite: RewriteConfig,
    pub publish: PublishConfig,
}

impl PipelineConfig {
    /// Parse TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| DraftfixError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, or `$DRAFTFIX_CONFIG`, or fall back to defaults; then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    DraftfixError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `DRAFTFIX_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(LEDGER_PATH_ENV) {
            self.ledger.path = PathBuf::from(path);
        }
        if let Some(score) = lookup(MIN_PUBLISH_SCORE_ENV) {
            self.gate.min_publish_score = parse_env(MIN_PUBLISH_SCORE_ENV, &score)?;
        }
        if let Some(workers) = lookup(WORKERS_ENV) {
            self.batch.workers = parse_env(WORKERS_ENV, &workers)?;
        }
        if let Some(url) = lookup(REWRITE_URL_ENV) {
            self.rewrite.url = url;
        }
        if let Some(key) = lookup(REWRITE_API_KEY_ENV) {
            self.rewrite.api_key = Some(key);
        }
        self.validate()
    }

    /// Reject values no pipeline can run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch.workers == 0 {
            return Err(DraftfixError::Config("batch.workers must be at least 1".into()));
        }
        if self.restoration.chunk_concurrency == 0 {
            return Err(DraftfixError::Config(
                "restoration.chunk_concurrency must be at least 1".into(),
            ));
        }
        if self.gate.min_chars > self.gate.max_chars {
            return Err(DraftfixError::Config(format!(
                "gate.min_chars {} exceeds gate.max_chars {}",
                self.gate.min_chars, self.gate.max_chars
            )));
        }
        if self.gate.min_publish_score > 100 {
            return Err(DraftfixError::Config(format!(
                "gate.min_publish_score {} exceeds 100",
                self.gate.min_publish_score
            )));
        }
        Ok(())
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            chunk_concurrency: self.restoration.chunk_concurrency,
            workers: self.batch.workers,
            identity_includes_date: self.ledger.identity_includes_date,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DraftfixError::Config(format!("{key}={value:?}: {e}")))
}
