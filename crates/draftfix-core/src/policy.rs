//! Attempt policy table.
//!
//! An ordered list of restoration configurations, strongest first. Each
//! later entry trades a lower fidelity floor (`min_accept_ratio`) for lower
//! cost and latency. The table is read-only once validated and is shared
//! across workers behind an `Arc`.

use serde::{Deserialize, Serialize};

use crate::domain::error::PolicyError;

/// Model tier requested from the rewrite capability (e.g. `"premium"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelTier(pub String);

impl ModelTier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelTier {
    fn from(s: &str) -> Self {
        ModelTier(s.to_string())
    }
}

/// How tightly the rewrite prompt constrains the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStrictness {
    /// Repair artifacts only; change nothing else.
    Strict,
    /// Repair artifacts and smooth the sentences around them.
    Medium,
    /// Repair artifacts, light rewording allowed.
    Soft,
}

impl std::fmt::Display for PromptStrictness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PromptStrictness::Strict => "strict",
            PromptStrictness::Medium => "medium",
            PromptStrictness::Soft => "soft",
        };
        f.write_str(s)
    }
}

/// One row of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationAttemptConfig {
    pub model_tier: ModelTier,
    pub chunk_max_chars: usize,
    /// Minimum `output_len / input_len` for the attempt to be accepted.
    pub min_accept_ratio: f64,
    pub prompt_strictness: PromptStrictness,
    pub timeout_ms: u64,
}

impl RestorationAttemptConfig {
    pub fn new(
        model_tier: impl Into<String>,
        chunk_max_chars: usize,
        min_accept_ratio: f64,
        prompt_strictness: PromptStrictness,
        timeout_ms: u64,
    ) -> Self {
        Self {
            model_tier: ModelTier(model_tier.into()),
            chunk_max_chars,
            min_accept_ratio,
            prompt_strictness,
            timeout_ms,
        }
    }
}

/// Validated, ordered attempt table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttemptPolicyTable {
    attempts: Vec<RestorationAttemptConfig>,
}

impl AttemptPolicyTable {
    /// Validate and wrap `attempts`.
    ///
    /// Rejects an empty table, ratios outside `(0, 1]`, a ratio larger than
    /// its predecessor's, and zero chunk sizes or timeouts.
    pub fn new(attempts: Vec<RestorationAttemptConfig>) -> Result<Self, PolicyError> {
        if attempts.is_empty() {
            return Err(PolicyError::Empty);
        }

        let mut previous: Option<f64> = None;
        for (index, a) in attempts.iter().enumerate() {
            let ratio = a.min_accept_ratio;
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PolicyError::RatioOutOfRange { index, ratio });
            }
            if let Some(previous) = previous {
                if ratio > previous {
                    return Err(PolicyError::RatioIncreases {
                        index,
                        ratio,
                        previous,
                    });
                }
            }
            if a.chunk_max_chars == 0 {
                return Err(PolicyError::ZeroChunkSize { index });
            }
            if a.timeout_ms == 0 {
                return Err(PolicyError::ZeroTimeout { index });
            }
            previous = Some(ratio);
        }

        Ok(Self { attempts })
    }

    /// The five-entry default escalation ladder.
    pub fn standard() -> Self {
        Self {
            attempts: default_attempts(),
        }
    }

    pub fn attempts(&self) -> &[RestorationAttemptConfig] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RestorationAttemptConfig> {
        self.attempts.iter()
    }
}

impl Default for AttemptPolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'de> Deserialize<'de> for AttemptPolicyTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let attempts = Vec::<RestorationAttemptConfig>::deserialize(deserializer)?;
        AttemptPolicyTable::new(attempts).map_err(serde::de::Error::custom)
    }
}

/// Strongest model on large chunks first, then smaller chunks, then cheaper
/// tiers with progressively looser prompts and fidelity floors.
pub fn default_attempts() -> Vec<RestorationAttemptConfig> {
    use PromptStrictness::*;
    vec![
        RestorationAttemptConfig::new("premium", 6000, 0.90, Strict, 120_000),
        RestorationAttemptConfig::new("premium", 3000, 0.85, Strict, 90_000),
        RestorationAttemptConfig::new("standard", 3000, 0.80, Medium, 60_000),
        RestorationAttemptConfig::new("standard", 1500, 0.70, Medium, 45_000),
        RestorationAttemptConfig::new("fast", 1500, 0.60, Soft, 30_000),
    ]
}
