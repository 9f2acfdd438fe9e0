//! Quality scorer and publish gate.
//!
//! `evaluate` turns a candidate body into a [`QualityVerdict`]: blocking
//! errors, non-blocking warnings and a 0–100 score. A candidate may publish
//! only when no error fired and the score clears `min_publish_score`.
//! Evaluation is pure; the same text and thresholds always produce the same
//! verdict.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analyzer::{IssueAnalyzer, IssueMetrics};
use crate::readability::{self, Readability, TextStats};

/// Gate limits. Every field has a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    pub min_chars: usize,
    pub max_chars: usize,
    /// More markdown markers than this is an error.
    pub markdown_ceiling: usize,
    /// A filler phrase counted more than this is an error.
    pub repetition_ceiling: usize,
    /// More orphaned fragments than this is a warning.
    pub orphan_ceiling: usize,
    pub min_publish_score: u32,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_chars: 500,
            max_chars: 60_000,
            markdown_ceiling: 3,
            repetition_ceiling: 5,
            orphan_ceiling: 2,
            min_publish_score: 70,
        }
    }
}

/// Measurements behind a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictMetrics {
    #[serde(flatten)]
    pub text: TextStats,
    pub issues: IssueMetrics,
}

/// Outcome of gating one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub can_publish: bool,
    pub score: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: VerdictMetrics,
}

impl QualityVerdict {
    /// Human-readable rejection reason, if rejected.
    pub fn rejection_reason(&self) -> Option<String> {
        if self.can_publish {
            return None;
        }
        if let Some(first) = self.errors.first() {
            return Some(first.clone());
        }
        Some(format!("score {} below publish threshold", self.score))
    }
}

/// Analyzer plus thresholds.
#[derive(Debug, Clone)]
pub struct QualityGate {
    analyzer: Arc<IssueAnalyzer>,
    thresholds: GateThresholds,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(Arc::new(IssueAnalyzer::standard()), GateThresholds::default())
    }
}

impl QualityGate {
    pub fn new(analyzer: Arc<IssueAnalyzer>, thresholds: GateThresholds) -> Self {
        Self {
            analyzer,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &GateThresholds {
        &self.thresholds
    }

    /// Score `text` against the thresholds.
    pub fn evaluate(&self, text: &str) -> QualityVerdict {
        let t = &self.thresholds;
        let report = self.analyzer.analyze(text);
        let issues = report.metrics;
        let stats = readability::measure(text);

        let mut score: i64 = 100;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if stats.char_count < t.min_chars {
            errors.push(format!(
                "too short: {} chars (minimum {})",
                stats.char_count, t.min_chars
            ));
            score -= 50;
        }
        if stats.char_count > t.max_chars {
            errors.push(format!(
                "too long: {} chars (maximum {})",
                stats.char_count, t.max_chars
            ));
            score -= 20;
        }
        if issues.metadata_markers > 0 {
            errors.push(format!(
                "{} metadata marker(s) leaked into the body",
                issues.metadata_markers
            ));
            score -= 30;
        }
        if issues.markdown_markers > t.markdown_ceiling {
            errors.push(format!(
                "{} markdown markers (ceiling {})",
                issues.markdown_markers, t.markdown_ceiling
            ));
            score -= 20;
        }

        for filler in &issues.filler_occurrences {
            if filler.count > t.repetition_ceiling {
                let excess = (filler.count - t.repetition_ceiling) as i64;
                errors.push(format!(
                    "phrase \"{}\" repeated {} times (ceiling {})",
                    filler.phrase, filler.count, t.repetition_ceiling
                ));
                score -= 10 + 5 * excess;
            } else {
                warnings.push(format!(
                    "filler phrase \"{}\" used {} time(s)",
                    filler.phrase, filler.count
                ));
                score -= 2;
            }
        }

        if issues.orphaned_fragments > t.orphan_ceiling {
            warnings.push(format!(
                "{} orphaned fragments (ceiling {})",
                issues.orphaned_fragments, t.orphan_ceiling
            ));
            score -= 5;
        }
        if stats.readability == Readability::Poor {
            warnings.push("poor readability".to_string());
            score -= 5;
        }

        let score = score.clamp(0, 100) as u32;
        QualityVerdict {
            can_publish: errors.is_empty() && score >= t.min_publish_score,
            score,
            errors,
            warnings,
            metrics: VerdictMetrics {
                text: stats,
                issues,
            },
        }
    }
}

/// Evaluate with the standard analyzer and default thresholds.
pub fn evaluate(text: &str) -> QualityVerdict {
    QualityGate::default().evaluate(text)
}
