//! Issue analyzer.
//!
//! Runs a rule set over a body and folds the descriptors into an
//! [`IssueReport`]: per-kind counters plus a severity grade. The analyzer
//! is pure and deterministic; it never fails and performs no I/O.
//!
//! Reports are derived values. Recompute them whenever the text changes.

pub mod rules;

use serde::{Deserialize, Serialize};

pub use rules::{
    filler_counts, paragraphs, FillerPhraseRule, IssueDescriptor, IssueKind, IssueRule,
    MarkdownMarkerRule, MergedWordRule, MetadataMarkerRule, OrphanedFragmentRule,
    FILLER_CATALOGUE,
};

/// Severity grade of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A phrase and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseCount {
    pub phrase: String,
    pub count: usize,
}

/// Counters extracted from a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetrics {
    /// Catalogue phrases occurring more than once.
    pub repeated_phrases: Vec<PhraseCount>,
    /// Every catalogue phrase occurring at least once.
    pub filler_occurrences: Vec<PhraseCount>,
    pub metadata_markers: usize,
    pub markdown_markers: usize,
    pub merged_word_candidates: usize,
    pub orphaned_fragments: usize,
}

impl IssueMetrics {
    /// Highest count among repeated phrases (0 when none repeat).
    pub fn max_phrase_repeats(&self) -> usize {
        self.repeated_phrases
            .iter()
            .map(|p| p.count)
            .max()
            .unwrap_or(0)
    }
}

/// Outcome of analysing one body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReport {
    pub has_issues: bool,
    pub issues: Vec<IssueDescriptor>,
    pub severity: Severity,
    pub metrics: IssueMetrics,
}

/// Thresholds that promote a report to `critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    /// More markdown markers than this is critical.
    pub markdown_markers: usize,
    /// Any filler phrase counted more than this is critical.
    pub phrase_repeats: usize,
    /// More orphaned fragments than this is critical.
    pub orphaned_fragments: usize,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            markdown_markers: 3,
            phrase_repeats: 5,
            orphaned_fragments: 2,
        }
    }
}

/// Rule-set driven analyzer.
pub struct IssueAnalyzer {
    rules: Vec<Box<dyn IssueRule>>,
    thresholds: SeverityThresholds,
}

impl std::fmt::Debug for IssueAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueAnalyzer")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl Default for IssueAnalyzer {
    fn default() -> Self {
        Self::standard()
    }
}

impl IssueAnalyzer {
    /// The five built-in detectors with default thresholds.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Box::new(FillerPhraseRule),
                Box::new(MetadataMarkerRule),
                Box::new(MarkdownMarkerRule),
                Box::new(MergedWordRule),
                Box::new(OrphanedFragmentRule),
            ],
            thresholds: SeverityThresholds::default(),
        }
    }

    /// Append a detector.
    pub fn with_rule(mut self, rule: impl IssueRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn with_thresholds(mut self, thresholds: SeverityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Analyse `text`.
    pub fn analyze(&self, text: &str) -> IssueReport {
        let issues: Vec<IssueDescriptor> =
            self.rules.iter().flat_map(|r| r.detect(text)).collect();

        let mut metrics = IssueMetrics {
            filler_occurrences: filler_counts(text)
                .into_iter()
                .map(|(phrase, count)| PhraseCount { phrase, count })
                .collect(),
            ..IssueMetrics::default()
        };
        for issue in &issues {
            match &issue.kind {
                IssueKind::RepeatedPhrase { phrase, count } => {
                    metrics.repeated_phrases.push(PhraseCount {
                        phrase: phrase.clone(),
                        count: *count,
                    })
                }
                IssueKind::MetadataMarker => metrics.metadata_markers += 1,
                IssueKind::MarkdownMarker => metrics.markdown_markers += 1,
                IssueKind::MergedWord => metrics.merged_word_candidates += 1,
                IssueKind::OrphanedFragment => metrics.orphaned_fragments += 1,
                IssueKind::Custom { .. } => {}
            }
        }

        IssueReport {
            has_issues: !issues.is_empty(),
            severity: grade(&metrics, &self.thresholds),
            issues,
            metrics,
        }
    }
}

fn grade(m: &IssueMetrics, t: &SeverityThresholds) -> Severity {
    if m.metadata_markers > 0
        || m.markdown_markers > t.markdown_markers
        || m.max_phrase_repeats() > t.phrase_repeats
        || m.orphaned_fragments > t.orphaned_fragments
    {
        Severity::Critical
    } else if !m.repeated_phrases.is_empty() || m.orphaned_fragments > 0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Analyse with the standard rule set.
pub fn analyze(text: &str) -> IssueReport {
    IssueAnalyzer::standard().analyze(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_clean_and_low() {
        let report = analyze("");
        assert!(!report.has_issues);
        assert!(report.issues.is_empty());
        assert_eq!(report.severity, Severity::Low);
        assert_eq!(report.metrics, IssueMetrics::default());
    }

    #[test]
    fn any_metadata_marker_is_critical() {
        let report = analyze("Body text [Source: wire] continues here.");
        assert_eq!(report.metrics.metadata_markers, 1);
        assert_eq!(report.severity, Severity::Critical);
    }

    #[test]
    fn markdown_threshold_is_exclusive() {
        let three = "**a** **b** **c** plain";
        assert_eq!(analyze(three).severity, Severity::Low);
        let four = "**a** **b** **c** **d** plain";
        assert_eq!(analyze(four).severity, Severity::Critical);
    }

    #[test]
    fn filler_repetition_grades() {
        let twice = "Moreover, one. Moreover, two.";
        assert_eq!(analyze(twice).severity, Severity::Medium);

        let six = "Moreover, x. ".repeat(6);
        let report = analyze(&six);
        assert_eq!(report.severity, Severity::Critical);
        assert_eq!(
            report.metrics.repeated_phrases,
            vec![PhraseCount {
                phrase: "moreover".to_string(),
                count: 6
            }]
        );
    }

    #[test]
    fn orphan_grades() {
        let one = "Good start.\n\ns. Fragment here.";
        assert_eq!(analyze(one).severity, Severity::Medium);
        let three = "Start.\n\ns. one.\n\nt. two.\n\nAnd. three.";
        let report = analyze(three);
        assert_eq!(report.metrics.orphaned_fragments, 3);
        assert_eq!(report.severity, Severity::Critical);
    }

    #[test]
    fn merged_words_alone_stay_low_but_flag_issues() {
        let report = analyze("It ended.then we left.");
        assert!(report.has_issues);
        assert_eq!(report.metrics.merged_word_candidates, 1);
        assert_eq!(report.severity, Severity::Low);
    }

    struct ShoutingRule;

    impl IssueRule for ShoutingRule {
        fn name(&self) -> &str {
            "shouting"
        }

        fn detect(&self, text: &str) -> Vec<IssueDescriptor> {
            text.matches("!!!")
                .map(|m| IssueDescriptor {
                    rule: "shouting".to_string(),
                    kind: IssueKind::Custom {
                        label: "exclamation run".to_string(),
                    },
                    excerpt: Some(m.to_string()),
                })
                .collect()
        }
    }

    #[test]
    fn custom_rules_flag_issues_without_changing_severity() {
        let analyzer = IssueAnalyzer::standard().with_rule(ShoutingRule);
        assert!(analyzer.rule_names().contains(&"shouting"));
        let report = analyzer.analyze("Wow!!! Great");
        assert!(report.has_issues);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.severity, Severity::Low);
    }

    #[test]
    fn analysis_is_deterministic() {
        let text = "Moreover, a [TODO] b. **x**\n\ns. frag.\n\nMoreover, c.";
        assert_eq!(analyze(text), analyze(text));
    }
}
