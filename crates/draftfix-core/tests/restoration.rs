use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use draftfix_core::{
    analyze, evaluate, AttemptExecutor, AttemptPolicyTable, CancelSignal, EscalationOrchestrator,
    IssueAnalyzer, ModelTier, PhraseCount, PromptStrictness, RestorationAttemptConfig,
    RewriteCapability, RewriteError, Severity,
};

const CLEAN_PARAGRAPHS: [&str; 4] = [
    "The harbour board met on Tuesday to review the plans for the new ferry terminal and its car park. \
Members asked for a second traffic survey before any contract is signed with the builders. \
The chair said the vote would be held at the next public meeting in the town hall. \
Residents who live near the quay will be able to comment on the proposal until the end of the month.",
    "Local shops along the front have mixed views about the project and the noise it could bring. \
Some owners expect more visitors during the summer season once the larger boats start to call. \
Others worry that two years of building work will keep their regular customers away from the harbour. \
A group of traders has written to the council asking for help with rates while the work goes on.",
    "The ferry company says the current pier is too short for the vessels it plans to use from next spring. \
Its engineers have produced drawings that show a longer berth with covered walkways for foot passengers. \
A spokesman said the firm would pay for most of the marine works if the council agreed to the scheme. \
He added that timetables would not change while the old pier stays in service.",
    "Fishing crews who use the inner basin have asked for their moorings to be protected during the work. \
The harbour master told the meeting that a temporary pontoon could be placed near the slipway. \
He said the crews would be consulted on the location before any final decision was made. \
The board agreed to publish a full timetable for the project once the survey results are known.",
];

/// Artifact-free article of at least `min_chars` characters.
fn clean_article(min_chars: usize) -> String {
    let mut paragraphs = Vec::new();
    let mut chars = 0;
    for p in CLEAN_PARAGRAPHS.iter().cycle() {
        if chars >= min_chars {
            break;
        }
        chars += p.chars().count() + 2;
        paragraphs.push(*p);
    }
    paragraphs.join("\n\n")
}

/// Two clean paragraphs followed by "moreover" seven times.
fn filler_article() -> String {
    let days = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
    let lines: Vec<String> = days
        .iter()
        .map(|d| format!("Moreover, the ferry ran late on {d}."))
        .collect();
    format!(
        "{}\n\n{}\n\n{}\n\n{}",
        CLEAN_PARAGRAPHS[0],
        CLEAN_PARAGRAPHS[1],
        lines[..4].join(" "),
        lines[4..].join(" ")
    )
}

/// Never called; fails the test if it is.
struct Untouchable;

#[async_trait]
impl RewriteCapability for Untouchable {
    async fn rewrite(
        &self,
        _tier: &ModelTier,
        _strictness: PromptStrictness,
        _chunk: &str,
    ) -> Result<String, RewriteError> {
        panic!("clean text must not reach the rewriter");
    }
}

/// Keeps the first "Moreover, the" in a chunk and rewrites the rest to "The".
struct DropRepeatedFiller;

#[async_trait]
impl RewriteCapability for DropRepeatedFiller {
    async fn rewrite(
        &self,
        _tier: &ModelTier,
        _strictness: PromptStrictness,
        chunk: &str,
    ) -> Result<String, RewriteError> {
        const FILLER: &str = "Moreover, the";
        let mut out = String::new();
        let mut rest = chunk;
        let mut seen = false;
        while let Some(pos) = rest.find(FILLER) {
            out.push_str(&rest[..pos]);
            out.push_str(if seen { "The" } else { FILLER });
            seen = true;
            rest = &rest[pos + FILLER.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Keeps the first `percent`% of each chunk and counts calls.
struct Truncate {
    percent: usize,
    calls: AtomicUsize,
}

impl Truncate {
    fn new(percent: usize) -> Self {
        Self {
            percent,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RewriteCapability for Truncate {
    async fn rewrite(
        &self,
        _tier: &ModelTier,
        _strictness: PromptStrictness,
        chunk: &str,
    ) -> Result<String, RewriteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let keep = chunk.chars().count() * self.percent / 100;
        Ok(chunk.chars().take(keep).collect())
    }
}

struct AlwaysFails;

#[async_trait]
impl RewriteCapability for AlwaysFails {
    async fn rewrite(
        &self,
        tier: &ModelTier,
        _strictness: PromptStrictness,
        _chunk: &str,
    ) -> Result<String, RewriteError> {
        Err(RewriteError::Upstream(format!("{tier} is down")))
    }
}

fn standard_orchestrator(rewriter: Arc<dyn RewriteCapability>) -> EscalationOrchestrator {
    EscalationOrchestrator::new(
        Arc::new(AttemptPolicyTable::standard()),
        AttemptExecutor::new(rewriter, 2),
        Arc::new(IssueAnalyzer::standard()),
    )
}

#[tokio::test]
async fn scenario_clean_article_skips_restoration_and_scores_full() {
    let text = clean_article(9_000);
    assert!(text.chars().count() >= 9_000);

    let report = analyze(&text);
    assert!(!report.has_issues, "{:?}", report.issues);
    assert_eq!(report.severity, Severity::Low);

    let (_, restored) = standard_orchestrator(Arc::new(Untouchable))
        .restore_if_needed(&text, &CancelSignal::never())
        .await;
    assert!(restored.skipped);
    assert!(!restored.used_fallback);
    assert_eq!(restored.final_text, text);

    let verdict = evaluate(&restored.final_text);
    assert!(verdict.can_publish);
    assert_eq!(verdict.score, 100);
    assert!(verdict.errors.is_empty());
    assert!(verdict.warnings.is_empty());
}

#[tokio::test]
async fn scenario_repeated_filler_is_repaired_to_a_warning() {
    let text = filler_article();

    let report = analyze(&text);
    assert_eq!(report.severity, Severity::Critical);
    assert_eq!(
        report.metrics.repeated_phrases,
        vec![PhraseCount {
            phrase: "moreover".to_string(),
            count: 7
        }]
    );
    assert!(!evaluate(&text).can_publish);

    let (_, restored) = standard_orchestrator(Arc::new(DropRepeatedFiller))
        .restore_if_needed(&text, &CancelSignal::never())
        .await;
    assert_eq!(restored.accepted_attempt(), Some(0));
    assert!(!restored.used_fallback);

    let after = analyze(&restored.final_text);
    assert!(after.metrics.repeated_phrases.is_empty());
    assert_eq!(after.metrics.filler_occurrences[0].count, 1);

    let verdict = evaluate(&restored.final_text);
    assert!(verdict.can_publish, "{:?}", verdict.errors);
    assert!(verdict.errors.is_empty());
    assert_eq!(verdict.warnings.len(), 1);
    assert_eq!(verdict.score, 98);
}

#[tokio::test]
async fn scenario_truncating_rewriter_exhausts_the_table() {
    let text = filler_article();
    let stub = Arc::new(Truncate::new(40));

    let (_, restored) = standard_orchestrator(stub.clone())
        .restore_if_needed(&text, &CancelSignal::never())
        .await;

    assert!(restored.used_fallback);
    assert_eq!(restored.final_text, text);
    assert_eq!(restored.outcomes.len(), 5);
    for (i, outcome) in restored.outcomes.iter().enumerate() {
        assert_eq!(outcome.attempt_index, i);
        assert!(!outcome.success);
        assert!(outcome.ratio < 0.6);
        assert_eq!(
            outcome.error.as_ref().map(|e| e.to_string()).as_deref(),
            Some("ratio below threshold")
        );
    }
    // one chunk per attempt at this size
    assert_eq!(stub.calls.load(Ordering::SeqCst), 5);

    let verdict = evaluate(&restored.final_text);
    assert!(!verdict.can_publish);
}

#[tokio::test]
async fn always_failing_rewriter_returns_original_bytes() {
    let texts = [
        filler_article(),
        format!("{}\n\n\n\n[TODO] trailing\n\n", CLEAN_PARAGRAPHS[2]),
        "s. orphan\n\nAnd. another".to_string(),
    ];
    for text in texts {
        let result = standard_orchestrator(Arc::new(AlwaysFails))
            .restore(&text, &CancelSignal::never())
            .await;
        assert!(result.used_fallback);
        assert_eq!(result.final_text.as_bytes(), text.as_bytes());
        assert_eq!(result.outcomes.len(), 5);
        assert!(result.outcomes.iter().all(|o| o.result_text.is_none()));
    }
}

#[tokio::test]
async fn acceptance_never_admits_output_below_ratio() {
    let text = clean_article(2_000);
    for min_ratio in [0.5, 0.7, 0.9] {
        for percent in [30, 49, 50, 69, 70, 85, 89, 90, 100] {
            let config = RestorationAttemptConfig::new(
                "t",
                100_000,
                min_ratio,
                PromptStrictness::Strict,
                5_000,
            );
            let exec = AttemptExecutor::new(Arc::new(Truncate::new(percent)), 1);
            let outcome = exec.run_attempt(0, &text, &config).await;

            assert_eq!(outcome.success, outcome.ratio >= min_ratio);
            if (percent as f64) / 100.0 < min_ratio {
                assert!(!outcome.success, "ratio {min_ratio} percent {percent}");
            }
            if let Some(out) = outcome.result_text {
                assert!(
                    out.chars().count() as f64 >= min_ratio * text.chars().count() as f64
                );
            }
        }
    }
}

#[test]
fn single_filler_six_times_is_critical_and_blocks() {
    let six: Vec<String> = (1..=6)
        .map(|i| format!("Furthermore, the council met on day {i}."))
        .collect();
    let text = format!(
        "{}\n\n{}\n\n{}",
        CLEAN_PARAGRAPHS[0],
        CLEAN_PARAGRAPHS[3],
        six.join(" ")
    );
    let report = analyze(&text);
    assert_eq!(report.severity, Severity::Critical);

    let verdict = evaluate(&text);
    assert!(!verdict.can_publish);
    assert!(verdict
        .errors
        .iter()
        .any(|e| e.contains("\"furthermore\" repeated 6 times")));
}

#[test]
fn gate_is_deterministic_across_inputs() {
    let inputs = [
        clean_article(1_000),
        filler_article(),
        "short".to_string(),
        String::new(),
        "**bold** # not heading\n# Heading\n\n[SOURCE] x".to_string(),
    ];
    for text in &inputs {
        assert_eq!(evaluate(text), evaluate(text));
        assert_eq!(analyze(text), analyze(text));
    }
}
