//! Built-in artifact detectors.
//!
//! Every detector is an [`IssueRule`]: a pure `text -> descriptors`
//! function. The patterns are deliberately approximate; callers must
//! tolerate false positives.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a descriptor reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    /// A catalogue filler phrase occurring more than once.
    RepeatedPhrase { phrase: String, count: usize },
    /// Bracketed editorial annotation left in the body.
    MetadataMarker,
    /// Bold or heading markup left in the body.
    MarkdownMarker,
    /// Two words with the separating space lost.
    MergedWord,
    /// Paragraph opening with a stray fragment split off the previous one.
    OrphanedFragment,
    /// Reported by a caller-supplied rule.
    Custom { label: String },
}

/// One detected artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDescriptor {
    /// Name of the rule that produced it.
    pub rule: String,
    pub kind: IssueKind,
    /// Matched text, truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl IssueDescriptor {
    fn matched(rule: &str, kind: IssueKind, excerpt: &str) -> Self {
        Self {
            rule: rule.to_string(),
            kind,
            excerpt: Some(truncate(excerpt, 60)),
        }
    }
}

/// A pluggable detector.
pub trait IssueRule: Send + Sync {
    fn name(&self) -> &str;
    fn detect(&self, text: &str) -> Vec<IssueDescriptor>;
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Filler phrases
// ---------------------------------------------------------------------------

/// Over-used discourse fillers.
pub const FILLER_CATALOGUE: &[&str] = &[
    "it is important to note",
    "it's important to note",
    "it is worth noting",
    "it's worth noting",
    "in conclusion",
    "at the end of the day",
    "needless to say",
    "in today's world",
    "in other words",
    "as a matter of fact",
    "all in all",
    "that being said",
    "having said that",
    "when it comes to",
    "first and foremost",
    "last but not least",
    "in a nutshell",
    "it goes without saying",
    "moreover",
    "furthermore",
    "additionally",
];

static FILLER_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    FILLER_CATALOGUE
        .iter()
        .map(|phrase| {
            let body = regex::escape(phrase).replace('\'', "['’]");
            let re = Regex::new(&format!(r"(?i)\b{body}\b"))
                .expect("filler catalogue patterns should compile");
            (*phrase, re)
        })
        .collect()
});

/// Occurrence count of every catalogue phrase present at least once, in
/// catalogue order.
pub fn filler_counts(text: &str) -> Vec<(String, usize)> {
    FILLER_PATTERNS
        .iter()
        .filter_map(|(phrase, re)| {
            let count = re.find_iter(text).count();
            (count > 0).then(|| (phrase.to_string(), count))
        })
        .collect()
}

/// Reports catalogue phrases used more than once.
#[derive(Debug, Default)]
pub struct FillerPhraseRule;

impl IssueRule for FillerPhraseRule {
    fn name(&self) -> &str {
        "filler_phrase"
    }

    fn detect(&self, text: &str) -> Vec<IssueDescriptor> {
        filler_counts(text)
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(phrase, count)| IssueDescriptor {
                rule: self.name().to_string(),
                excerpt: Some(phrase.clone()),
                kind: IssueKind::RepeatedPhrase { phrase, count },
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Metadata leakage
// ---------------------------------------------------------------------------

static METADATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[(?:(?i:editor(?:'s|’s)?\s*note|note|sources?|image|photo|caption|meta(?:data)?|seo|tags?|keywords?|title|category|todo|tbd|insert|placeholder|citation needed|ref|update)\b[^\[\]\n]{0,120}|[A-Z][A-Z0-9 _-]{2,40})\]",
    )
    .expect("METADATA_RE regex should compile")
});

/// Bracketed editorial annotations such as `[Editor's note: ...]` or `[UPDATE]`.
#[derive(Debug, Default)]
pub struct MetadataMarkerRule;

impl IssueRule for MetadataMarkerRule {
    fn name(&self) -> &str {
        "metadata_marker"
    }

    fn detect(&self, text: &str) -> Vec<IssueDescriptor> {
        METADATA_RE
            .find_iter(text)
            .map(|m| IssueDescriptor::matched(self.name(), IssueKind::MetadataMarker, m.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Markdown leakage
// ---------------------------------------------------------------------------

static MARKDOWN_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\*\*[^*\n]+?\*\*").expect("bold regex should compile"),
        Regex::new(r"__[^_\n]+?__").expect("underscore bold regex should compile"),
        Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+\S").expect("heading regex should compile"),
    ]
});

/// Bold (`**x**`, `__x__`) and heading (`# x`) markers.
#[derive(Debug, Default)]
pub struct MarkdownMarkerRule;

impl IssueRule for MarkdownMarkerRule {
    fn name(&self) -> &str {
        "markdown_marker"
    }

    fn detect(&self, text: &str) -> Vec<IssueDescriptor> {
        MARKDOWN_RES
            .iter()
            .flat_map(|re| re.find_iter(text))
            .map(|m| IssueDescriptor::matched(self.name(), IssueKind::MarkdownMarker, m.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Merged words
// ---------------------------------------------------------------------------

static MERGED_RES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        // "end.next" - sentence punctuation glued to the following word
        Regex::new(r"[.!?][a-z]{3,}").expect("glued punctuation regex should compile"),
        // "restorationPipeline" - lowercase word glued to a capitalised one
        Regex::new(r"[a-z]{8,}[A-Z][a-z]{7,}").expect("camel join regex should compile"),
    ]
});

/// Heuristic for words whose separating space was lost.
#[derive(Debug, Default)]
pub struct MergedWordRule;

impl IssueRule for MergedWordRule {
    fn name(&self) -> &str {
        "merged_word"
    }

    fn detect(&self, text: &str) -> Vec<IssueDescriptor> {
        MERGED_RES
            .iter()
            .flat_map(|re| re.find_iter(text))
            .map(|m| IssueDescriptor::matched(self.name(), IssueKind::MergedWord, m.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Orphaned fragments
// ---------------------------------------------------------------------------

static PARAGRAPH_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph split regex should compile"));

static SHORT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]{1,2})\.(?:\s|$)").expect("short token regex should compile")
});

static CONJUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:and|but|yet|nor|because|however|also|then|well|anyway|though|plus)\.(?:\s|$)")
        .expect("conjunction regex should compile")
});

const HONORIFICS: &[&str] = &["mr", "ms", "dr", "st"];

/// Split on blank lines (lines holding only spaces/tabs count as blank).
pub fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Paragraphs that open with `"s. "` or `"And. "` style leftovers.
#[derive(Debug, Default)]
pub struct OrphanedFragmentRule;

impl OrphanedFragmentRule {
    fn is_orphaned(paragraph: &str) -> bool {
        if let Some(caps) = SHORT_TOKEN_RE.captures(paragraph) {
            let token = caps[1].to_ascii_lowercase();
            if !HONORIFICS.contains(&token.as_str()) {
                return true;
            }
        }
        CONJUNCTION_RE.is_match(paragraph)
    }
}

impl IssueRule for OrphanedFragmentRule {
    fn name(&self) -> &str {
        "orphaned_fragment"
    }

    fn detect(&self, text: &str) -> Vec<IssueDescriptor> {
        paragraphs(text)
            .filter(|p| Self::is_orphaned(p))
            .map(|p| IssueDescriptor::matched(self.name(), IssueKind::OrphanedFragment, p))
            .collect()
    }
}
