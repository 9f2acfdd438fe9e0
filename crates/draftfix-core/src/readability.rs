//! Structural text statistics and a coarse readability rating.

use serde::{Deserialize, Serialize};

use crate::analyzer::paragraphs;

/// Coarse readability rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readability {
    Poor,
    Good,
    Excellent,
}

impl std::fmt::Display for Readability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Readability::Poor => "poor",
            Readability::Good => "good",
            Readability::Excellent => "excellent",
        };
        f.write_str(s)
    }
}

/// Counts and averages for one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    pub char_count: usize,
    pub word_count: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub avg_sentence_words: f64,
    pub avg_paragraph_sentences: f64,
    /// Share of paragraphs opening with a quotation mark or dash.
    pub dialogue_ratio: f64,
    pub readability: Readability,
}

const DIALOGUE_OPENERS: &[char] = &['"', '\u{201C}', '\u{201E}', '\u{00AB}', '\'', '-', '\u{2013}', '\u{2014}'];

fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Ideal 12–25 words per sentence.
fn sentence_points(avg: f64) -> u32 {
    if (12.0..=25.0).contains(&avg) {
        2
    } else if (8.0..12.0).contains(&avg) || (avg > 25.0 && avg <= 35.0) {
        1
    } else {
        0
    }
}

/// Ideal 2–6 sentences per paragraph.
fn paragraph_points(avg: f64) -> u32 {
    if (2.0..=6.0).contains(&avg) {
        2
    } else if (1.0..2.0).contains(&avg) || (avg > 6.0 && avg <= 10.0) {
        1
    } else {
        0
    }
}

/// Compute [`TextStats`] for `text`.
pub fn measure(text: &str) -> TextStats {
    let paras: Vec<&str> = paragraphs(text).collect();
    let word_count = text.split_whitespace().count();
    let sentence_count: usize = paras.iter().map(|p| sentence_count(p)).sum();
    let dialogue = paras
        .iter()
        .filter(|p| p.starts_with(DIALOGUE_OPENERS))
        .count();

    let avg_sentence_words = ratio(word_count, sentence_count);
    let avg_paragraph_sentences = ratio(sentence_count, paras.len());
    let dialogue_ratio = ratio(dialogue, paras.len());

    let mut points = sentence_points(avg_sentence_words) + paragraph_points(avg_paragraph_sentences);
    if dialogue_ratio >= 0.1 {
        points += 1;
    }
    let readability = match points {
        4.. => Readability::Excellent,
        2..=3 => Readability::Good,
        _ => Readability::Poor,
    };

    TextStats {
        char_count: text.chars().count(),
        word_count,
        sentence_count,
        paragraph_count: paras.len(),
        avg_sentence_words,
        avg_paragraph_sentences,
        dialogue_ratio,
        readability,
    }
}
