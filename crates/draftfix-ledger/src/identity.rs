//! Identity derivation.
//!
//! Two drafts share an identity when their titles normalize to the same
//! string (and, when a date is supplied, they share that date). The identity
//! is the SHA-256 of the normalized key, so it is safe to persist in a
//! line-oriented log.

use chrono::NaiveDate;

use crate::storage_traits::{ContentDigest, Identity};

/// Lowercase, drop everything that is not alphanumeric or whitespace, and
/// collapse whitespace runs to single spaces.
pub fn normalize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable identity for a title, optionally scoped to a publication date.
pub fn identity_of(title: &str, date: Option<NaiveDate>) -> Identity {
    let mut key = normalize_title(title);
    if let Some(date) = date {
        key.push('|');
        key.push_str(&date.format("%Y-%m-%d").to_string());
    }
    Identity(ContentDigest::from_bytes(key.as_bytes()).as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_punctuation_and_spacing() {
        assert_eq!(
            normalize_title("  Hello,   World!  "),
            normalize_title("hello world")
        );
        assert_eq!(normalize_title("Rust's  Borrow\tChecker"), "rusts borrow checker");
    }

    #[test]
    fn identity_is_stable_for_equivalent_titles() {
        let a = identity_of("Breaking: Market Rallies", None);
        let b = identity_of("breaking market rallies", None);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn date_scopes_identity() {
        let d1 = NaiveDate::from_ymd_opt(2026, 1, 2);
        let d2 = NaiveDate::from_ymd_opt(2026, 1, 3);
        let plain = identity_of("Weekly Digest", None);
        let first = identity_of("Weekly Digest", d1);
        let second = identity_of("Weekly Digest", d2);
        assert_ne!(plain, first);
        assert_ne!(first, second);
        assert_eq!(first, identity_of("weekly digest", d1));
    }

    #[test]
    fn non_ascii_titles_keep_letters() {
        assert_eq!(normalize_title("Café Über"), "café über");
    }
}
