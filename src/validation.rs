//! Validation rules for member input.
//!
//! Pure checks with no side effects. Each failure maps to a
//! [`ValidationError`] whose message is shown to the user as-is.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::content::model::{ContentType, User};
use crate::error::ValidationError;

/// Every trigger word starts with this character.
pub const TRIGGER_SIGIL: char = '$';

/// Minimum number of characters after the sigil.
const MIN_TRIGGER_BODY_LEN: usize = 2;

/// Optional scheme, then a host ending in a label of at least two letters.
/// Anchored at the start only.
static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((http|https)://)?[a-zA-Z0-9.-]+(\.[a-zA-Z]{2,})").expect("valid url regex")
});

/// Check that `text` looks like a link.
pub fn validate_url(text: &str) -> Result<(), ValidationError> {
    if URL_REGEX.is_match(text) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl)
    }
}

/// Split on commas, trim, drop empties and duplicates, rejoin with commas.
pub fn normalize_tags(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(",")
}

/// Check a candidate trigger word against syntax rules and the words
/// already registered in the channel. The first failing rule wins.
pub fn validate_trigger_word(word: &str, existing: &[String]) -> Result<(), ValidationError> {
    if !word.starts_with(TRIGGER_SIGIL) {
        return Err(ValidationError::MissingSigil {
            sigil: TRIGGER_SIGIL,
        });
    }
    if word.chars().count() - 1 < MIN_TRIGGER_BODY_LEN {
        return Err(ValidationError::TooShort);
    }
    if word.chars().any(char::is_whitespace) {
        return Err(ValidationError::ContainsWhitespace);
    }

    let collides = existing.iter().any(|w| word.contains(w.as_str()))
        || existing.join(",").contains(word);
    if collides {
        return Err(ValidationError::SimilarTrigger {
            existing: existing.to_vec(),
        });
    }

    Ok(())
}

/// Check whether `user` may record a pass right now.
pub fn validate_pass_eligibility(user: &User) -> Result<(), ValidationError> {
    if user.pass_count == 0 {
        return Err(ValidationError::PassExhausted);
    }
    if user.before_type == Some(ContentType::Pass) {
        return Err(ValidationError::ConsecutivePass);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // ── URL ─────────────────────────────────────────────────────────

    #[test]
    fn accepts_urls_with_and_without_scheme() {
        assert!(validate_url("https://blog.example.com/post/1").is_ok());
        assert!(validate_url("http://velog.io/@me").is_ok());
        assert!(validate_url("medium.com/@writer").is_ok());
    }

    #[test]
    fn rejects_non_urls() {
        assert_eq!(validate_url("not a link"), Err(ValidationError::InvalidUrl));
        assert_eq!(validate_url(""), Err(ValidationError::InvalidUrl));
        assert_eq!(validate_url("localhost"), Err(ValidationError::InvalidUrl));
        assert_eq!(validate_url("https://1.2.3"), Err(ValidationError::InvalidUrl));
    }

    // ── Tags ────────────────────────────────────────────────────────

    #[test]
    fn normalize_tags_dedupes_and_trims() {
        let tags = normalize_tags(" rust, tokio ,rust,, ,axum");
        let mut parts: Vec<&str> = tags.split(',').collect();
        parts.sort();
        assert_eq!(parts, vec!["axum", "rust", "tokio"]);
    }

    #[test]
    fn normalize_tags_empty_input() {
        assert_eq!(normalize_tags(""), "");
        assert_eq!(normalize_tags(" , ,"), "");
    }

    #[test]
    fn normalize_tags_is_idempotent() {
        for raw in ["a,b,a", " x , y ,, z", "", "single", "b, a ,c,a,b"] {
            let once = normalize_tags(raw);
            assert_eq!(normalize_tags(&once), once, "input: {raw:?}");
            let parts: Vec<&str> = once.split(',').filter(|p| !p.is_empty()).collect();
            let unique: BTreeSet<&str> = parts.iter().copied().collect();
            assert_eq!(parts.len(), unique.len());
            assert!(!once.split(',').any(|p| p.is_empty()) || once.is_empty());
        }
    }

    // ── Trigger words ───────────────────────────────────────────────

    #[test]
    fn trigger_requires_sigil() {
        assert_eq!(
            validate_trigger_word("hello", &[]),
            Err(ValidationError::MissingSigil { sigil: '$' })
        );
        assert_eq!(
            validate_trigger_word("", &[]),
            Err(ValidationError::MissingSigil { sigil: '$' })
        );
    }

    #[test]
    fn trigger_requires_two_chars_after_sigil() {
        assert_eq!(validate_trigger_word("$", &[]), Err(ValidationError::TooShort));
        assert_eq!(validate_trigger_word("$a", &[]), Err(ValidationError::TooShort));
        assert!(validate_trigger_word("$ab", &[]).is_ok());
    }

    #[test]
    fn trigger_rejects_whitespace() {
        assert_eq!(
            validate_trigger_word("$ab c", &[]),
            Err(ValidationError::ContainsWhitespace)
        );
        assert_eq!(
            validate_trigger_word("$ab\tc", &[]),
            Err(ValidationError::ContainsWhitespace)
        );
    }

    #[test]
    fn trigger_collides_when_existing_is_substring() {
        let err = validate_trigger_word("$memo", &words(&["$me"])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::SimilarTrigger {
                existing: words(&["$me"])
            }
        );
    }

    #[test]
    fn trigger_collides_when_candidate_is_substring() {
        let existing = words(&["$retro", "$memo"]);
        let err = validate_trigger_word("$ret", &existing).unwrap_err();
        assert!(err.to_string().contains("$retro,$memo"));
    }

    #[test]
    fn trigger_equal_to_existing_collides() {
        assert!(validate_trigger_word("$retro", &words(&["$retro"])).is_err());
    }

    #[test]
    fn trigger_accepts_distinct_word() {
        assert!(validate_trigger_word("$retro", &[]).is_ok());
        assert!(validate_trigger_word("$retro", &words(&["$memo", "$log"])).is_ok());
    }

    #[test]
    fn trigger_checks_run_in_order() {
        // Missing sigil is reported even though the word also has whitespace.
        assert!(matches!(
            validate_trigger_word("a b", &[]),
            Err(ValidationError::MissingSigil { .. })
        ));
        // Whitespace is reported before collision.
        assert_eq!(
            validate_trigger_word("$me mo", &words(&["$me"])),
            Err(ValidationError::ContainsWhitespace)
        );
    }

    // ── Pass eligibility ────────────────────────────────────────────

    #[test]
    fn pass_allowed_with_allowance_and_no_prior_pass() {
        let user = User::new("U1", "alice", "C1", 1);
        assert!(validate_pass_eligibility(&user).is_ok());
    }

    #[test]
    fn pass_rejected_when_allowance_exhausted() {
        let user = User::new("U1", "alice", "C1", 0);
        assert_eq!(
            validate_pass_eligibility(&user),
            Err(ValidationError::PassExhausted)
        );
    }

    #[test]
    fn pass_rejected_after_pass() {
        let mut user = User::new("U1", "alice", "C1", 2);
        user.before_type = Some(ContentType::Pass);
        assert_eq!(
            validate_pass_eligibility(&user),
            Err(ValidationError::ConsecutivePass)
        );
    }

    #[test]
    fn allowance_reported_before_consecutive_pass() {
        let mut user = User::new("U1", "alice", "C1", 0);
        user.before_type = Some(ContentType::Pass);
        assert_eq!(
            validate_pass_eligibility(&user),
            Err(ValidationError::PassExhausted)
        );
    }
}
