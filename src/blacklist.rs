//! Blacklist matching
//!
//! Pure predicates deciding whether an inbound message is suppressed.
//! Matching runs before any conversation or message mutation, so a
//! blocked message touches no store state.

use crate::data::BlacklistEntry;
use crate::identity::{IdentityKeys, MatchKey, normalize};

/// Whether two phone numbers identify the same endpoint.
///
/// Exact string equality short-circuits true, which is what lets
/// lettered sender IDs ("GOOGLE") match at all. Otherwise both numbers
/// are normalized and compared through the identity-key bucket selected
/// by the *shorter* number's length; numbers shorter than five digits
/// never match unless literally equal.
pub fn numbers_match(left: &str, right: &str) -> bool {
    if left == right {
        return true;
    }

    let left_normalized = normalize(left);
    let right_normalized = normalize(right);
    if left_normalized == right_normalized {
        return true;
    }

    let min_len = left_normalized
        .chars()
        .count()
        .min(right_normalized.chars().count());
    let key = if min_len >= 10 {
        MatchKey::Ten
    } else if min_len >= 8 {
        MatchKey::EightRaw
    } else if min_len >= 7 {
        MatchKey::SevenRaw
    } else if min_len >= 5 {
        MatchKey::Five
    } else {
        return false;
    };

    let left_keys = IdentityKeys::from_single(&left_normalized);
    let right_keys = IdentityKeys::from_single(&right_normalized);
    left_keys.get(key) == right_keys.get(key)
}

/// Case-insensitive phrase containment.
pub fn phrase_matches(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    text.to_lowercase().contains(&phrase.to_lowercase())
}

/// Whether any entry blocks this (number, body) pair.
///
/// Number and phrase rules are independent (OR semantics), both across
/// entries and within one entry.
pub fn is_blocked(entries: &[BlacklistEntry], number: &str, text: Option<&str>) -> bool {
    for entry in entries {
        if let Some(blocked_number) = &entry.phone_number {
            if numbers_match(number, blocked_number) {
                return true;
            }
        }

        if let (Some(phrase), Some(text)) = (&entry.phrase, text) {
            if phrase_matches(text, phrase) {
                return true;
            }
        }
    }

    false
}
