//! Conversation identity resolution
//!
//! Derives a stable identity key for a set of participant phone numbers
//! despite inconsistent formatting. Six candidate keys of different suffix
//! lengths are kept in parallel so that lookups tolerate historical drift
//! (legacy rows written with shorter keys, country-code prefixes, varying
//! punctuation) while all new writes use the 8-digit no-formatting key.
//!
//! Key derivation must be byte-for-byte deterministic across devices:
//! every device in a multi-device account has to compute the same key for
//! the same participant set or sync diverges.

/// The six candidate matching keys, by suffix length and input cleanup.
///
/// `Raw` variants take the suffix of the fully normalized number; the
/// plain variants only strip hyphens, spaces, and plus signs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Five,
    Seven,
    SevenRaw,
    Eight,
    /// The canonical identity key written to new conversation rows.
    EightRaw,
    Ten,
}

impl MatchKey {
    pub const ALL: [MatchKey; 6] = [
        MatchKey::Five,
        MatchKey::Seven,
        MatchKey::SevenRaw,
        MatchKey::Eight,
        MatchKey::EightRaw,
        MatchKey::Ten,
    ];
}

/// Derived identity keys for one participant set.
///
/// Order-invariant: each length bucket is sorted lexicographically before
/// concatenation, so `["A", "B"]` and `["B", "A"]` yield identical keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKeys {
    five: String,
    seven: String,
    seven_raw: String,
    eight: String,
    eight_raw: String,
    ten: String,
}

impl IdentityKeys {
    /// Build the six candidate keys from a de-duplicated, order-preserving
    /// list of raw participant numbers.
    pub fn from_participants<S: AsRef<str>>(participants: &[S]) -> Self {
        let mut five = Vec::with_capacity(participants.len());
        let mut seven = Vec::with_capacity(participants.len());
        let mut seven_raw = Vec::with_capacity(participants.len());
        let mut eight = Vec::with_capacity(participants.len());
        let mut eight_raw = Vec::with_capacity(participants.len());
        let mut ten = Vec::with_capacity(participants.len());

        for participant in participants {
            let stripped = strip_formatting(participant.as_ref());
            let normalized = normalize(participant.as_ref());

            five.push(tail(&stripped, 5).to_string());
            seven.push(tail(&stripped, 7).to_string());
            eight.push(tail(&stripped, 8).to_string());
            ten.push(tail(&stripped, 10).to_string());
            seven_raw.push(tail(&normalized, 7).to_string());
            eight_raw.push(tail(&normalized, 8).to_string());
        }

        Self {
            five: sort_and_join(five),
            seven: sort_and_join(seven),
            seven_raw: sort_and_join(seven_raw),
            eight: sort_and_join(eight),
            eight_raw: sort_and_join(eight_raw),
            ten: sort_and_join(ten),
        }
    }

    /// Build keys for a single number (blacklist comparisons).
    pub fn from_single(number: &str) -> Self {
        Self::from_participants(&[number])
    }

    /// The canonical key written to a conversation's `id_matcher` column.
    pub fn default_key(&self) -> &str {
        &self.eight_raw
    }

    pub fn get(&self, key: MatchKey) -> &str {
        match key {
            MatchKey::Five => &self.five,
            MatchKey::Seven => &self.seven,
            MatchKey::SevenRaw => &self.seven_raw,
            MatchKey::Eight => &self.eight,
            MatchKey::EightRaw => &self.eight_raw,
            MatchKey::Ten => &self.ten,
        }
    }

    /// All six keys, for "match any key" lookups.
    pub fn all(&self) -> [&str; 6] {
        [
            &self.five,
            &self.seven,
            &self.seven_raw,
            &self.eight,
            &self.eight_raw,
            &self.ten,
        ]
    }
}

/// Canonicalize a phone/email identifier for comparison and identity input.
///
/// Inputs containing any alphabetic character are returned unchanged
/// (emails and lettered sender IDs). Otherwise everything except ASCII
/// digits and a single leading `+` is stripped.
pub fn normalize(raw: &str) -> String {
    if raw.chars().any(char::is_alphabetic) {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            out.push(c);
        }
    }
    out
}

/// Remove hyphens, spaces, and plus signs only.
///
/// Deliberately weaker than [`normalize`]: parentheses and other
/// punctuation survive, matching the legacy key derivation exactly.
pub fn strip_formatting(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '-' | ' ' | '+')).collect()
}

/// Split a raw `", "`-separated participant list into a de-duplicated,
/// order-preserving vector.
///
/// Malformed input never errors: an empty or unparseable string degrades
/// to a single literal participant so the identity key still derives.
pub fn parse_participants(raw: &str) -> Vec<String> {
    let mut participants = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if !participants.iter().any(|existing| existing == part) {
            participants.push(part.to_string());
        }
    }

    if participants.is_empty() {
        participants.push(raw.to_string());
    }

    participants
}

/// Join participants back into the stored `phone_numbers` column format.
pub fn join_participants(participants: &[String]) -> String {
    participants.join(", ")
}

/// Trailing `len` characters of `value`.
///
/// Values containing `@` (email addresses) and values shorter than `len`
/// pass through unchanged. The short-value passthrough means 3-4 digit
/// service codes match on their full value and can collide with unrelated
/// conversations; that behavior is load-bearing for legacy data and is
/// kept as-is.
fn tail(value: &str, len: usize) -> &str {
    if value.contains('@') {
        return value;
    }

    let char_count = value.chars().count();
    if char_count <= len {
        return value;
    }

    let (idx, _) = value
        .char_indices()
        .nth(char_count - len)
        .unwrap_or((0, '\0'));
    &value[idx..]
}

fn sort_and_join(mut parts: Vec<String>) -> String {
    parts.sort_unstable();
    parts.concat()
}
