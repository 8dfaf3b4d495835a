use std::{cmp::Ordering, collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const COUNTRY_PREFIX: &str = "91";
const LOCAL_NUMBER_LEN: usize = 10;

/// Canonical phone-number identifier grouping all messages with one counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(pub String);

impl ConversationKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Applies the country-code rule: a bare 10-digit number gets the "91" prefix.
    pub fn canonicalize(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.starts_with(COUNTRY_PREFIX)
            && raw.len() == LOCAL_NUMBER_LEN
            && raw.bytes().all(|b| b.is_ascii_digit())
        {
            return Self(format!("{COUNTRY_PREFIX}{raw}"));
        }
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable form, `+91 83403 46515` for canonical Indian numbers.
    pub fn display_label(&self) -> String {
        let raw = self.0.as_str();
        if raw.is_empty() {
            return "Unknown".to_string();
        }
        if raw.starts_with(COUNTRY_PREFIX) && raw.len() == 12 && raw.is_ascii() {
            return format!("+{} {} {}", &raw[..2], &raw[2..7], &raw[7..]);
        }
        raw.to_string()
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// ISO-8601 timestamp as delivered by the server.
///
/// Equality and hashing use the raw string (it is part of message identity). Ordering uses
/// the parsed instant; unparsable values sort first, then lexicographically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Timestamp {
    raw: String,
    instant: Option<DateTime<Utc>>,
}

impl Timestamp {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let instant = parse_instant(&raw);
        Self { raw, instant }
    }

    pub fn now() -> Self {
        Self::from_instant(Utc::now())
    }

    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            raw: instant.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            instant: Some(instant),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.instant
    }
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

impl From<String> for Timestamp {
    fn from(value: String) -> Self {
        Self::parse(value)
    }
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.raw
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Timestamp {}

impl std::hash::Hash for Timestamp {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant
            .cmp(&other.instant)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageSource {
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "Human_Intervention", alias = "Agent")]
    Agent,
    #[serde(rename = "User")]
    User,
}

/// One chat line. The derived `Eq`/`Hash` cover exactly the identity tuple
/// `(conversation_key, timestamp, text, source)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "phone_number")]
    pub conversation_key: ConversationKey,
    #[serde(rename = "message")]
    pub text: String,
    pub timestamp: Timestamp,
    pub source: MessageSource,
}

impl Message {
    pub fn new(
        conversation_key: impl Into<String>,
        text: impl Into<String>,
        timestamp: impl Into<String>,
        source: MessageSource,
    ) -> Self {
        Self {
            conversation_key: ConversationKey(conversation_key.into()),
            text: text.into(),
            timestamp: Timestamp::parse(timestamp.into()),
            source,
        }
    }
}

/// Subject profile as returned by `user_info_response`, flattened to strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub conversation_key: ConversationKey,
    pub fields: BTreeMap<String, String>,
}

impl Profile {
    pub const NAME_FIELD: &'static str = "Name";

    pub fn display_name(&self) -> Option<&str> {
        self.fields
            .get(Self::NAME_FIELD)
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
