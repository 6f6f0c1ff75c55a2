use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Ticket identifier of the form `INC` followed by digits, stored upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IncidentNumber(String);

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bINC\d+\b").expect("static incident pattern compiles"))
}

fn exact_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^INC\d+$").expect("static incident pattern compiles"))
}

impl IncidentNumber {
    /// Accepts a bare identifier (surrounding whitespace ignored).
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        exact_pattern().is_match(trimmed).then(|| Self(trimmed.to_ascii_uppercase()))
    }

    /// First identifier token appearing anywhere in free text.
    pub fn find_in(text: &str) -> Option<Self> {
        token_pattern().find(text).map(|found| Self(found.as_str().to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for IncidentNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("`{value}` is not an incident number"))
    }
}

impl From<IncidentNumber> for String {
    fn from(value: IncidentNumber) -> Self {
        value.0
    }
}

impl fmt::Display for IncidentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::IncidentNumber;

    #[test]
    fn finds_first_token_in_free_text() {
        let found = IncidentNumber::find_in("Process incident INC0000059 and INC0000060 please");
        assert_eq!(found, Some(IncidentNumber("INC0000059".to_string())));
    }

    #[test]
    fn token_match_is_case_insensitive_and_normalized() {
        let found = IncidentNumber::find_in("what is the status of incident inc0000123?");
        assert_eq!(found.as_ref().map(IncidentNumber::as_str), Some("INC0000123"));
    }

    #[test]
    fn ignores_prefix_without_digits_or_embedded_tokens() {
        assert_eq!(IncidentNumber::find_in("INCIDENT report"), None);
        assert_eq!(IncidentNumber::find_in("XINC0001"), None);
        assert_eq!(IncidentNumber::find_in("hello there"), None);
    }

    #[test]
    fn parse_requires_whole_value() {
        assert!(IncidentNumber::parse(" INC0000123 ").is_some());
        assert!(IncidentNumber::parse("INC0000123 extra").is_none());
        assert!(IncidentNumber::parse("INC").is_none());
    }

    #[test]
    fn deserialization_validates_and_normalizes() {
        let parsed: IncidentNumber = serde_json::from_str(r#""inc0000059""#).expect("valid number");
        assert_eq!(parsed.into_inner(), "INC0000059");

        assert!(serde_json::from_str::<IncidentNumber>(r#""CHG0000059""#).is_err());
        assert!(serde_json::from_str::<IncidentNumber>(r#""INC12 ; drop""#).is_err());
    }
}
