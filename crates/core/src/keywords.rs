//! Keyword extraction from free-text incident analysis.
//!
//! The analysis step asks the model to close its answer with a block like:
//!
//! ```text
//! **Searchable keywords for KB article search:**
//!
//! keywords: "usb port", "PC hardware issue"
//! ```
//!
//! Model output is untrusted; a missing block is a normal outcome and yields
//! no keywords.

pub const KEYWORD_DELIMITER: &str = "**Searchable keywords for KB article search:**";

const KEYWORD_LABEL: &str = "keywords:";

#[derive(Clone, Debug, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Ordered keyword list, or empty when no delimiter block is present.
    pub fn extract(&self, analysis_text: &str) -> Vec<String> {
        let Some((_, after_delimiter)) = analysis_text.split_once(KEYWORD_DELIMITER) else {
            return Vec::new();
        };

        let Some(line) = after_delimiter.lines().map(str::trim).find(|line| !line.is_empty())
        else {
            return Vec::new();
        };

        split_keywords(strip_label(line))
    }
}

/// Comma-separated list with optional surrounding quotes per item.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_matches('"').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_label(line: &str) -> &str {
    let prefix_matches = line
        .get(..KEYWORD_LABEL.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(KEYWORD_LABEL));
    if prefix_matches {
        line[KEYWORD_LABEL.len()..].trim()
    } else {
        line
    }
}
