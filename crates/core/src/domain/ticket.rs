use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder for any field the ticketing record does not carry.
pub const NOT_AVAILABLE: &str = "N/A";

/// Field set requested from the incident table.
pub const INCIDENT_FIELDS: &str = "short_description,description,cmdb_ci,work_notes";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub short_description: String,
    pub description: String,
    pub configuration_item: String,
    pub work_notes: String,
}

impl TicketSummary {
    pub fn from_row(row: &Map<String, Value>) -> Self {
        Self {
            short_description: field_text(row, "short_description"),
            description: field_text(row, "description"),
            configuration_item: field_text(row, "cmdb_ci"),
            work_notes: field_text(row, "work_notes"),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Short Description: {}\nDescription: {}\nConfiguration Item: {}\nWork Notes: {}",
            self.short_description, self.description, self.configuration_item, self.work_notes
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbArticle {
    pub number: String,
    pub title: String,
    pub cause: String,
    pub workaround: String,
}

impl KbArticle {
    pub fn from_row(row: &Map<String, Value>) -> Self {
        Self {
            number: field_text(row, "number"),
            title: field_text(row, "short_description"),
            cause: field_text(row, "kb_cause"),
            workaround: field_text(row, "kb_workaround"),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "\n**KB Article**\n**Number:** {}\n**Title:** {}\n**Cause:** {}\n**WorkAround:** {}",
            self.number, self.title, self.cause, self.workaround
        )
    }
}

pub fn render_articles(articles: &[KbArticle]) -> String {
    articles.iter().map(KbArticle::render).collect::<Vec<_>>().join("\n")
}

/// Reference fields come back as `{"value": .., "display_value": ..}` objects
/// depending on instance settings; prefer the human-readable side.
fn field_text(row: &Map<String, Value>, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(reference)) => reference
            .get("display_value")
            .or_else(|| reference.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(reference.clone()).to_string()),
        Some(other) => other.to_string(),
    }
}
