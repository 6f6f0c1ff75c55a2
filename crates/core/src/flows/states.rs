use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Query,
    Analyze,
    KbSearch,
    End,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Tagged result each stage reports alongside the message it appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Found,
    NotFound,
    Complete,
    Error,
    /// The stage did not act and appended nothing.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Transitions keyed on the stage's `StageOutcome`.
    #[default]
    Tagged,
    /// Transitions keyed on substrings of the last transcript message.
    Legacy,
}

impl std::str::FromStr for TransitionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tagged" => Ok(Self::Tagged),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unsupported transition mode `{other}` (expected tagged|legacy)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub outcome: StageOutcome,
}

/// Transcript texts produced by the workflow stages. The legacy transition
/// table matches on their lower-cased prefixes.
pub mod texts {
    pub const SYSTEM_SEED: &str = "Processing ServiceNow incident workflow.";
    pub const INCIDENT_FOUND: &str = "Incident details found";
    pub const INCIDENT_NOT_FOUND: &str = "Incident not found.";
    pub const INCIDENT_QUERY_ERROR: &str = "Error querying incident";
    pub const ANALYSIS_COMPLETE: &str = "Analysis complete";
    pub const ANALYSIS_ERROR: &str = "Error analyzing incident";
    pub const KB_FOUND: &str = "KB articles found";
    pub const KB_NOT_FOUND: &str = "No relevant KB articles found.";
    pub const KB_NO_KEYWORDS: &str = "No keywords found to search with.";
    pub const KB_SEARCH_ERROR: &str = "Error searching KB articles";

    pub(crate) const MATCH_INCIDENT_FOUND: &str = "incident details found";
    pub(crate) const MATCH_ANALYSIS_COMPLETE: &str = "analysis complete";
    pub(crate) const MATCH_KB_FOUND: &str = "kb articles found";
    pub(crate) const MATCH_KB_NOT_FOUND: &str = "no relevant kb articles found";
    pub(crate) const MATCH_ERROR: &str = "error";
}
