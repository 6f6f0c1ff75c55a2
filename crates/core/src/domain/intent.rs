use serde::{Deserialize, Serialize};

use crate::domain::incident::IncidentNumber;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Incident,
    KbSearch,
    Conversation,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::KbSearch => "kb_search",
            Self::Conversation => "conversation",
        }
    }
}

/// Routing payload; exactly one parameter exists per action type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Incident { incident_number: IncidentNumber },
    KbSearch { search_keywords: String },
    Conversation { conversation_context: String },
}

/// Classified purpose of one user input.
///
/// `confidence` is carried for display and logging only; routing never
/// branches on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntentWire", into = "IntentWire")]
pub struct IntentRecord {
    pub intent: Intent,
    pub confidence: f32,
}

pub const FALLBACK_CONVERSATION_CONTEXT: &str = "error handling";

impl IntentRecord {
    pub fn incident(incident_number: IncidentNumber, confidence: f32) -> Self {
        Self { intent: Intent::Incident { incident_number }, confidence: clamp(confidence) }
    }

    pub fn kb_search(search_keywords: impl Into<String>, confidence: f32) -> Self {
        Self {
            intent: Intent::KbSearch { search_keywords: search_keywords.into() },
            confidence: clamp(confidence),
        }
    }

    pub fn conversation(conversation_context: impl Into<String>, confidence: f32) -> Self {
        Self {
            intent: Intent::Conversation { conversation_context: conversation_context.into() },
            confidence: clamp(confidence),
        }
    }

    /// Record returned whenever classification cannot produce a trusted answer.
    pub fn fallback() -> Self {
        Self::conversation(FALLBACK_CONVERSATION_CONTEXT, 1.0)
    }

    pub fn action_type(&self) -> ActionType {
        match self.intent {
            Intent::Incident { .. } => ActionType::Incident,
            Intent::KbSearch { .. } => ActionType::KbSearch,
            Intent::Conversation { .. } => ActionType::Conversation,
        }
    }

    pub fn incident_number(&self) -> Option<&IncidentNumber> {
        match &self.intent {
            Intent::Incident { incident_number } => Some(incident_number),
            _ => None,
        }
    }

    pub fn search_keywords(&self) -> Option<&str> {
        match &self.intent {
            Intent::KbSearch { search_keywords } => Some(search_keywords),
            _ => None,
        }
    }

    pub fn conversation_context(&self) -> Option<&str> {
        match &self.intent {
            Intent::Conversation { conversation_context } => Some(conversation_context),
            _ => None,
        }
    }
}

fn clamp(confidence: f32) -> f32 {
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

/// Flat five-field shape used in model output and API payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentWire {
    pub action_type: ActionType,
    #[serde(default)]
    pub incident_number: Option<String>,
    #[serde(default)]
    pub search_keywords: Option<String>,
    #[serde(default)]
    pub conversation_context: Option<String>,
    pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IntentShapeError {
    #[error("incident intent is missing a valid incident_number (got {0:?})")]
    InvalidIncidentNumber(Option<String>),
    #[error("kb_search intent is missing search_keywords")]
    MissingSearchKeywords,
    #[error("confidence {0} is outside 0.0..=1.0")]
    ConfidenceOutOfRange(String),
}

impl TryFrom<IntentWire> for IntentRecord {
    type Error = IntentShapeError;

    fn try_from(wire: IntentWire) -> Result<Self, Self::Error> {
        if !(0.0..=1.0).contains(&wire.confidence) {
            return Err(IntentShapeError::ConfidenceOutOfRange(wire.confidence.to_string()));
        }

        match wire.action_type {
            ActionType::Incident => {
                let incident_number = wire
                    .incident_number
                    .as_deref()
                    .and_then(IncidentNumber::parse)
                    .ok_or(IntentShapeError::InvalidIncidentNumber(wire.incident_number))?;
                Ok(Self::incident(incident_number, wire.confidence))
            }
            ActionType::KbSearch => {
                let search_keywords = wire
                    .search_keywords
                    .filter(|keywords| !keywords.trim().is_empty())
                    .ok_or(IntentShapeError::MissingSearchKeywords)?;
                Ok(Self::kb_search(search_keywords.trim(), wire.confidence))
            }
            ActionType::Conversation => Ok(Self::conversation(
                wire.conversation_context.unwrap_or_default(),
                wire.confidence,
            )),
        }
    }
}

impl From<IntentRecord> for IntentWire {
    fn from(record: IntentRecord) -> Self {
        let action_type = record.action_type();
        let mut wire = IntentWire {
            action_type,
            incident_number: None,
            search_keywords: None,
            conversation_context: None,
            confidence: record.confidence,
        };
        match record.intent {
            Intent::Incident { incident_number } => wire.incident_number = Some(incident_number.into_inner()),
            Intent::KbSearch { search_keywords } => wire.search_keywords = Some(search_keywords),
            Intent::Conversation { conversation_context } => {
                wire.conversation_context = Some(conversation_context)
            }
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionType, IntentRecord, IntentShapeError, IntentWire};

    #[test]
    fn incident_wire_keeps_only_the_matching_field() {
        let record = IntentRecord::try_from(IntentWire {
            action_type: ActionType::Incident,
            incident_number: Some("inc0000123".to_string()),
            search_keywords: Some("ignored".to_string()),
            conversation_context: None,
            confidence: 0.95,
        })
        .expect("valid incident intent");

        assert_eq!(record.action_type(), ActionType::Incident);
        assert_eq!(record.incident_number().map(|number| number.as_str()), Some("INC0000123"));
        assert_eq!(record.search_keywords(), None);
    }

    #[test]
    fn incident_without_number_is_rejected() {
        let error = IntentRecord::try_from(IntentWire {
            action_type: ActionType::Incident,
            incident_number: None,
            search_keywords: None,
            conversation_context: None,
            confidence: 0.9,
        })
        .expect_err("incident needs a number");

        assert_eq!(error, IntentShapeError::InvalidIncidentNumber(None));
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let error = IntentRecord::try_from(IntentWire {
            action_type: ActionType::Conversation,
            incident_number: None,
            search_keywords: None,
            conversation_context: Some("greeting".to_string()),
            confidence: 1.5,
        })
        .expect_err("confidence must be bounded");

        assert!(matches!(error, IntentShapeError::ConfidenceOutOfRange(_)));
    }

    #[test]
    fn serializes_as_flat_record() {
        let value = serde_json::to_value(IntentRecord::kb_search("password reset", 0.88))
            .expect("serialize intent");

        assert_eq!(value["action_type"], "kb_search");
        assert_eq!(value["search_keywords"], "password reset");
        assert!(value["incident_number"].is_null());
        assert!(value["conversation_context"].is_null());
    }

    #[test]
    fn fallback_is_conversation_with_full_confidence() {
        let fallback = IntentRecord::fallback();
        assert_eq!(fallback.action_type(), ActionType::Conversation);
        assert_eq!(fallback.conversation_context(), Some("error handling"));
        assert_eq!(fallback.confidence, 1.0);
    }
}
