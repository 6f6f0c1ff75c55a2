use std::sync::Arc;

use deskpilot_core::domain::incident::IncidentNumber;
use deskpilot_core::domain::intent::IntentRecord;
use deskpilot_core::errors::UpstreamError;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::LlmClient;
use crate::prompts;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("model response did not contain a JSON object")]
    MissingObject,
    #[error("model response is not a valid intent object: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Turns free user text into an [`IntentRecord`] with one model call.
///
/// Never fails: any upstream or parse error yields [`IntentRecord::fallback`].
/// An `INC` token in the user text always wins over whatever the model said.
#[derive(Clone)]
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, user_text: &str) -> IntentRecord {
        let classified = match self.try_classify(user_text).await {
            Ok(record) => record,
            Err(error) => {
                warn!(
                    event_name = "agent.intent.fallback",
                    error = %error,
                    "intent classification failed, using conversation fallback"
                );
                IntentRecord::fallback()
            }
        };

        let record = enforce_incident_rule(user_text, classified);
        info!(
            event_name = "agent.intent.classified",
            action_type = record.action_type().as_str(),
            confidence = record.confidence,
            "intent classified"
        );
        record
    }

    async fn try_classify(&self, user_text: &str) -> Result<IntentRecord, ClassificationError> {
        let prompt = prompts::classification(user_text);
        let raw = self.llm.complete(&prompt, prompts::CLASSIFICATION_TEMPERATURE).await?;
        parse_intent(&raw)
    }
}

/// Strict structured decode of model output; nothing in it is evaluated.
pub fn parse_intent(raw: &str) -> Result<IntentRecord, ClassificationError> {
    let object = json_object_span(raw).ok_or(ClassificationError::MissingObject)?;
    Ok(serde_json::from_str::<IntentRecord>(object)?)
}

fn json_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn enforce_incident_rule(user_text: &str, record: IntentRecord) -> IntentRecord {
    let Some(token) = IncidentNumber::find_in(user_text) else {
        return record;
    };
    if record.incident_number() == Some(&token) {
        return record;
    }
    IntentRecord::incident(token, record.confidence)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use deskpilot_core::domain::intent::{ActionType, IntentRecord};
    use deskpilot_core::errors::{UpstreamError, UpstreamService};

    use super::{parse_intent, ClassificationError, IntentClassifier};
    use crate::llm::LlmClient;

    struct ScriptedLlm {
        reply: Result<String, UpstreamError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(text.to_string()), prompts: Mutex::new(Vec::new()) })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(UpstreamError::Timeout {
                    service: UpstreamService::LanguageModel,
                    after_secs: 30,
                }),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String, UpstreamError> {
            self.prompts.lock().expect("prompt log").push(prompt.to_string());
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn decodes_well_formed_kb_search_answer() {
        let llm = ScriptedLlm::replying(
            r#"{"action_type": "kb_search", "incident_number": null, "search_keywords": "vpn drops, login loop", "conversation_context": null, "confidence": 0.88}"#,
        );
        let record = IntentClassifier::new(llm.clone())
            .classify("can you recheck keywords like vpn drops, login loop")
            .await;

        assert_eq!(record.action_type(), ActionType::KbSearch);
        assert_eq!(record.search_keywords(), Some("vpn drops, login loop"));
        assert!((record.confidence - 0.88).abs() < f32::EPSILON);
        assert_eq!(llm.prompts.lock().expect("prompt log").len(), 1);
    }

    #[tokio::test]
    async fn tolerates_fenced_output() {
        let llm = ScriptedLlm::replying(
            "Here you go:\n```json\n{\"action_type\": \"conversation\", \"conversation_context\": \"greeting\", \"confidence\": 0.9}\n```",
        );
        let record = IntentClassifier::new(llm).classify("hello there").await;

        assert_eq!(record.conversation_context(), Some("greeting"));
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_conversation() {
        for reply in ["not json at all", "{\"action_type\": \"incident\", \"confidence\": 0.9}", "{'action_type': None}"] {
            let record = IntentClassifier::new(ScriptedLlm::replying(reply)).classify("hi").await;
            assert_eq!(record, IntentRecord::fallback(), "reply: {reply}");
        }
    }

    #[tokio::test]
    async fn upstream_failure_falls_back_to_conversation() {
        let record = IntentClassifier::new(ScriptedLlm::failing()).classify("hello").await;
        assert_eq!(record, IntentRecord::fallback());
    }

    #[tokio::test]
    async fn incident_token_forces_incident_intent() {
        let cases = [
            ("what is the status of inc0000123", r#"{"action_type": "conversation", "conversation_context": "status", "confidence": 0.4}"#),
            ("Process incident INC0000059", "garbage"),
            ("INC0000777 please", r#"{"action_type": "incident", "incident_number": "INC0000001", "confidence": 0.9}"#),
        ];

        for (text, reply) in cases {
            let record = IntentClassifier::new(ScriptedLlm::replying(reply)).classify(text).await;
            let expected = deskpilot_core::IncidentNumber::find_in(text).expect("token present");

            assert_eq!(record.action_type(), ActionType::Incident, "text: {text}");
            assert_eq!(record.incident_number(), Some(&expected), "text: {text}");
        }
    }

    #[test]
    fn parse_rejects_text_without_object() {
        assert!(matches!(parse_intent("no braces"), Err(ClassificationError::MissingObject)));
        assert!(matches!(parse_intent("} backwards {"), Err(ClassificationError::MissingObject)));
    }
}
