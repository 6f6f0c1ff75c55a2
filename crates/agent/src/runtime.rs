use std::sync::Arc;

use deskpilot_core::config::AppConfig;
use deskpilot_core::domain::intent::{Intent, IntentRecord};
use deskpilot_core::errors::UpstreamError;
use deskpilot_core::keywords::split_keywords;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::intent::IntentClassifier;
use crate::llm::{HttpLlmClient, LlmClient};
use crate::prompts;
use crate::ticketing::{ServiceNowClient, TicketClient};
use crate::workflow::{search_articles, WorkflowOrchestrator, WorkflowSettings};

pub const EMPTY_INPUT_REPLY: &str = "Please enter your incident number or query.";
pub const CONVERSATION_FAILURE_REPLY: &str = "I apologize, but I couldn't process your request.";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentReply {
    pub reply: String,
    /// `None` only for blank input, which is never classified.
    pub intent: Option<IntentRecord>,
    pub correlation_id: String,
}

/// Routes one user message: classify, then run the incident workflow, a
/// direct KB search, or a single conversational completion.
pub struct AgentRuntime {
    classifier: IntentClassifier,
    workflow: WorkflowOrchestrator,
    tickets: Arc<dyn TicketClient>,
    llm: Arc<dyn LlmClient>,
    kb_limit: u32,
}

impl AgentRuntime {
    pub fn new(
        tickets: Arc<dyn TicketClient>,
        llm: Arc<dyn LlmClient>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone()),
            workflow: WorkflowOrchestrator::new(tickets.clone(), llm.clone(), settings),
            tickets,
            llm,
            kb_limit: settings.kb_limit,
        }
    }

    /// Builds the HTTP-backed collaborators once from process configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, UpstreamError> {
        let tickets = ServiceNowClient::from_config(&config.ticketing)?;
        let llm = HttpLlmClient::from_config(&config.llm)?;
        debug!(
            event_name = "agent.runtime.clients_built",
            incident_url = tickets.incident_url(),
            kb_url = tickets.kb_url(),
            llm_endpoint = llm.endpoint(),
            model = %config.llm.model,
            "upstream clients built"
        );
        Ok(Self::new(Arc::new(tickets), Arc::new(llm), WorkflowSettings::from_config(config)))
    }

    pub async fn handle_message(&self, text: &str) -> AgentReply {
        self.handle_message_with_id(text, &Uuid::new_v4().to_string()).await
    }

    pub async fn handle_message_with_id(&self, text: &str, correlation_id: &str) -> AgentReply {
        let text = text.trim();
        if text.is_empty() {
            return AgentReply {
                reply: EMPTY_INPUT_REPLY.to_string(),
                intent: None,
                correlation_id: correlation_id.to_string(),
            };
        }

        let intent = self.classifier.classify(text).await;
        info!(
            event_name = "agent.runtime.routed",
            correlation_id,
            action_type = intent.action_type().as_str(),
            "message routed"
        );

        let reply = match &intent.intent {
            Intent::Incident { .. } => self.workflow.run(text, correlation_id).await.reply(),
            Intent::KbSearch { search_keywords } => {
                let keywords = split_keywords(search_keywords);
                let (message, _) =
                    search_articles(self.tickets.as_ref(), &keywords, self.kb_limit, correlation_id)
                        .await;
                message
            }
            Intent::Conversation { conversation_context } => {
                self.converse(text, conversation_context, correlation_id).await
            }
        };

        AgentReply { reply, intent: Some(intent), correlation_id: correlation_id.to_string() }
    }

    async fn converse(&self, text: &str, context: &str, correlation_id: &str) -> String {
        let prompt = prompts::conversation(text, context);
        match self.llm.complete(&prompt, prompts::CONVERSATION_TEMPERATURE).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => CONVERSATION_FAILURE_REPLY.to_string(),
            Err(error) => {
                warn!(
                    event_name = "agent.runtime.conversation_failed",
                    correlation_id,
                    error = %error,
                    "conversation completion failed"
                );
                CONVERSATION_FAILURE_REPLY.to_string()
            }
        }
    }
}
