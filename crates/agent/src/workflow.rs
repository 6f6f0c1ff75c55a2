use std::sync::Arc;

use deskpilot_core::config::{AppConfig, DEFAULT_KB_LIMIT, DEFAULT_STEP_LIMIT};
use deskpilot_core::domain::incident::IncidentNumber;
use deskpilot_core::domain::message::{Role, Transcript};
use deskpilot_core::domain::ticket::render_articles;
use deskpilot_core::errors::WorkflowError;
use deskpilot_core::flows::{
    texts, DynFlow, FlowEngine, FlowTransitionError, StageOutcome, StepBudget, TransitionMode,
    WorkflowState,
};
use deskpilot_core::keywords::KeywordExtractor;
use tracing::{debug, info, warn};

use crate::llm::LlmClient;
use crate::prompts;
use crate::ticketing::TicketClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub step_limit: u32,
    pub transition_mode: TransitionMode,
    pub kb_limit: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            transition_mode: TransitionMode::Tagged,
            kb_limit: DEFAULT_KB_LIMIT,
        }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            step_limit: config.workflow.step_limit,
            transition_mode: config.workflow.transition_mode,
            kb_limit: config.ticketing.kb_limit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Completed,
    StepLimitExceeded { limit: u32 },
    InvalidTransition(FlowTransitionError),
}

/// Result of one orchestration run: the full transcript plus how it stopped.
#[derive(Clone, Debug)]
pub struct WorkflowRun {
    pub transcript: Transcript,
    pub outcome: WorkflowOutcome,
    pub final_state: WorkflowState,
    pub steps: u32,
}

impl WorkflowRun {
    /// Every message in transcript order, newline-joined, plus an abort notice
    /// when the run did not reach `End`.
    pub fn reply(&self) -> String {
        let mut reply = self.transcript.render();
        match &self.outcome {
            WorkflowOutcome::Completed => {}
            WorkflowOutcome::StepLimitExceeded { limit } => {
                reply.push('\n');
                reply.push_str(&format!("Workflow could not complete within {limit} steps."));
            }
            WorkflowOutcome::InvalidTransition(_) => {
                reply.push('\n');
                reply.push_str("Workflow stopped unexpectedly.");
            }
        }
        reply
    }

    pub fn completed(&self) -> bool {
        matches!(self.outcome, WorkflowOutcome::Completed)
    }
}

/// Drives Query -> Analyze -> KbSearch -> End over an append-only transcript.
///
/// Each stage appends at most one assistant message and reports a
/// [`StageOutcome`]; the configured flow picks the next state. Collaborator
/// failures become transcript text, so a run never returns an error.
pub struct WorkflowOrchestrator {
    tickets: Arc<dyn TicketClient>,
    llm: Arc<dyn LlmClient>,
    extractor: KeywordExtractor,
    engine: FlowEngine<DynFlow>,
    settings: WorkflowSettings,
}

impl WorkflowOrchestrator {
    pub fn new(
        tickets: Arc<dyn TicketClient>,
        llm: Arc<dyn LlmClient>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            tickets,
            llm,
            extractor: KeywordExtractor::new(),
            engine: FlowEngine::for_mode(settings.transition_mode),
            settings,
        }
    }

    pub async fn run(&self, subject: &str, correlation_id: &str) -> WorkflowRun {
        let mut transcript = Transcript::new();
        transcript.push_system(texts::SYSTEM_SEED);
        transcript.push_user(subject);

        let mut state = self.engine.initial_state();
        let mut budget = StepBudget::new(self.settings.step_limit);

        info!(
            event_name = "agent.workflow.started",
            correlation_id,
            transition_mode = ?self.engine.mode(),
            step_limit = self.settings.step_limit,
            "workflow run started"
        );

        while !state.is_terminal() {
            if let Err(WorkflowError::StepLimitExceeded { limit }) = budget.consume() {
                warn!(
                    event_name = "agent.workflow.step_limit_exceeded",
                    correlation_id,
                    state = ?state,
                    limit,
                    "workflow aborted at step limit"
                );
                return WorkflowRun {
                    transcript,
                    outcome: WorkflowOutcome::StepLimitExceeded { limit },
                    final_state: state,
                    steps: budget.used(),
                };
            }

            let outcome = self.run_stage(state, &mut transcript, correlation_id).await;

            match self.engine.apply(&state, &outcome, &transcript) {
                Ok(transition) => {
                    debug!(
                        event_name = "agent.workflow.transition",
                        correlation_id,
                        from = ?transition.from,
                        to = ?transition.to,
                        outcome = ?transition.outcome,
                        step = budget.used(),
                        "workflow transition applied"
                    );
                    state = transition.to;
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.workflow.invalid_transition",
                        correlation_id,
                        error = %error,
                        "workflow stopped on an invalid transition"
                    );
                    return WorkflowRun {
                        transcript,
                        outcome: WorkflowOutcome::InvalidTransition(error),
                        final_state: state,
                        steps: budget.used(),
                    };
                }
            }
        }

        info!(
            event_name = "agent.workflow.completed",
            correlation_id,
            steps = budget.used(),
            messages = transcript.len(),
            "workflow run completed"
        );
        WorkflowRun {
            transcript,
            outcome: WorkflowOutcome::Completed,
            final_state: state,
            steps: budget.used(),
        }
    }

    async fn run_stage(
        &self,
        state: WorkflowState,
        transcript: &mut Transcript,
        correlation_id: &str,
    ) -> StageOutcome {
        match state {
            WorkflowState::Query => self.query_stage(transcript, correlation_id).await,
            WorkflowState::Analyze => self.analyze_stage(transcript, correlation_id).await,
            WorkflowState::KbSearch => self.kb_search_stage(transcript, correlation_id).await,
            WorkflowState::End => StageOutcome::Skipped,
        }
    }

    async fn query_stage(&self, transcript: &mut Transcript, correlation_id: &str) -> StageOutcome {
        let Some(incident_number) = find_incident_number(transcript) else {
            debug!(
                event_name = "agent.workflow.query_stalled",
                correlation_id,
                "no incident number in transcript"
            );
            return StageOutcome::Skipped;
        };

        match self.tickets.get_incident(&incident_number).await {
            Ok(Some(summary)) => {
                transcript.push_assistant(format!("{}: {}", texts::INCIDENT_FOUND, summary.render()));
                StageOutcome::Found
            }
            Ok(None) => {
                info!(
                    event_name = "agent.workflow.incident_not_found",
                    correlation_id,
                    incident_number = %incident_number,
                    "incident not found"
                );
                transcript.push_assistant(texts::INCIDENT_NOT_FOUND);
                StageOutcome::NotFound
            }
            Err(error) => {
                warn!(
                    event_name = "agent.workflow.incident_query_failed",
                    correlation_id,
                    incident_number = %incident_number,
                    error = %error,
                    "incident query failed"
                );
                transcript.push_assistant(format!(
                    "{}: {}",
                    texts::INCIDENT_QUERY_ERROR,
                    error.user_detail()
                ));
                StageOutcome::Error
            }
        }
    }

    async fn analyze_stage(
        &self,
        transcript: &mut Transcript,
        correlation_id: &str,
    ) -> StageOutcome {
        let Some(details) = last_content_containing(transcript, texts::INCIDENT_FOUND) else {
            return StageOutcome::Skipped;
        };

        let prompt = prompts::incident_analysis(&details);
        match self.llm.complete(&prompt, prompts::ANALYSIS_TEMPERATURE).await {
            Ok(analysis) => {
                transcript.push_assistant(format!("{}: {}", texts::ANALYSIS_COMPLETE, analysis));
                StageOutcome::Complete
            }
            Err(error) => {
                warn!(
                    event_name = "agent.workflow.analysis_failed",
                    correlation_id,
                    error = %error,
                    "incident analysis failed"
                );
                transcript
                    .push_assistant(format!("{}: {}", texts::ANALYSIS_ERROR, error.user_detail()));
                StageOutcome::Error
            }
        }
    }

    async fn kb_search_stage(
        &self,
        transcript: &mut Transcript,
        correlation_id: &str,
    ) -> StageOutcome {
        let Some(analysis) = last_content_containing(transcript, texts::ANALYSIS_COMPLETE) else {
            return StageOutcome::Skipped;
        };

        let keywords = self.extractor.extract(&analysis);
        if keywords.is_empty() {
            transcript.push_assistant(texts::KB_NO_KEYWORDS);
            return StageOutcome::NotFound;
        }

        let (message, outcome) =
            search_articles(self.tickets.as_ref(), &keywords, self.settings.kb_limit, correlation_id)
                .await;
        transcript.push_assistant(message);
        outcome
    }
}

/// Runs one KB search and renders the transcript text for it. Shared by the
/// workflow's KbSearch stage and direct keyword searches.
pub async fn search_articles(
    tickets: &dyn TicketClient,
    keywords: &[String],
    limit: u32,
    correlation_id: &str,
) -> (String, StageOutcome) {
    if keywords.is_empty() {
        return (texts::KB_NO_KEYWORDS.to_string(), StageOutcome::NotFound);
    }

    match tickets.search_knowledge_base(keywords, limit).await {
        Ok(articles) if articles.is_empty() => {
            (texts::KB_NOT_FOUND.to_string(), StageOutcome::NotFound)
        }
        Ok(articles) => {
            info!(
                event_name = "agent.workflow.kb_articles_found",
                correlation_id,
                articles = articles.len(),
                "knowledge base articles found"
            );
            (format!("{}: {}", texts::KB_FOUND, render_articles(&articles)), StageOutcome::Found)
        }
        Err(error) => {
            warn!(
                event_name = "agent.workflow.kb_search_failed",
                correlation_id,
                error = %error,
                "knowledge base search failed"
            );
            (format!("{}: {}", texts::KB_SEARCH_ERROR, error.user_detail()), StageOutcome::Error)
        }
    }
}

fn find_incident_number(transcript: &Transcript) -> Option<IncidentNumber> {
    transcript
        .iter()
        .filter(|message| message.role == Role::User)
        .find_map(|message| IncidentNumber::find_in(&message.content))
}

/// Content of the last message when it carries `marker` (case-insensitive).
fn last_content_containing(transcript: &Transcript, marker: &str) -> Option<String> {
    let last = transcript.last()?;
    last.content
        .to_lowercase()
        .contains(&marker.to_lowercase())
        .then(|| last.content.clone())
}
