use thiserror::Error;

use crate::domain::message::Transcript;
use crate::errors::WorkflowError;
use crate::flows::states::{texts, StageOutcome, TransitionMode, TransitionOutcome, WorkflowState};

pub trait FlowDefinition {
    fn mode(&self) -> TransitionMode;

    fn initial_state(&self) -> WorkflowState {
        WorkflowState::Query
    }

    fn transition(
        &self,
        current: &WorkflowState,
        outcome: &StageOutcome,
        transcript: &Transcript,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

impl<F> FlowDefinition for Box<F>
where
    F: FlowDefinition + ?Sized,
{
    fn mode(&self) -> TransitionMode {
        (**self).mode()
    }

    fn initial_state(&self) -> WorkflowState {
        (**self).initial_state()
    }

    fn transition(
        &self,
        current: &WorkflowState,
        outcome: &StageOutcome,
        transcript: &Transcript,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        (**self).transition(current, outcome, transcript)
    }
}

/// Query -> Analyze -> KbSearch driven by each stage's tagged outcome.
#[derive(Clone, Debug, Default)]
pub struct TaggedFlow;

impl FlowDefinition for TaggedFlow {
    fn mode(&self) -> TransitionMode {
        TransitionMode::Tagged
    }

    fn transition(
        &self,
        current: &WorkflowState,
        outcome: &StageOutcome,
        _transcript: &Transcript,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_tagged(current, outcome)
    }
}

/// Same pipeline, but the next state is read back out of the text of the
/// last transcript message (case-insensitive substring match).
#[derive(Clone, Debug, Default)]
pub struct LegacyTranscriptFlow;

impl FlowDefinition for LegacyTranscriptFlow {
    fn mode(&self) -> TransitionMode {
        TransitionMode::Legacy
    }

    fn transition(
        &self,
        current: &WorkflowState,
        outcome: &StageOutcome,
        transcript: &Transcript,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        if current.is_terminal() {
            return Err(FlowTransitionError::AlreadyTerminal);
        }
        let to = next_state_from_transcript(transcript);
        Ok(TransitionOutcome { from: *current, to, outcome: *outcome })
    }
}

pub type DynFlow = Box<dyn FlowDefinition + Send + Sync>;

pub fn flow_for_mode(mode: TransitionMode) -> DynFlow {
    match mode {
        TransitionMode::Tagged => Box::new(TaggedFlow),
        TransitionMode::Legacy => Box::new(LegacyTranscriptFlow),
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn mode(&self) -> TransitionMode {
        self.flow.mode()
    }

    pub fn initial_state(&self) -> WorkflowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &WorkflowState,
        outcome: &StageOutcome,
        transcript: &Transcript,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, outcome, transcript)
    }
}

impl FlowEngine<DynFlow> {
    pub fn for_mode(mode: TransitionMode) -> Self {
        Self::new(flow_for_mode(mode))
    }
}

impl Default for FlowEngine<TaggedFlow> {
    fn default() -> Self {
        Self::new(TaggedFlow)
    }
}

/// Hard cap on the number of transitions a single run may take.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepBudget {
    limit: u32,
    used: u32,
}

impl StepBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    pub fn consume(&mut self) -> Result<(), WorkflowError> {
        if self.used >= self.limit {
            return Err(WorkflowError::StepLimitExceeded { limit: self.limit });
        }
        self.used += 1;
        Ok(())
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} on outcome {outcome:?}")]
    InvalidTransition { state: WorkflowState, outcome: StageOutcome },
    #[error("workflow already reached its terminal state")]
    AlreadyTerminal,
}

fn transition_tagged(
    current: &WorkflowState,
    outcome: &StageOutcome,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use StageOutcome::{Complete, Error, Found, NotFound, Skipped};
    use WorkflowState::{Analyze, End, KbSearch, Query};

    let to = match (current, outcome) {
        (End, _) => return Err(FlowTransitionError::AlreadyTerminal),
        (Query, Found) => Analyze,
        (Query, NotFound) | (Query, Skipped) => Query,
        (Analyze, Complete) => KbSearch,
        (KbSearch, Found) | (KbSearch, NotFound) => End,
        (_, Error) => End,
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                outcome: *outcome,
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, outcome: *outcome })
}

fn next_state_from_transcript(transcript: &Transcript) -> WorkflowState {
    let Some(last) = transcript.last() else {
        return WorkflowState::End;
    };
    let content = last.content.to_lowercase();

    if content.contains(texts::MATCH_INCIDENT_FOUND) {
        WorkflowState::Analyze
    } else if content.contains(texts::MATCH_ANALYSIS_COMPLETE) {
        WorkflowState::KbSearch
    } else if content.contains(texts::MATCH_KB_FOUND)
        || content.contains(texts::MATCH_KB_NOT_FOUND)
        || content.contains(texts::MATCH_ERROR)
    {
        WorkflowState::End
    } else {
        WorkflowState::Query
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::message::Transcript;
    use crate::errors::WorkflowError;
    use crate::flows::engine::{
        DynFlow, FlowEngine, FlowTransitionError, LegacyTranscriptFlow, StepBudget, TaggedFlow,
    };
    use crate::flows::states::{StageOutcome, TransitionMode, WorkflowState};

    fn transcript_ending_with(content: &str) -> Transcript {
        let mut transcript = Transcript::new();
        transcript.push_system("Processing ServiceNow incident workflow.");
        transcript.push_user("Process incident INC0000059");
        transcript.push_assistant(content);
        transcript
    }

    #[test]
    fn tagged_flow_happy_path() {
        let engine = FlowEngine::new(TaggedFlow);
        let transcript = Transcript::new();
        let mut state = engine.initial_state();
        assert_eq!(state, WorkflowState::Query);

        for (outcome, expected) in [
            (StageOutcome::Found, WorkflowState::Analyze),
            (StageOutcome::Complete, WorkflowState::KbSearch),
            (StageOutcome::Found, WorkflowState::End),
        ] {
            state = engine.apply(&state, &outcome, &transcript).expect("valid transition").to;
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn tagged_flow_retries_query_on_not_found_and_skip() {
        let engine = FlowEngine::<TaggedFlow>::default();
        let transcript = Transcript::new();

        for outcome in [StageOutcome::NotFound, StageOutcome::Skipped] {
            let next = engine.apply(&WorkflowState::Query, &outcome, &transcript).expect("retry");
            assert_eq!(next.to, WorkflowState::Query);
        }
    }

    #[test]
    fn tagged_flow_ends_on_error_and_empty_kb_results() {
        let engine = FlowEngine::<TaggedFlow>::default();
        let transcript = Transcript::new();

        for state in [WorkflowState::Query, WorkflowState::Analyze, WorkflowState::KbSearch] {
            let next = engine.apply(&state, &StageOutcome::Error, &transcript).expect("error ends");
            assert_eq!(next.to, WorkflowState::End);
        }
        let next = engine
            .apply(&WorkflowState::KbSearch, &StageOutcome::NotFound, &transcript)
            .expect("no articles ends");
        assert_eq!(next.to, WorkflowState::End);
    }

    #[test]
    fn tagged_flow_rejects_unreachable_pairs() {
        let engine = FlowEngine::<TaggedFlow>::default();
        let transcript = Transcript::new();

        let error = engine
            .apply(&WorkflowState::Analyze, &StageOutcome::Found, &transcript)
            .expect_err("analyze never reports found");
        assert_eq!(
            error,
            FlowTransitionError::InvalidTransition {
                state: WorkflowState::Analyze,
                outcome: StageOutcome::Found
            }
        );

        let error = engine
            .apply(&WorkflowState::End, &StageOutcome::Complete, &transcript)
            .expect_err("end is terminal");
        assert_eq!(error, FlowTransitionError::AlreadyTerminal);
    }

    #[test]
    fn legacy_flow_follows_last_message_text() {
        let engine = FlowEngine::new(LegacyTranscriptFlow);
        let cases = [
            ("Incident details found: Short Description: USB", WorkflowState::Analyze),
            ("ANALYSIS COMPLETE: main issue", WorkflowState::KbSearch),
            ("KB articles found: \n**KB Article**", WorkflowState::End),
            ("No relevant KB articles found.", WorkflowState::End),
            ("Error querying incident: timed out", WorkflowState::End),
            ("Incident not found.", WorkflowState::Query),
            ("No keywords found to search with.", WorkflowState::Query),
        ];

        for (content, expected) in cases {
            let next = engine
                .apply(&WorkflowState::Query, &StageOutcome::Skipped, &transcript_ending_with(content))
                .expect("legacy transitions are total");
            assert_eq!(next.to, expected, "last message: {content}");
        }
    }

    #[test]
    fn legacy_flow_ends_on_empty_transcript() {
        let next = FlowEngine::new(LegacyTranscriptFlow)
            .apply(&WorkflowState::Query, &StageOutcome::Skipped, &Transcript::new())
            .expect("empty transcript ends");
        assert_eq!(next.to, WorkflowState::End);
    }

    #[test]
    fn engine_for_mode_selects_flow() {
        for mode in [TransitionMode::Tagged, TransitionMode::Legacy] {
            assert_eq!(FlowEngine::<DynFlow>::for_mode(mode).mode(), mode);
        }
    }

    #[test]
    fn step_budget_caps_transitions() {
        let mut budget = StepBudget::new(2);
        assert!(budget.consume().is_ok());
        assert!(budget.consume().is_ok());
        assert_eq!(budget.consume(), Err(WorkflowError::StepLimitExceeded { limit: 2 }));
        assert_eq!(budget.used(), 2);
        assert_eq!(budget.limit(), 2);
    }
}
