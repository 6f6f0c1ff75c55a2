pub mod engine;
pub mod states;

pub use engine::{
    flow_for_mode, DynFlow, FlowDefinition, FlowEngine, FlowTransitionError, LegacyTranscriptFlow,
    StepBudget, TaggedFlow,
};
pub use states::{texts, StageOutcome, TransitionMode, TransitionOutcome, WorkflowState};
