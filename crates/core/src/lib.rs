//! Domain types, configuration and the workflow state machine shared by the
//! deskpilot agent, server and CLI.

pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod keywords;

pub use domain::incident::IncidentNumber;
pub use domain::intent::{ActionType, Intent, IntentRecord};
pub use domain::message::{Message, Role, Transcript};
pub use domain::ticket::{KbArticle, TicketSummary};
pub use errors::{InterfaceError, UpstreamError, UpstreamService, WorkflowError};
pub use flows::{FlowEngine, StageOutcome, StepBudget, TransitionMode, WorkflowState};
pub use keywords::KeywordExtractor;
