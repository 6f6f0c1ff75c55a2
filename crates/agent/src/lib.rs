//! Agent runtime: the collaborators that talk to the outside world and the
//! orchestration that ties them together.
//!
//! A user message flows through:
//! 1. **Intent classification** (`intent`) - one model call, strictly decoded,
//!    falling back to conversation on any failure.
//! 2. **Routing** (`runtime`) - incident messages run the workflow, KB search
//!    requests go straight to the knowledge base, everything else gets a
//!    conversational reply.
//! 3. **Incident workflow** (`workflow`) - Query, Analyze and KbSearch stages
//!    over an append-only transcript, capped by a step budget.
//!
//! The ticketing system (`ticketing`) and the language model (`llm`) sit
//! behind traits so tests can substitute in-process fakes.
//!
//! Model output is treated as untrusted text. It is parsed, never executed,
//! and no routing decision depends on the model's reported confidence.

pub mod intent;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod ticketing;
pub mod workflow;

pub use intent::IntentClassifier;
pub use llm::{HttpLlmClient, LlmClient};
pub use runtime::{AgentReply, AgentRuntime};
pub use ticketing::{ServiceNowClient, TicketClient};
pub use workflow::{WorkflowOrchestrator, WorkflowOutcome, WorkflowRun, WorkflowSettings};
