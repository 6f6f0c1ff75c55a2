use deskpilot_agent::{AgentReply, AgentRuntime};
use deskpilot_core::config::{AppConfig, LoadOptions};
use deskpilot_core::domain::intent::IntentRecord;
use serde::Serialize;

use crate::commands::{serialize_payload, CommandResult, EXIT_RUNTIME_FAILURE};

#[derive(Debug, Serialize)]
struct AskOutcome<'a> {
    command: &'static str,
    status: &'static str,
    reply: &'a str,
    intent: Option<&'a IntentRecord>,
    correlation_id: &'a str,
}

pub fn run(text: &str, json_output: bool) -> CommandResult {
    run_with_options(text, json_output, LoadOptions::default())
}

pub fn run_with_options(text: &str, json_output: bool, options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("ask", error.to_string()),
    };

    let agent = match AgentRuntime::from_config(&config) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure("ask", "client_setup", error.to_string(), EXIT_RUNTIME_FAILURE)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "async_runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME_FAILURE,
            )
        }
    };

    let answer = runtime.block_on(agent.handle_message(text));
    CommandResult { exit_code: 0, output: render(&answer, json_output) }
}

fn render(answer: &AgentReply, json_output: bool) -> String {
    if !json_output {
        return answer.reply.clone();
    }

    serialize_payload(&AskOutcome {
        command: "ask",
        status: "ok",
        reply: &answer.reply,
        intent: answer.intent.as_ref(),
        correlation_id: &answer.correlation_id,
    })
}
