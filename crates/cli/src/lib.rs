pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "deskpilot",
    about = "Deskpilot service desk assistant CLI",
    long_about = "Ask the incident assistant one-shot questions, inspect effective configuration, and run readiness checks.",
    after_help = "Examples:\n  deskpilot ask Process incident INC0000059\n  deskpilot doctor --json\n  deskpilot config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Route one message through the assistant and print the reply")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "Message text (incident number, KB query, or chat)")]
        text: Vec<String>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and ticketing/language model endpoint settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { text, json } => commands::ask::run(&text.join(" "), json),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
