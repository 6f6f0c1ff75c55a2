use std::process::ExitCode;

fn main() -> ExitCode {
    deskpilot_cli::run()
}
