use std::process::ExitCode;

fn main() -> ExitCode {
    echoshop_cli::run()
}
