use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    leadflow_cli::run()
}
