pub mod commands;

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use commands::assign::AssignArgs;

#[derive(Debug, Parser)]
#[command(
    name = "leadflow",
    about = "Leadflow operator CLI",
    long_about = "Apply migrations, load demo routing data, inspect configuration \
                  and route single contacts.",
    after_help = "Examples:\n  leadflow migrate\n  leadflow seed\n  leadflow assign --lead crm-42 --source 1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Idempotently load the demo sources, operators and weights")]
    Seed,
    #[command(about = "Print the effective configuration as JSON with source attribution")]
    Config,
    #[command(about = "Route one contact request through the assignment engine")]
    Assign {
        #[arg(long, help = "External id of the lead (created on first use)")]
        lead: String,
        #[arg(long, help = "Numeric id of the source the contact came from")]
        source: i64,
        #[arg(long, help = "Optional free-text message attached to the contact")]
        message: Option<String>,
    },
}

pub fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let exit_code = execute(cli, &mut std::io::stdout().lock())?;
    Ok(ExitCode::from(exit_code))
}

/// Runs one command and writes its JSON outcome line to `out`, returning the exit code.
pub fn execute(cli: Cli, out: &mut impl Write) -> anyhow::Result<u8> {
    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Assign { lead, source, message } => {
            commands::assign::run(AssignArgs { lead, source, message })
        }
    };

    writeln!(out, "{}", result.output).context("failed to write command outcome")?;
    out.flush().context("failed to flush command outcome")?;
    Ok(result.exit_code)
}
