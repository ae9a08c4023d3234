pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cadence",
    about = "Cadence operator CLI",
    long_about = "Operate Cadence readiness checks, database migrations, and corpus validation.",
    after_help = "Examples:\n  cadence doctor --json\n  cadence migrate\n  cadence corpus"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, tool endpoints, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Parse the retrieval corpus and report document counts")]
    Corpus,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Corpus => commands::corpus::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
