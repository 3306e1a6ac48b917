pub mod bootstrap;
pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "jarvis",
    about = "FMCG Jarvis sales analytics assistant",
    long_about = "Answer plain-English questions about FMCG sales history, predictions, and what-if scenarios.",
    after_help = "Examples:\n  jarvis ask \"Total units sold in 2024\"\n  jarvis ask \"What if stock drops by 30%?\" --json\n  jarvis seed\n  jarvis smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Answer one question and print the answer")]
    Ask {
        #[arg(help = "Question in plain English")]
        question: String,
        #[arg(long, help = "Emit intent, answer and correlation id as JSON")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Run readiness checks for config, artifacts and the sales store")]
    Smoke,
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Apply migrations and load the deterministic demo dataset and artifacts")]
    Seed {
        #[arg(long, help = "Overwrite model and feature artifacts that already exist")]
        force_artifacts: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { question, json } => commands::ask::run(&question, json),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Smoke => commands::smoke::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed { force_artifacts } => commands::seed::run(force_artifacts),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
