//! asploop CLI: the main entry point.
//!
//! Commands:
//! - `solve`  Solve one problem file
//! - `batch`  Solve every `lpcp-YYYY/problem-*.md` under a root folder
//!
//! Exit status: 0 when the run completes (whatever the outcome), 2 for bad
//! arguments or configuration, 1 for anything else.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

mod commands;
mod logging;

use commands::CliError;

#[derive(Parser)]
#[command(
    name = "asploop",
    about = "Agentic ASP encoding generation with a solver/validator loop",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a single problem
    Solve(commands::solve::SolveArgs),

    /// Solve all problems under an LPCP-style folder
    Batch(commands::batch::BatchArgs),
}

impl Commands {
    fn common(&self) -> &commands::CommonArgs {
        match self {
            Commands::Solve(args) => &args.common,
            Commands::Batch(args) => &args.common,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_console(cli.command.common().log_level);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted by user, stopping");
            on_interrupt.cancel();
        }
    });

    let outcome = match cli.command {
        Commands::Solve(args) => commands::solve::run(args, cancel).await,
        Commands::Batch(args) => commands::batch::run(args, cancel).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(message)) => {
            eprintln!("error: {message}");
            ExitCode::from(2)
        }
        Err(CliError::Config(e)) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
        Err(CliError::Fatal(e)) => {
            eprintln!("Fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}
