//! `asploop batch`: solve every problem under an LPCP-style tree.

use std::path::{Path, PathBuf};

use asploop_agent::{find_problem_files, BatchObserver, BatchRunner, SolutionResult, SolveRunner};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Dispatch};

use super::{report_outcome, CliError, CommonArgs};
use crate::logging::{problem_dispatch, LogLevel};

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Root folder containing lpcp-YYYY subfolders
    #[arg(long, default_value = "lpcp_problems")]
    pub root: PathBuf,

    /// Comma-separated years to include (e.g. 2022,2023); empty means all
    #[arg(long, default_value = "")]
    pub years: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl BatchArgs {
    fn year_filter(&self) -> Vec<String> {
        self.years
            .split(',')
            .map(str::trim)
            .filter(|y| !y.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Gives each problem its own log file and exports it when done.
struct ExportingObserver {
    level: LogLevel,
    export_path: PathBuf,
    current: Option<Dispatch>,
}

impl BatchObserver for ExportingObserver {
    fn log_dispatch(&mut self, problem: &Path) -> Option<Dispatch> {
        self.current = match problem_dispatch(self.level, &self.export_path, problem) {
            Ok(dispatch) => Some(dispatch),
            Err(e) => {
                warn!(problem = %problem.display(), error = %e, "Cannot open problem log file");
                None
            }
        };
        self.current.clone()
    }

    fn on_result(&mut self, problem: &Path, result: &SolutionResult) {
        let dispatch = self.current.take();
        let report = || report_outcome(problem, result, &self.export_path);
        match dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(&dispatch, report),
            None => report(),
        }
    }
}

pub async fn run(args: BatchArgs, cancel: CancellationToken) -> Result<(), CliError> {
    if !args.root.is_dir() {
        return Err(CliError::Usage(format!(
            "Root folder not found or not a directory: {}",
            args.root.display()
        )));
    }
    args.common.validate()?;

    let config = args.common.load_config()?;
    let years = args.year_filter();
    let files = find_problem_files(&args.root, Some(years.as_slice()))?;

    if files.is_empty() {
        println!("No problem files found.");
        println!("Searched in: {}", args.root.display());
        if !years.is_empty() {
            println!("Filtered for years: {}", years.join(", "));
        }
        return Ok(());
    }

    println!("Found {} problem files", files.len());
    println!(
        "Configuration: model={}, max_iterations={}",
        config.model_name, config.max_iterations
    );

    let export_path = config.export_path.clone();
    let runner = SolveRunner::from_config(config)?.with_cancellation(cancel);
    let batch = BatchRunner::new(runner);
    let mut observer = ExportingObserver {
        level: args.common.log_level,
        export_path: export_path.clone(),
        current: None,
    };
    let report = batch.solve_all(&files, &mut observer).await;

    println!();
    println!("Batch processing complete");
    println!("Total: {}", report.results.len());
    println!("Successful: {}", report.succeeded);
    println!("Failed: {}", report.failed());
    println!("Results saved to: {}/", export_path.display());
    Ok(())
}
