//! `asploop solve`: solve one problem file.

use std::path::PathBuf;

use asploop_agent::SolveRunner;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::warn;

use super::{report_outcome, CliError, CommonArgs};
use crate::logging::problem_dispatch;

#[derive(Debug, Args)]
pub struct SolveArgs {
    /// Text or markdown file with the problem description
    pub problem_file: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn run(args: SolveArgs, cancel: CancellationToken) -> Result<(), CliError> {
    if !args.problem_file.exists() {
        return Err(CliError::Usage(format!(
            "Problem file not found: {}",
            args.problem_file.display()
        )));
    }
    args.common.validate()?;

    let config = args.common.load_config()?;
    let export_path = config.export_path.clone();
    let runner = SolveRunner::from_config(config)?.with_cancellation(cancel);

    let dispatch = match problem_dispatch(args.common.log_level, &export_path, &args.problem_file) {
        Ok(dispatch) => Some(dispatch),
        Err(e) => {
            warn!(error = %e, "Cannot open problem log file, logging to stderr only");
            None
        }
    };

    let solve = runner.solve(&args.problem_file);
    let result = match &dispatch {
        Some(dispatch) => solve.with_subscriber(dispatch.clone()).await,
        None => solve.await,
    };

    let report = || report_outcome(&args.problem_file, &result, &export_path);
    match &dispatch {
        Some(dispatch) => tracing::dispatcher::with_default(dispatch, report),
        None => report(),
    }

    println!("{}", result.summary());
    Ok(())
}
