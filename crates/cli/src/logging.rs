//! Log subscribers: stderr for the process, plus one file per problem.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use asploop_agent::export_target;
use clap::ValueEnum;
use tracing::Dispatch;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }

    fn filter(self) -> EnvFilter {
        EnvFilter::new(self.directive())
    }
}

/// Process-wide stderr logging.
pub fn init_console(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(level.filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Subscriber for one problem: stderr plus `<export>/<problem>.log`.
///
/// The log file is truncated on every run.
pub fn problem_dispatch(
    level: LogLevel,
    export_path: &Path,
    problem: &Path,
) -> std::io::Result<Dispatch> {
    let log_path = export_target(export_path, problem, "log");
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&log_path)?;

    let subscriber = tracing_subscriber::registry()
        .with(level.filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        );
    Ok(Dispatch::new(subscriber))
}
