//! Writing outcome records next to the problem they belong to.

use std::path::{Component, Path, PathBuf};

use asploop_core::Error;
use tracing::info;

use crate::result::SolutionRecord;

/// Files written by [`export_solution`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPaths {
    pub record: PathBuf,
    /// Present only when the record carries a program
    pub program: Option<PathBuf>,
}

/// `<export>/<problem path with extension>`, keeping relative directories.
///
/// Root and prefix components are dropped so absolute problem paths still
/// land under `export_path`.
pub fn export_target(export_path: &Path, problem_path: &Path, extension: &str) -> PathBuf {
    let relative: PathBuf = problem_path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    export_path.join(relative).with_extension(extension)
}

/// Write `<problem>.json` and, when there is a program, `<problem>.lp`.
pub fn export_solution(
    problem_path: &Path,
    record: &SolutionRecord,
    export_path: &Path,
) -> Result<ExportedPaths, Error> {
    let record_path = export_target(export_path, problem_path, "json");
    if let Some(parent) = record_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::File(format!("cannot create {}: {e}", parent.display())))?;
    }

    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(&record_path, json)
        .map_err(|e| Error::File(format!("cannot write {}: {e}", record_path.display())))?;
    info!(path = %record_path.display(), "Exported result");

    let program = if record.asp_code.is_empty() {
        None
    } else {
        let lp_path = export_target(export_path, problem_path, "lp");
        std::fs::write(&lp_path, &record.asp_code)
            .map_err(|e| Error::File(format!("cannot write {}: {e}", lp_path.display())))?;
        info!(path = %lp_path.display(), "Exported ASP program");
        Some(lp_path)
    };

    Ok(ExportedPaths {
        record: record_path,
        program,
    })
}

/// Read an exported record back.
pub fn load_solution(path: &Path) -> Result<SolutionRecord, Error> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::File(format!("cannot open {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&text)?)
}
