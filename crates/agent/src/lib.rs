//! The solver/validator loop.
//!
//! A session alternates two LLM agents over one shared program buffer held
//! by the solver service:
//!
//! 1. **Solve**: the solver agent builds or repairs an ASP encoding
//! 2. **Validate**: the validator agent fetches the program, runs it, and
//!    answers with `VALIDATION PASSED` or feedback
//! 3. **Repeat** with the feedback until the program passes, the iteration
//!    cap is reached, or a turn-level fault ends the session
//!
//! A passing program has its unused rules commented out before it is
//! returned.

pub mod checkpoint;
pub mod composer;
pub mod controller;
pub mod export;
pub mod invoker;
pub mod postprocess;
pub mod result;
pub mod runner;

#[cfg(test)]
mod test_helpers;

pub use checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
pub use controller::{should_continue, IterationController, Node, SessionState};
pub use export::{export_solution, export_target, load_solution, ExportedPaths};
pub use invoker::{AgentHandle, AgentRole, TurnOutput};
pub use postprocess::{comment_unused_rules, PostProcessed};
pub use result::{FullSolutionRecord, SolutionRecord, SolutionResult};
pub use runner::{
    find_problem_files, read_problem, BatchObserver, BatchReport, BatchRunner, SolveRunner,
};
