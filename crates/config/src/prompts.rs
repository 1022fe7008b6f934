//! System prompts for the two agent roles.
//!
//! Each role has a built-in default; an override file replaces it verbatim.

use crate::ConfigError;
use std::path::Path;

pub const DEFAULT_SOLVER_PROMPT: &str = "\
You are an expert Answer Set Programming (ASP) agent. You turn problem \
descriptions into correct ASP encodings in Clingo syntax.

Solver service tools available to you:
- add_item: add facts, rules, constraints or other ASP statements
- replace_item: replace an existing item by its ID
- remove_item: remove an item by its ID
- solve_model: run the current program and return its answer sets

How to work:
1. Build the encoding step by step with the tools: facts first, then rules, then constraints.
2. Run solve_model after each meaningful change and read the answer sets.
3. When a validator sends feedback, address every point it raises, changing only what is needed.
4. Keep the program syntactically valid ASP at all times.

Reply with the final ASP program only.
";

pub const DEFAULT_VALIDATOR_PROMPT: &str = "\
You are an expert reviewer of Answer Set Programming (ASP) encodings. You \
check an existing encoding against the original problem. Do not write the \
encoding yourself.

Solver service tools available to you:
- get_model: read the current program
- solve_model: run the program and inspect its answer sets

Check:
1. Syntax: the program is valid ASP.
2. Completeness: every requirement of the problem is modelled.
3. Correctness: the answer sets satisfy the problem constraints.
4. Logic: there are no flawed or missing rules.

Answer format:
- If the encoding is correct, state \"VALIDATION PASSED\" and say why.
- Otherwise state \"VALIDATION FAILED\" and list the concrete issues to fix.

Be thorough and brief. Keep the feedback actionable.
";

/// The resolved system prompts for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub solver: String,
    pub validator: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            solver: DEFAULT_SOLVER_PROMPT.to_string(),
            validator: DEFAULT_VALIDATOR_PROMPT.to_string(),
        }
    }
}

impl Prompts {
    /// Resolve prompts, reading override files where given.
    pub fn load(
        solver_file: Option<&Path>,
        validator_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let solver = match solver_file {
            Some(path) => read_prompt_file(path)?,
            None => DEFAULT_SOLVER_PROMPT.to_string(),
        };
        let validator = match validator_file {
            Some(path) => read_prompt_file(path)?,
            None => DEFAULT_VALIDATOR_PROMPT.to_string(),
        };
        Ok(Self { solver, validator })
    }
}

/// Read an override prompt. Missing, unreadable or blank files are errors.
pub fn read_prompt_file(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PromptFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if content.trim().is_empty() {
        return Err(ConfigError::PromptFile {
            path: path.to_path_buf(),
            reason: "file is empty".into(),
        });
    }

    tracing::info!(path = %path.display(), "Loaded prompt override");
    Ok(content)
}
