//! Message Composer: the human prompts that open each agent turn.

use asploop_core::TurnMessage;

use crate::controller::SessionState;

/// Feedback used when the validator left none.
pub const FALLBACK_FEEDBACK: &str = "The code do not model correctly the problem.";

/// The prompt for the next solver turn.
///
/// The first iteration presents the problem. Later iterations relay the
/// validator's feedback and, when there is one, the current program.
pub fn solver_message(state: &SessionState) -> TurnMessage {
    if state.iteration_count == 0 {
        return TurnMessage::human(format!(
            "Problem to solve:\n\n{}\n\nPlease create an ASP encoding for this problem using the MCP Solver tools.\nBuild the encoding step by step and test it with solve_model when ready.",
            state.problem_description
        ));
    }

    let feedback = if state.last_feedback.is_empty() {
        FALLBACK_FEEDBACK
    } else {
        state.last_feedback.as_str()
    };
    let code_block = if state.asp_code.is_empty() {
        String::new()
    } else {
        format!("\n\nCurrent ASP code state:\n{}\n\n", state.asp_code)
    };

    TurnMessage::human(format!(
        "A validator expert in Answer Set Programming provided this feedback on your ASP code:\n\n{feedback}\n{code_block}\nPlease address the feedback and improve the encoding using the MCP Solver tools."
    ))
}

/// The prompt for a validator turn. The validator fetches the program itself.
pub fn validator_message(state: &SessionState) -> TurnMessage {
    TurnMessage::human(format!(
        "Original problem:\n{}\n\nCall get_model to obtain the current ASP code to validate it against the problem requirements.\nUse solve_model to test it and provide clear feedback on whether it's correct.",
        state.problem_description
    ))
}
