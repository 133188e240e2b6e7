//! Errors that end an automated turn or the whole session

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The completion service never produced a parseable step. Fatal.
    #[error("no valid step from the model after {attempts} attempts: {last_error}")]
    ModelProtocol { attempts: u32, last_error: String },

    /// A well-formed reply carried a `step` value outside the protocol.
    #[error("model replied with unrecognized step '{tag}'")]
    UnknownStepTag { tag: String, raw: String },

    /// The session shell failed to read input.
    #[error("session input failed: {0}")]
    Shell(#[source] anyhow::Error),
}
