//! Agent framework: a plan-act-observe loop over a JSON step protocol
//!
//! The model answers every request with exactly one [`Step`]. Actions are
//! dispatched to the built-in tools and their results fed back into the
//! transcript until the model reports `complete`, at which point the user
//! decides whether to keep going.

mod agent_loop;
mod error;
mod invoker;
mod prompt;
mod state;
mod step;
#[cfg(test)]
mod testing;

pub use agent_loop::{AgentConfig, AgentLoop, TerminationReason};
pub use error::AgentError;
pub use invoker::{ChatCompletion, ModelInvoker, RetryPolicy};
pub use prompt::build_system_prompt;
pub use step::Step;
