//! Tool framework: the capabilities the model can invoke by name
//!
//! Capabilities report failures as [`ToolError`]; the dispatcher folds them into
//! the uniform text form of [`ToolResult`] only when the result enters the transcript.

pub mod builtin;
pub mod dispatcher;
pub mod registry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures raised by capabilities or by name lookup
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{name}' (available tools: {available})")]
    UnknownTool { name: String, available: String },

    #[error("invalid input for {tool}: {reason}")]
    InvalidInput { tool: String, reason: String },

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },
}

impl ToolError {
    pub fn invalid_input(tool: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// What a capability produced when it ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    /// False when the capability ran but reported an unsuccessful outcome (e.g. a non-zero exit)
    pub success: bool,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: false,
        }
    }
}

/// Outcome of one dispatch, as recorded in the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Tool name as requested by the model
    pub tool: String,
    /// Input echoed back verbatim
    pub input: Value,
    /// Output text; failures are prefixed with `Error: `
    pub output: String,
    pub success: bool,
}

impl ToolResult {
    /// Unsuccessful outputs get the same `Error: ` tag as capability errors
    pub fn from_output(tool: &str, input: &Value, output: ToolOutput) -> Self {
        let text = if output.success {
            output.text
        } else {
            format!("Error: {}", output.text)
        };
        Self {
            tool: tool.to_string(),
            input: input.clone(),
            output: text,
            success: output.success,
        }
    }

    pub fn from_error(tool: &str, input: &Value, error: &ToolError) -> Self {
        Self {
            tool: tool.to_string(),
            input: input.clone(),
            output: format!("Error: {}", error),
            success: false,
        }
    }

    /// Payload the model sees for this result
    pub fn transcript_payload(&self) -> Value {
        json!({
            "step": "tool_output",
            "tool": self.tool,
            "input": self.input,
            "output": self.output,
        })
    }
}

/// Context provided to tools during execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Directory relative paths and commands resolve against
    pub working_dir: PathBuf,
    /// Maximum output length (truncate if exceeded)
    pub max_output_len: usize,
    /// Timeout for synchronous commands in seconds
    pub command_timeout_secs: u64,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_output_len: 50000,
            command_timeout_secs: 120,
        }
    }
}

impl ToolContext {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    pub fn with_max_output_len(mut self, len: usize) -> Self {
        self.max_output_len = len;
        self
    }

    /// Resolve a model-supplied path against the working directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.working_dir.join(candidate)
        }
    }

    /// Cut `text` to `max_output_len` bytes on a char boundary
    pub fn truncate(&self, text: String) -> String {
        if text.len() <= self.max_output_len {
            return text;
        }
        let mut end = self.max_output_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}\n\n[Output truncated at {} characters]",
            &text[..end],
            self.max_output_len
        )
    }
}

/// A capability invocable by name with one opaque input payload
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to request this tool
    fn name(&self) -> &str;

    /// What the tool does, for the system prompt
    fn description(&self) -> &str;

    /// Input shape, for the system prompt
    fn input_shape(&self) -> &str;

    /// Run the tool. Inputs are validated before any side effect happens.
    async fn execute(&self, input: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

/// Deserialize a tool's typed input, rejecting malformed payloads
pub fn parse_input<T: DeserializeOwned>(tool: &str, input: &Value) -> Result<T, ToolError> {
    T::deserialize(input).map_err(|e| ToolError::invalid_input(tool, e.to_string()))
}

/// A command line given either as raw text or as `{"command": ...}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CommandInput {
    Line(String),
    Object { command: String },
}

impl CommandInput {
    pub fn parse(tool: &str, input: &Value) -> Result<String, ToolError> {
        let command = match parse_input::<CommandInput>(tool, input)? {
            CommandInput::Line(line) => line,
            CommandInput::Object { command } => command,
        };
        if command.trim().is_empty() {
            return Err(ToolError::invalid_input(tool, "command is empty"));
        }
        Ok(command)
    }
}

/// A path given either as raw text or as `{"path": ...}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PathInput {
    Raw(String),
    Object { path: String },
}

impl PathInput {
    pub fn parse(tool: &str, input: &Value) -> Result<String, ToolError> {
        let path = match parse_input::<PathInput>(tool, input)? {
            PathInput::Raw(path) => path,
            PathInput::Object { path } => path,
        };
        if path.trim().is_empty() {
            return Err(ToolError::invalid_input(tool, "path is empty"));
        }
        Ok(path)
    }
}
