//! Session state: the transcript, the loop's position, and failure tracking

use llm_core::ChatMessage;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::tools::ToolResult;

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

/// One transcript entry. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// The model's raw reply, kept verbatim so it replays exactly
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool_result(result: &ToolResult) -> Self {
        Self {
            role: Role::ToolResult,
            content: result.transcript_payload().to_string(),
        }
    }

    #[cfg(test)]
    pub fn role(&self) -> Role {
        self.role
    }

    #[cfg(test)]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Wire form. Tool results travel as user messages carrying the JSON payload.
    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            Role::System => ChatMessage::system(self.content.clone()),
            Role::User | Role::ToolResult => ChatMessage::user(self.content.clone()),
            Role::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

/// Append-only log of the session's messages
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[cfg(test)]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Messages to send to the model, in order.
    ///
    /// With a `window`, leading system messages are always kept and only the
    /// last `window` of the remaining messages follow them. The window is
    /// widened so the model's latest reply is never dropped.
    pub fn to_chat_messages(&self, window: Option<usize>) -> Vec<ChatMessage> {
        let system_len = self
            .messages
            .iter()
            .take_while(|m| m.role == Role::System)
            .count();
        let (system, rest) = self.messages.split_at(system_len);

        let rest = match window {
            Some(n) if rest.len() > n => {
                let mut start = rest.len() - n;
                if let Some(last_reply) = rest.iter().rposition(|m| m.role == Role::Assistant) {
                    start = start.min(last_reply);
                }
                &rest[start..]
            }
            _ => rest,
        };

        system
            .iter()
            .chain(rest.iter())
            .map(Message::to_chat_message)
            .collect()
    }
}

/// Position of the loop controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for a fresh task from the user
    AwaitingTask,
    Planning,
    Acting,
    Observing,
    Complete,
    /// Waiting for the yes/no continuation answer
    AwaitingUser,
    Terminated,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::AwaitingTask => "awaiting_task",
            LoopState::Planning => "planning",
            LoopState::Acting => "acting",
            LoopState::Observing => "observing",
            LoopState::Complete => "complete",
            LoopState::AwaitingUser => "awaiting_user",
            LoopState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Counts consecutive failures of identical tool calls so a stuck model can be stopped
#[derive(Debug)]
pub struct FailureTracker {
    last_signature: Option<String>,
    consecutive: usize,
    max_consecutive: usize,
}

impl FailureTracker {
    pub fn new(max_consecutive: usize) -> Self {
        Self {
            last_signature: None,
            consecutive: 0,
            max_consecutive,
        }
    }

    /// Signature for a tool call (name + input hash)
    pub fn tool_signature(name: &str, input: &serde_json::Value) -> String {
        let mut hasher = DefaultHasher::new();
        input.to_string().hash(&mut hasher);
        format!("{}:{:x}", name, hasher.finish())
    }

    pub fn record_success(&mut self) {
        self.last_signature = None;
        self.consecutive = 0;
    }

    /// Record a failed call. Returns the abort reason once the same call has
    /// failed `max_consecutive` times in a row.
    pub fn record_failure(&mut self, signature: &str, error: &str) -> Option<String> {
        if self.last_signature.as_deref() == Some(signature) {
            self.consecutive += 1;
        } else {
            self.last_signature = Some(signature.to_string());
            self.consecutive = 1;
        }

        if self.max_consecutive > 0 && self.consecutive >= self.max_consecutive {
            Some(format!(
                "the same tool call failed {} consecutive times: {}",
                self.consecutive, error
            ))
        } else {
            None
        }
    }

    /// Forget history, e.g. when a new user turn starts
    pub fn reset(&mut self) {
        self.record_success();
    }
}
