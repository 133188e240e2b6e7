//! Model invocation: transcript in, exactly one parsed step out

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use llm_core::{ChatClient, ChatMessage, ChatOptions};
use tracing::{debug, instrument, warn};

use super::error::AgentError;
use super::state::ConversationState;
use super::step::{Step, StepError};

/// The completion service as an opaque request/response function
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// [`CompletionService`] backed by an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    client: ChatClient,
    options: ChatOptions,
}

impl ChatCompletion {
    pub fn new(client: ChatClient, options: ChatOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl CompletionService for ChatCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client.complete(messages, &self.options).await
    }
}

/// How often to ask again when the reply cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(1),
        }
    }
}

/// A parsed step together with the reply text it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub raw: String,
    pub step: Step,
}

pub struct ModelInvoker {
    service: Arc<dyn CompletionService>,
    retry: RetryPolicy,
    history_window: Option<usize>,
}

impl ModelInvoker {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
            history_window: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replay only the system prompt plus the last `window` messages; 0 replays everything
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = (window > 0).then_some(window);
        self
    }

    /// Ask the model for its next step.
    ///
    /// Transport failures and malformed replies are retried per the policy;
    /// exhausting it yields [`AgentError::ModelProtocol`]. A well-formed reply
    /// with an unknown tag is returned at once as [`AgentError::UnknownStepTag`].
    #[instrument(skip_all, fields(messages = conversation.len()))]
    pub async fn complete(&self, conversation: &ConversationState) -> Result<ModelReply, AgentError> {
        let messages = conversation.to_chat_messages(self.history_window);
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.service.complete(&messages).await {
                Ok(raw) => match Step::parse(&raw) {
                    Ok(step) => {
                        debug!(attempt, step = step.tag(), "Parsed model step");
                        return Ok(ModelReply { raw, step });
                    }
                    Err(StepError::UnknownTag(tag)) => {
                        return Err(AgentError::UnknownStepTag { tag, raw });
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "Model reply could not be parsed");
                        last_error = e.to_string();
                    }
                },
                Err(e) => {
                    warn!(attempt, error = %e, "Completion request failed");
                    last_error = format!("{:#}", e);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        Err(AgentError::ModelProtocol {
            attempts,
            last_error,
        })
    }
}

impl std::fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("retry", &self.retry)
            .field("history_window", &self.history_window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::Message;
    use crate::agent::testing::ScriptedCompletion;

    fn invoker(service: &Arc<ScriptedCompletion>) -> ModelInvoker {
        ModelInvoker::new(service.clone()).with_retry(RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(1),
        })
    }

    fn conversation() -> ConversationState {
        let mut conversation = ConversationState::new();
        conversation.push(Message::system("sys"));
        conversation.push(Message::user("build it"));
        conversation
    }

    #[tokio::test]
    async fn test_returns_first_valid_step() {
        let service = Arc::new(ScriptedCompletion::new([r#"{"step": "plan", "content": "p"}"#]));

        let reply = invoker(&service).complete(&conversation()).await.unwrap();
        assert_eq!(reply.step.tag(), "plan");
        assert_eq!(reply.raw, r#"{"step": "plan", "content": "p"}"#);
        assert_eq!(service.requests(), 1);
    }

    #[tokio::test]
    async fn test_retries_once_after_malformed_reply() {
        let service = Arc::new(ScriptedCompletion::new([
            "not json",
            r#"{"step": "observe", "content": "ok"}"#,
        ]));

        let reply = invoker(&service).complete(&conversation()).await.unwrap();
        assert_eq!(reply.step.tag(), "observe");
        assert_eq!(service.requests(), 2);
    }

    #[tokio::test]
    async fn test_two_malformed_replies_are_fatal() {
        let service = Arc::new(ScriptedCompletion::new([
            "not json",
            r#"{"content": "no step"}"#,
            r#"{"step": "plan", "content": "never requested"}"#,
        ]));

        let err = invoker(&service).complete(&conversation()).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelProtocol { attempts: 2, .. }));
        assert_eq!(service.requests(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_counts_as_attempt() {
        let service = Arc::new(ScriptedCompletion::with_replies(vec![
            Err("connection refused".to_string()),
            Ok(r#"{"step": "complete", "content": "done"}"#.to_string()),
        ]));

        let reply = invoker(&service).complete(&conversation()).await.unwrap();
        assert_eq!(reply.step.tag(), "complete");
        assert_eq!(service.requests(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_not_retried() {
        let service = Arc::new(ScriptedCompletion::new([r#"{"step": "dance", "content": "x"}"#]));

        let err = invoker(&service).complete(&conversation()).await.unwrap_err();
        match err {
            AgentError::UnknownStepTag { tag, raw } => {
                assert_eq!(tag, "dance");
                assert!(raw.contains("dance"));
            }
            other => panic!("expected UnknownStepTag, got {:?}", other),
        }
        assert_eq!(service.requests(), 1);
    }

    #[tokio::test]
    async fn test_history_window_limits_replay() {
        let service = Arc::new(ScriptedCompletion::new([r#"{"step": "plan", "content": "p"}"#]));
        let mut conversation = conversation();
        conversation.push(Message::assistant("a"));
        conversation.push(Message::user("b"));

        invoker(&service)
            .with_history_window(1)
            .complete(&conversation)
            .await
            .unwrap();

        let seen = service.seen_messages();
        assert_eq!(seen[0].len(), 3);
        assert_eq!(seen[0][0].content, "sys");
        assert_eq!(seen[0][1].content, "a");
        assert_eq!(seen[0][2].content, "b");
    }
}
