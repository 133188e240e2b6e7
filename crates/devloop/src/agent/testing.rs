//! Scripted doubles for the completion service and the session shell

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use llm_core::ChatMessage;
use parking_lot::Mutex;

use super::invoker::CompletionService;
use super::step::Step;
use crate::shell::{Notice, SessionShell};
use crate::tools::ToolResult;

/// Replays canned replies in order; errors once the script runs out
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, String>>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
    requests: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_replies(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn with_replies(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of completion requests issued so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Transcript sent with each request
    pub fn seen_messages(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(messages.to_vec());

        match self.replies.lock().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("script exhausted")),
        }
    }
}

/// Feeds canned user input and records everything shown to the user
#[derive(Debug, Default)]
pub struct ScriptedShell {
    texts: VecDeque<String>,
    answers: VecDeque<String>,
    pub steps: Vec<Step>,
    pub tool_results: Vec<ToolResult>,
    pub notices: Vec<Notice>,
    pub questions_asked: usize,
}

impl ScriptedShell {
    /// `texts` answer the task prompt, `answers` the continuation question; running out means end of input
    pub fn new<I, J>(texts: I, answers: J) -> Self
    where
        I: IntoIterator<Item = &'static str>,
        J: IntoIterator<Item = &'static str>,
    {
        Self {
            texts: texts.into_iter().map(String::from).collect(),
            answers: answers.into_iter().map(String::from).collect(),
            ..Self::default()
        }
    }
}

impl SessionShell for ScriptedShell {
    fn read_user_text(&mut self) -> Result<Option<String>> {
        Ok(self.texts.pop_front())
    }

    fn ask_continue(&mut self) -> Result<Option<String>> {
        self.questions_asked += 1;
        Ok(self.answers.pop_front())
    }

    fn print_step(&mut self, step: &Step) {
        self.steps.push(step.clone());
    }

    fn print_tool_result(&mut self, result: &ToolResult) {
        self.tool_results.push(result.clone());
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}
