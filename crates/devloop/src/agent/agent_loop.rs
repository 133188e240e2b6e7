//! The loop controller: plan, act, observe, complete, then ask the user

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::shell::{Notice, SessionShell};
use crate::tools::builtin::{DetachedProcess, DetachedProcesses};
use crate::tools::dispatcher::ToolDispatcher;

use super::error::AgentError;
use super::invoker::{ModelInvoker, ModelReply};
use super::state::{ConversationState, FailureTracker, LoopState, Message};
use super::step::Step;

const AFFIRMATIVE: &[&str] = &["yes", "y", "sure", "okay", "ok"];
const NEGATIVE: &[&str] = &["no", "n", "i'm okay", "i am okay", "done", "finished", "exit"];
const EXIT: &[&str] = &["exit", "quit"];

/// Configuration for the loop controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    /// Steps the model may chain before control goes back to the user
    pub max_steps_per_turn: usize,
    /// Identical failing actions in a row before the turn is stopped; 0 disables
    pub max_consecutive_failures: usize,
}

impl AgentConfig {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_steps_per_turn: 50,
            max_consecutive_failures: 3,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps_per_turn = max_steps;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: usize) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// `exit`/`quit` at the task prompt
    UserExit,
    /// A negative answer to the continuation question
    UserDeclined,
    EndOfInput,
}

/// Summary handed back when the session ends
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub reason: TerminationReason,
    pub messages: usize,
    pub steps: usize,
    pub tool_calls: usize,
    pub detached: Vec<DetachedProcess>,
}

/// Classification of an answer to the continuation question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueAnswer {
    Continue,
    Stop,
    Unrecognized,
}

impl ContinueAnswer {
    pub fn classify(answer: &str) -> Self {
        let answer = answer.trim().to_lowercase();
        if AFFIRMATIVE.contains(&answer.as_str()) {
            ContinueAnswer::Continue
        } else if NEGATIVE.contains(&answer.as_str()) {
            ContinueAnswer::Stop
        } else {
            ContinueAnswer::Unrecognized
        }
    }
}

/// Whether `text` at the task prompt ends the session
pub fn is_exit_token(text: &str) -> bool {
    EXIT.contains(&text.trim().to_lowercase().as_str())
}

enum TurnOutcome {
    Completed,
    Aborted(String),
}

enum Continuation {
    MoreChanges,
    End(TerminationReason),
}

/// Drives one interactive session
pub struct AgentLoop<S: SessionShell> {
    invoker: ModelInvoker,
    dispatcher: ToolDispatcher,
    shell: S,
    config: AgentConfig,
    conversation: ConversationState,
    state: LoopState,
    failures: FailureTracker,
    detached: DetachedProcesses,
    steps: usize,
    tool_calls: usize,
    session_id: Uuid,
}

impl<S: SessionShell> AgentLoop<S> {
    /// `detached` must be the ledger the registry's `run_server` records into
    pub fn new(
        invoker: ModelInvoker,
        dispatcher: ToolDispatcher,
        detached: DetachedProcesses,
        shell: S,
        config: AgentConfig,
    ) -> Self {
        let mut conversation = ConversationState::new();
        conversation.push(Message::system(config.system_prompt.clone()));

        Self {
            invoker,
            dispatcher,
            shell,
            failures: FailureTracker::new(config.max_consecutive_failures),
            config,
            conversation,
            state: LoopState::AwaitingTask,
            detached,
            steps: 0,
            tool_calls: 0,
            session_id: Uuid::new_v4(),
        }
    }

    #[cfg(test)]
    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    #[cfg(test)]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[cfg(test)]
    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Append a user message for the next turn
    pub fn submit_user_text(&mut self, text: &str) {
        self.conversation.push(Message::user(text));
    }

    /// Run the session until the user leaves or the model breaks protocol.
    ///
    /// `initial_task`, when given, is used instead of prompting for the first task.
    #[instrument(skip_all, fields(session = %self.session_id))]
    pub async fn run(&mut self, initial_task: Option<String>) -> Result<SessionReport, AgentError> {
        info!("Session started");
        let mut pending = initial_task;

        loop {
            self.transition(LoopState::AwaitingTask);
            let task = match pending.take() {
                Some(task) => task,
                None => match self.read_text()? {
                    Some(text) => text,
                    None => return Ok(self.finish(TerminationReason::EndOfInput)),
                },
            };
            let task = task.trim();
            if task.is_empty() {
                continue;
            }
            if is_exit_token(task) {
                return Ok(self.finish(TerminationReason::UserExit));
            }
            self.submit_user_text(task);

            loop {
                match self.run_turn().await {
                    Ok(TurnOutcome::Completed) => {}
                    Ok(TurnOutcome::Aborted(reason)) => {
                        warn!(reason = %reason, "Turn stopped before completion");
                        self.shell.notify(Notice::TurnAborted(reason));
                        break;
                    }
                    Err(AgentError::UnknownStepTag { tag, raw }) => {
                        warn!(tag = %tag, "Model used an unrecognized step");
                        self.conversation.push(Message::assistant(raw));
                        self.shell.notify(Notice::TurnAborted(format!(
                            "the model replied with an unrecognized step '{}'",
                            tag
                        )));
                        break;
                    }
                    Err(e) => {
                        self.transition(LoopState::Terminated);
                        return Err(e);
                    }
                }

                match self.await_continuation()? {
                    Continuation::MoreChanges => {
                        self.shell.notify(Notice::RequestChanges);
                        match self.read_text()? {
                            Some(text) => self.submit_user_text(&text),
                            None => return Ok(self.finish(TerminationReason::EndOfInput)),
                        }
                    }
                    Continuation::End(reason) => return Ok(self.finish(reason)),
                }
            }
        }
    }

    /// Request steps until the model completes, or the turn has to stop
    async fn run_turn(&mut self) -> Result<TurnOutcome, AgentError> {
        self.failures.reset();
        self.transition(LoopState::Planning);
        let max_steps = self.config.max_steps_per_turn.max(1);

        for _ in 0..max_steps {
            self.shell.begin_wait("Thinking...");
            let reply = self.invoker.complete(&self.conversation).await;
            self.shell.end_wait();
            let ModelReply { raw, step } = reply?;

            self.steps += 1;
            self.conversation.push(Message::assistant(raw));
            self.shell.print_step(&step);
            debug!(step = step.tag(), content_len = step.content().len(), "Model step");

            match step {
                Step::Plan { .. } => self.transition(LoopState::Planning),
                Step::Observe { .. } => self.transition(LoopState::Observing),
                Step::Action { tool, input, .. } => {
                    self.transition(LoopState::Acting);
                    let result = self.dispatcher.invoke(&tool, &input).await;
                    self.tool_calls += 1;
                    self.shell.print_tool_result(&result);
                    self.conversation.push(Message::tool_result(&result));

                    if result.success {
                        self.failures.record_success();
                    } else {
                        let signature = FailureTracker::tool_signature(&tool, &input);
                        if let Some(reason) = self.failures.record_failure(&signature, &result.output) {
                            return Ok(TurnOutcome::Aborted(reason));
                        }
                    }
                    self.transition(LoopState::Observing);
                }
                Step::Complete { .. } => {
                    self.transition(LoopState::Complete);
                    return Ok(TurnOutcome::Completed);
                }
            }
        }

        Ok(TurnOutcome::Aborted(format!(
            "the model took {} steps without completing",
            max_steps
        )))
    }

    /// Ask the continuation question until the answer is recognized
    fn await_continuation(&mut self) -> Result<Continuation, AgentError> {
        self.transition(LoopState::AwaitingUser);

        loop {
            let Some(answer) = self.shell.ask_continue().map_err(AgentError::Shell)? else {
                return Ok(Continuation::End(TerminationReason::EndOfInput));
            };

            match ContinueAnswer::classify(&answer) {
                ContinueAnswer::Continue => return Ok(Continuation::MoreChanges),
                ContinueAnswer::Stop => return Ok(Continuation::End(TerminationReason::UserDeclined)),
                ContinueAnswer::Unrecognized => {
                    debug!(answer = %answer, "Unrecognized continuation answer");
                    self.shell.notify(Notice::AnswerYesOrNo);
                }
            }
        }
    }

    /// Next non-empty line of user text
    fn read_text(&mut self) -> Result<Option<String>, AgentError> {
        loop {
            match self.shell.read_user_text().map_err(AgentError::Shell)? {
                Some(text) if text.trim().is_empty() => continue,
                Some(text) => return Ok(Some(text.trim().to_string())),
                None => return Ok(None),
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }

    fn finish(&mut self, reason: TerminationReason) -> SessionReport {
        self.transition(LoopState::Terminated);
        self.shell.notify(Notice::SessionEnded(reason));

        let report = SessionReport {
            reason,
            messages: self.conversation.len(),
            steps: self.steps,
            tool_calls: self.tool_calls,
            detached: self.detached.snapshot(),
        };
        info!(
            reason = ?report.reason,
            messages = report.messages,
            steps = report.steps,
            tool_calls = report.tool_calls,
            detached = report.detached.len(),
            "Session ended"
        );
        report
    }
}
