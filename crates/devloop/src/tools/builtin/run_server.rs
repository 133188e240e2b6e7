//! Fire-and-forget launch of long-running processes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use tracing::info;

use super::shell_command;
use crate::tools::{CommandInput, Tool, ToolContext, ToolError, ToolOutput};

/// A process launched by `run_server`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedProcess {
    pub pid: Option<u32>,
    pub command: String,
    pub started_at: DateTime<Utc>,
}

/// Ledger of every detached launch in this session.
///
/// Entries are only ever added; there is no stop or kill.
#[derive(Debug, Clone, Default)]
pub struct DetachedProcesses {
    inner: Arc<Mutex<Vec<DetachedProcess>>>,
}

impl DetachedProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, process: DetachedProcess) {
        self.inner.lock().push(process);
    }

    /// Copy of every recorded launch, oldest first
    pub fn snapshot(&self) -> Vec<DetachedProcess> {
        self.inner.lock().clone()
    }
}

/// Starts a command in the background and returns immediately
pub struct RunServerTool {
    launched: DetachedProcesses,
}

impl RunServerTool {
    pub fn new(launched: DetachedProcesses) -> Self {
        Self { launched }
    }
}

#[async_trait]
impl Tool for RunServerTool {
    fn name(&self) -> &str {
        "run_server"
    }

    fn description(&self) -> &str {
        "Start a long-running process such as a dev server in the background. Returns immediately; output is not captured."
    }

    fn input_shape(&self) -> &str {
        "command: str"
    }

    async fn execute(&self, input: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let command = CommandInput::parse(self.name(), input)?;

        let mut std_cmd = shell_command(&command);
        std_cmd
            .current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group so a Ctrl-C aimed at devloop does not reach the server
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut cmd = tokio::process::Command::from(std_cmd);
        cmd.kill_on_drop(false);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => return Err(ToolError::Spawn { command, source }),
        };

        // Dropping the handle detaches; tokio reaps the child when it exits.
        let pid = child.id();
        drop(child);

        info!(command = %command, pid = ?pid, "Detached process started");
        self.launched.record(DetachedProcess {
            pid,
            command: command.clone(),
            started_at: Utc::now(),
        });

        let text = match pid {
            Some(pid) => format!("Server started with: {} (pid {})", command, pid),
            None => format!("Server started with: {}", command),
        };
        Ok(ToolOutput::success(text))
    }
}
