//! Synchronous shell command execution

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::time::{timeout, Duration};

use super::shell_command;
use crate::tools::{CommandInput, Tool, ToolContext, ToolError, ToolOutput};

/// Runs a command through the shell and waits for it to finish
pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the project directory and wait for it to finish. Returns stdout and stderr."
    }

    fn input_shape(&self) -> &str {
        "command: str"
    }

    async fn execute(&self, input: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let command = CommandInput::parse(self.name(), input)?;

        if !ctx.working_dir.exists() {
            return Err(ToolError::Io {
                action: "cannot enter working directory",
                path: ctx.working_dir.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let mut cmd = tokio::process::Command::from(shell_command(&command));
        cmd.current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let secs = ctx.command_timeout_secs;
        let output = match timeout(Duration::from_secs(secs), cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(ToolError::Spawn { command, source }),
            Err(_) => return Err(ToolError::Timeout { command, secs }),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut combined = String::new();
        combined.push_str(&stdout);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        let combined = ctx.truncate(combined);

        if output.status.success() {
            Ok(ToolOutput::success(combined))
        } else {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let mut text = combined;
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("[exit status: {}]", code));
            Ok(ToolOutput::failure(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_command_echo() {
        let ctx = ToolContext::default();
        let output = RunCommandTool.execute(&json!("echo 'hello world'"), &ctx).await.unwrap();

        assert!(output.success);
        assert!(output.text.contains("hello world"));
    }

    #[tokio::test]
    async fn test_run_command_uses_working_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("marker.txt"), "x").unwrap();
        let ctx = ToolContext::new(temp_dir.path().to_path_buf());

        let output = RunCommandTool.execute(&json!({"command": "ls"}), &ctx).await.unwrap();
        assert!(output.text.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_run_command_merges_stderr() {
        let ctx = ToolContext::default();
        let output = RunCommandTool
            .execute(&json!("echo out; echo 'error message' >&2"), &ctx)
            .await
            .unwrap();

        assert!(output.text.contains("out"));
        assert!(output.text.contains("error message"));
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit() {
        let ctx = ToolContext::default();
        let output = RunCommandTool.execute(&json!("exit 3"), &ctx).await.unwrap();

        assert!(!output.success);
        assert!(output.text.contains("[exit status: 3]"));
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let ctx = ToolContext::default().with_command_timeout(1);
        let err = RunCommandTool.execute(&json!("sleep 10"), &ctx).await.unwrap_err();

        assert!(matches!(err, ToolError::Timeout { secs: 1, .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_run_command_rejects_mapping_without_command() {
        let ctx = ToolContext::default();
        let err = RunCommandTool.execute(&json!({"cmd": "ls"}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }
}
