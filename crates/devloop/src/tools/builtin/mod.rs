//! Built-in capabilities: shell commands, folders, files and background servers

mod create_folder;
mod run_command;
mod run_server;
mod write_file;

pub use create_folder::CreateFolderTool;
pub use run_command::RunCommandTool;
pub use run_server::{DetachedProcess, DetachedProcesses, RunServerTool};
pub use write_file::WriteFileTool;

use super::registry::ToolRegistry;

/// Create a registry with every built-in tool; `run_server` launches are recorded in `launched`
pub fn create_default_registry(launched: &DetachedProcesses) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(RunCommandTool);
    registry.register(CreateFolderTool);
    registry.register(WriteFileTool);
    registry.register(RunServerTool::new(launched.clone()));

    registry
}

/// Build a command that runs `line` through the platform shell
pub(crate) fn shell_command(line: &str) -> std::process::Command {
    let (shell, flag) = if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };

    let mut cmd = std::process::Command::new(shell);
    cmd.arg(flag).arg(line);
    cmd
}
