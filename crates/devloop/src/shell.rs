//! Session shell: where user text comes from and where progress goes
//!
//! The loop controller only talks to [`SessionShell`]; [`TerminalShell`] is the
//! interactive implementation.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use std::time::Duration;

use crate::agent::{Step, TerminationReason};
use crate::tools::ToolResult;

// ANSI colors
const GREEN: &str = "\x1b[92m";
const BLUE: &str = "\x1b[94m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Lines of tool output shown before eliding the rest
const TOOL_PREVIEW_LINES: usize = 12;

/// Status messages the loop asks the shell to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The user said yes; ask what to change next
    RequestChanges,
    /// The continuation answer was not recognized
    AnswerYesOrNo,
    /// The automated turn stopped before `complete`
    TurnAborted(String),
    SessionEnded(TerminationReason),
}

/// Interface between the loop controller and whoever is driving the session
pub trait SessionShell {
    /// Next task or change request. `None` means input is closed.
    fn read_user_text(&mut self) -> Result<Option<String>>;

    /// Raw answer to the continuation question. `None` means input is closed.
    fn ask_continue(&mut self) -> Result<Option<String>>;

    fn print_step(&mut self, step: &Step);

    fn print_tool_result(&mut self, result: &ToolResult);

    fn notify(&mut self, notice: Notice);

    /// Called before waiting on the model
    fn begin_wait(&mut self, _label: &str) {}

    fn end_wait(&mut self) {}
}

/// Interactive terminal shell
pub struct TerminalShell {
    editor: DefaultEditor,
    spinner: Option<ProgressBar>,
}

impl TerminalShell {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            spinner: None,
        })
    }

    /// Print the startup banner
    pub fn print_welcome(&self, model: &str, tools: &[&str]) {
        println!();
        println!("{}devloop{} ready {}({}){}", BOLD, RESET, DIM, model, RESET);
        println!("{}Tools:{} {}", DIM, RESET, tools.join(", "));
        println!("Describe what to build (e.g. 'todo app in React'). Type 'exit' to quit.");
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let line = line.trim().to_string();
                if !line.is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}^C{}", DIM, RESET);
                Ok(None)
            }
            Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SessionShell for TerminalShell {
    fn read_user_text(&mut self) -> Result<Option<String>> {
        println!();
        self.read_line(&format!("{}User >{} ", CYAN, RESET))
    }

    fn ask_continue(&mut self) -> Result<Option<String>> {
        self.read_line("Do you want to make any more changes? (yes/no): ")
    }

    fn print_step(&mut self, step: &Step) {
        match step {
            Step::Plan { content } => println!("{}PLAN:{} {}", BLUE, RESET, content),
            Step::Action {
                content,
                tool,
                input,
            } => {
                if !content.is_empty() {
                    println!("{}{}{}", DIM, content, RESET);
                }
                println!("{}ACTION:{} {} → {}", YELLOW, RESET, tool, format_input(input));
            }
            Step::Observe { content } => println!("{}OBSERVE:{} {}", CYAN, RESET, content),
            Step::Complete { content } => {
                println!("{}COMPLETE:{} {}", GREEN, RESET, content);
                println!("{}", "=".repeat(60));
            }
        }
    }

    fn print_tool_result(&mut self, result: &ToolResult) {
        let (mark, color) = if result.success {
            ("ok", GREEN)
        } else {
            ("failed", YELLOW)
        };
        println!("{}[{}: {}]{}", color, result.tool, mark, RESET);

        let lines: Vec<&str> = result.output.lines().collect();
        for line in lines.iter().take(TOOL_PREVIEW_LINES) {
            println!("{}  {}{}", DIM, line, RESET);
        }
        if lines.len() > TOOL_PREVIEW_LINES {
            println!(
                "{}  ... {} more lines{}",
                DIM,
                lines.len() - TOOL_PREVIEW_LINES,
                RESET
            );
        }
    }

    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::RequestChanges => println!("Okay, what else would you like to modify or add?"),
            Notice::AnswerYesOrNo => println!("Please answer 'yes' or 'no'."),
            Notice::TurnAborted(reason) => {
                println!("{}Stopped:{} {}", YELLOW, RESET, reason);
                println!("Tell me how you would like to continue.");
            }
            Notice::SessionEnded(TerminationReason::UserDeclined) => {
                println!("{}Project finalized. Exiting.{}", GREEN, RESET)
            }
            Notice::SessionEnded(_) => println!("{}Goodbye!{}", DIM, RESET),
        }
    }

    fn begin_wait(&mut self, label: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(label.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn end_wait(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

/// Text inputs print raw; structured inputs print as compact JSON
fn format_input(input: &Value) -> String {
    match input {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_input() {
        assert_eq!(format_input(&json!("npm start")), "npm start");
        assert_eq!(
            format_input(&json!({"path": "a.txt", "content": "x"})),
            r#"{"content":"x","path":"a.txt"}"#
        );
    }
}
