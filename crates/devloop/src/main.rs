//! devloop: a terminal assistant that builds projects step by step
//!
//! Talks to any OpenAI-compatible chat endpoint and drives the built-in
//! tools through a plan/action/observe/complete loop.

mod agent;
mod config;
mod shell;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use llm_core::{ChatClient, ChatOptions};
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use agent::{build_system_prompt, AgentConfig, AgentError, AgentLoop, ChatCompletion, ModelInvoker, RetryPolicy};
use config::Overrides;
use shell::TerminalShell;
use tools::builtin::{create_default_registry, DetachedProcess, DetachedProcesses};
use tools::dispatcher::ToolDispatcher;
use tools::ToolContext;

#[derive(Debug, Parser)]
#[command(name = "devloop")]
#[command(about = "Terminal assistant that plans, runs tools and builds projects", version)]
struct Cli {
    /// Initial task (prompted for when omitted)
    task: Vec<String>,

    /// Model to use (overrides config)
    #[arg(short, long, env = "DEVLOOP_MODEL")]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "DEVLOOP_BASE_URL")]
    base_url: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Directory the tools operate in
    #[arg(short = 'C', long)]
    working_dir: Option<PathBuf>,

    /// Path to a devloop.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// System prompt (replaces the built-in one)
    #[arg(short, long)]
    system: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Flags read their env fallbacks, so .env must be loaded first
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        model: cli.model,
        base_url: cli.base_url,
        temperature: cli.temperature,
        working_dir: cli.working_dir,
        system_prompt: cli.system,
    };
    let config = config::resolve(cli.config.as_deref(), &overrides)?;
    let working_dir = config::working_dir(&config)?;

    // Variables already set are kept
    dotenvy::from_path(working_dir.join(".env")).ok();

    let client = ChatClient::new(
        config.model.base_url.clone(),
        Some(config.model.api_key()?),
        Duration::from_secs(config.model.request_timeout_secs),
    )?;
    let options = ChatOptions::new(config.model.name.clone()).with_temperature(config.model.temperature);
    let invoker = ModelInvoker::new(Arc::new(ChatCompletion::new(client, options)))
        .with_retry(RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(config.agent.retry_delay_ms),
        })
        .with_history_window(config.agent.history_window);

    let detached = DetachedProcesses::new();
    let registry = create_default_registry(&detached);
    let system_prompt = config
        .agent
        .system_prompt
        .clone()
        .unwrap_or_else(|| build_system_prompt(&registry, &working_dir));

    let ctx = ToolContext::new(working_dir.clone())
        .with_command_timeout(config.tools.command_timeout_secs)
        .with_max_output_len(config.tools.max_output_len);
    let dispatcher = ToolDispatcher::new(registry, ctx);

    let shell = TerminalShell::new()?;
    shell.print_welcome(&config.model.name, &dispatcher.registry().list_names());

    let agent_config = AgentConfig::new(system_prompt)
        .with_max_steps(config.agent.max_steps_per_turn)
        .with_max_consecutive_failures(config.agent.max_consecutive_failures);
    let mut agent = AgentLoop::new(invoker, dispatcher, detached.clone(), shell, agent_config);

    info!(
        session = %agent.session_id(),
        model = %config.model.name,
        working_dir = %working_dir.display(),
        "Starting session"
    );

    let initial_task = (!cli.task.is_empty()).then(|| cli.task.join(" "));
    let outcome = tokio::select! {
        result = agent.run(initial_task).instrument(info_span!("devloop", model = %config.model.name)) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(Ok(report)) => print_detached(&report.detached),
        Some(Err(e)) => {
            match &e {
                AgentError::ModelProtocol { .. } => {
                    eprintln!("Failed to get a valid step from the model. Ending the session.")
                }
                _ => eprintln!("Session failed."),
            }
            eprintln!("  {}", e);
            print_detached(&detached.snapshot());
            std::process::exit(1);
        }
        None => {
            warn!("Interrupted by user");
            println!("\nInterrupted.");
            print_detached(&detached.snapshot());
        }
    }

    Ok(())
}

fn print_detached(processes: &[DetachedProcess]) {
    if processes.is_empty() {
        return;
    }

    println!("\nBackground processes started this session (still running unless they exited):");
    for process in processes {
        let pid = process
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  pid {:>6}  {}  {}",
            pid,
            process.started_at.format("%H:%M:%S"),
            process.command
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_env_file_feeds_flag_defaults() {
        let dir = TempDir::new().unwrap();
        let env_file = dir.path().join(".env");
        fs::write(&env_file, "DEVLOOP_BASE_URL=http://localhost:11434/v1\n").unwrap();

        std::env::remove_var("DEVLOOP_BASE_URL");
        dotenvy::from_path(&env_file).unwrap();
        let cli = Cli::try_parse_from(["devloop", "build", "it"]).unwrap();
        std::env::remove_var("DEVLOOP_BASE_URL");

        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(cli.task, vec!["build", "it"]);
    }

    #[test]
    fn test_flag_beats_env() {
        let cli = Cli::try_parse_from(["devloop", "--model", "llama3"]).unwrap();
        assert_eq!(cli.model.as_deref(), Some("llama3"));
    }
}
