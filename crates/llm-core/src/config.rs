//! Configuration management for devloop.toml

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the configuration file searched for in the working directory and its parents
pub const CONFIG_FILE_NAME: &str = "devloop.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub tools: ToolSettings,
}

/// Completion service settings
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Loop controller settings
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_steps")]
    pub max_steps_per_turn: usize,
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// 0 replays the whole transcript
    #[serde(default)]
    pub history_window: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Built-in tool settings
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_max_output_len")]
    pub max_output_len: usize,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model_name() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_steps() -> usize {
    50
}

fn default_max_failures() -> usize {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_command_timeout() -> u64 {
    120
}

fn default_max_output_len() -> usize {
    50000
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            name: default_model_name(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps_per_turn: default_max_steps(),
            max_consecutive_failures: default_max_failures(),
            retry_delay_ms: default_retry_delay(),
            history_window: 0,
            system_prompt: None,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            max_output_len: default_max_output_len(),
            working_dir: None,
        }
    }
}

impl Config {
    /// Load the nearest devloop.toml above `start`, or defaults when there is none
    pub fn discover(start: &Path) -> Result<Self> {
        match Self::find_config_path(start) {
            Ok(path) => Self::load_from(path),
            Err(_) => Ok(Self::default_minimal()),
        }
    }

    /// Configuration used when no devloop.toml exists
    pub fn default_minimal() -> Self {
        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Find devloop.toml by searching `start` and its parents
    pub fn find_config_path(start: &Path) -> Result<PathBuf> {
        let mut current = start.to_path_buf();

        for _ in 0..10 {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        anyhow::bail!("{} not found in {} or parents", CONFIG_FILE_NAME, start.display())
    }
}

impl ModelConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => anyhow::bail!(
                "{} is not set. Export it or add it to a .env file in the working directory",
                self.api_key_env
            ),
        }
    }
}
