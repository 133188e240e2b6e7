//! Runtime settings: devloop.toml overlaid with command-line flags

use anyhow::{Context, Result};
use llm_core::Config;
use std::path::{Path, PathBuf};

/// Values given on the command line; `None` keeps the file setting
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub working_dir: Option<PathBuf>,
    pub system_prompt: Option<String>,
}

/// Load the configuration and apply `overrides`.
///
/// An explicit `config_path` must exist. Otherwise the nearest devloop.toml
/// above the current directory is used, falling back to defaults.
pub fn resolve(config_path: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::load_from(path)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            Config::discover(&cwd)?
        }
    };

    apply(&mut config, overrides);
    Ok(config)
}

pub fn apply(config: &mut Config, overrides: &Overrides) {
    if let Some(model) = &overrides.model {
        config.model.name = model.clone();
    }
    if let Some(base_url) = &overrides.base_url {
        config.model.base_url = base_url.clone();
    }
    if let Some(temperature) = overrides.temperature {
        config.model.temperature = temperature;
    }
    if let Some(dir) = &overrides.working_dir {
        config.tools.working_dir = Some(dir.clone());
    }
    if let Some(prompt) = &overrides.system_prompt {
        config.agent.system_prompt = Some(prompt.clone());
    }
}

/// Directory the tools operate in; must already exist
pub fn working_dir(config: &Config) -> Result<PathBuf> {
    let dir = match &config.tools.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    dir.canonicalize()
        .with_context(|| format!("Working directory {} does not exist", dir.display()))
}
