//! llm-core: Shared library for talking to a chat completion service
//!
//! Provides:
//! - Configuration loading (devloop.toml)
//! - OpenAI-compatible chat completion client

pub mod chat;
pub mod config;

pub use chat::{ChatClient, ChatMessage, ChatOptions, Role};
pub use config::{AgentSettings, Config, ModelConfig, ToolSettings};
