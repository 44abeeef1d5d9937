//! Configuration data structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Logging level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace,
}

/// What happens to a paginated message once its controls stop (stop button or idle timeout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaginationExit {
    /// Keep the message, strip every reaction from it in one call
    #[serde(rename = "remove_reactions")]
    #[default]
    RemoveReactions,
    /// Delete the whole message
    #[serde(rename = "delete_message")]
    DeleteMessage,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Logging verbosity level
    pub log_level: LogLevel,
    /// Default prompt timeout in seconds (None = wait until answered or canceled)
    pub prompt_timeout_seconds: Option<u32>,
    /// Idle timeout in seconds for reaction pagination (None = stop button only)
    pub pagination_timeout_seconds: Option<u32>,
    /// Minimum delay between reaction add/remove calls, in milliseconds
    pub reaction_rate_limit_ms: u64,
    /// Exit behavior of reaction pagination
    pub pagination_exit: PaginationExit,
    /// Reaction offered as a cancel button on prompts
    pub cancel_reaction: String,
    /// User id the bot posts as
    pub bot_user_id: u64,
    /// Channel used by the console bot
    pub console_channel_id: u64,
    /// User id assigned to lines typed into the console bot
    pub console_user_id: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            prompt_timeout_seconds: Some(30),
            pagination_timeout_seconds: Some(30),
            reaction_rate_limit_ms: 250,
            pagination_exit: PaginationExit::RemoveReactions,
            cancel_reaction: "❌".to_string(),
            bot_user_id: 1,
            console_channel_id: 42,
            console_user_id: 7,
        }
    }
}

impl Configuration {
    /// Load configuration from file
    pub fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Configuration = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Return default configuration if file doesn't exist
            Ok(Configuration::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn default_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir = dirs::config_dir().ok_or("Could not determine config directory")?;
        Ok(config_dir.join("chatloop").join("config.toml"))
    }

    pub fn prompt_timeout(&self) -> Option<Duration> {
        to_duration(self.prompt_timeout_seconds)
    }

    pub fn pagination_timeout(&self) -> Option<Duration> {
        to_duration(self.pagination_timeout_seconds)
    }

    pub fn reaction_rate_limit(&self) -> Duration {
        Duration::from_millis(self.reaction_rate_limit_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Some(timeout) = self.prompt_timeout_seconds {
            if timeout > 3600 {
                errors.push("prompt_timeout_seconds cannot exceed 3600 (1 hour)".to_string());
            }
        }

        if let Some(timeout) = self.pagination_timeout_seconds {
            if timeout > 3600 {
                errors.push("pagination_timeout_seconds cannot exceed 3600 (1 hour)".to_string());
            }
        }

        // 250ms is the fastest reaction rate the gateway tolerates
        if self.reaction_rate_limit_ms < 250 {
            errors.push("reaction_rate_limit_ms must be at least 250".to_string());
        }

        if self.cancel_reaction.trim().is_empty() {
            errors.push("cancel_reaction cannot be empty".to_string());
        }

        if self.console_user_id == self.bot_user_id {
            errors.push("console_user_id must differ from bot_user_id".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Zero seconds is treated the same as no timeout
fn to_duration(seconds: Option<u32>) -> Option<Duration> {
    seconds
        .filter(|s| *s > 0)
        .map(|s| Duration::from_secs(u64::from(s)))
}
