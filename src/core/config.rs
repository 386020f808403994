//! Configuration management for Colloquy
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/colloquy/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{ColloquyError, Result};

/// Main configuration for Colloquy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model endpoint configuration
    pub model: ModelConfig,
    /// Agent loop configuration
    pub agent: AgentConfig,
    /// Streaming configuration
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Model endpoint configuration
///
/// The endpoint is any OpenAI-compatible chat completions server; the base
/// url is taken verbatim and `/chat/completions` is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the completions endpoint
    pub base_url: String,
    /// Model identifier sent with every request
    pub name: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model/tool rounds per invocation before the loop is cut off
    /// Default: 5
    pub max_rounds: usize,
    /// Timeout for one round of tool execution, in seconds
    pub tool_timeout_secs: u64,
    /// Relay channel capacity (in-flight wire events per invocation)
    pub relay_capacity: usize,
}

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Whether to stream model output token-by-token
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            agent: AgentConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("COLLOQUY_MODEL_URL")
                .unwrap_or_else(|_| "http://localhost:3102/v1".to_string()),
            name: env::var("COLLOQUY_MODEL").unwrap_or_else(|_| "c1-nightly".to_string()),
            api_key_env: "COLLOQUY_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: env::var("COLLOQUY_MAX_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            tool_timeout_secs: 30,
            relay_capacity: 64,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: env::var("COLLOQUY_STREAMING")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("colloquy")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        // Try to load from config file
        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(ColloquyError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ColloquyError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ColloquyError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| ColloquyError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ColloquyError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| ColloquyError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.model.api_key_env).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "c1-nightly");
        assert_eq!(config.agent.max_rounds, 5);
        assert_eq!(config.model.timeout_secs, 120);
        assert!(config.streaming.enabled);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("max_rounds"));
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("colloquy"));
    }
}
