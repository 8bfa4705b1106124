//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for gridmate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// Maximum tokens per response
    pub max_tokens: Option<u32>,
    /// Extended-thinking token budget
    pub thinking_budget: Option<u32>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridmate")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("GRIDMATE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some(gridmate_ai::models::default_model().id),
            max_tokens: Some(4096),
            thinking_budget: Some(2000),
            api_keys: ApiKeys::default(),
        };
        default_config.save()?;
        Ok(path)
    }

    /// Get the API key, checking config then environment
    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_keys.anthropic {
            return Some(key.clone());
        }
        std::env::var("ANTHROPIC_API_KEY").ok()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# gridmate configuration file
# Place at ~/.config/gridmate/config.toml (Linux/Mac) or %APPDATA%\gridmate\config.toml (Windows)

# Default model to use
model = "claude-haiku-4-5-20251001"

# Maximum tokens per response
max_tokens = 4096

# Extended-thinking token budget
thinking_budget = 2000

# API keys (optional - can also use the ANTHROPIC_API_KEY environment variable)
# It's recommended to use environment variables instead for security
[api_keys]
# anthropic = "sk-ant-..."
"#
}
