//! Configuration management for GeneProg
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::time::Duration;

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default MCP endpoint for the analysis tool server
pub const DEFAULT_MCP_URL: &str = "http://localhost:8000/mcp";

/// Default number of model/tool rounds per chat turn
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 12;

/// Chat-completion service configuration (OpenAI-compatible API)
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: SecretString,
    /// Default model to use
    pub default_model: String,
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Remote tool provider (MCP server) configuration
#[derive(Debug, Clone)]
pub struct McpConfig {
    /// Streamable HTTP endpoint
    pub url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Orchestration settings
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Round cap for one chat turn
    pub max_tool_rounds: u32,
}

/// Title generation settings
#[derive(Debug, Clone)]
pub struct TitleConfig {
    /// Budget for the model call, after which the fallback title is used
    pub timeout_ms: u64,
    /// Maximum words kept from the model's title
    pub max_words: usize,
    /// Maximum characters kept from the model's title
    pub max_chars: usize,
}

impl TitleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        TitleConfig {
            timeout_ms: 8000,
            max_words: 3,
            max_chars: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter
    pub level: String,
    /// Log format (pretty, json)
    pub format: String,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Completion service settings
    pub openai: OpenAiConfig,
    /// Tool provider settings
    pub mcp: McpConfig,
    /// Orchestration settings
    pub agent: AgentConfig,
    /// Title generation settings
    pub title: TitleConfig,
    /// Logging settings
    pub log: LogConfig,
}

/// Read an environment variable, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = TitleConfig::default();

        Ok(Config {
            openai: OpenAiConfig {
                api_key: SecretString::from(std::env::var("OPENAI_API_KEY")?),
                default_model: std::env::var("OPENAI_MODEL")
                    .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                base_url: std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                timeout_secs: env_or("OPENAI_TIMEOUT_SECS", 120),
            },
            mcp: McpConfig {
                url: std::env::var("MCP_URL").unwrap_or_else(|_| DEFAULT_MCP_URL.to_string()),
                timeout_secs: env_or("MCP_TIMEOUT_SECS", 120),
            },
            agent: AgentConfig {
                max_tool_rounds: env_or("MAX_TOOL_ROUNDS", DEFAULT_MAX_TOOL_ROUNDS),
            },
            title: TitleConfig {
                timeout_ms: env_or("TITLE_TIMEOUT_MS", defaults.timeout_ms),
                max_words: env_or("TITLE_MAX_WORDS", defaults.max_words),
                max_chars: env_or("TITLE_MAX_CHARS", defaults.max_chars),
            },
            log: LogConfig {
                level: std::env::var("RUST_LOG")
                    .unwrap_or_else(|_| "info,geneprog_agent=debug".to_string()),
                format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            },
        })
    }

    /// Create a minimal config for testing
    pub fn minimal() -> Self {
        Config {
            openai: OpenAiConfig {
                api_key: SecretString::from(""),
                default_model: DEFAULT_MODEL.to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                timeout_secs: 120,
            },
            mcp: McpConfig {
                url: DEFAULT_MCP_URL.to_string(),
                timeout_secs: 120,
            },
            agent: AgentConfig {
                max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            },
            title: TitleConfig::default(),
            log: LogConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    /// Validate that all required configuration is present
    pub fn validate(&self) -> Result<()> {
        if self.openai.api_key.expose_secret().is_empty() {
            return Err(Error::Config("OPENAI_API_KEY is required".to_string()));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(Error::Config("MAX_TOOL_ROUNDS must be at least 1".to_string()));
        }
        if let Err(e) = url::Url::parse(&self.mcp.url) {
            return Err(Error::Config(format!("Invalid MCP_URL '{}': {}", self.mcp.url, e)));
        }
        if self.title.max_words == 0 || self.title.max_chars == 0 {
            return Err(Error::Config(
                "TITLE_MAX_WORDS and TITLE_MAX_CHARS must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::minimal();
        config.openai.api_key = SecretString::from("sk-test");
        config
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::minimal();
        assert_eq!(config.openai.default_model, "gpt-4o-mini");
        assert_eq!(config.agent.max_tool_rounds, 12);
        assert!(config.validate().is_err()); // No API key
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_rounds() {
        let mut config = valid_config();
        config.agent.max_tool_rounds = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_mcp_url() {
        let mut config = valid_config();
        config.mcp.url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_title_defaults() {
        let title = TitleConfig::default();
        assert_eq!(title.max_words, 3);
        assert_eq!(title.max_chars, 60);
        assert_eq!(title.timeout(), Duration::from_millis(8000));
    }

    #[test]
    fn test_env_or_falls_back_when_unset() {
        let value: u32 = env_or("GENEPROG_TEST_UNSET_VARIABLE", 7);
        assert_eq!(value, 7);
    }
}
