//! Configuration loading and management for linkdigest.
//!
//! Loads settings from `linkdigest.toml` with environment variable overrides for
//! sensitive data. Every acquisition channel is optional: a channel whose
//! credentials are absent is skipped, never treated as an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "linkdigest.toml";

/// Desktop browser user agent; some sites refuse obviously automated clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Chat-completion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Full chat-completions URL
    pub endpoint: String,
    /// Model identifier (e.g., "deepseek-chat")
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Total attempts, including the first one
    pub max_retries: u32,
    /// Delay before the second attempt; doubles for every further attempt
    pub retry_delay_secs: u64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_retries: 3,
            retry_delay_secs: 5,
            temperature: 0.1,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Official Twitter/X API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub enabled: bool,
    pub bearer_token: Option<String>,
    pub api_base: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bearer_token: None,
            api_base: "https://api.twitter.com".to_string(),
        }
    }
}

/// Third-party tweet scraper service settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScraperServiceConfig {
    pub endpoint: Option<String>,
    pub key: Option<String>,
}

/// RapidAPI tweet proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RapidApiConfig {
    pub key: Option<String>,
    pub host: String,
}

impl Default for RapidApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            host: "twitter-api45.p.rapidapi.com".to_string(),
        }
    }
}

/// HTTP acquisition settings shared by every channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub page_timeout_secs: u64,
    pub social_timeout_secs: u64,
    pub short_link_timeout_secs: u64,
    /// Page bodies are truncated to this many characters
    pub max_content_length: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            page_timeout_secs: 15,
            social_timeout_secs: 30,
            short_link_timeout_secs: 10,
            max_content_length: 10_000,
        }
    }
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base path for data storage
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data"),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub twitter: TwitterConfig,
    pub scraper_service: ScraperServiceConfig,
    pub rapidapi: RapidApiConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
}

/// Credentials for the official API channel
#[derive(Debug, Clone)]
pub struct OfficialApiCredentials {
    pub bearer_token: String,
    pub api_base: String,
}

/// Credentials for the scraper service channel
#[derive(Debug, Clone)]
pub struct ScraperServiceCredentials {
    pub endpoint: String,
    pub key: String,
}

/// Credentials for the RapidAPI channel
#[derive(Debug, Clone)]
pub struct RapidApiCredentials {
    pub key: String,
    pub host: String,
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    /// when no file exists. Environment overrides are applied either way.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::read_file(&path)?,
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        let home_config = dirs::home_dir()?
            .join(".config")
            .join("linkdigest")
            .join(CONFIG_FILE_NAME);
        home_config.exists().then_some(home_config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(key) = env_string("DEEPSEEK_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(secs) = env_number("DEEPSEEK_API_TIMEOUT") {
            self.llm.timeout_secs = secs;
        }
        if let Some(retries) = env_number("DEEPSEEK_API_MAX_RETRIES") {
            self.llm.max_retries = retries;
        }
        if let Some(secs) = env_number("DEEPSEEK_API_RETRY_DELAY") {
            self.llm.retry_delay_secs = secs;
        }
        if let Some(flag) = env_string("USE_TWITTER_API") {
            self.twitter.enabled = flag.eq_ignore_ascii_case("true");
        }
        if let Some(token) = env_string("TWITTER_BEARER_TOKEN") {
            self.twitter.bearer_token = Some(token);
        }
        if let Some(endpoint) = env_string("SCRAPER_TECH_ENDPOINT") {
            self.scraper_service.endpoint = Some(endpoint);
        }
        if let Some(key) = env_string("SCRAPER_TECH_KEY") {
            self.scraper_service.key = Some(key);
        }
        if let Some(key) = env_string("RAPIDAPI_KEY") {
            self.rapidapi.key = Some(key);
        }
        if let Some(dir) = env_string("LINKDIGEST_DATA_DIR") {
            self.storage.path = PathBuf::from(dir);
        }
    }

    pub fn official_api(&self) -> Option<OfficialApiCredentials> {
        if !self.twitter.enabled {
            return None;
        }
        let bearer_token = non_empty(self.twitter.bearer_token.as_deref())?;
        Some(OfficialApiCredentials {
            bearer_token,
            api_base: self.twitter.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn scraper_service(&self) -> Option<ScraperServiceCredentials> {
        Some(ScraperServiceCredentials {
            endpoint: non_empty(self.scraper_service.endpoint.as_deref())?,
            key: non_empty(self.scraper_service.key.as_deref())?,
        })
    }

    pub fn rapidapi(&self) -> Option<RapidApiCredentials> {
        Some(RapidApiCredentials {
            key: non_empty(self.rapidapi.key.as_deref())?,
            host: self.rapidapi.host.clone(),
        })
    }

    /// The LLM key, if one is configured and non-blank
    pub fn llm_api_key(&self) -> Option<String> {
        non_empty(self.llm.api_key.as_deref())
    }

    /// Log the effective settings without revealing any secret
    pub fn log_redacted(&self) {
        info!(
            endpoint = %self.llm.endpoint,
            model = %self.llm.model,
            api_key = if self.llm_api_key().is_some() { "set" } else { "missing" },
            timeout_secs = self.llm.timeout_secs,
            max_retries = self.llm.max_retries,
            retry_delay_secs = self.llm.retry_delay_secs,
            "llm settings"
        );
        info!(
            official_api = self.official_api().is_some(),
            scraper_service = self.scraper_service().is_some(),
            rapidapi = self.rapidapi().is_some(),
            storage = %self.storage.path.display(),
            "acquisition channels"
        );
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring non-numeric override");
            None
        }
    }
}
