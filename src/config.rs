use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DATABASE_PATH: &str = "data/albums.db";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub request_timeout: Duration,
    pub database: DatabaseConfig,
    /// `None` when no API key is configured; `/chat` then answers 503.
    pub chat: Option<ChatConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Bounds both pool acquisition and each repository operation.
    pub timeout: Duration,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl DatabaseConfig {
    /// Pool settings for a SQLite file, created on first open.
    pub fn for_path(path: &str) -> Self {
        Self {
            url: format!("sqlite:{}?mode=rwc", path),
            max_connections: 5,
            timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let (port_key, port_raw) = match (env_map.get("SERVER_PORT"), env_map.get("PORT")) {
            (Some(v), _) => ("SERVER_PORT", v.as_str()),
            (None, Some(v)) => ("PORT", v.as_str()),
            (None, None) => ("SERVER_PORT", "8080"),
        };
        let port = port_raw.parse::<u16>().map_err(|_| {
            ConfigError::InvalidValue(port_key.to_string(), "must be a valid u16".to_string())
        })?;

        let host = env_map
            .get("SERVER_HOST")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "SERVER_HOST".to_string(),
                    "must be an IP address".to_string(),
                )
            })?;

        let request_timeout = parse_millis(&env_map, "REQUEST_TIMEOUT_MS", 30_000)?;

        let url = match non_empty(&env_map, "DATABASE_URL") {
            Some(url) => {
                if !url.starts_with("sqlite:") {
                    return Err(ConfigError::InvalidValue(
                        "DATABASE_URL".to_string(),
                        format!("must be a sqlite: URL, got {}", url),
                    ));
                }
                url.to_string()
            }
            None => {
                let path = non_empty(&env_map, "DATABASE_PATH").unwrap_or(DEFAULT_DATABASE_PATH);
                DatabaseConfig::for_path(path).url
            }
        };

        let max_connections = env_map
            .get("DB_MAX_CONNECTIONS")
            .map(|s| s.as_str())
            .unwrap_or("5")
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DB_MAX_CONNECTIONS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let database = DatabaseConfig {
            url,
            max_connections,
            timeout: parse_millis(&env_map, "DB_TIMEOUT_MS", 5_000)?,
        };

        let chat = non_empty(&env_map, "OPENAI_API_KEY").map(|api_key| ChatConfig {
            api_key: api_key.to_string(),
            base_url: non_empty(&env_map, "OPENAI_BASE_URL")
                .unwrap_or(DEFAULT_OPENAI_BASE_URL)
                .to_string(),
            model: non_empty(&env_map, "OPENAI_MODEL")
                .unwrap_or(DEFAULT_OPENAI_MODEL)
                .to_string(),
        });

        Ok(Config {
            host,
            port,
            request_timeout,
            database,
            chat,
        })
    }
}

fn non_empty<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn parse_millis(
    env_map: &HashMap<String, String>,
    key: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match env_map.get(key) {
        None => Ok(Duration::from_millis(default_ms)),
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    key.to_string(),
                    "must be a positive number of milliseconds".to_string(),
                )
            }),
    }
}
