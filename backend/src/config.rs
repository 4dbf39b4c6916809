use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Process configuration, read once at startup from flags or environment.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Route narratives and chat over external map and model APIs")]
pub struct Settings {
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, env = "APP_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Chat is disabled when no key is supplied
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,
    #[arg(long, env = "MODEL_NAME", default_value = "gpt-5-mini")]
    pub model_name: String,

    #[arg(long, env = "YANDEX_GEOCODER_API_KEY", hide_env_values = true)]
    pub yandex_geocoder_api_key: String,
    #[arg(long, env = "YANDEX_GEOCODER_URL", default_value = "https://geocode-maps.yandex.ru/v1")]
    pub yandex_geocoder_url: String,

    #[arg(long, env = "ORS_API_KEY", hide_env_values = true)]
    pub ors_api_key: String,
    #[arg(
        long,
        env = "ORS_DIRECTIONS_URL",
        default_value = "https://api.openrouteservice.org/v2/directions/driving-car/geojson"
    )]
    pub ors_directions_url: String,

    #[arg(long, env = "SYSTEM_PROMPT_PATH", default_value = "prompts/main_guide.md")]
    pub system_prompt_path: PathBuf,
    #[arg(long, env = "CONVERSATIONS_DIR", default_value = "conversations")]
    pub conversations_dir: PathBuf,
    /// Keep only the most recent N history messages in each model call
    #[arg(long, env = "MAX_HISTORY_MESSAGES")]
    pub max_history_messages: Option<usize>,

    /// Simultaneous reverse-geocode calls allowed in flight
    #[arg(long, env = "REV_GEOCODER_CONCURRENCY", default_value_t = 4)]
    pub rev_geocoder_concurrency: usize,
    #[arg(long, env = "REV_GEOCODER_CACHE_SIZE", default_value_t = 1024)]
    pub rev_geocoder_cache_size: usize,

    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 25)]
    pub http_timeout_secs: u64,
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT_SECS", default_value_t = 15)]
    pub http_connect_timeout_secs: u64,

    #[arg(long, env = "LOGLEVEL", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.yandex_geocoder_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("YANDEX_GEOCODER_API_KEY"));
        }
        if self.ors_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("ORS_API_KEY"));
        }
        if self.rev_geocoder_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "REV_GEOCODER_CONCURRENCY",
                reason: "must be at least 1".into(),
            });
        }
        if self.rev_geocoder_cache_size == 0 {
            return Err(ConfigError::Invalid {
                field: "REV_GEOCODER_CACHE_SIZE",
                reason: "must be at least 1".into(),
            });
        }
        if self.http_timeout_secs == 0 || self.http_connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "HTTP_TIMEOUT_SECS",
                reason: "timeouts must be positive".into(),
            });
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                field: "APP_HOST",
                reason: e.to_string(),
            })
    }

    /// The model key, treating a blank value as absent.
    pub fn openai_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Settings {
        let mut args = vec!["routescribe", "--yandex-geocoder-api-key", "yandex-key"];
        if !extra.contains(&"--ors-api-key") {
            args.extend_from_slice(&["--ors-api-key", "ors-key"]);
        }
        args.extend_from_slice(extra);
        Settings::try_parse_from(args).expect("settings parse")
    }

    #[test]
    fn defaults_validate() {
        let settings = parse(&["--host", "127.0.0.1", "--port", "9000"]);
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(settings.socket_addr().unwrap().port(), 9000);
        assert_eq!(settings.http_timeout(), Duration::from_secs(settings.http_timeout_secs));
    }

    #[test]
    fn blank_key_is_missing() {
        let settings = parse(&["--ors-api-key", "  "]);
        assert_eq!(settings.validate(), Err(ConfigError::Missing("ORS_API_KEY")));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let settings = parse(&["--rev-geocoder-concurrency", "0"]);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "REV_GEOCODER_CONCURRENCY", .. })
        ));
    }

    #[test]
    fn bad_host_is_rejected() {
        let settings = parse(&["--host", "not a host"]);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn blank_openai_key_disables_chat() {
        let settings = parse(&["--openai-api-key", " "]);
        assert_eq!(settings.openai_key(), None);
        let settings = parse(&["--openai-api-key", "sk-test"]);
        assert_eq!(settings.openai_key(), Some("sk-test"));
    }
}
