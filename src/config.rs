//! Layered bot configuration.
//!
//! Sources, highest priority first:
//! 1. `TELEGRAM_TOKEN` (token only) and `AZTRO_*` environment variables
//! 2. a TOML file (`--config PATH`, otherwise `./aztro_bot.toml` when present)
//! 3. built-in defaults

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const TOKEN_VARIABLE: &str = "TELEGRAM_TOKEN";
const DEFAULT_CONFIG_FILE: &str = "aztro_bot.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Failed to read .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("Error: {variable} environment variable not set.")]
    MissingToken { variable: &'static str },

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

const fn default_poll_timeout() -> u64 {
    30
}

const fn default_lookup_timeout() -> u64 {
    10
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    "astro_bot".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    /// Bot API credential. Empty means "not configured".
    #[serde(default)]
    pub telegram_token: String,

    #[serde(default = "default_api_url")]
    pub telegram_api_url: String,

    /// Long-poll wait passed to `getUpdates`.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Upper bound for each geocoding and timezone lookup.
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,

    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            telegram_api_url: default_api_url(),
            poll_timeout_secs: default_poll_timeout(),
            lookup_timeout_secs: default_lookup_timeout(),
            geocoder_url: default_geocoder_url(),
            user_agent: default_user_agent(),
        }
    }
}

impl BotConfig {
    /// Load from defaults, the optional TOML file and the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path.filter(|path| !path.exists()) {
            return Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                reason: format!("{} does not exist", path.display()),
            });
        }
        let config: Self = Self::figment(config_path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`BotConfig::load`], after reading `.env` from the working
    /// directory if there is one. A malformed `.env` is an error.
    pub fn load_with_dotenv(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(ConfigError::Dotenv(err)),
        }
        Self::load(config_path)
    }

    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = config_path
            .map(Path::to_path_buf)
            .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|path| path.exists()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::prefixed("AZTRO_"))
            .merge(Env::raw().only(&[TOKEN_VARIABLE]))
    }

    /// The bot credential, or the fatal startup error when it is absent.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        let token = self.telegram_token.trim();
        if token.is_empty() {
            Err(ConfigError::MissingToken {
                variable: TOKEN_VARIABLE,
            })
        } else {
            Ok(token)
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lookup_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "lookup_timeout_secs".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }
        for (field, url) in [
            ("telegram_api_url", &self.telegram_api_url),
            ("geocoder_url", &self.geocoder_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("expected an http(s) URL, got {url:?}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_correct() {
        let config = BotConfig::default();
        assert!(config.telegram_token.is_empty());
        assert_eq!(config.telegram_api_url, "https://api.telegram.org");
        assert_eq!(config.poll_timeout_secs, 30);
        assert_eq!(config.lookup_timeout(), Duration::from_secs(10));
        assert_eq!(config.user_agent, "astro_bot");
    }

    #[test]
    fn token_comes_from_plain_variable() {
        Jail::expect_with(|jail| {
            jail.set_env("TELEGRAM_TOKEN", "123:abc");
            let config = BotConfig::load(None).expect("config loads");
            assert_eq!(config.require_token().expect("token"), "123:abc");
            Ok(())
        });
    }

    #[test]
    fn missing_token_is_a_startup_error() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config = BotConfig::load(None).expect("config loads");
            let err = config.require_token().unwrap_err();
            assert!(matches!(err, ConfigError::MissingToken { variable: "TELEGRAM_TOKEN" }));
            assert_eq!(err.to_string(), "Error: TELEGRAM_TOKEN environment variable not set.");
            Ok(())
        });
    }

    #[test]
    fn toml_file_and_prefixed_env_layer() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "aztro_bot.toml",
                r#"
                    lookup_timeout_secs = 3
                    geocoder_url = "http://localhost:8080"
                "#,
            )?;
            jail.set_env("AZTRO_POLL_TIMEOUT_SECS", "5");
            let config = BotConfig::load(None).expect("config loads");
            assert_eq!(config.lookup_timeout_secs, 3);
            assert_eq!(config.poll_timeout_secs, 5);
            assert_eq!(config.geocoder_url, "http://localhost:8080");
            Ok(())
        });
    }

    #[test]
    fn explicit_config_file_must_exist() {
        Jail::expect_with(|_jail| {
            let err = BotConfig::load(Some(Path::new("missing.toml"))).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "config"));
            Ok(())
        });
    }

    #[test]
    fn explicit_config_file_is_read() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("bot.toml");
            std::fs::write(&path, "telegram_token = \"from-file\"\nuser_agent = \"test-agent\"\n").expect("write");

            let config = BotConfig::load(Some(&path)).expect("config loads");
            assert_eq!(config.require_token().expect("token"), "from-file");
            assert_eq!(config.user_agent, "test-agent");
            Ok(())
        });
    }

    #[test]
    fn malformed_dotenv_is_reported() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(".env", "this line is not an assignment\n")?;
            let err = BotConfig::load_with_dotenv(None).unwrap_err();
            assert!(matches!(err, ConfigError::Dotenv(_)), "{err}");
            Ok(())
        });
    }

    #[test]
    fn zero_lookup_timeout_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("AZTRO_LOOKUP_TIMEOUT_SECS", "0");
            let err = BotConfig::load(None).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "lookup_timeout_secs"));
            Ok(())
        });
    }
}
