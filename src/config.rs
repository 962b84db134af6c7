use chrono::NaiveDateTime;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_ADMIN_URL_PREFIX: &str = "admin-control-center";
pub const DEFAULT_LOGIN_URL_PREFIX: &str = "authenticationpro";
pub const DEFAULT_EVENT_DATE: &str = "2026-04-11T18:00:00";
pub const DEFAULT_DONATION_URL: &str = "https://example.com/donate-to-the-couple";
const EVENT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub api_url: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub admin_url_prefix: String,
    pub login_url_prefix: String,
    pub use_secure_cookies: bool,
    pub static_path: Option<String>,
    pub event_date: NaiveDateTime,
    pub donation_url: String,
    pub remote_timeout_secs: u64,
}

fn fatal(message: impl Into<String>) -> config::ConfigError {
    config::ConfigError::Message(format!("FATAL: {}", message.into()))
}

fn validate_prefix(name: &str, prefix: &str) -> Result<(), config::ConfigError> {
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(fatal(format!(
            "'{}' must not be empty and can only contain letters, numbers, underscores, and hyphens.",
            name
        )));
    }
    Ok(())
}

impl Config {
    /// Loads `env_path` (or `.env` when present) into the process environment,
    /// then builds the configuration from it.
    pub fn from_env(env_path: Option<&Path>) -> Result<Self, config::ConfigError> {
        match env_path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    fatal(format!("Failed to load .env file from '{}'. Error: {}", path.display(), e))
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from a variable lookup, validating every value.
    pub fn from_vars<F>(var: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = var("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        match url::Url::parse(&api_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(fatal(format!("'API_URL' must be an absolute http(s) URL, got '{}'.", api_url))),
        }

        let session_secret_key = var("SESSION_SECRET_KEY")
            .ok_or_else(|| fatal("Environment variable 'SESSION_SECRET_KEY' is not set."))?;
        // 128 hex characters, 64 bytes once decoded.
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(fatal("'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes)."));
        }

        let admin_url_prefix = var("ADMIN_URL_PREFIX").unwrap_or_else(|| DEFAULT_ADMIN_URL_PREFIX.to_string());
        validate_prefix("ADMIN_URL_PREFIX", &admin_url_prefix)?;
        let login_url_prefix = var("LOGIN_URL_PREFIX").unwrap_or_else(|| DEFAULT_LOGIN_URL_PREFIX.to_string());
        validate_prefix("LOGIN_URL_PREFIX", &login_url_prefix)?;
        if admin_url_prefix == login_url_prefix || admin_url_prefix == "api" || login_url_prefix == "api" {
            return Err(fatal("'ADMIN_URL_PREFIX' and 'LOGIN_URL_PREFIX' must differ from each other and from 'api'."));
        }

        let allowed_origins = var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let use_secure_cookies = match var("USE_SECURE_COOKIES") {
            None => false,
            Some(raw) => raw
                .trim()
                .parse::<bool>()
                .map_err(|_| fatal(format!("'USE_SECURE_COOKIES' must be true or false, got '{}'.", raw)))?,
        };

        let static_path = var("STATIC_PATH").filter(|p| !p.trim().is_empty());
        if let Some(path) = &static_path {
            if !Path::new(path).is_dir() {
                return Err(fatal(format!("'STATIC_PATH' ('{}') is not a directory.", path)));
            }
        }

        let event_date = var("EVENT_DATE").unwrap_or_else(|| DEFAULT_EVENT_DATE.to_string());
        let event_date = NaiveDateTime::parse_from_str(event_date.trim(), EVENT_DATE_FORMAT).map_err(|e| {
            fatal(format!("'EVENT_DATE' must look like {}, got '{}': {}", DEFAULT_EVENT_DATE, event_date, e))
        })?;

        let donation_url = var("DONATION_URL").unwrap_or_else(|| DEFAULT_DONATION_URL.to_string());

        let remote_timeout_secs = match var("REMOTE_TIMEOUT_SECS") {
            None => 30,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(fatal(format!("'REMOTE_TIMEOUT_SECS' must be a positive number, got '{}'.", raw))),
            },
        };

        let mut builder = config::Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8080)?
            // Host and port may be overridden from the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml).required(false))
            .set_override("api_url", api_url)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("admin_url_prefix", admin_url_prefix)?
            .set_override("login_url_prefix", login_url_prefix)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("event_date", event_date.format(EVENT_DATE_FORMAT).to_string())?
            .set_override("donation_url", donation_url)?
            .set_override("remote_timeout_secs", remote_timeout_secs)?;
        if let Some(path) = static_path {
            builder = builder.set_override("static_path", path)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn login_path(&self) -> String {
        format!("/{}", self.login_url_prefix)
    }

    pub fn admin_path(&self) -> String {
        format!("/{}", self.admin_url_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn secret() -> String {
        "ab".repeat(64)
    }

    fn build(pairs: &[(&str, &str)]) -> Result<Config, config::ConfigError> {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("SESSION_SECRET_KEY".to_string(), secret());
        for (key, value) in pairs {
            vars.insert(key.to_string(), value.to_string());
        }
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = build(&[]).unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.admin_path(), "/admin-control-center");
        assert_eq!(config.login_path(), "/authenticationpro");
        assert_eq!(config.event_date.format(EVENT_DATE_FORMAT).to_string(), DEFAULT_EVENT_DATE);
        assert_eq!(config.remote_timeout(), Duration::from_secs(30));
        assert!(!config.use_secure_cookies);
        assert!(config.static_path.is_none());
    }

    #[test]
    fn session_key_is_required() {
        let err = Config::from_vars(|_| None).unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET_KEY"));
        assert!(build(&[("SESSION_SECRET_KEY", "abc")]).is_err());
    }

    #[test]
    fn prefixes_must_be_valid_and_distinct() {
        assert!(build(&[("ADMIN_URL_PREFIX", "admin/x")]).is_err());
        assert!(build(&[("ADMIN_URL_PREFIX", "same"), ("LOGIN_URL_PREFIX", "same")]).is_err());
        assert!(build(&[("LOGIN_URL_PREFIX", "api")]).is_err());
        assert!(build(&[("ADMIN_URL_PREFIX", "panel_2")]).is_ok());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(build(&[("API_URL", "localhost:8000")]).is_err());
        assert!(build(&[("API_URL", "ftp://example.com")]).is_err());
        assert!(build(&[("EVENT_DATE", "11/04/2026")]).is_err());
        assert!(build(&[("REMOTE_TIMEOUT_SECS", "0")]).is_err());
        assert!(build(&[("USE_SECURE_COOKIES", "yes")]).is_err());
    }
}
