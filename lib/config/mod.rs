use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// SMTP relay used for failure alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    /// Default: 25
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub from: String,
    pub recipients: Vec<String>,
    /// `None` disables mail delivery; failures are still logged.
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_url: String,
    /// Default: 2
    pub db_pool_size: usize,
    /// Default: 120 seconds
    pub poll_interval: Duration,
    /// Default: `poller_error_log.txt`
    pub error_log_path: PathBuf,
    pub alerts: AlertConfig,
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let db_pool_size = parse_or(&lookup, "DB_POOL_SIZE", 2usize)?;
        if db_pool_size == 0 {
            return Err(invalid("DB_POOL_SIZE", "0"));
        }

        let poll_secs = parse_or(&lookup, "POLL_INTERVAL_SECS", 120u64)?;
        if poll_secs == 0 {
            return Err(invalid("POLL_INTERVAL_SECS", "0"));
        }

        let error_log_path = lookup("ERROR_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("poller_error_log.txt"));

        let from = lookup("ALERT_FROM").unwrap_or_else(|| "poller.exception@localhost".to_string());
        let recipients = lookup("ALERT_RECIPIENTS")
            .map(|raw| parse_recipients(&raw))
            .unwrap_or_default();

        let smtp = match lookup("SMTP_HOST").filter(|host| !host.trim().is_empty()) {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 25u16)?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD"),
            }),
            None => None,
        };

        let metrics_addr = match lookup("METRICS_ADDR") {
            Some(raw) => Some(
                raw.parse::<SocketAddr>()
                    .map_err(|_| invalid("METRICS_ADDR", &raw))?,
            ),
            None => None,
        };

        Ok(Self {
            db_url,
            db_pool_size,
            poll_interval: Duration::from_secs(poll_secs),
            error_log_path,
            alerts: AlertConfig {
                from,
                recipients,
                smtp,
            },
            metrics_addr,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| invalid(name, &raw)),
        None => Ok(default),
    }
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}
