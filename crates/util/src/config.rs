use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

use super::{parse_bind_address, DEFAULT_BIND_ADDR};

pub const DEFAULT_DB_HOST: &str = "db";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_WAIT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_WORKERS: u32 = 3;
pub const MAX_WAIT_INTERVAL_MS: u64 = 3_600_000;
pub const MAX_WAIT_TIMEOUT_SECS: u64 = 86_400;
pub const MAX_PROBE_TIMEOUT_MS: u64 = 3_600_000;
pub const MAX_WORKERS: u32 = 1024;
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 86_400;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MANAGE_CMD: &str = "python manage.py";
pub const DEFAULT_GUNICORN_CMD: &str = "gunicorn";
pub const DEFAULT_WSGI_APP: &str = "config.wsgi:application";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the web server should run behind the worker pool.
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns the canonical name used for logging labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Where the database lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub wait_interval: Duration,
    pub wait_timeout: Duration,
    pub probe_timeout: Duration,
}

/// How the framework's management entry point is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementSettings {
    /// Program followed by its leading arguments, e.g. `["python", "manage.py"]`.
    pub manage_cmd: Vec<String>,
    pub skip_makemigrations: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub workers: u32,
    pub request_timeout: Duration,
    pub gunicorn_cmd: Vec<String>,
    pub wsgi_app: String,
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct BootConfig {
    pub environment: Environment,
    pub database: DatabaseSettings,
    pub management: ManagementSettings,
    pub server: ServerSettings,
}

impl BootConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Constructs the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = lookup("APP_ENV").unwrap_or_else(|| "development".to_string());
        let environment = Environment::from_str(env_value.trim())?;

        let host = lookup("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string());
        let host = host.trim();
        if host.is_empty() {
            return Err(ConfigError::EmptyValue("DB_HOST"));
        }

        let port = match lookup("DB_PORT") {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_DB_PORT,
        };

        let database = DatabaseSettings {
            host: host.to_string(),
            port,
            wait_interval: Duration::from_millis(bounded(
                &lookup,
                "DB_WAIT_INTERVAL_MS",
                DEFAULT_WAIT_INTERVAL_MS,
                MAX_WAIT_INTERVAL_MS,
            )?),
            wait_timeout: Duration::from_secs(bounded(
                &lookup,
                "DB_WAIT_TIMEOUT_SECS",
                DEFAULT_WAIT_TIMEOUT_SECS,
                MAX_WAIT_TIMEOUT_SECS,
            )?),
            probe_timeout: Duration::from_millis(bounded(
                &lookup,
                "DB_PROBE_TIMEOUT_MS",
                DEFAULT_PROBE_TIMEOUT_MS,
                MAX_PROBE_TIMEOUT_MS,
            )?),
        };

        let management = ManagementSettings {
            manage_cmd: command_line(&lookup, "MANAGE_CMD", DEFAULT_MANAGE_CMD)?,
            skip_makemigrations: flag(&lookup, "SKIP_MAKEMIGRATIONS")?,
        };

        let raw_bind = lookup("APP_BIND_ADDR");
        let bind_addr =
            parse_bind_address(raw_bind.as_deref()).map_err(|source| ConfigError::BindAddress {
                value: raw_bind.clone().unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
                source,
            })?;
        let workers = bounded(
            &lookup,
            "GUNICORN_WORKERS",
            u64::from(DEFAULT_WORKERS),
            u64::from(MAX_WORKERS),
        )?;
        let workers = u32::try_from(workers).map_err(|_| ConfigError::InvalidNumber {
            key: "GUNICORN_WORKERS",
            value: workers.to_string(),
            max: u64::from(MAX_WORKERS),
        })?;
        let wsgi_app = lookup("WSGI_APP").unwrap_or_else(|| DEFAULT_WSGI_APP.to_string());
        let wsgi_app = wsgi_app.trim();
        if wsgi_app.is_empty() {
            return Err(ConfigError::EmptyValue("WSGI_APP"));
        }

        let server = ServerSettings {
            bind_addr,
            workers,
            request_timeout: Duration::from_secs(bounded(
                &lookup,
                "GUNICORN_TIMEOUT",
                DEFAULT_REQUEST_TIMEOUT_SECS,
                MAX_REQUEST_TIMEOUT_SECS,
            )?),
            gunicorn_cmd: command_line(&lookup, "GUNICORN_CMD", DEFAULT_GUNICORN_CMD)?,
            wsgi_app: wsgi_app.to_string(),
        };

        Ok(Self {
            environment,
            database,
            management,
            server,
        })
    }
}

/// `str::parse` accepts a leading `+`; only plain ASCII digits are valid here.
fn digits(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Some(trimmed)
    } else {
        None
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    let invalid = || ConfigError::InvalidPort(raw.to_string());
    let port: u16 = digits(raw)
        .ok_or_else(invalid)?
        .parse()
        .map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }
    Ok(port)
}

fn bounded<F>(lookup: &F, key: &'static str, default: u64, max: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match digits(&raw).map(str::parse::<u64>) {
        Some(Ok(value)) if (1..=max).contains(&value) => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw,
            max,
        }),
    }
}

fn flag<F>(lookup: &F, key: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key, value: raw }),
    }
}

fn command_line<F>(lookup: &F, key: &'static str, default: &str) -> Result<Vec<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(ConfigError::EmptyValue(key));
    }
    Ok(parts)
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_ENV must be one of 'development', 'production', or 'test' (got {0})")]
    InvalidEnvironment(String),
    #[error("DB_PORT must be an integer between 1 and 65535 (got {0:?})")]
    InvalidPort(String),
    #[error("{key} must be an integer between 1 and {max} (got {value:?})")]
    InvalidNumber {
        key: &'static str,
        value: String,
        max: u64,
    },
    #[error("{key} must be a boolean flag (got {value:?})")]
    InvalidFlag { key: &'static str, value: String },
    #[error("{0} must not be empty")]
    EmptyValue(&'static str),
    #[error("invalid APP_BIND_ADDR value {value:?}: {source}")]
    BindAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ENV_GUARD;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<BootConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BootConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn loads_defaults_in_development() {
        let config = load(&[]).expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.database.host, "db");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.wait_interval, Duration::from_secs(1));
        assert_eq!(config.database.wait_timeout, Duration::from_secs(60));
        assert_eq!(config.management.manage_cmd, vec!["python", "manage.py"]);
        assert!(!config.management.skip_makemigrations);
        assert_eq!(config.server.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.server.workers, 3);
        assert_eq!(config.server.request_timeout, Duration::from_secs(120));
        assert_eq!(config.server.wsgi_app, "config.wsgi:application");
    }

    #[test]
    fn rejects_invalid_environment() {
        let err = load(&[("APP_ENV", "invalid")]).expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));
    }

    #[test]
    fn parses_production_environment() {
        let config = load(&[
            ("APP_ENV", "prod"),
            ("APP_BIND_ADDR", "0.0.0.0:9000"),
            ("GUNICORN_WORKERS", "8"),
            ("GUNICORN_TIMEOUT", "30"),
        ])
        .expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert!(config.environment.is_production());
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.server.workers, 8);
        assert_eq!(config.server.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_malformed_ports() {
        for raw in ["", "abc", "0", "-1", "+5432", "65536", "54 32"] {
            let err = load(&[("DB_PORT", raw)]).expect_err("port should be rejected");
            assert!(
                matches!(&err, ConfigError::InvalidPort(value) if value == raw),
                "unexpected error for {raw:?}: {err}"
            );
        }
    }

    #[test]
    fn caps_wait_timeout_at_one_day() {
        let config = load(&[("DB_WAIT_TIMEOUT_SECS", "86400")]).expect("one day is accepted");
        assert_eq!(config.database.wait_timeout, Duration::from_secs(86_400));

        for raw in ["86401", "18446744073709551615", "+60"] {
            let err = load(&[("DB_WAIT_TIMEOUT_SECS", raw)]).expect_err("timeout should be rejected");
            assert!(
                matches!(
                    &err,
                    ConfigError::InvalidNumber { key: "DB_WAIT_TIMEOUT_SECS", value, max: MAX_WAIT_TIMEOUT_SECS }
                        if value == raw
                ),
                "unexpected error for {raw:?}: {err}"
            );
        }
    }

    #[test]
    fn bind_address_error_names_rejected_value() {
        let err = load(&[("APP_BIND_ADDR", "localhost:http")]).expect_err("bad bind address");
        assert!(matches!(&err, ConfigError::BindAddress { value, .. } if value == "localhost:http"));
        assert!(err.to_string().contains("\"localhost:http\""), "message: {err}");
    }

    #[test]
    fn trims_host_and_rejects_blank_host() {
        let config = load(&[("DB_HOST", " postgres "), ("DB_PORT", "6543")]).expect("loads");
        assert_eq!(config.database.host, "postgres");
        assert_eq!(config.database.port, 6543);

        let err = load(&[("DB_HOST", "   ")]).expect_err("blank host should error");
        assert!(matches!(err, ConfigError::EmptyValue("DB_HOST")));
    }

    #[test]
    fn rejects_zero_wait_timeout_and_workers() {
        let err = load(&[("DB_WAIT_TIMEOUT_SECS", "0")]).expect_err("zero timeout");
        assert!(matches!(err, ConfigError::InvalidNumber { key: "DB_WAIT_TIMEOUT_SECS", .. }));

        let err = load(&[("GUNICORN_WORKERS", "0")]).expect_err("zero workers");
        assert!(matches!(err, ConfigError::InvalidNumber { key: "GUNICORN_WORKERS", .. }));
    }

    #[test]
    fn splits_command_overrides() {
        let config = load(&[
            ("MANAGE_CMD", "sh /srv/app/manage.sh"),
            ("GUNICORN_CMD", "  python -m gunicorn "),
            ("SKIP_MAKEMIGRATIONS", "yes"),
        ])
        .expect("loads");
        assert_eq!(config.management.manage_cmd, vec!["sh", "/srv/app/manage.sh"]);
        assert_eq!(config.server.gunicorn_cmd, vec!["python", "-m", "gunicorn"]);
        assert!(config.management.skip_makemigrations);

        let err = load(&[("MANAGE_CMD", " ")]).expect_err("empty command");
        assert!(matches!(err, ConfigError::EmptyValue("MANAGE_CMD")));

        let err = load(&[("SKIP_MAKEMIGRATIONS", "maybe")]).expect_err("bad flag");
        assert!(matches!(err, ConfigError::InvalidFlag { .. }));
    }

    #[test]
    fn reads_process_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var("DB_HOST", "localhost");
        env::set_var("DB_PORT", "5999");

        let config = BootConfig::from_env().expect("config should load");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5999);

        env::remove_var("DB_HOST");
        env::remove_var("DB_PORT");
    }
}
