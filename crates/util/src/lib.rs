pub mod config;

use std::net::SocketAddr;

pub use config::{
    BootConfig, ConfigError, DatabaseSettings, Environment, ManagementSettings, ServerSettings,
};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production images
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Parses the address the web server should bind to, falling back to
/// [`DEFAULT_BIND_ADDR`] when `APP_BIND_ADDR` is not set.
pub(crate) fn parse_bind_address(
    value: Option<&str>,
) -> Result<SocketAddr, std::net::AddrParseError> {
    value.unwrap_or(DEFAULT_BIND_ADDR).trim().parse()
}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_address_when_unset() {
        let addr = parse_bind_address(None).expect("default address is valid");
        assert_eq!(addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn parses_custom_address() {
        let addr = parse_bind_address(Some(" 127.0.0.1:9000 ")).expect("custom address should parse");
        assert_eq!(addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn rejects_address_without_port() {
        assert!(parse_bind_address(Some("0.0.0.0")).is_err());
    }
}
