//! Configuration file support.
//!
//! Loads settings from `~/.config/clusterix/config.toml` on Linux
//! (or platform-appropriate location on other OSes).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::{ClientConfig, DEFAULT_PORT};
use crate::login::{Credentials, LoginConfig};

/// Application configuration loaded from TOML file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cluster node hostname.
    pub host: String,

    /// Cluster node port.
    pub port: u16,

    /// Username for login, usually your callsign.
    pub username: String,

    /// Password for nodes that ask for one.
    pub password: String,

    /// Log all wire traffic.
    pub trace: bool,

    /// Whether to automatically reconnect on disconnect.
    pub reconnect: bool,

    /// Seconds between reconnection attempts.
    pub retry_interval: u64,

    /// Connection timeout in seconds.
    pub connect_timeout: u64,

    /// Read-idle period in milliseconds after which received text is handled.
    pub quiet_period_ms: u64,

    /// Ready banners in addition to the built-in ones.
    pub ready_banners: Vec<String>,

    /// Print statistics every N seconds (0 = never).
    pub stats_interval: u64,

    /// Enable Prometheus metrics HTTP endpoint.
    pub metrics_enabled: bool,

    /// Port for Prometheus metrics HTTP endpoint.
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            trace: false,
            reconnect: false,
            retry_interval: 30,
            connect_timeout: 5,
            quiet_period_ms: 100,
            ready_banners: Vec::new(),
            stats_interval: 0,
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
            }
            _ => Ok(Config::default()),
        }
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clusterix/config.toml"))
    }

    /// Build the client configuration.
    pub fn client_config(&self) -> ClientConfig {
        let login = self
            .ready_banners
            .iter()
            .fold(LoginConfig::default(), |login, banner| {
                login.with_ready_banner(banner.as_str())
            });

        ClientConfig {
            host: self.host.clone(),
            port: self.port,
            credentials: Credentials::new(self.username.as_str(), self.password.as_str()),
            trace: self.trace,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            quiet_period: Duration::from_millis(self.quiet_period_ms),
            retry_interval: Duration::from_secs(self.retry_interval),
            login,
        }
    }
}

/// Parse a `host[:port]` argument.
///
/// IPv6 literals go in brackets (`[::1]:7300`). An empty host means
/// `localhost`, a missing port means the telnet default.
pub fn parse_host_port(arg: &str) -> Result<(String, u16), String> {
    let arg = arg.trim();
    let (host, port) = match arg.rsplit_once(':') {
        Some((host, port))
            if port.bytes().all(|b| b.is_ascii_digit())
                && (!host.contains(':') || host.ends_with(']')) =>
        {
            (host, Some(port))
        }
        _ => (arg, None),
    };

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    let host = if host.is_empty() { "localhost" } else { host };

    let port = match port {
        None | Some("") => DEFAULT_PORT,
        Some(p) => p
            .parse()
            .map_err(|_| format!("invalid port in host address: {}", arg))?,
    };

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.reconnect);
        assert!(!config.metrics_enabled);
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            username = "DL1ABC"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.username, "DL1ABC");
        // Other fields should use defaults
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            host = "dxc.example.net"
            port = 7300
            username = "DL1ABC"
            password = "secret"
            trace = true
            reconnect = true
            retry_interval = 10
            connect_timeout = 15
            quiet_period_ms = 250
            ready_banners = ["MyNode>"]
            stats_interval = 60
            metrics_enabled = true
            metrics_port = 9091
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.host, "dxc.example.net");
        assert_eq!(config.port, 7300);
        assert!(config.trace);
        assert!(config.reconnect);
        assert_eq!(config.stats_interval, 60);
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_port, 9091);

        let client = config.client_config();
        assert_eq!(client.address(), "dxc.example.net:7300");
        assert_eq!(client.credentials.password, "secret");
        assert_eq!(client.retry_interval, Duration::from_secs(10));
        assert_eq!(client.connect_timeout, Duration::from_secs(15));
        assert_eq!(client.quiet_period, Duration::from_millis(250));
        assert_eq!(client.login.ready_banners.last().unwrap(), "mynode>");
    }

    #[test]
    fn test_malformed_toml() {
        assert!(toml::from_str::<Config>("port = \"telnet\"").is_err());
    }

    #[test]
    fn test_parse_host_port() {
        assert_eq!(
            parse_host_port("dxc.example.net:7300").unwrap(),
            ("dxc.example.net".to_string(), 7300)
        );
        assert_eq!(
            parse_host_port("dxc.example.net").unwrap(),
            ("dxc.example.net".to_string(), 23)
        );
        assert_eq!(
            parse_host_port("dxc.example.net:").unwrap(),
            ("dxc.example.net".to_string(), 23)
        );
        assert_eq!(parse_host_port("").unwrap(), ("localhost".to_string(), 23));
        assert_eq!(parse_host_port(":8000").unwrap(), ("localhost".to_string(), 8000));
    }

    #[test]
    fn test_parse_host_port_ipv6() {
        assert_eq!(parse_host_port("[::1]:7300").unwrap(), ("::1".to_string(), 7300));
        assert_eq!(parse_host_port("[::1]").unwrap(), ("::1".to_string(), 23));
        assert_eq!(parse_host_port("::1").unwrap(), ("::1".to_string(), 23));
    }

    #[test]
    fn test_parse_host_port_errors() {
        assert!(parse_host_port("dxc.example.net:99999").is_err());
    }
}
