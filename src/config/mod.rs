mod control;
mod upstream;

use std::fs;
use std::net::SocketAddr;

use pingora::server::configuration::ServerConf;
use pingora::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cli::Cli;

pub use control::{Log, Prometheus, Sentry};
pub use upstream::{Timeout, Upstream};

pub const SERVER_NAME: &str = "mcp-bridge";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HEALTH_ENDPOINT: &str = "/";
pub const BRIDGE_ENDPOINT: &str = "/bridge";
pub const HEALTH_STATUS: &str = "Bridge is running";
pub const NO_ADDITIONAL_INFO: &str = "No additional info";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:5678/mcp";
pub const DEFAULT_SESSION_KEY: &str = "default";
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

pub const ENV_PORT: &str = "PORT";
pub const ENV_UPSTREAM_URL: &str = "BRIDGE_UPSTREAM_URL";

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,
    #[serde(default)]
    #[validate(nested)]
    pub bridge: BridgeConfig,
    #[validate(nested)]
    pub log: Option<Log>,
    #[validate(nested)]
    pub sentry: Option<Sentry>,
    #[validate(nested)]
    pub prometheus: Option<Prometheus>,
}

/// How an SSE-accepting caller is served.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SseMode {
    /// Buffer the remote reply, then emit it as one `data:` event
    #[default]
    Buffered,
    /// Relay the remote byte stream as it arrives
    Relay,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BridgeConfig {
    #[serde(default = "BridgeConfig::default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "BridgeConfig::default_max_body_size")]
    #[validate(range(min = 1))]
    pub max_body_size: usize,
    #[serde(default)]
    pub sse_mode: SseMode,
    #[serde(default = "BridgeConfig::default_session_key")]
    #[validate(length(min = 1))]
    pub session_key: String,
    #[serde(default)]
    #[validate(nested)]
    pub upstream: Upstream,
}

impl BridgeConfig {
    fn default_listen() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
    }

    fn default_max_body_size() -> usize {
        DEFAULT_MAX_BODY_SIZE
    }

    fn default_session_key() -> String {
        DEFAULT_SESSION_KEY.to_string()
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
            max_body_size: Self::default_max_body_size(),
            sse_mode: SseMode::default(),
            session_key: Self::default_session_key(),
            upstream: Upstream::default(),
        }
    }
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        log::debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        log::trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        log::trace!("Loaded conf: {conf:?}");

        conf.validate()
            .or_err_with(ReadError, || "Conf file validation failed")?;

        Ok(conf)
    }

    /// Builds the effective configuration.
    ///
    /// Precedence is CLI flag, then environment, then config file, then defaults.
    pub fn load_with_overrides<F>(cli: &Cli, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut conf = match &cli.config {
            Some(path) => Self::load_from_yaml(path)?,
            None => Self::default(),
        };

        conf.apply_env_override(env)?;
        conf.apply_cli_override(cli);

        conf.validate()
            .or_err_with(ReadError, || "Invalid bridge configuration")?;
        Ok(conf)
    }

    fn apply_env_override<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = env(ENV_PORT) {
            let port = port.trim().parse::<u16>().or_err_with(ReadError, || {
                format!("{ENV_PORT} must be a port number, got {port:?}")
            })?;
            self.bridge.listen.set_port(port);
        }
        if let Some(url) = env(ENV_UPSTREAM_URL) {
            if url.trim().is_empty() {
                return Error::e_explain(ReadError, format!("{ENV_UPSTREAM_URL} is empty"));
            }
            self.bridge.upstream.url = url.trim().to_string();
        }
        Ok(())
    }

    fn apply_cli_override(&mut self, cli: &Cli) {
        if let Some(port) = cli.port {
            self.bridge.listen.set_port(port);
        }
        if let Some(url) = &cli.upstream {
            self.bridge.upstream.url = url.clone();
        }
        if cli.stream {
            self.bridge.sse_mode = SseMode::Relay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let conf = Config::load_with_overrides(&Cli::default(), env_from(&[])).unwrap();
        assert_eq!(conf.bridge.listen.port(), DEFAULT_PORT);
        assert_eq!(conf.bridge.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(conf.bridge.upstream.timeout.request, 30);
        assert_eq!(conf.bridge.upstream.timeout.stream, 60);
        assert_eq!(conf.bridge.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert_eq!(conf.bridge.session_key, DEFAULT_SESSION_KEY);
        assert_eq!(conf.bridge.sse_mode, SseMode::Buffered);
    }

    #[test]
    fn test_from_yaml() {
        let conf = Config::from_yaml(
            r#"
bridge:
  listen: 127.0.0.1:9000
  sse_mode: relay
  upstream:
    url: https://hooks.example.com/mcp/custom
    timeout:
      request: 5
    headers:
      x-api-key: secret
prometheus:
  address: 127.0.0.1:9091
"#,
        )
        .unwrap();

        assert_eq!(conf.bridge.listen.port(), 9000);
        assert_eq!(conf.bridge.sse_mode, SseMode::Relay);
        assert_eq!(conf.bridge.upstream.url, "https://hooks.example.com/mcp/custom");
        assert_eq!(conf.bridge.upstream.timeout.request, 5);
        assert_eq!(conf.bridge.upstream.timeout.stream, 60);
        assert_eq!(
            conf.bridge.upstream.headers.get("x-api-key").map(String::as_str),
            Some("secret")
        );
        assert!(conf.prometheus.is_some());
        assert!(conf.sentry.is_none());
    }

    #[test]
    fn test_from_yaml_rejects_invalid_upstream() {
        let result = Config::from_yaml(
            r#"
bridge:
  upstream:
    url: "ws://example.com"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_defaults() {
        let conf = Config::load_with_overrides(
            &Cli::default(),
            env_from(&[
                (ENV_PORT, "4100"),
                (ENV_UPSTREAM_URL, "http://10.0.0.2:8080/mcp"),
            ]),
        )
        .unwrap();
        assert_eq!(conf.bridge.listen.port(), 4100);
        assert_eq!(conf.bridge.upstream.url, "http://10.0.0.2:8080/mcp");
    }

    #[test]
    fn test_cli_overrides_env() {
        let cli = Cli {
            port: Some(5200),
            upstream: Some("http://upstream.internal/mcp".to_string()),
            stream: true,
            ..Default::default()
        };
        let conf = Config::load_with_overrides(
            &cli,
            env_from(&[(ENV_PORT, "4100"), (ENV_UPSTREAM_URL, "http://10.0.0.2/mcp")]),
        )
        .unwrap();
        assert_eq!(conf.bridge.listen.port(), 5200);
        assert_eq!(conf.bridge.upstream.url, "http://upstream.internal/mcp");
        assert_eq!(conf.bridge.sse_mode, SseMode::Relay);
    }

    #[test]
    fn test_bad_port_in_env() {
        let result = Config::load_with_overrides(&Cli::default(), env_from(&[(ENV_PORT, "http")]));
        assert!(result.is_err());
    }
}
