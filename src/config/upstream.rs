use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

use super::DEFAULT_UPSTREAM_URL;

/// The single remote MCP endpoint every bridged request is forwarded to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Upstream {
    #[serde(default = "Upstream::default_url")]
    #[validate(length(min = 1), custom(function = "Upstream::validate_url"))]
    pub url: String,
    #[serde(default)]
    #[validate(nested)]
    pub timeout: Timeout,
    /// Extra headers sent with every outbound request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Upstream {
    fn default_url() -> String {
        DEFAULT_UPSTREAM_URL.to_string()
    }

    fn validate_url(url: &str) -> Result<(), ValidationError> {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
                Ok(())
            }
            Ok(_) => {
                let mut err = ValidationError::new("unsupported_upstream_scheme");
                err.add_param("url".into(), &url);
                Err(err)
            }
            Err(_) => {
                let mut err = ValidationError::new("invalid_upstream_url");
                err.add_param("url".into(), &url);
                Err(err)
            }
        }
    }
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            timeout: Timeout::default(),
            headers: HashMap::new(),
        }
    }
}

/// Outbound timeouts in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Timeout {
    /// Bound for buffered round-trips, handshakes included
    #[serde(default = "Timeout::default_request")]
    #[validate(range(min = 1))]
    pub request: u64,
    /// Bound for a live-relayed stream, headers to last chunk
    #[serde(default = "Timeout::default_stream")]
    #[validate(range(min = 1))]
    pub stream: u64,
}

impl Timeout {
    fn default_request() -> u64 {
        30
    }

    fn default_stream() -> u64 {
        60
    }

    pub fn request_duration(&self) -> Duration {
        Duration::from_secs(self.request)
    }

    pub fn stream_duration(&self) -> Duration {
        Duration::from_secs(self.stream)
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self {
            request: Self::default_request(),
            stream: Self::default_stream(),
        }
    }
}
