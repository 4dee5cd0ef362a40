//! Configuration management
//!
//! The client is configured from environment variables:
//!
//! | variable | default |
//! |---|---|
//! | `FB_PAGE_ACCESS_TOKEN` | required |
//! | `FB_VERIFY_TOKEN` | unset |
//! | `FB_GRAPH_URL` | `https://graph.facebook.com/v2.11` |
//! | `FB_TIMEOUT_SECS` | `30` |
//! | `FB_BODY_ENCODING` | `json` |
//! | `FB_ACCEPT_INVALID_CERTS` | `false` |

use serde::{Deserialize, Serialize};

use crate::error::{MessengerError, Result};

/// Default Graph API base URL
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v2.11";

/// How POST bodies are put on the wire
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// `application/json`
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`, nested values JSON-encoded
    Form,
}

impl std::str::FromStr for BodyEncoding {
    type Err = MessengerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(BodyEncoding::Json),
            "form" | "urlencoded" => Ok(BodyEncoding::Form),
            other => Err(MessengerError::Config(format!(
                "Unknown body encoding: {}",
                other
            ))),
        }
    }
}

/// Messenger client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Page access token
    pub access_token: String,

    /// Webhook verify token
    #[serde(default)]
    pub verify_token: Option<String>,

    /// Graph API base URL, without trailing slash
    #[serde(default = "default_graph_url")]
    pub graph_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// POST body encoding
    #[serde(default)]
    pub encoding: BodyEncoding,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl MessengerConfig {
    /// Create a configuration with defaults for everything but the tokens
    pub fn new(access_token: impl Into<String>, verify_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            verify_token: verify_token.filter(|t| !t.is_empty()),
            graph_url: default_graph_url(),
            timeout_secs: default_timeout_secs(),
            encoding: BodyEncoding::default(),
            accept_invalid_certs: false,
        }
    }

    /// Override the Graph API base URL
    pub fn with_graph_url(mut self, graph_url: impl Into<String>) -> Self {
        self.graph_url = graph_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the POST body encoding
    pub fn with_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = lookup("FB_PAGE_ACCESS_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(MessengerError::AccessTokenNotSet)?;

        let mut config = Self::new(access_token, lookup("FB_VERIFY_TOKEN"));

        if let Some(url) = lookup("FB_GRAPH_URL").filter(|u| !u.is_empty()) {
            config = config.with_graph_url(url);
        }

        if let Some(secs) = lookup("FB_TIMEOUT_SECS") {
            config.timeout_secs = secs.trim().parse().map_err(|_| {
                MessengerError::Config(format!("FB_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            if config.timeout_secs == 0 {
                return Err(MessengerError::Config(
                    "FB_TIMEOUT_SECS must be at least 1".to_string(),
                ));
            }
        }

        if let Some(encoding) = lookup("FB_BODY_ENCODING") {
            config.encoding = encoding.parse()?;
        }

        if let Some(flag) = lookup("FB_ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MessengerConfig::from_lookup(lookup_from(&[("FB_PAGE_ACCESS_TOKEN", "tok")]))
            .unwrap();
        assert_eq!(config.access_token, "tok");
        assert_eq!(config.verify_token, None);
        assert_eq!(config.graph_url, DEFAULT_GRAPH_URL);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.encoding, BodyEncoding::Json);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_missing_access_token() {
        let result = MessengerConfig::from_lookup(lookup_from(&[("FB_VERIFY_TOKEN", "v")]));
        assert!(matches!(result, Err(MessengerError::AccessTokenNotSet)));
    }

    #[test]
    fn test_overrides() {
        let config = MessengerConfig::from_lookup(lookup_from(&[
            ("FB_PAGE_ACCESS_TOKEN", "tok"),
            ("FB_VERIFY_TOKEN", "verify"),
            ("FB_GRAPH_URL", "http://localhost:9000/v19.0/"),
            ("FB_TIMEOUT_SECS", "5"),
            ("FB_BODY_ENCODING", "form"),
            ("FB_ACCEPT_INVALID_CERTS", "true"),
        ]))
        .unwrap();
        assert_eq!(config.verify_token.as_deref(), Some("verify"));
        assert_eq!(config.graph_url, "http://localhost:9000/v19.0");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.encoding, BodyEncoding::Form);
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_empty_verify_token_is_unset() {
        let config = MessengerConfig::new("tok", Some(String::new()));
        assert_eq!(config.verify_token, None);
    }

    #[test]
    fn test_bad_timeout() {
        let result = MessengerConfig::from_lookup(lookup_from(&[
            ("FB_PAGE_ACCESS_TOKEN", "tok"),
            ("FB_TIMEOUT_SECS", "soon"),
        ]));
        assert!(matches!(result, Err(MessengerError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = MessengerConfig::from_lookup(lookup_from(&[
            ("FB_PAGE_ACCESS_TOKEN", "tok"),
            ("FB_TIMEOUT_SECS", "0"),
        ]));
        assert!(matches!(result, Err(MessengerError::Config(_))));
    }

    #[test]
    fn test_unknown_encoding() {
        assert!("xml".parse::<BodyEncoding>().is_err());
        assert_eq!("JSON".parse::<BodyEncoding>().unwrap(), BodyEncoding::Json);
    }
}
