//! Elasticsearch client configuration and construction.
//!
//! The built [`Elasticsearch`] handle is shared read-only across every
//! repository bound to it; the transport manages its own connections and is
//! safe for concurrent use.

use std::time::Duration;

use elasticsearch::Elasticsearch;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Authentication configuration for the search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Configuration for the shared Elasticsearch client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Engine node URLs (e.g., `["http://localhost:9200"]`).
    /// Currently uses the first node (single-node connection pool).
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Request timeout in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ClientAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,
}

fn default_nodes() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_request_timeout_ms() -> u64 {
    30000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            request_timeout_ms: default_request_timeout_ms(),
            auth: None,
            disable_certificate_validation: false,
        }
    }
}

/// Builds the Elasticsearch client from configuration.
///
/// This only constructs the transport; no connection is made until the
/// first request.
pub fn build_client(config: &ClientConfig) -> Result<Elasticsearch, ConfigError> {
    let url = config
        .nodes
        .first()
        .cloned()
        .unwrap_or_else(|| "http://localhost:9200".to_string());

    let parsed_url: elasticsearch::http::Url =
        url.parse().map_err(|e| ConfigError::InvalidNode {
            url: url.clone(),
            message: format!("{e}"),
        })?;

    let conn_pool = SingleNodeConnectionPool::new(parsed_url);

    let mut builder = TransportBuilder::new(conn_pool)
        .timeout(Duration::from_millis(config.request_timeout_ms));

    if config.disable_certificate_validation {
        builder = builder.cert_validation(CertificateValidation::None);
    }

    if let Some(ref auth) = config.auth {
        builder = match auth {
            ClientAuth::Basic { username, password } => {
                builder.auth(Credentials::Basic(username.clone(), password.clone()))
            }
            ClientAuth::Bearer { token } => builder.auth(Credentials::Bearer(token.clone())),
        };
    }

    let transport = builder.build().map_err(|e| ConfigError::Transport {
        message: e.to_string(),
    })?;

    Ok(Elasticsearch::new(transport))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.nodes, vec!["http://localhost:9200"]);
        assert_eq!(config.request_timeout_ms, 30000);
        assert!(config.auth.is_none());
        assert!(!config.disable_certificate_validation);
    }

    #[test]
    fn test_config_serialization() {
        let config = ClientConfig {
            nodes: vec!["http://es1:9200".to_string(), "http://es2:9200".to_string()],
            auth: Some(ClientAuth::Bearer {
                token: "t".to_string(),
            }),
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.nodes, config.nodes);
        assert!(deserialized.auth.is_some());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.nodes, vec!["http://localhost:9200"]);
    }

    #[test]
    fn test_build_client_does_not_connect() {
        let client = build_client(&ClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_client_rejects_invalid_node() {
        let config = ClientConfig {
            nodes: vec!["not a url".to_string()],
            ..Default::default()
        };
        let err = build_client(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNode { .. }));
    }
}
