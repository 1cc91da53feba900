//! Elasticsearch connection implementation.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use elasticsearch::auth::Credentials;
use elasticsearch::cat::CatIndicesParts;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::IndicesRefreshParts;
use elasticsearch::{Elasticsearch, SearchParts};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ConnectionError, ExtractResult};
use crate::query::SearchRequest;

use super::SearchConnection;

/// Authentication configuration for Elasticsearch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
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

/// Configuration for an Elasticsearch connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Elasticsearch node URLs (e.g., `["http://localhost:9200"]`).
    /// Currently uses the first node (single-node connection pool).
    pub nodes: Vec<String>,

    /// Request timeout in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,

    /// How many times a search is attempted before giving up (default: 3).
    #[serde(default = "default_max_connection_attempts")]
    pub max_connection_attempts: u32,

    /// Wait between two search attempts in milliseconds (default: 10000).
    #[serde(default = "default_connection_retry_backoff_ms")]
    pub connection_retry_backoff_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_max_connection_attempts() -> u32 {
    3
}

fn default_connection_retry_backoff_ms() -> u64 {
    10000
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["http://localhost:9200".to_string()],
            request_timeout_ms: default_request_timeout_ms(),
            auth: None,
            disable_certificate_validation: false,
            max_connection_attempts: default_max_connection_attempts(),
            connection_retry_backoff_ms: default_connection_retry_backoff_ms(),
        }
    }
}

/// A connection to an Elasticsearch (or OpenSearch) cluster.
///
/// The underlying HTTP transport pools connections, so one instance can be
/// shared by every repository reading from the same cluster.
pub struct ElasticsearchConnection {
    /// The Elasticsearch client.
    client: Elasticsearch,
    /// Configuration.
    config: ElasticsearchConfig,
}

impl Debug for ElasticsearchConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchConnection {
    /// Creates a new connection with the given configuration.
    ///
    /// No request is sent; an unreachable cluster only shows up on first use.
    pub fn new(config: ElasticsearchConfig) -> ExtractResult<Self> {
        let client = Self::build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Builds the Elasticsearch client from configuration.
    fn build_client(config: &ElasticsearchConfig) -> Result<Elasticsearch, ConfigError> {
        let url = config
            .nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());

        let parsed_url: elasticsearch::http::Url =
            url.parse().map_err(|e| ConfigError::InvalidConnection {
                message: format!("Invalid URL {}: {}", url, e),
            })?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);

        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(Duration::from_millis(config.request_timeout_ms));

        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        if let Some(ref auth) = config.auth {
            builder = match auth {
                ElasticsearchAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username.clone(), password.clone()))
                }
                ElasticsearchAuth::Bearer { token } => {
                    builder.auth(Credentials::Bearer(token.clone()))
                }
            };
        }

        let transport = builder
            .build()
            .map_err(|e| ConfigError::InvalidConnection {
                message: format!("Failed to build transport: {}", e),
            })?;

        Ok(Elasticsearch::new(transport))
    }

    /// Returns the Elasticsearch client.
    pub fn client(&self) -> &Elasticsearch {
        &self.client
    }

    /// Returns the connection configuration.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }
}

fn transport_error(operation: &str, e: elasticsearch::Error) -> ConnectionError {
    ConnectionError::Transport {
        message: format!("{} failed: {}", operation, e),
        source: Some(Box::new(e)),
    }
}

/// Turns a non-success response into a rejection, keeping its body.
async fn ensure_success(response: Response) -> Result<Response, ConnectionError> {
    let status = response.status_code();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ConnectionError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SearchConnection for ElasticsearchConnection {
    async fn search(&self, request: &SearchRequest) -> Result<Value, ConnectionError> {
        let response = self
            .client
            .search(SearchParts::Index(&[&request.index]))
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| transport_error("search", e))?;

        let response = ensure_success(response).await?;

        response
            .json::<Value>()
            .await
            .map_err(|e| ConnectionError::malformed(format!("Failed to parse search response: {}", e)))
    }

    async fn cat_indices(&self) -> Result<String, ConnectionError> {
        let response = self
            .client
            .cat()
            .indices(CatIndicesParts::None)
            .send()
            .await
            .map_err(|e| transport_error("cat indices", e))?;

        let response = ensure_success(response).await?;

        response
            .text()
            .await
            .map_err(|e| transport_error("reading cat indices", e))
    }

    async fn refresh(&self, index: &str) -> Result<(), ConnectionError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| transport_error("refresh", e))?;

        ensure_success(response).await?;
        Ok(())
    }

    fn max_connection_attempts(&self) -> u32 {
        self.config.max_connection_attempts
    }

    fn connection_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.config.connection_retry_backoff_ms)
    }
}
