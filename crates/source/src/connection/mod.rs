//! Connections to a search backend.
//!
//! The extraction core talks to the cluster only through [`SearchConnection`].
//! The trait covers the three calls the core needs (search, index listing,
//! index refresh) plus the retry settings the connection was configured with.
//!
//! # Available Connections
//!
//! | Connection | Feature | Description |
//! |------------|---------|-------------|
//! | [`ElasticsearchConnection`] | `elasticsearch` | HTTP client for Elasticsearch and OpenSearch |
//!
//! Implementations must be safe to share between concurrently running
//! repositories; the core never issues concurrent requests itself.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConnectionError;
use crate::query::SearchRequest;

#[cfg(feature = "elasticsearch")]
mod elasticsearch;

#[cfg(feature = "elasticsearch")]
pub use self::elasticsearch::{ElasticsearchAuth, ElasticsearchConfig, ElasticsearchConnection};

/// The backend operations consumed by the extraction core.
#[async_trait]
pub trait SearchConnection: Send + Sync {
    /// Executes a search and returns the raw response body.
    async fn search(&self, request: &SearchRequest) -> Result<Value, ConnectionError>;

    /// Returns the plain-text index listing, one index per line.
    async fn cat_indices(&self) -> Result<String, ConnectionError>;

    /// Makes recently written documents of `index` visible to searches.
    async fn refresh(&self, index: &str) -> Result<(), ConnectionError>;

    /// How many times a search may be attempted.
    fn max_connection_attempts(&self) -> u32;

    /// How long to wait between two search attempts.
    fn connection_retry_backoff(&self) -> Duration;
}
