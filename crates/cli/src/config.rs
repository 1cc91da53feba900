//! Extractor configuration.
//!
//! Every flag can also be set through an environment variable.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ELASTIC_SOURCE_NODES` | http://localhost:9200 | Cluster node URLs (comma-separated) |
//! | `ELASTIC_SOURCE_USERNAME` | | Basic auth username |
//! | `ELASTIC_SOURCE_PASSWORD` | | Basic auth password |
//! | `ELASTIC_SOURCE_INSECURE` | false | Skip certificate validation |
//! | `ELASTIC_SOURCE_REQUEST_TIMEOUT` | 30s | Per-request timeout |
//! | `ELASTIC_SOURCE_MAX_CONNECTION_ATTEMPTS` | 3 | Attempts per search |
//! | `ELASTIC_SOURCE_RETRY_BACKOFF` | 10s | Wait between attempts |
//! | `ELASTIC_SOURCE_INDEX_PREFIX` | | Only indices starting with this prefix |
//! | `ELASTIC_SOURCE_CURSOR_FIELD` | | Primary cursor field |
//! | `ELASTIC_SOURCE_SECONDARY_CURSOR_FIELD` | | Tie-breaking cursor field |
//! | `ELASTIC_SOURCE_PAGE_SIZE` | 5000 | Documents per page |
//! | `ELASTIC_SOURCE_CURSOR` | | Cursor token to resume from |
//! | `ELASTIC_SOURCE_MAX_PAGES` | | Stop after this many pages per index |
//! | `ELASTIC_SOURCE_REFRESH` | false | Refresh each index before reading |
//! | `ELASTIC_SOURCE_LOG_LEVEL` | info | Log level |

use std::time::Duration;

use clap::Parser;
use elastic_source::connection::{ElasticsearchAuth, ElasticsearchConfig};
use elastic_source::repository::DEFAULT_PAGE_SIZE;

/// Drains Elasticsearch or OpenSearch indices as newline-delimited JSON.
#[derive(Debug, Clone, Parser)]
#[command(name = "elastic-source")]
#[command(about = "Incrementally extract documents from Elasticsearch/OpenSearch indices")]
pub struct ExtractorConfig {
    /// Cluster node URLs (comma-separated). Only the first one is used.
    #[arg(long, env = "ELASTIC_SOURCE_NODES", default_value = "http://localhost:9200")]
    pub nodes: String,

    /// Username for basic authentication.
    #[arg(long, env = "ELASTIC_SOURCE_USERNAME")]
    pub username: Option<String>,

    /// Password for basic authentication.
    #[arg(long, env = "ELASTIC_SOURCE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Skip TLS certificate validation.
    #[arg(long, env = "ELASTIC_SOURCE_INSECURE")]
    pub insecure: bool,

    /// Per-request timeout (e.g. `30s`, `2m`).
    #[arg(long, env = "ELASTIC_SOURCE_REQUEST_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub request_timeout: Duration,

    /// How many times a search is attempted before giving up.
    #[arg(long, env = "ELASTIC_SOURCE_MAX_CONNECTION_ATTEMPTS", default_value = "3")]
    pub max_connection_attempts: u32,

    /// Wait between two search attempts (e.g. `10s`, `500ms`).
    #[arg(long, env = "ELASTIC_SOURCE_RETRY_BACKOFF", default_value = "10s", value_parser = humantime::parse_duration)]
    pub retry_backoff: Duration,

    /// Only read indices whose name starts with this prefix.
    #[arg(long, env = "ELASTIC_SOURCE_INDEX_PREFIX", default_value = "")]
    pub index_prefix: String,

    /// Field the cursor advances on (dotted paths and `.keyword` fields allowed).
    #[arg(long, env = "ELASTIC_SOURCE_CURSOR_FIELD")]
    pub cursor_field: String,

    /// Field breaking ties on the cursor field. Enables composite pagination.
    #[arg(long, env = "ELASTIC_SOURCE_SECONDARY_CURSOR_FIELD")]
    pub secondary_cursor_field: Option<String>,

    /// Documents per page.
    #[arg(long, env = "ELASTIC_SOURCE_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Cursor token to resume from, as printed by a previous run.
    /// The index prefix must then match exactly one index.
    #[arg(long, env = "ELASTIC_SOURCE_CURSOR")]
    pub cursor: Option<String>,

    /// Stop after this many pages per index.
    #[arg(long, env = "ELASTIC_SOURCE_MAX_PAGES")]
    pub max_pages: Option<usize>,

    /// Refresh each index before reading it.
    #[arg(long, env = "ELASTIC_SOURCE_REFRESH")]
    pub refresh: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "ELASTIC_SOURCE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ExtractorConfig {
    /// Returns the node URLs, trimmed, without empty entries.
    pub fn node_list(&self) -> Vec<String> {
        self.nodes
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validates the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.node_list().is_empty() {
            errors.push("At least one node URL is required".to_string());
        }

        if self.max_connection_attempts == 0 {
            errors.push("Max connection attempts cannot be 0".to_string());
        }

        if self.page_size == 0 {
            errors.push("Page size cannot be 0".to_string());
        }

        if self.cursor_field.trim().is_empty() {
            errors.push("Cursor field cannot be empty".to_string());
        }

        if let Some(secondary) = &self.secondary_cursor_field {
            if secondary.trim().is_empty() {
                errors.push("Secondary cursor field cannot be empty".to_string());
            } else if secondary == &self.cursor_field {
                errors.push("Secondary cursor field must differ from the cursor field".to_string());
            }
        }

        if self.max_pages == Some(0) {
            errors.push("Max pages cannot be 0".to_string());
        }

        if self.username.is_some() != self.password.is_some() {
            errors.push("Username and password must be set together".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds the connection configuration.
    pub fn elasticsearch_config(&self) -> ElasticsearchConfig {
        let auth = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(ElasticsearchAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        ElasticsearchConfig {
            nodes: self.node_list(),
            request_timeout_ms: self.request_timeout.as_millis() as u64,
            auth,
            disable_certificate_validation: self.insecure,
            max_connection_attempts: self.max_connection_attempts,
            connection_retry_backoff_ms: self.retry_backoff.as_millis() as u64,
        }
    }
}
