//! Elastic Source extractor
//!
//! Drains every index matching a prefix in cursor order and writes each
//! document to stdout as one JSON line. The cursor to resume from is printed
//! to stderr per index as `<index>\t<token>`.

mod config;
mod extract;

use std::io::BufWriter;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use elastic_source::connection::ElasticsearchConnection;
use elastic_source::retry::CancelToken;
use elastic_source::{Cursor, ElasticRepository};
use tracing::{info, warn};

use crate::config::ExtractorConfig;
use crate::extract::{check_resume_scope, drain};

/// Initializes logging on stderr so stdout carries only documents.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("elastic_source={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Cancels `cancel` on the first Ctrl-C.
fn cancel_on_interrupt(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling extraction");
            cancel.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExtractorConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let start = match &config.cursor {
        Some(token) => Cursor::decode(token).context("Invalid --cursor token")?,
        None => Cursor::empty(),
    };

    let connection = ElasticsearchConnection::new(config.elasticsearch_config())
        .context("Failed to create Elasticsearch connection")?;

    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone());

    let mut repo = ElasticRepository::new(Arc::new(connection), &config.cursor_field)
        .with_page_size(config.page_size)
        .with_cancel_token(cancel);
    if let Some(secondary) = &config.secondary_cursor_field {
        repo = repo.with_secondary_cursor_field(secondary);
    }

    info!(
        nodes = ?config.node_list(),
        index_prefix = %config.index_prefix,
        cursor_field = %config.cursor_field,
        secondary_cursor_field = ?config.secondary_cursor_field,
        page_size = config.page_size,
        start = %start,
        "Starting extraction"
    );

    let indices = repo.list_indices(&config.index_prefix).await;
    if indices.is_empty() {
        warn!(index_prefix = %config.index_prefix, "No matching indices");
    }
    check_resume_scope(config.cursor.as_deref(), &indices)?;

    let mut out = BufWriter::new(std::io::stdout());
    for index in &indices {
        if config.refresh {
            repo.refresh_index(index).await?;
        }

        let (cursor, written) = drain(&repo, index, start.clone(), config.max_pages, &mut out).await?;
        info!(index = %index, documents = written, cursor = %cursor, "Index drained");
        eprintln!("{}\t{}", index, cursor.encode());
    }

    Ok(())
}
