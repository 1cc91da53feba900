//! Elastic Source
//!
//! Incremental, resumable extraction of documents from Elasticsearch and
//! OpenSearch indices. Documents are read in bounded pages in a deterministic
//! order, and every page carries the [`Cursor`](cursor::Cursor) to resume after
//! it, so a host can poll an index, persist the cursor, and pick up exactly
//! where it left off after a restart.
//!
//! # Features
//!
//! - **Cursor pagination**: strict range queries past the last returned document
//! - **Composite cursors**: a secondary sort field breaks ties on the primary one
//! - **Nested fields**: dotted cursor paths (`nested.ts`) and `.keyword` sort fields
//! - **Retry**: bounded, fixed-interval retry of transient transport failures
//! - **Cancellation**: backoff waits abort as soon as the caller cancels
//!
//! Available features:
//! - `elasticsearch` (default) - HTTP connection built on the official client
//!
//! # Architecture
//!
//! - [`cursor`] - Resume points and cursor value extraction
//! - [`document`] - Documents built from search hits
//! - [`query`] - Boundary query construction
//! - [`retry`] - Retry policy, sleeping and cancellation
//! - [`repository`] - The pagination engine
//! - [`connection`] - The backend connection trait and its implementations
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use elastic_source::cursor::{Cursor, CursorField};
//! use elastic_source::query::BoundaryQuery;
//! use serde_json::json;
//!
//! // Documents strictly after ts = 3, oldest first
//! let request = BoundaryQuery::single("ts").build("events", &Cursor::primary("3"), 100);
//! assert_eq!(request.body["query"], json!({ "range": { "ts": { "gt": "3" } } }));
//!
//! // The next cursor is read from the last document of a page
//! let last = json!({ "ts": 7, "fullName": "Ada" });
//! let field = CursorField::new("ts");
//! assert_eq!(field.read(last.as_object().unwrap()).unwrap(), "7");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod connection;
pub mod cursor;
pub mod document;
pub mod error;
pub mod query;
pub mod repository;
pub mod retry;

pub use connection::SearchConnection;
pub use cursor::{Cursor, CursorField};
pub use document::Document;
pub use error::{ExtractError, ExtractResult};
pub use repository::{ElasticRepository, PageResult};
