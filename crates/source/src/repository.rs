//! Cursor-driven page retrieval.
//!
//! [`ElasticRepository`] is the pagination engine: it turns a [`Cursor`] into a
//! boundary query, executes it with retry, and derives the next cursor from the
//! last document of the page.
//!
//! # Single-field mode
//!
//! [`fetch_page`](ElasticRepository::fetch_page) sorts on the cursor field
//! alone. When that field is not unique, documents tying on the page boundary
//! may be skipped or repeated; use composite mode for such fields.
//!
//! # Composite mode
//!
//! [`fetch_page_with_secondary_sort`](ElasticRepository::fetch_page_with_secondary_sort)
//! sorts on `(primary, secondary)` and resumes just past the exact pair, so
//! every document is visited once however many share a primary value.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use elastic_source::connection::{ElasticsearchConfig, ElasticsearchConnection};
//! use elastic_source::cursor::Cursor;
//! use elastic_source::repository::ElasticRepository;
//!
//! let connection = Arc::new(ElasticsearchConnection::new(ElasticsearchConfig::default())?);
//! let repository = ElasticRepository::new(connection, "ts").with_page_size(500);
//!
//! let mut cursor = Cursor::empty();
//! loop {
//!     let page = repository.fetch_page("logs", &cursor).await?;
//!     if page.is_empty() {
//!         break;
//!     }
//!     // hand page.documents() downstream, persist page.next_cursor()
//!     cursor = page.next_cursor().clone();
//! }
//! ```

use std::sync::Arc;

use crate::connection::SearchConnection;
use crate::cursor::{Cursor, CursorField};
use crate::document::{Document, extract_documents};
use crate::error::{ConfigError, ExtractError, ExtractResult};
use crate::query::{BoundaryQuery, SearchRequest};
use crate::retry::{CancelToken, PageFetcher, RetryPolicy, Sleeper, TokioSleeper};

/// Default number of documents per page.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// One page of documents and the cursor to resume after it.
///
/// `next_cursor` is empty exactly when `documents` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    index: String,
    documents: Vec<Document>,
    next_cursor: Cursor,
}

impl PageResult {
    /// Creates a page result.
    fn new(index: &str, documents: Vec<Document>, next_cursor: Cursor) -> Self {
        Self {
            index: index.to_string(),
            documents,
            next_cursor,
        }
    }

    /// Returns the searched index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns the documents, in sort order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Returns the cursor to pass to the next fetch.
    pub fn next_cursor(&self) -> &Cursor {
        &self.next_cursor
    }

    /// Returns the number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the page holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Consumes the page into its documents and next cursor.
    pub fn into_parts(self) -> (Vec<Document>, Cursor) {
        (self.documents, self.next_cursor)
    }
}

/// A configured sort field: the name used in queries and its document reader.
#[derive(Debug, Clone)]
struct SortField {
    search_field: String,
    reader: CursorField,
}

impl SortField {
    fn new(search_field: &str) -> Self {
        Self {
            search_field: search_field.to_string(),
            reader: CursorField::new(search_field),
        }
    }
}

/// Pages through an index in cursor order.
pub struct ElasticRepository<C: ?Sized> {
    connection: Arc<C>,
    primary: SortField,
    secondary: Option<SortField>,
    page_size: usize,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancelToken,
}

impl<C: ?Sized> std::fmt::Debug for ElasticRepository<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticRepository")
            .field("cursor_search_field", &self.primary.search_field)
            .field(
                "secondary_cursor_search_field",
                &self.secondary.as_ref().map(|s| &s.search_field),
            )
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl<C> ElasticRepository<C>
where
    C: SearchConnection + ?Sized,
{
    /// Creates a repository paging on `cursor_search_field`.
    pub fn new(connection: Arc<C>, cursor_search_field: &str) -> Self {
        Self {
            connection,
            primary: SortField::new(cursor_search_field),
            secondary: None,
            page_size: DEFAULT_PAGE_SIZE,
            sleeper: Arc::new(TokioSleeper),
            cancel: CancelToken::new(),
        }
    }

    /// Adds a secondary sort field, enabling composite pagination.
    pub fn with_secondary_cursor_field(mut self, secondary_cursor_search_field: &str) -> Self {
        self.secondary = Some(SortField::new(secondary_cursor_search_field));
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Replaces the sleeper used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attaches a cancellation token observed by every fetch.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Changes the page size for subsequent fetches.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the primary cursor search field.
    pub fn cursor_search_field(&self) -> &str {
        &self.primary.search_field
    }

    /// Returns the secondary cursor search field, if configured.
    pub fn secondary_cursor_search_field(&self) -> Option<&str> {
        self.secondary.as_ref().map(|s| s.search_field.as_str())
    }

    /// Returns the cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fetches the page after `cursor`, sorting on the primary field only.
    pub async fn fetch_page(&self, index: &str, cursor: &Cursor) -> ExtractResult<PageResult> {
        self.check_page_size()?;

        let query = BoundaryQuery::single(&self.primary.search_field);
        let request = query.build(index, cursor, self.page_size);
        let documents = self.execute(&request).await?;

        let next_cursor = match documents.last() {
            None => Cursor::empty(),
            Some(last) => Cursor::primary(self.primary.reader.read(last)?),
        };

        self.finish(index, documents, next_cursor)
    }

    /// Fetches the page after `cursor`, sorting on `(primary, secondary)`.
    pub async fn fetch_page_with_secondary_sort(
        &self,
        index: &str,
        cursor: &Cursor,
    ) -> ExtractResult<PageResult> {
        let secondary = self
            .secondary
            .as_ref()
            .ok_or(ConfigError::SecondaryFieldNotConfigured)?;
        self.check_page_size()?;

        let query = BoundaryQuery::composite(&self.primary.search_field, &secondary.search_field);
        let request = query.build(index, cursor, self.page_size);
        let documents = self.execute(&request).await?;

        // An empty page drops the secondary value too: there is nothing left to resume from.
        let next_cursor = match documents.last() {
            None => Cursor::empty(),
            Some(last) => Cursor::composite(
                self.primary.reader.read(last)?,
                secondary.reader.read(last)?,
            ),
        };

        self.finish(index, documents, next_cursor)
    }

    /// Lists index names starting with `prefix`, sorted.
    ///
    /// A failed listing is logged and yields no indices. Lines without an
    /// index column are skipped.
    pub async fn list_indices(&self, prefix: &str) -> Vec<String> {
        let listing = match self.connection.cat_indices().await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::error!(error = %e, "Error listing index names");
                return Vec::new();
            }
        };

        let mut indices: Vec<String> = listing
            .lines()
            .filter_map(|line| line.split_whitespace().nth(2))
            .filter(|index| index.starts_with(prefix))
            .map(str::to_string)
            .collect();
        indices.sort();
        indices
    }

    /// Refreshes `index` so recently written documents become searchable.
    ///
    /// Only needed when reading back just-written data; otherwise the backend
    /// refreshes on its own schedule.
    pub async fn refresh_index(&self, index: &str) -> ExtractResult<()> {
        self.connection.refresh(index).await.map_err(|e| {
            tracing::error!(index, error = %e, "Error refreshing index");
            ExtractError::Refresh {
                index: index.to_string(),
                source: e,
            }
        })
    }

    fn check_page_size(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize {
                page_size: self.page_size,
            });
        }
        Ok(())
    }

    async fn execute(&self, request: &SearchRequest) -> ExtractResult<Vec<Document>> {
        let policy = RetryPolicy::from_connection(self.connection.as_ref());
        let fetcher = PageFetcher::new(
            self.connection.as_ref(),
            policy,
            self.sleeper.as_ref(),
            &self.cancel,
        );
        let response = fetcher.execute(request).await?;
        extract_documents(&response)
    }

    fn finish(
        &self,
        index: &str,
        documents: Vec<Document>,
        next_cursor: Cursor,
    ) -> ExtractResult<PageResult> {
        tracing::debug!(
            index,
            documents = documents.len(),
            next_cursor = %next_cursor,
            "Fetched page"
        );
        Ok(PageResult::new(index, documents, next_cursor))
    }
}
