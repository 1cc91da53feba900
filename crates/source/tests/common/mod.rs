//! Test infrastructure for the extraction layer.
//!
//! [`MemoryConnection`] stores documents in memory and evaluates the subset of
//! the Query DSL the repository generates (`match_all`, `range`, `term`,
//! `bool`), including ascending multi-field sorts. Like Elasticsearch, it
//! coerces string cursor values to numbers when compared against numeric
//! fields. Documents tying on every sort field keep insertion order.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use elastic_source::SearchConnection;
use elastic_source::error::ConnectionError;
use elastic_source::query::SearchRequest;
use elastic_source::retry::Sleeper;

/// A document held by [`MemoryConnection`].
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub source: Value,
}

/// An in-memory search backend.
pub struct MemoryConnection {
    indices: Mutex<BTreeMap<String, Vec<StoredDocument>>>,
    max_attempts: u32,
    backoff: Duration,
    searches: AtomicU32,
    next_id: AtomicU32,
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnection {
    /// Creates an empty backend allowing a single attempt per search.
    pub fn new() -> Self {
        Self::with_retry(1, Duration::ZERO)
    }

    /// Creates an empty backend reporting the given retry settings.
    pub fn with_retry(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            indices: Mutex::new(BTreeMap::new()),
            max_attempts,
            backoff,
            searches: AtomicU32::new(0),
            next_id: AtomicU32::new(1),
        }
    }

    /// Stores a document and returns its generated id.
    pub fn insert(&self, index: &str, source: Value) -> String {
        let id = format!("doc-{}", self.next_id.fetch_add(1, AtomicOrdering::SeqCst));
        self.indices
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                source,
            });
        id
    }

    /// Creates an index without documents.
    pub fn create_index(&self, index: &str) {
        self.indices
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default();
    }

    /// Number of searches served so far.
    pub fn searches(&self) -> u32 {
        self.searches.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl SearchConnection for MemoryConnection {
    async fn search(&self, request: &SearchRequest) -> Result<Value, ConnectionError> {
        self.searches.fetch_add(1, AtomicOrdering::SeqCst);

        let indices = self.indices.lock().unwrap();
        let documents = indices
            .get(&request.index)
            .ok_or_else(|| ConnectionError::Rejected {
                status: 404,
                body: format!("index_not_found_exception: {}", request.index),
            })?;

        let query = &request.body["query"];
        let mut matched: Vec<&StoredDocument> = documents
            .iter()
            .filter(|doc| matches_query(query, &doc.source))
            .collect();

        let sort_fields = sort_fields(&request.body["sort"]);
        matched.sort_by(|a, b| {
            for field in &sort_fields {
                let ordering = compare_sort_values(
                    lookup(&a.source, field),
                    lookup(&b.source, field),
                );
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let size = request.body["size"].as_u64().unwrap_or(10) as usize;
        let hits: Vec<Value> = matched
            .into_iter()
            .take(size)
            .map(|doc| {
                json!({
                    "_index": request.index,
                    "_id": doc.id,
                    "_score": null,
                    "_source": doc.source,
                })
            })
            .collect();

        Ok(json!({
            "took": 1,
            "timed_out": false,
            "hits": { "hits": hits }
        }))
    }

    async fn cat_indices(&self) -> Result<String, ConnectionError> {
        let indices = self.indices.lock().unwrap();
        Ok(indices
            .iter()
            .map(|(name, docs)| format!("green open {} uuid 1 0 {} 0 1kb 1kb\n", name, docs.len()))
            .collect())
    }

    async fn refresh(&self, index: &str) -> Result<(), ConnectionError> {
        if self.indices.lock().unwrap().contains_key(index) {
            Ok(())
        } else {
            Err(ConnectionError::Rejected {
                status: 404,
                body: format!("index_not_found_exception: {}", index),
            })
        }
    }

    fn max_connection_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn connection_retry_backoff(&self) -> Duration {
        self.backoff
    }
}

/// Fails the first `failures` searches with a transport error, then delegates.
pub struct FlakyConnection<C> {
    inner: C,
    failures: u32,
    attempts: AtomicU32,
    max_attempts: u32,
    backoff: Duration,
}

impl<C: SearchConnection> FlakyConnection<C> {
    pub fn new(inner: C, failures: u32, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            failures,
            attempts: AtomicU32::new(0),
            max_attempts,
            backoff,
        }
    }

    /// Number of search attempts seen, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl<C: SearchConnection> SearchConnection for FlakyConnection<C> {
    async fn search(&self, request: &SearchRequest) -> Result<Value, ConnectionError> {
        let attempt = self.attempts.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(ConnectionError::transport(format!(
                "connection reset (attempt {})",
                attempt
            )));
        }
        self.inner.search(request).await
    }

    async fn cat_indices(&self) -> Result<String, ConnectionError> {
        self.inner.cat_indices().await
    }

    async fn refresh(&self, index: &str) -> Result<(), ConnectionError> {
        self.inner.refresh(index).await
    }

    fn max_connection_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn connection_retry_backoff(&self) -> Duration {
        self.backoff
    }
}

/// Records requested sleeps instead of waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Builds the standard test document.
pub fn mock_document(ts: i64, full_name: &str) -> Value {
    json!({
        "fullName": full_name,
        "ts": ts,
        "age": 10,
        "non-avro-field": "non-avro-field",
        "avroField": "avro-field",
        "nested": { "ts": ts }
    })
}

// ============================================================================
// Query evaluation
// ============================================================================

fn matches_query(query: &Value, source: &Value) -> bool {
    let Some((kind, clause)) = query.as_object().and_then(|o| o.iter().next()) else {
        return true;
    };

    match kind.as_str() {
        "match_all" => true,
        "range" => clause
            .as_object()
            .map(|fields| {
                fields.iter().all(|(field, bounds)| {
                    let Some(value) = lookup(source, field) else {
                        return false;
                    };
                    bounds.as_object().into_iter().flatten().all(|(op, bound)| {
                        let ordering = compare_to_query_value(value, bound);
                        match op.as_str() {
                            "gt" => ordering == Some(Ordering::Greater),
                            "gte" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                            "lt" => ordering == Some(Ordering::Less),
                            "lte" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                            other => panic!("unsupported range operator {}", other),
                        }
                    })
                })
            })
            .unwrap_or(false),
        "term" => clause
            .as_object()
            .map(|fields| {
                fields.iter().all(|(field, expected)| {
                    lookup(source, field)
                        .map(|value| compare_to_query_value(value, expected) == Some(Ordering::Equal))
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false),
        "bool" => {
            let all = |key: &str| {
                clause[key]
                    .as_array()
                    .map(|clauses| clauses.iter().all(|c| matches_query(c, source)))
                    .unwrap_or(true)
            };
            let should_ok = match clause["should"].as_array() {
                None => true,
                Some(clauses) => {
                    let minimum = clause["minimum_should_match"].as_u64().unwrap_or(1) as usize;
                    clauses.iter().filter(|c| matches_query(c, source)).count() >= minimum
                }
            };
            all("filter") && all("must") && should_ok
        }
        other => panic!("unsupported query clause {}", other),
    }
}

fn sort_fields(sort: &Value) -> Vec<String> {
    sort.as_array()
        .into_iter()
        .flatten()
        .filter_map(|clause| clause.as_object())
        .filter_map(|clause| clause.keys().next().cloned())
        .collect()
}

/// Resolves a dotted field against a source, mapping `x.keyword` to `x`.
fn lookup<'a>(source: &'a Value, field: &str) -> Option<&'a Value> {
    let path = field.strip_suffix(".keyword").unwrap_or(field);
    path.split('.')
        .try_fold(source, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

fn compare_to_query_value(value: &Value, query_value: &Value) -> Option<Ordering> {
    match (value.as_f64(), query_number(query_value)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(render(value).cmp(&render(query_value))),
    }
}

fn query_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// Missing values sort last, as in Elasticsearch's default for ascending sorts.
fn compare_sort_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => render(a).cmp(&render(b)),
        },
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
