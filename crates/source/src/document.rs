//! Documents extracted from search hits.

use serde_json::{Map, Value};

use crate::error::{ConnectionError, ExtractError, ExtractResult};

/// A document: the hit's `_source` plus provenance fields.
pub type Document = Map<String, Value>;

/// Field injected with the hit's `_id`.
pub const SOURCE_ID_FIELD: &str = "source-id";

/// Field injected with the hit's `_index`.
pub const SOURCE_INDEX_FIELD: &str = "source-index";

/// Converts a raw search response into documents, in hit order.
///
/// Every hit becomes exactly one document. A hit without `_source` (source
/// disabled in the mapping, or filtered out) yields a document holding only
/// the provenance fields.
pub fn extract_documents(response: &Value) -> ExtractResult<Vec<Document>> {
    let hits = response
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .ok_or_else(|| {
            ExtractError::Backend(ConnectionError::malformed(
                "search response has no hits.hits array",
            ))
        })?;

    Ok(hits.iter().map(hit_to_document).collect())
}

fn hit_to_document(hit: &Value) -> Document {
    let mut document = match hit.get("_source") {
        Some(Value::Object(source)) => source.clone(),
        _ => Map::new(),
    };

    let id = hit.get("_id").cloned().unwrap_or(Value::Null);
    let index = hit.get("_index").cloned().unwrap_or(Value::Null);
    document.insert(SOURCE_ID_FIELD.to_string(), id);
    document.insert(SOURCE_INDEX_FIELD.to_string(), index);
    document
}
