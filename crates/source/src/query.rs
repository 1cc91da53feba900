//! Elasticsearch Query DSL builder for cursor boundaries.
//!
//! Translates a [`Cursor`] into a predicate matching only documents strictly
//! after it under the active sort order, and wraps that predicate into a
//! complete search body.

use serde_json::{Value, json};

use crate::cursor::Cursor;

/// A complete search request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// The index to search.
    pub index: String,
    /// The complete query body.
    pub body: Value,
}

/// Builds boundary queries over one or two sort fields.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryQuery<'a> {
    primary_field: &'a str,
    secondary_field: Option<&'a str>,
}

impl<'a> BoundaryQuery<'a> {
    /// Creates a builder sorting on a single field.
    pub fn single(primary_field: &'a str) -> Self {
        Self {
            primary_field,
            secondary_field: None,
        }
    }

    /// Creates a builder sorting on `(primary, secondary)`.
    pub fn composite(primary_field: &'a str, secondary_field: &'a str) -> Self {
        Self {
            primary_field,
            secondary_field: Some(secondary_field),
        }
    }

    /// Builds the predicate for documents strictly after `cursor`.
    ///
    /// The secondary value is only taken into account by composite builders.
    pub fn predicate(&self, cursor: &Cursor) -> Value {
        let Some(primary) = cursor.primary_value() else {
            return match_all();
        };

        match (self.secondary_field, cursor.secondary_value()) {
            (Some(secondary_field), Some(secondary)) => json!({
                "bool": {
                    "should": [
                        greater_than(self.primary_field, primary),
                        {
                            "bool": {
                                "filter": [
                                    equal_to(self.primary_field, primary),
                                    greater_than(secondary_field, secondary)
                                ]
                            }
                        }
                    ],
                    "minimum_should_match": 1
                }
            }),
            _ => greater_than(self.primary_field, primary),
        }
    }

    /// Builds the sort clause: ascending on every configured field.
    pub fn sort(&self) -> Value {
        let mut sort = vec![ascending(self.primary_field)];
        if let Some(secondary_field) = self.secondary_field {
            sort.push(ascending(secondary_field));
        }
        Value::Array(sort)
    }

    /// Builds the search request for one page after `cursor`.
    pub fn build(&self, index: &str, cursor: &Cursor, page_size: usize) -> SearchRequest {
        let body = json!({
            "query": self.predicate(cursor),
            "size": page_size,
            "sort": self.sort(),
        });

        SearchRequest {
            index: index.to_string(),
            body,
        }
    }
}

fn match_all() -> Value {
    json!({ "match_all": {} })
}

// Exclusive lower bound; the boundary document itself is never matched again.
fn greater_than(field: &str, value: &str) -> Value {
    json!({ "range": { field: { "gt": value } } })
}

fn equal_to(field: &str, value: &str) -> Value {
    json!({ "term": { field: value } })
}

fn ascending(field: &str) -> Value {
    json!({ field: { "order": "asc" } })
}
