//! Resume points for incremental extraction.
//!
//! A [`Cursor`] marks the last document handed to the caller. It holds the
//! value of the primary sort field and, in composite mode, the value of the
//! secondary sort field that breaks ties on the primary one. A [`CursorField`]
//! reads those values back out of a document.
//!
//! # Encoding
//!
//! Cursors can be persisted as opaque tokens: URL-safe base64 (no padding) of
//! their JSON form.
//!
//! ```
//! use elastic_source::cursor::Cursor;
//!
//! let cursor = Cursor::composite("3", "Bob");
//! let token = cursor.encode();
//! assert_eq!(Cursor::decode(&token).unwrap(), cursor);
//! ```

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::error::{CursorError, FieldExtractionError};

/// Suffix of the keyword sub-field Elasticsearch creates for text fields.
const KEYWORD_SUFFIX: &str = ".keyword";

/// An immutable resume point.
///
/// A secondary value is only ever present together with a primary value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCursor")]
pub struct Cursor {
    primary: Option<String>,
    secondary: Option<String>,
}

#[derive(Deserialize)]
struct RawCursor {
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    secondary: Option<String>,
}

impl TryFrom<RawCursor> for Cursor {
    type Error = CursorError;

    fn try_from(raw: RawCursor) -> Result<Self, Self::Error> {
        match (raw.primary, raw.secondary) {
            (None, Some(_)) => Err(CursorError::SecondaryWithoutPrimary),
            (primary, secondary) => Ok(Self { primary, secondary }),
        }
    }
}

impl Cursor {
    /// The start of the stream.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A cursor positioned after the given primary value.
    pub fn primary(value: impl Into<String>) -> Self {
        Self {
            primary: Some(value.into()),
            secondary: None,
        }
    }

    /// A cursor positioned after the given `(primary, secondary)` pair.
    pub fn composite(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: Some(primary.into()),
            secondary: Some(secondary.into()),
        }
    }

    /// Returns the primary value.
    pub fn primary_value(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Returns the secondary value.
    pub fn secondary_value(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    /// Returns true for the start-of-stream cursor.
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }

    /// Encodes the cursor to an opaque string.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(&json)
    }

    /// Decodes a cursor from an opaque string.
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CursorError::InvalidToken {
                token: token.to_string(),
            })?;

        let raw: RawCursor =
            serde_json::from_slice(&bytes).map_err(|_| CursorError::InvalidToken {
                token: token.to_string(),
            })?;

        Cursor::try_from(raw)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.primary, &self.secondary) {
            (None, _) => write!(f, "<start>"),
            (Some(p), None) => write!(f, "{}", p),
            (Some(p), Some(s)) => write!(f, "({}, {})", p, s),
        }
    }
}

/// Reads a scalar cursor value out of a document.
///
/// The path may be dotted to reach into nested objects (`nested.ts`). A
/// trailing `.keyword` is dropped before reading, since documents hold the
/// source field and not the keyword sub-field used for sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorField {
    path: String,
}

impl CursorField {
    /// Creates a reader for the given search field name.
    pub fn new(search_field: &str) -> Self {
        let path = search_field
            .strip_suffix(KEYWORD_SUFFIX)
            .unwrap_or(search_field);
        Self {
            path: path.to_string(),
        }
    }

    /// Returns the document path this field reads.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the value at this field's path as a string.
    pub fn read(&self, document: &Document) -> Result<String, FieldExtractionError> {
        let segments: Vec<&str> = self.path.split('.').collect();
        let value = lookup(document, &segments, &self.path)?;
        self.render(value)
    }

    fn render(&self, value: &Value) -> Result<String, FieldExtractionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Err(FieldExtractionError::NullValue {
                path: self.path.clone(),
            }),
            Value::Array(_) | Value::Object(_) => Err(FieldExtractionError::NotScalar {
                path: self.path.clone(),
            }),
        }
    }
}

fn lookup<'a>(
    object: &'a Document,
    segments: &[&str],
    path: &str,
) -> Result<&'a Value, FieldExtractionError> {
    let (head, rest) = match segments.split_first() {
        Some(split) => split,
        None => {
            return Err(FieldExtractionError::MissingField {
                path: path.to_string(),
                segment: String::new(),
            });
        }
    };

    let value = object
        .get(*head)
        .ok_or_else(|| FieldExtractionError::MissingField {
            path: path.to_string(),
            segment: head.to_string(),
        })?;

    if rest.is_empty() {
        return Ok(value);
    }

    match value {
        Value::Object(nested) => lookup(nested, rest, path),
        _ => Err(FieldExtractionError::NotTraversable {
            path: path.to_string(),
            segment: head.to_string(),
        }),
    }
}
