//! Cursor codec
//!
//! A cursor is an opaque token for an exclusive ordering boundary
//! `(sort_key, id)`. Tokens are `"<sort_key>::<id>"`; decoding splits on the
//! last separator so separators earlier in the sort key survive.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::storage::CURSOR_SEPARATOR;
use crate::types::Item;

/// Opaque keyset boundary token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encode a boundary tuple
    pub fn encode(sort_key: &str, id: &str) -> Self {
        Cursor(format!("{sort_key}{CURSOR_SEPARATOR}{id}"))
    }

    /// Whether `id` survives an encode/decode round trip
    pub fn is_encodable_id(id: &str) -> bool {
        !id.is_empty() && !id.contains(CURSOR_SEPARATOR)
    }

    /// Boundary at an item's position
    pub fn for_item(item: &Item) -> Self {
        Self::encode(&item.sort_key, &item.id)
    }

    /// Wrap a raw token (e.g. from a URL or CLI flag) without validating it
    pub fn from_token(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    /// Decode a raw token; `None` for malformed input
    pub fn decode(token: &str) -> Option<(String, String)> {
        let split = token.rfind(CURSOR_SEPARATOR)?;
        let sort_key = &token[..split];
        let id = &token[split + CURSOR_SEPARATOR.len()..];
        if id.is_empty() {
            return None;
        }
        Some((sort_key.to_string(), id.to_string()))
    }

    /// Decoded `(sort_key, id)` of this token
    pub fn parts(&self) -> Option<(String, String)> {
        Self::decode(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
