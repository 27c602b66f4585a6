//! Bookmark state
//!
//! The state document is the `value` of the last STATE message a previous run
//! emitted:
//! ```json
//! {
//!   "bookmarks": {
//!     "tickets": {
//!       "replication_key": "updated_datetime",
//!       "replication_key_value": "2024-01-05T00:00:00+00:00"
//!     }
//!   }
//! }
//! ```

use crate::cursor::{format_datetime, parse_datetime};
use crate::error::{Result, TapError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// High-water mark of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub replication_key: String,
    pub replication_key_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, Bookmark>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a state file. An empty file is an empty state.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TapError::Configuration(format!("cannot read state {}: {}", path.display(), e))
        })?;
        if content.trim().is_empty() {
            log::debug!("State file {} is empty", path.display());
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            TapError::Configuration(format!("malformed state {}: {}", path.display(), e))
        })?;
        Self::from_value(value)
    }

    /// Parse a state document. A whole STATE message (`{"type": "STATE",
    /// "value": {...}}`) is accepted as well.
    pub fn from_value(value: Value) -> Result<Self> {
        let value = match value {
            Value::Object(mut map) if !map.contains_key("bookmarks") && map.contains_key("value") => {
                map.remove("value").unwrap_or_default()
            }
            other => other,
        };
        let state: Self = serde_json::from_value(value)
            .map_err(|e| TapError::Configuration(format!("malformed state: {}", e)))?;

        for (stream, bookmark) in &state.bookmarks {
            if parse_datetime(&bookmark.replication_key_value).is_none() {
                return Err(TapError::Configuration(format!(
                    "bookmark of '{}' is not a timestamp: '{}'",
                    stream, bookmark.replication_key_value
                )));
            }
        }
        Ok(state)
    }

    /// The stream's bookmark as a timestamp.
    pub fn bookmark(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.bookmarks
            .get(stream)
            .and_then(|b| parse_datetime(&b.replication_key_value))
    }

    /// Move a stream's bookmark forward. A value at or behind the current
    /// bookmark is ignored so bookmarks never move backwards.
    ///
    /// Returns whether the bookmark changed.
    pub fn advance(&mut self, stream: &str, replication_key: &str, value: DateTime<Utc>) -> bool {
        if self.bookmark(stream).is_some_and(|current| current >= value) {
            return false;
        }
        log::debug!("Bookmark {} -> {}", stream, format_datetime(&value));
        self.bookmarks.insert(
            stream.to_string(),
            Bookmark {
                replication_key: replication_key.to_string(),
                replication_key_value: format_datetime(&value),
            },
        );
        true
    }

    /// Forget a stream's bookmark.
    pub fn remove(&mut self, stream: &str) -> Option<Bookmark> {
        self.bookmarks.remove(stream)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
