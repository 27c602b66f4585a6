//! Gorgias stream implementations
//!
//! One submodule per resource. Each declares its endpoint, schema, bookmark
//! field and pagination, and exposes a `sync` that drives an
//! [`crate::etl::Pipeline`] over it.
//!
//! List endpoints answer with `{"data": [...], "meta": {...}}`; the next
//! page is announced in `meta`.

pub mod messages;
pub mod satisfaction_surveys;
pub mod schema;
pub mod tickets;

pub use messages::{MessagesStream, TicketMessagesExtractor};
pub use satisfaction_surveys::{SatisfactionSurveysExtractor, SatisfactionSurveysStream};
pub use tickets::{
    Checkpoint, TicketIds, TicketViewExtractor, TicketsRun, TicketsStream,
};

use crate::error::{Result, TapError};
use crate::etl::{Page, PageToken};

use serde_json::Value;

/// The streams this tap can sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    Tickets,
    Messages,
    SatisfactionSurveys,
}

impl StreamKind {
    /// Every stream, in sync order. Parents come before their children.
    pub const ALL: [StreamKind; 3] = [
        StreamKind::Tickets,
        StreamKind::Messages,
        StreamKind::SatisfactionSurveys,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tickets => tickets::NAME,
            Self::Messages => messages::NAME,
            Self::SatisfactionSurveys => satisfaction_surveys::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn schema(&self) -> Value {
        match self {
            Self::Tickets => schema::tickets(),
            Self::Messages => schema::messages(),
            Self::SatisfactionSurveys => schema::satisfaction_surveys(),
        }
    }

    pub fn key_properties(&self) -> Vec<String> {
        vec!["id".to_string()]
    }

    /// Bookmark field; `None` for full-refresh streams
    pub fn replication_key(&self) -> Option<&'static str> {
        match self {
            Self::Tickets => Some(tickets::REPLICATION_KEY),
            Self::Messages => Some(messages::REPLICATION_KEY),
            Self::SatisfactionSurveys => None,
        }
    }

    /// Stream whose records drive this stream's requests
    pub fn parent(&self) -> Option<StreamKind> {
        match self {
            Self::Messages => Some(Self::Tickets),
            _ => None,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Split a list response into its records and the token in `meta.<next_field>`.
pub(crate) fn parse_page(path: &str, body: Value, next_field: &str) -> Result<Page<Value>> {
    let Value::Object(mut body) = body else {
        return Err(TapError::malformed(path, "response is not a JSON object"));
    };
    let items = match body.remove("data") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(TapError::malformed(path, "'data' is not an array")),
        None => return Err(TapError::malformed(path, "response has no 'data'")),
    };
    let next = match body.get("meta").and_then(|meta| meta.get(next_field)) {
        None | Some(Value::Null) => None,
        Some(Value::String(token)) => PageToken::new(token.as_str()),
        Some(Value::Number(token)) => PageToken::new(token.to_string()),
        Some(other) => {
            return Err(TapError::malformed(
                path,
                format!("'meta.{}' is not a string: {}", next_field, other),
            ));
        }
    };
    Ok(Page::new(items, next))
}

/// Integer `id` of a record.
pub(crate) fn record_id(path: &str, record: &Value) -> Result<i64> {
    record
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| TapError::malformed(path, format!("record without integer 'id': {}", record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_names_round_trip() {
        for kind in StreamKind::ALL {
            assert_eq!(StreamKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StreamKind::from_name("customers"), None);
    }

    #[test]
    fn test_parents_come_first() {
        for (index, kind) in StreamKind::ALL.iter().enumerate() {
            if let Some(parent) = kind.parent() {
                let parent_index = StreamKind::ALL.iter().position(|k| *k == parent).unwrap();
                assert!(parent_index < index);
            }
        }
    }

    #[test]
    fn test_parse_page_with_cursor() {
        let body = json!({
            "data": [{"id": 1}, {"id": 2}],
            "meta": {"next_cursor": "abc", "prev_cursor": null}
        });
        let page = parse_page("/api/satisfaction-surveys", body, "next_cursor").unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next, PageToken::new("abc"));
    }

    #[test]
    fn test_parse_page_last() {
        let body = json!({"data": [{"id": 1}], "meta": {"next_cursor": null}});
        assert_eq!(parse_page("/x", body, "next_cursor").unwrap().next, None);

        let body = json!({"data": []});
        assert_eq!(parse_page("/x", body, "next_cursor").unwrap().next, None);
    }

    #[test]
    fn test_parse_page_malformed() {
        for body in [
            json!([{"id": 1}]),
            json!({"items": []}),
            json!({"data": {"id": 1}}),
            json!({"data": [], "meta": {"next_cursor": {"a": 1}}}),
        ] {
            let err = parse_page("/x", body, "next_cursor").unwrap_err();
            assert!(matches!(err, TapError::MalformedResponse { .. }));
        }
    }

    #[test]
    fn test_record_id() {
        assert_eq!(record_id("/x", &json!({"id": 5})).unwrap(), 5);
        assert!(record_id("/x", &json!({"id": "5"})).is_err());
    }
}
