//! Loader trait for emitting Singer messages

use crate::error::Result;
use crate::singer::{Message, SyncState};
use crate::streams::StreamKind;

use serde_json::Value;
use std::collections::BTreeMap;

/// Loader trait for the destination of a sync
///
/// Implementors only provide [`Loader::write`]; schemas, records and
/// checkpoints are all expressed as messages.
pub trait Loader {
    /// Emit a single message
    ///
    /// # Errors
    /// Returns an error if the message cannot be serialized or written
    fn write(&mut self, message: Message) -> Result<()>;

    /// Emit the SCHEMA message of a stream.
    fn schema(&mut self, kind: StreamKind) -> Result<()> {
        self.write(Message::Schema {
            stream: kind.name().to_string(),
            schema: kind.schema(),
            key_properties: kind.key_properties(),
            bookmark_properties: kind
                .replication_key()
                .map(|key| vec![key.to_string()])
                .unwrap_or_default(),
        })
    }

    /// Emit one RECORD message per item.
    ///
    /// Returns the number of records emitted
    fn load(&mut self, stream: &str, items: Vec<Value>) -> Result<usize> {
        let count = items.len();
        for item in items {
            self.write(Message::record(stream, item))?;
        }
        Ok(count)
    }

    /// Emit a STATE message carrying the current bookmarks.
    fn checkpoint(&mut self, state: &SyncState) -> Result<()> {
        self.write(Message::State {
            value: state.to_value(),
        })
    }
}

/// Loader that drops everything
///
/// Used when a parent stream has to run for its children but was not
/// selected itself.
#[derive(Debug, Default)]
pub struct Discard;

impl Loader for Discard {
    fn write(&mut self, _message: Message) -> Result<()> {
        Ok(())
    }
}

/// Loader that removes deselected properties before passing messages on
///
/// Fields are listed per stream. They are dropped from RECORD messages and
/// from the `properties` of SCHEMA messages, so both stay in agreement.
pub struct FieldDropper<'a, L: Loader> {
    inner: &'a mut L,
    fields: BTreeMap<String, Vec<String>>,
}

impl<'a, L: Loader> FieldDropper<'a, L> {
    pub fn new(inner: &'a mut L, mut fields: BTreeMap<String, Vec<String>>) -> Self {
        fields.retain(|_, names| !names.is_empty());
        Self { inner, fields }
    }

    fn drop_fields(&self, stream: &str, object: Option<&mut serde_json::Map<String, Value>>) {
        let (Some(fields), Some(object)) = (self.fields.get(stream), object) else {
            return;
        };
        for field in fields {
            object.remove(field);
        }
    }
}

impl<L: Loader> Loader for FieldDropper<'_, L> {
    fn write(&mut self, mut message: Message) -> Result<()> {
        match &mut message {
            Message::Schema { stream, schema, .. } => {
                let properties = schema.get_mut("properties").and_then(Value::as_object_mut);
                self.drop_fields(stream.as_str(), properties);
            }
            Message::Record { stream, record, .. } => {
                self.drop_fields(stream.as_str(), record.as_object_mut());
            }
            Message::State { .. } => {}
        }
        self.inner.write(message)
    }
}
