//! Catalog discovery and stream selection

use crate::error::{Result, TapError};
use crate::streams::StreamKind;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub breadcrumb: Vec<String>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub tap_stream_id: String,
    pub stream: String,
    pub schema: Value,
    #[serde(default)]
    pub key_properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_method: Option<String>,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

impl CatalogEntry {
    /// Catalog entry for one of the tap's streams, selected by default.
    pub fn discover(kind: StreamKind) -> Self {
        let schema = kind.schema();
        let key_properties = kind.key_properties();
        let replication_key = kind.replication_key().map(str::to_string);
        let replication_method = if replication_key.is_some() {
            "INCREMENTAL"
        } else {
            "FULL_TABLE"
        };

        let mut root = Map::new();
        root.insert("inclusion".into(), json!("available"));
        root.insert("selected".into(), json!(true));
        root.insert("selected-by-default".into(), json!(true));
        root.insert("table-key-properties".into(), json!(key_properties));
        root.insert("forced-replication-method".into(), json!(replication_method));
        if let Some(key) = &replication_key {
            root.insert("valid-replication-keys".into(), json!([key]));
        }
        if let Some(parent) = kind.parent() {
            root.insert("parent-tap-stream-id".into(), json!(parent.name()));
        }

        let mut metadata = vec![MetadataEntry {
            breadcrumb: Vec::new(),
            metadata: root,
        }];
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for name in properties.keys() {
                let automatic = key_properties.iter().any(|k| k == name)
                    || replication_key.as_deref() == Some(name.as_str());
                let mut property = Map::new();
                property.insert(
                    "inclusion".into(),
                    json!(if automatic { "automatic" } else { "available" }),
                );
                metadata.push(MetadataEntry {
                    breadcrumb: vec!["properties".to_string(), name.clone()],
                    metadata: property,
                });
            }
        }

        Self {
            tap_stream_id: kind.name().to_string(),
            stream: kind.name().to_string(),
            schema,
            key_properties,
            replication_key,
            replication_method: Some(replication_method.to_string()),
            metadata,
        }
    }

    /// Whether the stream-level metadata marks this stream as selected.
    /// `selected` wins over `selected-by-default`; neither means not selected.
    pub fn is_selected(&self) -> bool {
        let Some(root) = self.metadata.iter().find(|m| m.breadcrumb.is_empty()) else {
            return false;
        };
        root.metadata
            .get("selected")
            .or_else(|| root.metadata.get("selected-by-default"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Properties explicitly deselected with `"selected": false`.
    /// Automatic properties (keys and the replication key) are always kept.
    pub fn deselected_properties(&self) -> Vec<String> {
        self.metadata
            .iter()
            .filter_map(|m| match m.breadcrumb.as_slice() {
                [kind, name] if kind == "properties" => Some((name, &m.metadata)),
                _ => None,
            })
            .filter(|(_, metadata)| {
                metadata.get("selected").and_then(Value::as_bool) == Some(false)
                    && metadata.get("inclusion").and_then(Value::as_str) != Some("automatic")
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    /// The catalog of every stream this tap can sync.
    pub fn discover() -> Self {
        Self {
            streams: StreamKind::ALL
                .into_iter()
                .map(CatalogEntry::discover)
                .collect(),
        }
    }

    /// Read a catalog file given with `--catalog`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TapError::Configuration(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            TapError::Configuration(format!("malformed catalog {}: {}", path.display(), e))
        })
    }

    pub fn entry(&self, tap_stream_id: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|s| s.tap_stream_id == tap_stream_id)
    }

    /// Selected streams in sync order. Unknown stream ids are ignored.
    pub fn selected_streams(&self) -> Vec<StreamKind> {
        for entry in &self.streams {
            if StreamKind::from_name(&entry.tap_stream_id).is_none() {
                log::warn!("Ignoring unknown stream '{}' in catalog", entry.tap_stream_id);
            }
        }
        StreamKind::ALL
            .into_iter()
            .filter(|kind| self.entry(kind.name()).is_some_and(CatalogEntry::is_selected))
            .collect()
    }

    /// Deselected properties of every stream that has some.
    pub fn deselected_fields(&self) -> BTreeMap<String, Vec<String>> {
        self.streams
            .iter()
            .map(|entry| (entry.tap_stream_id.clone(), entry.deselected_properties()))
            .filter(|(_, fields)| !fields.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_discover_lists_all_streams() {
        let catalog = Catalog::discover();
        let ids: Vec<&str> = catalog
            .streams
            .iter()
            .map(|s| s.tap_stream_id.as_str())
            .collect();
        assert_eq!(ids, vec!["tickets", "messages", "satisfaction_surveys"]);
        assert_eq!(catalog.selected_streams(), StreamKind::ALL.to_vec());
    }

    #[test]
    fn test_discover_replication_metadata() {
        let catalog = Catalog::discover();

        let tickets = catalog.entry("tickets").unwrap();
        assert_eq!(tickets.replication_key.as_deref(), Some("updated_datetime"));
        assert_eq!(tickets.replication_method.as_deref(), Some("INCREMENTAL"));

        let surveys = catalog.entry("satisfaction_surveys").unwrap();
        assert_eq!(surveys.replication_key, None);
        assert_eq!(surveys.replication_method.as_deref(), Some("FULL_TABLE"));

        let messages = catalog.entry("messages").unwrap();
        let root = &messages.metadata[0];
        assert!(root.breadcrumb.is_empty());
        assert_eq!(root.metadata["parent-tap-stream-id"], "tickets");

        let id = messages
            .metadata
            .iter()
            .find(|m| m.breadcrumb == vec!["properties".to_string(), "id".to_string()])
            .unwrap();
        assert_eq!(id.metadata["inclusion"], "automatic");
    }

    #[test]
    fn test_selection_from_metadata() {
        let mut catalog = Catalog::discover();
        for entry in &mut catalog.streams {
            if entry.tap_stream_id != "messages" {
                entry.metadata[0]
                    .metadata
                    .insert("selected".into(), Value::Bool(false));
            }
        }
        assert_eq!(catalog.selected_streams(), vec![StreamKind::Messages]);
    }

    #[test]
    fn test_deselected_properties() {
        let mut catalog = Catalog::discover();
        assert!(catalog.deselected_fields().is_empty());

        let tickets = catalog
            .streams
            .iter_mut()
            .find(|s| s.tap_stream_id == "tickets")
            .unwrap();
        for entry in &mut tickets.metadata {
            if entry.breadcrumb.last().is_some_and(|p| p == "subject" || p == "id") {
                entry.metadata.insert("selected".into(), Value::Bool(false));
            }
        }

        // `id` is automatic and stays
        assert_eq!(
            catalog.deselected_fields(),
            BTreeMap::from([("tickets".to_string(), vec!["subject".to_string()])])
        );
    }

    #[test]
    fn test_missing_stream_is_not_selected() {
        let mut catalog = Catalog::discover();
        catalog.streams.retain(|s| s.tap_stream_id == "satisfaction_surveys");
        assert_eq!(
            catalog.selected_streams(),
            vec![StreamKind::SatisfactionSurveys]
        );
    }

    #[test]
    fn test_read_round_trip() {
        let catalog = Catalog::discover();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&catalog).unwrap()).unwrap();
        assert_eq!(Catalog::read(file.path()).unwrap(), catalog);
    }
}
