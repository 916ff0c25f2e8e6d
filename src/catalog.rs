//! Singer catalog: discovery output and stream selection input.

use crate::error::Result;
use crate::streams::StreamDef;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub tap_stream_id: String,
    pub stream: String,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub key_properties: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
    /// Stream-level selection flag used by older Singer targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub breadcrumb: Vec<String>,
    pub metadata: Map<String, Value>,
}

/// Builds the discovery catalog for `streams`.
pub fn discover(streams: &[StreamDef]) -> Catalog {
    Catalog {
        streams: streams.iter().map(entry_for).collect(),
    }
}

fn entry_for(stream: &StreamDef) -> CatalogEntry {
    let schema = stream.schema();
    let mut metadata = vec![MetadataEntry {
        breadcrumb: Vec::new(),
        metadata: object(json!({
            "inclusion": "available",
            "selected-by-default": true,
            "table-key-properties": stream.primary_keys,
            "forced-replication-method": "FULL_TABLE",
        })),
    }];

    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for name in props.keys() {
            let inclusion = if stream.primary_keys.contains(&name.as_str()) {
                "automatic"
            } else {
                "available"
            };
            metadata.push(MetadataEntry {
                breadcrumb: vec!["properties".to_string(), name.clone()],
                metadata: object(json!({ "inclusion": inclusion })),
            });
        }
    }

    CatalogEntry {
        tap_stream_id: stream.name.to_string(),
        stream: stream.name.to_string(),
        schema,
        key_properties: stream.primary_keys.iter().map(|k| k.to_string()).collect(),
        metadata,
        selected: None,
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Catalog {
    /// Reads a catalog passed with `--catalog` / `--properties`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// True when `stream` appears in the catalog and is selected.
    pub fn is_selected(&self, stream: &str) -> bool {
        self.streams
            .iter()
            .find(|e| e.tap_stream_id == stream || e.stream == stream)
            .map(CatalogEntry::is_selected)
            .unwrap_or(false)
    }
}

impl CatalogEntry {
    /// Root breadcrumb `selected` wins, then the stream-level flag, then
    /// `selected-by-default`.
    pub fn is_selected(&self) -> bool {
        let root = self
            .metadata
            .iter()
            .find(|m| m.breadcrumb.is_empty())
            .map(|m| &m.metadata);

        root.and_then(|m| m.get("selected"))
            .and_then(Value::as_bool)
            .or(self.selected)
            .or_else(|| {
                root.and_then(|m| m.get("selected-by-default"))
                    .and_then(Value::as_bool)
            })
            .unwrap_or(false)
    }
}
