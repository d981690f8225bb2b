//! Security manifest: the pre-trusted mapping from widget id to source
//! location, expected content hash, and declared export name.
//!
//! The manifest is authored and distributed out of band; at runtime it is
//! read-only input to the loader.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::traits::ManifestStore;

/// One manifest row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Logical widget id the loader resolves
    pub widget_id: String,
    /// Where the source text lives; opaque to the core, the fetcher
    /// interprets it
    pub source_location: String,
    /// Lowercase hex SHA-256 of the exact source text
    pub expected_hash: String,
    /// Export name the verified module is registered and instantiated under
    pub export_name: String,
}

/// In-memory manifest backed by a HashMap, loadable from a JSON array of
/// entries.
#[derive(Debug, Default)]
pub struct StaticManifest {
    entries: HashMap<String, ManifestEntry>,
}

impl StaticManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
        let mut manifest = Self::new();
        for entry in entries {
            manifest.insert(entry);
        }
        manifest
    }

    /// Parse a manifest file: a JSON array of entries
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read manifest {}: {}", path.display(), e))?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse manifest {}: {}", path.display(), e))?;
        Ok(Self::from_entries(entries))
    }

    /// Insert an entry, replacing any previous row for the same widget id
    pub fn insert(&mut self, entry: ManifestEntry) {
        self.entries.insert(entry.widget_id.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ManifestStore for StaticManifest {
    fn lookup(&self, widget_id: &str) -> Option<ManifestEntry> {
        self.entries.get(widget_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> ManifestEntry {
        ManifestEntry {
            widget_id: id.to_string(),
            source_location: format!("{id}.json"),
            expected_hash: "deadbeef".to_string(),
            export_name: format!("x-{id}"),
        }
    }

    #[test]
    fn test_lookup() {
        let manifest = StaticManifest::from_entries([entry("counter")]);
        assert_eq!(manifest.len(), 1);
        let found = manifest.lookup("counter").unwrap();
        assert_eq!(found.source_location, "counter.json");
        assert!(manifest.lookup("unknown").is_none());
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut manifest = StaticManifest::from_entries([entry("counter")]);
        let mut updated = entry("counter");
        updated.expected_hash = "cafe".to_string();
        manifest.insert(updated);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.lookup("counter").unwrap().expected_hash, "cafe");
    }

    #[test]
    fn test_entry_wire_shape() {
        let json = r#"{
            "widgetId": "counter",
            "sourceLocation": "counter.json",
            "expectedHash": "abc123",
            "exportName": "x-counter"
        }"#;
        let parsed: ManifestEntry = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.widget_id, "counter");
        assert_eq!(parsed.export_name, "x-counter");
    }
}
