//! Abstraction traits for external collaborators.
//!
//! These are the seams between the composition core and the hosting
//! application: persistence, the security manifest, and source retrieval.
//! The core never constructs a concrete collaborator on its own; hosts pass
//! implementations in (see `core::store::MemoryStore` and
//! `entities::loader::FileFetcher` for the bundled ones).

use std::sync::Arc;

use serde_json::Value;

use super::manifest::ManifestEntry;

/// External persistence collaborator, keyed by widget scope.
///
/// The storage format is the host's business; the core only moves JSON
/// values in and out.
pub trait DataStore: Send + Sync {
    /// Fetch `key` within `scope_id`. `Ok(None)` when nothing was stored.
    fn get(&self, scope_id: &str, key: &str) -> anyhow::Result<Option<Value>>;

    /// Store `value` under (`scope_id`, `key`). Returns true when the value
    /// was persisted.
    fn set(&self, scope_id: &str, key: &str, value: Value) -> anyhow::Result<bool>;
}

/// Pre-trusted security manifest lookup
pub trait ManifestStore: Send + Sync {
    /// Resolve a widget id to its manifest entry, if declared
    fn lookup(&self, widget_id: &str) -> Option<ManifestEntry>;
}

/// Source text retrieval by location.
///
/// The location string is opaque to the core (file path, URL, cache key);
/// only the fetcher interprets it.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, location: &str) -> anyhow::Result<String>;
}

// ===== Blanket implementations =====

impl<T: DataStore + ?Sized> DataStore for Arc<T> {
    fn get(&self, scope_id: &str, key: &str) -> anyhow::Result<Option<Value>> {
        (**self).get(scope_id, key)
    }

    fn set(&self, scope_id: &str, key: &str, value: Value) -> anyhow::Result<bool> {
        (**self).set(scope_id, key, value)
    }
}

impl<T: ManifestStore + ?Sized> ManifestStore for Arc<T> {
    fn lookup(&self, widget_id: &str) -> Option<ManifestEntry> {
        (**self).lookup(widget_id)
    }
}

impl<T: SourceFetcher + ?Sized> SourceFetcher for Arc<T> {
    fn fetch(&self, location: &str) -> anyhow::Result<String> {
        (**self).fetch(location)
    }
}

/// Closures act as fetchers, which keeps tests and small hosts short
impl<F> SourceFetcher for F
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
    fn fetch(&self, location: &str) -> anyhow::Result<String> {
        self(location)
    }
}
