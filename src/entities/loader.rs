//! Secure widget loading: verify before execute.
//!
//! Widget source text is untrusted until its SHA-256 digest matches the
//! manifest's expected hash for the exact bytes fetched. The pipeline
//! fails closed: a manifest miss, transport failure, digest mismatch or
//! materialization problem is logged and returned as a typed error, and
//! nothing is registered or instantiated on any failure path. Errors never
//! panic across the loader boundary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use sha2::{Digest, Sha256};

use super::manifest::ManifestEntry;
use super::traits::{DataStore, ManifestStore, SourceFetcher};
use super::widget::{Widget, WidgetBehavior};

/// Loader failure taxonomy. Every variant is recoverable from the
/// caller's perspective: widget code is externally produced and transport
/// is unreliable, so these are expected in normal operation.
#[derive(Debug)]
pub enum LoadError {
    /// No manifest entry for the requested widget id
    ManifestLookup { widget_id: String },
    /// Source retrieval failed
    Fetch { location: String, reason: String },
    /// Fetched text does not hash to the expected digest
    Integrity {
        widget_id: String,
        expected: String,
        actual: String,
    },
    /// Verified source could not be turned into a live component
    Materialize { export_name: String, reason: String },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::ManifestLookup { widget_id } => {
                write!(f, "no manifest entry for widget '{widget_id}'")
            }
            LoadError::Fetch { location, reason } => {
                write!(f, "source fetch failed for '{location}': {reason}")
            }
            LoadError::Integrity {
                widget_id,
                expected,
                actual,
            } => write!(
                f,
                "integrity check failed for widget '{widget_id}': expected {expected}, got {actual}"
            ),
            LoadError::Materialize {
                export_name,
                reason,
            } => write!(f, "materialization failed for export '{export_name}': {reason}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Scoped handle around verified source text, the transient resource of a
/// materialization. The buffer is released on drop, so cleanup happens on
/// success and failure paths alike.
pub struct ModuleHandle {
    export_name: String,
    source: Option<String>,
}

impl ModuleHandle {
    pub(crate) fn new(export_name: String, source: String) -> Self {
        Self {
            export_name,
            source: Some(source),
        }
    }

    pub fn export_name(&self) -> &str {
        &self.export_name
    }

    /// Verified source text; None once released
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn release(&mut self) {
        if self.source.take().is_some() {
            trace!("module handle '{}' released", self.export_name);
        }
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("export_name", &self.export_name)
            .field("released", &self.source.is_none())
            .finish()
    }
}

/// Builds a concrete behavior out of a verified module
pub trait WidgetFactory: Send + Sync {
    fn create(&self, module: &ModuleHandle) -> anyhow::Result<Box<dyn WidgetBehavior>>;
}

/// Closures act as factories
impl<F> WidgetFactory for F
where
    F: Fn(&ModuleHandle) -> anyhow::Result<Box<dyn WidgetBehavior>> + Send + Sync,
{
    fn create(&self, module: &ModuleHandle) -> anyhow::Result<Box<dyn WidgetBehavior>> {
        self(module)
    }
}

/// Export-name to factory table. Hosts register the behavior constructors
/// their manifest is allowed to name; an unregistered export name fails
/// materialization.
#[derive(Default)]
pub struct WidgetRegistry {
    factories: HashMap<String, Arc<dyn WidgetFactory>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, export_name: impl Into<String>, factory: Arc<dyn WidgetFactory>) {
        let export_name = export_name.into();
        debug!("registry: factory registered for '{export_name}'");
        self.factories.insert(export_name, factory);
    }

    pub fn contains(&self, export_name: &str) -> bool {
        self.factories.contains_key(export_name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn get(&self, export_name: &str) -> Option<&Arc<dyn WidgetFactory>> {
        self.factories.get(export_name)
    }
}

impl std::fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetRegistry")
            .field("factories", &self.factories.len())
            .finish()
    }
}

/// Verify-before-execute widget loader.
///
/// Loads run sequentially; each call is a fresh fetch and verification.
/// An export name, once defined, is pinned to the hash of the source that
/// defined it: re-defining with identical source is a no-op, re-defining
/// with different source fails materialization.
pub struct SecureLoader {
    manifest: Arc<dyn ManifestStore>,
    fetcher: Arc<dyn SourceFetcher>,
    registry: WidgetRegistry,
    defined: HashMap<String, String>,
    store: Option<Arc<dyn DataStore>>,
}

impl SecureLoader {
    pub fn new(
        manifest: Arc<dyn ManifestStore>,
        fetcher: Arc<dyn SourceFetcher>,
        registry: WidgetRegistry,
    ) -> Self {
        Self {
            manifest,
            fetcher,
            registry,
            defined: HashMap::new(),
            store: None,
        }
    }

    /// Widgets loaded after this call come back initialized against
    /// `store`.
    pub fn set_data_store(&mut self, store: Arc<dyn DataStore>) {
        self.store = Some(store);
    }

    /// True once a load has registered this export name
    pub fn is_defined(&self, export_name: &str) -> bool {
        self.defined.contains_key(export_name)
    }

    pub fn defined_count(&self) -> usize {
        self.defined.len()
    }

    /// Resolve, fetch, verify, materialize, instantiate.
    ///
    /// The export name is recorded strictly after the hash check and a
    /// successful instantiation; no failure path leaves a partial
    /// registration behind.
    pub fn load(&mut self, widget_id: &str) -> Result<Widget, LoadError> {
        // 1. manifest lookup
        let Some(entry) = self.manifest.lookup(widget_id) else {
            warn!("loader: no manifest entry for widget '{widget_id}'");
            return Err(LoadError::ManifestLookup {
                widget_id: widget_id.to_string(),
            });
        };
        debug!(
            "loader: widget '{}' -> '{}' as export '{}'",
            widget_id, entry.source_location, entry.export_name
        );

        // 2. fetch source text
        let source = match self.fetcher.fetch(&entry.source_location) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    "loader: fetch failed for '{}': {:#}",
                    entry.source_location, err
                );
                return Err(LoadError::Fetch {
                    location: entry.source_location.clone(),
                    reason: format!("{err:#}"),
                });
            }
        };

        // 3. integrity check over the exact fetched bytes
        let actual = source_hash(&source);
        if actual != entry.expected_hash {
            warn!(
                "loader: integrity check failed for widget '{}': expected {}, got {}",
                widget_id, entry.expected_hash, actual
            );
            return Err(LoadError::Integrity {
                widget_id: widget_id.to_string(),
                expected: entry.expected_hash.clone(),
                actual,
            });
        }
        trace!("loader: widget '{widget_id}' verified ({actual})");

        // 4. materialize through the registry; the module handle releases
        //    the source buffer when this scope ends, error or not
        let module = ModuleHandle::new(entry.export_name.clone(), source);
        let behavior = self.materialize(&entry, &module)?;
        self.defined.insert(entry.export_name.clone(), actual);

        // 5. instantiate, and initialize when a store is attached
        let mut widget = Widget::new(widget_id, behavior);
        if let Some(store) = &self.store {
            widget.initialize(Arc::clone(store));
        }
        info!(
            "loader: widget '{}' instantiated as '{}'",
            widget_id, entry.export_name
        );
        Ok(widget)
    }

    fn materialize(
        &self,
        entry: &ManifestEntry,
        module: &ModuleHandle,
    ) -> Result<Box<dyn WidgetBehavior>, LoadError> {
        if let Some(defined_hash) = self.defined.get(&entry.export_name) {
            if *defined_hash != entry.expected_hash {
                warn!(
                    "loader: export '{}' already defined with different source",
                    entry.export_name
                );
                return Err(LoadError::Materialize {
                    export_name: entry.export_name.clone(),
                    reason: "export name already defined with different source".to_string(),
                });
            }
        }
        let Some(factory) = self.registry.get(&entry.export_name) else {
            warn!(
                "loader: no factory registered for export '{}'",
                entry.export_name
            );
            return Err(LoadError::Materialize {
                export_name: entry.export_name.clone(),
                reason: "no factory registered".to_string(),
            });
        };
        factory.create(module).map_err(|err| {
            warn!("loader: factory for '{}' failed: {:#}", entry.export_name, err);
            LoadError::Materialize {
                export_name: entry.export_name.clone(),
                reason: format!("{err:#}"),
            }
        })
    }
}

impl std::fmt::Debug for SecureLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureLoader")
            .field("registry", &self.registry)
            .field("defined", &self.defined.len())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

/// Lowercase hex SHA-256 of source text
pub fn source_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reads source text from files under a root directory; the bundled
/// fetcher for local setups.
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceFetcher for FileFetcher {
    fn fetch(&self, location: &str) -> anyhow::Result<String> {
        let path = self.root.join(location);
        std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))
    }
}
