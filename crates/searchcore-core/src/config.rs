use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SearchCoreError};

/// Schema version of the settings document itself. Gates parser behavior and
/// is deliberately kept separate from `Workspace::version`, which instead
/// participates in cache fingerprints (Open Question 3, SPEC_FULL.md §9).
pub const SETTINGS_SCHEMA_VERSION: &str = "1";

/// Ambient, process-wide configuration: endpoints, concurrency caps, and the
/// debounce/TTL tunables named in SPEC_FULL.md §6. Loaded once via the
/// `config` crate (defaults -> file -> `SEARCHCORE_` environment prefix),
/// and hot-reloadable from the same file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Settings {
    pub schema_version: String,
    pub workspace_path: PathBuf,

    pub vector_store_endpoint: String,
    pub embedding_service_endpoint: String,
    pub embedding_model_id: String,
    pub cache_l2_endpoint: String,

    pub embedding_dimension: usize,
    pub embedding_max_input_len: usize,
    pub embedding_batch_size: usize,
    pub embedding_timeout_ms: u64,

    pub index_worker_count: usize,
    pub index_max_file_bytes: u64,
    pub chunk_window_lines: u32,
    pub chunk_overlap_lines: u32,

    pub watcher_debounce_ms: u64,
    pub watcher_channel_capacity: usize,

    pub fanout_multiplier: usize,
    pub max_concurrent_searches: usize,
    pub early_termination_threshold: f32,

    pub cache_l1_max_bytes: u64,
    pub cache_l1_max_items: usize,
    pub cache_l1_ttl_secs: u64,
    pub cache_l2_max_bytes: u64,
    pub cache_l2_ttl_secs: u64,
    pub cache_l3_ttl_secs: u64,

    pub invalidation_debounce_seconds: f64,
    pub invalidation_batch_size: usize,

    pub query_deadline_ms: u64,
    pub embedding_deadline_ms: u64,
    pub index_deadline_ms: u64,
    pub vector_search_deadline_ms: u64,

    pub metrics_bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION.to_string(),
            workspace_path: PathBuf::from("workspace.toml"),
            vector_store_endpoint: "memory://local".to_string(),
            embedding_service_endpoint: "memory://local".to_string(),
            embedding_model_id: "fallback-hash-384".to_string(),
            cache_l2_endpoint: "memory://local".to_string(),
            embedding_dimension: 384,
            embedding_max_input_len: 8192,
            embedding_batch_size: 32,
            embedding_timeout_ms: 10_000,
            index_worker_count: num_cpus::get().max(1),
            index_max_file_bytes: 2 * 1024 * 1024,
            chunk_window_lines: 40,
            chunk_overlap_lines: 4,
            watcher_debounce_ms: 250,
            watcher_channel_capacity: 4096,
            fanout_multiplier: 3,
            max_concurrent_searches: 10,
            early_termination_threshold: 0.95,
            cache_l1_max_bytes: 100 * 1024 * 1024,
            cache_l1_max_items: 10_000,
            cache_l1_ttl_secs: 5 * 60,
            cache_l2_max_bytes: 1024 * 1024 * 1024,
            cache_l2_ttl_secs: 60 * 60,
            cache_l3_ttl_secs: 24 * 60 * 60,
            invalidation_debounce_seconds: 2.0,
            invalidation_batch_size: 50,
            query_deadline_ms: 5_000,
            embedding_deadline_ms: 10_000,
            index_deadline_ms: 30_000,
            vector_search_deadline_ms: 2_000,
            metrics_bind_addr: "127.0.0.1:9898".to_string(),
        }
    }
}

impl Settings {
    /// Loads defaults, overlaid by `path` (if it exists) and then by
    /// environment variables prefixed `SEARCHCORE_` (double-underscore
    /// separated for nested keys), matching the teacher's layering order.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = Settings::default();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).map_err(cfg_err)?);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else {
            debug!(path = %path.display(), "settings file not found, using defaults");
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SEARCHCORE")
                .separator("__")
                .try_parsing(true),
        );

        let built = builder.build().map_err(cfg_err)?;
        built.try_deserialize().map_err(cfg_err)
    }
}

fn cfg_err(e: config::ConfigError) -> SearchCoreError {
    SearchCoreError::Config(e.to_string())
}

/// Publishes `Settings` atomically and supports hot-reload driven by a
/// filesystem watch on the settings file, independent of (but structurally
/// identical to) the File Watcher component.
pub struct SettingsManager {
    current: Arc<ArcSwap<Settings>>,
    path: PathBuf,
}

impl SettingsManager {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Settings::load(&path)?;
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(settings)),
            path,
        })
    }

    pub fn current(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn reload(&self) -> Result<()> {
        let settings = Settings::load(&self.path)?;
        if **self.current.load() != settings {
            info!(path = %self.path.display(), "settings changed, republishing");
            self.current.store(Arc::new(settings));
        }
        Ok(())
    }

    /// Spawns a task that watches the settings file and reloads on change.
    /// Errors from individual reload attempts are logged, not propagated:
    /// a malformed edit leaves the previous, known-good settings in effect.
    pub fn watch(self: Arc<Self>) -> Result<notify::RecommendedWatcher> {
        use notify::{Event, RecursiveMode, Watcher};

        let manager = self.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if res.is_ok() {
                if let Err(e) = manager.reload() {
                    warn!(error = %e, "failed to reload settings, keeping previous values");
                }
            }
        })
        .map_err(|e| SearchCoreError::Config(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            let _ = watcher.watch(parent, RecursiveMode::NonRecursive);
        }
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let s = Settings::default();
        assert_eq!(s.schema_version, SETTINGS_SCHEMA_VERSION);
        assert!(s.embedding_dimension > 0);
        assert!(s.fanout_multiplier >= 1);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let s = Settings::load("/nonexistent/path/settings.toml").unwrap();
        assert_eq!(s.embedding_dimension, Settings::default().embedding_dimension);
    }
}
