//! Test fixtures: tracing bootstrap, runtimes and ready-made engines.

use crate::categories::{CategoryDiff, CategoryRemote, CUSTOM_TYPE};
use crate::lookup::StaticLookup;
use crate::product_types::{ProductTypeDiff, ProductTypeRemote};
use crate::recorder::CallbackRecorder;
use refsync_engine::{SyncConfig, SyncEngine};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test-friendly subscriber once per process.
///
/// Output is off unless `RUST_LOG` is set, e.g. `RUST_LOG=refsync_engine=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A current-thread runtime for driving the engine from synchronous tests.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build test runtime")
}

/// Category engine wired to fresh in-memory collaborators.
pub struct CategoryHarness {
    /// Remote category service.
    pub remote: Arc<CategoryRemote>,
    /// Lookup for custom types.
    pub types: Arc<StaticLookup>,
    /// Callback recorder.
    pub recorder: Arc<CallbackRecorder>,
    /// The engine.
    pub engine: SyncEngine<CategoryRemote, CategoryDiff>,
}

impl CategoryHarness {
    /// Builds a harness with `config`.
    pub fn new(config: SyncConfig) -> Self {
        init_tracing();
        let remote = Arc::new(CategoryRemote::new());
        let types = Arc::new(StaticLookup::new(CUSTOM_TYPE));
        let recorder = CallbackRecorder::new();
        let engine = SyncEngine::new(remote.clone(), CategoryDiff, config)
            .with_reference_lookup(types.clone())
            .with_callbacks(recorder.callbacks());
        Self {
            remote,
            types,
            recorder,
            engine,
        }
    }
}

impl Default for CategoryHarness {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

/// Product type engine wired to fresh in-memory collaborators.
pub struct ProductTypeHarness {
    /// Remote product type service.
    pub remote: Arc<ProductTypeRemote>,
    /// Callback recorder.
    pub recorder: Arc<CallbackRecorder>,
    /// The engine.
    pub engine: SyncEngine<ProductTypeRemote, ProductTypeDiff>,
}

impl ProductTypeHarness {
    /// Builds a harness with `config`.
    pub fn new(config: SyncConfig) -> Self {
        init_tracing();
        let remote = Arc::new(ProductTypeRemote::new());
        let recorder = CallbackRecorder::new();
        let engine = SyncEngine::new(remote.clone(), ProductTypeDiff, config)
            .with_callbacks(recorder.callbacks());
        Self {
            remote,
            recorder,
            engine,
        }
    }
}

impl Default for ProductTypeHarness {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}
