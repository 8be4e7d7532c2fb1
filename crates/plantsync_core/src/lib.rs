//! Plant model sync and persistence core.
//!
//! Keeps a visual course model consistent with an authoritative object
//! pool and with a backup-guarded model file.

pub mod adapter;
pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod pool;
pub mod registry;
pub mod service;
pub mod sync;

pub use adapter::{Adapter, AdapterError, AdapterResult, PushContext};
pub use config::{ConfigError, CoreConfig};
pub use events::{ChangeEvent, ChangeKind, ChangeNotifier};
pub use logging::{init_logging, logging_status, LogLevel, LogRotation};
pub use model::component::{ComponentId, Figure, VisualComponent};
pub use model::course::CourseModel;
pub use model::reference::{EntityKind, ObjectRef};
pub use persistence::{ModelFileStore, StoreError, StoreResult};
pub use pool::{ObjectPool, PoolError, PoolResult, SqliteObjectPool};
pub use registry::AdapterRegistry;
pub use service::model_service::{ModelService, PersistTarget};
pub use sync::{CourseSession, SyncError, SyncResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
