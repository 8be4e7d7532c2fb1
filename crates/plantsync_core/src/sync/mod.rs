//! Reconciliation engine.
//!
//! # Responsibility
//! - Rebuild the visual model from the authoritative pool or from a
//!   stored model file, resolving cross-references in a second pass.
//! - Persist the visual model to the file store or push it to the pool in
//!   dependency order.
//!
//! # Invariants
//! - Restores build into fresh state and replace the session only on
//!   success.
//! - Unresolved path/link endpoints fail the restore; unresolved members
//!   and malformed layout fields are logged and skipped.
//! - Pool persistence is not transactional across objects.
//!
//! # See also
//! - `sync::session` for the session value passed through these calls.

pub mod palette;
pub mod persist;
mod restore;
pub mod session;

use crate::adapter::AdapterError;
use crate::model::reference::ObjectRef;
use crate::persistence::StoreError;
use crate::pool::PoolError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use palette::ColorCycler;
pub use persist::{FilePersistor, ModelPersistor, PoolPersistor};
pub use session::{CourseSession, DEFAULT_LAYOUT_NAME};

pub type SyncResult<T> = Result<T, SyncError>;

/// Restore/persist failure.
#[derive(Debug)]
pub enum SyncError {
    /// A mandatory reference does not resolve to a live component.
    UnresolvedReference { owner: ObjectRef, target: ObjectRef },
    /// A connection component has no value for one endpoint.
    MissingEndpoint { owner: ObjectRef, key: &'static str },
    /// Pull or push of one object failed.
    Adapter {
        reference: ObjectRef,
        source: AdapterError,
    },
    Store(StoreError),
    Pool(PoolError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedReference { owner, target } => {
                write!(f, "{owner} references {target}, which does not resolve")
            }
            Self::MissingEndpoint { owner, key } => {
                write!(f, "{owner} has no endpoint in {key}")
            }
            Self::Adapter { reference, source } => write!(f, "{reference}: {source}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Adapter { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            Self::Pool(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<PoolError> for SyncError {
    fn from(value: PoolError) -> Self {
        Self::Pool(value)
    }
}
