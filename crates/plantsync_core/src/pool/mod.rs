//! Authoritative object pool contract.
//!
//! # Responsibility
//! - Define the reference-based query/mutate interface the reconciliation
//!   engine consumes.
//! - Classify backend failures (not found, duplicate, rejection).
//!
//! # Invariants
//! - `objects(kind)` returns a stable, creation-ordered sequence.
//! - Every mutation either succeeds completely for one object or fails
//!   without changing that object.
//!
//! # See also
//! - `pool::sqlite` for the SQLite-backed implementation.

use crate::db::DbError;
use crate::model::object::PlantObject;
use crate::model::reference::{EntityKind, ObjectRef};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub use sqlite::SqliteObjectPool;

pub type PoolResult<T> = Result<T, PoolError>;

/// Authoritative pool error.
#[derive(Debug)]
pub enum PoolError {
    /// Transport/bootstrap failure of the backing database.
    Db(DbError),
    /// Target object does not exist.
    NotFound(ObjectRef),
    /// An object with the same reference already exists.
    Duplicate(ObjectRef),
    /// Backend refused the mutation.
    Rejected { reference: ObjectRef, reason: String },
    /// Stored state cannot be decoded.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl PoolError {
    pub fn rejected(reference: &ObjectRef, reason: impl Into<String>) -> Self {
        Self::Rejected {
            reference: reference.clone(),
            reason: reason.into(),
        }
    }
}

impl Display for PoolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(reference) => write!(f, "object not found: {reference}"),
            Self::Duplicate(reference) => write!(f, "object already exists: {reference}"),
            Self::Rejected { reference, reason } => {
                write!(f, "pool rejected change to {reference}: {reason}")
            }
            Self::InvalidData(message) => write!(f, "invalid pool data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "object pool requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for PoolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PoolError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PoolError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Reference-based interface to the authoritative object pool.
pub trait ObjectPool {
    /// Name of the model currently held by the pool.
    fn model_name(&self) -> PoolResult<String>;
    fn set_model_name(&self, name: &str) -> PoolResult<()>;

    /// All objects of one kind, in creation order.
    fn objects(&self, kind: EntityKind) -> PoolResult<Vec<PlantObject>>;
    fn object(&self, reference: &ObjectRef) -> PoolResult<Option<PlantObject>>;

    /// Creates an object together with its ad-hoc properties.
    fn create_object(&self, object: &PlantObject) -> PoolResult<ObjectRef>;
    /// Overwrites the payload of an existing object; properties are kept.
    fn update_object(&self, object: &PlantObject) -> PoolResult<()>;
    fn withdraw_object(&self, reference: &ObjectRef) -> PoolResult<()>;

    fn set_property(&self, reference: &ObjectRef, key: &str, value: &str) -> PoolResult<()>;
    fn clear_properties(&self, reference: &ObjectRef) -> PoolResult<()>;
}
