//! Model use-case service.
//!
//! # Responsibility
//! - Provide stable entry points for saving, loading and removing the
//!   stored model.
//! - Route restore and persist requests to the file store or a caller-owned
//!   object pool.
//!
//! # Invariants
//! - The service owns exactly one file store, rooted at the configured
//!   application home.
//! - Pools are borrowed per call; the service never keeps a connection.

use crate::config::CoreConfig;
use crate::model::course::CourseModel;
use crate::persistence::{ModelFileStore, StoreResult};
use crate::pool::ObjectPool;
use crate::sync::{CourseSession, FilePersistor, PoolPersistor, SyncResult};

/// Where a persist request writes to.
#[derive(Clone, Copy)]
pub enum PersistTarget<'a> {
    File,
    Pool(&'a dyn ObjectPool),
}

/// Use-case service over the model file store.
pub struct ModelService {
    config: CoreConfig,
    store: ModelFileStore,
}

impl ModelService {
    /// Opens the store below `config.application_home`.
    ///
    /// # Errors
    /// - Returns `StoreError::Io` when the data directory cannot be created.
    pub fn new(config: CoreConfig) -> StoreResult<Self> {
        let store = ModelFileStore::new(config.application_home())?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &ModelFileStore {
        &self.store
    }

    /// Fresh session using the configured palette and scale.
    pub fn new_session(&self) -> CourseSession {
        CourseSession::empty(&self.config)
    }

    pub fn has_saved_model(&self) -> bool {
        self.store.has_model()
    }

    /// Name of the stored model, `None` when nothing is stored.
    pub fn get_model_name(&self) -> StoreResult<Option<String>> {
        self.store.model_name()
    }

    /// Saves a plain model without a session.
    pub fn save_model(&self, model: &CourseModel, name_override: Option<&str>) -> StoreResult<()> {
        self.store.save(model, name_override)
    }

    /// Loads the stored model into `into`.
    pub fn load_model(&self, into: &mut CourseModel) -> StoreResult<()> {
        self.store.load(into)
    }

    /// Removes the stored model after backing it up.
    pub fn remove_model(&self) -> StoreResult<()> {
        self.store.remove()
    }

    /// Rebuilds `session` from the stored model.
    pub fn restore_model(&self, session: &mut CourseSession) -> SyncResult<()> {
        session.restore_from_file(&self.store)
    }

    /// Rebuilds `session` from an authoritative pool.
    pub fn restore_model_from_pool(
        &self,
        session: &mut CourseSession,
        pool: &dyn ObjectPool,
    ) -> SyncResult<()> {
        session.restore_from_pool(pool)
    }

    /// Persists `session` to `target`.
    ///
    /// # Contract
    /// - `name_override` renames the model when given and non-blank.
    /// - A file target backs up the previous file before writing.
    pub fn persist_model(
        &self,
        session: &mut CourseSession,
        target: PersistTarget<'_>,
        name_override: Option<&str>,
    ) -> SyncResult<()> {
        match target {
            PersistTarget::File => {
                session.persist(&mut FilePersistor::new(&self.store), name_override)
            }
            PersistTarget::Pool(pool) => {
                session.persist(&mut PoolPersistor::new(pool), name_override)
            }
        }
    }
}
