//! Persist: session to model file or authoritative pool.
//!
//! Components are visited in dependency order so that a pool can validate
//! every reference against objects created earlier in the same pass.

use crate::adapter::{Adapter, PushContext};
use crate::events::ChangeKind;
use crate::model::component::VisualComponent;
use crate::model::course::effective_model_name;
use crate::persistence::{CourseDocument, ElementRecord, ModelFileStore};
use crate::pool::ObjectPool;
use crate::sync::session::CourseSession;
use crate::sync::{SyncError, SyncResult};
use log::{error, info};
use std::time::Instant;

/// Destination of one persist pass.
pub trait ModelPersistor {
    /// Short target label for diagnostics.
    fn target(&self) -> &'static str;

    /// Writes one component. `adapter` is re-registered afterwards.
    fn persist_component(
        &mut self,
        component: &VisualComponent,
        adapter: &mut Adapter,
        context: &PushContext<'_>,
    ) -> SyncResult<()>;

    /// Completes the pass under the effective model name.
    fn finish(&mut self, name: &str) -> SyncResult<()>;
}

/// Collects records and writes them with one backup-guarded save.
pub struct FilePersistor<'a> {
    store: &'a ModelFileStore,
    document: CourseDocument,
}

impl<'a> FilePersistor<'a> {
    pub fn new(store: &'a ModelFileStore) -> Self {
        Self {
            store,
            document: CourseDocument::default(),
        }
    }
}

impl ModelPersistor for FilePersistor<'_> {
    fn target(&self) -> &'static str {
        "file"
    }

    fn persist_component(
        &mut self,
        component: &VisualComponent,
        adapter: &mut Adapter,
        _context: &PushContext<'_>,
    ) -> SyncResult<()> {
        self.document.push(ElementRecord::from_component(component));
        adapter.rename(component.reference());
        Ok(())
    }

    fn finish(&mut self, name: &str) -> SyncResult<()> {
        let mut document = std::mem::take(&mut self.document);
        document.name = name.to_string();
        self.store.save_document(&document)?;
        Ok(())
    }
}

/// Pushes every component to an object pool through its adapter.
pub struct PoolPersistor<'a> {
    pool: &'a dyn ObjectPool,
}

impl<'a> PoolPersistor<'a> {
    pub fn new(pool: &'a dyn ObjectPool) -> Self {
        Self { pool }
    }
}

impl ModelPersistor for PoolPersistor<'_> {
    fn target(&self) -> &'static str {
        "pool"
    }

    fn persist_component(
        &mut self,
        component: &VisualComponent,
        adapter: &mut Adapter,
        context: &PushContext<'_>,
    ) -> SyncResult<()> {
        adapter
            .push(component, self.pool, context)
            .map(|_| ())
            .map_err(|source| SyncError::Adapter {
                reference: component.reference(),
                source,
            })
    }

    fn finish(&mut self, name: &str) -> SyncResult<()> {
        self.pool.set_model_name(name)?;
        Ok(())
    }
}

impl CourseSession {
    /// Persists every component in dependency order and renames the model
    /// to the effective name.
    ///
    /// A failure stops the pass at the failing component. Objects already
    /// pushed to a pool stay there.
    pub fn persist(
        &mut self,
        persistor: &mut dyn ModelPersistor,
        name_override: Option<&str>,
    ) -> SyncResult<()> {
        let started_at = Instant::now();
        let name = effective_model_name(self.model.name(), name_override);
        let (result, persisted) = self.persist_components(persistor, &name);

        match &result {
            Ok(()) => info!(
                "event=model_persist module=sync status=ok target={} components={} duration_ms={}",
                persistor.target(),
                persisted,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=model_persist module=sync status=error target={} components={} duration_ms={} error={}",
                persistor.target(),
                persisted,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result?;

        self.model.set_name(name);
        self.publish_all(ChangeKind::Persisted);
        Ok(())
    }

    fn persist_components(
        &mut self,
        persistor: &mut dyn ModelPersistor,
        name: &str,
    ) -> (SyncResult<()>, usize) {
        let mut visited = Vec::new();
        let result = {
            let context = PushContext {
                model: &self.model,
                registry: &self.registry,
            };
            self.model
                .in_persist_order()
                .into_iter()
                .try_for_each(|component| {
                    let mut adapter = self
                        .registry
                        .find_by_component(component.id)
                        .cloned()
                        .unwrap_or_else(|| Adapter::unbound(component.id, component.reference()));
                    let outcome = persistor.persist_component(component, &mut adapter, &context);
                    visited.push(adapter);
                    outcome
                })
        };

        let persisted = visited.len();
        for adapter in visited {
            self.registry.register(adapter.reference().clone(), adapter);
        }
        match result {
            Ok(()) => (persistor.finish(name), persisted),
            Err(err) => (Err(err), persisted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FilePersistor, PoolPersistor};
    use crate::config::CoreConfig;
    use crate::db::open_db_in_memory;
    use crate::model::component::VisualComponent;
    use crate::model::property::keys;
    use crate::model::reference::{EntityKind, ObjectRef};
    use crate::persistence::ModelFileStore;
    use crate::pool::{ObjectPool, SqliteObjectPool};
    use crate::sync::{CourseSession, SyncError};

    fn point(name: &str) -> VisualComponent {
        let mut component = VisualComponent::new(EntityKind::Point, name);
        component.properties.set_text(keys::POINT_POS_X, "0");
        component.properties.set_text(keys::POINT_POS_Y, "0");
        component
    }

    #[test]
    fn file_persist_follows_renamed_components() {
        let home = tempfile::tempdir().unwrap();
        let store = ModelFileStore::new(home.path()).unwrap();
        let mut session = CourseSession::empty(&CoreConfig::with_home(home.path()));
        let id = session.add_component(point("P1")).unwrap();
        session.component_mut(id).unwrap().name = "P7".to_string();

        session
            .persist(&mut FilePersistor::new(&store), Some("yard"))
            .unwrap();

        assert_eq!(session.model().name(), "yard");
        assert_eq!(store.model_name().unwrap().as_deref(), Some("yard"));
        assert_eq!(session.registry().resolve(&ObjectRef::point("P7")), Some(id));
        assert!(session.registry().find(&ObjectRef::point("P1")).is_none());
    }

    #[test]
    fn pool_persist_binds_adapters_and_sets_model_name() {
        let conn = open_db_in_memory().unwrap();
        let pool = SqliteObjectPool::try_new(&conn).unwrap();
        let mut session = CourseSession::empty(&CoreConfig::default());
        let id = session.add_component(point("P1")).unwrap();

        session
            .persist(&mut PoolPersistor::new(&pool), None)
            .unwrap();

        assert_eq!(pool.model_name().unwrap(), "unnamed");
        assert!(pool.object(&ObjectRef::point("P1")).unwrap().is_some());
        assert!(session.registry().find_by_component(id).unwrap().is_bound());
    }

    #[test]
    fn pool_persist_stops_at_rejected_component() {
        let conn = open_db_in_memory().unwrap();
        let pool = SqliteObjectPool::try_new(&conn).unwrap();
        let mut session = CourseSession::empty(&CoreConfig::default());
        let first = session.add_component(point("P1")).unwrap();
        let second = session.add_component(point("P2")).unwrap();
        let mut path = VisualComponent::new(EntityKind::Path, "P1--P2");
        path.properties.set_text(keys::START_COMPONENT, "P1");
        path.properties.set_text(keys::END_COMPONENT, "P2");
        session.add_component(path).unwrap();
        session.remove_component(second);

        let err = session
            .persist(&mut PoolPersistor::new(&pool), Some("broken"))
            .unwrap_err();

        assert!(matches!(err, SyncError::Adapter { .. }), "{err}");
        assert_eq!(session.model().name(), "unnamed");
        assert_eq!(pool.model_name().unwrap(), "");
        assert!(session.registry().find_by_component(first).unwrap().is_bound());
    }
}
