//! Adapters between authoritative objects and visual components.
//!
//! # Responsibility
//! - Bind one visual component to one authoritative object reference.
//! - Pull authoritative state (plus layout overrides) into the component.
//! - Push component state back to the authoritative pool, creating the
//!   object on its first push.
//!
//! # Invariants
//! - An adapter never holds the component itself, only its id.
//! - Push replaces the object's ad-hoc properties with the component's
//!   miscellaneous map (clear, then set each entry).
//!
//! # See also
//! - `adapter::behavior` for the per-kind table.
//! - `registry` for reference lookups.

pub mod behavior;
pub mod figure;

use crate::model::component::{ComponentId, VisualComponent};
use crate::model::course::CourseModel;
use crate::model::layout::LayoutOverride;
use crate::model::object::PlantObject;
use crate::model::property::{keys, PropertyValue};
use crate::model::reference::{EntityKind, ObjectRef};
use crate::pool::{ObjectPool, PoolError};
use crate::registry::AdapterRegistry;
use log::debug;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use behavior::{behavior, FigureShape, KindBehavior, MEMBER_KINDS};

/// Miscellaneous values containing this marker are not carried over.
const UNKNOWN_MARKER: &str = "Unknown";

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Adapter pull/push error.
#[derive(Debug)]
pub enum AdapterError {
    /// Object, component and adapter disagree on the entity kind.
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },
    /// Component lacks a value the authoritative payload requires.
    MissingField {
        reference: ObjectRef,
        key: &'static str,
    },
    /// Authoritative pool refused or failed the push.
    Pool(PoolError),
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KindMismatch { expected, actual } => {
                write!(f, "kind mismatch: expected {expected}, got {actual}")
            }
            Self::MissingField { reference, key } => {
                write!(f, "{reference} is missing required property {key}")
            }
            Self::Pool(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AdapterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pool(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PoolError> for AdapterError {
    fn from(value: PoolError) -> Self {
        Self::Pool(value)
    }
}

/// Read-only view of the session a push may consult.
pub struct PushContext<'a> {
    pub model: &'a CourseModel,
    pub registry: &'a AdapterRegistry,
}

/// Binding between one visual component and one object reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    component: ComponentId,
    reference: ObjectRef,
    bound: bool,
}

impl Adapter {
    /// Adapter for a component restored from an existing authoritative
    /// object.
    pub fn bound(component: ComponentId, reference: ObjectRef) -> Self {
        Self {
            component,
            reference,
            bound: true,
        }
    }

    /// Adapter for a component without a known authoritative counterpart.
    pub fn unbound(component: ComponentId, reference: ObjectRef) -> Self {
        Self {
            component,
            reference,
            bound: false,
        }
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn reference(&self) -> &ObjectRef {
        &self.reference
    }

    pub fn kind(&self) -> EntityKind {
        self.reference.kind
    }

    /// Whether the authoritative object is known to exist.
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Follows a component rename without touching the pool.
    pub fn rename(&mut self, reference: ObjectRef) {
        self.reference = reference;
    }

    pub fn behavior(&self) -> &'static KindBehavior {
        behavior(self.kind())
    }

    /// Copies authoritative state into `component`, letting `layout` win
    /// for presentation keys.
    pub fn pull(
        &self,
        object: &PlantObject,
        component: &mut VisualComponent,
        layout: Option<&LayoutOverride>,
    ) -> AdapterResult<()> {
        self.ensure_kind(object.kind())?;
        self.ensure_kind(component.kind)?;

        self.behavior().pull(object, component, layout)?;
        component.properties.set(
            keys::MISCELLANEOUS,
            PropertyValue::Map(carried_properties(&object.properties)),
        );
        Ok(())
    }

    /// Writes `component` to `pool`, creating the object when absent.
    ///
    /// Returns the reference the object is now stored under.
    pub fn push(
        &mut self,
        component: &VisualComponent,
        pool: &dyn ObjectPool,
        context: &PushContext<'_>,
    ) -> AdapterResult<ObjectRef> {
        self.ensure_kind(component.kind)?;

        let data = self.behavior().push(component, context)?;
        let reference = component.reference();
        let misc = component
            .properties
            .map(keys::MISCELLANEOUS)
            .map(carried_properties)
            .unwrap_or_default();

        if pool.object(&reference)?.is_some() {
            pool.update_object(&PlantObject {
                name: component.name.clone(),
                properties: BTreeMap::new(),
                data,
            })?;
            pool.clear_properties(&reference)?;
            for (key, value) in &misc {
                pool.set_property(&reference, key, value)?;
            }
            debug!("event=adapter_push module=adapter status=ok action=update reference={reference}");
        } else {
            pool.create_object(&PlantObject {
                name: component.name.clone(),
                properties: misc,
                data,
            })?;
            debug!("event=adapter_push module=adapter status=ok action=create reference={reference}");
        }

        self.reference = reference.clone();
        self.bound = true;
        Ok(reference)
    }

    fn ensure_kind(&self, actual: EntityKind) -> AdapterResult<()> {
        if actual == self.kind() {
            Ok(())
        } else {
            Err(AdapterError::KindMismatch {
                expected: self.kind(),
                actual,
            })
        }
    }
}

fn carried_properties(properties: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    properties
        .iter()
        .filter(|(_, value)| !value.contains(UNKNOWN_MARKER))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Adapter, AdapterError, PushContext};
    use crate::db::open_db_in_memory;
    use crate::model::component::VisualComponent;
    use crate::model::course::CourseModel;
    use crate::model::object::PlantObject;
    use crate::model::property::keys;
    use crate::model::reference::{EntityKind, ObjectRef};
    use crate::pool::{ObjectPool, PoolError, SqliteObjectPool};
    use crate::registry::AdapterRegistry;

    #[test]
    fn pull_carries_misc_properties_except_unknown_values() {
        let object = PlantObject::point("P1", 0, 0)
            .with_property("color", "blue")
            .with_property("owner", "Unknown owner");
        let mut component = VisualComponent::new(EntityKind::Point, "P1");
        let adapter = Adapter::bound(component.id, ObjectRef::point("P1"));

        adapter.pull(&object, &mut component, None).unwrap();

        let misc = component.properties.map(keys::MISCELLANEOUS).unwrap();
        assert_eq!(misc.len(), 1);
        assert_eq!(misc.get("color").map(String::as_str), Some("blue"));
    }

    #[test]
    fn push_creates_then_updates_and_replaces_properties() {
        let conn = open_db_in_memory().unwrap();
        let pool = SqliteObjectPool::try_new(&conn).unwrap();
        pool.create_object(&PlantObject::point("P1", 0, 0).with_property("old", "1"))
            .unwrap();

        let object = PlantObject::point("P1", 40, 50).with_property("new", "2");
        let mut component = VisualComponent::new(EntityKind::Point, "P1");
        let mut adapter = Adapter::unbound(component.id, ObjectRef::point("P1"));
        adapter.pull(&object, &mut component, None).unwrap();

        let model = CourseModel::new("m");
        let registry = AdapterRegistry::new();
        let context = PushContext {
            model: &model,
            registry: &registry,
        };
        let reference = adapter.push(&component, &pool, &context).unwrap();

        assert!(adapter.is_bound());
        let stored = pool.object(&reference).unwrap().unwrap();
        assert_eq!(stored, object);

        let mut second = VisualComponent::new(EntityKind::Point, "P2");
        second.properties = component.properties.clone();
        let mut fresh = Adapter::unbound(second.id, ObjectRef::point("P2"));
        fresh.push(&second, &pool, &context).unwrap();
        assert_eq!(pool.objects(EntityKind::Point).unwrap().len(), 2);
    }

    #[test]
    fn push_surfaces_pool_rejection() {
        let conn = open_db_in_memory().unwrap();
        let pool = SqliteObjectPool::try_new(&conn).unwrap();
        let object = PlantObject::path("A--B", "A", "B");
        let mut component = VisualComponent::new(EntityKind::Path, "A--B");
        let mut adapter = Adapter::unbound(component.id, ObjectRef::path("A--B"));
        adapter.pull(&object, &mut component, None).unwrap();

        let model = CourseModel::new("m");
        let registry = AdapterRegistry::new();
        let context = PushContext {
            model: &model,
            registry: &registry,
        };
        let err = adapter.push(&component, &pool, &context).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Pool(PoolError::Rejected { .. })
        ));
        assert!(!adapter.is_bound());
    }
}
