//! In-process adapter registry keyed by object reference.
//!
//! # Responsibility
//! - Map an authoritative object reference to the adapter owning its
//!   visual component.
//! - Answer "does this reference resolve to a live component" for the
//!   reconciliation pass.
//!
//! # Invariants
//! - At most one adapter is registered per reference; registering again
//!   replaces the previous entry (last writer wins).
//! - At most one reference is registered per component id.

use crate::adapter::Adapter;
use crate::model::component::ComponentId;
use crate::model::reference::{EntityKind, ObjectRef};
use std::collections::HashMap;

/// Reference registry of live adapters.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ObjectRef, Adapter>,
    by_component: HashMap<ComponentId, ObjectRef>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Registers `adapter` under `reference` and returns the adapter it
    /// replaced, if any.
    ///
    /// A component registered under another reference (e.g. after a rename)
    /// loses its old entry.
    pub fn register(&mut self, reference: ObjectRef, adapter: Adapter) -> Option<Adapter> {
        let component = adapter.component();
        if let Some(stale) = self.by_component.insert(component, reference.clone()) {
            if stale != reference {
                self.adapters.remove(&stale);
            }
        }

        let previous = self.adapters.insert(reference.clone(), adapter);
        if let Some(replaced) = &previous {
            if replaced.component() != component {
                self.by_component.remove(&replaced.component());
            }
        }
        previous
    }

    pub fn find(&self, reference: &ObjectRef) -> Option<&Adapter> {
        self.adapters.get(reference)
    }

    pub fn unregister(&mut self, reference: &ObjectRef) -> Option<Adapter> {
        let removed = self.adapters.remove(reference)?;
        if self.by_component.get(&removed.component()) == Some(reference) {
            self.by_component.remove(&removed.component());
        }
        Some(removed)
    }

    /// Component id registered for `reference`.
    pub fn resolve(&self, reference: &ObjectRef) -> Option<ComponentId> {
        self.find(reference).map(Adapter::component)
    }

    pub fn find_by_component(&self, component: ComponentId) -> Option<&Adapter> {
        let reference = self.by_component.get(&component)?;
        self.adapters.get(reference)
    }

    /// First adapter registered for `name` under any of `kinds`, tried in
    /// the given order.
    pub fn find_member(&self, name: &str, kinds: &[EntityKind]) -> Option<&Adapter> {
        kinds
            .iter()
            .find_map(|kind| self.adapters.get(&ObjectRef::new(*kind, name)))
    }

    pub fn clear(&mut self) {
        self.adapters.clear();
        self.by_component.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectRef, &Adapter)> {
        self.adapters.iter()
    }
}
