//! Visual course model container.
//!
//! # Responsibility
//! - Own every visual component of one driving-course model.
//! - Keep per-kind insertion order, which is the restore/persist visit order.
//!
//! # Invariants
//! - Each `ComponentId` appears at most once.
//! - Iteration over one kind follows insertion order.

use crate::model::component::{ComponentId, VisualComponent};
use crate::model::reference::EntityKind;
use std::collections::HashMap;

/// Name given to models that were never named.
pub const DEFAULT_MODEL_NAME: &str = "unnamed";

/// Name a model is stored under: the override when given, else the
/// model's own name, else [`DEFAULT_MODEL_NAME`] when blank.
pub fn effective_model_name(name: &str, name_override: Option<&str>) -> String {
    let name = name_override.unwrap_or(name).trim();
    if name.is_empty() {
        DEFAULT_MODEL_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// The editable visual model of one driving course.
#[derive(Debug, Clone, Default)]
pub struct CourseModel {
    name: String,
    components: HashMap<ComponentId, VisualComponent>,
    order: Vec<ComponentId>,
}

impl CourseModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Removes every component and resets the name.
    pub fn clear(&mut self) {
        self.name.clear();
        self.components.clear();
        self.order.clear();
    }

    /// Adds one component and returns its id.
    ///
    /// Re-adding a component with an id already present replaces it in place.
    pub fn add(&mut self, component: VisualComponent) -> ComponentId {
        let id = component.id;
        if self.components.insert(id, component).is_none() {
            self.order.push(id);
        }
        id
    }

    pub fn remove(&mut self, id: ComponentId) -> Option<VisualComponent> {
        let removed = self.components.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        Some(removed)
    }

    pub fn get(&self, id: ComponentId) -> Option<&VisualComponent> {
        self.components.get(&id)
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut VisualComponent> {
        self.components.get_mut(&id)
    }

    /// All components in insertion order.
    pub fn components(&self) -> impl Iterator<Item = &VisualComponent> {
        self.order.iter().filter_map(|id| self.components.get(id))
    }

    /// Components of one kind in insertion order.
    pub fn components_of(&self, kind: EntityKind) -> impl Iterator<Item = &VisualComponent> {
        self.components()
            .filter(move |component| component.kind == kind)
    }

    /// Ids of one kind in insertion order.
    pub fn ids_of(&self, kind: EntityKind) -> Vec<ComponentId> {
        self.components_of(kind).map(|component| component.id).collect()
    }

    pub fn count_of(&self, kind: EntityKind) -> usize {
        self.components_of(kind).count()
    }

    /// Linear lookup by kind and name; restore paths go through the
    /// adapter registry instead.
    pub fn find_by_name(&self, kind: EntityKind, name: &str) -> Option<&VisualComponent> {
        self.components_of(kind)
            .find(|component| component.name == name)
    }

    /// Components of all kinds in persist order (kind order, then
    /// insertion order within a kind).
    pub fn in_persist_order(&self) -> Vec<&VisualComponent> {
        EntityKind::PERSIST_ORDER
            .into_iter()
            .flat_map(|kind| self.components_of(kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{effective_model_name, CourseModel};
    use crate::model::component::VisualComponent;
    use crate::model::reference::EntityKind;

    #[test]
    fn keeps_insertion_order_per_kind() {
        let mut model = CourseModel::new("m");
        model.add(VisualComponent::new(EntityKind::Point, "B"));
        model.add(VisualComponent::new(EntityKind::Path, "B--A"));
        model.add(VisualComponent::new(EntityKind::Point, "A"));

        let names: Vec<_> = model
            .components_of(EntityKind::Point)
            .map(|component| component.name.as_str())
            .collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn persist_order_puts_layout_first_and_vehicles_last() {
        let mut model = CourseModel::new("m");
        model.add(VisualComponent::new(EntityKind::Vehicle, "V1"));
        model.add(VisualComponent::new(EntityKind::Point, "P1"));
        model.add(VisualComponent::new(EntityKind::VisualLayout, "VLayout"));

        let kinds: Vec<_> = model
            .in_persist_order()
            .into_iter()
            .map(|component| component.kind)
            .collect();
        assert_eq!(
            kinds,
            [
                EntityKind::VisualLayout,
                EntityKind::Point,
                EntityKind::Vehicle
            ]
        );
    }

    #[test]
    fn remove_and_clear_drop_components() {
        let mut model = CourseModel::new("m");
        let id = model.add(VisualComponent::new(EntityKind::Point, "P1"));
        model.add(VisualComponent::new(EntityKind::Point, "P2"));

        assert!(model.remove(id).is_some());
        assert!(model.remove(id).is_none());
        assert_eq!(model.count_of(EntityKind::Point), 1);

        model.clear();
        assert!(model.is_empty());
        assert!(model.name().is_empty());
    }

    #[test]
    fn effective_name_prefers_override_and_defaults_blank() {
        assert_eq!(effective_model_name("", None), "unnamed");
        assert_eq!(effective_model_name("Own", Some("  ")), "unnamed");
        assert_eq!(effective_model_name("Own", None), "Own");
        assert_eq!(effective_model_name("Own", Some("Foo")), "Foo");
    }
}
