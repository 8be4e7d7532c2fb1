//! Explicit session state for restore and persist.
//!
//! # Responsibility
//! - Own the visual model, its adapter registry, the working scale and the
//!   layout overrides of the last restore.
//! - Publish component change events to an optional listener channel.
//!
//! # Invariants
//! - Every component in the model has exactly one registered adapter.
//! - The model always holds at least one visual layout component.

use crate::adapter::figure::node_figure;
use crate::adapter::{behavior, Adapter, FigureShape};
use crate::config::CoreConfig;
use crate::events::{ChangeKind, ChangeNotifier};
use crate::model::component::{ComponentId, VisualComponent};
use crate::model::course::{CourseModel, DEFAULT_MODEL_NAME};
use crate::model::layout::{LayoutMap, Scale};
use crate::model::property::{keys, Color};
use crate::model::reference::{EntityKind, ObjectRef};
use crate::registry::AdapterRegistry;
use crate::sync::restore::{attach_figure, resolve_links};
use crate::sync::SyncResult;
use log::info;

/// Name of the visual layout component created for models without one.
pub const DEFAULT_LAYOUT_NAME: &str = "VLayout";

/// One editing session over one visual model.
pub struct CourseSession {
    pub(super) model: CourseModel,
    pub(super) registry: AdapterRegistry,
    pub(super) layout: LayoutMap,
    pub(super) scale: Scale,
    pub(super) default_scale: Scale,
    pub(super) palette: Vec<Color>,
    notifier: Option<ChangeNotifier>,
}

impl CourseSession {
    /// Model named `unnamed` holding only a default visual layout.
    pub fn empty(config: &CoreConfig) -> Self {
        let mut session = Self {
            model: CourseModel::new(DEFAULT_MODEL_NAME),
            registry: AdapterRegistry::new(),
            layout: LayoutMap::default(),
            scale: config.default_scale,
            default_scale: config.default_scale,
            palette: config.palette.clone(),
            notifier: None,
        };
        let layout = default_layout_component(config.default_scale);
        session.register_unbound(&layout);
        session.model.add(layout);
        session
    }

    /// Publishes change events to `notifier` from now on.
    pub fn with_notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn model(&self) -> &CourseModel {
        &self.model
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn layout_map(&self) -> &LayoutMap {
        &self.layout
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    /// Component registered for `reference`.
    pub fn component(&self, reference: &ObjectRef) -> Option<&VisualComponent> {
        let id = self.registry.resolve(reference)?;
        self.model.get(id)
    }

    /// Mutable access for editing; a renamed component is re-registered
    /// under its new reference on the next persist.
    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut VisualComponent> {
        self.model.get_mut(id)
    }

    /// Adds a brand-new component that has no authoritative counterpart
    /// yet and derives its figure and links.
    pub fn add_component(&mut self, mut component: VisualComponent) -> SyncResult<ComponentId> {
        component.clear_derived();
        attach_figure(&mut component, &self.registry, self.scale)?;
        resolve_links(&mut component, &self.registry);
        self.register_unbound(&component);
        let id = self.model.add(component);
        if let Some(component) = self.model.get(id) {
            self.publish(component, ChangeKind::Restored);
        }
        Ok(id)
    }

    /// Removes a component and discards its adapter.
    pub fn remove_component(&mut self, id: ComponentId) -> Option<VisualComponent> {
        let removed = self.model.remove(id)?;
        if let Some(reference) = self
            .registry
            .find_by_component(id)
            .map(|adapter| adapter.reference().clone())
        {
            self.registry.unregister(&reference);
        }
        Some(removed)
    }

    /// Changes the working scale and refreshes every node figure.
    ///
    /// The visual layout components take over the new factors so that a
    /// later persist stores them.
    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
        for id in self.model.ids_of(EntityKind::VisualLayout) {
            if let Some(layout) = self.model.get_mut(id) {
                write_scale(layout, scale);
            }
        }

        let mut refreshed = 0usize;
        for id in self.model.components().map(|c| c.id).collect::<Vec<_>>() {
            let Some(component) = self.model.get_mut(id) else {
                continue;
            };
            if let FigureShape::Node(node) = behavior(component.kind).figure {
                component.figure = Some(node_figure(component, &node, scale));
                refreshed += 1;
                let (component_id, reference) = (component.id, component.reference());
                if let Some(notifier) = &self.notifier {
                    notifier.publish(component_id, reference, ChangeKind::FigureUpdated);
                }
            }
        }
        info!(
            "event=scale_change module=sync status=ok scale_x={} scale_y={} refreshed={}",
            scale.x(),
            scale.y(),
            refreshed
        );
    }

    pub(super) fn publish(&self, component: &VisualComponent, kind: ChangeKind) {
        if let Some(notifier) = &self.notifier {
            notifier.publish(component.id, component.reference(), kind);
        }
    }

    pub(super) fn publish_all(&self, kind: ChangeKind) {
        if self.notifier.is_none() {
            return;
        }
        for component in self.model.components() {
            self.publish(component, kind);
        }
    }

    fn register_unbound(&mut self, component: &VisualComponent) {
        let reference = component.reference();
        self.registry
            .register(reference.clone(), Adapter::unbound(component.id, reference));
    }
}

/// Visual layout component at `scale`.
pub(super) fn default_layout_component(scale: Scale) -> VisualComponent {
    let mut layout = VisualComponent::new(EntityKind::VisualLayout, DEFAULT_LAYOUT_NAME);
    write_scale(&mut layout, scale);
    layout
}

pub(super) fn write_scale(layout: &mut VisualComponent, scale: Scale) {
    layout
        .properties
        .set_text(keys::SCALE_X, scale.x().to_string());
    layout
        .properties
        .set_text(keys::SCALE_Y, scale.y().to_string());
}

/// Scale stored on a visual layout component; zero or malformed factors
/// yield `None`.
pub(super) fn read_scale(layout: &VisualComponent) -> Option<Scale> {
    let factor = |key: &str| {
        layout
            .properties
            .text(key)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
    };
    Scale::new(factor(keys::SCALE_X)?, factor(keys::SCALE_Y)?)
}
