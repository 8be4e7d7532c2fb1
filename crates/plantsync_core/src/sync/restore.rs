//! Restore: authoritative pool or stored model to session.
//!
//! Pool restores instantiate components kind by kind so that every
//! reference a kind needs at instantiation (path endpoints) is already
//! registered. Links, location types and memberships are resolved in a
//! second pass once every component exists.

use crate::adapter::figure::{connection_figure, node_figure};
use crate::adapter::{behavior, Adapter, FigureShape, MEMBER_KINDS};
use crate::events::ChangeKind;
use crate::model::component::{ComponentId, VisualComponent};
use crate::model::course::{effective_model_name, CourseModel};
use crate::model::layout::{LayoutMap, LayoutOverride, Scale};
use crate::model::object::{ObjectData, PlantObject};
use crate::model::property::{keys, Color, PropertyValue};
use crate::model::reference::{EntityKind, ObjectRef};
use crate::persistence::ModelFileStore;
use crate::pool::ObjectPool;
use crate::registry::AdapterRegistry;
use crate::sync::palette::ColorCycler;
use crate::sync::session::{default_layout_component, read_scale, CourseSession};
use crate::sync::{SyncError, SyncResult};
use log::{error, info, warn};
use std::time::Instant;

/// Instantiation order after the visual layout.
const RESTORE_ORDER: [EntityKind; 9] = [
    EntityKind::Point,
    EntityKind::Path,
    EntityKind::Vehicle,
    EntityKind::LocationType,
    EntityKind::Location,
    EntityKind::Link,
    EntityKind::Block,
    EntityKind::StaticRoute,
    EntityKind::Group,
];

impl CourseSession {
    /// Rebuilds the session from every object in `pool`.
    ///
    /// Layout overrides of the pool's visual layout win over object
    /// positions; its scale becomes the working scale.
    ///
    /// # Errors
    /// - `UnresolvedReference`/`MissingEndpoint` for dangling path or link
    ///   endpoints.
    /// - `Pool`/`Adapter` for backend or payload failures.
    pub fn restore_from_pool(&mut self, pool: &dyn ObjectPool) -> SyncResult<()> {
        let started_at = Instant::now();
        let result = self.rebuild_from_pool(pool);
        self.log_restore("pool", started_at, &result);
        result
    }

    /// Rebuilds the session from the model stored in `store`.
    ///
    /// An empty store yields an empty model with a default layout.
    pub fn restore_from_file(&mut self, store: &ModelFileStore) -> SyncResult<()> {
        let mut loaded = CourseModel::default();
        store.load(&mut loaded)?;
        self.restore_loaded(loaded)
    }

    /// Rebuilds the session around an already deserialized model.
    ///
    /// Property values are taken as stored; no layout overrides apply.
    pub fn restore_loaded(&mut self, model: CourseModel) -> SyncResult<()> {
        let started_at = Instant::now();
        let result = self.rebuild_from_model(model);
        self.log_restore("file", started_at, &result);
        result
    }

    fn rebuild_from_pool(&mut self, pool: &dyn ObjectPool) -> SyncResult<()> {
        let mut model = CourseModel::new(effective_model_name(&pool.model_name()?, None));
        let mut registry = AdapterRegistry::new();

        let layouts = pool.objects(EntityKind::VisualLayout)?;
        let (layout_map, scale) = match layouts.first().map(|layout| &layout.data) {
            Some(ObjectData::VisualLayout {
                scale_x,
                scale_y,
                elements,
            }) => (
                LayoutMap::from_elements(elements),
                Scale::new(*scale_x, *scale_y).unwrap_or(self.default_scale),
            ),
            _ => (LayoutMap::default(), self.default_scale),
        };

        if layouts.is_empty() {
            let layout = default_layout_component(scale);
            let reference = layout.reference();
            registry.register(reference.clone(), Adapter::unbound(layout.id, reference));
            model.add(layout);
        }
        for object in &layouts {
            let (component, adapter) = instantiate(object, None)?;
            registry.register(object.reference(), adapter);
            model.add(component);
        }

        let mut block_colors = ColorCycler::new(self.palette.clone());
        let mut route_colors = ColorCycler::new(self.palette.clone());
        for kind in RESTORE_ORDER {
            for object in pool.objects(kind)? {
                let reference = object.reference();
                let layout = layout_map.get(&reference);
                let (mut component, adapter) = instantiate(&object, layout)?;
                match kind {
                    EntityKind::Block => assign_color(&mut component, &mut block_colors, layout),
                    EntityKind::StaticRoute => {
                        assign_color(&mut component, &mut route_colors, layout)
                    }
                    EntityKind::Link => {}
                    _ => attach_figure(&mut component, &registry, scale)?,
                }
                registry.register(reference, adapter);
                model.add(component);
            }
        }

        resolve_pass(&mut model, &registry, scale)?;
        self.commit(model, registry, layout_map, scale);
        Ok(())
    }

    fn rebuild_from_model(&mut self, mut model: CourseModel) -> SyncResult<()> {
        let name = effective_model_name(model.name(), None);
        model.set_name(name);

        let scale = model
            .components_of(EntityKind::VisualLayout)
            .find_map(read_scale)
            .unwrap_or(self.default_scale);
        if model.count_of(EntityKind::VisualLayout) == 0 {
            model.add(default_layout_component(scale));
        }

        let mut registry = AdapterRegistry::new();
        let ids: Vec<ComponentId> = model.components().map(|component| component.id).collect();
        for id in &ids {
            if let Some(component) = model.get_mut(*id) {
                component.clear_derived();
                let reference = component.reference();
                registry.register(reference.clone(), Adapter::unbound(component.id, reference));
            }
        }
        for id in &ids {
            if let Some(component) = model.get_mut(*id) {
                if component.kind != EntityKind::Link {
                    attach_figure(component, &registry, scale)?;
                }
            }
        }

        resolve_pass(&mut model, &registry, scale)?;
        self.commit(model, registry, LayoutMap::default(), scale);
        Ok(())
    }

    fn commit(
        &mut self,
        model: CourseModel,
        registry: AdapterRegistry,
        layout: LayoutMap,
        scale: Scale,
    ) {
        self.model = model;
        self.registry = registry;
        self.layout = layout;
        self.scale = scale;
        self.publish_all(ChangeKind::Restored);
    }

    fn log_restore(&self, source: &str, started_at: Instant, result: &SyncResult<()>) {
        match result {
            Ok(()) => info!(
                "event=model_restore module=sync status=ok source={} components={} overrides={} duration_ms={}",
                source,
                self.model.len(),
                self.layout.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=model_restore module=sync status=error source={} duration_ms={} error={}",
                source,
                started_at.elapsed().as_millis(),
                err
            ),
        }
    }
}

fn instantiate(
    object: &PlantObject,
    layout: Option<&LayoutOverride>,
) -> SyncResult<(VisualComponent, Adapter)> {
    let reference = object.reference();
    let mut component = VisualComponent::new(object.kind(), object.name.clone());
    let adapter = Adapter::bound(component.id, reference.clone());
    adapter
        .pull(object, &mut component, layout)
        .map_err(|source| SyncError::Adapter { reference, source })?;
    Ok((component, adapter))
}

/// Second pass: link figures, then location types and memberships.
fn resolve_pass(
    model: &mut CourseModel,
    registry: &AdapterRegistry,
    scale: Scale,
) -> SyncResult<()> {
    for id in model.ids_of(EntityKind::Link) {
        if let Some(link) = model.get_mut(id) {
            attach_figure(link, registry, scale)?;
        }
    }
    let ids: Vec<ComponentId> = model.components().map(|component| component.id).collect();
    for id in ids {
        if let Some(component) = model.get_mut(id) {
            resolve_links(component, registry);
        }
    }
    Ok(())
}

/// Derives the component's figure; connections need both endpoints
/// registered.
pub(super) fn attach_figure(
    component: &mut VisualComponent,
    registry: &AdapterRegistry,
    scale: Scale,
) -> SyncResult<()> {
    component.figure = match behavior(component.kind).figure {
        FigureShape::None => None,
        FigureShape::Node(node) => Some(node_figure(component, &node, scale)),
        FigureShape::Connection => {
            let end_kind = match component.kind {
                EntityKind::Link => EntityKind::Location,
                _ => EntityKind::Point,
            };
            let start =
                resolve_endpoint(component, registry, keys::START_COMPONENT, EntityKind::Point)?;
            let end = resolve_endpoint(component, registry, keys::END_COMPONENT, end_kind)?;
            Some(connection_figure(component, start, end))
        }
    };
    Ok(())
}

fn resolve_endpoint(
    component: &VisualComponent,
    registry: &AdapterRegistry,
    key: &'static str,
    kind: EntityKind,
) -> SyncResult<ComponentId> {
    let owner = component.reference();
    let Some(name) = component
        .properties
        .text(key)
        .map(str::trim)
        .filter(|name| !name.is_empty())
    else {
        return Err(SyncError::MissingEndpoint { owner, key });
    };
    let target = ObjectRef::new(kind, name);
    registry
        .resolve(&target)
        .ok_or(SyncError::UnresolvedReference { owner, target })
}

/// Resolves optional links: location types and member lists.
pub(super) fn resolve_links(component: &mut VisualComponent, registry: &AdapterRegistry) {
    match component.kind {
        EntityKind::Location => {
            component.location_type = component.properties.text(keys::LOCATION_TYPE).and_then(
                |name| {
                    let target = ObjectRef::new(EntityKind::LocationType, name);
                    let resolved = registry.resolve(&target);
                    if resolved.is_none() {
                        warn_unresolved(&component.reference(), &target.name);
                    }
                    resolved
                },
            );
        }
        EntityKind::Block | EntityKind::Group => {
            component.members = resolve_names(component, |name| {
                registry
                    .find_member(name, &MEMBER_KINDS)
                    .map(Adapter::component)
            });
        }
        EntityKind::StaticRoute => {
            component.members =
                resolve_names(component, |name| registry.resolve(&ObjectRef::point(name)));
        }
        _ => {}
    }
}

fn resolve_names(
    component: &VisualComponent,
    lookup: impl Fn(&str) -> Option<ComponentId>,
) -> Vec<ComponentId> {
    let owner = component.reference();
    component
        .properties
        .items(keys::ELEMENTS)
        .iter()
        .filter_map(|name| {
            let resolved = lookup(name);
            if resolved.is_none() {
                warn_unresolved(&owner, name);
            }
            resolved
        })
        .collect()
}

fn warn_unresolved(owner: &ObjectRef, target: &str) {
    warn!(
        "event=member_unresolved module=sync status=warn reference={} target={}",
        owner, target
    );
}

/// Next palette color for components with members; an explicit layout
/// color wins.
fn assign_color(
    component: &mut VisualComponent,
    cycler: &mut ColorCycler,
    layout: Option<&LayoutOverride>,
) {
    if !component.properties.items(keys::ELEMENTS).is_empty() {
        if let Some(color) = cycler.next_color() {
            component
                .properties
                .set(keys::BLOCK_COLOR, PropertyValue::Color(color));
        }
    }

    let Some(raw) = layout.and_then(|layout| layout.get(keys::BLOCK_COLOR)) else {
        return;
    };
    match Color::parse_hex(raw) {
        Some(color) => component
            .properties
            .set(keys::BLOCK_COLOR, PropertyValue::Color(color)),
        None => warn!(
            "event=layout_field_fallback module=sync status=warn reference={} key={} fallback=palette",
            component.reference(),
            keys::BLOCK_COLOR
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::assign_color;
    use crate::model::component::VisualComponent;
    use crate::model::layout::LayoutOverride;
    use crate::model::property::{keys, Color, PropertyValue};
    use crate::model::reference::EntityKind;
    use crate::sync::palette::ColorCycler;
    use std::collections::BTreeMap;

    fn block(members: &[&str]) -> VisualComponent {
        let mut component = VisualComponent::new(EntityKind::Block, "B");
        component
            .properties
            .set(keys::ELEMENTS, PropertyValue::set_of(members.iter().copied()));
        component
    }

    #[test]
    fn color_is_assigned_only_to_components_with_members() {
        let red = Color::rgb(255, 0, 0);
        let green = Color::rgb(0, 255, 0);
        let mut cycler = ColorCycler::new(vec![red, green]);

        let mut empty = block(&[]);
        assign_color(&mut empty, &mut cycler, None);
        assert!(empty.properties.color(keys::BLOCK_COLOR).is_none());

        let mut filled = block(&["P1"]);
        assign_color(&mut filled, &mut cycler, None);
        assert_eq!(filled.properties.color(keys::BLOCK_COLOR), Some(red));
    }

    #[test]
    fn malformed_layout_color_keeps_palette_color() {
        let red = Color::rgb(255, 0, 0);
        let mut cycler = ColorCycler::new(vec![red]);
        let layout = LayoutOverride::new(BTreeMap::from([(
            keys::BLOCK_COLOR.to_string(),
            "crimson".to_string(),
        )]));

        let mut component = block(&["P1"]);
        assign_color(&mut component, &mut cycler, Some(&layout));
        assert_eq!(component.properties.color(keys::BLOCK_COLOR), Some(red));
    }
}
