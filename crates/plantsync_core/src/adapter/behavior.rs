//! Per-kind adapter behavior table.
//!
//! # Responsibility
//! - Map each `EntityKind` to its pull (object to component) and push
//!   (component to object payload) functions.
//! - Declare which presentation figure and which layout keys a kind has.
//!
//! # Invariants
//! - Dispatch is a closed `match` over `EntityKind`; every kind has exactly
//!   one behavior entry.
//! - Pull writes layout coordinates as integer text, the form layout
//!   overrides use.

use crate::adapter::figure::{
    layout_connection_type, layout_int, parse_control_points, NodeKeys,
    DEFAULT_LABEL_OFFSET_UNITS, DEFAULT_POSITION_UNITS, LOCATION_NODE, POINT_NODE,
};
use crate::adapter::{AdapterError, AdapterResult, PushContext};
use crate::model::component::VisualComponent;
use crate::model::layout::{LayoutElement, LayoutOverride, DEFAULT_SCALE};
use crate::model::object::{ObjectData, PlantObject, PointType, Triple};
use crate::model::property::{keys, Length, PropertySet, PropertyValue};
use crate::model::reference::{EntityKind, ObjectRef};
use log::warn;

/// Kinds a block or group member name may resolve to, in lookup order.
pub const MEMBER_KINDS: [EntityKind; 3] =
    [EntityKind::Point, EntityKind::Path, EntityKind::Location];

type PullFn = fn(&PlantObject, &mut VisualComponent, Option<&LayoutOverride>) -> AdapterResult<()>;
type PushFn = fn(&VisualComponent, &PushContext<'_>) -> AdapterResult<ObjectData>;

/// Presentation object shape of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureShape {
    None,
    Node(NodeKeys),
    Connection,
}

/// Behavior entry of one entity kind.
pub struct KindBehavior {
    pub kind: EntityKind,
    pub figure: FigureShape,
    /// Keys copied into the visual layout element of a component.
    pub layout_keys: &'static [&'static str],
    pull: PullFn,
    push: PushFn,
}

impl KindBehavior {
    pub(crate) fn pull(
        &self,
        object: &PlantObject,
        component: &mut VisualComponent,
        layout: Option<&LayoutOverride>,
    ) -> AdapterResult<()> {
        (self.pull)(object, component, layout)
    }

    pub(crate) fn push(
        &self,
        component: &VisualComponent,
        context: &PushContext<'_>,
    ) -> AdapterResult<ObjectData> {
        (self.push)(component, context)
    }
}

static POINT: KindBehavior = KindBehavior {
    kind: EntityKind::Point,
    figure: FigureShape::Node(POINT_NODE),
    layout_keys: &[
        keys::POINT_POS_X,
        keys::POINT_POS_Y,
        keys::POINT_LABEL_OFFSET_X,
        keys::POINT_LABEL_OFFSET_Y,
    ],
    pull: pull_point,
    push: push_point,
};

static PATH: KindBehavior = KindBehavior {
    kind: EntityKind::Path,
    figure: FigureShape::Connection,
    layout_keys: &[keys::PATH_CONN_TYPE, keys::PATH_CONTROL_POINTS],
    pull: pull_path,
    push: push_path,
};

static LOCATION: KindBehavior = KindBehavior {
    kind: EntityKind::Location,
    figure: FigureShape::Node(LOCATION_NODE),
    layout_keys: &[
        keys::LOC_POS_X,
        keys::LOC_POS_Y,
        keys::LOC_LABEL_OFFSET_X,
        keys::LOC_LABEL_OFFSET_Y,
    ],
    pull: pull_location,
    push: push_location,
};

static LOCATION_TYPE: KindBehavior = KindBehavior {
    kind: EntityKind::LocationType,
    figure: FigureShape::None,
    layout_keys: &[],
    pull: pull_location_type,
    push: push_location_type,
};

static LINK: KindBehavior = KindBehavior {
    kind: EntityKind::Link,
    figure: FigureShape::Connection,
    layout_keys: &[],
    pull: pull_link,
    push: push_link,
};

static BLOCK: KindBehavior = KindBehavior {
    kind: EntityKind::Block,
    figure: FigureShape::None,
    layout_keys: &[keys::BLOCK_COLOR],
    pull: pull_block,
    push: push_block,
};

static GROUP: KindBehavior = KindBehavior {
    kind: EntityKind::Group,
    figure: FigureShape::None,
    layout_keys: &[],
    pull: pull_group,
    push: push_group,
};

static STATIC_ROUTE: KindBehavior = KindBehavior {
    kind: EntityKind::StaticRoute,
    figure: FigureShape::None,
    layout_keys: &[keys::BLOCK_COLOR],
    pull: pull_static_route,
    push: push_static_route,
};

static VEHICLE: KindBehavior = KindBehavior {
    kind: EntityKind::Vehicle,
    figure: FigureShape::None,
    layout_keys: &[],
    pull: pull_vehicle,
    push: push_vehicle,
};

static VISUAL_LAYOUT: KindBehavior = KindBehavior {
    kind: EntityKind::VisualLayout,
    figure: FigureShape::None,
    layout_keys: &[],
    pull: pull_visual_layout,
    push: push_visual_layout,
};

/// Behavior entry for `kind`.
pub fn behavior(kind: EntityKind) -> &'static KindBehavior {
    match kind {
        EntityKind::Point => &POINT,
        EntityKind::Path => &PATH,
        EntityKind::Location => &LOCATION,
        EntityKind::LocationType => &LOCATION_TYPE,
        EntityKind::Link => &LINK,
        EntityKind::Block => &BLOCK,
        EntityKind::Group => &GROUP,
        EntityKind::StaticRoute => &STATIC_ROUTE,
        EntityKind::Vehicle => &VEHICLE,
        EntityKind::VisualLayout => &VISUAL_LAYOUT,
    }
}

fn mismatch(expected: EntityKind, object: &PlantObject) -> AdapterError {
    AdapterError::KindMismatch {
        expected,
        actual: object.kind(),
    }
}

fn pull_point(
    object: &PlantObject,
    component: &mut VisualComponent,
    layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::Point {
        position,
        point_type,
        vehicle_orientation_angle,
    } = &object.data
    else {
        return Err(mismatch(EntityKind::Point, object));
    };

    let reference = object.reference();
    let properties = &mut component.properties;
    set_position(properties, position);
    properties.set_text(keys::POINT_TYPE, point_type.as_str());
    match vehicle_orientation_angle {
        Some(angle) => properties.set_text(keys::VEHICLE_ORIENTATION_ANGLE, angle.to_string()),
        None => {
            properties.remove(keys::VEHICLE_ORIENTATION_ANGLE);
        }
    }
    pull_node_layout(&reference, properties, &POINT_NODE, layout, position);
    Ok(())
}

fn pull_path(
    object: &PlantObject,
    component: &mut VisualComponent,
    layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::Path {
        source_point,
        destination_point,
        length,
        max_velocity,
        max_reverse_velocity,
        locked,
    } = &object.data
    else {
        return Err(mismatch(EntityKind::Path, object));
    };

    let reference = object.reference();
    let properties = &mut component.properties;
    properties.set_text(keys::START_COMPONENT, source_point.as_str());
    properties.set_text(keys::END_COMPONENT, destination_point.as_str());
    properties.set(keys::LENGTH, PropertyValue::Length(Length::mm(*length as f64)));
    properties.set(keys::MAX_VELOCITY, PropertyValue::Integer(*max_velocity));
    properties.set(
        keys::MAX_REVERSE_VELOCITY,
        PropertyValue::Integer(*max_reverse_velocity),
    );
    properties.set(keys::LOCKED, PropertyValue::Flag(*locked));

    let connection_type =
        layout_connection_type(&reference, layout.and_then(|l| l.get(keys::PATH_CONN_TYPE)));
    properties.set_text(keys::PATH_CONN_TYPE, connection_type.as_str());

    match layout.and_then(|l| l.get(keys::PATH_CONTROL_POINTS)) {
        Some(raw) if parse_control_points(raw).is_some() => {
            properties.set_text(keys::PATH_CONTROL_POINTS, raw);
        }
        Some(_) => {
            warn!(
                "event=layout_field_fallback module=adapter status=warn reference={} key={} fallback=none",
                reference,
                keys::PATH_CONTROL_POINTS
            );
            properties.remove(keys::PATH_CONTROL_POINTS);
        }
        None => {
            properties.remove(keys::PATH_CONTROL_POINTS);
        }
    }
    Ok(())
}

fn pull_location(
    object: &PlantObject,
    component: &mut VisualComponent,
    layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::Location {
        location_type,
        position,
    } = &object.data
    else {
        return Err(mismatch(EntityKind::Location, object));
    };

    let reference = object.reference();
    let properties = &mut component.properties;
    properties.set_text(keys::LOCATION_TYPE, location_type.as_str());
    set_position(properties, position);
    pull_node_layout(&reference, properties, &LOCATION_NODE, layout, position);
    Ok(())
}

fn pull_location_type(
    object: &PlantObject,
    component: &mut VisualComponent,
    _layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::LocationType { allowed_operations } = &object.data else {
        return Err(mismatch(EntityKind::LocationType, object));
    };
    component.properties.set(
        keys::ALLOWED_OPERATIONS,
        PropertyValue::set_of(allowed_operations.iter().cloned()),
    );
    Ok(())
}

fn pull_link(
    object: &PlantObject,
    component: &mut VisualComponent,
    _layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::Link {
        point,
        location,
        allowed_operations,
    } = &object.data
    else {
        return Err(mismatch(EntityKind::Link, object));
    };
    let properties = &mut component.properties;
    properties.set_text(keys::START_COMPONENT, point.as_str());
    properties.set_text(keys::END_COMPONENT, location.as_str());
    properties.set(
        keys::ALLOWED_OPERATIONS,
        PropertyValue::set_of(allowed_operations.iter().cloned()),
    );
    Ok(())
}

fn pull_block(
    object: &PlantObject,
    component: &mut VisualComponent,
    _layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::Block { members } = &object.data else {
        return Err(mismatch(EntityKind::Block, object));
    };
    set_member_names(&mut component.properties, members);
    Ok(())
}

fn pull_group(
    object: &PlantObject,
    component: &mut VisualComponent,
    _layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::Group { members } = &object.data else {
        return Err(mismatch(EntityKind::Group, object));
    };
    set_member_names(&mut component.properties, members);
    Ok(())
}

fn pull_static_route(
    object: &PlantObject,
    component: &mut VisualComponent,
    _layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::StaticRoute { hops } = &object.data else {
        return Err(mismatch(EntityKind::StaticRoute, object));
    };
    component
        .properties
        .set(keys::ELEMENTS, PropertyValue::list_of(hops.iter().cloned()));
    Ok(())
}

fn pull_vehicle(
    object: &PlantObject,
    component: &mut VisualComponent,
    _layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::Vehicle {
        length,
        energy_level_critical,
        energy_level_good,
        max_velocity,
        max_reverse_velocity,
    } = &object.data
    else {
        return Err(mismatch(EntityKind::Vehicle, object));
    };
    let properties = &mut component.properties;
    properties.set(keys::LENGTH, PropertyValue::Length(Length::mm(*length as f64)));
    properties.set(
        keys::ENERGY_LEVEL_CRITICAL,
        PropertyValue::Integer(*energy_level_critical),
    );
    properties.set(
        keys::ENERGY_LEVEL_GOOD,
        PropertyValue::Integer(*energy_level_good),
    );
    properties.set(keys::MAX_VELOCITY, PropertyValue::Integer(*max_velocity));
    properties.set(
        keys::MAX_REVERSE_VELOCITY,
        PropertyValue::Integer(*max_reverse_velocity),
    );
    Ok(())
}

fn pull_visual_layout(
    object: &PlantObject,
    component: &mut VisualComponent,
    _layout: Option<&LayoutOverride>,
) -> AdapterResult<()> {
    let ObjectData::VisualLayout {
        scale_x, scale_y, ..
    } = &object.data
    else {
        return Err(mismatch(EntityKind::VisualLayout, object));
    };
    component
        .properties
        .set_text(keys::SCALE_X, scale_x.to_string());
    component
        .properties
        .set_text(keys::SCALE_Y, scale_y.to_string());
    Ok(())
}

fn push_point(component: &VisualComponent, _context: &PushContext<'_>) -> AdapterResult<ObjectData> {
    let properties = &component.properties;
    let point_type = properties
        .text(keys::POINT_TYPE)
        .and_then(PointType::parse)
        .unwrap_or_default();
    let vehicle_orientation_angle = properties
        .text(keys::VEHICLE_ORIENTATION_ANGLE)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|angle| angle.is_finite());

    Ok(ObjectData::Point {
        position: read_position(properties),
        point_type,
        vehicle_orientation_angle,
    })
}

fn push_path(component: &VisualComponent, _context: &PushContext<'_>) -> AdapterResult<ObjectData> {
    let properties = &component.properties;
    Ok(ObjectData::Path {
        source_point: required_text(component, keys::START_COMPONENT)?,
        destination_point: required_text(component, keys::END_COMPONENT)?,
        length: read_mm(properties, keys::LENGTH),
        max_velocity: properties.integer(keys::MAX_VELOCITY).unwrap_or(0),
        max_reverse_velocity: properties.integer(keys::MAX_REVERSE_VELOCITY).unwrap_or(0),
        locked: properties.flag(keys::LOCKED).unwrap_or(false),
    })
}

fn push_location(
    component: &VisualComponent,
    _context: &PushContext<'_>,
) -> AdapterResult<ObjectData> {
    Ok(ObjectData::Location {
        location_type: required_text(component, keys::LOCATION_TYPE)?,
        position: read_position(&component.properties),
    })
}

fn push_location_type(
    component: &VisualComponent,
    _context: &PushContext<'_>,
) -> AdapterResult<ObjectData> {
    Ok(ObjectData::LocationType {
        allowed_operations: component.properties.items(keys::ALLOWED_OPERATIONS).to_vec(),
    })
}

fn push_link(component: &VisualComponent, _context: &PushContext<'_>) -> AdapterResult<ObjectData> {
    Ok(ObjectData::Link {
        point: required_text(component, keys::START_COMPONENT)?,
        location: required_text(component, keys::END_COMPONENT)?,
        allowed_operations: component.properties.items(keys::ALLOWED_OPERATIONS).to_vec(),
    })
}

fn push_block(component: &VisualComponent, context: &PushContext<'_>) -> AdapterResult<ObjectData> {
    Ok(ObjectData::Block {
        members: resolve_member_refs(component, context),
    })
}

fn push_group(component: &VisualComponent, context: &PushContext<'_>) -> AdapterResult<ObjectData> {
    Ok(ObjectData::Group {
        members: resolve_member_refs(component, context),
    })
}

fn push_static_route(
    component: &VisualComponent,
    _context: &PushContext<'_>,
) -> AdapterResult<ObjectData> {
    Ok(ObjectData::StaticRoute {
        hops: component.properties.items(keys::ELEMENTS).to_vec(),
    })
}

fn push_vehicle(
    component: &VisualComponent,
    _context: &PushContext<'_>,
) -> AdapterResult<ObjectData> {
    let properties = &component.properties;
    Ok(ObjectData::Vehicle {
        length: read_mm(properties, keys::LENGTH),
        energy_level_critical: properties.integer(keys::ENERGY_LEVEL_CRITICAL).unwrap_or(0),
        energy_level_good: properties.integer(keys::ENERGY_LEVEL_GOOD).unwrap_or(0),
        max_velocity: properties.integer(keys::MAX_VELOCITY).unwrap_or(0),
        max_reverse_velocity: properties.integer(keys::MAX_REVERSE_VELOCITY).unwrap_or(0),
    })
}

/// Rebuilds the layout element list from every component that carries
/// layout keys, so a later restore reproduces the current presentation.
fn push_visual_layout(
    component: &VisualComponent,
    context: &PushContext<'_>,
) -> AdapterResult<ObjectData> {
    let scale_factor = |key: &str| {
        component
            .properties
            .text(key)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .unwrap_or(DEFAULT_SCALE)
    };

    let elements = context
        .model
        .components()
        .filter_map(|candidate| {
            let layout_keys = behavior(candidate.kind).layout_keys;
            if layout_keys.is_empty() {
                return None;
            }
            let mut element = LayoutElement::new(candidate.reference());
            for key in layout_keys {
                if let Some(value) = candidate.properties.get(key).and_then(layout_text) {
                    element.properties.insert((*key).to_string(), value);
                }
            }
            Some(element)
        })
        .collect();

    Ok(ObjectData::VisualLayout {
        scale_x: scale_factor(keys::SCALE_X),
        scale_y: scale_factor(keys::SCALE_Y),
        elements,
    })
}

fn set_position(properties: &mut PropertySet, position: &Triple) {
    properties.set(keys::POSITION_X, PropertyValue::Length(Length::mm(position.x as f64)));
    properties.set(keys::POSITION_Y, PropertyValue::Length(Length::mm(position.y as f64)));
    properties.set(keys::POSITION_Z, PropertyValue::Length(Length::mm(position.z as f64)));
}

fn read_position(properties: &PropertySet) -> Triple {
    Triple::new(
        read_mm(properties, keys::POSITION_X),
        read_mm(properties, keys::POSITION_Y),
        read_mm(properties, keys::POSITION_Z),
    )
}

fn read_mm(properties: &PropertySet, key: &str) -> i64 {
    properties
        .length(key)
        .map(|length| length.as_mm().round() as i64)
        .unwrap_or(0)
}

/// Writes node layout keys; an override pair wins over the object position.
fn pull_node_layout(
    reference: &ObjectRef,
    properties: &mut PropertySet,
    node: &NodeKeys,
    layout: Option<&LayoutOverride>,
    position: &Triple,
) {
    let (x, y) = match layout.and_then(|l| l.pair(node.pos_x, node.pos_y)) {
        Some((x, y)) => (
            layout_int(reference, node.pos_x, Some(x), DEFAULT_POSITION_UNITS),
            layout_int(reference, node.pos_y, Some(y), DEFAULT_POSITION_UNITS),
        ),
        None => (position.x, position.y),
    };
    let label_x = layout_int(
        reference,
        node.label_x,
        layout.and_then(|l| l.get(node.label_x)),
        DEFAULT_LABEL_OFFSET_UNITS,
    );
    let label_y = layout_int(
        reference,
        node.label_y,
        layout.and_then(|l| l.get(node.label_y)),
        DEFAULT_LABEL_OFFSET_UNITS,
    );

    properties.set_text(node.pos_x, x.to_string());
    properties.set_text(node.pos_y, y.to_string());
    properties.set_text(node.label_x, label_x.to_string());
    properties.set_text(node.label_y, label_y.to_string());
}

fn set_member_names(properties: &mut PropertySet, members: &[ObjectRef]) {
    properties.set(
        keys::ELEMENTS,
        PropertyValue::set_of(members.iter().map(|member| member.name.clone())),
    );
}

fn required_text(component: &VisualComponent, key: &'static str) -> AdapterResult<String> {
    match component.properties.text(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(AdapterError::MissingField {
            reference: component.reference(),
            key,
        }),
    }
}

fn resolve_member_refs(component: &VisualComponent, context: &PushContext<'_>) -> Vec<ObjectRef> {
    component
        .properties
        .items(keys::ELEMENTS)
        .iter()
        .filter_map(|name| {
            let resolved = context
                .registry
                .find_member(name, &MEMBER_KINDS)
                .map(|adapter| adapter.reference().clone());
            if resolved.is_none() {
                warn!(
                    "event=member_unresolved module=adapter status=warn reference={} member={}",
                    component.reference(),
                    name
                );
            }
            resolved
        })
        .collect()
}

fn layout_text(value: &PropertyValue) -> Option<String> {
    match value {
        PropertyValue::Text(text) => Some(text.clone()),
        PropertyValue::Integer(number) => Some(number.to_string()),
        PropertyValue::Color(color) => Some(color.to_hex()),
        _ => None,
    }
}
