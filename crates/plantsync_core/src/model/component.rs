//! Visual component model.
//!
//! # Responsibility
//! - Define the editable counterpart of one authoritative object.
//! - Hold the derived presentation object (`Figure`) and the component ids
//!   resolved during reconciliation.
//!
//! # Invariants
//! - `id` is stable for the lifetime of the component and never reused.
//! - Components never own other components; cross-component links are
//!   `ComponentId`s resolved through the adapter registry.
//! - `figure`, `members` and `location_type` are derived state and are not
//!   part of the persisted record.

use crate::model::property::PropertySet;
use crate::model::reference::{EntityKind, ObjectRef};
use uuid::Uuid;

/// Stable identifier of one visual component.
pub type ComponentId = Uuid;

/// Point in screen (drawing) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// How a path figure draws the line between its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionType {
    #[default]
    Direct,
    Elbow,
    Slanted,
    Bezier,
}

impl ConnectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Elbow => "ELBOW",
            Self::Slanted => "SLANTED",
            Self::Bezier => "BEZIER",
        }
    }

    /// Case-insensitive parse of a stored connection type.
    pub fn parse_normalized(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DIRECT" => Some(Self::Direct),
            "ELBOW" => Some(Self::Elbow),
            "SLANTED" => Some(Self::Slanted),
            "BEZIER" => Some(Self::Bezier),
            _ => None,
        }
    }
}

/// Presentation object of a component.
#[derive(Debug, Clone, PartialEq)]
pub enum Figure {
    /// Positioned node (point or location) with a label.
    Node {
        position: ScreenPoint,
        label_offset: ScreenPoint,
    },
    /// Connection between two node figures (path or link).
    Connection {
        start: ComponentId,
        end: ComponentId,
        connection_type: ConnectionType,
        control_points: Vec<ScreenPoint>,
    },
}

impl Figure {
    /// Label anchor: node position shifted by the label offset.
    pub fn label_position(&self) -> Option<ScreenPoint> {
        match self {
            Self::Node {
                position,
                label_offset,
            } => Some(ScreenPoint::new(
                position.x + label_offset.x,
                position.y + label_offset.y,
            )),
            Self::Connection { .. } => None,
        }
    }

    pub fn endpoints(&self) -> Option<(ComponentId, ComponentId)> {
        match self {
            Self::Connection { start, end, .. } => Some((*start, *end)),
            Self::Node { .. } => None,
        }
    }
}

/// Editable counterpart of one authoritative object.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualComponent {
    pub id: ComponentId,
    pub kind: EntityKind,
    pub name: String,
    pub properties: PropertySet,
    /// Derived presentation object; `None` for kinds without one.
    pub figure: Option<Figure>,
    /// Resolved block/group/route members, in member-list order.
    pub members: Vec<ComponentId>,
    /// Resolved location type of a location component.
    pub location_type: Option<ComponentId>,
}

impl VisualComponent {
    /// Creates an empty component with a generated stable id.
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            properties: PropertySet::new(),
            figure: None,
            members: Vec::new(),
            location_type: None,
        }
    }

    /// Reference of the authoritative object this component stands for.
    pub fn reference(&self) -> ObjectRef {
        ObjectRef::new(self.kind, self.name.clone())
    }

    /// Compares persisted content only: kind, name and properties.
    pub fn same_content(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name && self.properties == other.properties
    }

    /// Drops derived state, e.g. before a fresh reconciliation pass.
    pub fn clear_derived(&mut self) {
        self.figure = None;
        self.members.clear();
        self.location_type = None;
    }
}
