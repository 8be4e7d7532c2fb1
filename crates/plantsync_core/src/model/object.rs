//! Authoritative object snapshots.
//!
//! # Responsibility
//! - Define the per-kind payload the authoritative pool stores.
//! - Expose the outgoing references of each object for pool validation.
//!
//! # Invariants
//! - An object's kind is the kind of its payload; there is no separate tag.
//! - Ad-hoc `properties` never influence reconciliation, they are carried.

use crate::model::layout::LayoutElement;
use crate::model::reference::{EntityKind, ObjectRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Engineering position in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Triple {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

/// Role of a point in vehicle routing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    #[default]
    Halt,
    Report,
    Park,
}

impl PointType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Report => "report",
            Self::Park => "park",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "halt" => Some(Self::Halt),
            "report" => Some(Self::Report),
            "park" => Some(Self::Park),
            _ => None,
        }
    }
}

/// Per-kind payload of an authoritative object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectData {
    Point {
        position: Triple,
        point_type: PointType,
        vehicle_orientation_angle: Option<f64>,
    },
    Path {
        source_point: String,
        destination_point: String,
        length: i64,
        max_velocity: i64,
        max_reverse_velocity: i64,
        locked: bool,
    },
    Location {
        location_type: String,
        position: Triple,
    },
    LocationType {
        allowed_operations: Vec<String>,
    },
    Link {
        point: String,
        location: String,
        allowed_operations: Vec<String>,
    },
    Block {
        members: Vec<ObjectRef>,
    },
    Group {
        members: Vec<ObjectRef>,
    },
    StaticRoute {
        hops: Vec<String>,
    },
    Vehicle {
        length: i64,
        energy_level_critical: i64,
        energy_level_good: i64,
        max_velocity: i64,
        max_reverse_velocity: i64,
    },
    VisualLayout {
        scale_x: f64,
        scale_y: f64,
        elements: Vec<LayoutElement>,
    },
}

impl ObjectData {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Point { .. } => EntityKind::Point,
            Self::Path { .. } => EntityKind::Path,
            Self::Location { .. } => EntityKind::Location,
            Self::LocationType { .. } => EntityKind::LocationType,
            Self::Link { .. } => EntityKind::Link,
            Self::Block { .. } => EntityKind::Block,
            Self::Group { .. } => EntityKind::Group,
            Self::StaticRoute { .. } => EntityKind::StaticRoute,
            Self::Vehicle { .. } => EntityKind::Vehicle,
            Self::VisualLayout { .. } => EntityKind::VisualLayout,
        }
    }

    /// Objects this payload refers to and that must exist in the same pool.
    ///
    /// Layout elements are excluded: a layout may describe objects that are
    /// created after it.
    pub fn references(&self) -> Vec<ObjectRef> {
        match self {
            Self::Path {
                source_point,
                destination_point,
                ..
            } => vec![
                ObjectRef::point(source_point.as_str()),
                ObjectRef::point(destination_point.as_str()),
            ],
            Self::Location { location_type, .. } => vec![ObjectRef::new(
                EntityKind::LocationType,
                location_type.as_str(),
            )],
            Self::Link {
                point, location, ..
            } => vec![
                ObjectRef::point(point.as_str()),
                ObjectRef::location(location.as_str()),
            ],
            Self::Block { members } | Self::Group { members } => members.clone(),
            Self::StaticRoute { hops } => hops.iter().map(ObjectRef::point).collect(),
            Self::Point { .. }
            | Self::LocationType { .. }
            | Self::Vehicle { .. }
            | Self::VisualLayout { .. } => Vec::new(),
        }
    }
}

/// Snapshot of one authoritative object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantObject {
    pub name: String,
    /// Ad-hoc key/value properties.
    pub properties: BTreeMap<String, String>,
    pub data: ObjectData,
}

impl PlantObject {
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            data,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    pub fn reference(&self) -> ObjectRef {
        ObjectRef::new(self.kind(), self.name.clone())
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Halt point at `(x, y, 0)`.
    pub fn point(name: impl Into<String>, x: i64, y: i64) -> Self {
        Self::new(
            name,
            ObjectData::Point {
                position: Triple::new(x, y, 0),
                point_type: PointType::Halt,
                vehicle_orientation_angle: None,
            },
        )
    }

    /// Unlocked path with zero length and velocities.
    pub fn path(
        name: impl Into<String>,
        source_point: impl Into<String>,
        destination_point: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ObjectData::Path {
                source_point: source_point.into(),
                destination_point: destination_point.into(),
                length: 0,
                max_velocity: 0,
                max_reverse_velocity: 0,
                locked: false,
            },
        )
    }

    pub fn block(name: impl Into<String>, members: Vec<ObjectRef>) -> Self {
        Self::new(name, ObjectData::Block { members })
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectData, PlantObject, PointType};
    use crate::model::reference::{EntityKind, ObjectRef};

    #[test]
    fn kind_follows_payload() {
        let object = PlantObject::path("P1--P2", "P1", "P2");
        assert_eq!(object.kind(), EntityKind::Path);
        assert_eq!(
            object.reference(),
            ObjectRef::new(EntityKind::Path, "P1--P2")
        );
    }

    #[test]
    fn references_cover_path_endpoints_and_route_hops() {
        let path = PlantObject::path("P1--P2", "P1", "P2");
        assert_eq!(
            path.data.references(),
            vec![ObjectRef::point("P1"), ObjectRef::point("P2")]
        );

        let route = ObjectData::StaticRoute {
            hops: vec!["A".into(), "B".into()],
        };
        assert_eq!(
            route.references(),
            vec![ObjectRef::point("A"), ObjectRef::point("B")]
        );
    }

    #[test]
    fn point_type_parse_accepts_any_case() {
        assert_eq!(PointType::parse("REPORT"), Some(PointType::Report));
        assert_eq!(PointType::parse("dock"), None);
    }
}
