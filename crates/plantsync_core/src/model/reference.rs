//! Entity kinds and stable object references.
//!
//! # Responsibility
//! - Define the closed set of driving-course entity kinds.
//! - Provide the `ObjectRef` key shared by the authoritative pool, the
//!   adapter registry and layout overrides.
//!
//! # Invariants
//! - Names are unique per kind, so `(kind, name)` identifies one object.
//! - `EntityKind` wire labels are stable snake_case strings.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Closed set of entity kinds in a driving-course model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Point,
    Path,
    Location,
    LocationType,
    Link,
    Block,
    Group,
    StaticRoute,
    Vehicle,
    VisualLayout,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Point,
        EntityKind::Path,
        EntityKind::Location,
        EntityKind::LocationType,
        EntityKind::Link,
        EntityKind::Block,
        EntityKind::Group,
        EntityKind::StaticRoute,
        EntityKind::Vehicle,
        EntityKind::VisualLayout,
    ];

    /// Order in which components are walked when a model is persisted.
    ///
    /// Every kind appears after the kinds it references, so a backend can
    /// validate references on create.
    pub const PERSIST_ORDER: [EntityKind; 10] = [
        EntityKind::VisualLayout,
        EntityKind::Point,
        EntityKind::Path,
        EntityKind::LocationType,
        EntityKind::Location,
        EntityKind::Link,
        EntityKind::Block,
        EntityKind::Group,
        EntityKind::StaticRoute,
        EntityKind::Vehicle,
    ];

    /// Stable label used in files, database rows and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Path => "path",
            Self::Location => "location",
            Self::LocationType => "location_type",
            Self::Link => "link",
            Self::Block => "block",
            Self::Group => "group",
            Self::StaticRoute => "static_route",
            Self::Vehicle => "vehicle",
            Self::VisualLayout => "visual_layout",
        }
    }

    /// Parses a stable label produced by [`EntityKind::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Whether components of this kind connect two other components.
    pub fn is_connection(self) -> bool {
        matches!(self, Self::Path | Self::Link)
    }

    /// Whether components of this kind carry a member list.
    pub fn has_members(self) -> bool {
        matches!(self, Self::Block | Self::Group | Self::StaticRoute)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable reference to one authoritative object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: EntityKind,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn point(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Point, name)
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Path, name)
    }

    pub fn location(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Location, name)
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}
