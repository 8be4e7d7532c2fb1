//! Layout overrides and coordinate scale.
//!
//! # Responsibility
//! - Model the layout elements a visual layout stores per object.
//! - Index them by object reference for restore-time override lookups.
//! - Convert between engineering (mm, y up) and screen (y down) coordinates.
//!
//! # Invariants
//! - A `Scale` never holds zero or non-finite factors.
//! - At most one override is indexed per reference; later elements win.

use crate::model::component::ScreenPoint;
use crate::model::reference::ObjectRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Scale used when no visual layout provides one (mm per pixel).
pub const DEFAULT_SCALE: f64 = 1.0;
/// Label offset used when neither the layout nor the component sets one.
pub const DEFAULT_LABEL_OFFSET: f64 = -20.0;

/// Layout data a visual layout stores for one authoritative object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutElement {
    pub visualized_object: ObjectRef,
    pub layer: i32,
    pub properties: BTreeMap<String, String>,
}

impl LayoutElement {
    pub fn new(visualized_object: ObjectRef) -> Self {
        Self {
            visualized_object,
            layer: 0,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Presentation properties that take precedence over authoritative values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutOverride {
    properties: BTreeMap<String, String>,
}

impl LayoutOverride {
    pub fn new(properties: BTreeMap<String, String>) -> Self {
        Self { properties }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns both values only when both keys are present.
    pub fn pair(&self, key_x: &str, key_y: &str) -> Option<(&str, &str)> {
        Some((self.get(key_x)?, self.get(key_y)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Reference-indexed layout overrides of one visual layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutMap {
    overrides: HashMap<ObjectRef, LayoutOverride>,
}

impl LayoutMap {
    pub fn from_elements<'a>(elements: impl IntoIterator<Item = &'a LayoutElement>) -> Self {
        let overrides = elements
            .into_iter()
            .map(|element| {
                (
                    element.visualized_object.clone(),
                    LayoutOverride::new(element.properties.clone()),
                )
            })
            .collect();
        Self { overrides }
    }

    pub fn get(&self, reference: &ObjectRef) -> Option<&LayoutOverride> {
        self.overrides.get(reference)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// Working coordinate scale (mm per screen unit on each axis).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    x: f64,
    y: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            x: DEFAULT_SCALE,
            y: DEFAULT_SCALE,
        }
    }
}

impl Scale {
    /// Returns `None` when either factor is zero, negative or not finite.
    pub fn new(x: f64, y: f64) -> Option<Self> {
        let valid = |value: f64| value.is_finite() && value > 0.0;
        if valid(x) && valid(y) {
            Some(Self { x, y })
        } else {
            None
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Engineering position to screen position; the vertical axis flips.
    pub fn to_screen(&self, x: f64, y: f64) -> ScreenPoint {
        ScreenPoint::new(x / self.x, -y / self.y)
    }

    /// Screen position back to engineering position.
    pub fn to_model(&self, point: ScreenPoint) -> (f64, f64) {
        (point.x * self.x, -point.y * self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::{LayoutElement, LayoutMap, Scale, DEFAULT_SCALE};
    use crate::model::component::ScreenPoint;
    use crate::model::reference::ObjectRef;

    #[test]
    fn scale_rejects_degenerate_factors() {
        assert!(Scale::new(0.0, 1.0).is_none());
        assert!(Scale::new(1.0, f64::NAN).is_none());
        assert!(Scale::new(-2.0, 1.0).is_none());
        assert_eq!(Scale::default().x(), DEFAULT_SCALE);
    }

    #[test]
    fn to_screen_inverts_vertical_axis() {
        let scale = Scale::new(50.0, 25.0).unwrap();
        assert_eq!(scale.to_screen(1000.0, 500.0), ScreenPoint::new(20.0, -20.0));
        assert_eq!(scale.to_model(ScreenPoint::new(20.0, -20.0)), (1000.0, 500.0));
    }

    #[test]
    fn layout_map_indexes_by_reference() {
        let elements = vec![
            LayoutElement::new(ObjectRef::point("P1")).with_property("POINT_POS_X", "10"),
            LayoutElement::new(ObjectRef::point("P1")).with_property("POINT_POS_X", "20"),
        ];
        let map = LayoutMap::from_elements(&elements);
        assert_eq!(map.len(), 1);
        let found = map.get(&ObjectRef::point("P1")).unwrap();
        assert_eq!(found.get("POINT_POS_X"), Some("20"));
        assert!(map.get(&ObjectRef::path("P1")).is_none());
    }
}
