//! Typed property values carried by visual components.
//!
//! # Responsibility
//! - Define the value shapes a visual component can hold (text, lengths,
//!   sets, colors, key/value maps).
//! - Name the well-known property keys shared by adapters, layout overrides
//!   and the model file.
//!
//! # Invariants
//! - `Set` values are duplicate-free and keep first-seen order.
//! - `Color` always renders as `#RRGGBB` (upper-case hex).
//! - `Length` conversions go through millimetres.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9A-Fa-f]{6})$").expect("valid hex color regex"));

/// Well-known property keys.
///
/// Layout keys (`*_POS_*`, `*_LABEL_OFFSET_*`, `PATH_*`, `BLOCK_COLOR`) use
/// the same spelling in layout overrides, so a layout element's property set
/// can be applied to a component key by key.
pub mod keys {
    pub const MISCELLANEOUS: &str = "MISCELLANEOUS";

    pub const POSITION_X: &str = "POSITION_X";
    pub const POSITION_Y: &str = "POSITION_Y";
    pub const POSITION_Z: &str = "POSITION_Z";
    pub const POINT_TYPE: &str = "POINT_TYPE";
    pub const VEHICLE_ORIENTATION_ANGLE: &str = "VEHICLE_ORIENTATION_ANGLE";

    pub const POINT_POS_X: &str = "POINT_POS_X";
    pub const POINT_POS_Y: &str = "POINT_POS_Y";
    pub const POINT_LABEL_OFFSET_X: &str = "POINT_LABEL_OFFSET_X";
    pub const POINT_LABEL_OFFSET_Y: &str = "POINT_LABEL_OFFSET_Y";

    pub const LOC_POS_X: &str = "LOC_POS_X";
    pub const LOC_POS_Y: &str = "LOC_POS_Y";
    pub const LOC_LABEL_OFFSET_X: &str = "LOC_LABEL_OFFSET_X";
    pub const LOC_LABEL_OFFSET_Y: &str = "LOC_LABEL_OFFSET_Y";

    pub const PATH_CONN_TYPE: &str = "PATH_CONN_TYPE";
    pub const PATH_CONTROL_POINTS: &str = "PATH_CONTROL_POINTS";

    pub const START_COMPONENT: &str = "START_COMPONENT";
    pub const END_COMPONENT: &str = "END_COMPONENT";

    pub const LENGTH: &str = "LENGTH";
    pub const MAX_VELOCITY: &str = "MAX_VELOCITY";
    pub const MAX_REVERSE_VELOCITY: &str = "MAX_REVERSE_VELOCITY";
    pub const LOCKED: &str = "LOCKED";

    pub const LOCATION_TYPE: &str = "LOCATION_TYPE";
    pub const ALLOWED_OPERATIONS: &str = "ALLOWED_OPERATIONS";
    pub const ELEMENTS: &str = "ELEMENTS";
    pub const BLOCK_COLOR: &str = "BLOCK_COLOR";

    pub const ENERGY_LEVEL_CRITICAL: &str = "ENERGY_LEVEL_CRITICAL";
    pub const ENERGY_LEVEL_GOOD: &str = "ENERGY_LEVEL_GOOD";

    pub const SCALE_X: &str = "SCALE_X";
    pub const SCALE_Y: &str = "SCALE_Y";
}

/// Length units understood by `Length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    Mm,
    Cm,
    M,
    Km,
}

impl LengthUnit {
    fn mm_factor(self) -> f64 {
        match self {
            Self::Mm => 1.0,
            Self::Cm => 10.0,
            Self::M => 1_000.0,
            Self::Km => 1_000_000.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mm => "mm",
            Self::Cm => "cm",
            Self::M => "m",
            Self::Km => "km",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mm" => Some(Self::Mm),
            "cm" => Some(Self::Cm),
            "m" => Some(Self::M),
            "km" => Some(Self::Km),
            _ => None,
        }
    }
}

/// Unit-aware length value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    pub fn mm(value: f64) -> Self {
        Self::new(value, LengthUnit::Mm)
    }

    /// Returns this length expressed in `unit`.
    pub fn value_in(&self, unit: LengthUnit) -> f64 {
        self.value * self.unit.mm_factor() / unit.mm_factor()
    }

    pub fn as_mm(&self) -> f64 {
        self.value_in(LengthUnit::Mm)
    }
}

/// 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB`; anything else yields `None`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let captures = HEX_COLOR_RE.captures(value.trim())?;
        let packed = u32::from_str_radix(&captures[1], 16).ok()?;
        Some(Self::rgb(
            ((packed >> 16) & 0xFF) as u8,
            ((packed >> 8) & 0xFF) as u8,
            (packed & 0xFF) as u8,
        ))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Flag(bool),
    Length(Length),
    Color(Color),
    /// Ordered, duplicate-free item list (members, operations).
    Set(Vec<String>),
    /// Ordered item list that keeps repeats (route hops).
    List(Vec<String>),
    /// Ordered key/value entries (ad-hoc properties).
    Map(BTreeMap<String, String>),
}

impl PropertyValue {
    /// Builds a `Set`, dropping duplicates while keeping first-seen order.
    pub fn set_of<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(dedup_items(items))
    }

    /// Builds a `List`, keeping every item in order.
    pub fn list_of<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Stable label for the value shape.
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Flag(_) => "flag",
            Self::Length(_) => "length",
            Self::Color(_) => "color",
            Self::Set(_) => "set",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

/// Named properties of one visual component, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    values: BTreeMap<String, PropertyValue>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: PropertyValue) {
        let value = match value {
            PropertyValue::Set(items) => PropertyValue::Set(dedup_items(items)),
            other => other,
        };
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, PropertyValue::Text(value.into()));
    }

    /// Returns the text value of `key`, or `None` for absent/non-text values.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(PropertyValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(PropertyValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(PropertyValue::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn length(&self, key: &str) -> Option<Length> {
        match self.values.get(key) {
            Some(PropertyValue::Length(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn color(&self, key: &str) -> Option<Color> {
        match self.values.get(key) {
            Some(PropertyValue::Color(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the items of a `Set` or `List` property; absent ones read as
    /// empty.
    pub fn items(&self, key: &str) -> &[String] {
        match self.values.get(key) {
            Some(PropertyValue::Set(items) | PropertyValue::List(items)) => items.as_slice(),
            _ => &[],
        }
    }

    /// Returns a `Map` property; absent maps read as `None`.
    pub fn map(&self, key: &str) -> Option<&BTreeMap<String, String>> {
        match self.values.get(key) {
            Some(PropertyValue::Map(entries)) => Some(entries),
            _ => None,
        }
    }
}

fn dedup_items<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut result: Vec<String> = Vec::new();
    for item in items {
        let item = item.into();
        if !result.contains(&item) {
            result.push(item);
        }
    }
    result
}
