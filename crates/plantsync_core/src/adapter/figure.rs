//! Layout field parsing and presentation figure derivation.
//!
//! Layout coordinates travel as integer strings. Malformed values never
//! abort a restore: they fall back to a fixed default and log
//! `event=layout_field_fallback`.

use crate::model::component::{ComponentId, ConnectionType, Figure, ScreenPoint, VisualComponent};
use crate::model::layout::{Scale, DEFAULT_LABEL_OFFSET};
use crate::model::property::keys;
use crate::model::reference::ObjectRef;
use log::warn;

/// Label offset default in stored integer units.
pub const DEFAULT_LABEL_OFFSET_UNITS: i64 = DEFAULT_LABEL_OFFSET as i64;
/// Position default for malformed layout coordinates.
pub const DEFAULT_POSITION_UNITS: i64 = 0;

/// Property keys carrying a node figure's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeKeys {
    pub pos_x: &'static str,
    pub pos_y: &'static str,
    pub label_x: &'static str,
    pub label_y: &'static str,
}

pub const POINT_NODE: NodeKeys = NodeKeys {
    pos_x: keys::POINT_POS_X,
    pos_y: keys::POINT_POS_Y,
    label_x: keys::POINT_LABEL_OFFSET_X,
    label_y: keys::POINT_LABEL_OFFSET_Y,
};

pub const LOCATION_NODE: NodeKeys = NodeKeys {
    pos_x: keys::LOC_POS_X,
    pos_y: keys::LOC_POS_Y,
    label_x: keys::LOC_LABEL_OFFSET_X,
    label_y: keys::LOC_LABEL_OFFSET_Y,
};

/// Parses one layout coordinate.
///
/// Absent values yield `default` silently; malformed values yield `default`
/// with a warning. Decimal values are rounded.
pub fn layout_int(reference: &ObjectRef, key: &str, raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw else {
        return default;
    };
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value.round() as i64,
        _ => {
            warn!(
                "event=layout_field_fallback module=adapter status=warn reference={} key={} fallback={}",
                reference, key, default
            );
            default
        }
    }
}

/// Parses a connection type, falling back to `Direct` with a warning.
pub fn layout_connection_type(reference: &ObjectRef, raw: Option<&str>) -> ConnectionType {
    let Some(raw) = raw else {
        return ConnectionType::Direct;
    };
    ConnectionType::parse_normalized(raw).unwrap_or_else(|| {
        warn!(
            "event=layout_field_fallback module=adapter status=warn reference={} key={} fallback={}",
            reference,
            keys::PATH_CONN_TYPE,
            ConnectionType::Direct.as_str()
        );
        ConnectionType::Direct
    })
}

/// Parses `x1,y1` (quadratic, duplicated) or `x1,y1;x2,y2` (cubic).
pub fn parse_control_points(raw: &str) -> Option<Vec<ScreenPoint>> {
    let points = raw
        .split(';')
        .map(|pair| {
            let (x, y) = pair.split_once(',')?;
            let x = x.trim().parse::<f64>().ok()?;
            let y = y.trim().parse::<f64>().ok()?;
            (x.is_finite() && y.is_finite()).then(|| ScreenPoint::new(x, y))
        })
        .collect::<Option<Vec<_>>>()?;

    match points.as_slice() {
        [single] => Some(vec![*single, *single]),
        [first, second] => Some(vec![*first, *second]),
        _ => None,
    }
}

pub fn format_control_points(points: &[ScreenPoint]) -> String {
    points
        .iter()
        .map(|point| format!("{},{}", point.x.round() as i64, point.y.round() as i64))
        .collect::<Vec<_>>()
        .join(";")
}

/// Node figure from a component's stored layout keys.
pub fn node_figure(component: &VisualComponent, node: &NodeKeys, scale: Scale) -> Figure {
    let reference = component.reference();
    let coordinate = |key: &str, default: i64| {
        layout_int(&reference, key, component.properties.text(key), default) as f64
    };

    Figure::Node {
        position: scale.to_screen(
            coordinate(node.pos_x, DEFAULT_POSITION_UNITS),
            coordinate(node.pos_y, DEFAULT_POSITION_UNITS),
        ),
        label_offset: ScreenPoint::new(
            coordinate(node.label_x, DEFAULT_LABEL_OFFSET_UNITS),
            coordinate(node.label_y, DEFAULT_LABEL_OFFSET_UNITS),
        ),
    }
}

/// Connection figure between two resolved endpoint components.
///
/// Control points are kept only for bezier connections; malformed ones are
/// dropped with a warning.
pub fn connection_figure(
    component: &VisualComponent,
    start: ComponentId,
    end: ComponentId,
) -> Figure {
    let reference = component.reference();
    let connection_type =
        layout_connection_type(&reference, component.properties.text(keys::PATH_CONN_TYPE));

    let control_points = match (
        connection_type,
        component.properties.text(keys::PATH_CONTROL_POINTS),
    ) {
        (ConnectionType::Bezier, Some(raw)) => parse_control_points(raw).unwrap_or_else(|| {
            warn!(
                "event=layout_field_fallback module=adapter status=warn reference={} key={} fallback=none",
                reference,
                keys::PATH_CONTROL_POINTS
            );
            Vec::new()
        }),
        _ => Vec::new(),
    };

    Figure::Connection {
        start,
        end,
        connection_type,
        control_points,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        connection_figure, format_control_points, layout_int, node_figure, parse_control_points,
        POINT_NODE,
    };
    use crate::model::component::{ConnectionType, Figure, ScreenPoint, VisualComponent};
    use crate::model::layout::Scale;
    use crate::model::property::keys;
    use crate::model::reference::{EntityKind, ObjectRef};
    use uuid::Uuid;

    #[test]
    fn layout_int_falls_back_only_on_malformed_values() {
        let reference = ObjectRef::point("P1");
        assert_eq!(layout_int(&reference, "K", Some(" 42 "), 0), 42);
        assert_eq!(layout_int(&reference, "K", Some("12.6"), 0), 13);
        assert_eq!(layout_int(&reference, "K", Some("abc"), -20), -20);
        assert_eq!(layout_int(&reference, "K", None, 7), 7);
    }

    #[test]
    fn control_points_accept_quadratic_and_cubic_forms() {
        assert_eq!(
            parse_control_points("10,20"),
            Some(vec![ScreenPoint::new(10.0, 20.0), ScreenPoint::new(10.0, 20.0)])
        );
        assert_eq!(
            parse_control_points("1,2;3,4"),
            Some(vec![ScreenPoint::new(1.0, 2.0), ScreenPoint::new(3.0, 4.0)])
        );
        assert_eq!(parse_control_points("1,2;3"), None);
        assert_eq!(parse_control_points("1,2;3,4;5,6"), None);
        assert_eq!(
            format_control_points(&[ScreenPoint::new(1.4, -2.0), ScreenPoint::new(3.0, 4.0)]),
            "1,-2;3,4"
        );
    }

    #[test]
    fn node_figure_scales_and_defaults_label_offset() {
        let mut component = VisualComponent::new(EntityKind::Point, "P1");
        component.properties.set_text(keys::POINT_POS_X, "1000");
        component.properties.set_text(keys::POINT_POS_Y, "500");

        let figure = node_figure(&component, &POINT_NODE, Scale::new(50.0, 50.0).unwrap());
        assert_eq!(
            figure,
            Figure::Node {
                position: ScreenPoint::new(20.0, -10.0),
                label_offset: ScreenPoint::new(-20.0, -20.0),
            }
        );
    }

    #[test]
    fn connection_figure_drops_control_points_unless_bezier() {
        let (start, end) = (Uuid::new_v4(), Uuid::new_v4());
        let mut component = VisualComponent::new(EntityKind::Path, "P1--P2");
        component.properties.set_text(keys::PATH_CONTROL_POINTS, "5,5");
        component.properties.set_text(keys::PATH_CONN_TYPE, "elbow");

        let Figure::Connection {
            connection_type,
            control_points,
            ..
        } = connection_figure(&component, start, end)
        else {
            panic!("expected connection figure");
        };
        assert_eq!(connection_type, ConnectionType::Elbow);
        assert!(control_points.is_empty());

        component.properties.set_text(keys::PATH_CONN_TYPE, "BEZIER");
        let figure = connection_figure(&component, start, end);
        assert_eq!(figure.endpoints(), Some((start, end)));
        let Figure::Connection { control_points, .. } = figure else {
            panic!("expected connection figure");
        };
        assert_eq!(control_points.len(), 2);
    }
}
