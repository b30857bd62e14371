//! Shape definitions for the scene graph.

mod color;
mod ellipse;
mod group;
mod object;
mod registry;

pub use color::SerializableColor;
pub use ellipse::{Ellipse, EllipseOptions, ATTRIBUTE_NAMES};
pub use group::{Group, GroupKind};
pub use object::{
    bounding_rect, rotate_vec, to_local_point, ObjectBase, OriginX, OriginY, Property, Shadow,
};
pub use registry::{ShapeRegistry, ShapeType};

use crate::surface::Surface;
use kurbo::Rect;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Post-processing hook applied to finished SVG markup.
pub type SvgReviver<'a> = &'a dyn Fn(String) -> String;

/// Errors raised while rebuilding shapes from their object representation.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("object representation must be a JSON object")]
    NotAnObject,
    #[error("expected a `{expected}` object, found `{found}`")]
    TypeMismatch { expected: String, found: String },
    #[error("unknown shape type: {0}")]
    UnknownType(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-call render configuration supplied by the caller (usually a container).
#[derive(Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    /// The surface is already positioned in the shape's parent frame with the
    /// container's conventions; do not apply the shape's own placement.
    pub skip_transform: bool,
    /// Containing group, for inherited opacity and coordinate conventions.
    pub group: Option<&'a Group>,
    /// Removes a container's distortion before stroke and fill when the shape
    /// keeps device-uniform stroke widths.
    pub undistort: Option<&'a dyn Fn(&mut dyn Surface)>,
}

impl<'a> RenderOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_transform(mut self, skip: bool) -> Self {
        self.skip_transform = skip;
        self
    }

    pub fn in_group(mut self, group: &'a Group) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_undistort(mut self, undistort: &'a dyn Fn(&mut dyn Surface)) -> Self {
        self.undistort = Some(undistort);
        self
    }
}

impl fmt::Debug for RenderOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("skip_transform", &self.skip_transform)
            .field("group", &self.group.map(|g| g.id()))
            .field("undistort", &self.undistort.is_some())
            .finish()
    }
}

/// Common trait for all shapes.
pub trait ShapeTrait {
    /// Get the unique identifier.
    fn id(&self) -> ShapeId;

    /// Type name used in the object representation.
    fn type_name(&self) -> &'static str;

    /// Shared base state.
    fn object(&self) -> &ObjectBase;

    fn object_mut(&mut self) -> &mut ObjectBase;

    /// Id of the containing group, if any.
    fn group_id(&self) -> Option<ShapeId>;

    fn set_group_id(&mut self, group: Option<ShapeId>);

    /// Axis-aligned bounds in parent coordinates.
    fn bounds(&self) -> Rect;

    /// Apply a property through the shape's setter.
    fn set(&mut self, property: Property);

    /// Draw the shape. Leaves the surface's save depth unchanged.
    fn render(&self, surface: &mut dyn Surface, options: &RenderOptions<'_>);

    /// Whether the visible area intersects `rect`, given in the coordinate
    /// space of the shape's parent (or of `group`'s parent when nested).
    fn visible_area_clips_with_rect(&self, rect: Rect, group: Option<&Group>) -> bool;

    /// Object representation, including custom properties named in
    /// `properties_to_include`.
    fn to_object(&self, properties_to_include: &[&str]) -> Map<String, Value>;

    /// SVG markup for the shape.
    fn to_svg(&self, group: Option<&Group>, reviver: Option<SvgReviver<'_>>) -> String;

    /// Number of primitive drawables the shape is made of.
    fn complexity(&self) -> usize {
        1
    }
}

/// Enum wrapper for all shape types.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Ellipse(Ellipse),
    Group(Group),
}

impl Shape {
    fn as_trait(&self) -> &dyn ShapeTrait {
        match self {
            Shape::Ellipse(s) => s,
            Shape::Group(s) => s,
        }
    }

    fn as_trait_mut(&mut self) -> &mut dyn ShapeTrait {
        match self {
            Shape::Ellipse(s) => s,
            Shape::Group(s) => s,
        }
    }

    pub fn id(&self) -> ShapeId {
        self.as_trait().id()
    }

    pub fn type_name(&self) -> &'static str {
        self.as_trait().type_name()
    }

    pub fn object(&self) -> &ObjectBase {
        self.as_trait().object()
    }

    pub fn object_mut(&mut self) -> &mut ObjectBase {
        self.as_trait_mut().object_mut()
    }

    pub fn group_id(&self) -> Option<ShapeId> {
        self.as_trait().group_id()
    }

    pub fn set_group_id(&mut self, group: Option<ShapeId>) {
        self.as_trait_mut().set_group_id(group);
    }

    pub fn bounds(&self) -> Rect {
        self.as_trait().bounds()
    }

    pub fn set(&mut self, property: Property) {
        self.as_trait_mut().set(property);
    }

    pub fn render(&self, surface: &mut dyn Surface, options: &RenderOptions<'_>) {
        self.as_trait().render(surface, options);
    }

    pub fn visible_area_clips_with_rect(&self, rect: Rect, group: Option<&Group>) -> bool {
        self.as_trait().visible_area_clips_with_rect(rect, group)
    }

    pub fn to_object(&self, properties_to_include: &[&str]) -> Map<String, Value> {
        self.as_trait().to_object(properties_to_include)
    }

    pub fn to_svg(&self, group: Option<&Group>, reviver: Option<SvgReviver<'_>>) -> String {
        self.as_trait().to_svg(group, reviver)
    }

    pub fn complexity(&self) -> usize {
        self.as_trait().complexity()
    }

    /// Rebuild a shape of any registered type from its object representation.
    pub fn from_object(value: &Value) -> Result<Shape, ShapeError> {
        ShapeRegistry::builtin().from_object(value)
    }

    /// Check if this shape is a group.
    pub fn is_group(&self) -> bool {
        matches!(self, Shape::Group(_))
    }

    /// Get the group if this shape is a group.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Shape::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Shape::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_ellipse(&self) -> Option<&Ellipse> {
        match self {
            Shape::Ellipse(e) => Some(e),
            _ => None,
        }
    }

    /// Regenerate the shape's ID, re-pointing a group's children at it.
    pub fn regenerate_id(&mut self) {
        let new_id = Uuid::new_v4();
        match self {
            Shape::Ellipse(s) => s.id = new_id,
            Shape::Group(s) => s.set_id(new_id),
        }
    }
}

impl From<Ellipse> for Shape {
    fn from(ellipse: Ellipse) -> Self {
        Shape::Ellipse(ellipse)
    }
}

impl From<Group> for Shape {
    fn from(group: Group) -> Self {
        Shape::Group(group)
    }
}

/// Read a loosely typed JSON number: numeric strings are parsed, anything else
/// (including null and non-finite values) reads as zero.
pub(crate) fn coerce_number(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if number.is_finite() { number } else { 0.0 }
}

/// Object-representation keys that hold plain numbers.
const NUMERIC_KEYS: &[&str] = &[
    "left",
    "top",
    "width",
    "height",
    "scaleX",
    "scaleY",
    "angle",
    "opacity",
    "strokeWidth",
    "strokeMiterLimit",
];

/// Validate an object representation and normalize its fields.
///
/// Numbers are coerced and base fields that cannot be read are dropped. Fails
/// when `value` is not an object or carries a `type` other than
/// `expected`; a missing `type` is accepted.
pub(crate) fn normalize_object(
    value: &Value,
    expected: &str,
) -> Result<Map<String, Value>, ShapeError> {
    let map = value.as_object().ok_or(ShapeError::NotAnObject)?;
    match map.get("type") {
        None | Some(Value::Null) => {}
        Some(Value::String(found)) if found == expected => {}
        Some(other) => {
            let found = other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string());
            return Err(ShapeError::TypeMismatch {
                expected: expected.to_string(),
                found,
            });
        }
    }
    let mut normalized = map.clone();
    for key in NUMERIC_KEYS {
        if let Some(value) = normalized.get_mut(*key) {
            *value = Value::from(coerce_number(value));
        }
    }
    // Malformed paint, flags and enums fall back to their defaults.
    normalized.retain(|key, value| {
        if key == "objects" {
            return true;
        }
        let mut single = Map::new();
        single.insert(key.clone(), value.clone());
        let readable = serde_json::from_value::<ObjectBase>(Value::Object(single)).is_ok();
        if !readable {
            log::debug!("dropping malformed {key}: {value}");
        }
        readable
    });
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_number() {
        assert!((coerce_number(&json!(3.5)) - 3.5).abs() < f64::EPSILON);
        assert!((coerce_number(&json!(" 12 ")) - 12.0).abs() < f64::EPSILON);
        assert!(coerce_number(&json!("abc")).abs() < f64::EPSILON);
        assert!(coerce_number(&Value::Null).abs() < f64::EPSILON);
        assert!(coerce_number(&json!([1])).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_rejects_non_objects_and_other_types() {
        assert!(matches!(normalize_object(&json!(5), "ellipse"), Err(ShapeError::NotAnObject)));
        assert!(matches!(
            normalize_object(&json!({"type": "rect"}), "ellipse"),
            Err(ShapeError::TypeMismatch { .. })
        ));
        let map = normalize_object(&json!({"left": "7"}), "ellipse").unwrap();
        assert_eq!(map.get("left"), Some(&json!(7.0)));
    }

    #[test]
    fn test_normalize_drops_unreadable_base_fields() {
        let map = normalize_object(
            &json!({"fill": "", "visible": null, "flipX": "yes", "stroke": "red", "label": 3}),
            "ellipse",
        )
        .unwrap();
        assert!(!map.contains_key("fill"));
        assert!(!map.contains_key("visible"));
        assert!(!map.contains_key("flipX"));
        assert_eq!(map.get("stroke"), Some(&json!("red")));
        assert_eq!(map.get("label"), Some(&json!(3)));
    }

    #[test]
    fn test_shape_enum_dispatch() {
        let shape: Shape = Ellipse::circle(kurbo::Point::new(10.0, 10.0), 5.0).into();
        assert_eq!(shape.type_name(), "ellipse");
        assert!(!shape.is_group());
        let bounds = shape.bounds();
        assert!((bounds.width() - 10.0).abs() < 1e-9);
        assert_eq!(shape.complexity(), 1);
    }

    #[test]
    fn test_regenerate_id() {
        let mut shape: Shape = Ellipse::circle(kurbo::Point::ORIGIN, 1.0).into();
        let before = shape.id();
        shape.regenerate_id();
        assert_ne!(before, shape.id());
    }
}
