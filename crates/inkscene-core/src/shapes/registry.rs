//! Shape type registry: type names to factories.

use super::{Ellipse, Group, GroupKind, Property, Shape, ShapeError, ATTRIBUTE_NAMES};
use crate::svg::SvgError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Builds a shape from its object representation.
pub type FromObjectFn = fn(&Value) -> Result<Shape, ShapeError>;

/// Builds a shape from an SVG element.
pub type FromElementFn = fn(roxmltree::Node<'_, '_>, &[Property]) -> Result<Shape, SvgError>;

/// A registered shape type.
#[derive(Clone, Copy)]
pub struct ShapeType {
    /// Value of `type` in object representations.
    pub name: &'static str,
    /// SVG element imported as this type, if any.
    pub element_name: Option<&'static str>,
    /// Attributes read from that element.
    pub attribute_names: &'static [&'static str],
    pub from_object: FromObjectFn,
    pub from_element: Option<FromElementFn>,
}

impl fmt::Debug for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeType")
            .field("name", &self.name)
            .field("element_name", &self.element_name)
            .field("attribute_names", &self.attribute_names)
            .finish_non_exhaustive()
    }
}

/// Registry of known shape types.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    types: HashMap<&'static str, ShapeType>,
}

static BUILTIN: LazyLock<ShapeRegistry> = LazyLock::new(|| {
    let mut registry = ShapeRegistry::new();
    registry.register(ShapeType {
        name: Ellipse::TYPE_NAME,
        element_name: Some("ellipse"),
        attribute_names: ATTRIBUTE_NAMES.as_slice(),
        from_object: |value| Ellipse::from_object(value).map(Shape::Ellipse),
        from_element: Some(|node, overrides| {
            Ellipse::from_element(node, overrides).map(Shape::Ellipse)
        }),
    });
    registry.register(ShapeType {
        name: GroupKind::Group.type_name(),
        element_name: None,
        attribute_names: &[],
        from_object: |value| Group::from_object(value, GroupKind::Group).map(Shape::Group),
        from_element: None,
    });
    registry.register(ShapeType {
        name: GroupKind::PathGroup.type_name(),
        element_name: None,
        attribute_names: &[],
        from_object: |value| Group::from_object(value, GroupKind::PathGroup).map(Shape::Group),
        from_element: None,
    });
    registry
});

impl ShapeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in shape types, created on first use.
    pub fn builtin() -> &'static ShapeRegistry {
        &BUILTIN
    }

    /// Register a shape type.
    ///
    /// Returns `false` and keeps the existing definition if the name is
    /// already registered.
    pub fn register(&mut self, shape_type: ShapeType) -> bool {
        if self.types.contains_key(shape_type.name) {
            log::warn!("shape type `{}` is already defined", shape_type.name);
            return false;
        }
        self.types.insert(shape_type.name, shape_type);
        true
    }

    pub fn get(&self, name: &str) -> Option<&ShapeType> {
        self.types.get(name)
    }

    /// Registered type importing SVG elements named `element`.
    pub fn for_element(&self, element: &str) -> Option<&ShapeType> {
        self.types
            .values()
            .find(|t| t.element_name == Some(element) && t.from_element.is_some())
    }

    /// Rebuild a shape, dispatching on its `type`.
    pub fn from_object(&self, value: &Value) -> Result<Shape, ShapeError> {
        let map = value.as_object().ok_or(ShapeError::NotAnObject)?;
        let name = map.get("type").and_then(Value::as_str).unwrap_or_default();
        let shape_type = self
            .get(name)
            .ok_or_else(|| ShapeError::UnknownType(name.to_string()))?;
        (shape_type.from_object)(value)
    }

    /// Build a shape from an SVG element, or `None` if no registered type
    /// imports that element.
    pub fn from_element(&self, node: roxmltree::Node<'_, '_>) -> Option<Result<Shape, SvgError>> {
        let shape_type = self.for_element(node.tag_name().name())?;
        let from_element = shape_type.from_element?;
        Some(from_element(node, &[]))
    }
}
