//! Ellipse shape.
//!
//! The ellipse keeps its radii in local, unscaled units; `width`/`height` on the
//! base model always mirror `2·rx`/`2·ry`. Placement, scale and paint live in
//! the composed [`ObjectBase`].

mod overlap;
mod render;
mod svg;

pub use svg::ATTRIBUTE_NAMES;

use super::{
    coerce_number, normalize_object, Group, ObjectBase, Property, RenderOptions, ShapeError,
    ShapeId, ShapeTrait, SvgReviver,
};
use crate::surface::Surface;
use kurbo::{Point, Rect};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Options for [`Ellipse::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct EllipseOptions {
    pub rx: f64,
    pub ry: f64,
    /// Scale line widths with the shape (`true`) or keep them device-uniform.
    pub transform_stroke_and_fill: bool,
    pub object: ObjectBase,
}

impl Default for EllipseOptions {
    fn default() -> Self {
        Self {
            rx: 0.0,
            ry: 0.0,
            transform_stroke_and_fill: true,
            object: ObjectBase::default(),
        }
    }
}

/// An ellipse shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipse {
    pub(crate) id: ShapeId,
    group: Option<ShapeId>,
    object: ObjectBase,
    rx: f64,
    ry: f64,
    transform_stroke_and_fill: bool,
}

impl Default for Ellipse {
    fn default() -> Self {
        Self::new(EllipseOptions::default())
    }
}

impl Ellipse {
    /// Type name in object representations and the shape registry.
    pub const TYPE_NAME: &'static str = "ellipse";

    /// Create a new ellipse.
    pub fn new(options: EllipseOptions) -> Self {
        let mut ellipse = Self {
            id: Uuid::new_v4(),
            group: None,
            object: options.object,
            rx: 0.0,
            ry: 0.0,
            transform_stroke_and_fill: options.transform_stroke_and_fill,
        };
        ellipse.set(Property::Rx(options.rx));
        ellipse.set(Property::Ry(options.ry));
        ellipse
    }

    /// Create an ellipse centered on `center`.
    pub fn centered(center: Point, rx: f64, ry: f64) -> Self {
        let object = ObjectBase {
            left: center.x - rx,
            top: center.y - ry,
            ..Default::default()
        };
        Self::new(EllipseOptions {
            rx,
            ry,
            object,
            ..Default::default()
        })
    }

    /// Create a circle.
    pub fn circle(center: Point, radius: f64) -> Self {
        Self::centered(center, radius, radius)
    }

    /// Create an ellipse from a bounding rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        Self::centered(rect.center(), rect.width() / 2.0, rect.height() / 2.0)
    }

    pub fn object(&self) -> &ObjectBase {
        &self.object
    }

    /// Mutable base state. Prefer [`Ellipse::set`] for radii.
    pub fn object_mut(&mut self) -> &mut ObjectBase {
        &mut self.object
    }

    /// Horizontal radius in local units.
    pub fn rx(&self) -> f64 {
        self.rx
    }

    /// Vertical radius in local units.
    pub fn ry(&self) -> f64 {
        self.ry
    }

    pub fn transform_stroke_and_fill(&self) -> bool {
        self.transform_stroke_and_fill
    }

    /// Horizontal radius after the shape's scale.
    pub fn effective_rx(&self) -> f64 {
        self.rx * self.object.scale_x
    }

    /// Vertical radius after the shape's scale.
    pub fn effective_ry(&self) -> f64 {
        self.ry * self.object.scale_y
    }

    /// Apply a property. Radii also update the base model's size, even when
    /// unchanged.
    pub fn set(&mut self, property: Property) -> &mut Self {
        match property {
            Property::Rx(rx) => {
                self.rx = rx;
                self.object.width = rx * 2.0;
            }
            Property::Ry(ry) => {
                self.ry = ry;
                self.object.height = ry * 2.0;
            }
            Property::TransformStrokeAndFill(value) => self.transform_stroke_and_fill = value,
            other => {
                if let Some(ignored) = self.object.set(other) {
                    log::debug!("ellipse ignores property {ignored:?}");
                }
            }
        }
        self
    }

    /// Object representation: the base state plus `rx`, `ry` and
    /// `transformStrokeAndFill`.
    pub fn to_object(&self, properties_to_include: &[&str]) -> Map<String, Value> {
        let mut map = self.object.to_object(Self::TYPE_NAME, properties_to_include);
        map.insert("rx".to_string(), Value::from(self.rx));
        map.insert("ry".to_string(), Value::from(self.ry));
        map.insert(
            "transformStrokeAndFill".to_string(),
            Value::Bool(self.transform_stroke_and_fill),
        );
        map
    }

    /// Rebuild an ellipse from its object representation.
    ///
    /// Missing or malformed numbers read as zero. Keys the ellipse does not
    /// know are kept as custom properties.
    pub fn from_object(value: &Value) -> Result<Self, ShapeError> {
        let map = normalize_object(value, Self::TYPE_NAME)?;
        let object: ObjectBase = serde_json::from_value(Value::Object(map.clone()))?;
        let radius = |key: &str| map.get(key).map(coerce_number).unwrap_or(0.0);
        let mut ellipse = Self::new(EllipseOptions {
            rx: radius("rx"),
            ry: radius("ry"),
            transform_stroke_and_fill: map
                .get("transformStrokeAndFill")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            object,
        });
        let known = Self::default().to_object(&[]);
        ellipse.object.absorb_custom(&map, &known);
        Ok(ellipse)
    }
}

impl ShapeTrait for Ellipse {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn object(&self) -> &ObjectBase {
        Ellipse::object(self)
    }

    fn object_mut(&mut self) -> &mut ObjectBase {
        Ellipse::object_mut(self)
    }

    fn group_id(&self) -> Option<ShapeId> {
        self.group
    }

    fn set_group_id(&mut self, group: Option<ShapeId>) {
        self.group = group;
    }

    fn bounds(&self) -> Rect {
        self.bounds_in(kurbo::Affine::IDENTITY, None)
    }

    fn set(&mut self, property: Property) {
        Ellipse::set(self, property);
    }

    fn render(&self, surface: &mut dyn Surface, options: &RenderOptions<'_>) {
        Ellipse::render(self, surface, options);
    }

    fn visible_area_clips_with_rect(&self, rect: Rect, group: Option<&Group>) -> bool {
        Ellipse::visible_area_clips_with_rect(self, rect, group)
    }

    fn to_object(&self, properties_to_include: &[&str]) -> Map<String, Value> {
        Ellipse::to_object(self, properties_to_include)
    }

    fn to_svg(&self, group: Option<&Group>, reviver: Option<SvgReviver<'_>>) -> String {
        Ellipse::to_svg(self, group, reviver)
    }
}
