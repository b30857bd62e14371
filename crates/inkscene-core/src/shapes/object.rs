//! Base shape model shared by every shape.
//!
//! `ObjectBase` owns position, scale, rotation, paint and effect state and knows
//! how to push that state onto a [`Surface`]. Concrete shapes compose it and add
//! their own geometry on top.

use super::SerializableColor;
use crate::surface::{CompositeOperation, LineCap, LineJoin, LineStyle, ShadowStyle, Surface};
use crate::svg::fmt_number;
use kurbo::{Affine, BezPath, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Horizontal anchor of `left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginX {
    #[default]
    Left,
    Center,
    Right,
}

impl OriginX {
    fn factor(self) -> f64 {
        match self {
            OriginX::Left => 0.0,
            OriginX::Center => 0.5,
            OriginX::Right => 1.0,
        }
    }
}

/// Vertical anchor of `top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginY {
    #[default]
    Top,
    Center,
    Bottom,
}

impl OriginY {
    fn factor(self) -> f64 {
        match self {
            OriginY::Top => 0.0,
            OriginY::Center => 0.5,
            OriginY::Bottom => 1.0,
        }
    }
}

/// Drop shadow drawn under a shape's fill and stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shadow {
    pub color: SerializableColor,
    pub blur: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: SerializableColor::black(),
            blur: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl Shadow {
    pub fn new(color: SerializableColor, blur: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            color,
            blur,
            offset_x,
            offset_y,
        }
    }

    /// SVG `<filter>` reproducing this shadow, referenced as `url(#{filter_id})`.
    pub fn to_svg(&self, filter_id: &str) -> String {
        format!(
            concat!(
                "<filter id=\"{id}\" y=\"-40%\" height=\"180%\" x=\"-40%\" width=\"180%\">\n",
                "\t<feGaussianBlur in=\"SourceAlpha\" stdDeviation=\"{blur}\"/>\n",
                "\t<feOffset dx=\"{dx}\" dy=\"{dy}\" result=\"oBlur\"/>\n",
                "\t<feFlood flood-color=\"{color}\" flood-opacity=\"{opacity}\"/>\n",
                "\t<feComposite in2=\"oBlur\" operator=\"in\"/>\n",
                "\t<feMerge>\n",
                "\t\t<feMergeNode/>\n",
                "\t\t<feMergeNode in=\"SourceGraphic\"/>\n",
                "\t</feMerge>\n",
                "</filter>\n"
            ),
            id = filter_id,
            blur = fmt_number(self.blur / 2.0),
            dx = fmt_number(self.offset_x),
            dy = fmt_number(self.offset_y),
            color = self.color.to_rgb_string(),
            opacity = fmt_number(self.color.alpha()),
        )
    }
}

/// A settable shape property.
///
/// Shapes route every mutation through a single `set` so derived state stays in
/// sync; [`ObjectBase::set`] handles the base properties and hands the rest back.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Left(f64),
    Top(f64),
    Width(f64),
    Height(f64),
    ScaleX(f64),
    ScaleY(f64),
    Angle(f64),
    FlipX(bool),
    FlipY(bool),
    OriginX(OriginX),
    OriginY(OriginY),
    Opacity(f64),
    Visible(bool),
    Fill(Option<SerializableColor>),
    Stroke(Option<SerializableColor>),
    StrokeWidth(f64),
    StrokeDashArray(Option<Vec<f64>>),
    StrokeLineCap(LineCap),
    StrokeLineJoin(LineJoin),
    StrokeMiterLimit(f64),
    Shadow(Option<Shadow>),
    GlobalCompositeOperation(CompositeOperation),
    TransformMatrix(Option<Affine>),
    ClipPath(Option<BezPath>),
    /// Arbitrary user data, serialized only on request.
    Custom(String, Value),
    Rx(f64),
    Ry(f64),
    TransformStrokeAndFill(bool),
}

/// Shared state of every shape: placement, paint and effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectBase {
    pub origin_x: OriginX,
    pub origin_y: OriginY,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Rotation in degrees, clockwise in y-down space.
    pub angle: f64,
    pub flip_x: bool,
    pub flip_y: bool,
    pub opacity: f64,
    pub visible: bool,
    pub fill: Option<SerializableColor>,
    pub stroke: Option<SerializableColor>,
    pub stroke_width: f64,
    pub stroke_dash_array: Option<Vec<f64>>,
    pub stroke_line_cap: LineCap,
    pub stroke_line_join: LineJoin,
    pub stroke_miter_limit: f64,
    pub shadow: Option<Shadow>,
    pub global_composite_operation: CompositeOperation,
    /// Extra matrix applied after the shape's own transform.
    pub transform_matrix: Option<Affine>,
    /// Clip region in the shape's local (center-relative) coordinates.
    #[serde(skip)]
    pub clip_path: Option<BezPath>,
    #[serde(skip)]
    pub(crate) custom: BTreeMap<String, Value>,
}

impl Default for ObjectBase {
    fn default() -> Self {
        Self {
            origin_x: OriginX::Left,
            origin_y: OriginY::Top,
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            flip_x: false,
            flip_y: false,
            opacity: 1.0,
            visible: true,
            fill: None,
            stroke: None,
            stroke_width: 1.0,
            stroke_dash_array: None,
            stroke_line_cap: LineCap::Butt,
            stroke_line_join: LineJoin::Miter,
            stroke_miter_limit: 10.0,
            shadow: None,
            global_composite_operation: CompositeOperation::SourceOver,
            transform_matrix: None,
            clip_path: None,
            custom: BTreeMap::new(),
        }
    }
}

impl ObjectBase {
    /// Apply a base property. Returns the property back when it is not a base
    /// property, so the owning shape can handle it.
    pub fn set(&mut self, property: Property) -> Option<Property> {
        match property {
            Property::Left(v) => self.left = v,
            Property::Top(v) => self.top = v,
            Property::Width(v) => self.width = v,
            Property::Height(v) => self.height = v,
            Property::ScaleX(v) => self.scale_x = v,
            Property::ScaleY(v) => self.scale_y = v,
            Property::Angle(v) => self.angle = v,
            Property::FlipX(v) => self.flip_x = v,
            Property::FlipY(v) => self.flip_y = v,
            Property::OriginX(v) => self.origin_x = v,
            Property::OriginY(v) => self.origin_y = v,
            Property::Opacity(v) => self.opacity = v,
            Property::Visible(v) => self.visible = v,
            Property::Fill(v) => self.fill = v,
            Property::Stroke(v) => self.stroke = v,
            Property::StrokeWidth(v) => self.stroke_width = v,
            Property::StrokeDashArray(v) => self.stroke_dash_array = v,
            Property::StrokeLineCap(v) => self.stroke_line_cap = v,
            Property::StrokeLineJoin(v) => self.stroke_line_join = v,
            Property::StrokeMiterLimit(v) => self.stroke_miter_limit = v,
            Property::Shadow(v) => self.shadow = v,
            Property::GlobalCompositeOperation(v) => self.global_composite_operation = v,
            Property::TransformMatrix(v) => self.transform_matrix = v,
            Property::ClipPath(v) => self.clip_path = v,
            Property::Custom(key, value) => {
                self.custom.insert(key, value);
            }
            other => return Some(other),
        }
        None
    }

    /// A custom property previously attached with [`Property::Custom`].
    pub fn custom(&self, key: &str) -> Option<&Value> {
        self.custom.get(key)
    }

    /// Scale including flips, as applied to the drawing transform.
    pub fn signed_scale(&self) -> Vec2 {
        let sx = if self.flip_x { -self.scale_x } else { self.scale_x };
        let sy = if self.flip_y { -self.scale_y } else { self.scale_y };
        Vec2::new(sx, sy)
    }

    /// Width and height after scaling.
    pub fn scaled_size(&self) -> Vec2 {
        Vec2::new(self.width * self.scale_x, self.height * self.scale_y)
    }

    fn origin_to_center(&self) -> Vec2 {
        let size = self.scaled_size();
        let offset = Vec2::new(
            (0.5 - self.origin_x.factor()) * size.x,
            (0.5 - self.origin_y.factor()) * size.y,
        );
        rotate_vec(offset, self.angle.to_radians())
    }

    /// Center of the shape in parent coordinates.
    pub fn center_point(&self) -> Point {
        Point::new(self.left, self.top) + self.origin_to_center()
    }

    /// Move the shape so its center lands on `center`.
    pub fn set_position_by_center(&mut self, center: Point) {
        let origin = center - self.origin_to_center();
        self.left = origin.x;
        self.top = origin.y;
    }

    /// Rotation and scale (with flips) around the origin.
    pub fn linear_transform(&self) -> Affine {
        let scale = self.signed_scale();
        Affine::rotate(self.angle.to_radians()) * Affine::scale_non_uniform(scale.x, scale.y)
    }

    /// Transform applied by [`ObjectBase::transform`]: translate to center,
    /// rotate, scale.
    pub fn placement_matrix(&self) -> Affine {
        Affine::translate(self.center_point().to_vec2()) * self.linear_transform()
    }

    /// Full local-to-parent matrix, including the raw transform matrix.
    pub fn calc_own_matrix(&self) -> Affine {
        self.placement_matrix() * self.transform_matrix.unwrap_or(Affine::IDENTITY)
    }

    /// Position, rotate and scale the surface for drawing in local coordinates.
    pub fn transform(&self, surface: &mut dyn Surface) {
        surface.transform(self.placement_matrix());
    }

    /// Install this shape's composite operation; returns the one it replaced.
    pub fn setup_composite_operation(&self, surface: &mut dyn Surface) -> CompositeOperation {
        let previous = surface.global_composite_operation();
        surface.set_global_composite_operation(self.global_composite_operation);
        previous
    }

    pub fn restore_composite_operation(
        &self,
        surface: &mut dyn Surface,
        previous: CompositeOperation,
    ) {
        surface.set_global_composite_operation(previous);
    }

    pub fn line_style(&self) -> LineStyle {
        LineStyle {
            width: self.stroke_width,
            cap: self.stroke_line_cap,
            join: self.stroke_line_join,
            miter_limit: self.stroke_miter_limit,
            dash: self.stroke_dash_array.clone().unwrap_or_default(),
        }
    }

    pub fn set_stroke_styles(&self, surface: &mut dyn Surface) {
        if let Some(stroke) = self.stroke {
            surface.set_line_style(&self.line_style());
            surface.set_stroke_color(stroke.into());
        }
    }

    pub fn set_fill_styles(&self, surface: &mut dyn Surface) {
        if let Some(fill) = self.fill {
            surface.set_fill_color(fill.into());
        }
    }

    /// Multiply the surface alpha by this shape's opacity, and the containing
    /// group's first.
    pub fn set_opacity(&self, surface: &mut dyn Surface, group: Option<&ObjectBase>) {
        if let Some(group) = group {
            group.set_opacity(surface, None);
        }
        let alpha = surface.global_alpha() * self.opacity;
        surface.set_global_alpha(alpha);
    }

    pub fn set_shadow(&self, surface: &mut dyn Surface) {
        if let Some(shadow) = self.shadow {
            surface.set_shadow(Some(ShadowStyle {
                color: shadow.color.into(),
                blur: shadow.blur,
                offset: Vec2::new(shadow.offset_x, shadow.offset_y),
            }));
        }
    }

    pub fn remove_shadow(&self, surface: &mut dyn Surface) {
        if self.shadow.is_some() {
            surface.set_shadow(None);
        }
    }

    /// Object representation of the base state under `type_name`.
    ///
    /// Custom properties are included only when named in
    /// `properties_to_include`. The result is a fresh map.
    pub fn to_object(&self, type_name: &str, properties_to_include: &[&str]) -> Map<String, Value> {
        let mut map = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert("type".to_string(), Value::String(type_name.to_string()));
        for key in properties_to_include {
            if let Some(value) = self.custom.get(*key) {
                map.insert((*key).to_string(), value.clone());
            }
        }
        map
    }

    /// Keep every entry of `source` not in `known` as a custom property.
    pub(crate) fn absorb_custom(
        &mut self,
        source: &Map<String, Value>,
        known: &Map<String, Value>,
    ) {
        for (key, value) in source {
            if !known.contains_key(key) {
                self.custom.insert(key.clone(), value.clone());
            }
        }
    }

    /// Fold an SVG user-space transform into placement.
    ///
    /// The center is mapped through `transform`; rotation, scale and flip absorb
    /// its linear part. A skewing transform cannot be expressed that way and is
    /// kept in `transform_matrix` instead.
    pub fn apply_transform(&mut self, transform: Affine) {
        let center = transform * self.center_point();
        let [a, b, c, d, _, _] = transform.as_coeffs();
        let linear = Affine::new([a, b, c, d, 0.0, 0.0]);
        let current = self.linear_transform();
        let total = linear * current;

        if total.determinant().abs() < f64::EPSILON {
            log::warn!("ignoring singular transform {:?}", transform.as_coeffs());
            self.set_position_by_center(center);
            return;
        }

        match decompose(total) {
            Some(parts) => {
                self.angle = parts.angle;
                self.scale_x = parts.scale_x;
                self.scale_y = parts.scale_y;
                self.flip_x = false;
                self.flip_y = parts.flip_y;
            }
            None => {
                // Conjugate so the skew sits after rotation and scale.
                let extra = current.inverse() * linear * current;
                let matrix = self.transform_matrix.unwrap_or(Affine::IDENTITY);
                self.transform_matrix = Some(extra * matrix);
            }
        }
        self.set_position_by_center(center);
    }

    /// SVG `style` declarations for paint, stroke and visibility.
    pub fn svg_styles(&self, filter_id: Option<&str>) -> String {
        let mut style = String::new();
        match self.stroke {
            Some(color) => {
                let _ = write!(style, "stroke: {}; ", color.to_rgb_string());
                if color.a != 255 {
                    let _ = write!(style, "stroke-opacity: {}; ", fmt_number(color.alpha()));
                }
            }
            None => style.push_str("stroke: none; "),
        }
        let dash = match &self.stroke_dash_array {
            Some(dash) if !dash.is_empty() => dash
                .iter()
                .map(|v| fmt_number(*v))
                .collect::<Vec<_>>()
                .join(" "),
            _ => "none".to_string(),
        };
        let _ = write!(
            style,
            concat!(
                "stroke-width: {}; stroke-dasharray: {}; stroke-linecap: {}; ",
                "stroke-linejoin: {}; stroke-miterlimit: {}; ",
            ),
            fmt_number(self.stroke_width),
            dash,
            self.stroke_line_cap.as_str(),
            self.stroke_line_join.as_str(),
            fmt_number(self.stroke_miter_limit),
        );
        match self.fill {
            Some(color) => {
                let _ = write!(style, "fill: {}; ", color.to_rgb_string());
                if color.a != 255 {
                    let _ = write!(style, "fill-opacity: {}; ", fmt_number(color.alpha()));
                }
            }
            None => style.push_str("fill: none; "),
        }
        let _ = write!(style, "opacity: {};", fmt_number(self.opacity));
        if !self.visible {
            style.push_str(" visibility: hidden;");
        }
        if let Some(id) = filter_id {
            let _ = write!(style, " filter: url(#{id});");
        }
        style
    }

    /// Markup emitted before the shape element: the shadow filter, if any.
    pub fn create_base_svg_markup(&self, filter_id: &str) -> String {
        match &self.shadow {
            Some(shadow) => shadow.to_svg(filter_id),
            None => String::new(),
        }
    }
}

/// Rotation/scale parts of a linear transform without skew.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Decomposed {
    angle: f64,
    scale_x: f64,
    scale_y: f64,
    flip_y: bool,
}

fn decompose(linear: Affine) -> Option<Decomposed> {
    let [a, b, c, d, _, _] = linear.as_coeffs();
    let scale_x = a.hypot(b);
    let column_y = c.hypot(d);
    if scale_x < f64::EPSILON || column_y < f64::EPSILON {
        return None;
    }
    // Columns must stay perpendicular for a pure rotate-and-scale.
    if (a * c + b * d).abs() > 1e-9 * scale_x * column_y {
        return None;
    }
    let scale_y = (a * d - b * c) / scale_x;
    Some(Decomposed {
        angle: b.atan2(a).to_degrees(),
        scale_x,
        scale_y: scale_y.abs(),
        flip_y: scale_y < 0.0,
    })
}

/// Rotate `v` by `radians`.
pub fn rotate_vec(v: Vec2, radians: f64) -> Vec2 {
    let (sin, cos) = radians.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Map `point` from parent space into the local space of `local_to_parent`.
///
/// Returns `None` when the transform is singular.
pub fn to_local_point(point: Point, local_to_parent: Affine) -> Option<Point> {
    if local_to_parent.determinant().abs() < f64::EPSILON {
        return None;
    }
    Some(local_to_parent.inverse() * point)
}

/// Axis-aligned bounds of `local` after mapping through `local_to_parent`.
pub fn bounding_rect(local: Rect, local_to_parent: Affine) -> Rect {
    let corners = [
        Point::new(local.x0, local.y0),
        Point::new(local.x1, local.y0),
        Point::new(local.x1, local.y1),
        Point::new(local.x0, local.y1),
    ];
    let first = local_to_parent * corners[0];
    corners[1..]
        .iter()
        .fold(Rect::from_points(first, first), |rect, corner| {
            rect.union_pt(local_to_parent * *corner)
        })
}
