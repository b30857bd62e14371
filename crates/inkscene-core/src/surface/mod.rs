//! Drawing surface abstraction.
//!
//! Shapes render through [`Surface`], a canvas-2D style interface: a current
//! transform, a current path built in device space, paint and line state, and a
//! save/restore stack covering everything except the path.

mod recording;

pub use recording::{RecordingSurface, SurfaceCommand};

use crate::shapes::ObjectBase;
use kurbo::{Affine, Arc, BezPath, Point, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Tolerance used when flattening arcs into cubic segments.
pub const ARC_TOLERANCE: f64 = 0.1;

/// Compositing operator applied when drawing onto a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeOperation {
    #[default]
    SourceOver,
    SourceIn,
    SourceOut,
    SourceAtop,
    DestinationOver,
    DestinationIn,
    DestinationOut,
    DestinationAtop,
    Lighter,
    Copy,
    Xor,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

impl CompositeOperation {
    /// Canvas keyword for this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            CompositeOperation::SourceOver => "source-over",
            CompositeOperation::SourceIn => "source-in",
            CompositeOperation::SourceOut => "source-out",
            CompositeOperation::SourceAtop => "source-atop",
            CompositeOperation::DestinationOver => "destination-over",
            CompositeOperation::DestinationIn => "destination-in",
            CompositeOperation::DestinationOut => "destination-out",
            CompositeOperation::DestinationAtop => "destination-atop",
            CompositeOperation::Lighter => "lighter",
            CompositeOperation::Copy => "copy",
            CompositeOperation::Xor => "xor",
            CompositeOperation::Multiply => "multiply",
            CompositeOperation::Screen => "screen",
            CompositeOperation::Overlay => "overlay",
            CompositeOperation::Darken => "darken",
            CompositeOperation::Lighten => "lighten",
        }
    }
}

/// Shape of stroke end points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn as_str(self) -> &'static str {
        match self {
            LineCap::Butt => "butt",
            LineCap::Round => "round",
            LineCap::Square => "square",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "butt" => Some(LineCap::Butt),
            "round" => Some(LineCap::Round),
            "square" => Some(LineCap::Square),
            _ => None,
        }
    }
}

/// Shape of stroke corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn as_str(self) -> &'static str {
        match self {
            LineJoin::Miter => "miter",
            LineJoin::Round => "round",
            LineJoin::Bevel => "bevel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "miter" => Some(LineJoin::Miter),
            "round" => Some(LineJoin::Round),
            "bevel" => Some(LineJoin::Bevel),
            _ => None,
        }
    }
}

/// Line state used by [`Surface::stroke`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    /// Dash pattern; empty means solid.
    pub dash: Vec<f64>,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: Vec::new(),
        }
    }
}

/// Shadow state applied to subsequent fills and strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    pub color: Color,
    pub blur: f64,
    pub offset: Vec2,
}

/// A canvas-2D style drawing target.
///
/// Path points are mapped through the transform that is current when they are
/// added; strokes are sized in the transform current when [`Surface::stroke`]
/// is called. `save`/`restore` cover transform, paint, line, alpha, composite,
/// shadow and clip state, never the current path.
pub trait Surface {
    fn save(&mut self);

    fn restore(&mut self);

    fn current_transform(&self) -> Affine;

    fn set_transform(&mut self, affine: Affine);

    /// Post-multiply the current transform.
    fn transform(&mut self, affine: Affine);

    fn begin_path(&mut self);

    /// Add a circular arc to the current path, connecting it to the previous
    /// point with a straight segment.
    fn arc(
        &mut self,
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
    );

    /// Fill the current path with the current fill color.
    fn fill(&mut self);

    /// Stroke the current path with the current stroke color and line style.
    fn stroke(&mut self);

    /// Intersect the clip region with `path`, given in current-transform space.
    fn clip(&mut self, path: &BezPath);

    fn global_composite_operation(&self) -> CompositeOperation;

    fn set_global_composite_operation(&mut self, op: CompositeOperation);

    fn global_alpha(&self) -> f64;

    fn set_global_alpha(&mut self, alpha: f64);

    fn set_fill_color(&mut self, color: Color);

    fn set_stroke_color(&mut self, color: Color);

    fn set_line_style(&mut self, style: &LineStyle);

    fn set_shadow(&mut self, shadow: Option<ShadowStyle>);
}

/// Append a canvas-style arc to `path`, mapping every point through `ctm`.
///
/// Shared by surface implementations so they agree on sweep normalization.
pub fn append_arc(
    path: &mut BezPath,
    ctm: Affine,
    center: Point,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    anticlockwise: bool,
) {
    let delta = end_angle - start_angle;
    let sweep = if anticlockwise {
        if -delta >= TAU { -TAU } else { -(-delta).rem_euclid(TAU) }
    } else if delta >= TAU {
        TAU
    } else {
        delta.rem_euclid(TAU)
    };

    let start = center + Vec2::from_angle(start_angle) * radius;
    if path.elements().is_empty() {
        path.move_to(ctm * start);
    } else {
        path.line_to(ctm * start);
    }

    let arc = Arc {
        center,
        radii: Vec2::new(radius, radius),
        start_angle,
        sweep_angle: sweep,
        x_rotation: 0.0,
    };
    for el in arc.append_iter(ARC_TOLERANCE) {
        path.push(ctm * el);
    }
}

/// Map a device-space path back into the space of `ctm`.
///
/// Returns `None` when `ctm` is singular.
pub fn path_in_transform_space(path: &BezPath, ctm: Affine) -> Option<BezPath> {
    if ctm.determinant().abs() < f64::EPSILON {
        return None;
    }
    let inverse = ctm.inverse();
    Some(path.elements().iter().map(|el| inverse * *el).collect())
}

/// Apply `object`'s clip path to `surface`.
///
/// `object_transform` is the surface transform under which the object's local
/// coordinates were laid out; the clip is mapped from there into the current
/// transform. Saves the surface: the caller must restore afterwards.
pub fn clip_context(object: &ObjectBase, surface: &mut dyn Surface, object_transform: Affine) {
    surface.save();
    let Some(clip_path) = object.clip_path.as_ref() else {
        return;
    };
    let current = surface.current_transform();
    if current.determinant().abs() < f64::EPSILON {
        log::warn!("skipping clip: surface transform is singular");
        return;
    }
    let mut path = clip_path.clone();
    path.apply_affine(current.inverse() * object_transform);
    surface.clip(&path);
}
