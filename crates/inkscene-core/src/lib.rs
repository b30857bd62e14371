//! InkScene Core Library
//!
//! Platform-agnostic scene model for InkScene: ellipse and group shapes,
//! canvas-style rendering through the [`Surface`] trait, visible-area hit
//! testing, and JSON/SVG serialization.

pub mod scene;
pub mod shapes;
pub mod surface;
pub mod svg;

pub use scene::Scene;
pub use shapes::{
    Ellipse, EllipseOptions, Group, GroupKind, ObjectBase, Property, RenderOptions,
    SerializableColor, Shape, ShapeError, ShapeId, ShapeRegistry, ShapeTrait,
};
pub use surface::{RecordingSurface, Surface};
pub use svg::{SvgError, SvgExportOptions};
