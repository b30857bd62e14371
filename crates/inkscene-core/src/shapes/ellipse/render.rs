//! Ellipse rendering: a circle drawn in a squashed coordinate space.

use super::Ellipse;
use crate::shapes::{Group, RenderOptions};
use crate::surface::{clip_context, Surface};
use kurbo::{Affine, Point};
use std::f64::consts::TAU;

impl Ellipse {
    /// Whether rendering would draw anything at all.
    ///
    /// A single zero (or negative) radius counts as empty, like a zero width or
    /// height, so the squash ratio is always finite.
    pub fn is_renderable(&self) -> bool {
        let object = &self.object;
        object.visible
            && object.width != 0.0
            && object.height != 0.0
            && self.rx > 0.0
            && self.ry > 0.0
    }

    /// Draw the ellipse onto `surface`.
    ///
    /// Touches nothing when the ellipse is empty or invisible; otherwise the
    /// surface's save depth is the same on return as on entry.
    pub fn render(&self, surface: &mut dyn Surface, options: &RenderOptions<'_>) {
        if !self.is_renderable() {
            return;
        }
        let object = &self.object;

        surface.save();
        if !self.transform_stroke_and_fill {
            surface.save();
        }
        if !options.skip_transform {
            object.transform(surface);
        }
        if let Some(matrix) = object.transform_matrix {
            surface.transform(matrix);
        }
        let object_transform = surface.current_transform();

        self.create_path(surface, options.skip_transform);

        if !self.transform_stroke_and_fill {
            surface.restore();
            if let Some(undistort) = options.undistort {
                undistort(surface);
            }
        }

        let previous = object.setup_composite_operation(surface);
        object.set_stroke_styles(surface);
        object.set_fill_styles(surface);
        object.set_opacity(surface, options.group.map(Group::object));
        object.set_shadow(surface);
        clip_context(object, surface, object_transform);
        self.render_fill(surface);
        self.render_stroke(surface);
        surface.restore();
        object.remove_shadow(surface);
        object.restore_composite_operation(surface, previous);
        surface.restore();
    }

    /// Build the elliptical path: a circle of radius `rx` with y squashed by
    /// `ry/rx`.
    fn create_path(&self, surface: &mut dyn Surface, skip_transform: bool) {
        let (rx, ry) = (self.rx, self.ry);
        let center = if skip_transform {
            Point::new(self.object.left + rx, (self.object.top + ry) * rx / ry)
        } else {
            Point::ORIGIN
        };

        surface.begin_path();
        surface.save();
        surface.transform(Affine::scale_non_uniform(1.0, ry / rx));
        surface.arc(center, rx, 0.0, TAU, false);
        surface.restore();
    }

    fn render_fill(&self, surface: &mut dyn Surface) {
        if self.object.fill.is_none() {
            return;
        }
        surface.save();
        surface.fill();
        surface.restore();
    }

    fn render_stroke(&self, surface: &mut dyn Surface) {
        if self.object.stroke.is_none() || self.object.stroke_width == 0.0 {
            return;
        }
        surface.save();
        surface.stroke();
        surface.restore();
    }
}
