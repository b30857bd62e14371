//! Visible-area intersection against axis-aligned query rectangles.

use super::Ellipse;
use crate::shapes::{to_local_point, Group, GroupKind};
use kurbo::{Affine, Point, Rect, Vec2};

/// Edges shorter than this along one axis count as axis-aligned.
const AXIS_EPSILON: f64 = 1e-9;

/// Tight axis-aligned bounds of the ellipse `(x/rx)² + (y/ry)² = 1` mapped
/// through `matrix`.
pub(super) fn ellipse_bounds(rx: f64, ry: f64, matrix: Affine) -> Rect {
    let [a, b, c, d, e, f] = matrix.as_coeffs();
    let half = Vec2::new((a * rx).hypot(c * ry), (b * rx).hypot(d * ry));
    let center = Point::new(e, f);
    Rect::from_points(center - half, center + half)
}

impl Ellipse {
    /// Local-to-parent matrix.
    ///
    /// Path-group children keep their placement in `left`/`top` relative to the
    /// group's top-left corner, so only the raw matrix applies on top.
    pub fn local_to_parent_matrix(&self, group: Option<&Group>) -> Affine {
        match group {
            Some(group) if group.kind() == GroupKind::PathGroup => {
                let center = Vec2::new(self.object.left + self.rx, self.object.top + self.ry);
                Affine::translate(center) * self.object.transform_matrix.unwrap_or(Affine::IDENTITY)
            }
            _ => self.object.calc_own_matrix(),
        }
    }

    /// Whether the ellipse's visible area intersects `rect`.
    ///
    /// `rect` is in the coordinate space of the ellipse's parent, or of
    /// `group`'s parent when the ellipse is a member of `group`. An unfilled
    /// ellipse only shows its outline, so a rectangle lying entirely inside it
    /// does not count.
    pub fn visible_area_clips_with_rect(&self, rect: Rect, group: Option<&Group>) -> bool {
        let parent = group.map(Group::children_matrix).unwrap_or(Affine::IDENTITY);
        self.clips_with_rect_in(rect, parent, group)
    }

    /// Tight bounds, with `parent` mapping the ellipse's parent space into the
    /// target space.
    pub(crate) fn bounds_in(&self, parent: Affine, group: Option<&Group>) -> Rect {
        ellipse_bounds(self.rx, self.ry, parent * self.local_to_parent_matrix(group))
    }

    /// [`Ellipse::visible_area_clips_with_rect`] with an explicit parent
    /// matrix, for nested groups.
    pub(crate) fn clips_with_rect_in(
        &self,
        rect: Rect,
        parent: Affine,
        group: Option<&Group>,
    ) -> bool {
        if self.rx <= 0.0 || self.ry <= 0.0 {
            return false;
        }
        // Marquees dragged up or left arrive with swapped corners.
        let rect = rect.abs();
        let full = parent * self.local_to_parent_matrix(group);

        let corners = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ];
        let mut local = [Point::ORIGIN; 4];
        for (slot, corner) in local.iter_mut().zip(corners) {
            match to_local_point(corner, full) {
                Some(point) => *slot = point,
                None => return false,
            }
        }

        let inside = local.iter().filter(|p| self.contains_local(**p)).count();
        match inside {
            1..=3 => true,
            4 => self.object.fill.is_some(),
            _ => self.encloses_or_crosses(rect, full, &local),
        }
    }

    /// Point-in-ellipse test in the local, center-relative frame.
    fn contains_local(&self, point: Point) -> bool {
        let x = point.x / self.rx;
        let y = point.y / self.ry;
        x * x + y * y <= 1.0
    }

    /// No corner is inside: either the rectangle surrounds the ellipse or one
    /// of its edges cuts through it.
    fn encloses_or_crosses(&self, rect: Rect, full: Affine, local: &[Point; 4]) -> bool {
        let bounds = ellipse_bounds(self.rx, self.ry, full);
        let strictly_inside = bounds.x0 > rect.x0
            && bounds.x1 < rect.x1
            && bounds.y0 > rect.y0
            && bounds.y1 < rect.y1;
        let inside = bounds.x0 >= rect.x0
            && bounds.x1 <= rect.x1
            && bounds.y0 >= rect.y0
            && bounds.y1 <= rect.y1;
        if strictly_inside || (inside && self.object.fill.is_some()) {
            return true;
        }
        (0..4).any(|i| self.edge_crosses(local[i], local[(i + 1) % 4]))
    }

    /// Whether the segment `a`-`b` (both endpoints outside) passes through the
    /// ellipse interior. Tangent segments do not count.
    fn edge_crosses(&self, a: Point, b: Point) -> bool {
        let (rx, ry) = (self.rx, self.ry);
        if (a.x - b.x).abs() < AXIS_EPSILON {
            // Vertical edge.
            return a.x.abs() < rx && a.y.signum() != b.y.signum();
        }
        if (a.y - b.y).abs() < AXIS_EPSILON {
            return a.y.abs() < ry && a.x.signum() != b.x.signum();
        }

        // Solve |p0 + t·d|² = 1 in the unit-circle frame.
        let p0 = Vec2::new(a.x / rx, a.y / ry);
        let d = Vec2::new((b.x - a.x) / rx, (b.y - a.y) / ry);
        let qa = d.dot(d);
        let qb = 2.0 * p0.dot(d);
        let qc = p0.dot(p0) - 1.0;
        let discriminant = qb * qb - 4.0 * qa * qc;
        if discriminant <= 0.0 {
            return false;
        }
        let t = (-qb - discriminant.sqrt()) / (2.0 * qa);
        t > 0.0 && t < 1.0
    }
}
