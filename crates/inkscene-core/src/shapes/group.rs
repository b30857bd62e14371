//! Group shape for combining multiple shapes.

use super::{
    bounding_rect, normalize_object, ObjectBase, Property, RenderOptions, Shape, ShapeError,
    ShapeId, ShapeTrait, SvgReviver,
};
use crate::surface::Surface;
use crate::svg::svg_matrix;
use kurbo::{Affine, Rect, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// How a group lays out its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    /// Children are placed relative to the group's center and position
    /// themselves.
    #[default]
    Group,
    /// Children are placed relative to the group's top-left corner and are
    /// drawn in the group's (possibly distorted) frame.
    PathGroup,
}

impl GroupKind {
    pub fn type_name(self) -> &'static str {
        match self {
            GroupKind::Group => "group",
            GroupKind::PathGroup => "path-group",
        }
    }
}

/// A group of shapes that can be manipulated as a single unit.
/// Groups can contain other groups, enabling nested hierarchies.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub(crate) id: ShapeId,
    group: Option<ShapeId>,
    kind: GroupKind,
    object: ObjectBase,
    children: Vec<Shape>,
}

impl Group {
    /// Create a new group, adopting `children`.
    pub fn new(kind: GroupKind, object: ObjectBase, children: Vec<Shape>) -> Self {
        Self::with_id(Uuid::new_v4(), kind, object, children)
    }

    /// Create a new group with a specific ID.
    pub fn with_id(
        id: ShapeId,
        kind: GroupKind,
        object: ObjectBase,
        mut children: Vec<Shape>,
    ) -> Self {
        for child in &mut children {
            child.set_group_id(Some(id));
        }
        Self {
            id,
            group: None,
            kind,
            object,
            children,
        }
    }

    pub(crate) fn set_id(&mut self, id: ShapeId) {
        self.id = id;
        for child in &mut self.children {
            child.set_group_id(Some(id));
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn object(&self) -> &ObjectBase {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut ObjectBase {
        &mut self.object
    }

    /// Get the children of this group.
    pub fn children(&self) -> &[Shape] {
        &self.children
    }

    /// Add a child on top of the existing ones.
    pub fn push(&mut self, mut child: Shape) {
        child.set_group_id(Some(self.id));
        self.children.push(child);
    }

    /// Dissolve this group and return its children.
    pub fn ungroup(self) -> Vec<Shape> {
        let mut children = self.children;
        for child in &mut children {
            child.set_group_id(None);
        }
        children
    }

    /// Get all shape IDs in this group (including nested groups).
    pub fn all_shape_ids(&self) -> Vec<ShapeId> {
        let mut ids = vec![self.id];
        for child in &self.children {
            if let Shape::Group(group) = child {
                ids.extend(group.all_shape_ids());
            } else {
                ids.push(child.id());
            }
        }
        ids
    }

    /// Find a shape by ID within this group (including nested groups).
    pub fn find_shape(&self, id: ShapeId) -> Option<&Shape> {
        for child in &self.children {
            if child.id() == id {
                return Some(child);
            }
            if let Shape::Group(group) = child {
                if let Some(found) = group.find_shape(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Find a mutable shape by ID within this group (including nested groups).
    pub fn find_shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        for child in &mut self.children {
            if child.id() == id {
                return Some(child);
            }
            if let Shape::Group(group) = child {
                if let Some(found) = group.find_shape_mut(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Find this group or a nested one by ID.
    pub fn find_group(&self, id: ShapeId) -> Option<&Group> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter()
            .filter_map(Shape::as_group)
            .find_map(|group| group.find_group(id))
    }

    /// Map from child coordinates to the group's parent coordinates.
    pub fn children_matrix(&self) -> Affine {
        let own = self.object.calc_own_matrix();
        match self.kind {
            GroupKind::Group => own,
            GroupKind::PathGroup => {
                let half = Vec2::new(self.object.width / 2.0, self.object.height / 2.0);
                own * Affine::translate(-half)
            }
        }
    }

    /// Visible-area test with `parent` mapping the group's parent space into
    /// the space `rect` is given in.
    pub(crate) fn clips_with_rect_in(&self, rect: Rect, parent: Affine) -> bool {
        let matrix = parent * self.children_matrix();
        self.children.iter().any(|child| match child {
            Shape::Ellipse(ellipse) => ellipse.clips_with_rect_in(rect, matrix, Some(self)),
            Shape::Group(group) => group.clips_with_rect_in(rect, matrix),
        })
    }

    /// Draw the group and its children.
    pub fn render(&self, surface: &mut dyn Surface, options: &RenderOptions<'_>) {
        if !self.object.visible {
            return;
        }
        surface.save();
        if let Some(parent) = options.group {
            parent.object.set_opacity(surface, None);
        }
        let frame = surface.current_transform();
        if !options.skip_transform {
            self.object.transform(surface);
        }
        if let Some(matrix) = self.object.transform_matrix {
            surface.transform(matrix);
        }

        match self.kind {
            GroupKind::Group => {
                let child_options = RenderOptions::new().in_group(self);
                for child in &self.children {
                    child.render(surface, &child_options);
                }
            }
            GroupKind::PathGroup => {
                surface.transform(Affine::translate(Vec2::new(
                    -self.object.width / 2.0,
                    -self.object.height / 2.0,
                )));
                let undistort = move |surface: &mut dyn Surface| surface.set_transform(frame);
                let child_options = RenderOptions::new()
                    .skip_transform(true)
                    .in_group(self)
                    .with_undistort(&undistort);
                for child in &self.children {
                    child.render(surface, &child_options);
                }
            }
        }
        surface.restore();
    }

    pub fn to_object(&self, properties_to_include: &[&str]) -> Map<String, Value> {
        let mut map = self.object.to_object(self.kind.type_name(), properties_to_include);
        let objects = self
            .children
            .iter()
            .map(|child| Value::Object(child.to_object(properties_to_include)))
            .collect();
        map.insert("objects".to_string(), Value::Array(objects));
        map
    }

    /// Rebuild a group of `kind` from its object representation.
    pub fn from_object(value: &Value, kind: GroupKind) -> Result<Self, ShapeError> {
        let mut map = normalize_object(value, kind.type_name())?;
        let objects = map.remove("objects");
        let object: ObjectBase = serde_json::from_value(Value::Object(map))?;
        let children = match objects {
            Some(Value::Array(items)) => items
                .iter()
                .map(Shape::from_object)
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };
        Ok(Self::new(kind, object, children))
    }

    pub fn to_svg(&self, reviver: Option<SvgReviver<'_>>) -> String {
        let mut markup = format!(
            "<g transform=\"{}\" style=\"{}\">\n",
            svg_matrix(self.children_matrix()),
            self.object.svg_styles(None)
        );
        for child in &self.children {
            markup.push_str(&child.to_svg(Some(self), None));
        }
        markup.push_str("</g>\n");
        match reviver {
            Some(reviver) => reviver(markup),
            None => markup,
        }
    }
}

impl ShapeTrait for Group {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    fn object(&self) -> &ObjectBase {
        &self.object
    }

    fn object_mut(&mut self) -> &mut ObjectBase {
        &mut self.object
    }

    fn group_id(&self) -> Option<ShapeId> {
        self.group
    }

    fn set_group_id(&mut self, group: Option<ShapeId>) {
        self.group = group;
    }

    fn bounds(&self) -> Rect {
        let matrix = self.children_matrix();
        let mut rects = self.children.iter().map(|child| match child {
            Shape::Ellipse(ellipse) => ellipse.bounds_in(matrix, Some(self)),
            Shape::Group(group) => bounding_rect(group.bounds(), matrix),
        });
        match rects.next() {
            Some(first) => rects.fold(first, |acc, r| acc.union(r)),
            None => {
                let half = Vec2::new(self.object.width / 2.0, self.object.height / 2.0);
                bounding_rect(
                    Rect::from_points((-half).to_point(), half.to_point()),
                    self.object.calc_own_matrix(),
                )
            }
        }
    }

    fn set(&mut self, property: Property) {
        if let Some(ignored) = self.object.set(property) {
            log::debug!("group ignores property {ignored:?}");
        }
    }

    fn render(&self, surface: &mut dyn Surface, options: &RenderOptions<'_>) {
        Group::render(self, surface, options);
    }

    fn visible_area_clips_with_rect(&self, rect: Rect, group: Option<&Group>) -> bool {
        let parent = group.map(Group::children_matrix).unwrap_or(Affine::IDENTITY);
        self.clips_with_rect_in(rect, parent)
    }

    fn complexity(&self) -> usize {
        self.children.iter().map(Shape::complexity).sum()
    }

    fn to_object(&self, properties_to_include: &[&str]) -> Map<String, Value> {
        Group::to_object(self, properties_to_include)
    }

    fn to_svg(&self, _group: Option<&Group>, reviver: Option<SvgReviver<'_>>) -> String {
        Group::to_svg(self, reviver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Ellipse, EllipseOptions, SerializableColor};
    use crate::surface::{RecordingSurface, SurfaceCommand};
    use kurbo::{Point, Shape as _};
    use serde_json::json;

    fn disc(center: Point, radius: f64) -> Shape {
        let mut ellipse = Ellipse::circle(center, radius);
        ellipse
            .set(Property::Fill(Some(SerializableColor::black())))
            .set(Property::Stroke(Some(SerializableColor::white())));
        Shape::Ellipse(ellipse)
    }

    fn sized(left: f64, top: f64, width: f64, height: f64) -> ObjectBase {
        ObjectBase {
            left,
            top,
            width,
            height,
            ..Default::default()
        }
    }

    #[test]
    fn test_group_creation_adopts_children() {
        let group = Group::new(
            GroupKind::Group,
            ObjectBase::default(),
            vec![disc(Point::ORIGIN, 5.0), disc(Point::new(20.0, 0.0), 5.0)],
        );
        assert_eq!(group.children().len(), 2);
        assert!(group.children().iter().all(|c| c.group_id() == Some(group.id())));
        assert_eq!(group.all_shape_ids().len(), 3);
    }

    #[test]
    fn test_ungroup_clears_membership() {
        let children = vec![disc(Point::ORIGIN, 5.0)];
        let group = Group::new(GroupKind::Group, ObjectBase::default(), children);
        let children = group.ungroup();
        assert!(children[0].group_id().is_none());
    }

    #[test]
    fn test_complexity_counts_leaf_shapes() {
        let inner = Group::new(
            GroupKind::Group,
            ObjectBase::default(),
            vec![disc(Point::ORIGIN, 1.0), disc(Point::ORIGIN, 2.0)],
        );
        let outer = Group::new(
            GroupKind::Group,
            ObjectBase::default(),
            vec![Shape::Group(inner), disc(Point::ORIGIN, 3.0)],
        );
        assert_eq!(ShapeTrait::complexity(&outer), 3);
    }

    #[test]
    fn test_find_nested_shape() {
        let children = vec![disc(Point::ORIGIN, 1.0)];
        let inner = Group::new(GroupKind::Group, ObjectBase::default(), children);
        let target = inner.children()[0].id();
        let inner_id = inner.id();
        let outer = Group::new(GroupKind::Group, ObjectBase::default(), vec![Shape::Group(inner)]);
        assert!(outer.find_shape(target).is_some());
        assert_eq!(outer.find_group(inner_id).map(Group::id), Some(inner_id));
    }

    #[test]
    fn test_group_render_balances_and_positions_children() {
        let group = Group::new(
            GroupKind::Group,
            sized(100.0, 100.0, 40.0, 40.0),
            vec![disc(Point::ORIGIN, 10.0)],
        );
        let mut surface = RecordingSurface::new();
        group.render(&mut surface, &RenderOptions::new());
        assert_eq!(surface.depth(), 0);
        let Some(SurfaceCommand::Fill { path, .. }) = surface.fills().next() else {
            panic!("missing fill");
        };
        let center = path.bounding_box().center();
        assert!((center.x - 120.0).abs() < 1e-6);
        assert!((center.y - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_path_group_places_children_from_top_left() {
        let child = Ellipse::new(EllipseOptions {
            rx: 10.0,
            ry: 5.0,
            object: ObjectBase {
                left: 0.0,
                top: 0.0,
                fill: Some(SerializableColor::black()),
                ..Default::default()
            },
            ..Default::default()
        });
        let group = Group::new(
            GroupKind::PathGroup,
            sized(50.0, 60.0, 20.0, 10.0),
            vec![Shape::Ellipse(child)],
        );
        let mut surface = RecordingSurface::new();
        group.render(&mut surface, &RenderOptions::new());
        assert_eq!(surface.depth(), 0);
        let Some(SurfaceCommand::Fill { path, .. }) = surface.fills().next() else {
            panic!("missing fill");
        };
        let bounds = path.bounding_box();
        assert!((bounds.x0 - 50.0).abs() < 1e-6);
        assert!((bounds.y0 - 60.0).abs() < 1e-6);
        assert!((bounds.x1 - 70.0).abs() < 1e-6);
        assert!((bounds.y1 - 70.0).abs() < 1e-6);
    }

    #[test]
    fn test_path_group_undistorts_uniform_strokes() {
        let mut child = Ellipse::new(EllipseOptions {
            rx: 10.0,
            ry: 10.0,
            transform_stroke_and_fill: false,
            ..Default::default()
        });
        child.set(Property::Stroke(Some(SerializableColor::black())));
        let mut object = sized(0.0, 0.0, 20.0, 20.0);
        object.scale_x = 3.0;
        let group = Group::new(GroupKind::PathGroup, object, vec![Shape::Ellipse(child)]);

        let mut surface = RecordingSurface::new();
        surface.transform(Affine::translate((5.0, 5.0)));
        group.render(&mut surface, &RenderOptions::new());
        let Some(SurfaceCommand::Stroke { transform, path, .. }) = surface.strokes().next() else {
            panic!("missing stroke");
        };
        // The stroke runs in the frame the group was entered with.
        assert_eq!(*transform, Affine::translate((5.0, 5.0)));
        assert!((path.bounding_box().width() - 60.0).abs() < 1e-6);
        assert_eq!(surface.depth(), 0);
        assert_eq!(surface.current_transform(), Affine::translate((5.0, 5.0)));
    }

    #[test]
    fn test_invisible_group_is_skipped() {
        let mut object = ObjectBase::default();
        object.visible = false;
        let group = Group::new(GroupKind::Group, object, vec![disc(Point::ORIGIN, 5.0)]);
        let mut surface = RecordingSurface::new();
        group.render(&mut surface, &RenderOptions::new());
        assert!(surface.is_untouched());
    }

    #[test]
    fn test_group_bounds() {
        let group = Group::new(
            GroupKind::Group,
            sized(0.0, 0.0, 100.0, 100.0),
            vec![disc(Point::new(-10.0, 0.0), 5.0), disc(Point::new(10.0, 0.0), 5.0)],
        );
        let bounds = group.bounds();
        assert!((bounds.x0 - 35.0).abs() < 1e-9);
        assert!((bounds.x1 - 65.0).abs() < 1e-9);
        assert!((bounds.y0 - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_nested_group_clips() {
        let inner = Group::new(
            GroupKind::Group,
            sized(-10.0, -10.0, 20.0, 20.0),
            vec![disc(Point::ORIGIN, 5.0)],
        );
        let outer = Group::new(
            GroupKind::Group,
            sized(90.0, 90.0, 20.0, 20.0),
            vec![Shape::Group(inner)],
        );
        assert!(outer.visible_area_clips_with_rect(Rect::new(98.0, 98.0, 102.0, 102.0), None));
        assert!(!outer.visible_area_clips_with_rect(Rect::new(0.0, 0.0, 4.0, 4.0), None));
    }

    #[test]
    fn test_object_round_trip() {
        let group = Group::new(
            GroupKind::PathGroup,
            sized(1.0, 2.0, 30.0, 40.0),
            vec![disc(Point::new(3.0, 3.0), 2.0)],
        );
        let value = Value::Object(group.to_object(&[]));
        assert_eq!(value["type"], json!("path-group"));
        assert_eq!(value["objects"][0]["type"], json!("ellipse"));

        let back = Group::from_object(&value, GroupKind::PathGroup).unwrap();
        assert_eq!(back.kind(), GroupKind::PathGroup);
        assert_eq!(back.children().len(), 1);
        assert_eq!(back.children()[0].group_id(), Some(back.id()));
        assert_eq!(back.to_object(&[]), group.to_object(&[]));
    }

    #[test]
    fn test_from_object_tolerates_malformed_fields() {
        let value = json!({
            "type": "group",
            "visible": null,
            "stroke": "not-a-color",
            "objects": [{"type": "ellipse", "rx": 2, "ry": 2, "fill": ""}],
        });
        let group = Group::from_object(&value, GroupKind::Group).unwrap();
        assert!(group.object().visible);
        assert!(group.object().stroke.is_none());
        assert_eq!(group.children().len(), 1);
        assert!(group.children()[0].object().fill.is_none());
    }

    #[test]
    fn test_to_svg_wraps_children() {
        let children = vec![disc(Point::ORIGIN, 1.0)];
        let group = Group::new(GroupKind::Group, sized(0.0, 0.0, 10.0, 10.0), children);
        let svg = group.to_svg(None);
        assert!(svg.starts_with("<g transform=\"matrix(1 0 0 1 5 5)\""));
        assert!(svg.contains("<ellipse cx=\"0\" cy=\"0\""));
        assert!(svg.ends_with("</g>\n"));
    }
}
