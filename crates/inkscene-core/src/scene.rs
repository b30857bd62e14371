//! Scene document: shapes in z-order plus whole-scene render and I/O.

use crate::shapes::{Group, RenderOptions, Shape, ShapeError, ShapeId, ShapeRegistry};
use crate::surface::Surface;
use crate::svg::{SvgError, SvgExportOptions};
use kurbo::Rect;
use serde_json::{json, Value};

/// Version written into serialized scenes.
pub const FORMAT_VERSION: &str = "1.0";

/// Elements that carry no drawable content of their own.
const STRUCTURAL_ELEMENTS: &[&str] = &["svg", "g", "defs", "title", "desc", "metadata"];

/// A scene containing top-level shapes, back to front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    shapes: Vec<Shape>,
}

impl Scene {
    /// Create a new empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shape on top of the others.
    pub fn add_shape(&mut self, shape: impl Into<Shape>) -> ShapeId {
        let mut shape = shape.into();
        shape.set_group_id(None);
        let id = shape.id();
        self.shapes.push(shape);
        id
    }

    /// Remove a top-level shape.
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Shape> {
        let index = self.shapes.iter().position(|s| s.id() == id)?;
        Some(self.shapes.remove(index))
    }

    /// Clear all shapes from the scene.
    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    /// Top-level shapes, back to front.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Find a shape by ID, searching inside groups.
    pub fn find_shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find_map(|shape| {
            if shape.id() == id {
                Some(shape)
            } else {
                shape.as_group().and_then(|group| group.find_shape(id))
            }
        })
    }

    /// Find a mutable shape by ID, searching inside groups.
    pub fn find_shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        for shape in &mut self.shapes {
            if shape.id() == id {
                return Some(shape);
            }
            if let Some(found) = shape.as_group_mut().and_then(|group| group.find_shape_mut(id)) {
                return Some(found);
            }
        }
        None
    }

    /// The group containing the shape `id`, if any.
    pub fn group_of(&self, id: ShapeId) -> Option<&Group> {
        let group_id = self.find_shape(id)?.group_id()?;
        self.shapes
            .iter()
            .filter_map(Shape::as_group)
            .find_map(|group| group.find_group(group_id))
    }

    /// Bring a shape to the front (topmost).
    pub fn bring_to_front(&mut self, id: ShapeId) -> bool {
        match self.remove_shape(id) {
            Some(shape) => {
                self.shapes.push(shape);
                true
            }
            None => false,
        }
    }

    /// Send a shape to the back (bottommost).
    pub fn send_to_back(&mut self, id: ShapeId) -> bool {
        match self.remove_shape(id) {
            Some(shape) => {
                self.shapes.insert(0, shape);
                true
            }
            None => false,
        }
    }

    /// Move a shape one layer forward (towards front).
    /// Returns true if the shape was moved, false if already at front.
    pub fn bring_forward(&mut self, id: ShapeId) -> bool {
        if let Some(pos) = self.shapes.iter().position(|s| s.id() == id) {
            if pos + 1 < self.shapes.len() {
                self.shapes.swap(pos, pos + 1);
                return true;
            }
        }
        false
    }

    /// Move a shape one layer backward (towards back).
    /// Returns true if the shape was moved, false if already at back.
    pub fn send_backward(&mut self, id: ShapeId) -> bool {
        if let Some(pos) = self.shapes.iter().position(|s| s.id() == id) {
            if pos > 0 {
                self.shapes.swap(pos, pos - 1);
                return true;
            }
        }
        false
    }

    /// Get the bounding box of all shapes.
    pub fn bounds(&self) -> Option<Rect> {
        self.shapes
            .iter()
            .map(Shape::bounds)
            .reduce(|acc, bounds| acc.union(bounds))
    }

    /// Render every shape back to front.
    pub fn render(&self, surface: &mut dyn Surface) {
        let options = RenderOptions::new();
        for shape in &self.shapes {
            shape.render(surface, &options);
        }
    }

    /// IDs of the top-level shapes whose visible area clips `rect`.
    pub fn shapes_in_rect(&self, rect: Rect) -> Vec<ShapeId> {
        self.shapes
            .iter()
            .filter(|shape| shape.visible_area_clips_with_rect(rect, None))
            .map(Shape::id)
            .collect()
    }

    /// Serialize the scene to JSON.
    pub fn to_json(&self) -> Result<String, ShapeError> {
        let objects: Vec<Value> = self
            .shapes
            .iter()
            .map(|shape| Value::Object(shape.to_object(&[])))
            .collect();
        let document = json!({ "version": FORMAT_VERSION, "objects": objects });
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Deserialize a scene from JSON.
    pub fn from_json(source: &str) -> Result<Self, ShapeError> {
        let document: Value = serde_json::from_str(source)?;
        let map = document.as_object().ok_or(ShapeError::NotAnObject)?;
        if let Some(version) = map.get("version").and_then(Value::as_str) {
            if version != FORMAT_VERSION {
                log::warn!("loading scene written by format version {version}");
            }
        }
        let mut scene = Self::new();
        if let Some(objects) = map.get("objects").and_then(Value::as_array) {
            for object in objects {
                scene.add_shape(Shape::from_object(object)?);
            }
        }
        Ok(scene)
    }

    /// Export the scene as an SVG document.
    pub fn to_svg(&self, options: &SvgExportOptions<'_>) -> String {
        let mut markup = options.open_tag();
        markup.push('\n');
        for shape in &self.shapes {
            markup.push_str(&shape.to_svg(None, options.reviver));
        }
        markup.push_str("</svg>\n");
        markup
    }

    /// Import the shapes of an SVG document.
    ///
    /// Groups are flattened: their paint and transforms are inherited by the
    /// imported shapes. Content inside `<defs>` is skipped, as are elements no
    /// registered type imports.
    pub fn from_svg(source: &str) -> Result<Self, SvgError> {
        let document = roxmltree::Document::parse(source)?;
        let registry = ShapeRegistry::builtin();
        let mut scene = Self::new();
        for node in document.descendants().filter(|n| n.is_element()) {
            if node.ancestors().skip(1).any(|a| a.has_tag_name("defs")) {
                continue;
            }
            let tag = node.tag_name().name();
            match registry.from_element(node) {
                Some(shape) => {
                    scene.add_shape(shape?);
                }
                None if STRUCTURAL_ELEMENTS.contains(&tag) => {}
                None => log::debug!("skipping unsupported SVG element <{tag}>"),
            }
        }
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Ellipse, GroupKind, ObjectBase, Property, SerializableColor};
    use crate::surface::RecordingSurface;
    use kurbo::Point;

    fn disc(x: f64, y: f64, r: f64) -> Ellipse {
        let mut ellipse = Ellipse::circle(Point::new(x, y), r);
        ellipse.object_mut().fill = Some(SerializableColor::black());
        ellipse
    }

    #[test]
    fn test_scene_creation() {
        let scene = Scene::new();
        assert!(scene.is_empty());
        assert_eq!(scene.bounds(), None);
    }

    #[test]
    fn test_add_and_remove_shape() {
        let mut scene = Scene::new();
        let id = scene.add_shape(disc(10.0, 10.0, 5.0));
        assert_eq!(scene.len(), 1);
        assert!(scene.find_shape(id).is_some());

        let removed = scene.remove_shape(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(scene.is_empty());
        assert!(scene.remove_shape(id).is_none());
    }

    #[test]
    fn test_z_order() {
        let mut scene = Scene::new();
        let a = scene.add_shape(disc(0.0, 0.0, 1.0));
        let b = scene.add_shape(disc(0.0, 0.0, 1.0));
        let c = scene.add_shape(disc(0.0, 0.0, 1.0));
        let order = |scene: &Scene| scene.shapes().iter().map(Shape::id).collect::<Vec<_>>();

        assert!(scene.bring_to_front(a));
        assert_eq!(order(&scene), vec![b, c, a]);
        assert!(scene.send_to_back(c));
        assert_eq!(order(&scene), vec![c, b, a]);
        assert!(!scene.bring_forward(a));
        assert!(scene.send_backward(a));
        assert_eq!(order(&scene), vec![c, a, b]);
        assert!(!scene.send_backward(c));
    }

    #[test]
    fn test_group_of_resolves_back_reference() {
        let child = disc(5.0, 5.0, 2.0);
        let child_id = child.id;
        let inner = Group::new(GroupKind::Group, ObjectBase::default(), vec![child.into()]);
        let inner_id = inner.id;
        let outer = Group::new(GroupKind::Group, ObjectBase::default(), vec![inner.into()]);
        let outer_id = outer.id;

        let mut scene = Scene::new();
        scene.add_shape(outer);
        let loose = scene.add_shape(disc(0.0, 0.0, 1.0));

        assert_eq!(scene.group_of(child_id).map(|g| g.id), Some(inner_id));
        assert_eq!(scene.group_of(inner_id).map(|g| g.id), Some(outer_id));
        assert!(scene.group_of(outer_id).is_none());
        assert!(scene.group_of(loose).is_none());
    }

    #[test]
    fn test_find_shape_mut_inside_group() {
        let child = disc(5.0, 5.0, 2.0);
        let child_id = child.id;
        let mut scene = Scene::new();
        scene.add_shape(Group::new(GroupKind::Group, ObjectBase::default(), vec![child.into()]));

        scene.find_shape_mut(child_id).unwrap().set(Property::Rx(4.0));
        let found = scene.find_shape(child_id).and_then(Shape::as_ellipse).unwrap();
        assert_eq!(found.rx(), 4.0);
    }

    #[test]
    fn test_render_is_balanced() {
        let mut scene = Scene::new();
        scene.add_shape(disc(10.0, 10.0, 5.0));
        scene.add_shape(Group::new(
            GroupKind::Group,
            ObjectBase::default(),
            vec![disc(0.0, 0.0, 3.0).into()],
        ));
        let mut surface = RecordingSurface::new();
        scene.render(&mut surface);
        assert_eq!(surface.depth(), 0);
        assert_eq!(surface.fills().count(), 2);
    }

    #[test]
    fn test_shapes_in_rect() {
        let mut scene = Scene::new();
        let near = scene.add_shape(disc(10.0, 10.0, 5.0));
        let far = scene.add_shape(disc(100.0, 100.0, 5.0));
        let hits = scene.shapes_in_rect(Rect::new(0.0, 0.0, 12.0, 12.0));
        assert_eq!(hits, vec![near]);
        assert!(!hits.contains(&far));
    }

    #[test]
    fn test_json_round_trip() {
        let mut scene = Scene::new();
        scene.add_shape(Ellipse::centered(Point::new(40.0, 30.0), 20.0, 10.0));
        scene.add_shape(Group::new(
            GroupKind::PathGroup,
            ObjectBase::default(),
            vec![disc(1.0, 1.0, 1.0).into()],
        ));

        let json = scene.to_json().unwrap();
        assert!(json.contains("\"version\""));
        let back = Scene::from_json(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.shapes()[0].type_name(), "ellipse");
        assert_eq!(back.shapes()[1].type_name(), "path-group");
        let ellipse = back.shapes()[0].as_ellipse().unwrap();
        assert_eq!(ellipse.rx(), 20.0);
        assert_eq!(ellipse.object().left, 20.0);
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(Scene::from_json("[]"), Err(ShapeError::NotAnObject)));
        assert!(matches!(Scene::from_json("{"), Err(ShapeError::Json(_))));
        assert!(matches!(
            Scene::from_json(r#"{"objects": [{"type": "hexagon"}]}"#),
            Err(ShapeError::UnknownType(_))
        ));
        assert!(Scene::from_json("{}").unwrap().is_empty());
    }

    #[test]
    fn test_svg_export() {
        let mut scene = Scene::new();
        scene.add_shape(disc(10.0, 10.0, 5.0));
        let svg = scene.to_svg(&SvgExportOptions::new().with_size(100.0, 50.0));
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.contains("<ellipse"));
        assert!(svg.trim_end().ends_with("</svg>"));

        let reviver = |markup: String| markup.replace("<ellipse", "<ellipse id=\"a\"");
        let revived = scene.to_svg(&SvgExportOptions::new().with_reviver(&reviver));
        assert!(revived.contains("<ellipse id=\"a\""));
    }

    #[test]
    fn test_svg_import_inherits_group_paint() {
        let source = r#"<svg xmlns="http://www.w3.org/2000/svg">
            <defs><ellipse id="template" rx="1" ry="1"/></defs>
            <g fill="red" transform="translate(10 0)">
                <ellipse cx="0" cy="0" rx="4" ry="2"/>
                <rect width="3" height="3"/>
            </g>
            <ellipse cx="50" cy="50" rx="5" ry="5" fill="blue"/>
        </svg>"#;
        let scene = Scene::from_svg(source).unwrap();
        assert_eq!(scene.len(), 2);

        let first = scene.shapes()[0].as_ellipse().unwrap();
        assert_eq!(first.object().fill, Some(SerializableColor::rgb(255, 0, 0)));
        let center = first.object().center_point();
        assert!((center.x - 10.0).abs() < 1e-9);

        let second = scene.shapes()[1].as_ellipse().unwrap();
        assert_eq!(second.object().fill, Some(SerializableColor::rgb(0, 0, 255)));
    }

    #[test]
    fn test_svg_import_parse_error() {
        assert!(matches!(Scene::from_svg("<svg>"), Err(SvgError::Parse(_))));
    }

    #[test]
    fn test_svg_round_trip() {
        let mut scene = Scene::new();
        scene.add_shape(Ellipse::centered(Point::new(40.0, 30.0), 20.0, 10.0));
        let back = Scene::from_svg(&scene.to_svg(&SvgExportOptions::new())).unwrap();
        let ellipse = back.shapes()[0].as_ellipse().unwrap();
        assert!((ellipse.object().left - 20.0).abs() < 1e-9);
        assert!((ellipse.object().top - 20.0).abs() < 1e-9);
    }
}
