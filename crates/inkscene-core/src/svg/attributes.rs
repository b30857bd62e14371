//! Presentation attribute parsing with inheritance from ancestor elements.

use crate::shapes::{ObjectBase, SerializableColor};
use crate::surface::{LineCap, LineJoin};
use kurbo::Affine;
use roxmltree::Node;
use std::collections::BTreeMap;

/// Attributes resolved for one element.
///
/// Paint and stroke properties are inherited from ancestors, transforms are
/// composed from the root down and opacity multiplies. Geometry (anything not
/// a presentation attribute) is read from the element itself only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAttributes {
    /// Numeric geometry attributes such as `cx` or `rx`.
    pub numbers: BTreeMap<String, f64>,
    /// `Some(None)` is an explicit `none`.
    pub fill: Option<Option<SerializableColor>>,
    pub fill_opacity: Option<f64>,
    pub stroke: Option<Option<SerializableColor>>,
    pub stroke_opacity: Option<f64>,
    pub stroke_width: Option<f64>,
    pub stroke_dash_array: Option<Vec<f64>>,
    pub stroke_line_cap: Option<LineCap>,
    pub stroke_line_join: Option<LineJoin>,
    pub stroke_miter_limit: Option<f64>,
    pub opacity: Option<f64>,
    pub visible: Option<bool>,
    pub transform: Option<Affine>,
}

impl ParsedAttributes {
    pub fn number(&self, name: &str) -> Option<f64> {
        self.numbers.get(name).copied()
    }

    /// What a child element starts from.
    fn inherited(mut self) -> Self {
        self.numbers.clear();
        self
    }

    fn apply(&mut self, name: &str, value: &str) {
        let value = value.trim();
        match name {
            "fill" => self.fill = parse_paint(value).or(self.fill),
            "stroke" => self.stroke = parse_paint(value).or(self.stroke),
            "fill-opacity" => self.fill_opacity = parse_number(value).or(self.fill_opacity),
            "stroke-opacity" => self.stroke_opacity = parse_number(value).or(self.stroke_opacity),
            "stroke-width" => self.stroke_width = parse_number(value).or(self.stroke_width),
            "stroke-miterlimit" => {
                self.stroke_miter_limit = parse_number(value).or(self.stroke_miter_limit)
            }
            "stroke-dasharray" => {
                self.stroke_dash_array = if value == "none" {
                    None
                } else {
                    Some(parse_number_list(value))
                }
            }
            "stroke-linecap" => {
                self.stroke_line_cap = LineCap::parse(value).or(self.stroke_line_cap)
            }
            "stroke-linejoin" => {
                self.stroke_line_join = LineJoin::parse(value).or(self.stroke_line_join)
            }
            "opacity" => {
                if let Some(opacity) = parse_number(value) {
                    self.opacity = Some(self.opacity.unwrap_or(1.0) * opacity.clamp(0.0, 1.0));
                }
            }
            "visibility" => match value {
                "hidden" | "collapse" => self.visible = Some(false),
                "visible" => self.visible = Some(true),
                _ => {}
            },
            "display" => {
                if value == "none" {
                    self.visible = Some(false);
                }
            }
            "transform" => match parse_transform(value) {
                Some(transform) => {
                    self.transform = Some(self.transform.unwrap_or(Affine::IDENTITY) * transform)
                }
                None => log::debug!("ignoring malformed transform {value:?}"),
            },
            _ => {
                if let Some(number) = parse_number(value) {
                    self.numbers.insert(name.to_string(), number);
                }
            }
        }
    }

    /// Base state described by these attributes. An unspecified fill paints
    /// black; an unspecified stroke paints nothing.
    pub fn to_object_base(&self) -> ObjectBase {
        let fill = match self.fill {
            Some(color) => color,
            None => Some(SerializableColor::black()),
        };
        let stroke = self.stroke.flatten();
        let defaults = ObjectBase::default();
        ObjectBase {
            fill: fill.map(|c| c.with_alpha_factor(self.fill_opacity.unwrap_or(1.0))),
            stroke: stroke.map(|c| c.with_alpha_factor(self.stroke_opacity.unwrap_or(1.0))),
            stroke_width: self.stroke_width.unwrap_or(defaults.stroke_width),
            stroke_dash_array: self.stroke_dash_array.clone().filter(|dash| !dash.is_empty()),
            stroke_line_cap: self.stroke_line_cap.unwrap_or(defaults.stroke_line_cap),
            stroke_line_join: self.stroke_line_join.unwrap_or(defaults.stroke_line_join),
            stroke_miter_limit: self.stroke_miter_limit.unwrap_or(defaults.stroke_miter_limit),
            opacity: self.opacity.unwrap_or(1.0),
            visible: self.visible.unwrap_or(true),
            ..defaults
        }
    }
}

/// Resolve the attributes named in `allowed` for `node`, including those
/// inherited from its ancestors. `style` declarations win over attributes.
pub fn parse_attributes(node: Node<'_, '_>, allowed: &[&str]) -> ParsedAttributes {
    let mut parsed = match node.parent_element() {
        Some(parent) => parse_attributes(parent, allowed).inherited(),
        None => ParsedAttributes::default(),
    };

    let mut declarations: BTreeMap<String, String> = node
        .attributes()
        .filter(|a| allowed.contains(&a.name()))
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect();
    if let Some(style) = node.attribute("style") {
        for declaration in style.split(';') {
            if let Some((name, value)) = declaration.split_once(':') {
                let name = name.trim();
                if allowed.contains(&name) {
                    declarations.insert(name.to_string(), value.trim().to_string());
                }
            }
        }
    }

    for (name, value) in &declarations {
        parsed.apply(name, value);
    }
    parsed
}

fn parse_paint(value: &str) -> Option<Option<SerializableColor>> {
    if value == "none" {
        return Some(None);
    }
    match SerializableColor::parse(value) {
        Some(color) => Some(Some(color)),
        None => {
            log::debug!("unsupported paint {value:?}");
            None
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    let value = value.strip_suffix("px").unwrap_or(value);
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_number_list(value: &str) -> Vec<f64> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(parse_number)
        .collect()
}

/// Parse an SVG transform list into a single matrix.
///
/// Returns `None` if any function is unknown or has the wrong arity.
pub fn parse_transform(value: &str) -> Option<Affine> {
    let mut result = Affine::IDENTITY;
    let mut rest = value.trim();
    while !rest.is_empty() {
        let open = rest.find('(')?;
        let close = rest.find(')')?;
        if close < open {
            return None;
        }
        let name = rest[..open].trim().trim_start_matches(',').trim();
        let args = parse_number_list(&rest[open + 1..close]);
        result *= transform_function(name, &args)?;
        rest = rest[close + 1..].trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    }
    Some(result)
}

fn transform_function(name: &str, args: &[f64]) -> Option<Affine> {
    let affine = match (name, args) {
        ("matrix", [a, b, c, d, e, f]) => Affine::new([*a, *b, *c, *d, *e, *f]),
        ("translate", [x]) => Affine::translate((*x, 0.0)),
        ("translate", [x, y]) => Affine::translate((*x, *y)),
        ("scale", [s]) => Affine::scale(*s),
        ("scale", [x, y]) => Affine::scale_non_uniform(*x, *y),
        ("rotate", [angle]) => Affine::rotate(angle.to_radians()),
        ("rotate", [angle, cx, cy]) => {
            Affine::translate((*cx, *cy))
                * Affine::rotate(angle.to_radians())
                * Affine::translate((-cx, -cy))
        }
        ("skewX", [angle]) => Affine::skew(angle.to_radians().tan(), 0.0),
        ("skewY", [angle]) => Affine::skew(0.0, angle.to_radians().tan()),
        _ => return None,
    };
    Some(affine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svg::SHARED_ATTRIBUTES;
    use kurbo::Point;

    fn parse(source: &str, tag: &str) -> ParsedAttributes {
        let document = roxmltree::Document::parse(source).unwrap();
        let node = document.descendants().find(|n| n.has_tag_name(tag)).unwrap();
        let mut allowed = SHARED_ATTRIBUTES.to_vec();
        allowed.extend(["cx", "cy", "rx", "ry"]);
        parse_attributes(node, &allowed)
    }

    #[test]
    fn test_style_overrides_attribute() {
        let parsed = parse(
            r#"<svg><ellipse fill="red" style="fill: #00ff00; stroke-width: 3px" rx="4"/></svg>"#,
            "ellipse",
        );
        assert_eq!(parsed.fill, Some(Some(SerializableColor::rgb(0, 255, 0))));
        assert_eq!(parsed.stroke_width, Some(3.0));
        assert_eq!(parsed.number("rx"), Some(4.0));
    }

    #[test]
    fn test_inherits_paint_from_group() {
        let parsed = parse(
            r#"<svg><g stroke="blue" opacity="0.5" rx="99"><ellipse opacity="0.5"/></g></svg>"#,
            "ellipse",
        );
        assert_eq!(parsed.stroke, Some(Some(SerializableColor::rgb(0, 0, 255))));
        assert_eq!(parsed.opacity, Some(0.25));
        // Geometry is never inherited.
        assert_eq!(parsed.number("rx"), None);
    }

    #[test]
    fn test_disallowed_attributes_are_ignored() {
        let parsed = parse(r#"<svg><ellipse x="4" fill="none"/></svg>"#, "ellipse");
        assert!(parsed.numbers.is_empty());
        assert_eq!(parsed.fill, Some(None));
        assert!(parsed.to_object_base().fill.is_none());
    }

    #[test]
    fn test_hidden_elements() {
        let parsed = parse(r#"<svg><g display="none"><ellipse/></g></svg>"#, "ellipse");
        assert_eq!(parsed.visible, Some(false));
        let parsed = parse(r#"<svg><ellipse style="visibility: hidden"/></svg>"#, "ellipse");
        assert!(!parsed.to_object_base().visible);
    }

    #[test]
    fn test_fill_opacity_folds_into_color() {
        let source = r##"<svg><ellipse fill="#ff0000" fill-opacity="0.5"/></svg>"##;
        let parsed = parse(source, "ellipse");
        let fill = parsed.to_object_base().fill.unwrap();
        assert_eq!(fill.a, 128);
    }

    #[test]
    fn test_transforms_compose_from_root() {
        let parsed = parse(
            r#"<svg><g transform="translate(10, 20)"><ellipse transform="scale(2)"/></g></svg>"#,
            "ellipse",
        );
        let transform = parsed.transform.unwrap();
        let p = transform * Point::new(1.0, 1.0);
        assert!((p.x - 12.0).abs() < 1e-12);
        assert!((p.y - 22.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_transform_list() {
        let t = parse_transform("translate(5) rotate(90)").unwrap();
        let p = t * Point::new(1.0, 0.0);
        assert!((p.x - 5.0).abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);

        let m = parse_transform("matrix(1,0,0,1,3,4)").unwrap();
        assert_eq!(m, Affine::translate((3.0, 4.0)));

        let around = parse_transform("rotate(180 10 10)").unwrap();
        let p = around * Point::new(0.0, 0.0);
        assert!((p.x - 20.0).abs() < 1e-9);
        assert!((p.y - 20.0).abs() < 1e-9);

        assert!(parse_transform("wobble(3)").is_none());
        assert!(parse_transform("scale(1 2 3)").is_none());
    }

    #[test]
    fn test_parse_number_list() {
        assert_eq!(parse_number_list("5, 3 2"), vec![5.0, 3.0, 2.0]);
    }
}
