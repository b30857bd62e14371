//! `<ellipse>` element import and export.

use super::{Ellipse, EllipseOptions};
use crate::shapes::{Group, GroupKind, Property, SvgReviver};
use crate::svg::{fmt_number, parse_attributes, svg_matrix, SvgError, SHARED_ATTRIBUTES};
use std::fmt::Write;
use std::sync::LazyLock;

/// Attributes read from an `<ellipse>` element.
pub static ATTRIBUTE_NAMES: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    SHARED_ATTRIBUTES
        .iter()
        .copied()
        .chain(["cx", "cy", "rx", "ry"])
        .collect()
});

impl Ellipse {
    /// SVG markup for the ellipse, preceded by its shadow filter if it has one.
    ///
    /// Inside a path-group the element is positioned with `cx`/`cy` and only the
    /// raw transform matrix is emitted; elsewhere the element sits at the origin
    /// and carries the full placement matrix.
    pub fn to_svg(&self, group: Option<&Group>, reviver: Option<SvgReviver<'_>>) -> String {
        let object = &self.object;
        let filter_id = format!("SVGID_{}", self.id.simple());
        let mut markup = object.create_base_svg_markup(&filter_id);

        let in_path_group = group.is_some_and(|g| g.kind() == GroupKind::PathGroup);
        let (cx, cy, matrix) = if in_path_group {
            (object.left + self.rx, object.top + self.ry, object.transform_matrix)
        } else {
            (0.0, 0.0, Some(object.calc_own_matrix()))
        };
        let transform = matrix
            .map(|m| format!(" transform=\"{}\"", svg_matrix(m)))
            .unwrap_or_default();
        let filter = object.shadow.is_some().then_some(filter_id.as_str());

        let _ = writeln!(
            markup,
            "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" style=\"{}\"{}/>",
            fmt_number(cx),
            fmt_number(cy),
            fmt_number(self.rx),
            fmt_number(self.ry),
            object.svg_styles(filter),
            transform,
        );

        match reviver {
            Some(reviver) => reviver(markup),
            None => markup,
        }
    }

    /// Build an ellipse from an `<ellipse>` element.
    ///
    /// `cx`/`cy` become `left`/`top` (0 when absent), `overrides` are applied,
    /// and the position is then shifted by the radii so `left`/`top` name the
    /// corner of the bounding box. Transforms on the element and its ancestors
    /// are baked into placement.
    pub fn from_element(
        node: roxmltree::Node<'_, '_>,
        overrides: &[Property],
    ) -> Result<Self, SvgError> {
        let tag = node.tag_name().name();
        if tag != "ellipse" {
            return Err(SvgError::UnexpectedElement {
                expected: "ellipse",
                found: tag.to_string(),
            });
        }
        let parsed = parse_attributes(node, &ATTRIBUTE_NAMES);
        let mut object = parsed.to_object_base();
        object.left = parsed.number("cx").unwrap_or(0.0);
        object.top = parsed.number("cy").unwrap_or(0.0);

        let mut ellipse = Ellipse::new(EllipseOptions {
            rx: parsed.number("rx").unwrap_or(0.0),
            ry: parsed.number("ry").unwrap_or(0.0),
            object,
            ..Default::default()
        });
        for property in overrides {
            ellipse.set(property.clone());
        }

        let (rx, ry) = (ellipse.rx, ellipse.ry);
        ellipse.object.top -= ry;
        ellipse.object.left -= rx;

        if let Some(transform) = parsed.transform {
            ellipse.object.apply_transform(transform);
        }
        Ok(ellipse)
    }

    /// Parse `source` and build an ellipse from its first `<ellipse>` element.
    pub fn from_svg_str(source: &str) -> Result<Self, SvgError> {
        let document = roxmltree::Document::parse(source)?;
        let node = document
            .descendants()
            .find(|n| n.has_tag_name("ellipse"))
            .ok_or(SvgError::MissingElement("ellipse"))?;
        Self::from_element(node, &[])
    }
}
