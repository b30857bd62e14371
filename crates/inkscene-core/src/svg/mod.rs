//! SVG import and export helpers.

mod attributes;

pub use attributes::{parse_attributes, parse_transform, ParsedAttributes};

use crate::shapes::SvgReviver;
use kurbo::{Affine, Rect};
use thiserror::Error;

/// Presentation attributes every shape reads from its element.
pub const SHARED_ATTRIBUTES: &[&str] = &[
    "display",
    "transform",
    "fill",
    "fill-opacity",
    "opacity",
    "stroke",
    "stroke-dasharray",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-opacity",
    "stroke-width",
    "visibility",
];

/// SVG namespace written on exported documents.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Errors that can occur while importing SVG.
#[derive(Debug, Error)]
pub enum SvgError {
    #[error("XML parse error: {0}")]
    Parse(#[from] roxmltree::Error),
    #[error("missing <{0}> element")]
    MissingElement(&'static str),
    #[error("expected <{expected}>, found <{found}>")]
    UnexpectedElement { expected: &'static str, found: String },
}

/// Format a number for SVG output: shortest exact form, no negative zero.
pub fn fmt_number(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// `matrix(a b c d e f)` text for a transform.
pub fn svg_matrix(matrix: Affine) -> String {
    let coeffs: Vec<String> = matrix.as_coeffs().iter().map(|v| fmt_number(*v)).collect();
    format!("matrix({})", coeffs.join(" "))
}

/// Document-level settings for SVG export.
#[derive(Clone, Copy, Default)]
pub struct SvgExportOptions<'a> {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub view_box: Option<Rect>,
    /// Applied to each top-level shape's markup.
    pub reviver: Option<SvgReviver<'a>>,
}

impl<'a> SvgExportOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_view_box(mut self, view_box: Rect) -> Self {
        self.view_box = Some(view_box);
        self
    }

    pub fn with_reviver(mut self, reviver: SvgReviver<'a>) -> Self {
        self.reviver = Some(reviver);
        self
    }

    /// Opening `<svg>` tag for these options.
    pub(crate) fn open_tag(&self) -> String {
        let mut tag = format!("<svg xmlns=\"{SVG_NAMESPACE}\" version=\"1.1\"");
        if let Some(width) = self.width {
            tag.push_str(&format!(" width=\"{}\"", fmt_number(width)));
        }
        if let Some(height) = self.height {
            tag.push_str(&format!(" height=\"{}\"", fmt_number(height)));
        }
        if let Some(view_box) = self.view_box {
            tag.push_str(&format!(
                " viewBox=\"{} {} {} {}\"",
                fmt_number(view_box.x0),
                fmt_number(view_box.y0),
                fmt_number(view_box.width()),
                fmt_number(view_box.height())
            ));
        }
        tag.push('>');
        tag
    }
}
