//! Paint colors and their CSS text form.

use peniko::color::{parse_color, Srgb};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serializable color representation (RGBA8).
///
/// Serializes as a CSS color string (`rgb(r,g,b)` or `rgba(r,g,b,a)`), which is
/// also the form written into SVG `style` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Alpha as a fraction in `0.0..=1.0`.
    pub fn alpha(&self) -> f64 {
        self.a as f64 / 255.0
    }

    /// Copy of this color with its alpha multiplied by `factor`.
    pub fn with_alpha_factor(self, factor: f64) -> Self {
        let a = (self.a as f64 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    /// CSS `rgb(...)` text, ignoring alpha.
    pub fn to_rgb_string(&self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }

    /// Parse a CSS color.
    ///
    /// Accepts the CSS Color 4 syntaxes (hex, `rgb()`, `rgba()`, `hsl()` and
    /// the full named-color table). Returns `None` for anything else,
    /// including `none`.
    pub fn parse(input: &str) -> Option<Self> {
        let css = input.trim().to_ascii_lowercase();
        let parsed = parse_color(&css).ok()?;
        Some(parsed.to_alpha_color::<Srgb>().into())
    }
}

impl fmt::Display for SerializableColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "rgb({},{},{})", self.r, self.g, self.b)
        } else {
            // Three decimals keep the 8-bit alpha exact when parsed back.
            let alpha = (self.alpha() * 1000.0).round() / 1000.0;
            write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, alpha)
        }
    }
}

impl From<SerializableColor> for String {
    fn from(color: SerializableColor) -> Self {
        color.to_string()
    }
}

impl TryFrom<String> for SerializableColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}
