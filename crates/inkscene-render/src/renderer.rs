//! Renderer trait abstraction.

use inkscene_core::Scene;
use kurbo::{Rect, Size};
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid surface size: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Context for a single render pass.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// The scene to render.
    pub scene: &'a Scene,
    /// Viewport size in logical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Background color.
    pub background_color: Color,
    /// Selection highlight color.
    pub selection_color: Color,
    /// Selection rectangle (marquee) in scene coordinates.
    pub selection_rect: Option<Rect>,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(scene: &'a Scene, viewport_size: Size) -> Self {
        Self {
            scene,
            viewport_size,
            scale_factor: 1.0,
            background_color: Color::from_rgba8(250, 250, 250, 255),
            selection_color: Color::from_rgba8(59, 130, 246, 255), // Blue
            selection_rect: None,
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the selection highlight color.
    pub fn with_selection_color(mut self, color: Color) -> Self {
        self.selection_color = color;
        self
    }

    /// Set the selection rectangle.
    pub fn with_selection_rect(mut self, rect: Option<Rect>) -> Self {
        self.selection_rect = rect;
        self
    }

    /// Output size in device pixels, rounded up.
    pub fn device_size(&self) -> (u32, u32) {
        let width = (self.viewport_size.width * self.scale_factor).ceil().max(0.0);
        let height = (self.viewport_size.height * self.scale_factor).ceil().max(0.0);
        (width as u32, height as u32)
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// What a finished frame produces.
    type Output;

    /// Render one frame of `ctx`.
    fn render(&mut self, ctx: &RenderContext<'_>) -> RenderResult<Self::Output>;

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext<'_>) -> Color {
        ctx.background_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let scene = Scene::new();
        let ctx = RenderContext::new(&scene, Size::new(100.0, 50.0));
        assert_eq!(ctx.scale_factor, 1.0);
        assert!(ctx.selection_rect.is_none());
        assert_eq!(ctx.device_size(), (100, 50));
    }

    #[test]
    fn test_device_size_scales_up() {
        let scene = Scene::new();
        let ctx = RenderContext::new(&scene, Size::new(100.5, 50.0)).with_scale_factor(2.0);
        assert_eq!(ctx.device_size(), (201, 100));
    }
}
