//! InkScene Render Library
//!
//! Renderer abstraction and a CPU raster implementation for InkScene scenes.
//! The default implementation draws into a tiny-skia pixmap and can encode
//! the result as PNG (`png` feature).

mod pixmap;
mod renderer;

#[cfg(feature = "png")]
pub use pixmap::encode_png;
pub use pixmap::{PixmapRenderer, PixmapSurface};
pub use renderer::{RenderContext, RenderResult, Renderer, RendererError};
pub use tiny_skia::Pixmap;
