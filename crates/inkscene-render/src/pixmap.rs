//! CPU raster backend built on tiny-skia.

use crate::renderer::{RenderContext, RenderResult, Renderer, RendererError};
use inkscene_core::surface::{
    append_arc, path_in_transform_space, CompositeOperation, LineCap, LineJoin, LineStyle,
    ShadowStyle, Surface,
};
use kurbo::{Affine, BezPath, PathEl, Point, Rect};
use peniko::Color;
use tiny_skia::{
    BlendMode, ColorU8, FillRule, Mask, Paint, PathBuilder, Pixmap, Stroke, StrokeDash, Transform,
};

/// Graphics state covered by save/restore.
#[derive(Debug, Clone)]
struct SurfaceState {
    transform: Affine,
    fill: Color,
    stroke: Color,
    line: LineStyle,
    alpha: f64,
    composite: CompositeOperation,
    shadow: Option<ShadowStyle>,
    clip: Option<Mask>,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            fill: Color::BLACK,
            stroke: Color::BLACK,
            line: LineStyle::default(),
            alpha: 1.0,
            composite: CompositeOperation::SourceOver,
            shadow: None,
            clip: None,
        }
    }
}

/// A [`Surface`] drawing into a tiny-skia pixmap.
///
/// The current path is kept in device space, so fills ignore the transform
/// current at fill time while strokes are sized by it.
pub struct PixmapSurface {
    pixmap: Pixmap,
    state: SurfaceState,
    state_stack: Vec<SurfaceState>,
    path: BezPath,
}

impl PixmapSurface {
    /// Create a transparent surface.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let pixmap =
            Pixmap::new(width, height).ok_or(RendererError::InvalidSize { width, height })?;
        Ok(Self {
            pixmap,
            state: SurfaceState::default(),
            state_stack: Vec::new(),
            path: BezPath::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Current save-stack depth.
    pub fn state_depth(&self) -> usize {
        self.state_stack.len()
    }

    /// Fill every pixel with `color`, ignoring all graphics state.
    pub fn clear(&mut self, color: Color) {
        self.pixmap.fill(to_skia_color(color, 1.0).unwrap_or(tiny_skia::Color::TRANSPARENT));
    }

    /// Unpremultiplied color of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<ColorU8> {
        self.pixmap.pixel(x, y).map(|p| p.demultiply())
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    /// Fill `rect`, given in current-transform space.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(path) = rect_path(rect) else {
            return;
        };
        if let Some(paint) = self.paint(color) {
            let transform = to_skia_transform(self.state.transform);
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, transform, self.state.clip.as_ref());
        }
    }

    /// Outline `rect`, given in current-transform space.
    pub fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64) {
        let Some(path) = rect_path(rect) else {
            return;
        };
        if let Some(paint) = self.paint(color) {
            let stroke = Stroke {
                width: width as f32,
                ..Stroke::default()
            };
            let transform = to_skia_transform(self.state.transform);
            self.pixmap
                .stroke_path(&path, &paint, &stroke, transform, self.state.clip.as_ref());
        }
    }

    fn paint(&self, color: Color) -> Option<Paint<'static>> {
        let mut paint = Paint::default();
        paint.set_color(to_skia_color(color, self.state.alpha)?);
        paint.anti_alias = true;
        paint.blend_mode = blend_mode(self.state.composite);
        Some(paint)
    }

    /// Shadow paint and device offset, if the current shadow would show.
    fn shadow(&self) -> Option<(Paint<'static>, Transform)> {
        let shadow = self.state.shadow?;
        let visible = shadow.color.components[3] > 0.0
            && (shadow.blur > 0.0 || shadow.offset.x != 0.0 || shadow.offset.y != 0.0);
        if !visible {
            return None;
        }
        let paint = self.paint(shadow.color)?;
        Some((paint, Transform::from_translate(shadow.offset.x as f32, shadow.offset.y as f32)))
    }
}

impl Surface for PixmapSurface {
    fn save(&mut self) {
        self.state_stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        match self.state_stack.pop() {
            Some(state) => self.state = state,
            None => log::warn!("restore called without a matching save"),
        }
    }

    fn current_transform(&self) -> Affine {
        self.state.transform
    }

    fn set_transform(&mut self, affine: Affine) {
        self.state.transform = affine;
    }

    fn transform(&mut self, affine: Affine) {
        self.state.transform *= affine;
    }

    fn begin_path(&mut self) {
        self.path.truncate(0);
    }

    fn arc(
        &mut self,
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
    ) {
        append_arc(
            &mut self.path,
            self.state.transform,
            center,
            radius,
            start_angle,
            end_angle,
            anticlockwise,
        );
    }

    fn fill(&mut self) {
        let Some(path) = to_skia_path(&self.path) else {
            return;
        };
        if let Some((paint, offset)) = self.shadow() {
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, offset, self.state.clip.as_ref());
        }
        if let Some(paint) = self.paint(self.state.fill) {
            self.pixmap.fill_path(
                &path,
                &paint,
                FillRule::Winding,
                Transform::identity(),
                self.state.clip.as_ref(),
            );
        }
    }

    fn stroke(&mut self) {
        if self.state.line.width <= 0.0 || !self.state.line.width.is_finite() {
            return;
        }
        let ctm = self.state.transform;
        let Some(local) = path_in_transform_space(&self.path, ctm) else {
            log::debug!("skipping stroke: transform is singular");
            return;
        };
        let Some(path) = to_skia_path(&local) else {
            return;
        };
        let stroke = to_skia_stroke(&self.state.line);
        let transform = to_skia_transform(ctm);
        if let Some((paint, offset)) = self.shadow() {
            self.pixmap.stroke_path(
                &path,
                &paint,
                &stroke,
                transform.post_concat(offset),
                self.state.clip.as_ref(),
            );
        }
        if let Some(paint) = self.paint(self.state.stroke) {
            self.pixmap
                .stroke_path(&path, &paint, &stroke, transform, self.state.clip.as_ref());
        }
    }

    fn clip(&mut self, path: &BezPath) {
        let mut device = path.clone();
        device.apply_affine(self.state.transform);
        let (width, height) = (self.pixmap.width(), self.pixmap.height());
        let Some(path) = to_skia_path(&device) else {
            // An empty clip region hides everything.
            self.state.clip = Mask::new(width, height);
            return;
        };
        match self.state.clip.as_mut() {
            Some(mask) => {
                mask.intersect_path(&path, FillRule::Winding, true, Transform::identity())
            }
            None => {
                if let Some(mut mask) = Mask::new(width, height) {
                    mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
                    self.state.clip = Some(mask);
                }
            }
        }
    }

    fn global_composite_operation(&self) -> CompositeOperation {
        self.state.composite
    }

    fn set_global_composite_operation(&mut self, op: CompositeOperation) {
        self.state.composite = op;
    }

    fn global_alpha(&self) -> f64 {
        self.state.alpha
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        if (0.0..=1.0).contains(&alpha) {
            self.state.alpha = alpha;
        }
    }

    fn set_fill_color(&mut self, color: Color) {
        self.state.fill = color;
    }

    fn set_stroke_color(&mut self, color: Color) {
        self.state.stroke = color;
    }

    fn set_line_style(&mut self, style: &LineStyle) {
        self.state.line = style.clone();
    }

    fn set_shadow(&mut self, shadow: Option<ShadowStyle>) {
        self.state.shadow = shadow;
    }
}

/// Renders scenes into pixmaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixmapRenderer;

impl PixmapRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render `ctx` and encode the result as PNG.
    #[cfg(feature = "png")]
    pub fn render_png(&mut self, ctx: &RenderContext<'_>) -> RenderResult<Vec<u8>> {
        let pixmap = self.render(ctx)?;
        encode_png(&pixmap)
    }

    /// Draw the marquee and outline the shapes it selects.
    fn render_selection(&self, surface: &mut PixmapSurface, ctx: &RenderContext<'_>, rect: Rect) {
        let selected = ctx.scene.shapes_in_rect(rect);
        let fill = ctx.selection_color.multiply_alpha(0.1);
        surface.fill_rect(rect, fill);
        surface.stroke_rect(rect, ctx.selection_color, 1.0);
        for shape in ctx.scene.shapes().iter().filter(|s| selected.contains(&s.id())) {
            surface.stroke_rect(shape.bounds(), ctx.selection_color, 2.0);
        }
    }
}

impl Renderer for PixmapRenderer {
    type Output = Pixmap;

    fn render(&mut self, ctx: &RenderContext<'_>) -> RenderResult<Pixmap> {
        let (width, height) = ctx.device_size();
        let mut surface = PixmapSurface::new(width, height)?;
        surface.clear(self.background_color(ctx));
        surface.set_transform(Affine::scale(ctx.scale_factor));
        ctx.scene.render(&mut surface);
        if let Some(rect) = ctx.selection_rect {
            self.render_selection(&mut surface, ctx, rect);
        }
        if surface.state_depth() != 0 {
            log::warn!("render finished with {} unbalanced saves", surface.state_depth());
        }
        log::debug!("rendered {} shapes into {width}x{height} pixmap", ctx.scene.len());
        Ok(surface.into_pixmap())
    }
}

/// Encode a pixmap as PNG.
#[cfg(feature = "png")]
pub fn encode_png(pixmap: &Pixmap) -> RenderResult<Vec<u8>> {
    pixmap
        .encode_png()
        .map_err(|e| RendererError::Encode(e.to_string()))
}

fn to_skia_color(color: Color, alpha: f64) -> Option<tiny_skia::Color> {
    let [r, g, b, a] = color.components;
    let a = (f64::from(a) * alpha).clamp(0.0, 1.0) as f32;
    tiny_skia::Color::from_rgba(r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0), a)
}

fn to_skia_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(p1, p2) => {
                builder.quad_to(p1.x as f32, p1.y as f32, p2.x as f32, p2.y as f32)
            }
            PathEl::CurveTo(p1, p2, p3) => builder.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn rect_path(rect: Rect) -> Option<tiny_skia::Path> {
    let rect =
        tiny_skia::Rect::from_ltrb(rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32)?;
    Some(PathBuilder::from_rect(rect))
}

fn to_skia_stroke(style: &LineStyle) -> Stroke {
    let mut dash: Vec<f32> = style.dash.iter().map(|d| *d as f32).collect();
    // Odd dash lists repeat to form an even pattern.
    if dash.len() % 2 == 1 {
        dash.extend_from_within(..);
    }
    Stroke {
        width: style.width as f32,
        miter_limit: style.miter_limit as f32,
        line_cap: match style.cap {
            LineCap::Butt => tiny_skia::LineCap::Butt,
            LineCap::Round => tiny_skia::LineCap::Round,
            LineCap::Square => tiny_skia::LineCap::Square,
        },
        line_join: match style.join {
            LineJoin::Miter => tiny_skia::LineJoin::Miter,
            LineJoin::Round => tiny_skia::LineJoin::Round,
            LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
        },
        dash: if dash.is_empty() { None } else { StrokeDash::new(dash, 0.0) },
    }
}

fn blend_mode(op: CompositeOperation) -> BlendMode {
    match op {
        CompositeOperation::SourceOver => BlendMode::SourceOver,
        CompositeOperation::SourceIn => BlendMode::SourceIn,
        CompositeOperation::SourceOut => BlendMode::SourceOut,
        CompositeOperation::SourceAtop => BlendMode::SourceAtop,
        CompositeOperation::DestinationOver => BlendMode::DestinationOver,
        CompositeOperation::DestinationIn => BlendMode::DestinationIn,
        CompositeOperation::DestinationOut => BlendMode::DestinationOut,
        CompositeOperation::DestinationAtop => BlendMode::DestinationAtop,
        CompositeOperation::Lighter => BlendMode::Plus,
        CompositeOperation::Copy => BlendMode::Source,
        CompositeOperation::Xor => BlendMode::Xor,
        CompositeOperation::Multiply => BlendMode::Multiply,
        CompositeOperation::Screen => BlendMode::Screen,
        CompositeOperation::Overlay => BlendMode::Overlay,
        CompositeOperation::Darken => BlendMode::Darken,
        CompositeOperation::Lighten => BlendMode::Lighten,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkscene_core::{Ellipse, Property, Scene, SerializableColor};
    use kurbo::{Shape as _, Size, Vec2};
    use std::f64::consts::TAU;

    fn red() -> Color {
        Color::from_rgba8(255, 0, 0, 255)
    }

    fn white_surface(size: u32) -> PixmapSurface {
        let mut surface = PixmapSurface::new(size, size).unwrap();
        surface.clear(Color::WHITE);
        surface
    }

    fn assert_rgb(surface: &PixmapSurface, x: u32, y: u32, expected: (u8, u8, u8)) {
        let pixel = surface.pixel(x, y).unwrap();
        let actual = (pixel.red(), pixel.green(), pixel.blue());
        let close = |a: u8, b: u8| a.abs_diff(b) <= 2;
        assert!(
            close(actual.0, expected.0)
                && close(actual.1, expected.1)
                && close(actual.2, expected.2),
            "pixel ({x}, {y}) is {actual:?}, expected {expected:?}"
        );
    }

    fn fill_disc(surface: &mut PixmapSurface, center: Point, radius: f64) {
        surface.begin_path();
        surface.arc(center, radius, 0.0, TAU, false);
        surface.fill();
    }

    #[test]
    fn test_invalid_size() {
        assert!(matches!(
            PixmapSurface::new(0, 10),
            Err(RendererError::InvalidSize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_state_save_restore() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut surface = white_surface(10);
        surface.save();
        surface.set_global_alpha(0.5);
        surface.transform(Affine::translate((3.0, 4.0)));
        surface.set_global_composite_operation(CompositeOperation::Multiply);
        assert_eq!(surface.state_depth(), 1);

        surface.restore();
        assert_eq!(surface.state_depth(), 0);
        assert_eq!(surface.global_alpha(), 1.0);
        assert_eq!(surface.current_transform(), Affine::IDENTITY);
        assert_eq!(surface.global_composite_operation(), CompositeOperation::SourceOver);

        // Unbalanced restore leaves the state alone.
        surface.restore();
        assert_eq!(surface.state_depth(), 0);
    }

    #[test]
    fn test_fill_paints_inside_only() {
        let mut surface = white_surface(40);
        surface.set_fill_color(red());
        fill_disc(&mut surface, Point::new(20.0, 20.0), 10.0);
        assert_rgb(&surface, 20, 20, (255, 0, 0));
        assert_rgb(&surface, 2, 2, (255, 255, 255));
        assert_rgb(&surface, 35, 20, (255, 255, 255));
    }

    #[test]
    fn test_path_uses_transform_at_add_time() {
        let mut surface = white_surface(60);
        surface.set_fill_color(red());
        surface.transform(Affine::translate((30.0, 0.0)));
        surface.begin_path();
        surface.arc(Point::new(10.0, 10.0), 5.0, 0.0, TAU, false);
        surface.set_transform(Affine::IDENTITY);
        surface.fill();
        assert_rgb(&surface, 40, 10, (255, 0, 0));
        assert_rgb(&surface, 10, 10, (255, 255, 255));
    }

    #[test]
    fn test_global_alpha_blends() {
        let mut surface = white_surface(40);
        surface.set_fill_color(red());
        surface.set_global_alpha(0.5);
        fill_disc(&mut surface, Point::new(20.0, 20.0), 10.0);
        let pixel = surface.pixel(20, 20).unwrap();
        assert_eq!(pixel.red(), 255);
        assert!((120..=135).contains(&pixel.green()), "green {}", pixel.green());
    }

    #[test]
    fn test_clip_limits_fill() {
        let mut surface = white_surface(40);
        surface.set_fill_color(red());
        surface.save();
        surface.clip(&Rect::new(0.0, 0.0, 20.0, 40.0).to_path(0.1));
        fill_disc(&mut surface, Point::new(20.0, 20.0), 10.0);
        surface.restore();
        assert_rgb(&surface, 15, 20, (255, 0, 0));
        assert_rgb(&surface, 25, 20, (255, 255, 255));

        // The clip ends with the restore.
        fill_disc(&mut surface, Point::new(20.0, 20.0), 10.0);
        assert_rgb(&surface, 25, 20, (255, 0, 0));
    }

    #[test]
    fn test_shadow_offset_pass() {
        let mut surface = white_surface(60);
        surface.set_fill_color(red());
        surface.set_shadow(Some(ShadowStyle {
            color: Color::BLACK,
            blur: 0.0,
            offset: Vec2::new(30.0, 0.0),
        }));
        fill_disc(&mut surface, Point::new(15.0, 15.0), 8.0);
        assert_rgb(&surface, 15, 15, (255, 0, 0));
        assert_rgb(&surface, 45, 15, (0, 0, 0));
    }

    #[test]
    fn test_destination_out_erases() {
        let mut surface = white_surface(40);
        surface.set_global_composite_operation(CompositeOperation::DestinationOut);
        fill_disc(&mut surface, Point::new(20.0, 20.0), 10.0);
        assert_eq!(surface.pixel(20, 20).unwrap().alpha(), 0);
        assert_eq!(surface.pixel(2, 2).unwrap().alpha(), 255);
    }

    #[test]
    fn test_ellipse_fill_and_stroke() {
        let mut ellipse = Ellipse::centered(Point::new(50.0, 50.0), 20.0, 10.0);
        ellipse.set(Property::Fill(Some(SerializableColor::rgb(255, 0, 0))));
        let mut surface = white_surface(100);
        ellipse.render(&mut surface, &Default::default());
        assert_eq!(surface.state_depth(), 0);
        assert_rgb(&surface, 50, 50, (255, 0, 0));
        assert_rgb(&surface, 65, 50, (255, 0, 0));
        assert_rgb(&surface, 50, 65, (255, 255, 255));

        let mut outline = Ellipse::centered(Point::new(50.0, 50.0), 20.0, 10.0);
        outline.set(Property::Stroke(Some(SerializableColor::black())));
        outline.set(Property::StrokeWidth(4.0));
        let mut surface = white_surface(100);
        outline.render(&mut surface, &Default::default());
        assert_rgb(&surface, 50, 50, (255, 255, 255));
        assert_rgb(&surface, 70, 50, (0, 0, 0));
    }

    #[test]
    fn test_renderer_scales_and_clears() {
        let mut scene = Scene::new();
        let mut ellipse = Ellipse::centered(Point::new(50.0, 50.0), 20.0, 10.0);
        ellipse.set(Property::Fill(Some(SerializableColor::rgb(255, 0, 0))));
        scene.add_shape(ellipse);

        let ctx = RenderContext::new(&scene, Size::new(100.0, 100.0)).with_scale_factor(2.0);
        let pixmap = PixmapRenderer::new().render(&ctx).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (200, 200));

        let center = pixmap.pixel(100, 100).unwrap().demultiply();
        assert_eq!((center.red(), center.green(), center.blue()), (255, 0, 0));
        let corner = pixmap.pixel(2, 2).unwrap().demultiply();
        assert_eq!((corner.red(), corner.green(), corner.blue()), (250, 250, 250));
    }

    #[test]
    fn test_renderer_outlines_selected_shapes() {
        let mut scene = Scene::new();
        let mut ellipse = Ellipse::centered(Point::new(50.0, 50.0), 20.0, 10.0);
        ellipse.set(Property::Fill(Some(SerializableColor::rgb(255, 0, 0))));
        scene.add_shape(ellipse);

        let ctx = RenderContext::new(&scene, Size::new(100.0, 100.0))
            .with_selection_rect(Some(Rect::new(0.0, 0.0, 100.0, 100.0)));
        let mut surface = white_surface(1);
        surface.pixmap = PixmapRenderer::new().render(&ctx).unwrap();

        // Left edge of the ellipse bounds, outside the ellipse itself.
        assert_rgb(&surface, 29, 45, (59, 130, 246));
        // The marquee tint is drawn over the scene.
        assert_rgb(&surface, 50, 50, (235, 13, 25));
        // Outside the marquee the scene is untouched.
        let ctx = ctx.with_selection_rect(Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        surface.pixmap = PixmapRenderer::new().render(&ctx).unwrap();
        assert_rgb(&surface, 50, 50, (255, 0, 0));
    }

    #[cfg(feature = "png")]
    #[test]
    fn test_png_encoding() {
        let scene = Scene::new();
        let ctx = RenderContext::new(&scene, Size::new(8.0, 8.0));
        let png = PixmapRenderer::new().render_png(&ctx).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
