//! In-memory recording surface.

use super::{append_arc, CompositeOperation, LineStyle, ShadowStyle, Surface};
use kurbo::{Affine, BezPath, Point};
use peniko::Color;

/// A single call made against a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    Save,
    Restore,
    SetTransform(Affine),
    Transform(Affine),
    BeginPath,
    Arc {
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
    },
    /// Fill of the device-space path.
    Fill {
        path: BezPath,
        color: Color,
        alpha: f64,
        composite: CompositeOperation,
    },
    /// Stroke of the device-space path under `transform`.
    Stroke {
        path: BezPath,
        color: Color,
        alpha: f64,
        style: LineStyle,
        transform: Affine,
    },
    Clip(BezPath),
    SetCompositeOperation(CompositeOperation),
    SetGlobalAlpha(f64),
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineStyle(LineStyle),
    SetShadow(Option<ShadowStyle>),
}

#[derive(Debug, Clone)]
struct RecordedState {
    transform: Affine,
    composite: CompositeOperation,
    alpha: f64,
    fill: Color,
    stroke: Color,
    line: LineStyle,
}

impl Default for RecordedState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            composite: CompositeOperation::SourceOver,
            alpha: 1.0,
            fill: Color::BLACK,
            stroke: Color::BLACK,
            line: LineStyle::default(),
        }
    }
}

/// Surface that records every call and tracks canvas state without drawing.
///
/// Useful for testing render pipelines and for replaying draw calls later.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    commands: Vec<SurfaceCommand>,
    state: RecordedState,
    stack: Vec<RecordedState>,
    path: BezPath,
}

impl RecordingSurface {
    /// Create a new empty recording surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded commands, in call order.
    pub fn commands(&self) -> &[SurfaceCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the state stack intact.
    pub fn take_commands(&mut self) -> Vec<SurfaceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Whether nothing at all has been called on this surface.
    pub fn is_untouched(&self) -> bool {
        self.commands.is_empty()
    }

    /// Current save-stack depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The current device-space path.
    pub fn current_path(&self) -> &BezPath {
        &self.path
    }

    /// Fill commands recorded so far.
    pub fn fills(&self) -> impl Iterator<Item = &SurfaceCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::Fill { .. }))
    }

    /// Stroke commands recorded so far.
    pub fn strokes(&self) -> impl Iterator<Item = &SurfaceCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::Stroke { .. }))
    }
}

impl Surface for RecordingSurface {
    fn save(&mut self) {
        self.commands.push(SurfaceCommand::Save);
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        self.commands.push(SurfaceCommand::Restore);
        match self.stack.pop() {
            Some(state) => self.state = state,
            None => log::warn!("restore called on an empty save stack"),
        }
    }

    fn current_transform(&self) -> Affine {
        self.state.transform
    }

    fn set_transform(&mut self, affine: Affine) {
        self.commands.push(SurfaceCommand::SetTransform(affine));
        self.state.transform = affine;
    }

    fn transform(&mut self, affine: Affine) {
        self.commands.push(SurfaceCommand::Transform(affine));
        self.state.transform *= affine;
    }

    fn begin_path(&mut self) {
        self.commands.push(SurfaceCommand::BeginPath);
        self.path = BezPath::new();
    }

    fn arc(
        &mut self,
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
    ) {
        self.commands.push(SurfaceCommand::Arc {
            center,
            radius,
            start_angle,
            end_angle,
            anticlockwise,
        });
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
        self.commands.push(SurfaceCommand::Fill {
            path: self.path.clone(),
            color: self.state.fill,
            alpha: self.state.alpha,
            composite: self.state.composite,
        });
    }

    fn stroke(&mut self) {
        self.commands.push(SurfaceCommand::Stroke {
            path: self.path.clone(),
            color: self.state.stroke,
            alpha: self.state.alpha,
            style: self.state.line.clone(),
            transform: self.state.transform,
        });
    }

    fn clip(&mut self, path: &BezPath) {
        let mut device = path.clone();
        device.apply_affine(self.state.transform);
        self.commands.push(SurfaceCommand::Clip(device));
    }

    fn global_composite_operation(&self) -> CompositeOperation {
        self.state.composite
    }

    fn set_global_composite_operation(&mut self, op: CompositeOperation) {
        self.commands.push(SurfaceCommand::SetCompositeOperation(op));
        self.state.composite = op;
    }

    fn global_alpha(&self) -> f64 {
        self.state.alpha
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.commands.push(SurfaceCommand::SetGlobalAlpha(alpha));
        self.state.alpha = alpha;
    }

    fn set_fill_color(&mut self, color: Color) {
        self.commands.push(SurfaceCommand::SetFillColor(color));
        self.state.fill = color;
    }

    fn set_stroke_color(&mut self, color: Color) {
        self.commands.push(SurfaceCommand::SetStrokeColor(color));
        self.state.stroke = color;
    }

    fn set_line_style(&mut self, style: &LineStyle) {
        self.commands.push(SurfaceCommand::SetLineStyle(style.clone()));
        self.state.line = style.clone();
    }

    fn set_shadow(&mut self, shadow: Option<ShadowStyle>) {
        self.commands.push(SurfaceCommand::SetShadow(shadow));
    }
}
