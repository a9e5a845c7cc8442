//! The per-tick effect contract shared by both pipelines.

use crate::ascii_canvas::GlyphCanvas;
use crate::config::{EffectConfig, EffectKind};
use crate::error::EffectResult;
use crate::frame::{FrameBuffer, Viewport};

/// Inputs that stay fixed for the duration of one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub config: &'a EffectConfig,
    /// Clock value sampled once for the whole frame.
    pub time_seconds: f64,
}

/// Which surface an effect produced for the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    /// The frame passed to `apply` was rewritten in place.
    Frame,
    /// A glyph surface to show in place of the render; the frame is untouched.
    Glyphs(GlyphCanvas),
}

/// What the display sink should show for a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectOutput {
    /// No effect ran; show the unmodified render.
    Raw(FrameBuffer),
    /// The captured frame, rewritten in place.
    Frame(FrameBuffer),
    /// A glyph surface shown in place of the render.
    Glyphs(GlyphCanvas),
}

impl EffectOutput {
    pub fn shows_raw_render(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

/// A frame post-processing stage with a two-state lifecycle.
///
/// `enable` and `on_resize` are the only places derived dimensions are
/// computed; `apply` reads them but never recomputes them. `apply` either
/// fails before touching the frame or processes all of it.
pub trait FrameEffect {
    fn kind(&self) -> EffectKind;

    fn is_enabled(&self) -> bool;

    fn enable(&mut self, viewport: Viewport, config: &EffectConfig) -> EffectResult<()>;

    fn disable(&mut self);

    fn on_resize(&mut self, viewport: Viewport, config: &EffectConfig) -> EffectResult<()>;

    fn apply(&mut self, frame: &mut FrameBuffer, ctx: &TickContext<'_>) -> EffectResult<Surface>;
}
