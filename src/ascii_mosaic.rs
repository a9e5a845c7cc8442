use crate::ascii_canvas::render_dual_layer;
use crate::ascii_grid::{downsample, GlyphGrid};
use crate::config::{EffectConfig, EffectKind};
use crate::effect::{FrameEffect, Surface, TickContext};
use crate::error::{EffectError, EffectResult};
use crate::frame::{FrameBuffer, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MosaicLayout {
    viewport: Viewport,
    grid: GlyphGrid,
}

/// Luminance-to-glyph mosaic. Grid size is fixed between enable/resize events,
/// whatever size the captured frames happen to be.
#[derive(Debug, Default)]
pub struct AsciiMosaicEffect {
    layout: Option<MosaicLayout>,
}

impl AsciiMosaicEffect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(&self) -> Option<GlyphGrid> {
        self.layout.map(|layout| layout.grid)
    }

    fn relayout(&mut self, viewport: Viewport, config: &EffectConfig) -> EffectResult<()> {
        let grid = GlyphGrid::for_viewport(viewport, config.font_size)?;
        tracing::debug!(
            cols = grid.cols,
            rows = grid.rows,
            font_size = grid.font_size,
            "ascii grid sized"
        );
        self.layout = Some(MosaicLayout { viewport, grid });
        Ok(())
    }
}

impl FrameEffect for AsciiMosaicEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::AsciiMosaic
    }

    fn is_enabled(&self) -> bool {
        self.layout.is_some()
    }

    fn enable(&mut self, viewport: Viewport, config: &EffectConfig) -> EffectResult<()> {
        config.validate()?;
        self.relayout(viewport, config)
    }

    fn disable(&mut self) {
        self.layout = None;
    }

    fn on_resize(&mut self, viewport: Viewport, config: &EffectConfig) -> EffectResult<()> {
        if self.layout.is_none() {
            return Ok(());
        }
        self.relayout(viewport, config)
    }

    fn apply(&mut self, frame: &mut FrameBuffer, ctx: &TickContext<'_>) -> EffectResult<Surface> {
        let Some(layout) = self.layout else {
            return Err(EffectError::faulted("ascii mosaic applied while disabled"));
        };
        let charset = ctx.config.glyphs();
        if charset.is_empty() {
            return Err(EffectError::invalid_config("characters must not be empty"));
        }

        let cells = downsample(frame, layout.grid.cols, layout.grid.rows);
        let canvas = render_dual_layer(&layout.grid, &cells, &charset, layout.viewport);
        Ok(Surface::Glyphs(canvas))
    }
}
