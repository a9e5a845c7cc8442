//! Dual-layer glyph compositing.
//!
//! The renderer emits a display list rather than pixels so hosts can draw it
//! with their own text stack; [`crate::glyph_painter::GlyphPainter`] is the
//! CPU rasterizer for hosts without one.

use crate::ascii_grid::{map_glyph, CellGrid, GlyphGrid};
use crate::frame::{Rgba8, Viewport};
use crate::pixel_sort::ALPHA_CUTOFF;

pub const CANVAS_BACKGROUND: Rgba8 = Rgba8::new(0, 0, 0, 255);
pub const SHADOW_COLOR: [u8; 3] = [0, 0, 0];
pub const SHADOW_OFFSET: f32 = 1.0;
/// Share of the original colour kept in the tint; the rest is channel mean.
pub const TINT_ORIGINAL_WEIGHT: f32 = 0.7;
pub const TINT_GREY_WEIGHT: f32 = 0.3;
pub const BACKGROUND_DIM: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawLayer {
    /// Undershadowed glyph for transparent cells.
    Dim,
    Shadow,
    Foreground,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphDraw {
    pub col: u32,
    pub row: u32,
    /// Top-left of the glyph box in canvas pixels.
    pub x: f32,
    pub y: f32,
    pub glyph: char,
    pub color: [u8; 3],
    pub layer: DrawLayer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlyphCanvas {
    pub width: u32,
    pub height: u32,
    pub background: Rgba8,
    pub grid: GlyphGrid,
    /// Mapped glyph per cell, row-major.
    pub glyphs: Vec<char>,
    /// Draw calls in paint order, after clearing to `background`.
    pub draws: Vec<GlyphDraw>,
}

impl GlyphCanvas {
    /// Mapped glyphs as newline-terminated rows.
    pub fn to_text(&self) -> String {
        let cols = self.grid.cols as usize;
        if cols == 0 || self.glyphs.is_empty() {
            return String::new();
        }
        let mut out = String::with_capacity((cols + 1) * self.grid.rows as usize);
        for line in self.glyphs.chunks(cols) {
            out.extend(line.iter());
            out.push('\n');
        }
        out
    }
}

/// `0.7 * channel + 0.3 * mean(r, g, b)`, a partial desaturation toward grey.
pub fn tint(color: Rgba8) -> [f32; 3] {
    let grey = color.brightness();
    [color.r, color.g, color.b]
        .map(|channel| TINT_ORIGINAL_WEIGHT * f32::from(channel) + TINT_GREY_WEIGHT * grey)
}

fn to_rgb8(channels: [f32; 3]) -> [u8; 3] {
    channels.map(|value| value.round().clamp(0.0, 255.0) as u8)
}

/// Build the two-layer glyph display list for one frame of cell colours.
///
/// Opaque cells (`alpha > 10`) get a black shadow at `(+1, +1)` followed by
/// the tinted glyph; transparent cells get one dimmed glyph at `0.4 * tint`.
pub fn render_dual_layer(
    grid: &GlyphGrid,
    cells: &CellGrid,
    charset: &[char],
    viewport: Viewport,
) -> GlyphCanvas {
    debug_assert_eq!(cells.cells.len(), grid.cell_count());

    let cell_width = grid.cell_width();
    let line_height = grid.font_size as f32;
    let mut glyphs = Vec::with_capacity(grid.cell_count());
    let mut draws = Vec::with_capacity(grid.cell_count() * 2);

    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let color = cells.cell(col, row);
            let glyph = map_glyph(charset, color);
            glyphs.push(glyph);

            let x = col as f32 * cell_width;
            let y = row as f32 * line_height;
            let tinted = tint(color);

            if color.a > ALPHA_CUTOFF {
                draws.push(GlyphDraw {
                    col,
                    row,
                    x: x + SHADOW_OFFSET,
                    y: y + SHADOW_OFFSET,
                    glyph,
                    color: SHADOW_COLOR,
                    layer: DrawLayer::Shadow,
                });
                draws.push(GlyphDraw {
                    col,
                    row,
                    x,
                    y,
                    glyph,
                    color: to_rgb8(tinted),
                    layer: DrawLayer::Foreground,
                });
            } else {
                draws.push(GlyphDraw {
                    col,
                    row,
                    x,
                    y,
                    glyph,
                    color: to_rgb8(tinted.map(|value| value * BACKGROUND_DIM)),
                    layer: DrawLayer::Dim,
                });
            }
        }
    }

    GlyphCanvas {
        width: viewport.width,
        height: viewport.height,
        background: CANVAS_BACKGROUND,
        grid: *grid,
        glyphs,
        draws,
    }
}
