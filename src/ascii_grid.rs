//! Glyph grid sizing, cell downsampling and brightness-to-glyph mapping.

use crate::error::{EffectError, EffectResult};
use crate::frame::{FrameBuffer, Rgba8, Viewport};

/// Monospace advance as a fraction of the font size.
pub const CELL_WIDTH_RATIO: f64 = 0.6;

/// Cached grid dimensions. Computed on enable or resize only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphGrid {
    pub cols: u32,
    pub rows: u32,
    pub font_size: u32,
}

impl GlyphGrid {
    pub fn for_viewport(viewport: Viewport, font_size: u32) -> EffectResult<Self> {
        if font_size == 0 {
            return Err(EffectError::invalid_config("font_size must be > 0"));
        }
        let cell_width = f64::from(font_size) * CELL_WIDTH_RATIO;
        let cols = (f64::from(viewport.width) / cell_width).floor() as u32;
        let rows = (f64::from(viewport.height) / f64::from(font_size)).floor() as u32;
        Ok(Self {
            cols,
            rows,
            font_size,
        })
    }

    pub fn cell_width(&self) -> f32 {
        (f64::from(self.font_size) * CELL_WIDTH_RATIO) as f32
    }

    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

/// Mean colour of every grid cell, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellGrid {
    pub cols: u32,
    pub rows: u32,
    pub cells: Vec<Rgba8>,
}

impl CellGrid {
    pub fn cell(&self, col: u32, row: u32) -> Rgba8 {
        self.cells[(row * self.cols + col) as usize]
    }
}

/// Box-average the source frame into `cols x rows` cells.
///
/// Each cell covers `[c*W/cols, (c+1)*W/cols)` horizontally (same for rows),
/// widened to at least one source pixel. Channel means round to nearest.
pub fn downsample(frame: &FrameBuffer, cols: u32, rows: u32) -> CellGrid {
    let mut cells = Vec::with_capacity(cols as usize * rows as usize);
    let width = frame.width();
    let height = frame.height();

    if width == 0 || height == 0 {
        cells.resize(cols as usize * rows as usize, Rgba8::default());
        return CellGrid { cols, rows, cells };
    }

    let cols_usize = cols as usize;
    let rows_usize = rows as usize;
    let pixels = frame.pixels();

    for row in 0..rows_usize {
        let (y0, y1) = cell_span(row, rows_usize, height);
        for col in 0..cols_usize {
            let (x0, x1) = cell_span(col, cols_usize, width);

            let mut total = [0_u64; 4];
            for y in y0..y1 {
                for px in &pixels[y * width + x0..y * width + x1] {
                    total[0] += u64::from(px.r);
                    total[1] += u64::from(px.g);
                    total[2] += u64::from(px.b);
                    total[3] += u64::from(px.a);
                }
            }

            let count = ((y1 - y0) * (x1 - x0)) as u64;
            let mean = |sum: u64| ((sum + count / 2) / count) as u8;
            cells.push(Rgba8::new(
                mean(total[0]),
                mean(total[1]),
                mean(total[2]),
                mean(total[3]),
            ));
        }
    }

    CellGrid { cols, rows, cells }
}

fn cell_span(index: usize, cells: usize, len: usize) -> (usize, usize) {
    let start = (index * len / cells).min(len - 1);
    let mut end = (index + 1) * len / cells;
    if end <= start {
        end = (start + 1).min(len);
    }
    (start, end)
}

/// Largest `r + g + b` channel sum.
pub const MAX_CHANNEL_SUM: u32 = 3 * 255;

/// Ramp position for a cell: `floor(brightness / 255 * (len - 1))`.
///
/// Takes the integer channel sum so the floor is exact:
/// `brightness / 255 = sum / 765`.
pub fn glyph_index(channel_sum: u32, charset_len: usize) -> usize {
    if charset_len <= 1 {
        return 0;
    }
    let max_index = charset_len - 1;
    let scaled = u64::from(channel_sum.min(MAX_CHANNEL_SUM)) * max_index as u64
        / u64::from(MAX_CHANNEL_SUM);
    (scaled as usize).min(max_index)
}

/// Pick the glyph for a cell colour. An empty charset maps to a space.
pub fn map_glyph(charset: &[char], color: Rgba8) -> char {
    if charset.is_empty() {
        return ' ';
    }
    charset[glyph_index(color.channel_sum(), charset.len())]
}
