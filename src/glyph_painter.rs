use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::Font;
use tiny_skia::{Color, Pixmap};

use crate::ascii_canvas::GlyphCanvas;
use crate::frame::FrameBuffer;

#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    /// Offset from the glyph box's top-left to the bitmap's top-left.
    pub offset_x: i32,
    pub offset_y: i32,
    pub bitmap: Vec<u8>,
}

/// Rasterizes [`GlyphCanvas`] display lists with a TrueType/OpenType font.
pub struct GlyphPainter {
    font: Font,
    font_size: u32,
    glyph_cache: HashMap<char, GlyphBitmap>,
}

impl GlyphPainter {
    pub fn from_bytes(font_bytes: Vec<u8>) -> Result<Self> {
        let font = Font::from_bytes(font_bytes, fontdue::FontSettings::default())
            .map_err(|error| anyhow!("failed to parse font: {error}"))?;
        Ok(Self {
            font,
            font_size: 0,
            glyph_cache: HashMap::new(),
        })
    }

    pub fn from_path(font_path: &Path) -> Result<Self> {
        let font_bytes = std::fs::read(font_path)
            .with_context(|| format!("failed to read font file {}", font_path.display()))?;
        Self::from_bytes(font_bytes)
            .with_context(|| format!("failed to load font {}", font_path.display()))
    }

    fn set_font_size(&mut self, font_size: u32) {
        if self.font_size != font_size {
            self.font_size = font_size;
            self.glyph_cache.clear();
        }
    }

    fn cache_glyph(&mut self, character: char) {
        let font = &self.font;
        let size = self.font_size as f32;
        self.glyph_cache.entry(character).or_insert_with(|| {
            let ascent = font
                .horizontal_line_metrics(size)
                .map_or(size, |line| line.ascent);
            let (metrics, bitmap) = font.rasterize(character, size);
            GlyphBitmap {
                width: metrics.width,
                height: metrics.height,
                offset_x: metrics.xmin,
                offset_y: (ascent - metrics.height as f32 - metrics.ymin as f32).round() as i32,
                bitmap,
            }
        });
    }

    /// Clear to the canvas background, then draw every glyph in order.
    pub fn paint(&mut self, canvas: &GlyphCanvas) -> Result<FrameBuffer> {
        self.set_font_size(canvas.grid.font_size);
        for draw in &canvas.draws {
            if !draw.glyph.is_whitespace() {
                self.cache_glyph(draw.glyph);
            }
        }
        composite_glyphs(canvas, &self.glyph_cache)
    }
}

/// Paint a canvas from already rasterized glyphs. Whitespace and glyphs
/// missing from `glyphs` leave the background showing.
pub fn composite_glyphs(
    canvas: &GlyphCanvas,
    glyphs: &HashMap<char, GlyphBitmap>,
) -> Result<FrameBuffer> {
    let mut pixmap = Pixmap::new(canvas.width, canvas.height).ok_or_else(|| {
        anyhow!(
            "failed to allocate glyph surface {}x{}",
            canvas.width,
            canvas.height
        )
    })?;
    let bg = canvas.background;
    pixmap.fill(Color::from_rgba8(bg.r, bg.g, bg.b, bg.a));

    for draw in &canvas.draws {
        if draw.glyph.is_whitespace() {
            continue;
        }
        let Some(glyph) = glyphs.get(&draw.glyph) else {
            continue;
        };
        let x = draw.x.round() as i32;
        let y = draw.y.round() as i32;
        let color = [draw.color[0], draw.color[1], draw.color[2], 255];
        blend_glyph(
            pixmap.data_mut(),
            canvas.width,
            canvas.height,
            x + glyph.offset_x,
            y + glyph.offset_y,
            glyph,
            color,
        );
    }

    FrameBuffer::from_rgba(
        canvas.width as usize,
        canvas.height as usize,
        pixmap.take(),
    )
    .map_err(anyhow::Error::from)
}

pub fn blend_glyph(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    x: i32,
    y: i32,
    glyph: &GlyphBitmap,
    color: [u8; 4],
) {
    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height as i32 {
            continue;
        }

        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width as i32 {
                continue;
            }

            let mask = glyph.bitmap[row * glyph.width + col];
            if mask == 0 {
                continue;
            }

            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            let idx = ((py as u32 * frame_width + px as u32) * 4) as usize;
            blend_pixel(frame, idx, [color[0], color[1], color[2], alpha]);
        }
    }
}

/// Source-over onto an opaque destination pixel.
pub fn blend_pixel(frame: &mut [u8], idx: usize, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }

    let inv_alpha = 255_u16.saturating_sub(alpha);

    for channel in 0..3 {
        let dst = u16::from(frame[idx + channel]);
        let src_c = u16::from(src[channel]);
        frame[idx + channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    frame[idx + 3] = 255;
}
