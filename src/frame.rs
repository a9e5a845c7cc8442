//! RGBA8 frame buffers captured from the host renderer.
//!
//! Buffers are row-major, straight (non-premultiplied) alpha, stride `4 * width`.
//! Length is validated once on construction so the pipelines can index rows
//! without re-checking.

use bytemuck::{Pod, Zeroable};

use crate::error::{EffectError, EffectResult};

/// One RGBA8 pixel, layout-compatible with four consecutive buffer bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Unweighted channel mean, `(r + g + b) / 3`. Not perceptual luma.
    #[inline(always)]
    pub fn brightness(self) -> f32 {
        (f32::from(self.r) + f32::from(self.g) + f32::from(self.b)) / 3.0
    }

    /// `r + g + b`, the exact form of [`Self::brightness`] times three.
    #[inline(always)]
    pub fn channel_sum(self) -> u32 {
        u32::from(self.r) + u32::from(self.g) + u32::from(self.b)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A pixel captured for sorting, with its brightness key precomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSample {
    pub color: Rgba8,
    pub brightness: f32,
}

impl PixelSample {
    pub fn new(color: Rgba8) -> Self {
        Self {
            color,
            brightness: color.brightness(),
        }
    }
}

/// Host viewport size in pixels. Drives the glyph grid, not the buffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

/// Byte length an RGBA8 buffer of `width x height` must have.
pub fn expected_len(width: usize, height: usize) -> EffectResult<usize> {
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(EffectError::DimensionsOverflow)
}

impl FrameBuffer {
    /// Wrap raw RGBA8 bytes. Fails fast when the length is not `4 * width * height`.
    pub fn from_rgba(width: usize, height: usize, data: Vec<u8>) -> EffectResult<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(EffectError::BufferLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn solid(width: usize, height: usize, color: Rgba8) -> EffectResult<Self> {
        let len = expected_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len / 4 {
            data.extend_from_slice(&color.to_array());
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.width * 4
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn pixels(&self) -> &[Rgba8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba8] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgba8 {
        self.pixels()[y * self.width + x]
    }

    pub fn row(&self, y: usize) -> &[Rgba8] {
        let start = y * self.width;
        &self.pixels()[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [Rgba8] {
        let width = self.width;
        let start = y * width;
        &mut self.pixels_mut()[start..start + width]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
