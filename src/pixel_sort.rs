//! Brightness-driven run-length pixel sorting with hue-cycling recolour.
//!
//! Per row: find runs of bright, opaque pixels, stable-sort each run by
//! brightness, recolour the sorted pixels and write them back in place.
//! Rows are independent, so the optional rayon path produces byte-identical
//! output to the sequential one.

use rayon::prelude::*;

use crate::color::Recolorer;
use crate::config::{EffectConfig, EffectKind};
use crate::effect::{FrameEffect, Surface, TickContext};
use crate::error::{EffectError, EffectResult};
use crate::frame::{FrameBuffer, PixelSample, Rgba8, Viewport};

/// Pixels with alpha at or below this value are background and never sorted.
pub const ALPHA_CUTOFF: u8 = 10;

/// Half-open pixel interval `[start, end)` within row `row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub row: usize,
    pub start: usize,
    pub end: usize,
}

impl Run {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

#[inline(always)]
fn qualifies(pixel: Rgba8, cutoff: f32) -> bool {
    pixel.a > ALPHA_CUTOFF && pixel.brightness() > cutoff
}

/// Find sortable runs in one row, left to right.
///
/// A pixel belongs to a run iff `alpha > 10` and its brightness exceeds
/// `threshold * 255`. Runs are maximal but capped at `sort_length`; a capped
/// run is followed directly by the next one when pixels keep qualifying.
pub fn segment_row(row: &[Rgba8], y: usize, threshold: f32, sort_length: usize) -> Vec<Run> {
    let mut runs = Vec::new();
    if sort_length == 0 {
        return runs;
    }

    let cutoff = threshold * 255.0;
    let mut x = 0;
    while x < row.len() {
        let Some(offset) = row[x..].iter().position(|px| qualifies(*px, cutoff)) else {
            break;
        };
        let start = x + offset;
        let mut end = start + 1;
        while end < row.len() && end - start < sort_length && qualifies(row[end], cutoff) {
            end += 1;
        }
        runs.push(Run { row: y, start, end });
        x = end;
    }
    runs
}

/// Stable ascending sort by brightness; equal keys keep their input order.
pub fn sort_run(samples: &mut [PixelSample]) {
    samples.sort_by(|a, b| a.brightness.total_cmp(&b.brightness));
}

/// Write recoloured, sorted samples back over the run's slots.
pub fn composite_run(row: &mut [Rgba8], run: Run, sorted: &[PixelSample], recolorer: &Recolorer) {
    debug_assert_eq!(run.len(), sorted.len());
    let run_len = sorted.len();
    for (idx, (slot, sample)) in row[run.start..run.end].iter_mut().zip(sorted).enumerate() {
        *slot = recolorer.recolor(sample.color, idx, run_len);
    }
}

/// Sort one row in place and return how many runs were rewritten.
pub fn sort_row(
    row: &mut [Rgba8],
    y: usize,
    threshold: f32,
    recolorer: &Recolorer,
    scratch: &mut Vec<PixelSample>,
) -> usize {
    let runs = segment_row(row, y, threshold, recolorer.sort_length as usize);
    for run in &runs {
        scratch.clear();
        scratch.extend(row[run.start..run.end].iter().copied().map(PixelSample::new));
        sort_run(scratch);
        composite_run(row, *run, scratch, recolorer);
    }
    runs.len()
}

/// Run the whole sort pipeline over a frame. Returns the total run count.
pub fn pixel_sort_frame(
    frame: &mut FrameBuffer,
    threshold: f32,
    recolorer: &Recolorer,
    parallel_rows: bool,
) -> usize {
    if frame.is_empty() || recolorer.sort_length == 0 {
        return 0;
    }

    let width = frame.width();
    let pixels = frame.pixels_mut();
    if parallel_rows {
        pixels
            .par_chunks_mut(width)
            .enumerate()
            .map_init(Vec::new, |scratch, (y, row)| {
                sort_row(row, y, threshold, recolorer, scratch)
            })
            .sum()
    } else {
        let mut scratch = Vec::with_capacity(recolorer.sort_length as usize);
        pixels
            .chunks_mut(width)
            .enumerate()
            .map(|(y, row)| sort_row(row, y, threshold, recolorer, &mut scratch))
            .sum()
    }
}

#[derive(Debug, Default)]
pub struct PixelSortEffect {
    overlay: Option<Viewport>,
}

impl PixelSortEffect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay size captured at enable/resize time.
    pub fn overlay(&self) -> Option<Viewport> {
        self.overlay
    }
}

impl FrameEffect for PixelSortEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::PixelSort
    }

    fn is_enabled(&self) -> bool {
        self.overlay.is_some()
    }

    fn enable(&mut self, viewport: Viewport, config: &EffectConfig) -> EffectResult<()> {
        config.validate()?;
        self.overlay = Some(viewport);
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            "pixel sort overlay sized"
        );
        Ok(())
    }

    fn disable(&mut self) {
        self.overlay = None;
    }

    fn on_resize(&mut self, viewport: Viewport, _config: &EffectConfig) -> EffectResult<()> {
        if self.overlay.is_some() {
            self.overlay = Some(viewport);
        }
        Ok(())
    }

    fn apply(&mut self, frame: &mut FrameBuffer, ctx: &TickContext<'_>) -> EffectResult<Surface> {
        if self.overlay.is_none() {
            return Err(EffectError::faulted("pixel sort applied while disabled"));
        }
        let config = ctx.config;
        if config.sort_length == 0 {
            return Err(EffectError::invalid_config("sort_length must be > 0"));
        }

        let recolorer = Recolorer::new(config.sort_length, ctx.time_seconds);
        let runs = pixel_sort_frame(frame, config.threshold, &recolorer, config.parallel_rows);
        tracing::trace!(runs, "pixel sort frame applied");
        Ok(Surface::Frame)
    }
}
