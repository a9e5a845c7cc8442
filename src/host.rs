//! Host-side collaborators: where frames come from, where results go, and
//! the loop that ticks the effect manager between them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::ascii_canvas::GlyphCanvas;
use crate::effect::EffectOutput;
use crate::frame::FrameBuffer;
use crate::glyph_painter::GlyphPainter;
use crate::manager::EffectManager;

/// Supplies a freshly rendered RGBA8 bitmap once per tick.
pub trait FrameSource {
    /// `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>>;
}

/// Presents the effect output and toggles the raw render underneath it.
pub trait DisplaySink {
    fn set_raw_render_visible(&mut self, visible: bool);

    fn present(&mut self, output: &EffectOutput) -> Result<()>;
}

/// Decodes image files in order, one per tick.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, next: 0 }
    }

    /// All png/jpg/jpeg/webp files in `dir`, sorted by path.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("failed reading {}", dir.display()))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
                continue;
            };
            if matches!(
                ext.to_ascii_lowercase().as_str(),
                "png" | "jpg" | "jpeg" | "webp"
            ) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            bail!("no supported image files found in {}", dir.display());
        }
        paths.sort();
        Ok(Self::new(paths))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub fn load_frame(path: &Path) -> Result<FrameBuffer> {
    let img = image::open(path).with_context(|| format!("failed decoding {}", path.display()))?;
    let rgba = img.to_rgba8();
    let (width, height) = (rgba.width() as usize, rgba.height() as usize);
    Ok(FrameBuffer::from_rgba(width, height, rgba.into_raw())?)
}

pub fn save_frame(frame: &FrameBuffer, path: &Path) -> Result<()> {
    let image = image::RgbaImage::from_raw(
        frame.width() as u32,
        frame.height() as u32,
        frame.as_bytes().to_vec(),
    )
    .context("frame dimensions do not fit an image buffer")?;
    image
        .save(path)
        .with_context(|| format!("failed writing {}", path.display()))
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        load_frame(path).map(Some)
    }
}

/// Repeats one bitmap a fixed number of times.
pub struct StaticFrameSource {
    frame: FrameBuffer,
    remaining: usize,
}

impl StaticFrameSource {
    pub fn new(frame: FrameBuffer, count: usize) -> Self {
        Self {
            frame,
            remaining: count,
        }
    }
}

impl FrameSource for StaticFrameSource {
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(self.frame.clone()))
    }
}

/// Records everything presented. Handy for tests and headless hosts.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub outputs: Vec<EffectOutput>,
    pub raw_visible: Vec<bool>,
}

impl DisplaySink for MemorySink {
    fn set_raw_render_visible(&mut self, visible: bool) {
        self.raw_visible.push(visible);
    }

    fn present(&mut self, output: &EffectOutput) -> Result<()> {
        self.outputs.push(output.clone());
        Ok(())
    }
}

/// Writes each presented output as a numbered file in `dir`.
///
/// Frames become PNGs. Glyph canvases are rasterized when a painter is set,
/// otherwise their glyph text is written as `.txt`.
pub struct PngSequenceSink {
    dir: PathBuf,
    painter: Option<GlyphPainter>,
    next: usize,
}

impl PngSequenceSink {
    pub fn new(dir: &Path, painter: Option<GlyphPainter>) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed creating output dir {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            painter,
            next: 0,
        })
    }

    fn write_canvas(&mut self, canvas: &GlyphCanvas, stem: &str) -> Result<()> {
        match self.painter.as_mut() {
            Some(painter) => {
                let frame = painter.paint(canvas)?;
                save_frame(&frame, &self.dir.join(format!("{stem}.png")))
            }
            None => {
                let path = self.dir.join(format!("{stem}.txt"));
                fs::write(&path, canvas.to_text())
                    .with_context(|| format!("failed writing {}", path.display()))
            }
        }
    }
}

impl DisplaySink for PngSequenceSink {
    fn set_raw_render_visible(&mut self, _visible: bool) {}

    fn present(&mut self, output: &EffectOutput) -> Result<()> {
        let stem = format!("frame_{:05}", self.next);
        self.next += 1;
        match output {
            EffectOutput::Raw(frame) | EffectOutput::Frame(frame) => {
                save_frame(frame, &self.dir.join(format!("{stem}.png")))
            }
            EffectOutput::Glyphs(canvas) => self.write_canvas(canvas, &stem),
        }
    }
}

/// Source of the per-tick clock value fed to the recolour.
#[derive(Debug, Clone, Copy)]
pub enum FrameClock {
    /// Seconds since the clock was created.
    Wall(Instant),
    /// `frame_index / fps`, for reproducible offline renders.
    Fixed { fps: u32, offset_seconds: f64 },
}

impl FrameClock {
    pub fn wall() -> Self {
        Self::Wall(Instant::now())
    }

    pub fn fixed(fps: u32) -> Self {
        Self::Fixed {
            fps,
            offset_seconds: 0.0,
        }
    }

    pub fn seconds(&self, frame_index: u64) -> f64 {
        match *self {
            Self::Wall(start) => start.elapsed().as_secs_f64(),
            Self::Fixed {
                fps,
                offset_seconds,
            } => offset_seconds + frame_index as f64 / f64::from(fps.max(1)),
        }
    }
}

/// Cooperative stop flag shared with whoever owns the loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
    pub frames: u64,
    pub late_frames: u64,
    pub faulted_frames: u64,
}

/// Frame-synchronous driver: capture, sample the clock once, apply, present.
pub struct FrameLoop {
    pub clock: FrameClock,
    /// Soft per-tick deadline. Overruns are counted and logged, never fatal.
    pub frame_budget: Option<Duration>,
    pub cancel: CancelToken,
}

impl FrameLoop {
    pub fn new(clock: FrameClock) -> Self {
        Self {
            clock,
            frame_budget: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = Some(budget);
        self
    }

    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn DisplaySink,
        manager: &mut EffectManager,
    ) -> Result<LoopStats> {
        let mut stats = LoopStats::default();
        let mut raw_visible = None;

        // Only faults raised while applying count against frames.
        if let Some(error) = manager.take_fault() {
            tracing::warn!(%error, "effect already disabled when the loop started");
        }

        while !self.cancel.is_cancelled() {
            let Some(frame) = source.next_frame()? else {
                break;
            };
            let started = Instant::now();
            let time_seconds = self.clock.seconds(stats.frames);

            let output = manager.apply(frame, time_seconds);
            if let Some(error) = manager.take_fault() {
                tracing::warn!(frame = stats.frames, %error, "presenting raw frame after effect fault");
                stats.faulted_frames += 1;
            }

            let visible = output.shows_raw_render();
            if raw_visible != Some(visible) {
                sink.set_raw_render_visible(visible);
                raw_visible = Some(visible);
            }
            sink.present(&output)?;

            if let Some(budget) = self.frame_budget {
                let elapsed = started.elapsed();
                if elapsed > budget {
                    stats.late_frames += 1;
                    tracing::warn!(
                        frame = stats.frames,
                        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                        budget_ms = budget.as_secs_f64() * 1000.0,
                        "frame over budget"
                    );
                }
            }
            stats.frames += 1;
        }

        tracing::info!(
            frames = stats.frames,
            late = stats.late_frames,
            faulted = stats.faulted_frames,
            "frame loop finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rgba8;

    #[test]
    fn fixed_clock_is_frame_index_over_fps() {
        let clock = FrameClock::fixed(30);
        assert_eq!(clock.seconds(0), 0.0);
        assert!((clock.seconds(45) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn static_source_repeats_then_ends() {
        let frame = FrameBuffer::solid(2, 2, Rgba8::new(1, 2, 3, 255)).expect("frame");
        let mut source = StaticFrameSource::new(frame.clone(), 2);
        assert_eq!(source.next_frame().expect("frame 0"), Some(frame.clone()));
        assert_eq!(source.next_frame().expect("frame 1"), Some(frame));
        assert_eq!(source.next_frame().expect("end"), None);
    }

    #[test]
    fn png_sink_numbers_frames_and_falls_back_to_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink = PngSequenceSink::new(dir.path(), None).expect("sink");
        let frame = FrameBuffer::solid(3, 2, Rgba8::new(10, 20, 30, 255)).expect("frame");

        let mut manager = EffectManager::new(crate::frame::Viewport::new(12, 10));
        manager
            .set_parameter(crate::config::EffectConfig {
                enabled: true,
                effect: crate::config::EffectKind::AsciiMosaic,
                ..Default::default()
            })
            .expect("enable ascii");
        let glyphs = manager.apply(frame.clone(), 0.0);

        sink.present(&EffectOutput::Raw(frame.clone())).expect("png");
        sink.present(&glyphs).expect("txt");

        let decoded = load_frame(&dir.path().join("frame_00000.png")).expect("decode");
        assert_eq!(decoded, frame);
        let text = fs::read_to_string(dir.path().join("frame_00001.txt")).expect("text");
        assert_eq!(text, "  \n");
    }

    #[test]
    fn cancelled_loop_presents_nothing() {
        let frame = FrameBuffer::solid(2, 2, Rgba8::new(1, 2, 3, 255)).expect("frame");
        let mut source = StaticFrameSource::new(frame, 5);
        let mut sink = MemorySink::default();
        let mut manager = EffectManager::new(crate::frame::Viewport::new(2, 2));
        let frame_loop = FrameLoop::new(FrameClock::fixed(60));
        frame_loop.cancel.cancel();

        let stats = frame_loop
            .run(&mut source, &mut sink, &mut manager)
            .expect("loop runs");
        assert_eq!(stats.frames, 0);
        assert!(sink.outputs.is_empty());
    }
}
