use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use framefx::config::{load_config, EffectConfig, EffectKind, ParamOverride};
use framefx::effect::EffectOutput;
use framefx::frame::{FrameBuffer, Viewport};
use framefx::glyph_painter::GlyphPainter;
use framefx::host::{
    save_frame, FrameClock, FrameLoop, FrameSource, ImageSequenceSource, LoopStats, MemorySink,
    PngSequenceSink,
};
use framefx::manager::EffectManager;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("FRAMEFX_GIT_HASH"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "framefx")]
#[command(about = "Pixel sort and ASCII mosaic post-processing for rendered frames")]
#[command(version = VERSION)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Brightness-sort pixel runs and recolour them.
    Sort {
        #[command(flatten)]
        io: FrameArgs,
        /// Frame rate used to derive the recolour clock.
        #[arg(long, default_value_t = 30)]
        fps: u32,
        /// Clock value for the first frame, in seconds.
        #[arg(long, default_value_t = 0.0)]
        time: f64,
    },
    /// Replace frames with a two-layer glyph mosaic.
    Ascii {
        #[command(flatten)]
        io: FrameArgs,
        /// TTF/OTF font for PNG output. Without it glyph text is written.
        #[arg(long)]
        font: Option<PathBuf>,
        /// Grid viewport as WIDTHxHEIGHT. Defaults to the first frame's size.
        #[arg(long, value_parser = parse_viewport)]
        viewport: Option<Viewport>,
    },
    /// Parse and validate an effect config.
    Check {
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct FrameArgs {
    /// Image files, or a single directory of images.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    #[arg(short = 'o', long = "output")]
    output: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Parameter override, e.g. --set threshold=0.5. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = ParamOverride::parse)]
    overrides: Vec<ParamOverride>,
    /// Warn when a frame takes longer than this many milliseconds.
    #[arg(long)]
    budget_ms: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!(
        version = VERSION,
        "framefx starting"
    );

    match cli.command {
        Commands::Sort { io, fps, time } => {
            let clock = FrameClock::Fixed {
                fps,
                offset_seconds: time,
            };
            run_effect(&io, EffectKind::PixelSort, clock, None, None)
        }
        Commands::Ascii { io, font, viewport } => {
            let painter = font
                .as_deref()
                .map(GlyphPainter::from_path)
                .transpose()?;
            run_effect(
                &io,
                EffectKind::AsciiMosaic,
                FrameClock::fixed(30),
                painter,
                viewport,
            )
        }
        Commands::Check { config, json } => run_check(&config, json),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_viewport(raw: &str) -> Result<Viewport> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .with_context(|| format!("viewport '{raw}' must look like WIDTHxHEIGHT"))?;
    let width: u32 = w.trim().parse().with_context(|| format!("bad viewport width '{w}'"))?;
    let height: u32 = h.trim().parse().with_context(|| format!("bad viewport height '{h}'"))?;
    if width == 0 || height == 0 {
        bail!("viewport must be non-zero, got {width}x{height}");
    }
    Ok(Viewport::new(width, height))
}

fn resolve_config(io: &FrameArgs, kind: EffectKind) -> Result<EffectConfig> {
    let base = match &io.config {
        Some(path) => load_config(path)?,
        None => EffectConfig::default(),
    };
    let config = EffectConfig {
        enabled: true,
        effect: kind,
        ..base
    };
    config.with_overrides(&io.overrides)
}

/// A rejected config leaves the effect off; frames still flow through raw.
fn configure(manager: &mut EffectManager, config: EffectConfig) {
    if let Err(error) = manager.set_parameter(config) {
        tracing::warn!(%error, "effect config rejected, presenting raw frames");
        manager.take_fault();
    }
}

fn resolve_inputs(inputs: &[PathBuf]) -> Result<(ImageSequenceSource, bool)> {
    if let [single] = inputs {
        if single.is_dir() {
            return Ok((ImageSequenceSource::from_dir(single)?, true));
        }
    }
    for path in inputs {
        if !path.is_file() {
            bail!("input {} is not a file", path.display());
        }
    }
    Ok((ImageSequenceSource::new(inputs.to_vec()), inputs.len() > 1))
}

fn run_effect(
    io: &FrameArgs,
    kind: EffectKind,
    clock: FrameClock,
    painter: Option<GlyphPainter>,
    viewport: Option<Viewport>,
) -> Result<()> {
    let config = resolve_config(io, kind)?;
    let (mut source, sequence) = resolve_inputs(&io.inputs)?;
    let first = io
        .inputs
        .first()
        .context("at least one input is required")?;
    let viewport = match viewport {
        Some(viewport) => viewport,
        None if first.is_dir() => Viewport::new(0, 0),
        None => {
            let (width, height) = image::image_dimensions(first)
                .with_context(|| format!("failed reading dimensions of {}", first.display()))?;
            Viewport::new(width, height)
        }
    };

    let mut frame_loop = FrameLoop::new(clock);
    if let Some(ms) = io.budget_ms {
        frame_loop = frame_loop.with_frame_budget(Duration::from_millis(ms));
    }

    if sequence {
        let mut manager = EffectManager::new(viewport);
        let mut sink = PngSequenceSink::new(&io.output, painter)?;
        let stats = if viewport.width == 0 {
            run_sized_from_first_frame(&frame_loop, &mut source, &mut sink, &mut manager, config)?
        } else {
            configure(&mut manager, config);
            frame_loop.run(&mut source, &mut sink, &mut manager)?
        };
        println!(
            "Wrote {} frames to {} ({} late, {} faulted)",
            stats.frames,
            io.output.display(),
            stats.late_frames,
            stats.faulted_frames
        );
        return Ok(());
    }

    let mut manager = EffectManager::new(viewport);
    configure(&mut manager, config);
    let mut sink = MemorySink::default();
    frame_loop.run(&mut source, &mut sink, &mut manager)?;
    let output = sink
        .outputs
        .pop()
        .context("input produced no frame")?;
    write_single(&output, &io.output, painter)?;
    println!("Wrote {}", io.output.display());
    Ok(())
}

/// Directory inputs carry no size up front; size the grid from the first frame.
fn run_sized_from_first_frame(
    frame_loop: &FrameLoop,
    source: &mut ImageSequenceSource,
    sink: &mut PngSequenceSink,
    manager: &mut EffectManager,
    config: EffectConfig,
) -> Result<LoopStats> {
    let Some(first) = source.next_frame()? else {
        bail!("input directory produced no frames");
    };
    manager.on_resize(first.width() as u32, first.height() as u32)?;
    configure(manager, config);

    let mut replay = std::iter::once(first);
    let mut chained = ChainedSource {
        head: &mut replay,
        tail: source,
    };
    frame_loop.run(&mut chained, sink, manager)
}

struct ChainedSource<'a> {
    head: &'a mut dyn Iterator<Item = FrameBuffer>,
    tail: &'a mut ImageSequenceSource,
}

impl FrameSource for ChainedSource<'_> {
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        match self.head.next() {
            Some(frame) => Ok(Some(frame)),
            None => self.tail.next_frame(),
        }
    }
}

fn write_single(output: &EffectOutput, path: &Path, painter: Option<GlyphPainter>) -> Result<()> {
    match output {
        EffectOutput::Raw(frame) | EffectOutput::Frame(frame) => save_frame(frame, path),
        EffectOutput::Glyphs(canvas) => match painter {
            Some(mut painter) => save_frame(&painter.paint(canvas)?, path),
            None => std::fs::write(path, canvas.to_text())
                .with_context(|| format!("failed writing {}", path.display())),
        },
    }
}

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    path: String,
    valid: bool,
    error: Option<String>,
    config: &'a EffectConfig,
}

fn run_check(path: &Path, json: bool) -> Result<()> {
    let config = load_config(path)?;
    let validation = config.validate();

    if json {
        let report = CheckReport {
            path: path.display().to_string(),
            valid: validation.is_ok(),
            error: validation.as_ref().err().map(ToString::to_string),
            config: &config,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if validation.is_ok() {
        println!(
            "OK: {} ({}, enabled={}, threshold={}, sort_length={}, font_size={}, {} glyphs)",
            path.display(),
            config.effect.label(),
            config.enabled,
            config.threshold,
            config.sort_length,
            config.font_size,
            config.glyphs().len()
        );
    }

    validation.with_context(|| format!("invalid effect config {}", path.display()))
}
