//! Frame post-processing over RGBA8 bitmaps.
//!
//! Two effects share one [`FrameEffect`] contract and are driven by an
//! [`EffectManager`]: a brightness pixel sort that rewrites the frame in
//! place, and an ASCII mosaic that replaces it with a two-layer glyph surface.
#![forbid(unsafe_code)]

pub mod ascii_canvas;
pub mod ascii_grid;
pub mod ascii_mosaic;
pub mod color;
pub mod config;
pub mod effect;
pub mod error;
pub mod frame;
pub mod glyph_painter;
pub mod host;
pub mod manager;
pub mod pixel_sort;

pub use ascii_canvas::GlyphCanvas;
pub use config::{load_config, EffectConfig, EffectKind, ParamOverride};
pub use effect::{EffectOutput, FrameEffect, Surface, TickContext};
pub use error::{EffectError, EffectResult};
pub use frame::{FrameBuffer, Rgba8, Viewport};
pub use manager::{EffectManager, EffectState};
