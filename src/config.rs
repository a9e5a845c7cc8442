//! Runtime effect configuration and the parameter overrides that mutate it.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{EffectError, EffectResult};

pub const DEFAULT_THRESHOLD: f32 = 0.3;
pub const DEFAULT_SORT_LENGTH: u32 = 80;
pub const DEFAULT_CHARACTERS: &str = " .:-=+*#%@";
pub const DEFAULT_FONT_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    PixelSort,
    AsciiMosaic,
}

impl EffectKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::PixelSort => "pixel_sort",
            Self::AsciiMosaic => "ascii_mosaic",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pixel_sort" | "sort" => Some(Self::PixelSort),
            "ascii_mosaic" | "ascii" => Some(Self::AsciiMosaic),
            _ => None,
        }
    }
}

/// Process-wide effect state. Written only through the parameter path,
/// read by the active pipeline every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectConfig {
    pub enabled: bool,
    pub effect: EffectKind,
    /// Fraction of full brightness a pixel must exceed to join a sorted run.
    /// Not clamped: values outside `[0, 1]` select everything or nothing.
    pub threshold: f32,
    pub sort_length: u32,
    pub characters: String,
    pub font_size: u32,
    pub parallel_rows: bool,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            effect: EffectKind::PixelSort,
            threshold: DEFAULT_THRESHOLD,
            sort_length: DEFAULT_SORT_LENGTH,
            characters: DEFAULT_CHARACTERS.to_owned(),
            font_size: DEFAULT_FONT_SIZE,
            parallel_rows: false,
        }
    }
}

impl EffectConfig {
    pub fn validate(&self) -> EffectResult<()> {
        if self.sort_length == 0 {
            return Err(EffectError::invalid_config("sort_length must be > 0"));
        }
        if self.font_size == 0 {
            return Err(EffectError::invalid_config("font_size must be > 0"));
        }
        if self.characters.is_empty() {
            return Err(EffectError::invalid_config("characters must not be empty"));
        }
        if !self.threshold.is_finite() {
            return Err(EffectError::invalid_config(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Charset as an ordered dark-to-bright glyph list.
    pub fn glyphs(&self) -> Vec<char> {
        self.characters.chars().collect()
    }

    pub fn with_overrides(mut self, overrides: &[ParamOverride]) -> Result<Self> {
        for item in overrides {
            item.apply(&mut self)?;
        }
        Ok(self)
    }
}

/// One `key=value` change delivered by the parameter source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamOverride {
    pub key: String,
    pub value: String,
}

impl ParamOverride {
    pub fn parse(raw: &str) -> Result<Self> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("parameter override '{raw}' must look like key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("parameter override '{raw}' has an empty key");
        }
        Ok(Self {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    }

    pub fn apply(&self, config: &mut EffectConfig) -> Result<()> {
        let value = self.value.as_str();
        match self.key.as_str() {
            "enabled" => config.enabled = parse_bool(&self.key, value)?,
            "effect" => {
                config.effect = EffectKind::parse(value).ok_or_else(|| {
                    anyhow!("unknown effect '{value}' (expected pixel_sort or ascii_mosaic)")
                })?
            }
            "threshold" => config.threshold = parse_finite_f32(&self.key, value)?,
            "sort_length" => {
                config.sort_length = value
                    .trim()
                    .parse()
                    .with_context(|| format!("sort_length must be a non-negative integer, got '{value}'"))?
            }
            // Charset is taken verbatim; leading spaces are meaningful glyphs.
            "characters" => config.characters = value.to_owned(),
            "font_size" => {
                config.font_size = value
                    .trim()
                    .parse()
                    .with_context(|| format!("font_size must be a non-negative integer, got '{value}'"))?
            }
            "parallel_rows" => config.parallel_rows = parse_bool(&self.key, value)?,
            other => bail!("unknown parameter '{other}'"),
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        _ => bail!("{key} must be a boolean (true/false/1/0), got '{raw}'"),
    }
}

fn parse_finite_f32(key: &str, raw: &str) -> Result<f32> {
    let value: f32 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a number, got '{raw}'"))?;
    if !value.is_finite() {
        bail!("{key} must be finite, got '{raw}'");
    }
    Ok(value)
}

/// Load a YAML (or JSON) effect configuration. Validation is left to the
/// caller so a bad file can still be reported as an effect fault.
pub fn load_config(path: &Path) -> Result<EffectConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read effect config {}", path.display()))?;
    serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse effect config {} at {}: {}",
            path.display(),
            location,
            error
        )
    })
}
