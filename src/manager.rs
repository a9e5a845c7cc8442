//! Effect selection, enable/disable state and fault containment.
//!
//! The manager owns an explicit, ordered list of effects and drives exactly
//! one of them per tick. Every failure is contained here: the offending
//! effect is switched off, the fault is recorded, and the tick falls back to
//! the raw render.

use crate::ascii_mosaic::AsciiMosaicEffect;
use crate::config::{EffectConfig, EffectKind};
use crate::effect::{EffectOutput, FrameEffect, Surface, TickContext};
use crate::error::{EffectError, EffectResult};
use crate::frame::{FrameBuffer, Viewport};
use crate::pixel_sort::PixelSortEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    Disabled,
    Enabled,
}

pub struct EffectManager {
    config: EffectConfig,
    viewport: Viewport,
    effects: Vec<Box<dyn FrameEffect>>,
    state: EffectState,
    fault: Option<EffectError>,
}

impl EffectManager {
    /// Manager with the pixel sort and ASCII mosaic effects, in that order.
    pub fn new(viewport: Viewport) -> Self {
        Self::with_effects(
            viewport,
            vec![
                Box::new(PixelSortEffect::new()),
                Box::new(AsciiMosaicEffect::new()),
            ],
        )
    }

    pub fn with_effects(viewport: Viewport, effects: Vec<Box<dyn FrameEffect>>) -> Self {
        Self {
            config: EffectConfig::default(),
            viewport,
            effects,
            state: EffectState::Disabled,
            fault: None,
        }
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    pub fn fault(&self) -> Option<&EffectError> {
        self.fault.as_ref()
    }

    pub fn take_fault(&mut self) -> Option<EffectError> {
        self.fault.take()
    }

    /// Kind of the effect driven each tick, if any.
    pub fn active_kind(&self) -> Option<EffectKind> {
        match self.state {
            EffectState::Enabled => Some(self.config.effect),
            EffectState::Disabled => None,
        }
    }

    pub fn raw_render_visible(&self) -> bool {
        self.state == EffectState::Disabled
    }

    /// Replace the configuration, running any enable/disable transition it implies.
    ///
    /// An invalid configuration is rejected: the previous one is kept, the
    /// effect is switched off and the fault is returned.
    pub fn set_parameter(&mut self, config: EffectConfig) -> EffectResult<()> {
        if let Err(error) = config.validate() {
            return Err(self.latch_fault(error));
        }

        let previous = std::mem::replace(&mut self.config, config);
        let kind_changed = previous.effect != self.config.effect;

        match (self.state, self.config.enabled) {
            (EffectState::Enabled, false) => {
                self.deactivate();
                tracing::info!(effect = previous.effect.label(), "effect disabled");
            }
            (EffectState::Disabled, true) => self.activate()?,
            (EffectState::Enabled, true) if kind_changed => {
                self.deactivate();
                self.activate()?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Viewport changed: record it and let the active effect recompute its layout.
    pub fn on_resize(&mut self, width: u32, height: u32) -> EffectResult<()> {
        self.viewport = Viewport::new(width, height);
        tracing::debug!(width, height, "viewport resized");
        if self.state == EffectState::Disabled {
            return Ok(());
        }

        let viewport = self.viewport;
        let config = &self.config;
        let result = match self.effects.iter_mut().find(|effect| effect.kind() == config.effect) {
            Some(effect) => effect.on_resize(viewport, config),
            None => Ok(()),
        };
        result.map_err(|error| self.latch_fault(error))
    }

    /// Run the active effect on the frame. The frame is untouched on error.
    pub fn try_apply(
        &mut self,
        frame: &mut FrameBuffer,
        time_seconds: f64,
    ) -> EffectResult<Option<Surface>> {
        if self.state == EffectState::Disabled {
            return Ok(None);
        }

        let kind = self.config.effect;
        let Some(index) = self.effects.iter().position(|effect| effect.kind() == kind) else {
            let error = EffectError::faulted(format!("no effect registered for {}", kind.label()));
            return Err(self.latch_fault(error));
        };

        let ctx = TickContext {
            config: &self.config,
            time_seconds,
        };
        let result = self.effects[index].apply(frame, &ctx);
        result.map(Some).map_err(|error| self.latch_fault(error))
    }

    /// Per-tick entry point. Never fails: a fault disables the effect and the
    /// raw frame is returned for display.
    #[tracing::instrument(
        level = "trace",
        skip(self, frame),
        fields(width = frame.width(), height = frame.height())
    )]
    pub fn apply(&mut self, mut frame: FrameBuffer, time_seconds: f64) -> EffectOutput {
        match self.try_apply(&mut frame, time_seconds) {
            Ok(Some(Surface::Frame)) => EffectOutput::Frame(frame),
            Ok(Some(Surface::Glyphs(canvas))) => EffectOutput::Glyphs(canvas),
            Ok(None) | Err(_) => EffectOutput::Raw(frame),
        }
    }

    fn activate(&mut self) -> EffectResult<()> {
        let viewport = self.viewport;
        let config = &self.config;
        let kind = config.effect;
        let result = match self.effects.iter_mut().find(|effect| effect.kind() == kind) {
            Some(effect) => effect.enable(viewport, config),
            None => Err(EffectError::faulted(format!(
                "no effect registered for {}",
                kind.label()
            ))),
        };

        match result {
            Ok(()) => {
                self.state = EffectState::Enabled;
                self.fault = None;
                tracing::info!(
                    effect = kind.label(),
                    width = viewport.width,
                    height = viewport.height,
                    "effect enabled"
                );
                Ok(())
            }
            Err(error) => Err(self.latch_fault(error)),
        }
    }

    fn deactivate(&mut self) {
        for effect in &mut self.effects {
            if effect.is_enabled() {
                effect.disable();
            }
        }
        self.state = EffectState::Disabled;
    }

    fn latch_fault(&mut self, error: EffectError) -> EffectError {
        tracing::error!(%error, "effect faulted, disabling");
        self.deactivate();
        self.fault = Some(error.clone());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rgba8;

    fn enabled(effect: EffectKind) -> EffectConfig {
        EffectConfig {
            enabled: true,
            effect,
            ..EffectConfig::default()
        }
    }

    #[test]
    fn starts_disabled_and_passes_frames_through() {
        let mut manager = EffectManager::new(Viewport::new(64, 32));
        assert_eq!(manager.state(), EffectState::Disabled);
        let frame = FrameBuffer::solid(4, 4, Rgba8::new(250, 250, 250, 255)).expect("frame");
        let output = manager.apply(frame.clone(), 0.0);
        assert_eq!(output, EffectOutput::Raw(frame));
        assert!(output.shows_raw_render());
    }

    #[test]
    fn switching_kind_while_enabled_moves_the_active_effect() {
        let mut manager = EffectManager::new(Viewport::new(64, 32));
        manager
            .set_parameter(enabled(EffectKind::PixelSort))
            .expect("enable sort");
        assert_eq!(manager.active_kind(), Some(EffectKind::PixelSort));

        manager
            .set_parameter(enabled(EffectKind::AsciiMosaic))
            .expect("switch to ascii");
        assert_eq!(manager.active_kind(), Some(EffectKind::AsciiMosaic));
        let frame = FrameBuffer::solid(64, 32, Rgba8::new(200, 10, 10, 255)).expect("frame");
        assert!(matches!(manager.apply(frame, 0.0), EffectOutput::Glyphs(_)));
    }

    #[test]
    fn invalid_config_keeps_previous_and_disables() {
        let mut manager = EffectManager::new(Viewport::new(64, 32));
        manager
            .set_parameter(enabled(EffectKind::PixelSort))
            .expect("enable");

        let bad = EffectConfig {
            sort_length: 0,
            ..enabled(EffectKind::PixelSort)
        };
        let err = manager.set_parameter(bad).expect_err("sort_length 0 rejected");
        assert!(matches!(err, EffectError::InvalidConfig(_)));
        assert_eq!(manager.state(), EffectState::Disabled);
        assert_eq!(manager.config().sort_length, 80);
        assert!(manager.fault().is_some());
        assert!(manager.raw_render_visible());
    }

    #[test]
    fn empty_registry_faults_instead_of_panicking() {
        let mut manager = EffectManager::with_effects(Viewport::new(8, 8), Vec::new());
        let err = manager
            .set_parameter(enabled(EffectKind::AsciiMosaic))
            .expect_err("nothing to enable");
        assert!(matches!(err, EffectError::Faulted(_)));
        assert_eq!(manager.state(), EffectState::Disabled);
    }
}
