use std::thread;
use std::time::Duration;

use framefx::config::{EffectConfig, EffectKind};
use framefx::effect::{EffectOutput, FrameEffect, Surface, TickContext};
use framefx::error::{EffectError, EffectResult};
use framefx::frame::{FrameBuffer, Rgba8, Viewport};
use framefx::host::{FrameClock, FrameLoop, MemorySink, StaticFrameSource};
use framefx::manager::{EffectManager, EffectState};

/// Stands in for the pixel sort slot and misbehaves on demand.
#[derive(Default)]
struct ScriptedEffect {
    enabled: bool,
    fail_apply: bool,
    delay: Option<Duration>,
}

impl FrameEffect for ScriptedEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::PixelSort
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enable(&mut self, _viewport: Viewport, _config: &EffectConfig) -> EffectResult<()> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn on_resize(&mut self, _viewport: Viewport, _config: &EffectConfig) -> EffectResult<()> {
        Ok(())
    }

    fn apply(&mut self, frame: &mut FrameBuffer, _ctx: &TickContext<'_>) -> EffectResult<Surface> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.fail_apply {
            return Err(EffectError::faulted("scripted failure"));
        }
        for px in frame.pixels_mut() {
            px.r = 255 - px.r;
        }
        Ok(Surface::Frame)
    }
}

fn sort_config() -> EffectConfig {
    EffectConfig {
        enabled: true,
        effect: EffectKind::PixelSort,
        ..EffectConfig::default()
    }
}

fn bright_frame() -> FrameBuffer {
    let mut bytes = Vec::new();
    for x in 0..16u8 {
        bytes.extend_from_slice(&[200 + x, 120, 90, 255]);
    }
    FrameBuffer::from_rgba(16, 1, bytes).expect("frame")
}

#[test]
fn enable_then_disable_restores_raw_render() {
    let mut manager = EffectManager::new(Viewport::new(16, 1));
    manager.set_parameter(sort_config()).expect("enable");
    assert_eq!(manager.state(), EffectState::Enabled);
    assert!(!manager.raw_render_visible());

    let frame = bright_frame();
    let output = manager.apply(frame.clone(), 0.0);
    assert!(matches!(&output, EffectOutput::Frame(sorted) if *sorted != frame));

    manager
        .set_parameter(EffectConfig {
            enabled: false,
            ..sort_config()
        })
        .expect("disable");
    assert_eq!(manager.state(), EffectState::Disabled);
    assert!(manager.raw_render_visible());
    assert_eq!(manager.apply(frame.clone(), 0.0), EffectOutput::Raw(frame));
}

#[test]
fn apply_fault_disables_and_falls_back_to_raw() {
    let effect = ScriptedEffect {
        fail_apply: true,
        ..ScriptedEffect::default()
    };
    let mut manager = EffectManager::with_effects(Viewport::new(16, 1), vec![Box::new(effect)]);
    manager.set_parameter(sort_config()).expect("enable");

    let frame = bright_frame();
    assert_eq!(manager.apply(frame.clone(), 0.0), EffectOutput::Raw(frame.clone()));
    assert_eq!(manager.state(), EffectState::Disabled);
    assert_eq!(
        manager.take_fault(),
        Some(EffectError::faulted("scripted failure"))
    );

    // Stays off until the host re-enables it.
    assert_eq!(manager.apply(frame.clone(), 0.0), EffectOutput::Raw(frame));
    assert!(manager.fault().is_none());
}

#[test]
fn re_enabling_after_a_fault_clears_it() {
    let mut manager = EffectManager::new(Viewport::new(16, 1));
    manager
        .set_parameter(EffectConfig {
            font_size: 0,
            ..sort_config()
        })
        .expect_err("font_size 0 rejected");
    assert!(manager.fault().is_some());

    manager.set_parameter(sort_config()).expect("enable");
    assert_eq!(manager.state(), EffectState::Enabled);
    assert!(manager.fault().is_none());
}

#[test]
fn resize_while_disabled_sizes_the_next_enable() {
    let mut manager = EffectManager::new(Viewport::new(800, 600));
    manager.on_resize(120, 40).expect("resize");
    assert_eq!(manager.viewport(), Viewport::new(120, 40));

    manager
        .set_parameter(EffectConfig {
            enabled: true,
            effect: EffectKind::AsciiMosaic,
            ..EffectConfig::default()
        })
        .expect("enable ascii");
    let frame = FrameBuffer::solid(120, 40, Rgba8::new(90, 90, 90, 255)).expect("frame");
    let EffectOutput::Glyphs(canvas) = manager.apply(frame, 0.0) else {
        panic!("ascii mosaic must output glyphs");
    };
    assert_eq!((canvas.grid.cols, canvas.grid.rows), (20, 4));
}

#[test]
fn recolour_follows_the_frame_clock() {
    let mut manager = EffectManager::new(Viewport::new(16, 1));
    manager.set_parameter(sort_config()).expect("enable");

    let early = manager.apply(bright_frame(), 0.0);
    let late = manager.apply(bright_frame(), 1.0);
    let again = manager.apply(bright_frame(), 0.0);
    assert_ne!(early, late);
    assert_eq!(early, again);
}

#[test]
fn frame_loop_presents_every_frame_and_toggles_raw_once() {
    let mut manager = EffectManager::new(Viewport::new(16, 1));
    manager.set_parameter(sort_config()).expect("enable");
    let mut source = StaticFrameSource::new(bright_frame(), 3);
    let mut sink = MemorySink::default();

    let stats = FrameLoop::new(FrameClock::fixed(30))
        .run(&mut source, &mut sink, &mut manager)
        .expect("loop");

    assert_eq!(stats.frames, 3);
    assert_eq!(stats.faulted_frames, 0);
    assert_eq!(sink.raw_visible, vec![false]);
    assert!(sink
        .outputs
        .iter()
        .all(|output| matches!(output, EffectOutput::Frame(_))));
}

#[test]
fn frame_loop_keeps_running_after_a_fault() {
    let effect = ScriptedEffect {
        fail_apply: true,
        ..ScriptedEffect::default()
    };
    let mut manager = EffectManager::with_effects(Viewport::new(16, 1), vec![Box::new(effect)]);
    manager.set_parameter(sort_config()).expect("enable");
    let mut source = StaticFrameSource::new(bright_frame(), 4);
    let mut sink = MemorySink::default();

    let stats = FrameLoop::new(FrameClock::fixed(30))
        .run(&mut source, &mut sink, &mut manager)
        .expect("loop");

    assert_eq!(stats.frames, 4);
    assert_eq!(stats.faulted_frames, 1);
    assert_eq!(sink.raw_visible, vec![true]);
    assert!(sink.outputs.iter().all(EffectOutput::shows_raw_render));
}

#[test]
fn slow_frames_are_counted_not_fatal() {
    let effect = ScriptedEffect {
        delay: Some(Duration::from_millis(5)),
        ..ScriptedEffect::default()
    };
    let mut manager = EffectManager::with_effects(Viewport::new(16, 1), vec![Box::new(effect)]);
    manager.set_parameter(sort_config()).expect("enable");
    let mut source = StaticFrameSource::new(bright_frame(), 2);
    let mut sink = MemorySink::default();

    let stats = FrameLoop::new(FrameClock::fixed(30))
        .with_frame_budget(Duration::from_millis(1))
        .run(&mut source, &mut sink, &mut manager)
        .expect("loop");

    assert_eq!(stats.frames, 2);
    assert_eq!(stats.late_frames, 2);
    assert_eq!(sink.outputs.len(), 2);
}

#[test]
fn rejected_config_keeps_the_loop_presenting_raw_frames() {
    let mut manager = EffectManager::new(Viewport::new(16, 1));
    let err = manager
        .set_parameter(EffectConfig {
            sort_length: 0,
            ..sort_config()
        })
        .expect_err("sort_length 0 rejected");
    assert!(matches!(err, EffectError::InvalidConfig(_)));

    let frame = bright_frame();
    let mut source = StaticFrameSource::new(frame.clone(), 3);
    let mut sink = MemorySink::default();
    let stats = FrameLoop::new(FrameClock::fixed(30))
        .run(&mut source, &mut sink, &mut manager)
        .expect("loop");

    assert_eq!(stats.frames, 3);
    assert_eq!(stats.faulted_frames, 0);
    assert_eq!(sink.raw_visible, vec![true]);
    assert_eq!(sink.outputs, vec![EffectOutput::Raw(frame); 3]);
    assert!(manager.fault().is_none());
}
