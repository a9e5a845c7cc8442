//! HSL colour math and the hue-cycling recolour applied to sorted runs.

use crate::frame::Rgba8;

/// Saturation added to every recoloured pixel before clamping to 1.0.
pub const SATURATION_BOOST: f32 = 0.5;
/// Weight of the pixel's position inside its sorted run on the hue shift.
pub const POSITION_HUE_WEIGHT: f32 = 0.5;
/// Hue revolutions per second contributed by the frame clock.
pub const TIME_HUE_RATE: f64 = 0.2;

/// Hue, saturation and lightness, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HslColor {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl HslColor {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let r = f32::from(r) / 255.0;
        let g = f32::from(g) / 255.0;
        let b = f32::from(b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;

        if max == min {
            return Self { h: 0.0, s: 0.0, l };
        }

        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };

        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };

        Self { h: h / 6.0, s, l }
    }

    /// Convert back to 8-bit channels. Each channel is floored, not rounded.
    pub fn to_rgb(self) -> [u8; 3] {
        let (r, g, b) = if self.s == 0.0 {
            (self.l, self.l, self.l)
        } else {
            let q = if self.l < 0.5 {
                self.l * (1.0 + self.s)
            } else {
                self.l + self.s - self.l * self.s
            };
            let p = 2.0 * self.l - q;
            (
                hue_to_channel(p, q, self.h + 1.0 / 3.0),
                hue_to_channel(p, q, self.h),
                hue_to_channel(p, q, self.h - 1.0 / 3.0),
            )
        };

        [floor_channel(r), floor_channel(g), floor_channel(b)]
    }
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = if t < 0.0 {
        t + 1.0
    } else if t > 1.0 {
        t - 1.0
    } else {
        t
    };

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[inline(always)]
fn floor_channel(value: f32) -> u8 {
    (value * 255.0).floor().clamp(0.0, 255.0) as u8
}

/// Per-frame recolour parameters.
///
/// `time_seconds` is sampled once per tick by the caller so every pixel of a
/// frame shares the same clock value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recolorer {
    pub sort_length: u32,
    /// Kept in f64 so long-running clocks still resolve sub-frame steps.
    pub time_seconds: f64,
}

impl Recolorer {
    pub fn new(sort_length: u32, time_seconds: f64) -> Self {
        Self {
            sort_length,
            time_seconds,
        }
    }

    /// Hue rotation for output slot `idx` of a run of `run_len` pixels.
    pub fn hue_shift(&self, idx: usize, run_len: usize) -> f32 {
        let position_in_sort = idx as f32 / run_len as f32;
        let sort_intensity = run_len as f32 / self.sort_length as f32;
        let clock_turns = (self.time_seconds * TIME_HUE_RATE).rem_euclid(1.0) as f32;
        (position_in_sort * sort_intensity * POSITION_HUE_WEIGHT + clock_turns).rem_euclid(1.0)
    }

    /// HSL after the hue rotation and the clamped saturation boost.
    pub fn shift_hsl(&self, hsl: HslColor, idx: usize, run_len: usize) -> HslColor {
        HslColor {
            h: (hsl.h + self.hue_shift(idx, run_len)).rem_euclid(1.0),
            s: (hsl.s + SATURATION_BOOST).min(1.0),
            l: hsl.l,
        }
    }

    /// Rotate hue, boost saturation (clamped at 1.0) and keep lightness and alpha.
    pub fn recolor(&self, pixel: Rgba8, idx: usize, run_len: usize) -> Rgba8 {
        let hsl = HslColor::from_rgb(pixel.r, pixel.g, pixel.b);
        let [r, g, b] = self.shift_hsl(hsl, idx, run_len).to_rgb();
        Rgba8::new(r, g, b, pixel.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_within_one(actual: [u8; 3], expected: [u8; 3]) {
        for channel in 0..3 {
            let diff = i16::from(actual[channel]) - i16::from(expected[channel]);
            assert!(
                diff.abs() <= 1,
                "channel {channel}: expected {:?}, got {:?}",
                expected,
                actual
            );
        }
    }

    #[test]
    fn round_trip_stays_within_one_step() {
        for r in (0..=255_u16).step_by(15) {
            for g in (0..=255_u16).step_by(17) {
                for b in (0..=255_u16).step_by(51) {
                    let rgb = [r as u8, g as u8, b as u8];
                    let back = HslColor::from_rgb(rgb[0], rgb[1], rgb[2]).to_rgb();
                    assert_within_one(back, rgb);
                }
            }
        }
    }

    #[test]
    fn primaries_have_expected_hues() {
        let red = HslColor::from_rgb(255, 0, 0);
        assert!(red.h.abs() < 1e-6);
        assert!((red.s - 1.0).abs() < 1e-6);
        assert!((red.l - 0.5).abs() < 1e-6);

        let green = HslColor::from_rgb(0, 255, 0);
        assert!((green.h - 1.0 / 3.0).abs() < 1e-6);

        let blue = HslColor::from_rgb(0, 0, 255);
        assert!((blue.h - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn grey_has_zero_saturation() {
        let grey = HslColor::from_rgb(128, 128, 128);
        assert_eq!(grey.s, 0.0);
        assert_eq!(grey.h, 0.0);
    }

    #[test]
    fn saturation_boost_clamps_at_one() {
        let recolorer = Recolorer::new(80, 0.0);
        let source = HslColor {
            h: 0.1,
            s: 0.8,
            l: 0.5,
        };
        let shifted = recolorer.shift_hsl(source, 0, 1);
        assert_eq!(shifted.s, 1.0);
        assert_eq!(shifted.l, 0.5);

        let unsaturated = HslColor { s: 0.2, ..source };
        assert!((recolorer.shift_hsl(unsaturated, 0, 1).s - 0.7).abs() < 1e-6);
    }

    #[test]
    fn fully_saturated_output_pins_one_channel_at_zero() {
        // l = 0.5 and s = 1 put the extreme channels at 255 and 0.
        let source = HslColor {
            h: 0.1,
            s: 0.8,
            l: 0.5,
        };
        let [r, g, b] = source.to_rgb();
        let out = Recolorer::new(80, 0.0).recolor(Rgba8::new(r, g, b, 200), 0, 1);
        assert_eq!(out.a, 200);
        assert!(out.r.min(out.g).min(out.b) <= 1);
    }

    #[test]
    fn hue_clock_keeps_frame_resolution_after_hours() {
        let t = 100_000.0;
        let frame = 1.0 / 60.0;
        let a = Recolorer::new(80, t).hue_shift(0, 1);
        let b = Recolorer::new(80, t + frame).hue_shift(0, 1);
        let expected = (frame * TIME_HUE_RATE) as f32;
        assert!((b - a - expected).abs() < 1e-5, "step was {}", b - a);
    }

    #[test]
    fn recolor_preserves_alpha() {
        let recolorer = Recolorer::new(80, 3.25);
        let out = recolorer.recolor(Rgba8::new(200, 40, 90, 77), 3, 6);
        assert_eq!(out.a, 77);
    }

    #[test]
    fn hue_shift_wraps_into_unit_interval() {
        let recolorer = Recolorer::new(10, 4.9);
        // 0.9 * 1.0 * 0.5 + 4.9 * 0.2 = 1.43 -> 0.43
        let shift = recolorer.hue_shift(9, 10);
        assert!((shift - 0.43).abs() < 1e-4, "shift was {shift}");

        let negative_clock = Recolorer::new(10, -1.0);
        let shift = negative_clock.hue_shift(0, 10);
        assert!((0.0..1.0).contains(&shift));
        assert!((shift - 0.8).abs() < 1e-5);
    }

    #[test]
    fn recolor_is_deterministic_for_same_clock() {
        let recolorer = Recolorer::new(80, 12.5);
        let px = Rgba8::new(210, 140, 33, 255);
        assert_eq!(recolorer.recolor(px, 4, 9), recolorer.recolor(px, 4, 9));
    }

    #[test]
    fn lightness_survives_recolor() {
        let recolorer = Recolorer::new(80, 0.7);
        let px = Rgba8::new(180, 90, 60, 255);
        let before = HslColor::from_rgb(px.r, px.g, px.b).l;
        let out = recolorer.recolor(px, 2, 5);
        let after = HslColor::from_rgb(out.r, out.g, out.b).l;
        assert!((before - after).abs() <= 1.0 / 255.0 + 1e-6);
    }
}
