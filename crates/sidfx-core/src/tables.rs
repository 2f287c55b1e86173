//! Envelope Curve Tables
//!
//! Lookup tables shared by the envelope emulator and the bar renderer:
//!
//! - Attack/decay step tables derived from the SID's rate time constants
//! - A logarithmic sustain table mapping a sustain nibble into level space
//! - An exponential level curve mapping envelope energy to a 0-31 bar height
//! - A base-2 log table compressing a frequency high byte to a 0-31 bar height
//!
//! The curves only depend on fixed constants and are built once per process.
//! The step tables depend on the assumed tick period and are built per
//! [`SimConfig`](crate::SimConfig).

use std::sync::OnceLock;

/// Maximum envelope level (fixed-point, 5 integer bits over 8 fractional bits)
pub const LEVEL_MAX: u16 = 32 * 256 - 1;

/// Largest bar height produced by any table
pub const BAR_MAX: u8 = 31;

/// Envelope sub-steps advanced per interpreter tick
pub const ENVELOPE_SUBSTEPS: usize = 4;

/// Time constant of the exponential curves (in level-curve index units)
pub const CURVE_K: f64 = 54.0;

/// Upper end of the level-curve index range
pub const CURVE_L: f64 = 255.0;

/// Attack times in milliseconds for rate nibbles 0-15 (SID datasheet)
pub const ATTACK_MS: [u32; 16] = [
    2, 8, 16, 24, 38, 56, 68, 80, 100, 250, 500, 800, 1000, 3000, 5000, 8000,
];

/// Decay/release times in milliseconds for rate nibbles 0-15 (3x attack)
pub const DECAY_MS: [u32; 16] = [
    6, 24, 48, 72, 114, 168, 204, 240, 300, 750, 1500, 2400, 3000, 9000, 15000, 24000,
];

/// Per-sub-step envelope increments for one tick period.
///
/// `ASTEP = LEVEL_MAX * tick_ms / ENVELOPE_SUBSTEPS` is the level change that
/// covers the full range in one millisecond-equivalent of rate; each table
/// entry divides it by the rate's time constant so the ratios between rates
/// are exactly those of the time constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeRates {
    attack: [u32; 16],
    decay: [u32; 16],
}

impl EnvelopeRates {
    /// Build the step tables for a tick period in milliseconds.
    pub fn for_tick_ms(tick_ms: u32) -> Self {
        let astep = u64::from(LEVEL_MAX) * u64::from(tick_ms) / ENVELOPE_SUBSTEPS as u64;
        // A zero step would stall the phase forever on very short ticks.
        // Anything past u16::MAX already crosses the whole level range.
        let step = |ms: u32| (astep / u64::from(ms)).clamp(1, u64::from(u16::MAX)) as u32;
        let attack = std::array::from_fn(|i| step(ATTACK_MS[i]));
        let decay = std::array::from_fn(|i| step(DECAY_MS[i]));
        Self { attack, decay }
    }

    /// Attack increment for an attack nibble
    #[inline]
    pub fn attack_step(&self, nibble: u8) -> u32 {
        self.attack[(nibble & 0x0F) as usize]
    }

    /// Decay/release decrement for a decay or release nibble
    #[inline]
    pub fn decay_step(&self, nibble: u8) -> u32 {
        self.decay[(nibble & 0x0F) as usize]
    }
}

impl Default for EnvelopeRates {
    fn default() -> Self {
        Self::for_tick_ms(crate::config::PAL_TICK_MS)
    }
}

/// Fixed non-linear curves, computed once at first use.
#[derive(Debug, Clone)]
pub struct CurveTables {
    /// Envelope energy (level >> 5) to perceptual bar height
    pub level_curve: [u8; 256],
    /// Sustain nibble to level-curve index (shift left by 5 for level space)
    pub sustain_count: [u8; 16],
    /// Frequency high byte to bar height, `floor(log2(i) * 4)`
    pub log2: [u8; 256],
}

impl CurveTables {
    fn new() -> Self {
        let top = (CURVE_L / CURVE_K).exp();

        let level_curve = std::array::from_fn(|i| {
            let v = f64::from(BAR_MAX) * (i as f64 / CURVE_K).exp() / top;
            v.round().clamp(0.0, f64::from(BAR_MAX)) as u8
        });

        // ln(0) is -inf: sustain nibble 0 means silence
        let sustain_count = std::array::from_fn(|i| {
            if i == 0 {
                0
            } else {
                let v = CURVE_K * (i as f64 * top / 15.0).ln();
                v.round().clamp(0.0, CURVE_L) as u8
            }
        });

        let log2 = std::array::from_fn(|i| {
            if i == 0 {
                0
            } else {
                ((i as f64).log2() * 4.0).floor() as u8
            }
        });

        CurveTables {
            level_curve,
            sustain_count,
            log2,
        }
    }

    /// Decay target in level space for a sustain nibble
    #[inline]
    pub fn sustain_target(&self, nibble: u8) -> u16 {
        u16::from(self.sustain_count[(nibble & 0x0F) as usize]) << 5
    }

    /// Bar height for an envelope level outside the attack phase
    #[inline]
    pub fn level_bar(&self, level: u16) -> u8 {
        self.level_curve[(level.min(LEVEL_MAX) >> 5) as usize]
    }

    /// Bar height for an effective frequency
    #[inline]
    pub fn frequency_bar(&self, frequency: u16) -> u8 {
        self.log2[(frequency >> 8) as usize]
    }
}

static CURVES: OnceLock<CurveTables> = OnceLock::new();

/// Shared curve tables (built on first call)
pub fn curves() -> &'static CurveTables {
    CURVES.get_or_init(CurveTables::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn level_formula(i: usize) -> f64 {
        31.0 * (i as f64 / CURVE_K).exp() / (CURVE_L / CURVE_K).exp()
    }

    #[test]
    fn test_level_curve_matches_formula() {
        let tables = curves();
        for i in [0usize, 64, 200, 255] {
            assert_abs_diff_eq!(
                f64::from(tables.level_curve[i]),
                level_formula(i),
                epsilon = 1.0
            );
        }
        assert_eq!(tables.level_curve[0], 0);
        assert_eq!(tables.level_curve[255], BAR_MAX);
    }

    #[test]
    fn test_level_curve_monotonic() {
        let tables = curves();
        for i in 1..256 {
            assert!(
                tables.level_curve[i] >= tables.level_curve[i - 1],
                "level curve drops at {}: {} < {}",
                i,
                tables.level_curve[i],
                tables.level_curve[i - 1]
            );
        }
    }

    #[test]
    fn test_sustain_table_endpoints() {
        let tables = curves();
        assert_eq!(tables.sustain_count[0], 0);
        assert_eq!(tables.sustain_count[15], 255);
        // 255 - 54 * ln(15) = 108.76
        assert_eq!(tables.sustain_count[1], 109);
        assert_eq!(tables.sustain_target(15), 255 << 5);
        assert!(tables.sustain_target(15) <= LEVEL_MAX);
    }

    #[test]
    fn test_sustain_midpoint_is_perceptual_half() {
        let tables = curves();
        // A mid sustain nibble lands well above the linear midpoint of the
        // level index range, but maps back to roughly half bar height.
        let mid = tables.sustain_count[8];
        assert!(mid > 128, "sustain 8 should be above linear half, got {mid}");
        let bar = tables.level_curve[mid as usize];
        assert!((13..=18).contains(&bar), "sustain 8 bar height {bar}");
    }

    #[test]
    fn test_log2_table() {
        let tables = curves();
        assert_eq!(tables.log2[0], 0);
        assert_eq!(tables.log2[1], 0);
        assert_eq!(tables.log2[2], 4);
        assert_eq!(tables.log2[3], 6);
        assert_eq!(tables.log2[16], 16);
        assert_eq!(tables.log2[255], 31);
        assert_eq!(tables.frequency_bar(0xFFFF), 31);
        // 1000 >> 8 = 3
        assert_eq!(tables.frequency_bar(1000), 6);
    }

    #[test]
    fn test_pal_rates() {
        let rates = EnvelopeRates::for_tick_ms(20);
        // ASTEP = 8191 * 20 / 4 = 40955
        assert_eq!(rates.attack_step(0), 40955 / 2);
        assert_eq!(rates.attack_step(15), 40955 / 8000);
        assert_eq!(rates.decay_step(0), 40955 / 6);
        assert_eq!(rates.decay_step(15), 40955 / 24000);
        assert!(rates.attack_step(0) > LEVEL_MAX as u32 / 2);
    }

    #[test]
    fn test_rates_scale_with_tick_period() {
        let slow = EnvelopeRates::for_tick_ms(20);
        let fast = EnvelopeRates::for_tick_ms(10);
        for nibble in 0..8u8 {
            let ratio = slow.attack_step(nibble) as f64 / fast.attack_step(nibble) as f64;
            assert_abs_diff_eq!(ratio, 2.0, epsilon = 0.01);
        }
    }

    #[test]
    fn test_rates_never_zero() {
        let rates = EnvelopeRates::for_tick_ms(1);
        for nibble in 0..16u8 {
            assert!(rates.attack_step(nibble) >= 1);
            assert!(rates.decay_step(nibble) >= 1);
        }
    }

    #[test]
    fn test_rates_saturate_on_long_ticks() {
        for tick_ms in [600_000, u32::MAX] {
            let rates = EnvelopeRates::for_tick_ms(tick_ms);
            for nibble in 0..16u8 {
                assert_eq!(rates.attack_step(nibble), u32::from(u16::MAX));
                assert!(rates.decay_step(nibble) >= u32::from(LEVEL_MAX));
                assert!(rates.decay_step(nibble) <= u32::from(u16::MAX));
            }
        }
    }

    #[test]
    fn test_rates_mask_nibble() {
        let rates = EnvelopeRates::default();
        assert_eq!(rates.attack_step(0xF3), rates.attack_step(0x03));
        assert_eq!(rates.decay_step(0x10), rates.decay_step(0x00));
    }
}
