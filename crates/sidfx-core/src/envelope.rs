//! SID Envelope Generator Emulation
//!
//! A fixed-point model of the SID's ADSR response. The level lives in
//! `0..=LEVEL_MAX` and is advanced several sub-steps per interpreter tick
//! from the voice registers the interpreter last wrote:
//!
//! - Attack rises linearly to `LEVEL_MAX`, then hands over to Decay
//! - Decay falls towards the sustain target and then holds it exactly
//! - Release falls to zero and parks the generator in Off
//!
//! The gate is edge-triggered: raising it while the generator is in Release
//! or Off restarts the attack from zero; dropping it during Attack or Decay
//! starts the release.

use serde::Serialize;

use crate::interpreter::VoiceRegisters;
use crate::tables::{CurveTables, EnvelopeRates, LEVEL_MAX};

/// Envelope phase.
///
/// Ordered so that `phase < Attack` means "not excited".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum EnvelopePhase {
    /// Falling towards zero
    Release,
    /// Silent
    Off,
    /// Rising towards the maximum
    Attack,
    /// Falling towards the sustain level
    Decay,
}

/// Envelope generator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    phase: EnvelopePhase,
    level: u16,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    /// Silent generator
    pub fn new() -> Self {
        Envelope {
            phase: EnvelopePhase::Off,
            level: 0,
        }
    }

    /// Current phase
    #[inline]
    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Current level, `0..=LEVEL_MAX`
    #[inline]
    pub fn level(&self) -> u16 {
        self.level
    }

    /// Drop into Release regardless of the gate.
    ///
    /// With the gate still raised the next [`advance`](Self::advance) sees a
    /// not-yet-excited generator and restarts the attack from zero.
    pub fn force_release(&mut self) {
        self.phase = EnvelopePhase::Release;
    }

    /// Advance one sub-step using the effective voice registers.
    pub fn advance(&mut self, voice: &VoiceRegisters, rates: &EnvelopeRates, curves: &CurveTables) {
        if voice.control.gate() {
            if self.phase < EnvelopePhase::Attack {
                self.phase = EnvelopePhase::Attack;
                self.level = 0;
            }
        } else if self.phase >= EnvelopePhase::Attack {
            self.phase = EnvelopePhase::Release;
        }

        let level = u32::from(self.level);
        match self.phase {
            EnvelopePhase::Attack => {
                let next = level + rates.attack_step(voice.attack_decay >> 4);
                if next >= u32::from(LEVEL_MAX) {
                    self.level = LEVEL_MAX;
                    self.phase = EnvelopePhase::Decay;
                } else {
                    self.level = next as u16;
                }
            }
            EnvelopePhase::Decay => {
                let target = u32::from(curves.sustain_target(voice.sustain_release >> 4));
                let step = rates.decay_step(voice.attack_decay);
                if level > target + step {
                    self.level = (level - step) as u16;
                } else if level > target {
                    self.level = target as u16;
                }
            }
            EnvelopePhase::Release => {
                let step = rates.decay_step(voice.sustain_release);
                if level > step {
                    self.level = (level - step) as u16;
                } else {
                    self.level = 0;
                    self.phase = EnvelopePhase::Off;
                }
            }
            EnvelopePhase::Off => {}
        }
    }

    /// Bar height for the current level.
    ///
    /// During the attack the level rises linearly, so the high bits are used
    /// directly; afterwards the exponential level curve applies.
    pub fn bar(&self, curves: &CurveTables) -> u8 {
        match self.phase {
            EnvelopePhase::Attack => (self.level >> 8) as u8,
            _ => curves.level_bar(self.level),
        }
    }
}
