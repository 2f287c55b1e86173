//! Effect Simulator
//!
//! Host-facing API: [`Simulator::reset`] snapshots a program and starts a run,
//! [`Simulator::tick`] advances the interpreter once and the envelope
//! [`ENVELOPE_SUBSTEPS`] times, and [`Simulator::sample`] reads the latest
//! (envelope, frequency) bar heights. A run is bounded by
//! [`SimConfig::max_ticks`]; ticks past the bound are ignored.

use serde::Serialize;

use crate::config::SimConfig;
use crate::envelope::{Envelope, EnvelopePhase};
use crate::interpreter::{Interpreter, PlayState, Transition};
use crate::program::{EffectProgram, Segment, MAX_SEGMENTS};
use crate::tables::{curves, EnvelopeRates, ENVELOPE_SUBSTEPS};

/// Interpreter ticks per 8-pixel bar cell
pub const TICKS_PER_COLUMN: usize = 2;

/// Samples (pixel columns) per bar cell
pub const SAMPLES_PER_COLUMN: usize = TICKS_PER_COLUMN * ENVELOPE_SUBSTEPS;

/// Bar heights for one envelope sub-step, both in `0..=31`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Sample {
    /// Perceptual envelope loudness
    pub envelope: u8,
    /// Log-scaled pitch
    pub frequency: u8,
}

/// One row of a simulation trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickTrace {
    /// Ticks completed so far
    pub tick: usize,
    /// Interpreter state after the tick
    pub state: PlayState,
    /// Segment index
    pub position: usize,
    /// Pending delay
    pub delay: u8,
    /// Envelope phase after the last sub-step
    pub phase: EnvelopePhase,
    /// Envelope level after the last sub-step
    pub level: u16,
    /// Effective frequency
    pub frequency: u16,
    /// Effective pulse width
    pub pulse_width: u16,
    /// Envelope bar height
    pub envelope_bar: u8,
    /// Frequency bar height
    pub frequency_bar: u8,
}

/// A single simulated voice
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimConfig,
    rates: EnvelopeRates,
    program: Vec<Segment>,
    interpreter: Interpreter,
    envelope: Envelope,
    ticks: usize,
    last: [Sample; ENVELOPE_SUBSTEPS],
}

impl Simulator {
    /// Create a simulator with an empty program; call [`reset`](Self::reset)
    /// before ticking.
    pub fn new(config: SimConfig) -> Self {
        Simulator {
            rates: EnvelopeRates::for_tick_ms(config.tick_ms),
            config,
            program: Vec::with_capacity(MAX_SEGMENTS),
            interpreter: Interpreter::new(),
            envelope: Envelope::new(),
            ticks: 0,
            last: [Sample::default(); ENVELOPE_SUBSTEPS],
        }
    }

    /// Discard all state and start a new run of `program`.
    ///
    /// The program is copied, so later edits never reach a run in flight.
    pub fn reset(&mut self, program: &EffectProgram) {
        self.program.clear();
        self.program.extend_from_slice(program.segments());
        self.interpreter = Interpreter::new();
        self.envelope = Envelope::new();
        self.ticks = 0;
        self.last = [Sample::default(); ENVELOPE_SUBSTEPS];
        tracing::debug!(
            segments = self.program.len(),
            max_ticks = self.config.max_ticks(),
            "simulator reset"
        );
    }

    /// Advance one tick. Does nothing once the run is finished.
    pub fn tick(&mut self) {
        if self.is_finished() {
            return;
        }

        if self.interpreter.tick(&self.program) == Transition::ForceRelease {
            self.envelope.force_release();
        }

        let tables = curves();
        let voice = *self.interpreter.voice();
        let frequency = tables.frequency_bar(voice.frequency);
        for slot in self.last.iter_mut() {
            self.envelope.advance(&voice, &self.rates, tables);
            *slot = Sample {
                envelope: self.envelope.bar(tables),
                frequency,
            };
        }
        self.ticks += 1;
    }

    /// Latest sample
    pub fn sample(&self) -> Sample {
        self.last[ENVELOPE_SUBSTEPS - 1]
    }

    /// All samples produced by the latest tick, oldest first
    pub fn samples(&self) -> &[Sample; ENVELOPE_SUBSTEPS] {
        &self.last
    }

    /// Whether the tick bound has been reached
    pub fn is_finished(&self) -> bool {
        self.ticks >= self.config.max_ticks()
    }

    /// Ticks completed in this run
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Interpreter state
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Envelope state
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Active configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Snapshot of the current state for trace output
    pub fn trace(&self) -> TickTrace {
        let voice = self.interpreter.voice();
        let sample = self.sample();
        TickTrace {
            tick: self.ticks,
            state: self.interpreter.state(),
            position: self.interpreter.position(),
            delay: self.interpreter.delay(),
            phase: self.envelope.phase(),
            level: self.envelope.level(),
            frequency: voice.frequency,
            pulse_width: voice.pulse_width,
            envelope_bar: sample.envelope,
            frequency_bar: sample.frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ControlBits;

    fn program_of(segments: &[Segment]) -> EffectProgram {
        EffectProgram::from_segments(segments.to_vec()).unwrap()
    }

    #[test]
    fn test_tick_stops_at_bound() {
        let config = SimConfig {
            columns: 2,
            columns_per_frame: 1,
            ..SimConfig::default()
        };
        let mut sim = Simulator::new(config);
        sim.reset(&EffectProgram::new());
        for _ in 0..10 {
            sim.tick();
        }
        assert_eq!(sim.ticks(), 4);
        assert!(sim.is_finished());

        let before = sim.trace();
        sim.tick();
        assert_eq!(sim.trace(), before, "tick past the bound must be a no-op");
    }

    #[test]
    fn test_reset_restarts_from_scratch() {
        let mut sim = Simulator::new(SimConfig::default());
        let program = EffectProgram::new();
        sim.reset(&program);
        for _ in 0..3 {
            sim.tick();
        }
        assert_eq!(sim.envelope().phase(), EnvelopePhase::Decay);
        assert_ne!(sim.envelope().level(), 0);

        sim.reset(&program);
        assert_eq!(sim.ticks(), 0);
        assert_eq!(sim.interpreter(), &Interpreter::new());
        assert_eq!(sim.envelope(), &Envelope::new());
        assert_eq!(sim.sample(), Sample::default());
    }

    #[test]
    fn test_long_tick_period_saturates() {
        let config = SimConfig {
            tick_ms: 600_000,
            ..SimConfig::default()
        };
        let mut sim = Simulator::new(config);
        sim.reset(&EffectProgram::new());
        sim.tick();
        assert_eq!(sim.envelope().phase(), EnvelopePhase::Decay);
        assert_eq!(sim.envelope().level(), curves().sustain_target(8));
        while !sim.is_finished() {
            sim.tick();
            assert!(sim.envelope().level() <= crate::tables::LEVEL_MAX);
        }
        assert_eq!(sim.envelope().level(), 0);
    }

    #[test]
    fn test_first_tick_produces_samples() {
        let mut sim = Simulator::new(SimConfig::default());
        sim.reset(&EffectProgram::new());
        sim.tick();
        assert_eq!(sim.interpreter().state(), PlayState::Playing);
        // 1000 >> 8 = 3, floor(log2(3) * 4) = 6
        assert!(sim.samples().iter().all(|s| s.frequency == 6));
        assert!(sim.samples().iter().all(|s| s.envelope > 0));
        assert_eq!(sim.sample(), sim.samples()[ENVELOPE_SUBSTEPS - 1]);
    }

    #[test]
    fn test_run_is_isolated_from_later_edits() {
        let mut sim = Simulator::new(SimConfig::default());
        let mut program = EffectProgram::new();
        sim.reset(&program);
        program.segment_mut(0).unwrap().frequency = 0xFFFF;
        sim.tick();
        assert_eq!(sim.interpreter().voice().frequency, 1000);
    }

    #[test]
    fn test_ungated_program_stays_silent() {
        let segment = Segment {
            control: ControlBits::SAWTOOTH,
            gate_ticks: 0,
            release_ticks: 6,
            ..Segment::default()
        };
        let mut sim = Simulator::new(SimConfig::default());
        sim.reset(&program_of(&[segment]));
        while !sim.is_finished() {
            sim.tick();
            assert_eq!(sim.envelope().phase(), EnvelopePhase::Off);
            assert_eq!(sim.sample().envelope, 0);
        }
    }
}
