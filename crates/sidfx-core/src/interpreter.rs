//! Segment Interpreter
//!
//! Walks an effect program the way the playback driver does. Each tick the
//! pending delay is decremented; while it is non-zero the active segment's
//! glides are applied to the effective frequency and pulse width. When the
//! delay reaches zero the state machine is re-evaluated until a transition
//! sets a non-zero delay again, so a single tick may pass through several
//! states.
//!
//! State diagram:
//!
//! ```text
//!            +--------------------------- gate clear ---+
//!            v                                          |
//!   Ready --(gated)--> Playing --(release_ticks)--> Waiting --(next gated)--> ResetZero --> Ready
//!     |                   |                             |
//!     |                   +--(no release, next)--> Ready
//!     |                   +--(no release, end)---> ResetZero
//!     +--(end of program)--> Idle
//! ```

use serde::Serialize;

use crate::program::{ControlBits, Segment};

/// Interpreter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlayState {
    /// Nothing left to play
    Idle,
    /// Clear the voice for one tick before the next gated segment
    ResetZero,
    /// Load the segment at the current position
    Ready,
    /// Segment active with gate held
    Playing,
    /// Segment active with gate released
    Waiting,
}

/// Effect of a state transition on the envelope emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No envelope side effect
    Plain,
    /// Force the envelope into its release phase
    ForceRelease,
}

/// Effective voice registers as the driver last wrote them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceRegisters {
    /// Waveform and gate bits
    pub control: ControlBits,
    /// Attack/decay nibbles
    pub attack_decay: u8,
    /// Sustain/release nibbles
    pub sustain_release: u8,
    /// Frequency after glides
    pub frequency: u16,
    /// Pulse width after glides
    pub pulse_width: u16,
}

impl VoiceRegisters {
    fn load(&mut self, segment: &Segment) {
        self.frequency = segment.frequency;
        self.pulse_width = segment.pulse_width;
        self.attack_decay = segment.attack_decay;
        self.sustain_release = segment.sustain_release;
        self.control = segment.control;
    }

    fn glide(&mut self, segment: &Segment) {
        // The editor bounds glides; wrap like the driver's 16-bit registers
        self.frequency = self.frequency.wrapping_add_signed(segment.freq_glide);
        self.pulse_width = self.pulse_width.wrapping_add_signed(segment.pulse_glide);
    }
}

/// Program walker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpreter {
    state: PlayState,
    position: usize,
    delay: u8,
    voice: VoiceRegisters,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Fresh interpreter about to load the first segment on its first tick
    pub fn new() -> Self {
        Interpreter {
            state: PlayState::Ready,
            position: 0,
            delay: 1,
            voice: VoiceRegisters::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Index of the segment driving playback
    pub fn position(&self) -> usize {
        self.position
    }

    /// Ticks until the next re-evaluation
    pub fn delay(&self) -> u8 {
        self.delay
    }

    /// Effective voice registers
    pub fn voice(&self) -> &VoiceRegisters {
        &self.voice
    }

    /// Pure state transition, evaluated when the delay has run out.
    pub fn transition(self, program: &[Segment]) -> (Interpreter, Transition) {
        let mut next = self;
        let mut effect = Transition::Plain;

        match self.state {
            PlayState::Idle => {
                next.delay = 1;
            }
            PlayState::ResetZero => {
                next.voice.control = ControlBits::empty();
                next.voice.attack_decay = 0;
                next.voice.sustain_release = 0;
                next.state = PlayState::Ready;
                next.delay = 1;
            }
            PlayState::Ready => match program.get(self.position) {
                Some(segment) => {
                    next.voice.load(segment);
                    if segment.gated() {
                        next.delay = segment.gate_ticks;
                        next.state = PlayState::Playing;
                    } else {
                        next.delay = segment.release_ticks;
                        next.state = PlayState::Waiting;
                    }
                }
                None => next.state = PlayState::Idle,
            },
            PlayState::Playing => match program.get(self.position) {
                Some(segment) if segment.release_ticks != 0 => {
                    next.voice.control = segment.control - ControlBits::GATE;
                    next.delay = segment.release_ticks - 1;
                    next.state = PlayState::Waiting;
                }
                Some(segment) => {
                    next.position += 1;
                    match program.get(next.position) {
                        Some(following) => {
                            // Legato quirk of the driver: a fast-attack gated
                            // segment with a louder sustain restarts the envelope.
                            if following.attack_decay & 0xEF == 0
                                && following.gated()
                                && following.sustain() > segment.sustain()
                            {
                                effect = Transition::ForceRelease;
                            }
                            next.state = PlayState::Ready;
                        }
                        None => next.state = PlayState::ResetZero,
                    }
                }
                None => next.state = PlayState::Idle,
            },
            PlayState::Waiting => {
                next.position += 1;
                next.state = match program.get(next.position) {
                    Some(following) if following.gated() => PlayState::ResetZero,
                    Some(_) => PlayState::Ready,
                    None => PlayState::ResetZero,
                };
            }
        }

        tracing::trace!(
            from = ?self.state,
            to = ?next.state,
            position = next.position,
            delay = next.delay,
            "interpreter transition"
        );
        (next, effect)
    }

    /// Advance one tick. Returns the strongest envelope side effect raised by
    /// the transitions taken during this tick.
    pub fn tick(&mut self, program: &[Segment]) -> Transition {
        let active = program.get(self.position);

        self.delay = self.delay.saturating_sub(1);
        if self.delay != 0 {
            if let Some(segment) = active {
                self.voice.glide(segment);
            }
        }

        let mut effect = Transition::Plain;
        while self.delay == 0 {
            let (next, raised) = self.transition(program);
            *self = next;
            if raised == Transition::ForceRelease {
                effect = raised;
            }
        }
        effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gated(gate_ticks: u8, release_ticks: u8) -> Segment {
        Segment {
            gate_ticks,
            release_ticks,
            ..Segment::default()
        }
    }

    fn released(release_ticks: u8) -> Segment {
        let mut seg = gated(0, release_ticks);
        seg.set_gate(false);
        seg
    }

    #[test]
    fn test_first_tick_loads_segment() {
        let program = [gated(4, 0)];
        let mut interp = Interpreter::new();
        interp.tick(&program);
        assert_eq!(interp.state(), PlayState::Playing);
        assert_eq!(interp.delay(), 4);
        assert_eq!(interp.voice().frequency, 1000);
        assert!(interp.voice().control.gate());
    }

    #[test]
    fn test_idle_is_terminal() {
        let program = [gated(1, 0)];
        let mut interp = Interpreter::new();
        for _ in 0..10 {
            interp.tick(&program);
        }
        assert_eq!(interp.state(), PlayState::Idle);
        assert_eq!(interp.delay(), 1);
        let before = interp;
        interp.tick(&program);
        assert_eq!(interp, before);
    }

    #[test]
    fn test_gated_segment_releases_locally() {
        let program = [gated(2, 3)];
        let mut interp = Interpreter::new();
        interp.tick(&program); // Ready -> Playing, delay 2
        interp.tick(&program); // delay 1
        assert!(interp.voice().control.gate());
        interp.tick(&program); // Playing -> Waiting, delay 2
        assert_eq!(interp.state(), PlayState::Waiting);
        assert_eq!(interp.delay(), 2);
        assert!(!interp.voice().control.gate());
        assert!(interp.voice().control.contains(ControlBits::SAWTOOTH));
    }

    #[test]
    fn test_release_of_one_tick_falls_through() {
        // release_ticks == 1 leaves a zero delay, so Waiting runs in the same tick
        let program = [gated(1, 1), gated(1, 0)];
        let mut interp = Interpreter::new();
        interp.tick(&program); // Playing, delay 1
        interp.tick(&program); // Playing -> Waiting -> ResetZero -> Ready
        assert_eq!(interp.state(), PlayState::Ready);
        assert_eq!(interp.position(), 1);
        assert_eq!(interp.voice().control, ControlBits::empty());
    }

    #[test]
    fn test_waiting_before_gated_segment_resets_voice() {
        let program = [released(1), gated(3, 0)];
        let mut interp = Interpreter::new();
        interp.tick(&program); // Ready -> Waiting, delay 1
        assert_eq!(interp.state(), PlayState::Waiting);
        interp.tick(&program); // Waiting -> ResetZero -> Ready, voice cleared
        assert_eq!(interp.state(), PlayState::Ready);
        assert_eq!(interp.delay(), 1);
        assert_eq!(interp.voice().control, ControlBits::empty());
        assert_eq!(interp.voice().attack_decay, 0);
        interp.tick(&program); // Ready -> Playing
        assert_eq!(interp.state(), PlayState::Playing);
        assert_eq!(interp.position(), 1);
    }

    #[test]
    fn test_waiting_before_ungated_segment_continues() {
        let program = [released(1), released(2)];
        let mut interp = Interpreter::new();
        interp.tick(&program);
        interp.tick(&program); // Waiting -> Ready -> Waiting (segment 1)
        assert_eq!(interp.state(), PlayState::Waiting);
        assert_eq!(interp.position(), 1);
        assert_eq!(interp.delay(), 2);
    }

    #[test]
    fn test_back_to_back_gated_segments_skip_reset() {
        let mut second = gated(2, 0);
        second.frequency = 2000;
        let program = [gated(1, 0), second];
        let mut interp = Interpreter::new();
        interp.tick(&program);
        interp.tick(&program); // Playing -> Ready -> Playing(1)
        assert_eq!(interp.state(), PlayState::Playing);
        assert_eq!(interp.position(), 1);
        assert_eq!(interp.voice().frequency, 2000);
        assert!(interp.voice().control.gate());
    }

    #[test]
    fn test_force_release_lookahead() {
        let mut first = gated(1, 0);
        first.sustain_release = 0x40;
        let mut second = gated(2, 0);
        second.attack_decay = 0x10; // attack bit 0 is ignored by the mask
        second.sustain_release = 0x80;

        let program = [first, second];
        let mut interp = Interpreter::new();
        assert_eq!(interp.tick(&program), Transition::Plain);
        assert_eq!(interp.tick(&program), Transition::ForceRelease);

        // Quieter follow-up: no forced release
        let mut quieter = second;
        quieter.sustain_release = 0x20;
        let program = [first, quieter];
        let mut interp = Interpreter::new();
        interp.tick(&program);
        assert_eq!(interp.tick(&program), Transition::Plain);

        // Non-zero decay disables the rule
        let mut slow = second;
        slow.attack_decay = 0x01;
        let program = [first, slow];
        let mut interp = Interpreter::new();
        interp.tick(&program);
        assert_eq!(interp.tick(&program), Transition::Plain);
    }

    #[test]
    fn test_pure_transition_does_not_mutate_input() {
        let program = [gated(3, 0)];
        let interp = Interpreter::new();
        let (next, effect) = interp.transition(&program);
        assert_eq!(interp.state(), PlayState::Ready);
        assert_eq!(next.state(), PlayState::Playing);
        assert_eq!(effect, Transition::Plain);
    }

    #[test]
    fn test_glide_skips_last_tick() {
        let mut seg = gated(5, 0);
        seg.freq_glide = 100;
        seg.pulse_glide = -10;
        let program = [seg];
        let mut interp = Interpreter::new();
        interp.tick(&program); // load, delay 5
        let mut freqs = Vec::new();
        for _ in 0..4 {
            interp.tick(&program);
            freqs.push(interp.voice().frequency);
        }
        assert_eq!(freqs, vec![1100, 1200, 1300, 1400]);
        assert_eq!(interp.voice().pulse_width, 2048 - 40);
        assert_eq!(interp.delay(), 1);

        interp.tick(&program); // delay hits zero: no glide, segment ends
        assert_eq!(interp.voice().frequency, 1400);
        assert_eq!(interp.state(), PlayState::Ready);
        assert_eq!(interp.position(), 1);
    }

    #[test]
    fn test_zero_gate_ticks_plays_through() {
        let program = [gated(0, 0), gated(2, 0)];
        let mut interp = Interpreter::new();
        interp.tick(&program);
        assert_eq!(interp.position(), 1);
        assert_eq!(interp.state(), PlayState::Playing);
    }
}
