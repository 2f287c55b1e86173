//! Effect Program Data Model
//!
//! An effect program is an ordered list of 1..=[`MAX_SEGMENTS`] segments.
//! Each segment describes one timed step of a sound effect: the voice control
//! bits (waveform + gate), the packed ADSR nibbles, base frequency and pulse
//! width, their per-tick glides, and how long the segment stays gated and
//! releasing.
//!
//! Editing operations keep the program non-empty and within capacity, and
//! clamp every field to its representable range. The simulator relies on this
//! and never re-clamps.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{Result, SidFxError};

/// Maximum number of segments in one program
pub const MAX_SEGMENTS: usize = 15;

/// Largest pulse width (12 bits)
pub const PULSE_WIDTH_MAX: u16 = 0x0FFF;

/// Largest gate/release tick count the editor accepts
pub const TICKS_MAX: u8 = 99;

bitflags! {
    /// SID voice control register bits used by effect segments
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ControlBits: u8 {
        /// Gate: 1 = excite the envelope, 0 = release
        const GATE = 0x01;
        /// Oscillator sync
        const SYNC = 0x02;
        /// Ring modulation
        const RING = 0x04;
        /// Test bit
        const TEST = 0x08;
        /// Triangle waveform
        const TRIANGLE = 0x10;
        /// Sawtooth waveform
        const SAWTOOTH = 0x20;
        /// Rectangle (pulse) waveform
        const RECTANGLE = 0x40;
        /// Noise waveform
        const NOISE = 0x80;
    }
}

impl Default for ControlBits {
    fn default() -> Self {
        ControlBits::empty()
    }
}

impl ControlBits {
    /// Create control bits from a raw register value
    pub fn from_register(value: u8) -> Self {
        ControlBits::from_bits_retain(value)
    }

    /// Whether the gate bit is set
    #[inline]
    pub fn gate(&self) -> bool {
        self.contains(ControlBits::GATE)
    }
}

/// Oscillator waveform selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    /// Triangle
    Triangle,
    /// Sawtooth
    Sawtooth,
    /// Rectangle / pulse
    Rectangle,
    /// Noise
    Noise,
}

impl Waveform {
    /// All waveforms in display order
    pub const ALL: [Waveform; 4] = [
        Waveform::Triangle,
        Waveform::Sawtooth,
        Waveform::Rectangle,
        Waveform::Noise,
    ];

    /// Control bit for this waveform
    pub fn bit(self) -> ControlBits {
        match self {
            Waveform::Triangle => ControlBits::TRIANGLE,
            Waveform::Sawtooth => ControlBits::SAWTOOTH,
            Waveform::Rectangle => ControlBits::RECTANGLE,
            Waveform::Noise => ControlBits::NOISE,
        }
    }

    /// Single-letter label used in segment tables
    pub fn letter(self) -> char {
        match self {
            Waveform::Triangle => 'T',
            Waveform::Sawtooth => 'S',
            Waveform::Rectangle => 'R',
            Waveform::Noise => 'N',
        }
    }
}

impl std::str::FromStr for Waveform {
    type Err = SidFxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "t" | "tri" | "triangle" => Ok(Waveform::Triangle),
            "s" | "saw" | "sawtooth" => Ok(Waveform::Sawtooth),
            "r" | "rect" | "rectangle" | "pulse" => Ok(Waveform::Rectangle),
            "n" | "noise" => Ok(Waveform::Noise),
            other => Err(SidFxError::Other(format!("unknown waveform: {other}"))),
        }
    }
}

/// Editable numeric segment field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Field {
    /// Base frequency, 0..=65535
    Frequency,
    /// Base pulse width, 0..=4095
    PulseWidth,
    /// Attack rate nibble
    Attack,
    /// Decay rate nibble
    Decay,
    /// Sustain level nibble
    Sustain,
    /// Release rate nibble
    Release,
    /// Per-tick frequency delta, -32767..=32767
    FreqGlide,
    /// Per-tick pulse width delta, -4095..=4095
    PulseGlide,
    /// Ticks with the gate held
    GateTicks,
    /// Ticks with the gate released
    ReleaseTicks,
}

impl Field {
    /// Inclusive value range accepted by the editor
    pub fn range(self) -> (i32, i32) {
        match self {
            Field::Frequency => (0, u16::MAX as i32),
            Field::PulseWidth => (0, PULSE_WIDTH_MAX as i32),
            Field::Attack | Field::Decay | Field::Sustain | Field::Release => (0, 15),
            Field::FreqGlide => (-(i16::MAX as i32), i16::MAX as i32),
            Field::PulseGlide => (-(PULSE_WIDTH_MAX as i32), PULSE_WIDTH_MAX as i32),
            Field::GateTicks | Field::ReleaseTicks => (0, TICKS_MAX as i32),
        }
    }
}

impl std::str::FromStr for Field {
    type Err = SidFxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "freq" | "frequency" => Ok(Field::Frequency),
            "pwm" | "pulse" | "pulse-width" => Ok(Field::PulseWidth),
            "attack" | "a" => Ok(Field::Attack),
            "decay" | "d" => Ok(Field::Decay),
            "sustain" | "s" => Ok(Field::Sustain),
            "release" | "r" => Ok(Field::Release),
            "dfreq" | "freq-glide" => Ok(Field::FreqGlide),
            "dpwm" | "pulse-glide" => Ok(Field::PulseGlide),
            "t1" | "gate-ticks" => Ok(Field::GateTicks),
            "t0" | "release-ticks" => Ok(Field::ReleaseTicks),
            other => Err(SidFxError::Other(format!("unknown segment field: {other}"))),
        }
    }
}

/// One timed step of an effect program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// Base frequency register value
    pub frequency: u16,
    /// Base pulse width (12 bits)
    pub pulse_width: u16,
    /// Waveform and gate bits
    pub control: ControlBits,
    /// Attack nibble (high) and decay nibble (low)
    pub attack_decay: u8,
    /// Sustain nibble (high) and release nibble (low)
    pub sustain_release: u8,
    /// Frequency delta applied per tick
    pub freq_glide: i16,
    /// Pulse width delta applied per tick
    pub pulse_glide: i16,
    /// Ticks with the gate held (`time1`)
    pub gate_ticks: u8,
    /// Ticks with the gate released before the next segment (`time0`)
    pub release_ticks: u8,
    /// Driver priority byte, carried through files untouched
    #[serde(default)]
    pub priority: u8,
}

impl Default for Segment {
    /// The base effect every new program starts with: a short gated sawtooth.
    fn default() -> Self {
        Segment {
            frequency: 1000,
            pulse_width: 2048,
            control: ControlBits::GATE | ControlBits::SAWTOOTH,
            attack_decay: 0x11,
            sustain_release: 0x86,
            freq_glide: 0,
            pulse_glide: 0,
            gate_ticks: 4,
            release_ticks: 0,
            priority: 0,
        }
    }
}

impl Segment {
    /// Attack rate nibble
    #[inline]
    pub fn attack(&self) -> u8 {
        self.attack_decay >> 4
    }

    /// Decay rate nibble
    #[inline]
    pub fn decay(&self) -> u8 {
        self.attack_decay & 0x0F
    }

    /// Sustain level nibble
    #[inline]
    pub fn sustain(&self) -> u8 {
        self.sustain_release >> 4
    }

    /// Release rate nibble
    #[inline]
    pub fn release(&self) -> u8 {
        self.sustain_release & 0x0F
    }

    /// Whether the segment starts gated
    #[inline]
    pub fn gated(&self) -> bool {
        self.control.gate()
    }

    /// Current value of a numeric field
    pub fn get(&self, field: Field) -> i32 {
        match field {
            Field::Frequency => self.frequency as i32,
            Field::PulseWidth => self.pulse_width as i32,
            Field::Attack => self.attack() as i32,
            Field::Decay => self.decay() as i32,
            Field::Sustain => self.sustain() as i32,
            Field::Release => self.release() as i32,
            Field::FreqGlide => self.freq_glide as i32,
            Field::PulseGlide => self.pulse_glide as i32,
            Field::GateTicks => self.gate_ticks as i32,
            Field::ReleaseTicks => self.release_ticks as i32,
        }
    }

    /// Set a numeric field, clamping to its range
    pub fn set(&mut self, field: Field, value: i32) {
        let (lo, hi) = field.range();
        let v = value.clamp(lo, hi);
        match field {
            Field::Frequency => self.frequency = v as u16,
            Field::PulseWidth => self.pulse_width = v as u16,
            Field::Attack => self.attack_decay = (self.attack_decay & 0x0F) | ((v as u8) << 4),
            Field::Decay => self.attack_decay = (self.attack_decay & 0xF0) | v as u8,
            Field::Sustain => {
                self.sustain_release = (self.sustain_release & 0x0F) | ((v as u8) << 4)
            }
            Field::Release => self.sustain_release = (self.sustain_release & 0xF0) | v as u8,
            Field::FreqGlide => self.freq_glide = v as i16,
            Field::PulseGlide => self.pulse_glide = v as i16,
            Field::GateTicks => self.gate_ticks = v as u8,
            Field::ReleaseTicks => self.release_ticks = v as u8,
        }
    }

    /// Add `delta` to a numeric field, saturating at its range
    pub fn adjust(&mut self, field: Field, delta: i32) {
        let value = self.get(field).saturating_add(delta);
        self.set(field, value);
    }

    /// Select a waveform. Noise excludes the tone waveforms and vice versa.
    pub fn enable_waveform(&mut self, waveform: Waveform) {
        match waveform {
            Waveform::Noise => {
                self.control.remove(
                    ControlBits::TRIANGLE | ControlBits::SAWTOOTH | ControlBits::RECTANGLE,
                );
            }
            _ => self.control.remove(ControlBits::NOISE),
        }
        self.control.insert(waveform.bit());
    }

    /// Deselect a waveform
    pub fn disable_waveform(&mut self, waveform: Waveform) {
        self.control.remove(waveform.bit());
    }

    /// Set or clear the gate bit
    pub fn set_gate(&mut self, on: bool) {
        self.control.set(ControlBits::GATE, on);
    }

    /// Clamp all fields to editor ranges (used after loading external data)
    pub fn clamped(mut self) -> Self {
        self.pulse_width = self.pulse_width.min(PULSE_WIDTH_MAX);
        self.freq_glide = self.freq_glide.max(-i16::MAX);
        self.pulse_glide = self
            .pulse_glide
            .clamp(-(PULSE_WIDTH_MAX as i16), PULSE_WIDTH_MAX as i16);
        self.gate_ticks = self.gate_ticks.min(TICKS_MAX);
        self.release_ticks = self.release_ticks.min(TICKS_MAX);
        self
    }
}

impl fmt::Display for Segment {
    /// One row in the editor's column layout:
    /// `TSRNG FREQ  PWM  ADSR DFREQ DPWM T1 T0`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for w in Waveform::ALL {
            let c = if self.control.contains(w.bit()) {
                w.letter()
            } else {
                '.'
            };
            write!(f, "{c}")?;
        }
        write!(f, "{}", if self.gated() { 'G' } else { '.' })?;
        write!(
            f,
            " {:05} {:04} {:02X}{:02X} {:+06} {:+05} {:02} {:02}",
            self.frequency,
            self.pulse_width,
            self.attack_decay,
            self.sustain_release,
            self.freq_glide,
            self.pulse_glide,
            self.gate_ticks,
            self.release_ticks
        )
    }
}

/// Ordered, non-empty list of segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct EffectProgram {
    segments: Vec<Segment>,
}

impl Default for EffectProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectProgram {
    /// A program holding only the base effect
    pub fn new() -> Self {
        let mut segments = Vec::with_capacity(MAX_SEGMENTS);
        segments.push(Segment::default());
        EffectProgram { segments }
    }

    /// Build a program from segments, enforcing 1..=MAX_SEGMENTS
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(SidFxError::LastSegment);
        }
        if segments.len() > MAX_SEGMENTS {
            return Err(SidFxError::ProgramFull {
                capacity: MAX_SEGMENTS,
            });
        }
        let mut program = EffectProgram {
            segments: Vec::with_capacity(MAX_SEGMENTS),
        };
        program
            .segments
            .extend(segments.into_iter().map(Segment::clamped));
        Ok(program)
    }

    /// Number of segments (always at least 1)
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; present for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether another segment can be inserted
    pub fn is_full(&self) -> bool {
        self.segments.len() >= MAX_SEGMENTS
    }

    /// Read-only view of the segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment at `index`
    pub fn segment(&self, index: usize) -> Result<&Segment> {
        let len = self.segments.len();
        self.segments
            .get(index)
            .ok_or(SidFxError::SegmentOutOfRange { index, len })
    }

    /// Mutable segment at `index`
    pub fn segment_mut(&mut self, index: usize) -> Result<&mut Segment> {
        let len = self.segments.len();
        self.segments
            .get_mut(index)
            .ok_or(SidFxError::SegmentOutOfRange { index, len })
    }

    /// Insert a segment at `index`.
    ///
    /// At the end of the program a fresh base effect is appended; anywhere
    /// else the segment at `index` is duplicated and the tail shifted down.
    pub fn insert(&mut self, index: usize) -> Result<()> {
        let len = self.segments.len();
        if index > len {
            return Err(SidFxError::SegmentOutOfRange { index, len });
        }
        if self.is_full() {
            return Err(SidFxError::ProgramFull {
                capacity: MAX_SEGMENTS,
            });
        }
        let segment = if index == len {
            Segment::default()
        } else {
            self.segments[index]
        };
        self.segments.insert(index, segment);
        Ok(())
    }

    /// Remove the segment at `index`; the last remaining segment is kept.
    pub fn remove(&mut self, index: usize) -> Result<Segment> {
        let len = self.segments.len();
        if index >= len {
            return Err(SidFxError::SegmentOutOfRange { index, len });
        }
        if len == 1 {
            return Err(SidFxError::LastSegment);
        }
        Ok(self.segments.remove(index))
    }

    /// Reset to a single base effect
    pub fn clear(&mut self) {
        self.segments.clear();
        self.segments.push(Segment::default());
    }

    /// Sum of gate and release ticks over all segments
    pub fn duration_ticks(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.gate_ticks as usize + s.release_ticks as usize)
            .sum()
    }
}

impl TryFrom<Vec<Segment>> for EffectProgram {
    type Error = SidFxError;

    fn try_from(segments: Vec<Segment>) -> Result<Self> {
        EffectProgram::from_segments(segments)
    }
}

impl From<EffectProgram> for Vec<Segment> {
    fn from(program: EffectProgram) -> Self {
        program.segments
    }
}
