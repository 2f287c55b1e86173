//! SID Sound Effect Simulator
//!
//! Predicts what a SID sound effect driver does with a short effect program
//! and turns that prediction into a bar-chart preview. An effect program is
//! an ordered list of timed segments (waveform, ADSR, frequency, pulse width,
//! per-tick glides, gate and release durations) played on a single voice.
//!
//! The simulator never touches a sound chip. It walks the program with the
//! same interpretation rules as the playback driver and emulates the
//! non-linear attack/decay/sustain/release response of the envelope
//! generator in fixed-point arithmetic, producing one (envelope, frequency)
//! bar-height sample per envelope sub-step.
//!
//! # Modules
//! - `tables` - Rate tables, sustain/level curves and the log2 bar table
//! - `program` - Segments, control bits and the editable effect program
//! - `interpreter` - Segment state machine (the driver's program walker)
//! - `envelope` - Envelope generator emulation
//! - `simulator` - Host API: `reset`, `tick`, `sample`
//! - `render` - 1-bit bitmap surface and bar renderer
//! - `preview` - Frame driver coupling a simulator, a bitmap and a program store
//! - `storage` - Binary effect files, JSON and C source export
//! - `config` - Simulation configuration
//!
//! # Quick start
//! ```no_run
//! use sidfx::{EffectProgram, SimConfig, Simulator};
//!
//! let program = EffectProgram::new();
//! let mut sim = Simulator::new(SimConfig::default());
//! sim.reset(&program);
//! while !sim.is_finished() {
//!     sim.tick();
//!     let sample = sim.sample();
//!     println!("env={} freq={}", sample.envelope, sample.frequency);
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod envelope;
pub mod interpreter;
pub mod preview;
pub mod program;
pub mod render;
pub mod simulator;
pub mod storage;
pub mod tables;

/// Error types for effect program editing, storage and configuration
///
/// The simulator itself has no error surface: it only ever reads validated
/// programs and bounded table indices.
#[derive(thiserror::Error, Debug)]
pub enum SidFxError {
    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV trace export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed effect file
    #[error("Invalid effect file: {0}")]
    InvalidFormat(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Program already holds the maximum number of segments
    #[error("Effect program is full ({capacity} segments)")]
    ProgramFull {
        /// Maximum number of segments
        capacity: usize,
    },

    /// Attempt to remove the only remaining segment
    #[error("An effect program needs at least one segment")]
    LastSegment,

    /// Segment index past the end of the program
    #[error("Segment {index} out of range (program has {len})")]
    SegmentOutOfRange {
        /// Requested index
        index: usize,
        /// Current program length
        len: usize,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SidFxError {
    /// Converts a String into `SidFxError::Other`.
    fn from(msg: String) -> Self {
        SidFxError::Other(msg)
    }
}

impl From<&str> for SidFxError {
    /// Converts a string slice into `SidFxError::Other`.
    fn from(msg: &str) -> Self {
        SidFxError::Other(msg.to_string())
    }
}

/// Result type for editing and storage operations
pub type Result<T> = std::result::Result<T, SidFxError>;

// Public API exports
pub use config::{BarFill, SimConfig};
pub use envelope::{Envelope, EnvelopePhase};
pub use interpreter::{Interpreter, PlayState, Transition, VoiceRegisters};
pub use preview::{Preview, ProgramStore};
pub use program::{ControlBits, EffectProgram, Field, Segment, Waveform, MAX_SEGMENTS};
pub use render::{BarRenderer, Bitmap};
pub use simulator::{Sample, Simulator, TickTrace};
pub use storage::{export_c_source, load_program, save_program};
pub use tables::{CurveTables, EnvelopeRates, LEVEL_MAX};
