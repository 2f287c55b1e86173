//! Effect program persistence
//!
//! Binary effect file layout (little-endian):
//!
//! ```text
//! offset  size  field
//! 0       1     magic / version, >= 0xB3
//! 1       1     segment count (1..=15)
//! 2       14*n  segment records
//!
//! record: freq u16, pwm u16, ctrl u8, attdec u8, susrel u8,
//!         dfreq i16, dpwm i16, time1 u8, time0 u8, priority u8
//! ```
//!
//! Programs can also be stored as JSON for hand editing, exported as a C
//! array for the playback driver, or simulated into a CSV trace.

use std::io::{Read, Write};
use std::path::Path;

use crate::config::SimConfig;
use crate::program::{ControlBits, EffectProgram, Segment, MAX_SEGMENTS};
use crate::simulator::Simulator;
use crate::{Result, SidFxError};

/// Magic byte and current file version
pub const FILE_MAGIC: u8 = 0xB3;

/// Size of one segment record in bytes
pub const RECORD_SIZE: usize = 14;

fn decode_record(buf: &[u8]) -> Segment {
    let word = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
    Segment {
        frequency: word(0),
        pulse_width: word(2),
        control: ControlBits::from_register(buf[4]),
        attack_decay: buf[5],
        sustain_release: buf[6],
        freq_glide: word(7) as i16,
        pulse_glide: word(9) as i16,
        gate_ticks: buf[11],
        release_ticks: buf[12],
        priority: buf[13],
    }
}

fn encode_record(segment: &Segment) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..2].copy_from_slice(&segment.frequency.to_le_bytes());
    buf[2..4].copy_from_slice(&segment.pulse_width.to_le_bytes());
    buf[4] = segment.control.bits();
    buf[5] = segment.attack_decay;
    buf[6] = segment.sustain_release;
    buf[7..9].copy_from_slice(&segment.freq_glide.to_le_bytes());
    buf[9..11].copy_from_slice(&segment.pulse_glide.to_le_bytes());
    buf[11] = segment.gate_ticks;
    buf[12] = segment.release_ticks;
    buf[13] = segment.priority;
    buf
}

/// Read a binary effect file
pub fn read_program<R: Read>(reader: &mut R) -> Result<EffectProgram> {
    let mut header = [0u8; 2];
    read_exact_or_invalid(reader, &mut header, "header")?;

    let [version, count] = header;
    if version < FILE_MAGIC {
        return Err(SidFxError::InvalidFormat(format!(
            "bad magic byte 0x{version:02X}"
        )));
    }
    let count = count as usize;
    if count == 0 || count > MAX_SEGMENTS {
        return Err(SidFxError::InvalidFormat(format!(
            "segment count {count} outside 1..={MAX_SEGMENTS}"
        )));
    }

    let mut data = vec![0u8; count * RECORD_SIZE];
    read_exact_or_invalid(reader, &mut data, "segment records")?;

    let segments = data.chunks_exact(RECORD_SIZE).map(decode_record).collect();
    EffectProgram::from_segments(segments)
}

fn read_exact_or_invalid<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            SidFxError::InvalidFormat(format!("file truncated in {what}"))
        }
        _ => SidFxError::Io(e),
    })
}

/// Write a binary effect file
pub fn write_program<W: Write>(program: &EffectProgram, writer: &mut W) -> Result<()> {
    writer.write_all(&[FILE_MAGIC, program.len() as u8])?;
    for segment in program.segments() {
        writer.write_all(&encode_record(segment))?;
    }
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load a program; `.json` files are parsed as JSON, anything else as binary
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<EffectProgram> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let program = if is_json(path) {
        serde_json::from_slice(&data)?
    } else {
        read_program(&mut data.as_slice())?
    };
    tracing::debug!(path = %path.display(), segments = program.len(), "loaded effect program");
    Ok(program)
}

/// Save a program; `.json` files are written as JSON, anything else as binary
pub fn save_program<P: AsRef<Path>>(program: &EffectProgram, path: P) -> Result<()> {
    let path = path.as_ref();
    let data = if is_json(path) {
        serde_json::to_vec_pretty(program)?
    } else {
        let mut buf = Vec::with_capacity(2 + program.len() * RECORD_SIZE);
        write_program(program, &mut buf)?;
        buf
    };
    std::fs::write(path, data)?;
    tracing::debug!(path = %path.display(), segments = program.len(), "saved effect program");
    Ok(())
}

/// Reduce a file name to the effect name alphabet: digits, `-` and
/// lower-case letters. The name ends at the first `.`.
pub fn effect_name(raw: &str) -> String {
    raw.chars()
        .take_while(|&c| c != '.')
        .filter_map(|c| match c {
            '0'..='9' | '-' | 'a'..='z' => Some(c),
            'A'..='Z' => Some(c.to_ascii_lowercase()),
            _ => None,
        })
        .collect()
}

/// C identifier suffix for an effect name
pub fn c_identifier(name: &str) -> String {
    effect_name(name).replace('-', "_")
}

/// Export as a C array of driver records
pub fn export_c_source<W: Write>(
    program: &EffectProgram,
    name: &str,
    writer: &mut W,
) -> Result<()> {
    writeln!(writer, "static const SIDFX SFX_{}[] = {{", c_identifier(name))?;
    for s in program.segments() {
        // priority is always emitted as 0
        writeln!(
            writer,
            "\t{{{}, {}, 0x{:02x}, 0x{:02x}, 0x{:02x}, {}, {}, {}, {}, 0}},",
            s.frequency,
            s.pulse_width,
            s.control.bits(),
            s.attack_decay,
            s.sustain_release,
            s.freq_glide,
            s.pulse_glide,
            s.gate_ticks,
            s.release_ticks
        )?;
    }
    writeln!(writer, "}};")?;
    Ok(())
}

/// Simulate a full run and write one CSV row per tick. Returns the row count.
pub fn write_trace_csv<W: Write>(
    program: &EffectProgram,
    config: SimConfig,
    writer: W,
) -> Result<usize> {
    config.validate()?;
    let mut sim = Simulator::new(config);
    sim.reset(program);

    let mut out = csv::Writer::from_writer(writer);
    let mut rows = 0;
    while !sim.is_finished() {
        sim.tick();
        out.serialize(sim.trace())?;
        rows += 1;
    }
    out.flush()?;
    Ok(rows)
}
