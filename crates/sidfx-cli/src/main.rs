//! Command line host for SID sound effect programs.
//!
//! Edits effect files in place and renders their bar-chart preview to the
//! terminal or a PBM image. Per-tick traces and C source for the playback
//! driver are available as separate subcommands.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use sidfx::storage::{self, write_trace_csv};
use sidfx::{
    export_c_source, load_program, save_program, EffectProgram, Field, Preview, ProgramStore,
    SimConfig, Waveform,
};

#[derive(Parser)]
#[command(name = "sidfx")]
#[command(version, about = "SID sound effect editor and envelope simulator")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a new program holding the base effect
    New {
        /// Output file (.json for JSON, anything else binary)
        out: PathBuf,
    },
    /// Print the segment table
    Show {
        /// Effect file
        file: PathBuf,
    },
    /// Render the envelope/frequency preview
    Preview {
        /// Effect file
        file: PathBuf,
        /// Simulation config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Assume the PICO-8 note rate driver instead of a frame-rate driver
        #[arg(long, conflicts_with = "config")]
        pico8: bool,
        /// Also write the preview as a PBM image
        #[arg(long)]
        pbm: Option<PathBuf>,
    },
    /// Dump a per-tick simulation trace as CSV
    Trace {
        /// Effect file
        file: PathBuf,
        /// Simulation config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output CSV file (stdout if omitted)
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Export the program as a C array
    Export {
        /// Effect file
        file: PathBuf,
        /// Effect name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the program as JSON
    ToJson {
        /// Effect file
        file: PathBuf,
    },
    /// Convert a JSON program to another format
    FromJson {
        /// JSON program
        json: PathBuf,
        /// Output file
        out: PathBuf,
    },
    /// Edit one segment in place
    #[command(group(
        ArgGroup::new("action")
            .required(true)
            .args(["delta", "set", "waveform", "gate", "insert", "remove"])
    ))]
    Edit {
        /// Effect file
        file: PathBuf,
        /// Segment index (0-based)
        #[arg(short, long)]
        segment: usize,
        /// Field to change: freq, pwm, a, d, s, r, dfreq, dpwm, t1, t0
        #[arg(short, long)]
        field: Option<Field>,
        /// Add to the field
        #[arg(long, requires = "field", allow_negative_numbers = true)]
        delta: Option<i32>,
        /// Set the field
        #[arg(long, requires = "field", allow_negative_numbers = true)]
        set: Option<i32>,
        /// Waveform to switch: tri, saw, rect, noise (noise excludes the others)
        #[arg(short, long)]
        waveform: Option<Waveform>,
        /// Switch the waveform on (default)
        #[arg(long, requires = "waveform", conflicts_with = "off")]
        on: bool,
        /// Switch the waveform off
        #[arg(long, requires = "waveform")]
        off: bool,
        /// Gate bit
        #[arg(short, long, value_enum)]
        gate: Option<Switch>,
        /// Insert a segment at the index (duplicate, or base effect at the end)
        #[arg(long)]
        insert: bool,
        /// Remove the segment at the index
        #[arg(long)]
        remove: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::New { out } => {
            save_program(&EffectProgram::new(), &out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            tracing::info!("Created {}", out.display());
        }
        Command::Show { file } => show(&load(&file)?),
        Command::Preview {
            file,
            config,
            pico8,
            pbm,
        } => {
            let config = if pico8 {
                SimConfig::pico8()
            } else {
                load_config(config.as_deref())?
            };
            preview(&load(&file)?, config, pbm.as_deref())?;
        }
        Command::Trace { file, config, csv } => {
            let program = load(&file)?;
            let config = load_config(config.as_deref())?;
            let rows = match csv {
                Some(path) => {
                    let out = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_trace_csv(&program, config, BufWriter::new(out))?
                }
                None => write_trace_csv(&program, config, io::stdout().lock())?,
            };
            tracing::info!("Wrote {} trace rows", rows);
        }
        Command::Export { file, name, output } => {
            let program = load(&file)?;
            let name = name.unwrap_or_else(|| file_stem(&file));
            match output {
                Some(path) => {
                    let mut out = BufWriter::new(
                        File::create(&path)
                            .with_context(|| format!("Failed to create {}", path.display()))?,
                    );
                    export_c_source(&program, &name, &mut out)?;
                    out.flush()?;
                }
                None => export_c_source(&program, &name, &mut io::stdout().lock())?,
            }
        }
        Command::ToJson { file } => {
            let program = load(&file)?;
            println!("{}", serde_json::to_string_pretty(&program)?);
        }
        Command::FromJson { json, out } => {
            let program = load(&json)?;
            save_program(&program, &out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            tracing::info!("Converted {} -> {}", json.display(), out.display());
        }
        Command::Edit {
            file,
            segment,
            field,
            delta,
            set,
            waveform,
            on,
            off,
            gate,
            insert,
            remove,
        } => {
            let action = match (field, delta, set) {
                _ if insert => EditAction::Insert,
                _ if remove => EditAction::Remove,
                (Some(field), Some(d), _) => EditAction::Adjust(field, d),
                (Some(field), None, Some(v)) => EditAction::Set(field, v),
                _ => match (waveform, gate) {
                    (Some(waveform), _) => EditAction::Waveform(waveform, on || !off),
                    (None, Some(gate)) => EditAction::Gate(gate == Switch::On),
                    (None, None) => anyhow::bail!("--delta or --set needs a --field"),
                },
            };
            let program = edit_file(&file, segment, action)?;
            show(&program);
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

/// One editing operation on a segment
#[derive(Debug, Clone, Copy)]
enum EditAction {
    Adjust(Field, i32),
    Set(Field, i32),
    /// Waveform and whether it is switched on
    Waveform(Waveform, bool),
    Gate(bool),
    Insert,
    Remove,
}

fn edit_file(file: &Path, segment: usize, action: EditAction) -> Result<EffectProgram> {
    let store = ProgramStore::new(load(file)?);
    store
        .edit(|program| match action {
            EditAction::Insert => program.insert(segment),
            EditAction::Remove => program.remove(segment).map(|_| ()),
            EditAction::Adjust(field, delta) => {
                program.segment_mut(segment)?.adjust(field, delta);
                Ok(())
            }
            EditAction::Set(field, value) => {
                program.segment_mut(segment)?.set(field, value);
                Ok(())
            }
            EditAction::Waveform(waveform, true) => {
                program.segment_mut(segment)?.enable_waveform(waveform);
                Ok(())
            }
            EditAction::Waveform(waveform, false) => {
                program.segment_mut(segment)?.disable_waveform(waveform);
                Ok(())
            }
            EditAction::Gate(on) => {
                program.segment_mut(segment)?.set_gate(on);
                Ok(())
            }
        })
        .with_context(|| format!("Failed to edit segment {segment}"))?;

    let (_, program) = store.snapshot();
    save_program(&program, file).with_context(|| format!("Failed to write {}", file.display()))?;
    Ok(program)
}

fn load(path: &Path) -> Result<EffectProgram> {
    load_program(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SimConfig::default()),
    }
}

fn file_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    storage::effect_name(&stem)
}

fn show(program: &EffectProgram) {
    println!("##  TSRNG FREQ  PWM  ADSR DFREQ  DPWM T1 T0");
    for (i, segment) in program.segments().iter().enumerate() {
        println!("{i:02}  {segment}");
    }
    println!(
        "{} segment(s), {} ticks",
        program.len(),
        program.duration_ticks()
    );
}

fn preview(program: &EffectProgram, config: SimConfig, pbm: Option<&Path>) -> Result<()> {
    let store = ProgramStore::new(program.clone());
    let mut preview = Preview::new(config).context("Invalid simulation config")?;
    let mut frames = 0usize;
    while preview.frame(&store) {
        frames += 1;
    }
    tracing::debug!(frames, "preview complete");

    print!("{}", preview.bitmap().to_ascii());

    if let Some(path) = pbm {
        let mut out = BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        );
        preview.bitmap().write_pbm(&mut out)?;
        out.flush()?;
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}
