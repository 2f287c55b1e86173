//! Live preview driver.
//!
//! [`ProgramStore`] is the editor-owned program shared between the editing
//! side and the preview. Every successful edit bumps a revision counter.
//! [`Preview`] polls that counter on each frame; when it changes the run is
//! restarted from a fresh snapshot, so a simulation never observes a
//! half-applied edit.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::SimConfig;
use crate::program::EffectProgram;
use crate::render::{BarRenderer, Bitmap};
use crate::simulator::{Sample, Simulator, SAMPLES_PER_COLUMN, TICKS_PER_COLUMN};
use crate::Result;

#[derive(Debug, Default)]
struct StoreState {
    program: EffectProgram,
    revision: u64,
}

/// Shared, versioned effect program
#[derive(Debug, Clone, Default)]
pub struct ProgramStore {
    inner: Arc<RwLock<StoreState>>,
}

impl ProgramStore {
    /// Store holding `program` at revision 0
    pub fn new(program: EffectProgram) -> Self {
        ProgramStore {
            inner: Arc::new(RwLock::new(StoreState {
                program,
                revision: 0,
            })),
        }
    }

    /// Current revision
    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    /// Copy of the program together with its revision
    pub fn snapshot(&self) -> (u64, EffectProgram) {
        let state = self.inner.read();
        (state.revision, state.program.clone())
    }

    /// Run `f` with shared access to the program
    pub fn read<R>(&self, f: impl FnOnce(&EffectProgram) -> R) -> R {
        f(&self.inner.read().program)
    }

    /// Apply an edit. The revision only advances if the edit succeeds.
    pub fn edit<R>(&self, f: impl FnOnce(&mut EffectProgram) -> Result<R>) -> Result<R> {
        let mut state = self.inner.write();
        let out = f(&mut state.program)?;
        state.revision += 1;
        tracing::debug!(revision = state.revision, "program edited");
        Ok(out)
    }

    /// Swap in a whole new program (e.g. after loading a file)
    pub fn replace(&self, program: EffectProgram) {
        let mut state = self.inner.write();
        state.program = program;
        state.revision += 1;
        tracing::debug!(revision = state.revision, "program replaced");
    }
}

/// Incremental bar-chart preview of one program
#[derive(Debug, Clone)]
pub struct Preview {
    simulator: Simulator,
    renderer: BarRenderer,
    bitmap: Bitmap,
    column: usize,
    revision: Option<u64>,
}

impl Preview {
    /// Create a preview for a validated configuration
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Preview {
            renderer: BarRenderer::new(config.fill),
            bitmap: BarRenderer::bitmap(config.columns),
            simulator: Simulator::new(config),
            column: 0,
            revision: None,
        })
    }

    /// Clear the bitmap and start a new run of `program`
    pub fn restart(&mut self, program: &EffectProgram) {
        self.simulator.reset(program);
        self.bitmap.clear();
        self.column = 0;
    }

    /// Render one display frame.
    ///
    /// Restarts first if the store changed since the last frame, then draws
    /// up to `columns_per_frame` cells. Returns whether any cell was drawn.
    pub fn frame(&mut self, store: &ProgramStore) -> bool {
        if self.revision != Some(store.revision()) {
            let (revision, program) = store.snapshot();
            self.restart(&program);
            self.revision = Some(revision);
        }

        let mut drawn = false;
        for _ in 0..self.simulator.config().columns_per_frame {
            if !self.draw_column() {
                break;
            }
            drawn = true;
        }
        drawn
    }

    /// Simulate and draw the next cell. Returns false once the row is full.
    pub fn draw_column(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }

        let mut samples = [Sample::default(); SAMPLES_PER_COLUMN];
        for chunk in samples.chunks_exact_mut(SAMPLES_PER_COLUMN / TICKS_PER_COLUMN) {
            self.simulator.tick();
            chunk.copy_from_slice(self.simulator.samples());
        }
        self.renderer
            .draw_cell(&mut self.bitmap, self.column, &samples);
        self.column += 1;
        true
    }

    /// Restart with `program` and draw the whole row
    pub fn run_to_end(&mut self, program: &EffectProgram) {
        self.restart(program);
        while self.draw_column() {}
    }

    /// Whether every cell has been drawn
    pub fn is_complete(&self) -> bool {
        self.column >= self.simulator.config().columns
    }

    /// Cells drawn so far
    pub fn columns_drawn(&self) -> usize {
        self.column
    }

    /// Rendered image
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Underlying simulator
    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }
}
