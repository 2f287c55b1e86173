//! Bar-chart rendering for simulation samples.
//!
//! The preview shows two panels stacked vertically: envelope loudness on top
//! and log-scaled pitch below. Each 8-pixel wide cell holds one
//! [`SAMPLES_PER_COLUMN`]-sample group; every sample marks the pixel at its
//! bar height, and the marks are smeared downwards with a running OR so each
//! pixel column becomes a bar filled from its mark to the panel floor.

use std::io::Write;

use crate::config::BarFill;
use crate::simulator::{Sample, SAMPLES_PER_COLUMN};
use crate::tables::BAR_MAX;

// ============================================================================
// Constants
// ============================================================================

/// Rows per panel (bar heights 0..=31)
pub const PANEL_HEIGHT: usize = BAR_MAX as usize + 1;

/// Pixels per bar cell
pub const CELL_WIDTH: usize = 8;

/// Pattern inverted on odd rows for the textured fill
const TEXTURE_MASK: u8 = 0x22;

// ============================================================================
// Bitmap surface
// ============================================================================

/// One bit per pixel, rows stored MSB-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    stride: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Create a cleared bitmap
    pub fn new(width: usize, height: usize) -> Self {
        let stride = width.div_ceil(8);
        Bitmap {
            width,
            height,
            stride,
            data: vec![0; stride * height],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw pixel data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Clear every pixel
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Pixel at (x, y); out-of-range reads are clear
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y * self.stride + x / 8] & (0x80 >> (x % 8)) != 0
    }

    /// Set or clear the pixel at (x, y); out-of-range writes are dropped
    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let mask = 0x80 >> (x % 8);
        let byte = &mut self.data[y * self.stride + x / 8];
        if on {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Store 8 pixels at once; `column` counts bytes, not pixels
    pub fn set_byte(&mut self, column: usize, y: usize, value: u8) {
        if column < self.stride && y < self.height {
            self.data[y * self.stride + column] = value;
        }
    }

    /// Raw bytes of one row
    pub fn row(&self, y: usize) -> &[u8] {
        let start = (y * self.stride).min(self.data.len());
        let end = (start + self.stride).min(self.data.len());
        &self.data[start..end]
    }

    /// Text rendering, `#` for set pixels
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(if self.get(x, y) { '#' } else { ' ' });
            }
            out.push('\n');
        }
        out
    }

    /// Write as a binary PBM (P4) image
    pub fn write_pbm<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "P4\n{} {}\n", self.width, self.height)?;
        writer.write_all(&self.data)
    }
}

// ============================================================================
// Bar renderer
// ============================================================================

/// Draws sample groups into a two-panel bitmap
#[derive(Debug, Clone, Copy, Default)]
pub struct BarRenderer {
    fill: BarFill,
}

impl BarRenderer {
    /// Create a renderer with the given fill style
    pub fn new(fill: BarFill) -> Self {
        BarRenderer { fill }
    }

    /// Bitmap large enough for `columns` cells and both panels
    pub fn bitmap(columns: usize) -> Bitmap {
        Bitmap::new(columns * CELL_WIDTH, PANEL_HEIGHT * 2)
    }

    /// Draw one cell: envelope bars in the top panel, frequency bars below.
    pub fn draw_cell(
        &self,
        bitmap: &mut Bitmap,
        cell: usize,
        samples: &[Sample; SAMPLES_PER_COLUMN],
    ) {
        let envelope = marks(samples.iter().map(|s| s.envelope));
        let frequency = marks(samples.iter().map(|s| s.frequency));
        self.draw_panel(bitmap, cell, 0, &envelope);
        self.draw_panel(bitmap, cell, PANEL_HEIGHT, &frequency);
    }

    fn draw_panel(
        &self,
        bitmap: &mut Bitmap,
        cell: usize,
        top: usize,
        marks: &[u8; PANEL_HEIGHT],
    ) {
        let mut bars = 0u8;
        for (row, mark) in marks.iter().enumerate() {
            bars |= mark;
            let byte = match self.fill {
                BarFill::Textured if row % 2 == 1 => bars ^ TEXTURE_MASK,
                _ => bars,
            };
            bitmap.set_byte(cell, top + row, byte);
        }
    }
}

/// One bit per sample at row `31 - height`, MSB is the leftmost sample.
fn marks(heights: impl Iterator<Item = u8>) -> [u8; PANEL_HEIGHT] {
    let mut marks = [0u8; PANEL_HEIGHT];
    for (j, h) in heights.take(SAMPLES_PER_COLUMN).enumerate() {
        let h = usize::from(h.min(BAR_MAX));
        marks[PANEL_HEIGHT - 1 - h] |= 0x80 >> j;
    }
    marks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(envelope: u8, frequency: u8) -> [Sample; SAMPLES_PER_COLUMN] {
        [Sample {
            envelope,
            frequency,
        }; SAMPLES_PER_COLUMN]
    }

    #[test]
    fn test_bitmap_pixels() {
        let mut bmp = Bitmap::new(12, 3);
        assert_eq!(bmp.stride(), 2);
        bmp.set(0, 0, true);
        bmp.set(9, 2, true);
        assert!(bmp.get(0, 0));
        assert!(bmp.get(9, 2));
        assert_eq!(bmp.row(0), &[0x80, 0x00]);
        assert_eq!(bmp.row(2), &[0x00, 0x40]);

        bmp.set(0, 0, false);
        assert!(!bmp.get(0, 0));
        bmp.set(100, 100, true);
        assert!(!bmp.get(100, 100));
    }

    #[test]
    fn test_solid_bar_height() {
        let mut bmp = BarRenderer::bitmap(1);
        BarRenderer::new(BarFill::Solid).draw_cell(&mut bmp, 0, &flat(10, 0));
        for y in 0..PANEL_HEIGHT {
            let expected = if y >= PANEL_HEIGHT - 1 - 10 { 0xFF } else { 0x00 };
            assert_eq!(bmp.row(y)[0], expected, "envelope row {y}");
        }
        // Height 0 still marks the floor row
        assert_eq!(bmp.row(PANEL_HEIGHT * 2 - 1)[0], 0xFF);
        assert_eq!(bmp.row(PANEL_HEIGHT * 2 - 2)[0], 0x00);
    }

    #[test]
    fn test_bars_per_sample_column() {
        let mut samples = flat(0, 0);
        samples[0].envelope = BAR_MAX;
        samples[7].envelope = 1;
        let mut bmp = BarRenderer::bitmap(1);
        BarRenderer::new(BarFill::Solid).draw_cell(&mut bmp, 0, &samples);
        assert_eq!(bmp.row(0)[0], 0x80);
        assert_eq!(bmp.row(PANEL_HEIGHT - 2)[0], 0x81);
        assert_eq!(bmp.row(PANEL_HEIGHT - 1)[0], 0xFF);
    }

    #[test]
    fn test_textured_fill_inverts_odd_rows() {
        let mut bmp = BarRenderer::bitmap(2);
        BarRenderer::new(BarFill::Textured).draw_cell(&mut bmp, 1, &flat(BAR_MAX, BAR_MAX));
        assert_eq!(bmp.row(0), &[0x00, 0xFF]);
        assert_eq!(bmp.row(1), &[0x00, 0xFF ^ TEXTURE_MASK]);
        assert_eq!(bmp.row(PANEL_HEIGHT + 1), &[0x00, 0xFF ^ TEXTURE_MASK]);
    }

    #[test]
    fn test_ascii_and_pbm() {
        let mut bmp = Bitmap::new(3, 2);
        bmp.set(1, 0, true);
        assert_eq!(bmp.to_ascii(), " # \n   \n");

        let mut out = Vec::new();
        bmp.write_pbm(&mut out).unwrap();
        assert_eq!(&out[..7], b"P4\n3 2\n");
        assert_eq!(&out[7..], &[0x40, 0x00]);
    }
}
