//! Simulation configuration
//!
//! Controls the preview width, the assumed tick period of the playback
//! driver, and how much of the preview is rendered per display frame.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Result, SidFxError};

/// Tick period of a driver called once per PAL frame (ms)
pub const PAL_TICK_MS: u32 = 20;

/// CPU cycles between driver ticks when the driver runs at the PICO-8 note
/// rate (22050 / 183 Hz) on a PAL machine
pub const PICO8_TICK_CYCLES: u32 = 8189;

/// Maximum number of 8-pixel cells in a preview row
pub const MAX_COLUMNS: usize = 40;

/// Bar fill style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarFill {
    /// Every other row inverted for a dotted texture
    #[default]
    Textured,
    /// Plain filled bars
    Solid,
}

/// Simulation and preview configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of 8-pixel cells; a run stops after `columns * 2` ticks
    pub columns: usize,
    /// Assumed duration of one driver tick in milliseconds
    pub tick_ms: u32,
    /// Cells rendered per preview frame
    pub columns_per_frame: usize,
    /// Bar fill style
    pub fill: BarFill,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::pal()
    }
}

impl SimConfig {
    /// Driver ticked once per 50 Hz frame
    pub fn pal() -> Self {
        Self {
            columns: MAX_COLUMNS,
            tick_ms: PAL_TICK_MS,
            columns_per_frame: 3,
            fill: BarFill::Textured,
        }
    }

    /// Driver ticked from a timer at the PICO-8 note rate
    pub fn pico8() -> Self {
        Self {
            tick_ms: PICO8_TICK_CYCLES / 1000,
            ..Self::pal()
        }
    }

    /// Total number of ticks in one simulation run
    pub fn max_ticks(&self) -> usize {
        self.columns.saturating_mul(crate::simulator::TICKS_PER_COLUMN)
    }

    /// Check that all values are within their supported ranges
    pub fn validate(&self) -> Result<()> {
        if self.columns == 0 || self.columns > MAX_COLUMNS {
            return Err(SidFxError::ConfigError(format!(
                "columns must be 1..={MAX_COLUMNS}, got {}",
                self.columns
            )));
        }
        if self.tick_ms == 0 || self.tick_ms > 1000 {
            return Err(SidFxError::ConfigError(format!(
                "tick_ms must be 1..=1000, got {}",
                self.tick_ms
            )));
        }
        if self.columns_per_frame == 0 || self.columns_per_frame > self.columns {
            return Err(SidFxError::ConfigError(format!(
                "columns_per_frame must be 1..={}, got {}",
                self.columns, self.columns_per_frame
            )));
        }
        Ok(())
    }

    /// Load and validate a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        let config: SimConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
        assert!(SimConfig::pico8().validate().is_ok());
    }

    #[test]
    fn test_pico8_tick_period() {
        assert_eq!(SimConfig::pico8().tick_ms, 8);
    }

    #[test]
    fn test_max_ticks() {
        assert_eq!(SimConfig::default().max_ticks(), 80);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let cfg = SimConfig {
            columns: 0,
            ..SimConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SidFxError::ConfigError(_))));

        let cfg = SimConfig {
            tick_ms: 0,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SimConfig {
            columns: 2,
            columns_per_frame: 3,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: SimConfig = serde_json::from_str(r#"{"tick_ms": 8, "fill": "solid"}"#).unwrap();
        assert_eq!(cfg.tick_ms, 8);
        assert_eq!(cfg.fill, BarFill::Solid);
        assert_eq!(cfg.columns, MAX_COLUMNS);
        assert_eq!(cfg.columns_per_frame, 3);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        std::fs::write(&path, r#"{"columns": 20}"#).unwrap();
        let cfg = SimConfig::load(&path).unwrap();
        assert_eq!(cfg.columns, 20);

        std::fs::write(&path, r#"{"columns": 99}"#).unwrap();
        assert!(SimConfig::load(&path).is_err());
    }
}
