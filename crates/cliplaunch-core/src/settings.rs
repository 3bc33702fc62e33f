//! Launcher configuration

use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, Result};
use crate::quantize::QuantizeMode;

/// Largest grid the launcher accepts
pub const MAX_SLOTS: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    pub tracks: usize,
    pub scenes: usize,
    pub bpm: f64,
    pub quantize: QuantizeMode,
    pub beats_per_bar: u32,
    pub beat_unit: u32,
    pub sample_rate: u32,
    /// Frames per processing block
    pub block_size: u32,
    /// Capacity of the command queue feeding the engine
    pub command_capacity: usize,
    /// Capacity of each subscriber's event queue
    pub event_capacity: usize,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            tracks: 8,
            scenes: 8,
            bpm: 120.0,
            quantize: QuantizeMode::Bar,
            beats_per_bar: 4,
            beat_unit: 4,
            sample_rate: 48_000,
            block_size: 512,
            command_capacity: 256,
            event_capacity: 1024,
        }
    }
}

impl LauncherSettings {
    pub fn validate(&self) -> Result<()> {
        if self.tracks == 0 || self.tracks.saturating_mul(self.scenes) > MAX_SLOTS {
            return Err(LauncherError::InvalidGrid {
                tracks: self.tracks,
                scenes: self.scenes,
            });
        }
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(LauncherError::InvalidTempo(self.bpm));
        }
        if self.beats_per_bar == 0 || !self.beat_unit.is_power_of_two() {
            return Err(LauncherError::InvalidTimeSignature {
                beats_per_bar: self.beats_per_bar,
                beat_unit: self.beat_unit,
            });
        }
        if self.sample_rate == 0 || self.block_size == 0 {
            return Err(LauncherError::InvalidSetting(
                "sample rate and block size must be non-zero",
            ));
        }
        if self.command_capacity == 0 || self.event_capacity == 0 {
            return Err(LauncherError::InvalidSetting("queue capacities must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(LauncherSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        let bad_grid = LauncherSettings { tracks: 0, ..Default::default() };
        assert!(matches!(bad_grid.validate(), Err(LauncherError::InvalidGrid { .. })));

        let bad_tempo = LauncherSettings { bpm: -1.0, ..Default::default() };
        assert!(matches!(bad_tempo.validate(), Err(LauncherError::InvalidTempo(_))));

        let bad_sig = LauncherSettings { beat_unit: 3, ..Default::default() };
        assert!(matches!(
            bad_sig.validate(),
            Err(LauncherError::InvalidTimeSignature { .. })
        ));
    }
}
