//! Error types for cliplaunch

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("Clip length must be a positive number of beats, got {0}")]
    InvalidClipLength(f64),
    #[error("Tempo must be a positive BPM value, got {0}")]
    InvalidTempo(f64),
    #[error("Invalid time signature {beats_per_bar}/{beat_unit}")]
    InvalidTimeSignature { beats_per_bar: u32, beat_unit: u32 },
    #[error("Invalid grid size {tracks}x{scenes}")]
    InvalidGrid { tracks: usize, scenes: usize },
    #[error("Invalid setting: {0}")]
    InvalidSetting(&'static str),
    #[error("Slot out of range: track {track}, scene {scene}")]
    SlotOutOfRange { track: usize, scene: usize },
}

pub type Result<T> = std::result::Result<T, LauncherError>;
