//! Read-only copies of launcher state for UI and other readers

use serde::{Deserialize, Serialize};

use crate::quantize::QuantizeMode;
use crate::slot::SlotState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub track: usize,
    pub scene: usize,
    pub state: SlotState,
    pub clip_name: Option<String>,
    pub position_beats: f64,
    pub queued_boundary_beat: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub index: usize,
    pub name: String,
    pub tempo_override: Option<f64>,
    pub is_active: bool,
}

/// Committed launcher state taken between two ticks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LauncherSnapshot {
    pub current_beat: f64,
    pub bpm: f64,
    pub quantize: QuantizeMode,
    pub beats_per_bar: u32,
    pub track_names: Vec<String>,
    pub scenes: Vec<SceneSnapshot>,
    /// Row-major, `scene * tracks + track`
    pub slots: Vec<SlotSnapshot>,
}

impl LauncherSnapshot {
    pub fn track_count(&self) -> usize {
        self.track_names.len()
    }

    pub fn slot(&self, track: usize, scene: usize) -> Option<&SlotSnapshot> {
        if track >= self.track_count() {
            return None;
        }
        self.slots.get(scene * self.track_count() + track)
    }

    /// Scene index of the clip sounding on `track`
    pub fn playing_scene(&self, track: usize) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.track == track && s.state.is_playing())
            .map(|s| s.scene)
    }
}
