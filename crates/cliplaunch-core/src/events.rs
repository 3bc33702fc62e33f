//! Notifications emitted by the launcher once per tick

use serde::{Deserialize, Serialize};

use crate::slot::SlotState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SchedulerEvent {
    /// A slot's state differs from the one last reported
    ClipStateChanged {
        track: usize,
        scene: usize,
        state: SlotState,
    },
    /// A scene launch committed
    SceneLaunched { scene: usize },
    /// The sounding clip of a track stopped and nothing replaced it
    TrackStopped { track: usize },
    /// A stop-all or reset has fully committed
    AllStopped,
    /// A scene's tempo override was applied
    TempoChanged { bpm: f64 },
}

impl SchedulerEvent {
    /// Track the event refers to, if any
    pub fn track(&self) -> Option<usize> {
        match self {
            Self::ClipStateChanged { track, .. } | Self::TrackStopped { track } => Some(*track),
            _ => None,
        }
    }
}
