//! Scenes: rows of clip slots launched together

use serde::{Deserialize, Serialize};

use crate::slot::ClipSlot;

/// A named row of the launcher grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    index: usize,
    pub name: String,
    /// Tempo applied when this scene's launch commits
    tempo_override: Option<f64>,
    /// Most recently committed scene launch
    is_active: bool,
    /// Boundary of a scene launch waiting to commit
    #[serde(skip)]
    pending_launch: Option<f64>,
}

impl Scene {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            tempo_override: None,
            is_active: false,
            pending_launch: None,
        }
    }

    pub fn with_tempo(mut self, bpm: f64) -> Self {
        self.set_tempo_override(Some(bpm));
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tempo_override(&self) -> Option<f64> {
        self.tempo_override
    }

    /// Set or clear the tempo override. Non-positive or non-finite tempos clear it.
    pub fn set_tempo_override(&mut self, bpm: Option<f64>) {
        self.tempo_override = bpm.filter(|b| b.is_finite() && *b > 0.0);
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn pending_launch(&self) -> Option<f64> {
        self.pending_launch
    }

    /// Queue every non-empty slot of `row` at the same boundary.
    ///
    /// Returns the number of slots queued.
    pub fn launch(&mut self, boundary: f64, row: &mut [ClipSlot]) -> usize {
        let mut queued = 0;
        for slot in row.iter_mut().filter(|slot| !slot.is_empty()) {
            if slot.request_launch(boundary) {
                queued += 1;
            }
        }
        self.pending_launch = Some(boundary);
        queued
    }

    /// Returns true on the tick the queued scene launch commits
    pub(crate) fn commit_if_due(&mut self, current_beat: f64) -> bool {
        match self.pending_launch {
            Some(boundary) if current_beat >= boundary => {
                self.pending_launch = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub(crate) fn cancel_launch(&mut self) {
        self.pending_launch = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::LaunchClip;
    use crate::slot::SlotState;

    fn row_with(clips: &[bool]) -> Vec<ClipSlot> {
        clips
            .iter()
            .enumerate()
            .map(|(track, &filled)| {
                let slot = ClipSlot::new(track, 0);
                if filled {
                    slot.with_clip(LaunchClip::new("c", 4.0, true).unwrap())
                } else {
                    slot
                }
            })
            .collect()
    }

    #[test]
    fn test_launch_queues_filled_slots_at_same_boundary() {
        let mut scene = Scene::new(0, "Intro");
        let mut row = row_with(&[true, false, true, true]);

        assert_eq!(scene.launch(4.0, &mut row), 3);
        assert_eq!(scene.pending_launch(), Some(4.0));
        for slot in &row {
            if slot.is_empty() {
                assert_eq!(slot.state(), SlotState::Empty);
            } else {
                assert_eq!(slot.state(), SlotState::QueuedToPlay);
                assert_eq!(slot.queued_boundary_beat(), Some(4.0));
            }
        }
    }

    #[test]
    fn test_commit_only_when_due() {
        let mut scene = Scene::new(1, "Verse");
        let mut row = row_with(&[true]);
        scene.launch(8.0, &mut row);
        assert!(!scene.commit_if_due(7.5));
        assert!(scene.commit_if_due(8.0));
        assert!(!scene.commit_if_due(8.5));
        assert!(scene.pending_launch().is_none());
    }

    #[test]
    fn test_invalid_tempo_override_cleared() {
        let mut scene = Scene::new(0, "A").with_tempo(128.0);
        assert_eq!(scene.tempo_override(), Some(128.0));
        scene.set_tempo_override(Some(-5.0));
        assert_eq!(scene.tempo_override(), None);
        scene.set_tempo_override(Some(f64::NAN));
        assert_eq!(scene.tempo_override(), None);
    }
}
