//! Clip slot state machine

use serde::{Deserialize, Serialize};

use crate::clip::LaunchClip;

/// Observable state of a clip slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SlotState {
    #[default]
    Empty,
    Stopped,
    QueuedToPlay,
    Playing,
    QueuedToStop,
    Recording,
}

impl SlotState {
    /// Waiting for a quantization boundary
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::QueuedToPlay | Self::QueuedToStop)
    }

    /// Playing or recording (at most one per track)
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing | Self::Recording)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Stopped => "Stopped",
            Self::QueuedToPlay => "Queued to play",
            Self::Playing => "Playing",
            Self::QueuedToStop => "Queued to stop",
            Self::Recording => "Recording",
        }
    }
}

/// Transition committed by [`ClipSlot::commit_if_due`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCommit {
    Started,
    RecordingStarted,
    Stopped,
}

/// One cell of the track x scene grid
#[derive(Debug, Clone)]
pub struct ClipSlot {
    track_index: usize,
    scene_index: usize,
    clip: Option<LaunchClip>,
    /// Replacement assigned while the slot was sounding
    pending_clip: Option<LaunchClip>,
    state: SlotState,
    queued_boundary_beat: Option<f64>,
    play_position_beats: f64,
    /// Clip output is running. Stays set while a stop or restart is queued.
    audible: bool,
    /// Queued launch commits into `Recording`
    record_armed: bool,
    recording: bool,
}

impl ClipSlot {
    pub fn new(track_index: usize, scene_index: usize) -> Self {
        Self {
            track_index,
            scene_index,
            clip: None,
            pending_clip: None,
            state: SlotState::Empty,
            queued_boundary_beat: None,
            play_position_beats: 0.0,
            audible: false,
            record_armed: false,
            recording: false,
        }
    }

    pub fn with_clip(mut self, clip: LaunchClip) -> Self {
        self.set_clip(clip);
        self
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn scene_index(&self) -> usize {
        self.scene_index
    }

    pub fn clip(&self) -> Option<&LaunchClip> {
        self.clip.as_ref()
    }

    pub fn pending_clip(&self) -> Option<&LaunchClip> {
        self.pending_clip.as_ref()
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn queued_boundary_beat(&self) -> Option<f64> {
        self.queued_boundary_beat
    }

    pub fn play_position_beats(&self) -> f64 {
        self.play_position_beats
    }

    pub fn is_empty(&self) -> bool {
        self.clip.is_none()
    }

    /// Whether the clip is currently producing output
    pub fn is_audible(&self) -> bool {
        self.audible
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Assign a clip.
    ///
    /// A sounding slot keeps its current clip; the new one replaces it once the slot
    /// stops or its next queued launch commits.
    pub fn set_clip(&mut self, clip: LaunchClip) {
        if self.audible {
            self.pending_clip = Some(clip);
            return;
        }
        self.clip = Some(clip);
        self.pending_clip = None;
        self.state = SlotState::Stopped;
        self.queued_boundary_beat = None;
        self.play_position_beats = 0.0;
        self.record_armed = false;
        self.recording = false;
    }

    /// Remove the clip and cancel anything queued
    pub fn clear(&mut self) {
        self.clip = None;
        self.pending_clip = None;
        self.state = SlotState::Empty;
        self.queued_boundary_beat = None;
        self.play_position_beats = 0.0;
        self.audible = false;
        self.record_armed = false;
        self.recording = false;
    }

    /// Queue a launch at `boundary`. Relaunching a playing slot queues a restart.
    ///
    /// Returns false (and changes nothing) when the slot is empty.
    pub fn request_launch(&mut self, boundary: f64) -> bool {
        if self.clip.is_none() {
            return false;
        }
        self.state = SlotState::QueuedToPlay;
        self.queued_boundary_beat = Some(boundary);
        self.record_armed = false;
        true
    }

    /// Install `clip` as a recording target and queue recording at `boundary`.
    ///
    /// Rejected while the slot is sounding.
    pub fn request_record(&mut self, clip: LaunchClip, boundary: f64) -> bool {
        if self.audible {
            return false;
        }
        self.clip = Some(clip);
        self.pending_clip = None;
        self.state = SlotState::QueuedToPlay;
        self.queued_boundary_beat = Some(boundary);
        self.play_position_beats = 0.0;
        self.record_armed = true;
        true
    }

    /// Queue a stop at `boundary`.
    ///
    /// An already queued stop is only ever moved earlier, never postponed.
    pub fn request_stop(&mut self, boundary: f64) -> bool {
        match self.state {
            SlotState::Playing | SlotState::Recording | SlotState::QueuedToPlay => {
                self.state = SlotState::QueuedToStop;
                self.queued_boundary_beat = Some(boundary);
                self.record_armed = false;
                true
            }
            SlotState::QueuedToStop => match self.queued_boundary_beat {
                Some(queued) if boundary < queued => {
                    self.queued_boundary_beat = Some(boundary);
                    true
                }
                _ => false,
            },
            SlotState::Empty | SlotState::Stopped => false,
        }
    }

    /// Commit a queued transition once `current_beat` has reached its boundary
    pub fn commit_if_due(&mut self, current_beat: f64) -> Option<SlotCommit> {
        let boundary = self.queued_boundary_beat?;
        if current_beat < boundary {
            return None;
        }

        match self.state {
            SlotState::QueuedToPlay => {
                if let Some(clip) = self.pending_clip.take() {
                    self.clip = Some(clip);
                }
                self.queued_boundary_beat = None;
                self.play_position_beats = 0.0;
                self.audible = true;
                if self.record_armed {
                    self.record_armed = false;
                    self.recording = true;
                    self.state = SlotState::Recording;
                    Some(SlotCommit::RecordingStarted)
                } else {
                    self.recording = false;
                    self.state = SlotState::Playing;
                    Some(SlotCommit::Started)
                }
            }
            SlotState::QueuedToStop => {
                self.stop_now();
                Some(SlotCommit::Stopped)
            }
            _ => {
                self.queued_boundary_beat = None;
                None
            }
        }
    }

    /// Move the play position forward while the clip is sounding.
    ///
    /// Looping clips wrap around their length. A non-looping clip stops at its end,
    /// unless it is being recorded, in which case it switches over to playback.
    /// Returns true if the state changed.
    pub fn advance(&mut self, delta_beats: f64) -> bool {
        if !self.audible {
            return false;
        }
        let Some(clip) = self.clip.as_ref() else {
            return false;
        };

        let length = clip.length_beats();
        let looped = clip.is_looped();
        self.play_position_beats += delta_beats;
        if self.play_position_beats < length {
            return false;
        }

        if looped {
            self.play_position_beats %= length;
            return false;
        }

        if self.recording {
            self.play_position_beats %= length;
            self.recording = false;
            if self.state == SlotState::Recording {
                self.state = SlotState::Playing;
                return true;
            }
            return false;
        }

        // Natural end
        if self.state == SlotState::QueuedToPlay {
            // Restart still pending
            self.audible = false;
            self.play_position_beats = 0.0;
            return false;
        }
        self.stop_now();
        true
    }

    /// Stop immediately, bypassing quantization
    pub fn force_stop(&mut self) {
        if self.clip.is_none() && self.pending_clip.is_none() {
            self.clear();
            return;
        }
        self.stop_now();
    }

    fn stop_now(&mut self) {
        if let Some(clip) = self.pending_clip.take() {
            self.clip = Some(clip);
        }
        self.state = if self.clip.is_some() {
            SlotState::Stopped
        } else {
            SlotState::Empty
        };
        self.queued_boundary_beat = None;
        self.play_position_beats = 0.0;
        self.audible = false;
        self.record_armed = false;
        self.recording = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(length: f64, looped: bool) -> LaunchClip {
        LaunchClip::new("test", length, looped).unwrap()
    }

    fn playing_slot(length: f64, looped: bool) -> ClipSlot {
        let mut slot = ClipSlot::new(0, 0).with_clip(clip(length, looped));
        assert!(slot.request_launch(0.0));
        assert_eq!(slot.commit_if_due(0.0), Some(SlotCommit::Started));
        slot
    }

    #[test]
    fn test_new_slot_is_empty() {
        let slot = ClipSlot::new(2, 3);
        assert_eq!(slot.state(), SlotState::Empty);
        assert_eq!(slot.track_index(), 2);
        assert_eq!(slot.scene_index(), 3);
        assert!(slot.queued_boundary_beat().is_none());
    }

    #[test]
    fn test_launch_empty_is_noop() {
        let mut slot = ClipSlot::new(0, 0);
        assert!(!slot.request_launch(4.0));
        assert_eq!(slot.state(), SlotState::Empty);
        assert!(slot.queued_boundary_beat().is_none());
        assert!(slot.commit_if_due(8.0).is_none());
        assert_eq!(slot.state(), SlotState::Empty);
    }

    #[test]
    fn test_launch_commits_at_boundary() {
        let mut slot = ClipSlot::new(0, 0).with_clip(clip(4.0, true));
        assert!(slot.request_launch(4.0));
        assert_eq!(slot.state(), SlotState::QueuedToPlay);
        assert_eq!(slot.queued_boundary_beat(), Some(4.0));

        assert!(slot.commit_if_due(3.75).is_none());
        assert_eq!(slot.state(), SlotState::QueuedToPlay);

        assert_eq!(slot.commit_if_due(4.0), Some(SlotCommit::Started));
        assert_eq!(slot.state(), SlotState::Playing);
        assert!(slot.queued_boundary_beat().is_none());
        assert_eq!(slot.play_position_beats(), 0.0);
    }

    #[test]
    fn test_stop_commits_at_boundary() {
        let mut slot = playing_slot(4.0, true);
        assert!(slot.request_stop(8.0));
        assert_eq!(slot.state(), SlotState::QueuedToStop);
        assert_eq!(slot.queued_boundary_beat(), Some(8.0));
        assert_eq!(slot.commit_if_due(8.5), Some(SlotCommit::Stopped));
        assert_eq!(slot.state(), SlotState::Stopped);
        assert!(slot.queued_boundary_beat().is_none());
        assert!(!slot.is_audible());
    }

    #[test]
    fn test_stop_on_stopped_is_noop() {
        let mut slot = ClipSlot::new(0, 0).with_clip(clip(4.0, true));
        assert!(!slot.request_stop(4.0));
        assert_eq!(slot.state(), SlotState::Stopped);
    }

    #[test]
    fn test_queued_stop_never_postponed() {
        let mut slot = playing_slot(4.0, true);
        assert!(slot.request_stop(4.0));
        assert!(!slot.request_stop(8.0));
        assert_eq!(slot.queued_boundary_beat(), Some(4.0));
        assert!(slot.request_stop(2.0));
        assert_eq!(slot.queued_boundary_beat(), Some(2.0));
    }

    #[test]
    fn test_stop_cancels_queued_launch() {
        let mut slot = ClipSlot::new(0, 0).with_clip(clip(4.0, true));
        slot.request_launch(4.0);
        slot.request_stop(4.0);
        assert_eq!(slot.commit_if_due(4.0), Some(SlotCommit::Stopped));
        assert_eq!(slot.state(), SlotState::Stopped);
    }

    #[test]
    fn test_relaunch_restarts_from_zero() {
        let mut slot = playing_slot(8.0, true);
        slot.advance(3.0);
        assert!(slot.request_launch(4.0));
        assert_eq!(slot.state(), SlotState::QueuedToPlay);
        // Keeps sounding until the restart commits
        assert!(slot.is_audible());
        slot.advance(1.0);
        assert_eq!(slot.play_position_beats(), 4.0);
        assert_eq!(slot.commit_if_due(4.0), Some(SlotCommit::Started));
        assert_eq!(slot.play_position_beats(), 0.0);
    }

    #[test]
    fn test_loop_wraps_exactly() {
        let mut slot = playing_slot(4.0, true);
        assert!(!slot.advance(10.0));
        assert_eq!(slot.play_position_beats(), 2.0);
        assert_eq!(slot.state(), SlotState::Playing);

        slot.advance(2.0);
        assert_eq!(slot.play_position_beats(), 0.0);
    }

    #[test]
    fn test_one_shot_stops_at_end() {
        let mut slot = playing_slot(4.0, false);
        assert!(!slot.advance(3.5));
        assert!(slot.advance(0.5));
        assert_eq!(slot.state(), SlotState::Stopped);
        assert_eq!(slot.play_position_beats(), 0.0);
        assert!(!slot.is_audible());
    }

    #[test]
    fn test_advance_ignored_when_not_sounding() {
        let mut slot = ClipSlot::new(0, 0).with_clip(clip(4.0, true));
        assert!(!slot.advance(1.0));
        assert_eq!(slot.play_position_beats(), 0.0);
    }

    #[test]
    fn test_set_clear_set_roundtrip() {
        let c = clip(4.0, true);
        let fresh = ClipSlot::new(1, 1).with_clip(c.clone());

        let mut slot = ClipSlot::new(1, 1);
        slot.set_clip(c.clone());
        slot.request_launch(4.0);
        slot.clear();
        assert_eq!(slot.state(), SlotState::Empty);
        slot.set_clip(c);

        assert_eq!(slot.state(), SlotState::Stopped);
        assert_eq!(slot.play_position_beats(), 0.0);
        assert_eq!(slot.state(), fresh.state());
        assert_eq!(slot.clip(), fresh.clip());
        assert_eq!(slot.queued_boundary_beat(), fresh.queued_boundary_beat());
    }

    #[test]
    fn test_set_clip_while_playing_is_deferred() {
        let mut slot = playing_slot(4.0, true);
        slot.set_clip(LaunchClip::new("next", 8.0, true).unwrap());
        assert_eq!(slot.clip().map(|c| c.name()), Some("test"));
        assert_eq!(slot.state(), SlotState::Playing);

        slot.request_launch(4.0);
        slot.commit_if_due(4.0);
        assert_eq!(slot.clip().map(|c| c.name()), Some("next"));
        assert!(slot.pending_clip().is_none());
    }

    #[test]
    fn test_deferred_clip_applied_on_stop() {
        let mut slot = playing_slot(4.0, true);
        slot.set_clip(LaunchClip::new("next", 8.0, true).unwrap());
        slot.request_stop(4.0);
        slot.commit_if_due(4.0);
        assert_eq!(slot.state(), SlotState::Stopped);
        assert_eq!(slot.clip().map(|c| c.name()), Some("next"));
    }

    #[test]
    fn test_record_then_playback() {
        let mut slot = ClipSlot::new(0, 0);
        assert!(slot.request_record(clip(4.0, false), 4.0));
        assert_eq!(slot.state(), SlotState::QueuedToPlay);
        assert_eq!(slot.commit_if_due(4.0), Some(SlotCommit::RecordingStarted));
        assert_eq!(slot.state(), SlotState::Recording);
        assert!(slot.state().is_playing());

        assert!(slot.advance(5.0));
        assert_eq!(slot.state(), SlotState::Playing);
        assert_eq!(slot.play_position_beats(), 1.0);
        assert!(!slot.is_recording());
    }

    #[test]
    fn test_record_rejected_while_sounding() {
        let mut slot = playing_slot(4.0, true);
        assert!(!slot.request_record(clip(4.0, false), 8.0));
        assert_eq!(slot.state(), SlotState::Playing);
    }

    #[test]
    fn test_force_stop() {
        let mut slot = playing_slot(4.0, true);
        slot.advance(1.5);
        slot.force_stop();
        assert_eq!(slot.state(), SlotState::Stopped);
        assert_eq!(slot.play_position_beats(), 0.0);

        let mut empty = ClipSlot::new(0, 0);
        empty.force_stop();
        assert_eq!(empty.state(), SlotState::Empty);
    }
}
