//! Quantized clip and scene launch scheduler

use tracing::{debug, trace, warn};

use crate::clip::LaunchClip;
use crate::error::{LauncherError, Result};
use crate::events::SchedulerEvent;
use crate::quantize::{self, QuantizeMode};
use crate::scene::Scene;
use crate::settings::LauncherSettings;
use crate::slot::{ClipSlot, SlotCommit, SlotState};
use crate::snapshot::{LauncherSnapshot, SceneSnapshot, SlotSnapshot};
use crate::track::Track;

/// Owns the track x scene grid and decides when launches and stops take effect.
///
/// Commands (`launch_clip`, `stop_track`, ...) only queue transitions. Time moves
/// exclusively through [`ClipLauncher::process`], which commits whatever reached its
/// boundary and reports the changes. Commands and `process` must be called from the
/// same logical thread.
///
/// Slots are stored row-major in one flat array at `scene * track_count + track`.
#[derive(Debug, Clone)]
pub struct ClipLauncher {
    tracks: Vec<Track>,
    scenes: Vec<Scene>,
    slots: Vec<ClipSlot>,
    current_beat: f64,
    bpm: f64,
    quantize: QuantizeMode,
    beats_per_bar: u32,
    beat_unit: u32,
    /// Slot state as of the last emitted notification
    reported: Vec<SlotState>,
    /// Per-track scratch: something was sounding when the tick started
    track_was_audible: Vec<bool>,
    events: Vec<SchedulerEvent>,
    all_stop_pending: bool,
}

impl Default for ClipLauncher {
    fn default() -> Self {
        let settings = LauncherSettings::default();
        Self::new(settings.tracks, settings.scenes)
    }
}

impl ClipLauncher {
    pub fn new(track_count: usize, scene_count: usize) -> Self {
        let tracks = (0..track_count)
            .map(|i| Track::new(i, format!("Track {}", i + 1)))
            .collect();
        let scenes = (0..scene_count)
            .map(|i| Scene::new(i, format!("Scene {}", i + 1)))
            .collect();
        let mut slots = Vec::with_capacity(track_count * scene_count);
        for scene in 0..scene_count {
            for track in 0..track_count {
                slots.push(ClipSlot::new(track, scene));
            }
        }

        let mut launcher = Self {
            tracks,
            scenes,
            slots,
            current_beat: 0.0,
            bpm: 120.0,
            quantize: QuantizeMode::default(),
            beats_per_bar: 4,
            beat_unit: 4,
            reported: vec![SlotState::Empty; track_count * scene_count],
            track_was_audible: vec![false; track_count],
            events: Vec::new(),
            all_stop_pending: false,
        };
        launcher.reserve_event_capacity();
        launcher
    }

    pub fn from_settings(settings: &LauncherSettings) -> Result<Self> {
        settings.validate()?;
        let mut launcher = Self::new(settings.tracks, settings.scenes);
        launcher.bpm = settings.bpm;
        launcher.quantize = settings.quantize;
        launcher.beats_per_bar = settings.beats_per_bar;
        launcher.beat_unit = settings.beat_unit;
        Ok(launcher)
    }

    // ------------------------------------------------------------------------
    // Grid access
    // ------------------------------------------------------------------------

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn scene_mut(&mut self, index: usize) -> Option<&mut Scene> {
        self.scenes.get_mut(index)
    }

    /// All slots, row-major
    pub fn slots(&self) -> &[ClipSlot] {
        &self.slots
    }

    pub fn slot(&self, track: usize, scene: usize) -> Option<&ClipSlot> {
        self.slot_index(track, scene).map(|idx| &self.slots[idx])
    }

    pub fn try_slot(&self, track: usize, scene: usize) -> Result<&ClipSlot> {
        self.slot(track, scene)
            .ok_or(LauncherError::SlotOutOfRange { track, scene })
    }

    fn slot_index(&self, track: usize, scene: usize) -> Option<usize> {
        (track < self.tracks.len() && scene < self.scenes.len())
            .then(|| scene * self.tracks.len() + track)
    }

    /// Scene index of the clip playing or recording on `track`
    pub fn playing_scene(&self, track: usize) -> Option<usize> {
        if track >= self.tracks.len() {
            return None;
        }
        (0..self.scenes.len()).find(|&scene| {
            self.slots[scene * self.tracks.len() + track]
                .state()
                .is_playing()
        })
    }

    pub fn active_scene(&self) -> Option<usize> {
        self.scenes.iter().position(|s| s.is_active())
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    pub fn current_beat(&self) -> f64 {
        self.current_beat
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Only affects how the host converts wall-clock time into beats
    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(LauncherError::InvalidTempo(bpm));
        }
        self.bpm = bpm;
        Ok(())
    }

    pub fn global_quantize(&self) -> QuantizeMode {
        self.quantize
    }

    /// Applies to requests issued from now on. Queued boundaries stay where they are.
    pub fn set_global_quantize(&mut self, mode: QuantizeMode) {
        self.quantize = mode;
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn beat_unit(&self) -> u32 {
        self.beat_unit
    }

    /// Like the quantize mode, a new time signature only affects later requests
    pub fn set_time_signature(&mut self, beats_per_bar: u32, beat_unit: u32) -> Result<()> {
        if beats_per_bar == 0 || !beat_unit.is_power_of_two() {
            return Err(LauncherError::InvalidTimeSignature {
                beats_per_bar,
                beat_unit,
            });
        }
        self.beats_per_bar = beats_per_bar;
        self.beat_unit = beat_unit;
        Ok(())
    }

    /// Boundary a request issued right now would be scheduled for
    pub fn launch_boundary(&self) -> f64 {
        quantize::next_boundary(self.current_beat, self.quantize, self.beats_per_bar)
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    /// Assign a clip. Out-of-range coordinates are ignored.
    pub fn set_clip(&mut self, track: usize, scene: usize, clip: LaunchClip) -> bool {
        let Some(idx) = self.slot_index(track, scene) else {
            return false;
        };
        self.slots[idx].set_clip(clip);
        true
    }

    pub fn try_set_clip(&mut self, track: usize, scene: usize, clip: LaunchClip) -> Result<()> {
        if self.set_clip(track, scene, clip) {
            Ok(())
        } else {
            Err(LauncherError::SlotOutOfRange { track, scene })
        }
    }

    pub fn clear_slot(&mut self, track: usize, scene: usize) -> bool {
        let Some(idx) = self.slot_index(track, scene) else {
            return false;
        };
        self.slots[idx].clear();
        true
    }

    /// Append an empty scene row
    pub fn add_scene(&mut self, name: Option<String>) -> &Scene {
        let index = self.scenes.len();
        let name = name.unwrap_or_else(|| format!("Scene {}", index + 1));
        self.scenes.push(Scene::new(index, name));
        for track in 0..self.tracks.len() {
            self.slots.push(ClipSlot::new(track, index));
            self.reported.push(SlotState::Empty);
        }
        self.reserve_event_capacity();
        &self.scenes[index]
    }

    /// Append a track column. The grid is re-laid out for the new stride.
    pub fn add_track(&mut self, name: impl Into<String>) -> &Track {
        let old_count = self.tracks.len();
        let index = old_count;
        let new_len = (old_count + 1) * self.scenes.len();

        let mut old_slots = std::mem::take(&mut self.slots).into_iter();
        let mut old_reported = std::mem::take(&mut self.reported).into_iter();
        let mut slots = Vec::with_capacity(new_len);
        let mut reported = Vec::with_capacity(new_len);
        for scene in 0..self.scenes.len() {
            slots.extend(old_slots.by_ref().take(old_count));
            reported.extend(old_reported.by_ref().take(old_count));
            slots.push(ClipSlot::new(index, scene));
            reported.push(SlotState::Empty);
        }
        self.slots = slots;
        self.reported = reported;

        self.tracks.push(Track::new(index, name));
        self.track_was_audible.push(false);
        self.reserve_event_capacity();
        &self.tracks[index]
    }

    fn reserve_event_capacity(&mut self) {
        // Worst case for one tick: every slot changes, every track stops, every scene
        // commits with a tempo change, plus the stop-all notification
        let needed = self.slots.len() + self.tracks.len() + 2 * self.scenes.len() + 1;
        self.events.reserve(needed);
    }

    // ------------------------------------------------------------------------
    // Launch / stop requests
    // ------------------------------------------------------------------------

    /// Queue the clip at (track, scene) for the next boundary, stopping whatever else
    /// plays on that track at the same boundary.
    pub fn launch_clip(&mut self, track: usize, scene: usize) -> bool {
        let Some(idx) = self.slot_index(track, scene) else {
            return false;
        };
        if self.slots[idx].is_empty() {
            return false;
        }
        let boundary = self.launch_boundary();
        self.stop_others_on_track(track, scene, boundary);
        let queued = self.slots[idx].request_launch(boundary);
        self.cancel_all_stopped_if(queued);
        queued
    }

    /// Queue every filled slot of a scene at one shared boundary
    pub fn launch_scene(&mut self, scene: usize) -> bool {
        if scene >= self.scenes.len() {
            return false;
        }
        let boundary = self.launch_boundary();
        let track_count = self.tracks.len();
        for track in 0..track_count {
            if !self.slots[scene * track_count + track].is_empty() {
                self.stop_others_on_track(track, scene, boundary);
            }
        }
        for (index, other) in self.scenes.iter_mut().enumerate() {
            if index != scene {
                other.cancel_launch();
            }
        }

        let row = &mut self.slots[scene * track_count..(scene + 1) * track_count];
        let queued = self.scenes[scene].launch(boundary, row);
        self.cancel_all_stopped_if(queued > 0);
        debug!(scene, boundary, queued, "scene launch queued");
        true
    }

    /// Record into (track, scene) starting at the next boundary
    pub fn record_clip(&mut self, track: usize, scene: usize, clip: LaunchClip) -> bool {
        let Some(idx) = self.slot_index(track, scene) else {
            return false;
        };
        if self.slots[idx].is_audible() {
            return false;
        }
        let boundary = self.launch_boundary();
        self.stop_others_on_track(track, scene, boundary);
        let queued = self.slots[idx].request_record(clip, boundary);
        self.cancel_all_stopped_if(queued);
        queued
    }

    /// A launch queued after a stop-all or reset means the grid will not end up silent
    fn cancel_all_stopped_if(&mut self, queued: bool) {
        if queued {
            self.all_stop_pending = false;
        }
    }

    /// Queue a stop for whatever plays or is about to play on `track`
    pub fn stop_track(&mut self, track: usize) -> bool {
        if track >= self.tracks.len() {
            return false;
        }
        let boundary = self.launch_boundary();
        let track_count = self.tracks.len();
        let mut stopped = false;
        for scene in 0..self.scenes.len() {
            stopped |= self.slots[scene * track_count + track].request_stop(boundary);
        }
        stopped
    }

    pub fn stop_slot(&mut self, track: usize, scene: usize) -> bool {
        let Some(idx) = self.slot_index(track, scene) else {
            return false;
        };
        let boundary = self.launch_boundary();
        self.slots[idx].request_stop(boundary)
    }

    /// Stop everything on the next tick, ignoring the quantize setting
    pub fn stop_all(&mut self) {
        let now = self.current_beat;
        for slot in &mut self.slots {
            slot.request_stop(now);
        }
        for scene in &mut self.scenes {
            scene.cancel_launch();
            scene.set_active(false);
        }
        self.all_stop_pending = true;
        debug!(beat = now, "stop all");
    }

    /// Rewind to beat 0 and stop every slot without quantization
    pub fn reset(&mut self) {
        self.current_beat = 0.0;
        for slot in &mut self.slots {
            slot.force_stop();
        }
        for scene in &mut self.scenes {
            scene.cancel_launch();
            scene.set_active(false);
        }
        self.all_stop_pending = true;
        debug!("launcher reset");
    }

    fn stop_others_on_track(&mut self, track: usize, keep_scene: usize, boundary: f64) {
        let track_count = self.tracks.len();
        for scene in (0..self.scenes.len()).filter(|&s| s != keep_scene) {
            self.slots[scene * track_count + track].request_stop(boundary);
        }
    }

    /// Silence every other sounding slot of `track` right away
    fn choke_track(&mut self, track: usize, keep_scene: usize) {
        let track_count = self.tracks.len();
        for scene in (0..self.scenes.len()).filter(|&s| s != keep_scene) {
            let slot = &mut self.slots[scene * track_count + track];
            if slot.is_audible() {
                slot.force_stop();
            }
        }
    }

    fn track_is_audible(&self, track: usize) -> bool {
        let track_count = self.tracks.len();
        (0..self.scenes.len()).any(|scene| self.slots[scene * track_count + track].is_audible())
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Advance musical time by `delta_beats` and commit everything that became due.
    ///
    /// Returns this tick's notifications, at most one per slot state change. Does not
    /// allocate once the grid is built.
    pub fn process(&mut self, delta_beats: f64) -> &[SchedulerEvent] {
        self.events.clear();
        let delta = sanitize_delta(delta_beats);
        self.current_beat += delta;
        let now = self.current_beat;

        self.track_was_audible.fill(false);
        for slot in &self.slots {
            if slot.is_audible() {
                self.track_was_audible[slot.track_index()] = true;
            }
        }

        // Stops commit before launches, so a track never holds two sounding clips
        for slot in self.slots.iter_mut() {
            if slot.state() == SlotState::QueuedToStop && slot.commit_if_due(now).is_some() {
                trace!(track = slot.track_index(), scene = slot.scene_index(), beat = now, "stop committed");
            }
        }
        for idx in 0..self.slots.len() {
            if self.slots[idx].state() != SlotState::QueuedToPlay {
                continue;
            }
            let Some(commit) = self.slots[idx].commit_if_due(now) else {
                continue;
            };
            let (track, scene) = (self.slots[idx].track_index(), self.slots[idx].scene_index());
            trace!(track, scene, beat = now, ?commit, "launch committed");
            if matches!(commit, SlotCommit::Started | SlotCommit::RecordingStarted) {
                self.choke_track(track, scene);
            }
        }

        // Slots that committed above advance by the whole tick too
        for slot in self.slots.iter_mut() {
            slot.advance(delta);
        }

        for index in 0..self.scenes.len() {
            if !self.scenes[index].commit_if_due(now) {
                continue;
            }
            for (other, scene) in self.scenes.iter_mut().enumerate() {
                scene.set_active(other == index);
            }
            self.events.push(SchedulerEvent::SceneLaunched { scene: index });
            if let Some(bpm) = self.scenes[index].tempo_override() {
                if bpm != self.bpm {
                    self.bpm = bpm;
                    self.events.push(SchedulerEvent::TempoChanged { bpm });
                }
            }
            debug!(scene = index, beat = now, "scene launched");
        }

        for (idx, slot) in self.slots.iter().enumerate() {
            let state = slot.state();
            if self.reported[idx] != state {
                self.reported[idx] = state;
                self.events.push(SchedulerEvent::ClipStateChanged {
                    track: slot.track_index(),
                    scene: slot.scene_index(),
                    state,
                });
            }
        }

        for track in 0..self.tracks.len() {
            if self.track_was_audible[track] && !self.track_is_audible(track) {
                self.events.push(SchedulerEvent::TrackStopped { track });
            }
        }

        if self.all_stop_pending {
            self.all_stop_pending = false;
            self.events.push(SchedulerEvent::AllStopped);
        }

        &self.events
    }

    /// Copy of the committed state
    pub fn snapshot(&self) -> LauncherSnapshot {
        LauncherSnapshot {
            current_beat: self.current_beat,
            bpm: self.bpm,
            quantize: self.quantize,
            beats_per_bar: self.beats_per_bar,
            track_names: self.tracks.iter().map(|t| t.name.clone()).collect(),
            scenes: self
                .scenes
                .iter()
                .map(|s| SceneSnapshot {
                    index: s.index(),
                    name: s.name.clone(),
                    tempo_override: s.tempo_override(),
                    is_active: s.is_active(),
                })
                .collect(),
            slots: self
                .slots
                .iter()
                .map(|s| SlotSnapshot {
                    track: s.track_index(),
                    scene: s.scene_index(),
                    state: s.state(),
                    clip_name: s.clip().map(|c| c.name().to_string()),
                    position_beats: s.play_position_beats(),
                    queued_boundary_beat: s.queued_boundary_beat(),
                })
                .collect(),
        }
    }
}

/// Negative or non-finite deltas would run time backwards; treat them as no time passing
fn sanitize_delta(delta_beats: f64) -> f64 {
    if delta_beats.is_finite() && delta_beats >= 0.0 {
        delta_beats
    } else {
        warn!(delta_beats, "invalid beat delta, clamping to zero");
        0.0
    }
}
