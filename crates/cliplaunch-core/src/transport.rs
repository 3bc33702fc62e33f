//! Beat clock: converts audio blocks into musical time

use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, Result};

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Transport position and tempo, advanced once per audio block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatClock {
    pub state: TransportState,
    /// Frames rendered since the last stop
    pub position_samples: u64,
    /// Accumulated musical position (survives tempo changes)
    pub position_beats: f64,
    /// Sample rate for time conversion
    pub sample_rate: u32,
    /// Tempo in BPM
    bpm: f64,
    /// Time signature numerator
    pub time_sig_num: u32,
    /// Time signature denominator
    pub time_sig_denom: u32,
}

impl Default for BeatClock {
    fn default() -> Self {
        Self {
            state: TransportState::Stopped,
            position_samples: 0,
            position_beats: 0.0,
            sample_rate: 48_000,
            bpm: 120.0,
            time_sig_num: 4,
            time_sig_denom: 4,
        }
    }
}

impl BeatClock {
    pub fn new(sample_rate: u32, bpm: f64) -> Self {
        let mut clock = Self {
            sample_rate: sample_rate.max(1),
            ..Default::default()
        };
        // Keep the default tempo if the given one is unusable
        let _ = clock.set_bpm(bpm);
        clock
    }

    pub fn play(&mut self) {
        self.state = TransportState::Playing;
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.rewind();
    }

    /// Jump back to the start without touching the play state
    pub fn rewind(&mut self) {
        self.position_samples = 0;
        self.position_beats = 0.0;
    }

    pub fn pause(&mut self) {
        self.state = TransportState::Paused;
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(LauncherError::InvalidTempo(bpm));
        }
        self.bpm = bpm;
        Ok(())
    }

    pub fn set_time_signature(&mut self, num: u32, denom: u32) -> Result<()> {
        if num == 0 || !denom.is_power_of_two() {
            return Err(LauncherError::InvalidTimeSignature {
                beats_per_bar: num,
                beat_unit: denom,
            });
        }
        self.time_sig_num = num;
        self.time_sig_denom = denom;
        Ok(())
    }

    /// Samples per beat at current tempo
    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / self.bpm
    }

    /// Beats covered by `frames` samples at current tempo
    pub fn frames_to_beats(&self, frames: u32) -> f64 {
        frames as f64 / self.samples_per_beat()
    }

    /// Duration of `frames` samples in seconds
    pub fn frames_to_secs(&self, frames: u32) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    /// Advance by one block, returning the beat delta to feed the scheduler.
    /// Yields 0 while not playing.
    pub fn advance(&mut self, frames: u32) -> f64 {
        if !self.is_playing() {
            return 0.0;
        }
        let delta = self.frames_to_beats(frames);
        self.position_samples += frames as u64;
        self.position_beats += delta;
        delta
    }

    /// Position in seconds
    pub fn position_secs(&self) -> f64 {
        self.position_samples as f64 / self.sample_rate as f64
    }

    /// Current beat number (0-indexed)
    pub fn current_beat(&self) -> f64 {
        self.position_beats
    }

    /// Zero-based bar, beat within bar and sixteenth within beat
    pub fn bars_beats(&self) -> (u32, u32, u32) {
        bars_beats(self.position_beats, self.time_sig_num)
    }

    pub fn format_position(&self) -> String {
        format_position(self.position_beats, self.time_sig_num)
    }

    /// Format position as MM:SS.ss
    pub fn format_time(&self) -> String {
        let secs = self.position_secs();
        let mins = (secs / 60.0) as u32;
        let secs_rem = secs % 60.0;
        format!("{:02}:{:05.2}", mins, secs_rem)
    }
}

/// Split an absolute beat into zero-based bar, beat within bar and sixteenth
pub fn bars_beats(beat: f64, beats_per_bar: u32) -> (u32, u32, u32) {
    let beats_per_bar = beats_per_bar.max(1) as f64;
    let beat = beat.max(0.0);
    let bar = (beat / beats_per_bar).floor();
    let beat_in_bar = (beat - bar * beats_per_bar).floor();
    let sixteenth = ((beat - beat.floor()) * 4.0).floor();
    (bar as u32, beat_in_bar as u32, sixteenth as u32)
}

/// Format a beat as bar.beat.sixteenth, one-based
pub fn format_position(beat: f64, beats_per_bar: u32) -> String {
    let (bar, beat, sixteenth) = bars_beats(beat, beats_per_bar);
    format!("{:>3}.{}.{}", bar + 1, beat + 1, sixteenth + 1)
}
