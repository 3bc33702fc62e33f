//! Launcher engine: drives the scheduler from audio blocks

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cliplaunch_core::{
    BeatClock, ClipLauncher, LauncherError, LauncherSettings, LauncherSnapshot, SchedulerEvent,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::{LauncherCommand, LauncherHandle};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Command queue is full")]
    CommandQueueFull,
    #[error("Engine is gone")]
    Disconnected,
    #[error("Engine not running")]
    NotRunning,
    #[error("Engine thread panicked")]
    ThreadPanicked,
    #[error("Launcher error: {0}")]
    Launcher(#[from] LauncherError),
}

/// Latest committed launcher state, readable from any thread
pub type SharedSnapshot = Arc<Mutex<LauncherSnapshot>>;

/// Transport position in beats, stored as `f64` bits
#[derive(Debug, Clone, Default)]
pub struct SharedPosition(Arc<AtomicU64>);

impl SharedPosition {
    pub fn beats(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, beats: f64) {
        self.0.store(beats.to_bits(), Ordering::Relaxed);
    }
}

/// Owns the launcher and its clock. Everything that mutates the launcher goes through
/// the command queue and is applied on the thread calling [`LauncherEngine::process_block`].
pub struct LauncherEngine {
    launcher: ClipLauncher,
    clock: BeatClock,
    block_size: u32,
    commands: Receiver<LauncherCommand>,
    command_sender: Sender<LauncherCommand>,
    subscribers: Vec<Sender<SchedulerEvent>>,
    event_capacity: usize,
    snapshot: SharedSnapshot,
    position: SharedPosition,
    snapshot_dirty: bool,
    dropped_events: u64,
}

impl LauncherEngine {
    pub fn new(settings: &LauncherSettings) -> Result<Self, EngineError> {
        let launcher = ClipLauncher::from_settings(settings)?;
        Self::with_launcher(launcher, settings)
    }

    /// Wrap a prepared launcher (clips already assigned)
    pub fn with_launcher(
        launcher: ClipLauncher,
        settings: &LauncherSettings,
    ) -> Result<Self, EngineError> {
        settings.validate()?;
        let (command_sender, commands) = bounded(settings.command_capacity);
        let mut clock = BeatClock::new(settings.sample_rate, launcher.bpm());
        clock.set_time_signature(launcher.beats_per_bar(), launcher.beat_unit())?;
        let snapshot = Arc::new(Mutex::new(launcher.snapshot()));
        Ok(Self {
            launcher,
            clock,
            block_size: settings.block_size,
            commands,
            command_sender,
            subscribers: Vec::new(),
            event_capacity: settings.event_capacity,
            snapshot,
            position: SharedPosition::default(),
            snapshot_dirty: false,
            dropped_events: 0,
        })
    }

    pub fn handle(&self) -> LauncherHandle {
        LauncherHandle::new(self.command_sender.clone())
    }

    /// Receive every event emitted from now on. A subscriber that falls behind by more
    /// than the configured capacity loses events instead of stalling the engine.
    pub fn subscribe(&mut self) -> Receiver<SchedulerEvent> {
        let (tx, rx) = bounded(self.event_capacity);
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn snapshot_handle(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// Current beat, updated after every block without locking
    pub fn position_handle(&self) -> SharedPosition {
        self.position.clone()
    }

    pub fn launcher(&self) -> &ClipLauncher {
        &self.launcher
    }

    /// Direct access for set-up before the engine starts running
    pub fn launcher_mut(&mut self) -> &mut ClipLauncher {
        &mut self.launcher
    }

    pub fn clock(&self) -> &BeatClock {
        &self.clock
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Apply queued commands, advance by `frames` and publish the results.
    ///
    /// Returns the number of events emitted.
    pub fn process_block(&mut self, frames: u32) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
            applied += 1;
        }

        let delta = self.clock.advance(frames);
        let events = self.launcher.process(delta);
        let count = events.len();

        let mut dropped = 0u64;
        for event in events {
            self.subscribers.retain(|subscriber| match subscriber.try_send(*event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
        if dropped > 0 {
            self.dropped_events += dropped;
            warn!(dropped, total = self.dropped_events, "subscriber queue full, events dropped");
        }
        self.position.store(self.launcher.current_beat());

        // Scene tempo overrides land in the launcher
        if self.clock.bpm() != self.launcher.bpm() {
            let _ = self.clock.set_bpm(self.launcher.bpm());
        }

        if count > 0 || applied > 0 {
            self.snapshot_dirty = true;
        }
        if self.snapshot_dirty {
            self.publish_snapshot();
        }
        count
    }

    /// Retried on later blocks while a reader holds the lock
    fn publish_snapshot(&mut self) {
        // Never block the driving thread on a reader
        if let Ok(mut shared) = self.snapshot.try_lock() {
            *shared = self.launcher.snapshot();
            self.snapshot_dirty = false;
        }
    }

    fn apply(&mut self, command: LauncherCommand) {
        debug!(?command, "applying command");
        let launcher = &mut self.launcher;
        match command {
            LauncherCommand::LaunchClip { track, scene } => {
                launcher.launch_clip(track, scene);
            }
            LauncherCommand::LaunchScene(scene) => {
                launcher.launch_scene(scene);
            }
            LauncherCommand::RecordClip { track, scene, clip } => {
                launcher.record_clip(track, scene, clip);
            }
            LauncherCommand::StopTrack(track) => {
                launcher.stop_track(track);
            }
            LauncherCommand::StopSlot { track, scene } => {
                launcher.stop_slot(track, scene);
            }
            LauncherCommand::StopAll => launcher.stop_all(),
            LauncherCommand::Reset => {
                launcher.reset();
                self.clock.rewind();
            }
            LauncherCommand::SetClip { track, scene, clip } => {
                launcher.set_clip(track, scene, clip);
            }
            LauncherCommand::ClearSlot { track, scene } => {
                launcher.clear_slot(track, scene);
            }
            LauncherCommand::SetQuantize(mode) => launcher.set_global_quantize(mode),
            LauncherCommand::SetBpm(bpm) => match launcher.set_bpm(bpm) {
                Ok(()) => {
                    let _ = self.clock.set_bpm(bpm);
                }
                Err(e) => warn!(%e, "ignoring tempo change"),
            },
            LauncherCommand::SetTimeSignature {
                beats_per_bar,
                beat_unit,
            } => match launcher.set_time_signature(beats_per_bar, beat_unit) {
                Ok(()) => {
                    let _ = self.clock.set_time_signature(beats_per_bar, beat_unit);
                }
                Err(e) => warn!(%e, "ignoring time signature change"),
            },
            LauncherCommand::SetSceneTempo { scene, bpm } => {
                if let Some(scene) = launcher.scene_mut(scene) {
                    scene.set_tempo_override(bpm);
                }
            }
            LauncherCommand::AddScene(name) => {
                launcher.add_scene(name);
            }
            LauncherCommand::AddTrack(name) => {
                launcher.add_track(name);
            }
            LauncherCommand::Play => self.clock.play(),
            LauncherCommand::Pause => self.clock.pause(),
            LauncherCommand::Stop => {
                self.clock.stop();
                launcher.reset();
            }
        }
    }

    /// Run the engine on its own thread, one block per block duration of wall-clock time
    pub fn spawn(mut self) -> RunningEngine {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = self.handle();
        let snapshot = self.snapshot_handle();
        let position = self.position_handle();
        let block_size = self.block_size;
        let block_duration = Duration::from_secs_f64(self.clock.frames_to_secs(block_size));

        let thread = thread::spawn(move || {
            info!(block_size, ?block_duration, "Launcher engine started");
            let mut next_block = Instant::now();
            while flag.load(Ordering::SeqCst) {
                self.process_block(block_size);
                next_block += block_duration;
                let now = Instant::now();
                if next_block > now {
                    thread::sleep(next_block - now);
                } else {
                    // Fell behind, don't try to catch up with a burst of blocks
                    next_block = now;
                }
            }
            info!("Launcher engine stopped");
            self
        });

        RunningEngine {
            running,
            thread: Some(thread),
            handle,
            snapshot,
            position,
        }
    }
}

/// An engine running on its own thread
pub struct RunningEngine {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<LauncherEngine>>,
    handle: LauncherHandle,
    snapshot: SharedSnapshot,
    position: SharedPosition,
}

impl RunningEngine {
    pub fn handle(&self) -> LauncherHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn current_beat(&self) -> f64 {
        self.position.beats()
    }

    /// Most recently published snapshot
    pub fn snapshot(&self) -> LauncherSnapshot {
        self.snapshot
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Stop the thread and hand the engine back
    pub fn stop(mut self) -> Result<LauncherEngine, EngineError> {
        self.running.store(false, Ordering::SeqCst);
        let thread = self.thread.take().ok_or(EngineError::NotRunning)?;
        thread.join().map_err(|_| EngineError::ThreadPanicked)
    }
}

impl Drop for RunningEngine {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
