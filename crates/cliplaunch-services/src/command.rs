//! Commands submitted to the engine from other threads

use crossbeam_channel::{Sender, TrySendError};
use cliplaunch_core::{LaunchClip, QuantizeMode};

use crate::engine::EngineError;

/// Every mutation a caller can request. Drained at the start of each engine tick.
#[derive(Debug, Clone)]
pub enum LauncherCommand {
    LaunchClip { track: usize, scene: usize },
    LaunchScene(usize),
    RecordClip { track: usize, scene: usize, clip: LaunchClip },
    StopTrack(usize),
    StopSlot { track: usize, scene: usize },
    StopAll,
    Reset,
    SetClip { track: usize, scene: usize, clip: LaunchClip },
    ClearSlot { track: usize, scene: usize },
    SetQuantize(QuantizeMode),
    SetBpm(f64),
    SetTimeSignature { beats_per_bar: u32, beat_unit: u32 },
    SetSceneTempo { scene: usize, bpm: Option<f64> },
    AddScene(Option<String>),
    AddTrack(String),
    // Transport
    Play,
    Pause,
    /// Stop the transport and rewind the launcher
    Stop,
}

/// Cheap, cloneable sender side of the engine's command queue
#[derive(Debug, Clone)]
pub struct LauncherHandle {
    sender: Sender<LauncherCommand>,
}

impl LauncherHandle {
    pub(crate) fn new(sender: Sender<LauncherCommand>) -> Self {
        Self { sender }
    }

    /// Queue a command without blocking
    pub fn send(&self, command: LauncherCommand) -> Result<(), EngineError> {
        self.sender.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::CommandQueueFull,
            TrySendError::Disconnected(_) => EngineError::Disconnected,
        })
    }

    pub fn launch_clip(&self, track: usize, scene: usize) -> Result<(), EngineError> {
        self.send(LauncherCommand::LaunchClip { track, scene })
    }

    pub fn launch_scene(&self, scene: usize) -> Result<(), EngineError> {
        self.send(LauncherCommand::LaunchScene(scene))
    }

    pub fn stop_track(&self, track: usize) -> Result<(), EngineError> {
        self.send(LauncherCommand::StopTrack(track))
    }

    pub fn stop_all(&self) -> Result<(), EngineError> {
        self.send(LauncherCommand::StopAll)
    }

    pub fn set_quantize(&self, mode: QuantizeMode) -> Result<(), EngineError> {
        self.send(LauncherCommand::SetQuantize(mode))
    }

    pub fn play(&self) -> Result<(), EngineError> {
        self.send(LauncherCommand::Play)
    }

    /// Commands waiting to be drained
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}
