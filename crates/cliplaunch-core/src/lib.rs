//! cliplaunch-core: Quantized clip/scene launch scheduler

mod clip;
mod error;
pub mod events;
pub mod launcher;
pub mod quantize;
mod scene;
mod settings;
mod slot;
pub mod snapshot;
mod track;
mod transport;

pub use clip::{LaunchClip, Rgba};
pub use error::{LauncherError, Result};
pub use events::SchedulerEvent;
pub use launcher::ClipLauncher;
pub use quantize::{next_boundary, QuantizeMode};
pub use scene::Scene;
pub use settings::{LauncherSettings, MAX_SLOTS};
pub use slot::{ClipSlot, SlotCommit, SlotState};
pub use snapshot::{LauncherSnapshot, SceneSnapshot, SlotSnapshot};
pub use track::Track;
pub use transport::{format_position, BeatClock, TransportState};
