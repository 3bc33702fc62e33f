//! cliplaunch-services: Engine driver, command queue and event fan-out

pub mod command;
pub mod engine;

pub use command::{LauncherCommand, LauncherHandle};
pub use engine::{EngineError, LauncherEngine, RunningEngine, SharedPosition, SharedSnapshot};
