//! Session file: launcher settings, grid contents and a timed script

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use cliplaunch_core::{ClipLauncher, LaunchClip, LauncherSettings, QuantizeMode, Rgba};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct AppConfig {
    #[serde(default)]
    pub launcher: LauncherSettings,
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
    #[serde(default)]
    pub scenes: Vec<SceneConfig>,
    #[serde(default)]
    pub clips: Vec<ClipConfig>,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TrackConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SceneConfig {
    pub name: String,
    #[serde(default)]
    pub tempo: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ClipConfig {
    pub track: usize,
    pub scene: usize,
    pub name: String,
    pub length_beats: f64,
    #[serde(rename = "loop", default = "default_looped")]
    pub looped: bool,
    /// `[r, g, b]`
    #[serde(default)]
    pub color: Option<[u8; 3]>,
}

fn default_looped() -> bool {
    true
}

/// One scripted command, submitted once the transport reaches `at_beat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ScriptStep {
    pub at_beat: f64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum ScriptAction {
    LaunchClip { track: usize, scene: usize },
    LaunchScene { scene: usize },
    StopTrack { track: usize },
    StopSlot { track: usize, scene: usize },
    StopAll,
    Reset,
    SetQuantize { mode: QuantizeMode },
    SetBpm { bpm: f64 },
}

pub(crate) fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cliplaunch")
        .join("config.toml")
}

pub(crate) fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let config: AppConfig = toml::from_str(text)?;
    config.launcher.validate().context("invalid [launcher] table")?;
    Ok(config)
}

/// Load an explicit config file, or the default one if it exists
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path();
            if !path.exists() {
                info!(path = %path.display(), "No config file, using defaults");
                return Ok(AppConfig::default());
            }
            path
        }
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config =
        parse_config(&text).with_context(|| format!("failed to parse {}", path.display()))?;
    info!(
        path = %path.display(),
        clips = config.clips.len(),
        steps = config.script.len(),
        "Loaded config"
    );
    Ok(config)
}

/// Write a default config to the default location and return where it went
pub(crate) fn save_default_config() -> anyhow::Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(&AppConfig::default())?;
    std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Build the launcher grid described by the config
pub(crate) fn build_launcher(config: &AppConfig) -> anyhow::Result<ClipLauncher> {
    let mut launcher = ClipLauncher::from_settings(&config.launcher)?;

    for (index, track) in config.tracks.iter().enumerate() {
        let Some(target) = launcher.track_mut(index) else {
            bail!(
                "track '{}' does not fit in a grid of {} tracks",
                track.name,
                config.launcher.tracks
            );
        };
        target.name = track.name.clone();
    }

    for (index, scene) in config.scenes.iter().enumerate() {
        if let Some(bpm) = scene.tempo {
            if !bpm.is_finite() || bpm <= 0.0 {
                bail!("scene '{}' has an invalid tempo {bpm}", scene.name);
            }
        }
        let Some(target) = launcher.scene_mut(index) else {
            bail!(
                "scene '{}' does not fit in a grid of {} scenes",
                scene.name,
                config.launcher.scenes
            );
        };
        target.name = scene.name.clone();
        target.set_tempo_override(scene.tempo);
    }

    for clip in &config.clips {
        let mut launch_clip = LaunchClip::new(clip.name.as_str(), clip.length_beats, clip.looped)
            .with_context(|| format!("clip '{}'", clip.name))?;
        if let Some([r, g, b]) = clip.color {
            launch_clip = launch_clip.with_color(Rgba::opaque(r, g, b));
        }
        launcher
            .try_set_clip(clip.track, clip.scene, launch_clip)
            .with_context(|| format!("clip '{}'", clip.name))?;
    }

    Ok(launcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cliplaunch_core::SlotState;

    const SESSION: &str = r#"
[launcher]
tracks = 2
scenes = 2
bpm = 124.0
quantize = "beat"

[[tracks]]
name = "Drums"

[[tracks]]
name = "Bass"

[[scenes]]
name = "Intro"

[[scenes]]
name = "Drop"
tempo = 128.0

[[clips]]
track = 0
scene = 0
name = "Kick loop"
length_beats = 4.0

[[clips]]
track = 1
scene = 1
name = "Riser"
length_beats = 8
loop = false
color = [255, 64, 0]

[[script]]
at_beat = 0
action = "launch_scene"
scene = 0

[[script]]
at_beat = 8.0
action = "set_quantize"
mode = "bar"

[[script]]
at_beat = 16.0
action = "stop_all"
"#;

    #[test]
    fn test_parse_session() {
        let config = parse_config(SESSION).unwrap();
        assert_eq!(config.launcher.tracks, 2);
        assert_eq!(config.launcher.bpm, 124.0);
        assert_eq!(config.launcher.quantize, QuantizeMode::Beat);
        // Unlisted settings keep their defaults
        assert_eq!(config.launcher.block_size, 512);

        assert_eq!(config.scenes[1].tempo, Some(128.0));
        assert!(config.clips[0].looped);
        assert!(!config.clips[1].looped);
        assert_eq!(config.clips[1].color, Some([255, 64, 0]));

        assert_eq!(config.script.len(), 3);
        assert_eq!(config.script[0].action, ScriptAction::LaunchScene { scene: 0 });
        assert_eq!(
            config.script[1].action,
            ScriptAction::SetQuantize { mode: QuantizeMode::Bar }
        );
        assert_eq!(config.script[2].action, ScriptAction::StopAll);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = parse_config("").unwrap();
        assert_eq!(config.launcher, LauncherSettings::default());
        assert!(config.clips.is_empty());
        assert!(config.script.is_empty());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(parse_config("[launcher]\nbpm = 0.0\n").is_err());
        assert!(parse_config("[launcher]\nbeat_unit = 3\n").is_err());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let text = "[[script]]\nat_beat = 0.0\naction = \"explode\"\n";
        assert!(parse_config(text).is_err());
    }

    #[test]
    fn test_build_launcher() {
        let config = parse_config(SESSION).unwrap();
        let launcher = build_launcher(&config).unwrap();

        assert_eq!(launcher.track(0).unwrap().name, "Drums");
        assert_eq!(launcher.scene(1).unwrap().name, "Drop");
        assert_eq!(launcher.scene(1).unwrap().tempo_override(), Some(128.0));
        assert_eq!(launcher.global_quantize(), QuantizeMode::Beat);

        let slot = launcher.slot(1, 1).unwrap();
        assert_eq!(slot.state(), SlotState::Stopped);
        let clip = slot.clip().unwrap();
        assert_eq!(clip.name(), "Riser");
        assert_eq!(clip.color(), Rgba::opaque(255, 64, 0));
        assert_eq!(launcher.slot(1, 0).unwrap().state(), SlotState::Empty);
    }

    #[test]
    fn test_build_launcher_rejects_out_of_grid() {
        let mut config = parse_config(SESSION).unwrap();
        config.clips[0].track = 5;
        assert!(build_launcher(&config).is_err());

        let mut config = parse_config(SESSION).unwrap();
        config.clips[0].length_beats = 0.0;
        assert!(build_launcher(&config).is_err());

        let mut config = parse_config(SESSION).unwrap();
        config.tracks.push(TrackConfig { name: "Extra".into() });
        assert!(build_launcher(&config).is_err());

        let mut config = parse_config(SESSION).unwrap();
        config.scenes[0].tempo = Some(-5.0);
        assert!(build_launcher(&config).is_err());
    }

    #[test]
    fn test_default_config_serializes() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let config = parse_config(&text).unwrap();
        assert_eq!(config.launcher, LauncherSettings::default());
    }
}
