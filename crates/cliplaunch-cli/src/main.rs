//! cliplaunch: run a clip launcher session from a config file

mod config;
mod script;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cliplaunch_core::{format_position, LauncherSnapshot, SchedulerEvent, SlotState};
use cliplaunch_services::LauncherEngine;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::script::Script;

#[derive(Parser, Debug)]
#[command(author, version, about = "Quantized clip and scene launcher", long_about = None)]
struct Args {
    /// Session file (defaults to <config dir>/cliplaunch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How many bars to run
    #[arg(short, long, default_value_t = 8)]
    bars: u32,

    /// Run against the wall clock instead of as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,
}

/// Display names captured before the run
struct Names {
    tracks: Vec<String>,
    scenes: Vec<String>,
}

impl Names {
    fn from_snapshot(snapshot: &LauncherSnapshot) -> Self {
        Self {
            tracks: snapshot.track_names.clone(),
            scenes: snapshot.scenes.iter().map(|s| s.name.clone()).collect(),
        }
    }

    fn track(&self, index: usize) -> &str {
        self.tracks.get(index).map_or("?", String::as_str)
    }

    fn scene(&self, index: usize) -> &str {
        self.scenes.get(index).map_or("?", String::as_str)
    }

    fn describe(&self, event: &SchedulerEvent) -> String {
        match *event {
            SchedulerEvent::ClipStateChanged { track, scene, state } => {
                format!("{} / {}: {}", self.track(track), self.scene(scene), state.name())
            }
            SchedulerEvent::SceneLaunched { scene } => {
                format!("scene {} launched", self.scene(scene))
            }
            SchedulerEvent::TrackStopped { track } => format!("{} stopped", self.track(track)),
            SchedulerEvent::AllStopped => "all stopped".to_string(),
            SchedulerEvent::TempoChanged { bpm } => format!("tempo {bpm:.1} BPM"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("cliplaunch=info".parse()?))
        .init();

    let args = Args::parse();

    if args.init {
        let path = config::save_default_config()?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = config::load_config(args.config.as_deref())?;
    let launcher = config::build_launcher(&config)?;
    let names = Names::from_snapshot(&launcher.snapshot());
    let script = Script::new(config.script.clone());

    let mut engine = LauncherEngine::with_launcher(launcher, &config.launcher)
        .context("failed to start the launcher engine")?;
    let events = engine.subscribe();
    let total_beats = f64::from(args.bars) * f64::from(config.launcher.beats_per_bar);

    info!(
        bars = args.bars,
        realtime = args.realtime,
        bpm = config.launcher.bpm,
        "Starting session"
    );

    let snapshot = if args.realtime {
        run_realtime(engine, &events, script, &names, total_beats)?
    } else {
        run_offline(engine, &events, script, &names, total_beats)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_grid(&snapshot);
    }
    Ok(())
}

/// Drive the engine block by block as fast as possible
fn run_offline(
    mut engine: LauncherEngine,
    events: &Receiver<SchedulerEvent>,
    mut script: Script,
    names: &Names,
    total_beats: f64,
) -> anyhow::Result<LauncherSnapshot> {
    let handle = engine.handle();
    handle.play()?;
    let block_size = engine.block_size();
    let beats_per_bar = engine.launcher().beats_per_bar();

    while engine.launcher().current_beat() < total_beats {
        script.submit_due(engine.launcher().current_beat(), &handle)?;
        engine.process_block(block_size);
        let position = format_position(engine.launcher().current_beat(), beats_per_bar);
        for event in events.try_iter() {
            println!("{position}  {}", names.describe(&event));
        }
    }

    if script.remaining() > 0 {
        warn!(remaining = script.remaining(), "Run ended before every script step was due");
    }
    if engine.dropped_events() > 0 {
        warn!(dropped = engine.dropped_events(), "Events were dropped");
    }
    Ok(engine.launcher().snapshot())
}

/// Run the engine on its own thread and follow it from here
fn run_realtime(
    engine: LauncherEngine,
    events: &Receiver<SchedulerEvent>,
    mut script: Script,
    names: &Names,
    total_beats: f64,
) -> anyhow::Result<LauncherSnapshot> {
    let beats_per_bar = engine.launcher().beats_per_bar();
    let running = engine.spawn();
    let handle = running.handle();
    handle.play()?;

    loop {
        let beat = running.current_beat();
        if beat >= total_beats {
            break;
        }
        script.submit_due(beat, &handle)?;

        match events.recv_timeout(Duration::from_millis(5)) {
            Ok(event) => {
                let position = format_position(running.current_beat(), beats_per_bar);
                println!("{position}  {}", names.describe(&event));
                for event in events.try_iter() {
                    println!("{position}  {}", names.describe(&event));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let engine = running.stop()?;
    Ok(engine.launcher().snapshot())
}

fn state_symbol(state: SlotState) -> char {
    match state {
        SlotState::Empty => '.',
        SlotState::Stopped => 'o',
        SlotState::QueuedToPlay => '~',
        SlotState::Playing => '>',
        SlotState::QueuedToStop => 'x',
        SlotState::Recording => '*',
    }
}

fn print_grid(snapshot: &LauncherSnapshot) {
    println!();
    println!(
        "{}  {:.1} BPM  quantize {}",
        format_position(snapshot.current_beat, snapshot.beats_per_bar),
        snapshot.bpm,
        snapshot.quantize.name()
    );

    print!("{:<14}", "");
    for name in &snapshot.track_names {
        print!("{name:<16.14}");
    }
    println!();

    for scene in &snapshot.scenes {
        let marker = if scene.is_active { '*' } else { ' ' };
        print!("{marker} {:<12.12}", scene.name);
        for track in 0..snapshot.track_count() {
            match snapshot.slot(track, scene.index) {
                Some(slot) => {
                    let clip = slot.clip_name.as_deref().unwrap_or("");
                    print!("{} {:<14.13}", state_symbol(slot.state), clip);
                }
                None => print!("{:<16}", ""),
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use cliplaunch_core::ClipLauncher;

    #[test]
    fn test_args() {
        Args::command().debug_assert();

        let args = Args::parse_from(["cliplaunch", "--bars", "2", "--json"]);
        assert_eq!(args.bars, 2);
        assert!(args.json);
        assert!(!args.realtime);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_describe_events() {
        let mut launcher = ClipLauncher::new(2, 2);
        launcher.track_mut(1).unwrap().name = "Bass".into();
        launcher.scene_mut(0).unwrap().name = "Intro".into();
        let names = Names::from_snapshot(&launcher.snapshot());

        let event = SchedulerEvent::ClipStateChanged {
            track: 1,
            scene: 0,
            state: SlotState::Playing,
        };
        assert_eq!(names.describe(&event), format!("Bass / Intro: {}", SlotState::Playing.name()));
        assert_eq!(names.describe(&SchedulerEvent::TrackStopped { track: 7 }), "? stopped");
        assert_eq!(
            names.describe(&SchedulerEvent::TempoChanged { bpm: 128.0 }),
            "tempo 128.0 BPM"
        );
    }

    #[test]
    fn test_offline_run() {
        let config = config::parse_config(
            r#"
[launcher]
tracks = 1
scenes = 2
quantize = "bar"

[[clips]]
track = 0
scene = 0
name = "A"
length_beats = 4.0

[[clips]]
track = 0
scene = 1
name = "B"
length_beats = 4.0

[[script]]
at_beat = 0.0
action = "launch_scene"
scene = 0

[[script]]
at_beat = 5.0
action = "launch_clip"
track = 0
scene = 1
"#,
        )
        .unwrap();
        let launcher = config::build_launcher(&config).unwrap();
        let names = Names::from_snapshot(&launcher.snapshot());
        let mut engine = LauncherEngine::with_launcher(launcher, &config.launcher).unwrap();
        let events = engine.subscribe();

        let snapshot = run_offline(
            engine,
            &events,
            Script::new(config.script.clone()),
            &names,
            12.0,
        )
        .unwrap();

        assert!(snapshot.current_beat >= 12.0);
        assert_eq!(snapshot.playing_scene(0), Some(1));
        assert_eq!(snapshot.slot(0, 0).unwrap().state, SlotState::Stopped);
        assert!(snapshot.scenes[0].is_active);
    }

    #[test]
    fn test_state_symbols_distinct() {
        let states = [
            SlotState::Empty,
            SlotState::Stopped,
            SlotState::QueuedToPlay,
            SlotState::Playing,
            SlotState::QueuedToStop,
            SlotState::Recording,
        ];
        let mut symbols: Vec<char> = states.iter().map(|s| state_symbol(*s)).collect();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), states.len());
    }
}
