//! Timed command script

use cliplaunch_services::{EngineError, LauncherCommand, LauncherHandle};
use tracing::debug;

use crate::config::{ScriptAction, ScriptStep};

impl ScriptAction {
    pub(crate) fn command(&self) -> LauncherCommand {
        match *self {
            ScriptAction::LaunchClip { track, scene } => LauncherCommand::LaunchClip { track, scene },
            ScriptAction::LaunchScene { scene } => LauncherCommand::LaunchScene(scene),
            ScriptAction::StopTrack { track } => LauncherCommand::StopTrack(track),
            ScriptAction::StopSlot { track, scene } => LauncherCommand::StopSlot { track, scene },
            ScriptAction::StopAll => LauncherCommand::StopAll,
            ScriptAction::Reset => LauncherCommand::Reset,
            ScriptAction::SetQuantize { mode } => LauncherCommand::SetQuantize(mode),
            ScriptAction::SetBpm { bpm } => LauncherCommand::SetBpm(bpm),
        }
    }
}

/// Script steps in beat order, consumed as the transport moves
pub(crate) struct Script {
    steps: Vec<ScriptStep>,
    next: usize,
}

impl Script {
    pub(crate) fn new(mut steps: Vec<ScriptStep>) -> Self {
        // Stable: steps on the same beat keep file order
        steps.sort_by(|a, b| a.at_beat.total_cmp(&b.at_beat));
        Self { steps, next: 0 }
    }

    /// Submit every step due at or before `beat`. Returns how many were sent.
    pub(crate) fn submit_due(
        &mut self,
        beat: f64,
        handle: &LauncherHandle,
    ) -> Result<usize, EngineError> {
        let mut sent = 0;
        while let Some(step) = self.steps.get(self.next) {
            if step.at_beat > beat {
                break;
            }
            debug!(at_beat = step.at_beat, beat, action = ?step.action, "Script step");
            handle.send(step.action.command())?;
            self.next += 1;
            sent += 1;
        }
        Ok(sent)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.steps.len() - self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cliplaunch_core::{LaunchClip, LauncherSettings, QuantizeMode, SlotState};
    use cliplaunch_services::LauncherEngine;

    fn step(at_beat: f64, action: ScriptAction) -> ScriptStep {
        ScriptStep { at_beat, action }
    }

    #[test]
    fn test_steps_sorted_stably() {
        let script = Script::new(vec![
            step(4.0, ScriptAction::StopAll),
            step(0.0, ScriptAction::LaunchScene { scene: 0 }),
            step(4.0, ScriptAction::Reset),
        ]);
        let actions: Vec<_> = script.steps.iter().map(|s| s.action.clone()).collect();
        assert_eq!(
            actions,
            vec![
                ScriptAction::LaunchScene { scene: 0 },
                ScriptAction::StopAll,
                ScriptAction::Reset,
            ]
        );
    }

    #[test]
    fn test_submit_due_drives_engine() {
        let settings = LauncherSettings {
            tracks: 1,
            scenes: 1,
            quantize: QuantizeMode::None,
            block_size: 6_000,
            ..Default::default()
        };
        let mut engine = LauncherEngine::new(&settings).unwrap();
        engine
            .launcher_mut()
            .set_clip(0, 0, LaunchClip::new("Loop", 4.0, true).unwrap());
        let handle = engine.handle();
        handle.play().unwrap();

        let mut script = Script::new(vec![
            step(0.0, ScriptAction::LaunchClip { track: 0, scene: 0 }),
            step(1.0, ScriptAction::StopTrack { track: 0 }),
        ]);

        assert_eq!(script.submit_due(0.0, &handle).unwrap(), 1);
        assert_eq!(script.remaining(), 1);
        // 6000 frames at 48 kHz and 120 BPM is a quarter beat
        engine.process_block(6_000);
        assert_eq!(engine.launcher().slot(0, 0).unwrap().state(), SlotState::Playing);

        assert_eq!(script.submit_due(0.5, &handle).unwrap(), 0);
        assert_eq!(script.submit_due(1.0, &handle).unwrap(), 1);
        assert_eq!(script.remaining(), 0);
        engine.process_block(6_000);
        assert_eq!(engine.launcher().slot(0, 0).unwrap().state(), SlotState::Stopped);
    }

    #[test]
    fn test_action_commands() {
        assert!(matches!(
            ScriptAction::SetQuantize { mode: QuantizeMode::Beat }.command(),
            LauncherCommand::SetQuantize(QuantizeMode::Beat)
        ));
        assert!(matches!(
            ScriptAction::StopSlot { track: 1, scene: 2 }.command(),
            LauncherCommand::StopSlot { track: 1, scene: 2 }
        ));
        assert!(matches!(
            ScriptAction::SetBpm { bpm: 90.0 }.command(),
            LauncherCommand::SetBpm(bpm) if bpm == 90.0
        ));
    }
}
