use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use super::{Program, ProgramCtx, ProgramStatus, StartParams, parse_params};
use crate::event::Event;
use crate::input::StateSequence;

/// Free-play instrument mode: each button plays its patch sound, release
/// fades it out. Runs until the operator enters the mode-switch sequence.
pub struct MusicMaker {
    patch: String,
    backing_track: String,
    mode_switch: StateSequence,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MusicMakerParams {
    patch: String,
    backing_track: String,
}

impl Default for MusicMakerParams {
    fn default() -> Self {
        Self {
            patch: "Instruments_A".to_string(),
            backing_track: "Instruments_A_BackingTrack.wav".to_string(),
        }
    }
}

impl MusicMaker {
    pub fn new() -> Self {
        Self {
            patch: String::new(),
            backing_track: String::new(),
            mode_switch: StateSequence::mode_switch(),
        }
    }

    pub fn boxed() -> Box<dyn Program> {
        Box::new(Self::new())
    }
}

impl Default for MusicMaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Program for MusicMaker {
    fn name(&self) -> &'static str {
        "MusicMaker"
    }

    fn start(&mut self, ctx: &mut ProgramCtx, params: &StartParams) -> Result<()> {
        let params: MusicMakerParams = parse_params(params)?;
        self.patch = params.patch;
        self.backing_track = params.backing_track;

        ctx.audio.use_patch(&self.patch)?;
        ctx.audio.load_effect(&self.backing_track, 1.0)?;
        ctx.audio.load_music(&self.backing_track, -1)?;
        ctx.audio.set_music_volume(1.0);
        ctx.lasers.set_word(0);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ProgramCtx, _dt: f64) -> ProgramStatus {
        for event in ctx.events.drain() {
            match event {
                Event::ButtonDown { key, .. } => {
                    ctx.audio.play_by_id(key as usize, false);
                    ctx.lasers.turn_on(key as usize);
                }
                Event::ButtonUp { key, .. } => {
                    ctx.audio.fadeout_by_id(key as usize, 200);
                    ctx.lasers.turn_off(key as usize);
                }
                Event::ToggleOn { key, .. } | Event::ToggleOff { key, .. } => {
                    debug!(key, "toggle ignored in free play");
                }
                _ => {}
            }
        }

        if ctx.input.changed() && ctx.input.history_matches(&self.mode_switch) {
            return ProgramStatus::Finished;
        }
        ProgramStatus::Running
    }

    fn quit(&mut self, ctx: &mut ProgramCtx) {
        ctx.audio.music_fadeout(1000);
        ctx.lasers.set_word(0);
    }
}
