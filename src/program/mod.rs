mod clue_finder;
mod composer;
mod flipper;
mod golf;
mod music_maker;
mod toggle_pattern;

pub use clue_finder::ClueFinder;
pub use composer::{Composer, ProgramStep};
pub use flipper::Flipper;
pub use golf::Golf;
pub use music_maker::MusicMaker;
pub use toggle_pattern::TogglePattern;

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::animation::PlaybackCtx;
use crate::audio::AudioService;
use crate::event::EventBus;
use crate::input::InputDecoder;
use crate::output::LaserBay;

/// Start parameters for a program, as carried by the composition script.
pub type StartParams = serde_json::Value;

/// Decode a program's typed parameter struct, falling back to its defaults
/// when the script carries no parameters.
pub fn parse_params<T: DeserializeOwned + Default>(params: &StartParams) -> Result<T> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).context("invalid program parameters")
}

/// What a program's update reports back to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStatus {
    Running,
    /// Hand off to the next scripted program.
    Finished,
}

/// Per-tick view of the core handed to the active program. References are
/// installed fresh every tick; programs never retain them.
pub struct ProgramCtx<'a> {
    pub tick: u64,
    pub now_us: i64,
    pub fps: u32,
    pub input: &'a InputDecoder,
    pub events: &'a mut EventBus,
    pub lasers: &'a mut LaserBay,
    pub audio: &'a mut dyn AudioService,
}

impl<'a> ProgramCtx<'a> {
    /// The output surfaces an animation may touch.
    pub fn playback(&mut self) -> PlaybackCtx<'_> {
        PlaybackCtx {
            lasers: &mut *self.lasers,
            audio: &mut *self.audio,
        }
    }

    /// Readiness epsilon for animation frames: half a tick period.
    pub fn half_tick(&self) -> f64 {
        0.5 / self.fps as f64
    }

    /// Whole ticks for a millisecond duration at the loop rate.
    pub fn ticks(&self, ms: u64) -> u64 {
        crate::cooldown::ms_to_ticks(self.fps, ms)
    }
}

/// Lifecycle contract every mini-game implements. Shared helpers
/// (Scheduler, CooldownTable, PendingReleases, AnimationSet) are owned
/// fields of each implementation, composed rather than inherited, and each
/// instance owns its own copies.
///
/// `update` runs once per tick and is expected to sweep its cooldowns, pop
/// its ready scheduled tasks, drain the event bus and advance its
/// animations. `start` must reset all internal state, including dropping
/// tasks scheduled by a previous activation.
pub trait Program {
    fn name(&self) -> &'static str;

    fn start(&mut self, ctx: &mut ProgramCtx, params: &StartParams) -> Result<()>;

    fn update(&mut self, ctx: &mut ProgramCtx, dt: f64) -> ProgramStatus;

    /// Teardown on the way out; the default has nothing to release.
    fn quit(&mut self, _ctx: &mut ProgramCtx) {}
}

/// All known programs, keyed by name. Explicitly constructed at startup and
/// owned by the state machine; nothing global.
#[derive(Default)]
pub struct ProgramRegistry {
    programs: HashMap<String, Box<dyn Program>>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, program: Box<dyn Program>) {
        let name = program.name().to_string();
        info!(program = %name, "registered");
        self.programs.insert(name, program);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn Program>> {
        self.programs.get_mut(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.programs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Whether the installation sequence is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineStatus {
    Running,
    Complete,
}

/// Activates exactly one program at a time and advances the composer
/// whenever the active program finishes.
pub struct StateMachine {
    registry: ProgramRegistry,
    composer: Composer,
    active: Option<String>,
}

impl StateMachine {
    pub fn new(registry: ProgramRegistry, composer: Composer) -> Self {
        Self {
            registry,
            composer,
            active: None,
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Initial activation: take the first scripted step. An empty script is
    /// complete before it begins.
    pub fn start(&mut self, ctx: &mut ProgramCtx) -> Result<MachineStatus> {
        self.advance(ctx)
    }

    pub fn update(&mut self, ctx: &mut ProgramCtx, dt: f64) -> Result<MachineStatus> {
        let Some(name) = self.active.clone() else {
            return Ok(MachineStatus::Complete);
        };
        let program = self
            .registry
            .get_mut(&name)
            .ok_or_else(|| anyhow!("active program '{name}' vanished from registry"))?;
        match program.update(ctx, dt) {
            ProgramStatus::Running => Ok(MachineStatus::Running),
            ProgramStatus::Finished => {
                program.quit(ctx);
                self.active = None;
                self.advance(ctx)
            }
        }
    }

    fn advance(&mut self, ctx: &mut ProgramCtx) -> Result<MachineStatus> {
        let Some(step) = self.composer.next_program() else {
            return Ok(MachineStatus::Complete);
        };
        let (name, params) = (step.program.clone(), step.params.clone());
        self.swap_program(&name, &params, ctx)?;
        Ok(MachineStatus::Running)
    }

    /// Install the named program as active and start it. An unregistered
    /// name is a configuration error and fatal.
    pub fn swap_program(
        &mut self,
        name: &str,
        params: &StartParams,
        ctx: &mut ProgramCtx,
    ) -> Result<()> {
        let known = self.registry.names().join(", ");
        let program = self
            .registry
            .get_mut(name)
            .ok_or_else(|| anyhow!("program '{name}' is not registered (known: {known})"))?;
        info!(program = name, "activating");
        program.start(ctx, params)?;
        self.active = Some(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::audio::MockAudio;
    use crate::traits::ScriptedInput;

    /// Everything a ProgramCtx borrows, bundled for tests.
    pub struct CtxHarness {
        pub decoder: InputDecoder,
        pub bus: EventBus,
        pub lasers: LaserBay,
        pub audio: MockAudio,
        pub tick: u64,
        pub now_us: i64,
        pub fps: u32,
    }

    impl CtxHarness {
        pub fn new(words: impl IntoIterator<Item = u16>) -> Self {
            Self {
                decoder: InputDecoder::new(Box::new(ScriptedInput::new(words))),
                bus: EventBus::new(),
                lasers: LaserBay::new(),
                audio: MockAudio::new(),
                tick: 0,
                now_us: 0,
                fps: 60,
            }
        }

        /// Advance one tick: poll input, then hand out a fresh ctx.
        pub fn step(&mut self) -> ProgramCtx<'_> {
            self.tick += 1;
            self.now_us += 1_000_000 / self.fps as i64;
            self.decoder.poll(&mut self.bus, self.now_us);
            self.ctx()
        }

        pub fn ctx(&mut self) -> ProgramCtx<'_> {
            ProgramCtx {
                tick: self.tick,
                now_us: self.now_us,
                fps: self.fps,
                input: &self.decoder,
                events: &mut self.bus,
                lasers: &mut self.lasers,
                audio: &mut self.audio,
            }
        }
    }
}
