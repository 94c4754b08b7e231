use std::collections::HashMap;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Program, ProgramCtx, ProgramStatus, StartParams, parse_params};
use crate::animation::{AnimationSet, random_k_dance};
use crate::cooldown::CooldownTable;
use crate::event::Event;
use crate::input::InputState;
use crate::sched::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClueTask {
    Finish,
}

/// Reaction to a recognized panel state.
#[derive(Debug, Clone)]
enum ClueAction {
    PlayEffect(String),
    ShowWord(u16),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ClueFinderParams {
    /// Button combination that reveals the clue.
    secret: Vec<u8>,
    ack_sound: String,
    found_sound: String,
    cooldown_ms: u64,
}

impl Default for ClueFinderParams {
    fn default() -> Self {
        Self {
            secret: vec![0, 4, 9],
            ack_sound: "positive/arcade_plus_one.wav".to_string(),
            found_sound: "positive/hooray.wav".to_string(),
            cooldown_ms: 250,
        }
    }
}

/// Exploration mode: a trigger table maps whole panel states to actions,
/// with a default acknowledgement for everything else. Holding the secret
/// button combination finds the clue and ends the program.
pub struct ClueFinder {
    params: ClueFinderParams,
    triggers: HashMap<u16, ClueAction>,
    secret: InputState,
    found: bool,
    done: bool,
    scheduler: Scheduler<ClueTask>,
    cooldowns: CooldownTable,
    animations: AnimationSet,
}

impl ClueFinder {
    pub fn new() -> Self {
        Self {
            params: ClueFinderParams::default(),
            triggers: HashMap::new(),
            secret: InputState::default(),
            found: false,
            done: false,
            scheduler: Scheduler::new(),
            cooldowns: CooldownTable::new(),
            animations: AnimationSet::new(),
        }
    }

    pub fn boxed() -> Box<dyn Program> {
        Box::new(Self::new())
    }

    /// Echo pressed buttons back on their lasers; the default action when
    /// no trigger matches.
    fn default_action(&self, state: InputState, ctx: &mut ProgramCtx) {
        debug!(?state, word = state.word(), "clue finder state");
        ctx.lasers.set_word(state.buttons());
    }

    fn found_clue(&mut self, ctx: &mut ProgramCtx) {
        info!("clue found");
        self.found = true;
        ctx.audio.play_effect(&self.params.found_sound);
        let mut rng = rand::thread_rng();
        self.animations.spawn(random_k_dance(3, 8, 2.0, &mut rng));
        self.scheduler.after_ms(ctx.now_us, 2500, ClueTask::Finish);
    }
}

impl Default for ClueFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Program for ClueFinder {
    fn name(&self) -> &'static str {
        "ClueFinder"
    }

    fn start(&mut self, ctx: &mut ProgramCtx, params: &StartParams) -> Result<()> {
        self.params = parse_params(params)?;
        self.scheduler.clear();
        self.cooldowns.clear();
        self.animations.clear();
        self.found = false;
        self.done = false;

        self.secret = InputState::from_bits(&self.params.secret, (false, false));
        // Triggers keyed by the button half of the word, so toggles never
        // mask a match: the secret combination, plus each secret button
        // alone giving a hint beep.
        self.triggers.clear();
        for &bit in &self.params.secret {
            self.triggers.insert(
                InputState::from_bits(&[bit], (false, false)).buttons(),
                ClueAction::PlayEffect(self.params.ack_sound.clone()),
            );
        }
        if !self.params.secret.is_empty() {
            self.triggers
                .insert(self.secret.buttons(), ClueAction::ShowWord(self.secret.buttons()));
        }

        ctx.audio.load_effect(&self.params.ack_sound, 0.3)?;
        ctx.audio.load_effect(&self.params.found_sound, 0.4)?;
        ctx.lasers.set_word(0);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ProgramCtx, dt: f64) -> ProgramStatus {
        self.cooldowns.sweep(ctx.tick);
        for task in self.scheduler.pop_ready(ctx.now_us) {
            match task {
                ClueTask::Finish => self.done = true,
            }
        }

        for event in ctx.events.drain() {
            if let Event::StateChange { state, .. } = event {
                if self.found {
                    continue;
                }
                match self.triggers.get(&state.buttons()).cloned() {
                    Some(ClueAction::ShowWord(word)) => {
                        ctx.lasers.set_word(word);
                        self.found_clue(ctx);
                    }
                    Some(ClueAction::PlayEffect(name)) => {
                        // One hint beep per press: cool the button down.
                        if let Some(key) = state.buttons_on().next() {
                            if self.cooldowns.active(key) {
                                continue;
                            }
                            self.cooldowns
                                .start(key, ctx.tick, ctx.ticks(self.params.cooldown_ms));
                        }
                        ctx.audio.play_effect(&name);
                    }
                    None => self.default_action(state, ctx),
                }
            }
        }

        let half_tick = ctx.half_tick();
        self.animations
            .update_all(dt, half_tick, &mut ctx.playback());

        if self.done {
            ProgramStatus::Finished
        } else {
            ProgramStatus::Running
        }
    }

    fn quit(&mut self, ctx: &mut ProgramCtx) {
        self.scheduler.clear();
        self.animations.clear();
        ctx.lasers.set_word(0);
    }
}
