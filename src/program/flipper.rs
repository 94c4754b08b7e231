use anyhow::Result;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Program, ProgramCtx, ProgramStatus, StartParams, parse_params};
use crate::animation::{AnimationSet, random_k_dance};
use crate::cooldown::CooldownTable;
use crate::event::Event;
use crate::sched::Scheduler;

/// Deferred actions this program schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlipperTask {
    VictoryDance,
    Finish,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct FlipperParams {
    start_board: Vec<u8>,
    music: String,
    congrats_sound: String,
    congrats_volume: f32,
    cooldown_ms: u64,
}

impl Default for FlipperParams {
    fn default() -> Self {
        Self {
            start_board: vec![1, 0, 1, 0, 1, 0],
            music: "FlipperTutorialTrinity.wav".to_string(),
            congrats_sound: "positive/congrats_extended.wav".to_string(),
            congrats_volume: 0.75,
            cooldown_ms: 250,
        }
    }
}

/// Lights-out style puzzle: pressing a button flips its light and both
/// neighbors; the board is won when every light is on.
pub struct Flipper {
    params: FlipperParams,
    board: Vec<bool>,
    celebrating: bool,
    done: bool,
    scheduler: Scheduler<FlipperTask>,
    cooldowns: CooldownTable,
    animations: AnimationSet,
}

impl Flipper {
    pub fn new() -> Self {
        Self {
            params: FlipperParams::default(),
            board: Vec::new(),
            celebrating: false,
            done: false,
            scheduler: Scheduler::new(),
            cooldowns: CooldownTable::new(),
            animations: AnimationSet::new(),
        }
    }

    pub fn boxed() -> Box<dyn Program> {
        Box::new(Self::new())
    }

    fn show_board(&self, ctx: &mut ProgramCtx) {
        for (i, &on) in self.board.iter().enumerate() {
            ctx.lasers.set_value(i, on);
        }
    }

    fn flip(&mut self, pos: usize) {
        self.board[pos] = !self.board[pos];
    }

    /// Flip the pressed light and its neighbors.
    fn press(&mut self, pos: usize) {
        self.flip(pos);
        if pos > 0 {
            self.flip(pos - 1);
        }
        if pos + 1 < self.board.len() {
            self.flip(pos + 1);
        }
    }

    fn randomize_board(&mut self, ctx: &mut ProgramCtx) {
        let mut rng = rand::thread_rng();
        for light in &mut self.board {
            *light = rng.gen_bool(0.5);
        }
        debug!(board = ?self.board, "new board pattern");
        self.show_board(ctx);
    }

    fn won(&self) -> bool {
        !self.board.is_empty() && self.board.iter().all(|&on| on)
    }

    fn run_task(&mut self, task: FlipperTask, ctx: &mut ProgramCtx) {
        match task {
            FlipperTask::VictoryDance => {
                ctx.audio.play_effect(&self.params.congrats_sound);
                let dance_dur = ctx
                    .audio
                    .effect_duration(&self.params.congrats_sound)
                    .unwrap_or(3.0);
                let mut rng = rand::thread_rng();
                self.animations
                    .spawn(random_k_dance(3, 6, (dance_dur - 1.2).max(0.5), &mut rng));
                self.scheduler.after_ms(
                    ctx.now_us,
                    (dance_dur * 1000.0) as u64,
                    FlipperTask::Finish,
                );
            }
            FlipperTask::Finish => self.done = true,
        }
    }
}

impl Default for Flipper {
    fn default() -> Self {
        Self::new()
    }
}

impl Program for Flipper {
    fn name(&self) -> &'static str {
        "Flipper"
    }

    fn start(&mut self, ctx: &mut ProgramCtx, params: &StartParams) -> Result<()> {
        self.params = parse_params(params)?;
        // A fresh activation must not inherit deferred work.
        self.scheduler.clear();
        self.cooldowns.clear();
        self.animations.clear();
        self.celebrating = false;
        self.done = false;
        self.board = self.params.start_board.iter().map(|&b| b != 0).collect();

        ctx.audio.load_music(&self.params.music, -1)?;
        ctx.audio.set_music_volume(1.0);
        ctx.audio
            .load_effect(&self.params.congrats_sound, self.params.congrats_volume)?;
        ctx.lasers.set_word(0);
        self.show_board(ctx);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ProgramCtx, dt: f64) -> ProgramStatus {
        self.cooldowns.sweep(ctx.tick);
        for task in self.scheduler.pop_ready(ctx.now_us) {
            self.run_task(task, ctx);
        }

        for event in ctx.events.drain() {
            match event {
                Event::ButtonDown { key, .. } if !self.celebrating => {
                    if self.cooldowns.active(key) {
                        debug!(key, "press ignored, cooling down");
                        continue;
                    }
                    self.cooldowns
                        .start(key, ctx.tick, ctx.ticks(self.params.cooldown_ms));
                    if (key as usize) < self.board.len() {
                        self.press(key as usize);
                        self.show_board(ctx);
                    }
                }
                Event::ToggleOn { .. } | Event::ToggleOff { .. } if !self.celebrating => {
                    self.randomize_board(ctx);
                }
                _ => {}
            }
        }

        if self.won() && !self.celebrating {
            info!("board solved");
            self.celebrating = true;
            ctx.audio.music_fadeout(2000);
            self.scheduler
                .after_ms(ctx.now_us, 1000, FlipperTask::VictoryDance);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::test_support::CtxHarness;

    fn started(harness: &mut CtxHarness) -> Flipper {
        let mut program = Flipper::new();
        let mut ctx = harness.ctx();
        program.start(&mut ctx, &serde_json::Value::Null).unwrap();
        program
    }

    #[test]
    fn start_shows_the_configured_board() {
        let mut harness = CtxHarness::new([]);
        let _program = started(&mut harness);
        // 1,0,1,0,1,0 -> bits 0, 2, 4.
        assert_eq!(harness.lasers.to_word(), 0b010101);
    }

    #[test]
    fn press_flips_neighbors() {
        let mut harness = CtxHarness::new([0b10, 0]);
        let mut program = started(&mut harness);

        let mut ctx = harness.step();
        program.update(&mut ctx, harness_dt());
        drop(ctx);
        // Pressing 1 flips 0, 1, 2: 101010... -> 010 -> bits 1,4 remain... board was
        // [1,0,1,0,1,0]; flipping 0..=2 gives [0,1,0,0,1,0].
        assert_eq!(harness.lasers.to_word(), 0b010010);
    }

    #[test]
    fn edge_press_flips_two_lights() {
        let mut harness = CtxHarness::new([0b1, 0]);
        let mut program = started(&mut harness);
        let mut ctx = harness.step();
        program.update(&mut ctx, harness_dt());
        drop(ctx);
        // Pressing 0 flips 0 and 1: [1,0,...] -> [0,1,1,0,1,0].
        assert_eq!(harness.lasers.to_word(), 0b010110);
    }

    #[test]
    fn cooldown_suppresses_rapid_represses() {
        let mut harness = CtxHarness::new([0b1, 0, 0b1, 0]);
        let mut program = started(&mut harness);
        let before = harness.lasers.to_word();
        // Press, release, press again within the cooldown window.
        for _ in 0..4 {
            let mut ctx = harness.step();
            program.update(&mut ctx, harness_dt());
        }
        // Second press ignored: net effect of exactly one press.
        assert_ne!(harness.lasers.to_word(), before);
        assert_eq!(harness.lasers.to_word(), 0b010110);
    }

    #[test]
    fn solving_the_board_schedules_victory_and_finishes() {
        // Start one press away from solved: pressing 0 on [0,0,1,1,1,1]
        // flips lights 0 and 1, yielding all-on.
        let params = serde_json::json!({"start_board": [0, 0, 1, 1, 1, 1]});
        let mut harness = CtxHarness::new([0b1]);
        let mut program = Flipper::new();
        let mut ctx = harness.ctx();
        program.start(&mut ctx, &params).unwrap();
        drop(ctx);

        let mut status = ProgramStatus::Running;
        for _ in 0..600 {
            let mut ctx = harness.step();
            status = program.update(&mut ctx, harness_dt());
            if status == ProgramStatus::Finished {
                break;
            }
        }
        assert_eq!(status, ProgramStatus::Finished);
        assert!(
            harness
                .audio
                .calls
                .iter()
                .any(|c| c.contains("music_fadeout"))
        );
        assert!(
            harness
                .audio
                .calls
                .iter()
                .any(|c| c.contains("congrats_extended"))
        );
    }

    fn harness_dt() -> f64 {
        1.0 / 60.0
    }
}
