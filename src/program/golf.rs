use std::f64::consts::PI;

use anyhow::Result;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{Program, ProgramCtx, ProgramStatus, StartParams, parse_params};
use crate::animation::{AnimationSet, random_k_dance};
use crate::cooldown::PendingReleases;
use crate::event::Event;
use crate::sched::Scheduler;

/// Ascending laser ports as seen from the control room; the power meter
/// fills along this remapping rather than raw port order.
const REMAP: [u8; 12] = [0, 13, 1, 12, 2, 11, 3, 10, 4, 9, 5, 8];

/// Power meter oscillation ceiling.
const MAX_POWER_INDEX: f64 = 12.9;
const MAX_VELOCITY: f64 = 20.0;
/// Roll friction coefficient.
const FRICTION: f64 = 1.0;
/// Seconds after which the roll is considered settled.
const MAX_ROLL_TIME: f64 = 5.0;

const BLINK_FPS: u32 = 3;
const BLINK_DUTY_CYCLE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GolfTask {
    Reset { goal: u8, tries: u8 },
    Complete,
    Finish,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct GolfParams {
    goals_to_complete: u32,
    /// Buttons that may trigger a swing.
    buttons: Vec<u8>,
    anti_jitter_ms: u64,
    music: String,
    fall_off_sound: String,
    win_sound: String,
    congrats_sound: String,
    congrats_volume: f32,
    patch: String,
    voice_feedback: Vec<String>,
}

impl Default for GolfParams {
    fn default() -> Self {
        Self {
            goals_to_complete: 3,
            buttons: vec![0, 1, 2, 3, 4, 5],
            anti_jitter_ms: 50,
            music: "Golf2Slow.wav".to_string(),
            fall_off_sound: "splash_mono.wav".to_string(),
            win_sound: "positive/hooray.wav".to_string(),
            congrats_sound: "positive/congrats_extended.wav".to_string(),
            congrats_volume: 0.75,
            patch: "kicks_ascending_mono".to_string(),
            voice_feedback: vec![
                "golf_feedback/trin_perfect.wav".to_string(),
                "golf_feedback/trin_one_away.wav".to_string(),
                "golf_feedback/trin_two_away.wav".to_string(),
                "golf_feedback/trin_undershot_1.wav".to_string(),
                "golf_feedback/trin_overshot_1.wav".to_string(),
                "golf_feedback/trin_overshot_2.wav".to_string(),
                "golf_feedback/trin_overshot_3.wav".to_string(),
            ],
        }
    }
}

/// Physics-timed putting game. Holding a button oscillates a power meter;
/// releasing it (debounced against switch bounce) rolls the ball along the
/// laser ports with exponential decay, graded against a blinking target
/// hole.
pub struct Golf {
    params: GolfParams,

    blink_on: bool,
    last_blink_toggle: u64,
    blink_wait: [u64; 2],
    /// Displayed word, cached without the goal bit or'd in.
    prev_word: u16,

    goal: u8,
    tries_left: u8,
    goals_scored: u32,

    swinging: bool,
    rolling: bool,
    grading: bool,
    done: bool,
    swing_start_us: i64,
    roll_start_us: i64,
    velocity: f64,
    power_index: usize,
    prev_displacement_index: i32,
    end_displacement_index: Option<i32>,

    pending: PendingReleases,
    scheduler: Scheduler<GolfTask>,
    animations: AnimationSet,
}

impl Golf {
    pub fn new() -> Self {
        Self {
            params: GolfParams::default(),
            blink_on: true,
            last_blink_toggle: 0,
            blink_wait: [0, 0],
            prev_word: 0,
            goal: 13,
            tries_left: 3,
            goals_scored: 0,
            swinging: false,
            rolling: false,
            grading: false,
            done: false,
            swing_start_us: 0,
            roll_start_us: 0,
            velocity: 0.0,
            power_index: 0,
            prev_displacement_index: -1,
            end_displacement_index: None,
            pending: PendingReleases::new(),
            scheduler: Scheduler::new(),
            animations: AnimationSet::new(),
        }
    }

    pub fn boxed() -> Box<dyn Program> {
        Box::new(Self::new())
    }

    /// Blink duty cycle in ticks, indexed by the current on/off phase.
    fn init_blink(&mut self, fps: u32) {
        let cycle_ticks = (fps / BLINK_FPS).max(2) as f64;
        let on_ticks = (BLINK_DUTY_CYCLE * cycle_ticks) as u64;
        let off_ticks = ((1.0 - BLINK_DUTY_CYCLE) * cycle_ticks) as u64;
        self.blink_wait = [off_ticks.max(1), on_ticks.max(1)];
    }

    fn reset(&mut self, ctx: &mut ProgramCtx, goal: u8, tries: u8) {
        info!(goal, tries, "new round");
        self.goal = goal;
        self.tries_left = tries;
        self.swinging = false;
        self.rolling = false;
        self.grading = false;
        self.prev_displacement_index = -1;
        self.end_displacement_index = None;
        self.pending.clear();
        self.set_word(ctx, 0, true);
    }

    fn random_goal() -> u8 {
        rand::thread_rng().gen_range(8..=13)
    }

    /// Display `word`, or'ing in the blinking goal bit unless suppressed.
    fn set_word(&mut self, ctx: &mut ProgramCtx, word: u16, with_target: bool) {
        self.prev_word = word;
        let mut display = word;
        if with_target && self.blink_on {
            display |= 1 << self.goal;
        }
        ctx.lasers.set_word(display);
    }

    fn refresh_word(&mut self, ctx: &mut ProgramCtx) {
        self.set_word(ctx, self.prev_word, true);
    }

    /// Blink the target hole even while nothing else is drawing.
    fn update_blink(&mut self, ctx: &mut ProgramCtx) {
        let elapsed = ctx.tick - self.last_blink_toggle;
        if elapsed >= self.blink_wait[self.blink_on as usize] {
            self.blink_on = !self.blink_on;
            self.last_blink_toggle = ctx.tick;
            self.refresh_word(ctx);
        }
    }

    /// Sinusoidal power sweep while the button is held.
    fn update_velocity(&mut self, t: f64) {
        let s = 0.5 + 0.5 * (2.0 * PI * t / 2.0 - PI / 2.0).sin();
        self.power_index = (MAX_POWER_INDEX * s) as usize;
        self.velocity = MAX_VELOCITY * s;
    }

    /// Port index reached after rolling for `t` seconds, None once the
    /// ball has rolled off the far edge.
    fn displacement_index(&self, t: f64) -> Option<i32> {
        let d = self.velocity / FRICTION * (1.0 - (-FRICTION * t).exp());
        let index = d.floor() as i32;
        if index > 13 { None } else { Some(index) }
    }

    fn power_meter_word(&self) -> u16 {
        REMAP[..self.power_index.min(REMAP.len())]
            .iter()
            .fold(0u16, |word, &port| word | (1 << port))
    }

    fn start_swinging(&mut self, now_us: i64) {
        self.swinging = true;
        self.swing_start_us = now_us;
        debug!("swing started");
    }

    fn stop_swinging(&mut self, ctx: &mut ProgramCtx) {
        if !self.swinging {
            warn!("erroneous call to stop_swinging ignored");
            return;
        }
        self.swinging = false;
        self.set_word(ctx, 0, true);
        self.end_displacement_index = self.displacement_index(MAX_ROLL_TIME);
    }

    fn start_rolling(&mut self, now_us: i64) {
        if self.rolling {
            warn!("erroneous call to start_rolling ignored");
            return;
        }
        self.rolling = true;
        self.roll_start_us = now_us;
        debug!(velocity = self.velocity, "rolling");
    }

    fn fall_off(&mut self, ctx: &mut ProgramCtx) {
        self.set_word(ctx, 0, false);
        ctx.audio.play_effect(&self.params.fall_off_sound);
    }

    fn roll(&mut self, ctx: &mut ProgramCtx) {
        let roll_time = (ctx.now_us - self.roll_start_us) as f64 / 1_000_000.0;
        let Some(index) = self.displacement_index(roll_time) else {
            // Rolled off the far edge.
            self.fall_off(ctx);
            self.grade_roll(ctx, None);
            return;
        };

        if index > self.prev_displacement_index {
            // Advanced one hole: kick sound pitched by position.
            ctx.audio.play_by_id(index as usize, false);
            self.set_word(ctx, 1 << index, true);
            self.prev_displacement_index = index;
        }

        if Some(index) == self.end_displacement_index {
            // Ball has come to a stop.
            self.grade_roll(ctx, Some(index));
        }
    }

    fn grade_roll(&mut self, ctx: &mut ProgramCtx, index: Option<i32>) {
        self.rolling = false;
        self.grading = true;
        self.play_voice_feedback(ctx, index);
        if index == Some(self.goal as i32) {
            self.celebrate(ctx);
        } else if self.tries_left > 1 {
            self.scheduler.after_ms(
                ctx.now_us,
                1000,
                GolfTask::Reset {
                    goal: self.goal,
                    tries: self.tries_left - 1,
                },
            );
        } else {
            info!("round lost, starting a new round");
            self.scheduler.after_ms(
                ctx.now_us,
                1000,
                GolfTask::Reset {
                    goal: Self::random_goal(),
                    tries: 3,
                },
            );
        }
    }

    fn play_voice_feedback(&mut self, ctx: &mut ProgramCtx, index: Option<i32>) {
        let feedback = &self.params.voice_feedback;
        if feedback.len() < 7 {
            return;
        }
        let name = match index {
            // Fell off the edge.
            None => feedback[6].clone(),
            Some(index) => {
                let signed_error = self.goal as i32 - index;
                let error = signed_error.unsigned_abs() as usize;
                info!(error, "roll graded");
                if error < 3 {
                    feedback[error].clone()
                } else if signed_error > 0 {
                    feedback[3].clone()
                } else {
                    feedback[rand::thread_rng().gen_range(4..=5)].clone()
                }
            }
        };
        ctx.audio.play_effect(&name);
    }

    fn celebrate(&mut self, ctx: &mut ProgramCtx) {
        self.goals_scored += 1;
        info!(scored = self.goals_scored, "goal!");
        ctx.audio.play_effect(&self.params.win_sound);
        if self.goals_scored >= self.params.goals_to_complete {
            ctx.audio.music_fadeout(3000);
            self.scheduler.after_ms(ctx.now_us, 3000, GolfTask::Complete);
        } else {
            self.scheduler.after_ms(
                ctx.now_us,
                3000,
                GolfTask::Reset {
                    goal: Self::random_goal(),
                    tries: 3,
                },
            );
        }
    }

    fn run_task(&mut self, task: GolfTask, ctx: &mut ProgramCtx) {
        match task {
            GolfTask::Reset { goal, tries } => self.reset(ctx, goal, tries),
            GolfTask::Complete => {
                ctx.audio.play_effect(&self.params.congrats_sound);
                let congrats_dur = ctx
                    .audio
                    .effect_duration(&self.params.congrats_sound)
                    .unwrap_or(3.0);
                let mut rng = rand::thread_rng();
                self.animations.spawn(random_k_dance(
                    3,
                    8,
                    (congrats_dur - 1.2).max(0.5),
                    &mut rng,
                ));
                self.scheduler
                    .after_ms(ctx.now_us, (congrats_dur * 1000.0) as u64, GolfTask::Finish);
            }
            GolfTask::Finish => {
                info!("golf complete");
                self.done = true;
            }
        }
    }
}

impl Default for Golf {
    fn default() -> Self {
        Self::new()
    }
}

impl Program for Golf {
    fn name(&self) -> &'static str {
        "Golf"
    }

    fn start(&mut self, ctx: &mut ProgramCtx, params: &StartParams) -> Result<()> {
        self.params = parse_params(params)?;
        self.scheduler.clear();
        self.animations.clear();
        self.pending.clear();
        self.goals_scored = 0;
        self.done = false;
        self.blink_on = true;
        self.last_blink_toggle = ctx.tick;
        self.init_blink(ctx.fps);

        ctx.audio.set_music_volume(1.0);
        ctx.audio.load_music(&self.params.music, -1)?;
        ctx.audio.load_effect(&self.params.fall_off_sound, 0.5)?;
        ctx.audio.load_effect(&self.params.win_sound, 0.4)?;
        ctx.audio
            .load_effect(&self.params.congrats_sound, self.params.congrats_volume)?;
        for feedback in self.params.voice_feedback.clone() {
            ctx.audio.load_effect(&feedback, 1.0)?;
        }
        ctx.audio.use_patch(&self.params.patch)?;

        self.reset(ctx, 13, 3);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ProgramCtx, dt: f64) -> ProgramStatus {
        for task in self.scheduler.pop_ready(ctx.now_us) {
            self.run_task(task, ctx);
        }
        self.update_blink(ctx);

        if self.swinging {
            let held = (ctx.now_us - self.swing_start_us) as f64 / 1_000_000.0;
            self.update_velocity(held);
            let meter = self.power_meter_word();
            self.set_word(ctx, meter, true);
        } else if self.rolling {
            self.roll(ctx);
        }

        for event in ctx.events.drain() {
            match event {
                Event::ButtonDown { key, .. } => {
                    if self.pending.cancel(key) {
                        // Blip inside the anti-jitter window: bounce, not a
                        // genuine release.
                        debug!(key, "cancelled pending swing release");
                    }
                    if self.params.buttons.contains(&key)
                        && !(self.swinging || self.rolling || self.grading)
                    {
                        self.start_swinging(ctx.now_us);
                    }
                }
                Event::ButtonUp { key, .. } => {
                    if self.params.buttons.contains(&key)
                        && self.swinging
                        && !(self.rolling || self.grading)
                        && self.pending.is_empty()
                    {
                        let window = ctx.ticks(self.params.anti_jitter_ms);
                        self.pending.schedule(key, ctx.tick + window);
                    }
                }
                Event::ToggleOn { .. } | Event::ToggleOff { .. } => {
                    self.reset(ctx, Self::random_goal(), 3);
                }
                _ => {}
            }
        }

        // Commit releases whose anti-jitter window passed unchallenged.
        for key in self.pending.sweep(ctx.tick) {
            debug!(key, "releasing");
            self.stop_swinging(ctx);
            self.start_rolling(ctx.now_us);
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
        self.pending.clear();
        ctx.lasers.set_word(0);
    }
}
