use std::collections::VecDeque;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Program, ProgramCtx, ProgramStatus, StartParams, parse_params};
use crate::animation::{Animation, AnimationSet, FrameSequence};
use crate::event::Event;

/// Bounded count of recent toggle states considered for the pattern.
const HISTORY_SIZE: usize = 12;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct TogglePatternParams {
    start_audio: String,
    /// Target toggle states (low two bits each), matched in order.
    pattern: Vec<u8>,
    /// Laser counts per frame of the looping hold animation; empty for no
    /// animation.
    hold_pattern: Vec<u8>,
}

impl Default for TogglePatternParams {
    fn default() -> Self {
        Self {
            start_audio: "TogglePatternIntro.wav".to_string(),
            pattern: vec![0b01, 0b11],
            hold_pattern: Vec::new(),
        }
    }
}

/// Waits for the visitor to work the two toggle switches through a target
/// sequence of states; a lenient in-order scan over recent toggle history,
/// so stray flips in between do not reset progress.
pub struct TogglePattern {
    params: TogglePatternParams,
    toggle_history: VecDeque<u8>,
    search_window: usize,
    animations: AnimationSet,
}

impl TogglePattern {
    pub fn new() -> Self {
        Self {
            params: TogglePatternParams::default(),
            toggle_history: VecDeque::with_capacity(HISTORY_SIZE),
            search_window: 0,
            animations: AnimationSet::new(),
        }
    }

    pub fn boxed() -> Box<dyn Program> {
        Box::new(Self::new())
    }

    fn record_toggles(&mut self, toggles: u8) {
        if self.toggle_history.len() == HISTORY_SIZE {
            self.toggle_history.pop_front();
        }
        self.toggle_history.push_back(toggles);
    }

    /// In-order scan of the recent history tail for the target pattern.
    fn pattern_matched(&self) -> bool {
        let pattern = &self.params.pattern;
        if pattern.is_empty() {
            return false;
        }
        let skip = self.toggle_history.len().saturating_sub(self.search_window);
        let mut target_index = 0;
        for &toggles in self.toggle_history.iter().skip(skip) {
            if toggles == pattern[target_index] {
                target_index += 1;
            }
            if target_index == pattern.len() {
                return true;
            }
        }
        false
    }

    /// Hold animation from the configured code: each entry is how many
    /// lasers to light from port 0 up, meter style, looping until quit.
    fn hold_animation(&self, fps: u32) -> Option<Animation> {
        if self.params.hold_pattern.is_empty() {
            return None;
        }
        let words = self.params.hold_pattern.iter().map(|&count| {
            let count = (count as usize).min(crate::output::LASER_COUNT);
            ((1u32 << count) - 1) as u16
        });
        // Half a second per step, or two ticks when the loop runs slower
        // than 4 fps, so the meter stays readable.
        let frame_time = f64::max(0.5, 2.0 / fps as f64);
        Some(Animation::new(
            FrameSequence::from_words(words, frame_time),
            u32::MAX,
        ))
    }
}

impl Default for TogglePattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Program for TogglePattern {
    fn name(&self) -> &'static str {
        "TogglePattern"
    }

    fn start(&mut self, ctx: &mut ProgramCtx, params: &StartParams) -> Result<()> {
        self.params = parse_params(params)?;
        self.search_window = 2 * self.params.pattern.len().saturating_sub(1) + 1;
        self.toggle_history.clear();
        self.animations.clear();

        ctx.audio.load_music(&self.params.start_audio, 0)?;
        ctx.audio.set_music_volume(1.0);
        ctx.lasers.set_word(0);
        if let Some(animation) = self.hold_animation(ctx.fps) {
            debug!("starting hold animation");
            self.animations.spawn(animation);
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut ProgramCtx, dt: f64) -> ProgramStatus {
        let mut matched = false;
        for event in ctx.events.drain() {
            match event {
                Event::ToggleOn { state, .. } | Event::ToggleOff { state, .. } => {
                    self.record_toggles(state.toggles());
                    debug!(toggles = state.toggles(), "toggle state");
                    if self.pattern_matched() {
                        matched = true;
                    }
                }
                _ => {}
            }
        }

        let half_tick = ctx.half_tick();
        self.animations
            .update_all(dt, half_tick, &mut ctx.playback());

        if matched {
            info!("toggle pattern completed");
            return ProgramStatus::Finished;
        }
        ProgramStatus::Running
    }

    fn quit(&mut self, ctx: &mut ProgramCtx) {
        self.animations.clear();
        self.toggle_history.clear();
        ctx.lasers.set_word(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputState;
    use crate::program::test_support::CtxHarness;

    fn toggles(t0: bool, t1: bool) -> u16 {
        InputState::from_bits(&[], (t0, t1)).word()
    }

    fn run_words(words: Vec<u16>, params: serde_json::Value) -> (ProgramStatus, CtxHarness) {
        let mut harness = CtxHarness::new(words.clone());
        let mut program = TogglePattern::new();
        let mut ctx = harness.ctx();
        program.start(&mut ctx, &params).unwrap();
        drop(ctx);
        let mut status = ProgramStatus::Running;
        for _ in 0..words.len() {
            let mut ctx = harness.step();
            status = program.update(&mut ctx, 1.0 / 60.0);
            if status == ProgramStatus::Finished {
                break;
            }
        }
        (status, harness)
    }

    #[test]
    fn correct_sequence_finishes() {
        let params = serde_json::json!({"pattern": [1, 3]});
        let words = vec![toggles(true, false), toggles(true, true)];
        let (status, _) = run_words(words, params);
        assert_eq!(status, ProgramStatus::Finished);
    }

    #[test]
    fn stray_toggles_within_window_are_tolerated() {
        let params = serde_json::json!({"pattern": [1, 3]});
        // 01, stray 00, then 11: still a match inside the search window.
        let words = vec![toggles(true, false), toggles(false, false), toggles(true, true)];
        let (status, _) = run_words(words, params);
        assert_eq!(status, ProgramStatus::Finished);
    }

    #[test]
    fn wrong_order_does_not_finish() {
        let params = serde_json::json!({"pattern": [1, 3]});
        let words = vec![toggles(true, true), toggles(true, false)];
        let (status, _) = run_words(words, params);
        assert_eq!(status, ProgramStatus::Running);
    }

    #[test]
    fn button_presses_are_ignored() {
        let params = serde_json::json!({"pattern": [1]});
        let words = vec![0b1, 0b11, 0b111];
        let (status, _) = run_words(words, params);
        assert_eq!(status, ProgramStatus::Running);
    }

    #[test]
    fn hold_animation_spawns_when_configured() {
        let params = serde_json::json!({"pattern": [1, 3], "hold_pattern": [7, 0, 1, 0, 3, 0, 0, 0]});
        let mut harness = CtxHarness::new(Vec::<u16>::new());
        let mut program = TogglePattern::new();
        let mut ctx = harness.ctx();
        program.start(&mut ctx, &params).unwrap();
        drop(ctx);
        assert_eq!(program.animations.len(), 1);
    }
}
