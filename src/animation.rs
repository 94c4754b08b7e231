use rand::Rng;
use rand::seq::SliceRandom;
use tracing::trace;

use crate::audio::AudioService;
use crate::output::{LASER_COUNT, LaserBay};

/// Output surfaces an animation frame may touch. Playback actions go
/// through this context, never through program state.
pub struct PlaybackCtx<'a> {
    pub lasers: &'a mut LaserBay,
    pub audio: &'a mut dyn AudioService,
}

/// One display step: a laser word, an optional sound cue, and a nominal
/// duration in seconds.
#[derive(Debug, Clone)]
pub struct Frame {
    pub word: u16,
    pub sound: Option<String>,
    pub duration: f64,
}

impl Frame {
    pub fn new(word: u16, duration: f64) -> Self {
        Self {
            word,
            sound: None,
            duration,
        }
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }
}

/// Ordered list of frames played back by an Animation.
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Uniformly timed sequence of bare laser words.
    pub fn from_words(words: impl IntoIterator<Item = u16>, frame_time: f64) -> Self {
        Self {
            frames: words
                .into_iter()
                .map(|word| Frame::new(word, frame_time))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> &Frame {
        &self.frames[index]
    }

    /// Total nominal duration in seconds.
    pub fn nominal_duration(&self) -> f64 {
        self.frames.iter().map(|f| f.duration).sum()
    }
}

type DoneFn = Box<dyn FnMut(&mut PlaybackCtx)>;

/// Frame-sequence playback with sub-tick-accurate timing.
///
/// Each tick the current frame's remaining time is decremented by dt; once
/// it falls below half a tick period the frame plays and the counter moves
/// on, carrying the (possibly negative) residual into the next frame's
/// nominal duration. Overshoot in one frame is therefore repaid by the
/// next, and cumulative timing error stays bounded by one tick period no
/// matter how long the sequence runs.
pub struct Animation {
    sequence: FrameSequence,
    transform: Option<fn(u16) -> u16>,
    done: Option<DoneFn>,
    loops_total: u32,
    loops_remaining: u32,
    frame_no: usize,
    time_left: f64,
    elapsed: f64,
    started: bool,
    finished: bool,
}

impl Animation {
    pub fn new(sequence: FrameSequence, loops: u32) -> Self {
        Self {
            sequence,
            transform: None,
            done: None,
            loops_total: loops,
            loops_remaining: loops,
            frame_no: 0,
            time_left: 0.0,
            elapsed: 0.0,
            started: false,
            finished: false,
        }
    }

    /// Per-frame word transform applied at playback time.
    pub fn with_transform(mut self, transform: fn(u16) -> u16) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Completion hook, run once when the final loop ends.
    pub fn with_done(mut self, done: impl FnMut(&mut PlaybackCtx) + 'static) -> Self {
        self.done = Some(Box::new(done));
        self
    }

    /// Reset counters and arm playback. Safe to call again to replay.
    pub fn start(&mut self) {
        self.frame_no = 0;
        self.elapsed = 0.0;
        self.loops_remaining = self.loops_total;
        self.finished = self.sequence.is_empty();
        self.started = !self.sequence.is_empty();
        if self.started {
            self.time_left = self.sequence.frame(0).duration;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn frame_no(&self) -> usize {
        self.frame_no
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Advance by dt. `half_tick` is the readiness epsilon, half the loop's
    /// tick period.
    pub fn update(&mut self, dt: f64, half_tick: f64, ctx: &mut PlaybackCtx) {
        if !self.started || self.finished {
            return;
        }
        debug_assert!(dt >= 0.0);
        self.elapsed += dt;
        self.time_left -= dt;

        while self.time_left < half_tick {
            self.play_frame(ctx);
            if self.frame_no + 1 >= self.sequence.len() {
                if self.loops_remaining > 0 {
                    self.loops_remaining -= 1;
                    self.frame_no = 0;
                } else {
                    self.finish(ctx);
                    return;
                }
            } else {
                self.frame_no += 1;
            }
            // Residual carry-over: whatever this frame ran long or short is
            // folded into the next frame's nominal duration.
            self.time_left += self.sequence.frame(self.frame_no).duration;
        }
    }

    fn play_frame(&mut self, ctx: &mut PlaybackCtx) {
        let frame = self.sequence.frame(self.frame_no);
        let word = match self.transform {
            Some(f) => f(frame.word),
            None => frame.word,
        };
        trace!(frame = self.frame_no, word, "animation frame");
        ctx.lasers.set_word(word);
        if let Some(sound) = &frame.sound {
            ctx.audio.play_effect(sound);
        }
    }

    fn finish(&mut self, ctx: &mut PlaybackCtx) {
        self.finished = true;
        self.started = false;
        if let Some(done) = self.done.as_mut() {
            done(ctx);
        }
    }
}

/// The set of animations a program currently has in flight. Finished ones
/// are removed on the sweep at the end of each update.
#[derive(Default)]
pub struct AnimationSet {
    running: Vec<Animation>,
}

impl AnimationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm and adopt an animation.
    pub fn spawn(&mut self, mut animation: Animation) {
        animation.start();
        self.running.push(animation);
    }

    pub fn update_all(&mut self, dt: f64, half_tick: f64, ctx: &mut PlaybackCtx) {
        for animation in &mut self.running {
            animation.update(dt, half_tick, ctx);
        }
        self.running.retain(|a| !a.is_finished());
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Drop everything mid-flight, without completion hooks. Used when the
    /// owning program is torn down.
    pub fn clear(&mut self) {
        self.running.clear();
    }
}

/// `k` random lasers per frame at the given frame rate, for `duration`
/// seconds; the panel is cleared when the dance ends.
pub fn random_k_dance(k: usize, fps: u32, duration: f64, rng: &mut impl Rng) -> Animation {
    let frame_time = 1.0 / fps as f64;
    let frame_count = ((duration * fps as f64) as usize).max(1);
    let ports: Vec<usize> = (0..LASER_COUNT).collect();
    let words = (0..frame_count).map(|_| {
        ports
            .choose_multiple(rng, k)
            .fold(0u16, |word, &i| word | (1 << i))
    });
    Animation::new(FrameSequence::from_words(words, frame_time), 0)
        .with_done(|ctx| ctx.lasers.set_word(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudio;

    const FPS: f64 = 60.0;
    const DT: f64 = 1.0 / FPS;
    const HALF_TICK: f64 = DT / 2.0;

    fn drive(animation: &mut Animation, ticks: usize, lasers: &mut LaserBay, audio: &mut MockAudio) {
        for _ in 0..ticks {
            let mut ctx = PlaybackCtx { lasers, audio };
            animation.update(DT, HALF_TICK, &mut ctx);
        }
    }

    #[test]
    fn plays_frames_in_order() {
        let mut anim = Animation::new(FrameSequence::from_words([0b01, 0b10], 3.0 * DT), 0);
        anim.start();
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();

        drive(&mut anim, 3, &mut lasers, &mut audio);
        assert_eq!(lasers.to_word(), 0b01);
        assert!(!anim.is_finished());

        drive(&mut anim, 3, &mut lasers, &mut audio);
        assert!(anim.is_finished());
        assert_eq!(lasers.to_word(), 0b10);
    }

    #[test]
    fn frame_no_never_exceeds_last_index() {
        let mut anim = Animation::new(FrameSequence::from_words([1, 2, 4], 2.0 * DT), 0);
        anim.start();
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();
        for _ in 0..50 {
            let mut ctx = PlaybackCtx {
                lasers: &mut lasers,
                audio: &mut audio,
            };
            anim.update(DT, HALF_TICK, &mut ctx);
            assert!(anim.frame_no() < 3);
        }
        assert!(anim.is_finished());
    }

    #[test]
    fn residual_bounds_total_drift() {
        // N frames of nominal duration d: one full non-looping playback
        // consumes N*d within one tick period, regardless of N.
        let n = 40;
        let d = 0.7 * DT; // deliberately not a multiple of the tick
        let mut anim = Animation::new(FrameSequence::from_words(vec![1u16; n], d), 0);
        anim.start();
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();

        let mut ticks = 0;
        while !anim.is_finished() {
            drive(&mut anim, 1, &mut lasers, &mut audio);
            ticks += 1;
            assert!(ticks < 10_000, "animation never finished");
        }
        let consumed = ticks as f64 * DT;
        let nominal = n as f64 * d;
        assert!(
            (consumed - nominal).abs() <= DT + 1e-9,
            "consumed {consumed}, nominal {nominal}"
        );
    }

    #[test]
    fn loops_restart_from_frame_zero() {
        let mut anim = Animation::new(FrameSequence::from_words([1, 2], DT), 2);
        anim.start();
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();
        let mut ticks = 0;
        while !anim.is_finished() {
            drive(&mut anim, 1, &mut lasers, &mut audio);
            ticks += 1;
            assert!(ticks < 100);
        }
        // Two frames, played three times through.
        assert_eq!(ticks, 6);
    }

    #[test]
    fn done_hook_runs_once_on_finish() {
        use std::cell::Cell;
        use std::rc::Rc;
        let done_count = Rc::new(Cell::new(0));
        let counter = done_count.clone();
        let mut anim = Animation::new(FrameSequence::from_words([1], DT), 0)
            .with_done(move |ctx| {
                counter.set(counter.get() + 1);
                ctx.lasers.set_word(0);
            });
        anim.start();
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();
        drive(&mut anim, 5, &mut lasers, &mut audio);
        assert_eq!(done_count.get(), 1);
        assert_eq!(lasers.to_word(), 0);
    }

    #[test]
    fn frame_sound_cues_fire() {
        let frames = vec![Frame::new(1, DT).with_sound("beep.wav"), Frame::new(2, DT)];
        let mut anim = Animation::new(FrameSequence::new(frames), 0);
        anim.start();
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();
        drive(&mut anim, 3, &mut lasers, &mut audio);
        assert!(audio.calls.contains(&"play_effect(beep.wav)".to_string()));
    }

    #[test]
    fn transform_applies_at_playback() {
        let mut anim = Animation::new(FrameSequence::from_words([0b1], DT), 0)
            .with_transform(|word| word << 3);
        anim.start();
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();
        drive(&mut anim, 2, &mut lasers, &mut audio);
        assert_eq!(lasers.to_word(), 0b1000);
    }

    #[test]
    fn set_sweeps_finished_animations() {
        let mut set = AnimationSet::new();
        set.spawn(Animation::new(FrameSequence::from_words([1], DT), 0));
        set.spawn(Animation::new(FrameSequence::from_words([2; 20], DT), 0));
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();
        for _ in 0..3 {
            let mut ctx = PlaybackCtx {
                lasers: &mut lasers,
                audio: &mut audio,
            };
            set.update_all(DT, HALF_TICK, &mut ctx);
        }
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn random_k_dance_lights_k_lasers_per_frame() {
        let mut rng = rand::thread_rng();
        let mut anim = random_k_dance(3, 8, 1.0, &mut rng);
        anim.start();
        let mut lasers = LaserBay::new();
        let mut audio = MockAudio::new();
        let mut ctx = PlaybackCtx {
            lasers: &mut lasers,
            audio: &mut audio,
        };
        // Drive past the first frame boundary.
        anim.update(1.0 / 8.0, HALF_TICK, &mut ctx);
        assert_eq!(lasers.to_word().count_ones(), 3);
    }
}
