mod sim;
mod worker;

pub use sim::SimAudio;
pub use worker::{AudioCmd, AudioNotice, AudioWorker};

use anyhow::Result;

/// Outcome of a fire-and-forget playback request. Status values instead of
/// errors: a missing sound is reported, never unwound through the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Started,
    UnknownSound,
}

/// Abstraction over audio backends. Every operation must return promptly;
/// fades and ducking run off the control loop, and completion comes back
/// through `drain_finished` as end-of-sound notifications.
/// Implementations: SimAudio (simulator), MockAudio (testing); the
/// installation's mixer backend lives outside this crate.
pub trait AudioService {
    /// Load and start background music. Negative `loops` means forever.
    fn load_music(&mut self, name: &str, loops: i32) -> Result<()>;

    fn set_music_volume(&mut self, volume: f32);

    fn music_fadeout(&mut self, ms: u64);

    /// Load a named effect at the given volume (0.0..=1.0).
    fn load_effect(&mut self, name: &str, volume: f32) -> Result<()>;

    fn play_effect(&mut self, name: &str) -> PlayStatus;

    /// Nominal length of a loaded effect in seconds.
    fn effect_duration(&self, name: &str) -> Option<f64>;

    /// Select the active sound bank (one sound per laser port).
    fn use_patch(&mut self, name: &str) -> Result<()>;

    /// Play patch sound `id`, optionally ducking the music under it.
    fn play_by_id(&mut self, id: usize, duck: bool) -> PlayStatus;

    fn fadeout_by_id(&mut self, id: usize, ms: u64);

    /// Names of sounds that finished since the last call, oldest first.
    /// The game loop forwards these to the event bus as SoundEnd events.
    fn drain_finished(&mut self) -> Vec<String>;
}

/// Recording backend for tests. Every call is appended to `calls`;
/// end-of-sound notifications are whatever the test queued up.
#[derive(Default)]
pub struct MockAudio {
    pub calls: Vec<String>,
    pub finished: Vec<String>,
    pub effect_duration: f64,
}

impl MockAudio {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            finished: Vec::new(),
            effect_duration: 1.0,
        }
    }
}

impl AudioService for MockAudio {
    fn load_music(&mut self, name: &str, loops: i32) -> Result<()> {
        self.calls.push(format!("load_music({name}, {loops})"));
        Ok(())
    }

    fn set_music_volume(&mut self, volume: f32) {
        self.calls.push(format!("set_music_volume({volume})"));
    }

    fn music_fadeout(&mut self, ms: u64) {
        self.calls.push(format!("music_fadeout({ms})"));
    }

    fn load_effect(&mut self, name: &str, volume: f32) -> Result<()> {
        self.calls.push(format!("load_effect({name}, {volume})"));
        Ok(())
    }

    fn play_effect(&mut self, name: &str) -> PlayStatus {
        self.calls.push(format!("play_effect({name})"));
        PlayStatus::Started
    }

    fn effect_duration(&self, _name: &str) -> Option<f64> {
        Some(self.effect_duration)
    }

    fn use_patch(&mut self, name: &str) -> Result<()> {
        self.calls.push(format!("use_patch({name})"));
        Ok(())
    }

    fn play_by_id(&mut self, id: usize, duck: bool) -> PlayStatus {
        self.calls.push(format!("play_by_id({id}, {duck})"));
        PlayStatus::Started
    }

    fn fadeout_by_id(&mut self, id: usize, ms: u64) {
        self.calls.push(format!("fadeout_by_id({id}, {ms})"));
    }

    fn drain_finished(&mut self) -> Vec<String> {
        std::mem::take(&mut self.finished)
    }
}
