use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::worker::{AudioCmd, AudioNotice, AudioWorker};
use super::{AudioService, PlayStatus};
use crate::output::LASER_COUNT;

/// Nominal length assumed for effects the simulator has no metadata for.
const DEFAULT_EFFECT_DURATION: f64 = 1.5;

/// Simulated audio backend. Cues are logged instead of mixed; sound
/// lifetimes and duck timing are still real, tracked by the background
/// worker so SoundEnd events fire with realistic latency.
pub struct SimAudio {
    worker: AudioWorker,
    effects: HashMap<String, f64>,
    patch: Option<String>,
    music: Option<String>,
    music_volume: f32,
}

impl SimAudio {
    pub fn new() -> Self {
        Self {
            worker: AudioWorker::spawn(),
            effects: HashMap::new(),
            patch: None,
            music: None,
            music_volume: 1.0,
        }
    }

    fn patch_sound_name(&self, id: usize) -> Option<String> {
        let patch = self.patch.as_ref()?;
        if id >= LASER_COUNT {
            return None;
        }
        Some(format!("{patch}/{:02}.wav", id + 1))
    }
}

impl Default for SimAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioService for SimAudio {
    fn load_music(&mut self, name: &str, loops: i32) -> Result<()> {
        info!(name, loops, "music");
        self.music = Some(name.to_string());
        Ok(())
    }

    fn set_music_volume(&mut self, volume: f32) {
        self.music_volume = volume.clamp(0.0, 1.0);
        debug!(volume = self.music_volume, "music volume");
    }

    fn music_fadeout(&mut self, ms: u64) {
        if let Some(name) = self.music.take() {
            info!(name, ms, "music fadeout");
        }
    }

    fn load_effect(&mut self, name: &str, volume: f32) -> Result<()> {
        debug!(name, volume, "load effect");
        self.effects
            .insert(name.to_string(), DEFAULT_EFFECT_DURATION);
        Ok(())
    }

    fn play_effect(&mut self, name: &str) -> PlayStatus {
        // Unseen effects load on demand with a nominal duration.
        let duration = *self
            .effects
            .entry(name.to_string())
            .or_insert(DEFAULT_EFFECT_DURATION);
        info!(name, "effect");
        self.worker.send(AudioCmd::Play {
            name: name.to_string(),
            duration_s: duration,
        });
        PlayStatus::Started
    }

    fn effect_duration(&self, name: &str) -> Option<f64> {
        self.effects.get(name).copied()
    }

    fn use_patch(&mut self, name: &str) -> Result<()> {
        info!(name, "patch selected");
        self.patch = Some(name.to_string());
        Ok(())
    }

    fn play_by_id(&mut self, id: usize, duck: bool) -> PlayStatus {
        let Some(name) = self.patch_sound_name(id) else {
            warn!(id, "no patch sound for id");
            return PlayStatus::UnknownSound;
        };
        debug!(name, duck, "patch sound");
        let cmd = if duck {
            AudioCmd::Duck {
                name,
                duration_s: DEFAULT_EFFECT_DURATION,
            }
        } else {
            AudioCmd::Play {
                name,
                duration_s: DEFAULT_EFFECT_DURATION,
            }
        };
        self.worker.send(cmd);
        PlayStatus::Started
    }

    fn fadeout_by_id(&mut self, id: usize, ms: u64) {
        if let Some(name) = self.patch_sound_name(id) {
            debug!(name, ms, "patch sound fadeout");
        }
    }

    fn drain_finished(&mut self) -> Vec<String> {
        self.worker
            .drain_notices()
            .into_iter()
            .map(|AudioNotice::SoundEnd { name }| name)
            .collect()
    }
}
