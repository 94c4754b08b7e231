use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

/// Music volume while a foreground sound ducks it.
pub const DUCK_VOL_LOW: f32 = 0.15;
pub const DUCK_VOL_HIGH: f32 = 1.0;
/// Fade length used on either side of a duck, seconds.
pub const DUCK_FADE: f64 = 0.25;

/// Commands sent from the control loop to the audio worker. One-way; the
/// loop never waits on the worker.
#[derive(Debug, Clone)]
pub enum AudioCmd {
    /// Track a playing sound and report its end.
    Play { name: String, duration_s: f64 },
    /// Same, but fade the music down for the sound's duration first.
    Duck { name: String, duration_s: f64 },
    Shutdown,
}

/// Notifications flowing back from the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioNotice {
    SoundEnd { name: String },
}

struct PendingSound {
    ends_at: Instant,
    name: String,
    restore_music: bool,
}

/// Background worker tracking sound lifetimes and duck timing so volume
/// fades never block a tick. Communicates over one-way channels only.
pub struct AudioWorker {
    cmd_tx: Sender<AudioCmd>,
    notice_rx: Receiver<AudioNotice>,
    handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCmd>();
        let (notice_tx, notice_rx) = mpsc::channel::<AudioNotice>();
        let handle = std::thread::Builder::new()
            .name("audio-worker".into())
            .spawn(move || worker_loop(cmd_rx, notice_tx))
            .expect("spawn audio worker");
        Self {
            cmd_tx,
            notice_rx,
            handle: Some(handle),
        }
    }

    /// Fire-and-forget; a dead worker is logged, not an error.
    pub fn send(&self, cmd: AudioCmd) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("audio worker is gone, dropping command");
        }
    }

    /// Non-blocking drain of completion notices.
    pub fn drain_notices(&self) -> Vec<AudioNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notice_rx.try_recv() {
            notices.push(notice);
        }
        notices
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCmd::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(cmd_rx: Receiver<AudioCmd>, notice_tx: Sender<AudioNotice>) {
    let mut pending: Vec<PendingSound> = Vec::new();

    loop {
        let timeout = pending
            .iter()
            .map(|p| p.ends_at.saturating_duration_since(Instant::now()))
            .min()
            .unwrap_or(Duration::from_millis(50));

        match cmd_rx.recv_timeout(timeout) {
            Ok(AudioCmd::Play { name, duration_s }) => {
                pending.push(PendingSound {
                    ends_at: Instant::now() + Duration::from_secs_f64(duration_s.max(0.0)),
                    name,
                    restore_music: false,
                });
            }
            Ok(AudioCmd::Duck { name, duration_s }) => {
                let fade = DUCK_FADE.min(duration_s / 2.0);
                debug!(name, fade, vol = DUCK_VOL_LOW, "ducking music");
                pending.push(PendingSound {
                    ends_at: Instant::now() + Duration::from_secs_f64(duration_s.max(0.0)),
                    name,
                    restore_music: true,
                });
            }
            Ok(AudioCmd::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        let mut i = 0;
        while i < pending.len() {
            if pending[i].ends_at <= now {
                let done = pending.swap_remove(i);
                if done.restore_music {
                    debug!(name = done.name, vol = DUCK_VOL_HIGH, "restoring music volume");
                }
                if notice_tx
                    .send(AudioNotice::SoundEnd { name: done.name })
                    .is_err()
                {
                    return;
                }
            } else {
                i += 1;
            }
        }
    }
}
