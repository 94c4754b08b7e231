use std::collections::HashMap;

/// Convert a millisecond duration into whole ticks at the given rate.
pub fn ms_to_ticks(fps: u32, ms: u64) -> u64 {
    (fps as u64 * ms) / 1000
}

/// Per-key trigger suppression. While a key is cooling down, the consuming
/// program ignores repeated ButtonDown events for it. Swept once per tick.
#[derive(Debug, Default)]
pub struct CooldownTable {
    deadlines: HashMap<u8, u64>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a cooldown ending `ticks` from `now_tick`.
    pub fn start(&mut self, key: u8, now_tick: u64, ticks: u64) {
        self.deadlines.insert(key, now_tick + ticks);
    }

    pub fn active(&self, key: u8) -> bool {
        self.deadlines.contains_key(&key)
    }

    /// Remove entries whose deadline has passed.
    pub fn sweep(&mut self, now_tick: u64) {
        self.deadlines.retain(|_, deadline| now_tick <= *deadline);
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}

/// Release anti-jitter. A ButtonUp schedules a pending release a small
/// fixed delay ahead instead of committing immediately; a ButtonDown for
/// the same key inside the window cancels it (mechanical bounce, not a
/// genuine release). Deadlines that pass unchallenged commit.
#[derive(Debug, Default)]
pub struct PendingReleases {
    deadlines: HashMap<u8, u64>,
}

impl PendingReleases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, key: u8, deadline_tick: u64) {
        self.deadlines.insert(key, deadline_tick);
    }

    /// Cancel a pending release, returning whether one was pending.
    pub fn cancel(&mut self, key: u8) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    pub fn is_pending(&self, key: u8) -> bool {
        self.deadlines.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Commit releases whose deadline has passed, returning the keys in
    /// ascending order.
    pub fn sweep(&mut self, now_tick: u64) -> Vec<u8> {
        let mut committed: Vec<u8> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| now_tick > **deadline)
            .map(|(key, _)| *key)
            .collect();
        committed.sort_unstable();
        for key in &committed {
            self.deadlines.remove(key);
        }
        committed
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}
