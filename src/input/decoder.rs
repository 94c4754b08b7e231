use std::collections::VecDeque;

use tracing::trace;

use super::word::{InputState, StateSequence};
use crate::event::{Event, EventBus};
use crate::traits::RawInputSource;

/// Bounded count of recent state snapshots kept for sequence matching.
pub const STATE_HISTORY_SIZE: usize = 100;

/// Polls the raw input transport once per tick and turns word changes into
/// edge-triggered events on the bus.
pub struct InputDecoder {
    source: Box<dyn RawInputSource>,
    state: InputState,
    prev: InputState,
    changed: bool,
    history: VecDeque<InputState>,
}

impl InputDecoder {
    pub fn new(source: Box<dyn RawInputSource>) -> Self {
        Self {
            source,
            state: InputState::default(),
            prev: InputState::default(),
            changed: false,
            history: VecDeque::with_capacity(STATE_HISTORY_SIZE),
        }
    }

    /// The state read this tick (unchanged since last tick when
    /// `changed()` is false).
    pub fn state(&self) -> InputState {
        self.state
    }

    /// Whether the word changed on the most recent poll.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Read the transport and emit events for every flipped bit. An
    /// unchanged word emits nothing and leaves the history untouched.
    pub fn poll(&mut self, bus: &mut EventBus, now_us: i64) {
        self.state = InputState::new(self.source.read_word());
        if self.state == self.prev {
            self.changed = false;
            return;
        }

        self.changed = true;
        if self.history.len() == STATE_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(self.state);
        self.generate_events(bus, now_us);
        self.prev = self.state;
    }

    /// Categorize the change into per-bit events. Emission order within a
    /// tick is deterministic: the state change itself, then flipped-on
    /// buttons ascending, flipped-on toggles, flipped-off buttons,
    /// flipped-off toggles.
    fn generate_events(&self, bus: &mut EventBus, now_us: i64) {
        bus.push(Event::StateChange {
            state: self.state,
            time_us: now_us,
        });

        let diff = self.prev ^ self.state;
        let flipped_on = diff & self.state;
        let flipped_off = diff & self.prev;
        trace!(?flipped_on, ?flipped_off, "input change");

        for key in flipped_on.buttons_on() {
            bus.push(Event::ButtonDown {
                key,
                state: self.state,
                time_us: now_us,
            });
        }
        for key in flipped_on.toggles_on() {
            bus.push(Event::ToggleOn {
                key,
                state: self.state,
                time_us: now_us,
            });
        }
        for key in flipped_off.buttons_on() {
            bus.push(Event::ButtonUp {
                key,
                state: self.state,
                time_us: now_us,
            });
        }
        for key in flipped_off.toggles_on() {
            bus.push(Event::ToggleOff {
                key,
                state: self.state,
                time_us: now_us,
            });
        }
    }

    /// The last `n` observed states as raw words, oldest first.
    pub fn recent_words(&self, n: usize) -> Vec<u16> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).map(|s| s.word()).collect()
    }

    /// Match a target sequence against the tail of the state history.
    pub fn history_matches(&self, sequence: &StateSequence) -> bool {
        sequence.matches(&self.recent_words(sequence.window()))
    }
}
