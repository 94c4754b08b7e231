use std::collections::VecDeque;

use crate::input::InputState;

/// Capacity of the replay history ring buffer.
pub const HISTORY_CAPACITY: usize = 500;

/// Discriminant used for history lookups and dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChange,
    ButtonDown,
    ButtonUp,
    ToggleOn,
    ToggleOff,
    SoundEnd,
}

/// Edge-triggered panel events plus asynchronous audio notifications.
/// Input events carry the new state snapshot as context.
#[derive(Debug, Clone)]
pub enum Event {
    StateChange {
        state: InputState,
        time_us: i64,
    },
    ButtonDown {
        key: u8,
        state: InputState,
        time_us: i64,
    },
    ButtonUp {
        key: u8,
        state: InputState,
        time_us: i64,
    },
    ToggleOn {
        key: u8,
        state: InputState,
        time_us: i64,
    },
    ToggleOff {
        key: u8,
        state: InputState,
        time_us: i64,
    },
    SoundEnd {
        name: String,
        time_us: i64,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StateChange { .. } => EventKind::StateChange,
            Event::ButtonDown { .. } => EventKind::ButtonDown,
            Event::ButtonUp { .. } => EventKind::ButtonUp,
            Event::ToggleOn { .. } => EventKind::ToggleOn,
            Event::ToggleOff { .. } => EventKind::ToggleOff,
            Event::SoundEnd { .. } => EventKind::SoundEnd,
        }
    }

    /// Bit index for key-carrying events.
    pub fn key(&self) -> Option<u8> {
        match self {
            Event::ButtonDown { key, .. }
            | Event::ButtonUp { key, .. }
            | Event::ToggleOn { key, .. }
            | Event::ToggleOff { key, .. } => Some(*key),
            _ => None,
        }
    }

    pub fn time_us(&self) -> i64 {
        match self {
            Event::StateChange { time_us, .. }
            | Event::ButtonDown { time_us, .. }
            | Event::ButtonUp { time_us, .. }
            | Event::ToggleOn { time_us, .. }
            | Event::ToggleOff { time_us, .. }
            | Event::SoundEnd { time_us, .. } => *time_us,
        }
    }
}

/// FIFO delivery queue with a bounded replay history.
///
/// The queue is consumed destructively by `drain` once per tick by the
/// active program. Every pushed event is also appended to the history ring,
/// independent of consumption, for pattern lookups.
pub struct EventBus {
    queue: VecDeque<Event>,
    history: VecDeque<Event>,
    history_capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_capacity(HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            history: VecDeque::with_capacity(capacity),
            history_capacity: capacity,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(event.clone());
        self.queue.push_back(event);
    }

    /// Remove and return a snapshot of the queue. Events pushed while the
    /// snapshot is being handled are observed by the next drain.
    pub fn drain(&mut self) -> Vec<Event> {
        self.queue.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Up to the last `n` historical events of the given kinds,
    /// most-recent-last.
    pub fn history_matching(&self, kinds: &[EventKind], n: usize) -> Vec<&Event> {
        let mut found: Vec<&Event> = self
            .history
            .iter()
            .rev()
            .filter(|e| kinds.contains(&e.kind()))
            .take(n)
            .collect();
        found.reverse();
        found
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button_down(key: u8) -> Event {
        Event::ButtonDown {
            key,
            state: InputState::new(1 << key),
            time_us: 0,
        }
    }

    #[test]
    fn drain_is_fifo_and_empties_queue() {
        let mut bus = EventBus::new();
        bus.push(button_down(0));
        bus.push(button_down(1));
        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].key(), Some(0));
        assert_eq!(drained[1].key(), Some(1));
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn drain_is_a_snapshot() {
        let mut bus = EventBus::new();
        bus.push(button_down(0));
        let drained = bus.drain();
        // A handler reacting to the snapshot pushes a new event.
        bus.push(button_down(1));
        assert_eq!(drained.len(), 1);
        assert_eq!(bus.pending(), 1);
    }

    #[test]
    fn history_survives_consumption() {
        let mut bus = EventBus::new();
        bus.push(button_down(3));
        bus.drain();
        let found = bus.history_matching(&[EventKind::ButtonDown], 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), Some(3));
    }

    #[test]
    fn history_matching_filters_and_orders() {
        let mut bus = EventBus::new();
        for key in 0..4 {
            bus.push(button_down(key));
            bus.push(Event::ButtonUp {
                key,
                state: InputState::new(0),
                time_us: 0,
            });
        }
        let found = bus.history_matching(&[EventKind::ButtonDown], 3);
        let keys: Vec<_> = found.iter().map(|e| e.key().unwrap()).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut bus = EventBus::with_history_capacity(3);
        for key in 0..5 {
            bus.push(button_down(key));
        }
        assert_eq!(bus.history_len(), 3);
        let found = bus.history_matching(&[EventKind::ButtonDown], 10);
        let keys: Vec<_> = found.iter().map(|e| e.key().unwrap()).collect();
        assert_eq!(keys, vec![2, 3, 4]);
    }
}
