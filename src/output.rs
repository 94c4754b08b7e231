use tracing::debug;

use crate::traits::RawOutputSink;

/// Number of laser indicator ports driven by the output word.
pub const LASER_COUNT: usize = 14;

/// Aggregates individual laser on/off state into the output word.
///
/// Keeps a dirty-flag cache: `to_word` recomputes from per-port state only
/// when a port was mutated since the last read, otherwise returns the
/// cached word.
pub struct LaserBay {
    ports: [bool; LASER_COUNT],
    word: u16,
    clean: bool,
}

impl LaserBay {
    pub fn new() -> Self {
        Self {
            ports: [false; LASER_COUNT],
            word: 0,
            clean: true,
        }
    }

    pub fn turn_on(&mut self, index: usize) {
        self.set_value(index, true);
    }

    pub fn turn_off(&mut self, index: usize) {
        self.set_value(index, false);
    }

    /// Set a single port by index. Out-of-range indices are a programming
    /// error.
    pub fn set_value(&mut self, index: usize, on: bool) {
        debug_assert!(index < LASER_COUNT, "laser index {index} out of range");
        if index < LASER_COUNT {
            self.ports[index] = on;
            self.clean = false;
        }
    }

    /// Replace the entire word at once, keeping per-port state in sync so
    /// later single-port edits start from this word.
    pub fn set_word(&mut self, word: u16) {
        self.word = word;
        for (i, port) in self.ports.iter_mut().enumerate() {
            *port = word & (1 << i) != 0;
        }
        self.clean = true;
    }

    pub fn to_word(&mut self) -> u16 {
        if self.clean {
            return self.word;
        }
        self.word = self
            .ports
            .iter()
            .enumerate()
            .map(|(i, &on)| (on as u16) << i)
            .sum();
        self.clean = true;
        self.word
    }
}

impl Default for LaserBay {
    fn default() -> Self {
        Self::new()
    }
}

/// Pushes output words to the transport, skipping writes when the word has
/// not changed since the last push.
pub struct OutputManager {
    sink: Box<dyn RawOutputSink>,
    prev_word: Option<u16>,
}

impl OutputManager {
    /// Wrap a sink and drive it to the all-off state.
    pub fn new(mut sink: Box<dyn RawOutputSink>) -> Self {
        sink.push_word(0);
        Self {
            sink,
            prev_word: Some(0),
        }
    }

    pub fn push_word(&mut self, word: u16) {
        if self.prev_word == Some(word) {
            return;
        }
        self.sink.push_word(word);
        self.prev_word = Some(word);
    }

    /// Unconditionally drive every output off. Used on shutdown, normal or
    /// not.
    pub fn fail_safe(&mut self) {
        debug!("driving outputs to safe state");
        self.sink.push_word(0);
        self.prev_word = Some(0);
    }
}
