use std::collections::VecDeque;

/// Abstraction over the parallel-in input transport (button/toggle word).
/// Called once per tick and expected to return promptly.
/// Implementations: hardware shift-register transport (external),
/// SimInput (simulator), ScriptedInput (testing).
pub trait RawInputSource {
    fn read_word(&mut self) -> u16;
}

/// Abstraction over the serial-out output transport (laser word).
/// The output aggregator only calls this when the word actually changed.
pub trait RawOutputSink {
    fn push_word(&mut self, word: u16);
}

/// Input source that replays a fixed script of words, then holds the last
/// word forever. One word is consumed per read, i.e. per tick.
pub struct ScriptedInput {
    words: VecDeque<u16>,
    held: u16,
}

impl ScriptedInput {
    pub fn new(words: impl IntoIterator<Item = u16>) -> Self {
        Self {
            words: words.into_iter().collect(),
            held: 0,
        }
    }
}

impl RawInputSource for ScriptedInput {
    fn read_word(&mut self) -> u16 {
        if let Some(word) = self.words.pop_front() {
            self.held = word;
        }
        self.held
    }
}

/// Output sink that records every pushed word, for asserting on write
/// coalescing and fail-safe flushes.
#[derive(Default)]
pub struct RecordingOutput {
    pub words: Vec<u16>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<u16> {
        self.words.last().copied()
    }
}

impl RawOutputSink for RecordingOutput {
    fn push_word(&mut self, word: u16) {
        self.words.push(word);
    }
}
