use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor};

/// Number of momentary buttons on the panel (low bits of the word).
pub const BUTTON_COUNT: u8 = 14;
/// Number of latching toggles (high bits of the word).
pub const TOGGLE_COUNT: u8 = 2;

pub const BUTTON_MASK: u16 = (1 << BUTTON_COUNT) - 1;
pub const TOGGLE_MASK: u16 = 0b11 << BUTTON_COUNT;

/// Immutable snapshot of the 16-bit panel word. Buttons occupy bits 0..14,
/// toggles bits 14..16; the two ranges partition the word with no overlap.
/// Equality is by underlying word.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InputState {
    word: u16,
}

impl InputState {
    pub fn new(word: u16) -> Self {
        Self { word }
    }

    /// Build a state from button bit indices and the two toggle flags.
    pub fn from_bits(buttons: &[u8], toggles: (bool, bool)) -> Self {
        let mut word = 0u16;
        for &bit in buttons {
            debug_assert!(bit < BUTTON_COUNT);
            word |= 1 << bit;
        }
        word |= (toggles.0 as u16) << BUTTON_COUNT;
        word |= (toggles.1 as u16) << (BUTTON_COUNT + 1);
        Self { word }
    }

    pub fn word(&self) -> u16 {
        self.word
    }

    /// Button bits only, in the low 14 bits.
    pub fn buttons(&self) -> u16 {
        self.word & BUTTON_MASK
    }

    /// Toggle bits shifted down to bits 0..2.
    pub fn toggles(&self) -> u8 {
        ((self.word & TOGGLE_MASK) >> BUTTON_COUNT) as u8
    }

    pub fn bit(&self, index: u8) -> bool {
        debug_assert!(index < 16);
        self.word & (1 << index) != 0
    }

    /// Indices of buttons currently held, ascending.
    pub fn buttons_on(&self) -> impl Iterator<Item = u8> + '_ {
        (0..BUTTON_COUNT).filter(|&i| self.bit(i))
    }

    /// Indices of toggles currently on (14 or 15), ascending.
    pub fn toggles_on(&self) -> impl Iterator<Item = u8> + '_ {
        (BUTTON_COUNT..BUTTON_COUNT + TOGGLE_COUNT).filter(|&i| self.bit(i))
    }
}

impl From<u16> for InputState {
    fn from(word: u16) -> Self {
        Self::new(word)
    }
}

impl BitOr for InputState {
    type Output = InputState;
    fn bitor(self, rhs: Self) -> Self {
        Self::new(self.word | rhs.word)
    }
}

impl BitAnd for InputState {
    type Output = InputState;
    fn bitand(self, rhs: Self) -> Self {
        Self::new(self.word & rhs.word)
    }
}

impl BitXor for InputState {
    type Output = InputState;
    fn bitxor(self, rhs: Self) -> Self {
        Self::new(self.word ^ rhs.word)
    }
}

impl fmt::Debug for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputState")
            .field("buttons", &self.buttons_on().collect::<Vec<_>>())
            .field("toggles", &self.toggles_on().collect::<Vec<_>>())
            .finish()
    }
}

/// Ordered list of target words matched against recent input history.
///
/// `window` caps how many recent states are scanned. When `window` exceeds
/// the number of targets there is leniency: the targets must occur in order
/// within the window, but not necessarily adjacent to one another.
#[derive(Debug, Clone)]
pub struct StateSequence {
    targets: Vec<u16>,
    window: usize,
}

impl StateSequence {
    pub fn new(targets: Vec<InputState>, window: usize) -> Self {
        let targets: Vec<u16> = targets.into_iter().map(|s| s.word()).collect();
        let window = window.max(targets.len());
        Self { targets, window }
    }

    /// The operator sequence for leaving the current program: button 6 held
    /// with both toggles on, toggles off, toggles on again.
    pub fn mode_switch() -> Self {
        Self::new(
            vec![
                InputState::from_bits(&[6], (true, true)),
                InputState::from_bits(&[6], (false, false)),
                InputState::from_bits(&[6], (true, true)),
            ],
            6,
        )
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Scan `recent` (oldest first) for the targets in order.
    pub fn matches(&self, recent: &[u16]) -> bool {
        if self.targets.is_empty() {
            return false;
        }
        let mut target_index = 0;
        for &word in recent.iter().take(self.window) {
            if word == self.targets[target_index] {
                target_index += 1;
            }
            if target_index == self.targets.len() {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_partition_the_word() {
        assert_eq!(BUTTON_MASK & TOGGLE_MASK, 0);
        assert_eq!(BUTTON_MASK | TOGGLE_MASK, u16::MAX);
    }

    #[test]
    fn from_bits_sets_buttons_and_toggles() {
        let state = InputState::from_bits(&[0, 3, 13], (true, false));
        assert!(state.bit(0));
        assert!(state.bit(3));
        assert!(state.bit(13));
        assert!(state.bit(14));
        assert!(!state.bit(15));
        assert_eq!(state.toggles(), 0b01);
        assert_eq!(state.buttons_on().collect::<Vec<_>>(), vec![0, 3, 13]);
    }

    #[test]
    fn equality_is_by_word() {
        assert_eq!(InputState::new(5), InputState::from_bits(&[0, 2], (false, false)));
        assert_ne!(InputState::new(5), InputState::new(4));
    }

    #[test]
    fn bitwise_ops() {
        let a = InputState::new(0b0110);
        let b = InputState::new(0b0011);
        assert_eq!((a | b).word(), 0b0111);
        assert_eq!((a & b).word(), 0b0010);
        assert_eq!((a ^ b).word(), 0b0101);
    }

    #[test]
    fn sequence_matches_adjacent() {
        let seq = StateSequence::new(
            vec![InputState::new(1), InputState::new(2), InputState::new(3)],
            3,
        );
        assert!(seq.matches(&[1, 2, 3]));
        assert!(!seq.matches(&[1, 3, 2]));
    }

    #[test]
    fn sequence_leniency_within_window() {
        // [A, x, B, y, C] matches [A, B, C] only when the window covers it.
        let seq = StateSequence::new(
            vec![InputState::new(10), InputState::new(20), InputState::new(30)],
            5,
        );
        assert!(seq.matches(&[10, 7, 20, 8, 30]));

        let strict = StateSequence::new(
            vec![InputState::new(10), InputState::new(20), InputState::new(30)],
            3,
        );
        assert!(!strict.matches(&[10, 7, 20, 8, 30]));
    }

    #[test]
    fn sequence_window_never_below_target_len() {
        let seq = StateSequence::new(vec![InputState::new(1), InputState::new(2)], 0);
        assert_eq!(seq.window(), 2);
        assert!(seq.matches(&[1, 2]));
    }

    #[test]
    fn mode_switch_sequence_matches() {
        let seq = StateSequence::mode_switch();
        let on = InputState::from_bits(&[6], (true, true)).word();
        let off = InputState::from_bits(&[6], (false, false)).word();
        assert!(seq.matches(&[on, off, on]));
        assert!(!seq.matches(&[on, on, off]));
    }
}
