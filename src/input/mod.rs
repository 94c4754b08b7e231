mod decoder;
mod word;

pub use decoder::{InputDecoder, STATE_HISTORY_SIZE};
pub use word::{
    BUTTON_COUNT, BUTTON_MASK, InputState, StateSequence, TOGGLE_COUNT, TOGGLE_MASK,
};
