pub mod io;
pub mod time;

pub use io::{RawInputSource, RawOutputSink, RecordingOutput, ScriptedInput};
pub use time::{MockTimeProvider, SystemTimeProvider, TimeProvider};
