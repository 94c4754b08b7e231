//! Control core for a button-and-laser arcade installation.
//!
//! A fixed-rate loop reads a 16-bit panel word (14 momentary buttons, 2
//! latching toggles), decodes it into edge events, and feeds the active
//! mini-game program. Programs drive 14 laser indicator ports and an audio
//! backend, and hand off to one another along a scripted sequence.

pub mod animation;
pub mod app;
pub mod audio;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod event;
pub mod input;
pub mod output;
pub mod program;
pub mod sched;
pub mod sim;
pub mod traits;
pub mod util;
