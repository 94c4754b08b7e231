//! Keyboard-driven stand-ins for the installation's panel and laser
//! hardware, used when running on a development machine.

use std::io::BufRead;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::thread;

use tracing::{info, warn};

use crate::input::{BUTTON_COUNT, TOGGLE_COUNT};
use crate::output::LASER_COUNT;
use crate::traits::{RawInputSource, RawOutputSink};

/// Reads a momentary press holds for this many ticks.
const PULSE_READS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimCmd {
    Press(u8),
    Release(u8),
    Pulse(u8),
    Toggle(u8),
    Word(u16),
}

fn parse_command(line: &str) -> Option<SimCmd> {
    let mut parts = lowercase_parts(line);
    let verb = parts.next()?;
    let arg = parts.next();
    let num = |arg: Option<String>| arg.and_then(|a| a.parse::<u8>().ok());
    match verb.as_str() {
        "press" | "p" => Some(SimCmd::Press(num(arg)?)),
        "release" | "r" => Some(SimCmd::Release(num(arg)?)),
        "pulse" => Some(SimCmd::Pulse(num(arg)?)),
        "toggle" | "t" => Some(SimCmd::Toggle(num(arg)?)),
        "word" | "w" => {
            let arg = arg?;
            let word = if let Some(bits) = arg.strip_prefix("0b") {
                u16::from_str_radix(bits, 2).ok()?
            } else {
                arg.parse::<u16>().ok()?
            };
            Some(SimCmd::Word(word))
        }
        _ => None,
    }
}

fn lowercase_parts(line: &str) -> impl Iterator<Item = String> + '_ {
    line.split_whitespace().map(str::to_lowercase)
}

/// Panel simulator fed by stdin commands: `press N`, `release N`,
/// `pulse N`, `toggle N`, `word 0b...`. A background thread reads lines so
/// `read_word` never blocks the loop.
pub struct SimInput {
    commands: Receiver<SimCmd>,
    word: u16,
    pulses: Vec<(u8, u32)>,
}

impl SimInput {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        thread::Builder::new()
            .name("sim-input".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    match parse_command(&line) {
                        Some(cmd) => {
                            if tx.send(cmd).is_err() {
                                break;
                            }
                        }
                        None => {
                            if !line.trim().is_empty() {
                                warn!(line, "unrecognized sim command");
                            }
                        }
                    }
                }
            })
            .expect("spawn sim input thread");
        Self {
            commands: rx,
            word: 0,
            pulses: Vec::new(),
        }
    }

    fn apply(&mut self, cmd: SimCmd) {
        match cmd {
            SimCmd::Press(bit) => self.word |= 1 << (bit as usize % 16),
            SimCmd::Release(bit) => self.word &= !(1 << (bit as usize % 16)),
            SimCmd::Pulse(bit) => {
                self.word |= 1 << (bit as usize % 16);
                self.pulses.push((bit % 16, PULSE_READS));
            }
            SimCmd::Toggle(toggle) => {
                let bit = BUTTON_COUNT + toggle % TOGGLE_COUNT;
                self.word ^= 1 << bit;
            }
            SimCmd::Word(word) => {
                self.word = word;
                self.pulses.clear();
            }
        }
    }

    fn expire_pulses(&mut self) {
        let word = &mut self.word;
        self.pulses.retain_mut(|(bit, remaining)| {
            *remaining -= 1;
            if *remaining == 0 {
                *word &= !(1 << (*bit as usize));
                false
            } else {
                true
            }
        });
    }
}

impl Default for SimInput {
    fn default() -> Self {
        Self::new()
    }
}

impl RawInputSource for SimInput {
    fn read_word(&mut self) -> u16 {
        loop {
            match self.commands.try_recv() {
                Ok(cmd) => self.apply(cmd),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.expire_pulses();
        self.word
    }
}

/// Laser simulator: renders each pushed word as a bar in the log.
#[derive(Default)]
pub struct SimOutput;

impl SimOutput {
    pub fn new() -> Self {
        Self
    }
}

impl RawOutputSink for SimOutput {
    fn push_word(&mut self, word: u16) {
        let bar: String = (0..LASER_COUNT)
            .map(|i| if word & (1 << i) != 0 { '#' } else { '.' })
            .collect();
        info!(word = format!("{word:#018b}"), "lasers [{bar}]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command("press 3"), Some(SimCmd::Press(3)));
        assert_eq!(parse_command("  R 12 "), Some(SimCmd::Release(12)));
        assert_eq!(parse_command("toggle 1"), Some(SimCmd::Toggle(1)));
        assert_eq!(parse_command("word 0b101"), Some(SimCmd::Word(0b101)));
        assert_eq!(parse_command("word 7"), Some(SimCmd::Word(7)));
        assert_eq!(parse_command("bogus"), None);
        assert_eq!(parse_command("press x"), None);
        assert_eq!(parse_command(""), None);
    }

    fn applied(cmds: &[SimCmd]) -> SimInput {
        let (_tx, rx) = channel();
        let mut input = SimInput {
            commands: rx,
            word: 0,
            pulses: Vec::new(),
        };
        for &cmd in cmds {
            input.apply(cmd);
        }
        input
    }

    #[test]
    fn press_and_release_edit_bits() {
        let mut input = applied(&[SimCmd::Press(0), SimCmd::Press(2)]);
        assert_eq!(input.word, 0b101);
        input.apply(SimCmd::Release(0));
        assert_eq!(input.word, 0b100);
    }

    #[test]
    fn toggle_flips_the_high_bits() {
        let mut input = applied(&[SimCmd::Toggle(0)]);
        assert_eq!(input.word, 1 << 14);
        input.apply(SimCmd::Toggle(0));
        assert_eq!(input.word, 0);
        input.apply(SimCmd::Toggle(1));
        assert_eq!(input.word, 1 << 15);
    }

    #[test]
    fn pulse_expires_after_a_hold() {
        let mut input = applied(&[SimCmd::Pulse(5)]);
        for _ in 0..(PULSE_READS - 1) {
            input.expire_pulses();
            assert_eq!(input.word, 1 << 5);
        }
        input.expire_pulses();
        assert_eq!(input.word, 0);
        assert!(input.pulses.is_empty());
    }
}
