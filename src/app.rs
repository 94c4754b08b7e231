use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::{debug, info};

use crate::audio::AudioService;
use crate::clock::GameClock;
use crate::config::AppConfig;
use crate::event::{Event, EventBus};
use crate::input::InputDecoder;
use crate::output::{LaserBay, OutputManager};
use crate::program::{Composer, MachineStatus, ProgramCtx, ProgramRegistry, StateMachine};
use crate::traits::{RawInputSource, RawOutputSink, SystemTimeProvider, TimeProvider};

/// Owns the whole control core and runs the fixed-rate loop: poll input,
/// update the active program, flush the output word. All state is held
/// here; nothing is global.
pub struct Game<T: TimeProvider = SystemTimeProvider> {
    clock: GameClock<T>,
    decoder: InputDecoder,
    bus: EventBus,
    lasers: LaserBay,
    outputs: OutputManager,
    audio: Box<dyn AudioService>,
    machine: StateMachine,
    fps: u32,
    running: Arc<AtomicBool>,
}

impl Game<SystemTimeProvider> {
    pub fn new(
        config: &AppConfig,
        input: Box<dyn RawInputSource>,
        output: Box<dyn RawOutputSink>,
        audio: Box<dyn AudioService>,
        registry: ProgramRegistry,
        composer: Composer,
    ) -> Self {
        Self::with_time(
            config,
            input,
            output,
            audio,
            registry,
            composer,
            SystemTimeProvider::new(),
        )
    }
}

impl<T: TimeProvider> Game<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn with_time(
        config: &AppConfig,
        input: Box<dyn RawInputSource>,
        output: Box<dyn RawOutputSink>,
        audio: Box<dyn AudioService>,
        registry: ProgramRegistry,
        composer: Composer,
        time: T,
    ) -> Self {
        Self {
            clock: GameClock::with_time(config.fps, time),
            decoder: InputDecoder::new(input),
            bus: EventBus::new(),
            lasers: LaserBay::new(),
            outputs: OutputManager::new(output),
            audio,
            machine: StateMachine::new(registry, composer),
            fps: config.fps,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared flag a signal handler clears to stop the loop. The loop then
    /// exits normally, so outputs are flushed to the safe state.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Activate the first scripted program and run ticks until the script
    /// completes.
    pub fn run(&mut self) -> Result<()> {
        let status = self.start()?;
        if status == MachineStatus::Complete {
            info!("empty script, nothing to run");
            return Ok(());
        }
        info!(fps = self.fps, "loop started");
        while self.running.load(Ordering::SeqCst) {
            if self.step()? == MachineStatus::Complete {
                break;
            }
        }
        if !self.running.load(Ordering::SeqCst) {
            info!("interrupted, shutting down");
        }
        info!("loop finished");
        self.outputs.fail_safe();
        Ok(())
    }

    pub fn start(&mut self) -> Result<MachineStatus> {
        let Self {
            clock,
            decoder,
            bus,
            lasers,
            audio,
            machine,
            fps,
            ..
        } = self;
        let mut ctx = ProgramCtx {
            tick: clock.frame(),
            now_us: clock.now_us(),
            fps: *fps,
            input: decoder,
            events: bus,
            lasers,
            audio: audio.as_mut(),
        };
        machine.start(&mut ctx)
    }

    /// One full tick: pace the clock, ingest audio notices and panel input,
    /// update the active program, flush the laser word.
    pub fn step(&mut self) -> Result<MachineStatus> {
        let dt = self.clock.tick();
        let now_us = self.clock.now_us();
        let tick = self.clock.frame();

        let Self {
            decoder,
            bus,
            lasers,
            outputs,
            audio,
            machine,
            fps,
            ..
        } = self;

        for name in audio.drain_finished() {
            debug!(name, "sound finished");
            bus.push(Event::SoundEnd {
                name,
                time_us: now_us,
            });
        }
        decoder.poll(bus, now_us);

        let mut ctx = ProgramCtx {
            tick,
            now_us,
            fps: *fps,
            input: decoder,
            events: bus,
            lasers,
            audio: audio.as_mut(),
        };
        let status = machine.update(&mut ctx, dt)?;

        let word = lasers.to_word();
        outputs.push_word(word);
        Ok(status)
    }

    pub fn active_program(&self) -> Option<&str> {
        self.machine.active()
    }
}

impl<T: TimeProvider> Drop for Game<T> {
    /// Outputs go dark on any exit path, panic unwind included.
    fn drop(&mut self) {
        self.outputs.fail_safe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudio;
    use crate::program::{ClueFinder, ProgramStep};
    use crate::traits::{MockTimeProvider, RecordingOutput, ScriptedInput};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct SharedSink(Rc<RefCell<Vec<u16>>>);

    impl RawOutputSink for SharedSink {
        fn push_word(&mut self, word: u16) {
            self.0.borrow_mut().push(word);
        }
    }

    fn test_game(
        words: Vec<u16>,
        script: Vec<ProgramStep>,
        sink: Box<dyn RawOutputSink>,
    ) -> Game<MockTimeProvider> {
        let mut registry = ProgramRegistry::new();
        registry.register(ClueFinder::boxed());
        Game::with_time(
            &AppConfig::default(),
            Box::new(ScriptedInput::new(words)),
            sink,
            Box::new(MockAudio::new()),
            registry,
            Composer::new(script),
            MockTimeProvider::new(),
        )
    }

    #[test]
    fn empty_script_completes_without_ticking() {
        let mut game = test_game(vec![], Vec::new(), Box::new(RecordingOutput::new()));
        game.run().unwrap();
    }

    #[test]
    fn echoed_buttons_reach_the_output_sink() {
        let words = Rc::new(RefCell::new(Vec::new()));
        let script = vec![ProgramStep::new("ClueFinder")];
        let mut game = test_game(vec![0b110], script, Box::new(SharedSink(words.clone())));
        assert_eq!(game.start().unwrap(), MachineStatus::Running);
        for _ in 0..3 {
            game.step().unwrap();
        }
        // ClueFinder echoes pressed buttons onto the lasers.
        assert!(words.borrow().contains(&0b110));
    }

    #[test]
    fn cleared_running_flag_stops_the_loop_and_flushes_outputs() {
        use std::sync::atomic::Ordering;
        // ClueFinder never finishes without its secret, so only the flag
        // can end this run.
        let words = Rc::new(RefCell::new(Vec::new()));
        let script = vec![ProgramStep::new("ClueFinder")];
        let mut game = test_game(vec![0b10], script, Box::new(SharedSink(words.clone())));
        game.running_flag().store(false, Ordering::SeqCst);
        game.run().unwrap();
        assert_eq!(words.borrow().last(), Some(&0));
    }

    #[test]
    fn drop_drives_outputs_dark() {
        let words = Rc::new(RefCell::new(Vec::new()));
        {
            let script = vec![ProgramStep::new("ClueFinder")];
            let mut game = test_game(vec![0b1], script, Box::new(SharedSink(words.clone())));
            game.start().unwrap();
            for _ in 0..2 {
                game.step().unwrap();
            }
        }
        assert_eq!(words.borrow().last(), Some(&0));
    }

    #[test]
    fn sound_end_notices_become_events() {
        let mut registry = ProgramRegistry::new();
        registry.register(ClueFinder::boxed());
        let mut audio = MockAudio::new();
        audio.finished.push("splash.wav".to_string());
        let mut game = Game::with_time(
            &AppConfig::default(),
            Box::new(ScriptedInput::new(Vec::<u16>::new())),
            Box::new(RecordingOutput::new()),
            Box::new(audio),
            registry,
            Composer::solo("ClueFinder"),
            MockTimeProvider::new(),
        );
        game.start().unwrap();
        game.step().unwrap();
        // The program drained the event; it remains visible in history.
        use crate::event::EventKind;
        let found = game.bus.history_matching(&[EventKind::SoundEnd], 5);
        assert_eq!(found.len(), 1);
    }
}
