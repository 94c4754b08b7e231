use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{error, info};

use laserbox::app::Game;
use laserbox::audio::SimAudio;
use laserbox::config::AppConfig;
use laserbox::program::{
    ClueFinder, Composer, Flipper, Golf, MusicMaker, ProgramRegistry, TogglePattern,
};
use laserbox::sim::{SimInput, SimOutput};
use laserbox::util::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "laserbox", about = "Control core for the button/laser installation")]
struct Args {
    /// Path to the config JSON file.
    #[arg(long, default_value = "laserbox.json")]
    config: PathBuf,

    /// Run with simulated panel and lasers (stdin commands, logged output).
    #[arg(long)]
    sim: bool,

    /// Run a single program by name instead of the configured script.
    #[arg(long)]
    program: Option<String>,

    /// Directory to write rolling log files into.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Show debug logs.
    #[arg(short, long)]
    verbose: bool,
}

fn registry() -> ProgramRegistry {
    let mut registry = ProgramRegistry::new();
    registry.register(ClueFinder::boxed());
    registry.register(Flipper::boxed());
    registry.register(Golf::boxed());
    registry.register(MusicMaker::boxed());
    registry.register(TogglePattern::boxed());
    registry
}

fn run(args: Args) -> Result<()> {
    let config = AppConfig::load_from(&args.config)?;
    info!(config = %args.config.display(), fps = config.fps, "laserbox starting");

    if !args.sim {
        // The shift-register transport is board-specific and lives outside
        // this crate as RawInputSource/RawOutputSink implementations.
        bail!("no hardware transport linked in this build, run with --sim");
    }

    let composer = match &args.program {
        Some(name) => Composer::solo(name.clone()),
        None => Composer::new(config.script.clone()),
    };

    let mut game = Game::new(
        &config,
        Box::new(SimInput::new()),
        Box::new(SimOutput::new()),
        Box::new(SimAudio::new()),
        registry(),
        composer,
    );

    // Operator interrupt must still flush outputs to the safe state, so the
    // handler only clears the flag and lets the loop exit normally.
    let running = game.running_flag();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })?;

    game.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging(args.log_dir.as_deref(), args.verbose) {
        eprintln!("failed to initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
