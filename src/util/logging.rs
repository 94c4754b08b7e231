use std::path::Path;

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Set up tracing output for the process. Console always; a daily-rolling
/// log file too when `log_dir` is given, so unattended installations keep a
/// trail. `verbose` raises our own crate to debug.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("laserbox=debug,warn")
    } else {
        EnvFilter::new("laserbox=info,warn")
    };

    let registry = tracing_subscriber::registry().with(filter);

    match log_dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "laserbox.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // The writer guard must outlive the process; init_logging runs
            // once, so leaking it is fine.
            std::mem::forget(guard);

            registry
                .with(fmt::layer().with_target(true))
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
        }
        None => registry.with(fmt::layer().with_target(true)).init(),
    }

    Ok(())
}
