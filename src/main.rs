//! WSI Dicomizer - convert whole-slide images into DICOM WSI pyramids.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_dicomizer::{convert, Config, ConvertError};

fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(config.debug);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Conversion(e)) => {
            error!("Conversion failed: {}", e);
            ExitCode::FAILURE
        }
        Err(RunError::Internal(message)) => {
            error!("Internal error: {}", message);
            ExitCode::from(2)
        }
    }
}

enum RunError {
    /// Expected failure modes: bad input, codec refusal, write errors.
    Conversion(ConvertError),
    /// A worker panicked.
    Internal(String),
}

fn run(config: &Config) -> Result<(), RunError> {
    let outcome = std::panic::catch_unwind(|| convert(config));
    match outcome {
        Ok(Ok(report)) => {
            for level in &report.levels {
                info!(
                    "level {}: {} frames in {} file(s)",
                    level.level,
                    level.frames,
                    level.files.len()
                );
            }
            Ok(())
        }
        Ok(Err(e)) => Err(RunError::Conversion(e)),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(RunError::Internal(message))
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(debug: bool) {
    let env_filter = if debug {
        "wsi_dicomizer=debug"
    } else {
        "wsi_dicomizer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
