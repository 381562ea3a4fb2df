//! Letterbox - Batch Image Normalizer
//!
//! Converts every supported image in a folder into a 500x500 PNG: the image
//! is shrunk (never enlarged) to fit, then centered on an opaque black canvas.
//!
//! # Features
//!
//! - **Allowlisted input**: PNG, JPEG, BMP, GIF and TIFF, matched by extension
//! - **Failure isolation**: an unreadable file is recorded and the batch moves on
//! - **Progress events**: per-file status, percentage and running statistics
//! - **Cancellation**: cooperative, checked between files
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use letterbox::{run, ConversionConfig, ConversionRequest, NullSink};
//!
//! # async fn example() -> letterbox::Result<()> {
//! let request = ConversionRequest::new("photos", "photos/converted");
//! let report = run(&request, ConversionConfig::default(), &NullSink).await?;
//!
//! println!("{}", report.stats.summary_text());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod error;
pub mod processing;
pub mod scanner;

// Re-export commonly used types
pub use batch::{
    run, spawn_batch, BatchConverter, BatchEvent, BatchHandle, BatchReport, BatchState,
    BatchStats, CancelToken, ChannelSink, ConversionRequest, ConversionResult, NullSink,
    ProgressEvent, ProgressSink, RecordingSink,
};
pub use config::{CandidateOrder, CollisionPolicy, Config, ConversionConfig};
pub use error::{FailureKind, LetterboxError, Result};
pub use processing::ConversionEngine;
pub use scanner::{scan, scan_ordered, CandidateFile};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize Letterbox with default settings
///
/// Installs a log subscriber honoring `RUST_LOG` and checks the host.
/// Safe to call more than once.
pub fn init() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish(),
    )
    .is_ok()
    {
        info!("Letterbox v{} initialized", VERSION);
    }

    validate_system_requirements()?;

    Ok(())
}

/// Initialize with custom configuration
pub fn init_with_config(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.level).map_err(|e| {
        LetterboxError::config(format!("Invalid log level '{}': {}", config.logging.level, e))
    })?;

    let builder = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.logging.json_format {
        tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
    } else {
        tracing::subscriber::set_global_default(builder.finish()).is_ok()
    };

    if installed {
        info!("Letterbox v{} initialized with custom config", VERSION);
    }

    validate_system_requirements()?;

    Ok(())
}

fn validate_system_requirements() -> Result<()> {
    use sysinfo::{System, SystemExt};

    const MIN_MEMORY_MB: u64 = 256;

    let mut system = System::new();
    system.refresh_memory();

    // sysinfo 0.29 reports bytes
    let available_memory = system.available_memory();
    if available_memory < MIN_MEMORY_MB * 1024 * 1024 {
        warn!(
            "Low available memory: {}MB (recommended: >{}MB)",
            available_memory / (1024 * 1024),
            MIN_MEMORY_MB
        );
    }

    for format in processing::ImageFormat::all() {
        let codec: image::ImageFormat = format.into();
        if !codec.can_read() {
            return Err(LetterboxError::system(format!(
                "Image decoder for {:?} is not available",
                format
            )));
        }
    }

    Ok(())
}
