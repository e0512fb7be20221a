//! # grblsend
//!
//! Streams G-code to GRBL motion controllers over a serial link.
//!
//! ## Architecture
//!
//! grblsend is organized as a workspace with multiple crates:
//!
//! 1. **grblsend-core** - Error taxonomy, command normalization, transfer results
//! 2. **grblsend-communication** - Serial transport, response classification,
//!    controller session and program streamer
//! 3. **grblsend-settings** - Configuration files and validation
//! 4. **grblsend** - Command-line binary that integrates all crates
//!
//! The protocol is strictly synchronous: one command is written, and the
//! next one only after the controller answered `ok` or `error`.

pub mod app;
pub mod cli;

pub use grblsend_communication::{
    classify, find_candidate_port, list_ports, load_program, AbortSignal, ConnectionParams,
    ControllerSession, FileStreamer, LineBuffer, Response, SerialPortInfo, SerialTransport,
    SessionConfig, SessionListener, SessionListenerHandle, StreamOptions, Transport,
};

pub use grblsend_core::{
    normalize, Command, ConnectionError, ConnectionState, ControllerError, Error, ProgramError,
    Result, ToolCommands, TransferResult, TransmissionError,
};

pub use grblsend_settings::{SenderConfig, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr, so stdout only carries command results
/// - RUST_LOG environment variable support
/// - INFO by default, DEBUG with `verbose`
pub fn init_logging(verbose: bool, format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_level(true)
                .with_line_number(verbose);
            registry.with(fmt_layer).try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(false);
            registry.with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}
