//! Command-line workflow: resolve the configuration, connect, run one action

use crate::cli::{Action, Cli, ControllerAction};
use anyhow::{anyhow, Context};
use grblsend_communication::{
    find_candidate_port, list_ports, load_program, AbortSignal, ControllerSession, FileStreamer,
    SerialTransport, SessionListener, SessionListenerHandle,
};
use grblsend_core::{Error, ProgramError};
use grblsend_settings::SenderConfig;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;

/// Invocation error reported with exit code 2
#[derive(Debug)]
pub struct UsageError(pub String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

fn usage(message: impl Into<String>) -> anyhow::Error {
    anyhow!(UsageError(message.into()))
}

/// Process exit code for a failed run
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<UsageError>().is_some() {
        return EXIT_USAGE;
    }
    match err.downcast_ref::<Error>() {
        Some(Error::Program(ProgramError::FileNotFound { .. })) => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

/// Load the config file and apply command-line overrides
pub fn resolve_config(cli: &Cli) -> anyhow::Result<SenderConfig> {
    let mut config = match &cli.config {
        Some(path) => SenderConfig::load_from_file(path)
            .map_err(|e| usage(format!("Invalid config {}: {}", path.display(), e)))?,
        None => SenderConfig::load_default().context("Failed to load default config")?,
    };

    if let Some(port) = &cli.port {
        config.connection.port = port.clone();
    }
    if let Some(baud_rate) = cli.baudrate {
        config.connection.baud_rate = baud_rate;
    }
    if let Some(feed_rate) = cli.feed_rate {
        config.stream.feed_rate = Some(feed_rate);
    }
    if let Some(timeout) = cli.timeout {
        let timeout = Duration::try_from_secs_f64(timeout)
            .map_err(|_| usage(format!("Invalid timeout: {}", timeout)))?;
        config.connection.read_timeout_ms =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }

    config.validate().map_err(|e| usage(e.to_string()))?;
    Ok(config)
}

/// The port to open: the configured one, or the first discovered candidate
pub fn resolve_port(config: &SenderConfig) -> anyhow::Result<String> {
    let connection = &config.connection;
    if !connection.wants_discovery() {
        return Ok(connection.port.trim().to_string());
    }

    let port = find_candidate_port(&connection.port_description_prefix).ok_or_else(|| {
        anyhow!(
            "No serial port with a description starting with '{}' found; pass --port",
            connection.port_description_prefix
        )
    })?;
    tracing::info!("Auto-detected port {}", port);
    Ok(port)
}

/// Echoes controller messages and streaming progress
struct ConsoleListener {
    total_lines: usize,
}

impl SessionListener for ConsoleListener {
    fn on_message(&self, line: &str) {
        tracing::info!("GRBL: {}", line);
    }

    fn on_progress(&self, lines_sent: usize) {
        if self.total_lines > 0 {
            tracing::info!(
                "Progress: {}/{} lines ({:.0}%)",
                lines_sent,
                self.total_lines,
                lines_sent as f64 * 100.0 / self.total_lines as f64
            );
        }
    }
}

fn print_ports() -> anyhow::Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    println!("Available serial ports:");
    for port in ports {
        println!("  {} - {}", port.port_name, port.description);
    }
    Ok(())
}

/// Run the action selected by `cli`. Blocking.
///
/// Raising `abort` stops any wait in progress; the machine is then sent a
/// feed hold before the port is released.
pub fn run(cli: &Cli, abort: AbortSignal) -> anyhow::Result<()> {
    let action = cli
        .action()
        .ok_or_else(|| usage("No G-code file given (see --help)"))?;

    let action = match action {
        Action::ListPorts => return print_ports(),
        Action::Controller(action) => action,
    };

    let program = match &action {
        ControllerAction::Stream(path) => Some(read_program(path)?),
        _ => None,
    };

    let config = resolve_config(cli)?;

    let port = resolve_port(&config)?;
    let listener: SessionListenerHandle = Arc::new(ConsoleListener {
        total_lines: program.as_ref().map_or(0, Vec::len),
    });

    let mut session = ControllerSession::new(
        Box::new(SerialTransport::new()),
        config.session_config(&port),
    )
    .with_abort_signal(abort)
    .with_listener(listener.clone());

    session
        .connect()
        .with_context(|| format!("Failed to connect to GRBL on {}", port))?;

    let outcome = execute(&mut session, &config, &action, program, listener);
    let interrupted = outcome
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<Error>())
        .is_some_and(Error::is_interrupted);
    // the streamer already stopped the machine
    if interrupted && !matches!(action, ControllerAction::Stream(_)) {
        tracing::warn!("Interrupted by user, stopping the machine");
        if let Err(stop) = session.emergency_stop() {
            tracing::error!("Emergency stop failed: {}", stop);
        }
    }
    session.disconnect();
    outcome
}

fn read_program(path: &Path) -> anyhow::Result<Vec<String>> {
    match load_program(path) {
        Ok(lines) => Ok(lines),
        Err(Error::Program(ProgramError::FileNotFound { path })) => {
            Err(usage(format!("File not found: {}", path)))
        }
        Err(e) => Err(e.into()),
    }
}

fn execute(
    session: &mut ControllerSession,
    config: &SenderConfig,
    action: &ControllerAction,
    program: Option<Vec<String>>,
    listener: SessionListenerHandle,
) -> anyhow::Result<()> {
    match action {
        ControllerAction::Status => {
            let status = session.get_status()?;
            println!("GRBL status: {}", status);
            Ok(())
        }
        ControllerAction::Settings => {
            for (key, value) in session.get_configuration()? {
                println!("${}={}", key, value);
            }
            Ok(())
        }
        ControllerAction::EmergencyStop => Ok(session.emergency_stop()?),
        ControllerAction::SoftReset => Ok(session.soft_reset()?),
        ControllerAction::HardReset => Ok(session.hard_reset()?),
        ControllerAction::Stream(path) => {
            let lines = program.unwrap_or_default();
            tracing::info!("Streaming {} ({} lines)", path.display(), lines.len());

            let streamer = FileStreamer::new(config.stream_options()).with_listener(listener);
            let result = streamer.stream(session, lines);
            let Some(error) = result.error else {
                tracing::info!("File sent successfully, {} lines", result.lines_sent);
                return Ok(());
            };
            let line = result
                .failure_line
                .map(|n| format!(" at line {}", n))
                .unwrap_or_default();
            let command = result.failure_command.unwrap_or_default();
            Err(anyhow::Error::new(error).context(format!(
                "Transfer failed after {} lines{} '{}'",
                result.lines_sent, line, command
            )))
        }
    }
}
