//! GRBL Controller Session
//!
//! Drives the synchronous command/acknowledgment protocol: at most one
//! command is outstanding at a time, and the next command is written only
//! after the controller answered `ok` or `error` for the previous one.
//! Realtime bytes (`?`, `!`) bypass that slot.

use super::error_decoder::{alarm_code, decode_alarm, describe_error_payload};
use super::listener::{noop_listener, SessionListenerHandle};
use super::response_parser::{classify, Response};
use crate::communication::{ConnectionParams, LineBuffer, Transport};
use grblsend_core::{
    Command, ConnectionError, ConnectionState, ControllerError, Error, Result, TransmissionError,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Build-info query used as the connection handshake
pub const HANDSHAKE_COMMAND: &str = "$I";
/// Signature expected in the build-info reply of GRBL 1.1 controllers
pub const DEFAULT_FIRMWARE_SIGNATURE: &str = "[VER:1.1";
/// Dump all `$n=value` settings
pub const SETTINGS_COMMAND: &str = "$$";
/// Clear the alarm lock
pub const SOFT_RESET_COMMAND: &str = "$X";
/// Restore factory settings
pub const HARD_RESET_COMMAND: &str = "$RST=*";

const STATUS_QUERY: u8 = b'?';
const FEED_HOLD: u8 = b'!';
const READ_CHUNK: usize = 256;

/// Timing and handshake configuration of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How to open the link
    pub connection: ConnectionParams,
    /// Wait for the `$I` reply
    pub handshake_timeout: Duration,
    /// Default wait for an `ok`/`error` acknowledgment
    pub ack_timeout: Duration,
    /// Wait for the reply to `?`
    pub status_timeout: Duration,
    /// Sleep between read attempts when no line is available
    pub poll_interval: Duration,
    /// Substring the `$I` reply must contain
    pub firmware_signature: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionParams::default(),
            handshake_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            firmware_signature: DEFAULT_FIRMWARE_SIGNATURE.to_string(),
        }
    }
}

/// Cloneable flag that aborts any blocking wait of a session
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    raised: Arc<AtomicBool>,
}

impl AbortSignal {
    /// Create a lowered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every wait sharing this signal to stop
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Whether the signal was raised
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Lower the signal again
    pub fn reset(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }
}

/// A single controller session bound to one transport
///
/// The session owns its transport exclusively; `&mut self` on every
/// operation keeps a single caller in charge of the command slot.
pub struct ControllerSession {
    transport: Box<dyn Transport>,
    config: SessionConfig,
    state: ConnectionState,
    receive: LineBuffer,
    /// Acknowledgments read by a status query while a command was pending
    deferred: VecDeque<String>,
    /// Command written but not yet acknowledged
    in_flight: Option<String>,
    abort: AbortSignal,
    listener: SessionListenerHandle,
}

impl ControllerSession {
    /// Create a disconnected session
    pub fn new(transport: Box<dyn Transport>, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: ConnectionState::Disconnected,
            receive: LineBuffer::new(),
            deferred: VecDeque::new(),
            in_flight: None,
            abort: AbortSignal::new(),
            listener: noop_listener(),
        }
    }

    /// Share an abort signal with the caller
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Register a listener for informational controller output
    pub fn with_listener(mut self, listener: SessionListenerHandle) -> Self {
        self.listener = listener;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Command awaiting acknowledgment, if any
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Open the link and verify the controller answers `$I` with the
    /// configured firmware signature.
    ///
    /// On any failure the link is closed again and the session stays
    /// disconnected.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            tracing::debug!("Already connected to {}", self.config.connection.port);
            return Ok(());
        }

        let port = self.config.connection.port.clone();
        tracing::info!(
            "Connecting to {} at {} baud",
            port,
            self.config.connection.baud_rate
        );

        let result = match self.transport.open(&self.config.connection) {
            Ok(()) => self.handshake(),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                tracing::info!("Connected to GRBL on {}", port);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to connect to GRBL on {}: {}", port, e);
                self.release_link();
                Err(match e {
                    Error::Connection(_) | Error::Controller(ControllerError::Interrupted) => e,
                    other => ConnectionError::ConnectionLost {
                        reason: other.to_string(),
                    }
                    .into(),
                })
            }
        }
    }

    fn handshake(&mut self) -> Result<()> {
        self.receive.clear();
        self.deferred.clear();
        self.in_flight = None;

        self.ensure_not_aborted()?;
        self.transmit_command(HANDSHAKE_COMMAND)?;

        let timeout = self.config.handshake_timeout;
        let signature = self.config.firmware_signature.clone();
        let mut received: Vec<String> = Vec::new();
        let outcome = self.await_ack(timeout, |response| received.push(response.to_string()));
        let signed = received.iter().any(|line| line.contains(&signature));

        match outcome {
            Ok(()) | Err(Error::Controller(ControllerError::Rejected { .. })) if signed => Ok(()),
            Err(Error::Controller(ControllerError::Timeout { .. })) if signed => {
                tracing::warn!("Firmware signature seen but $I was never acknowledged");
                Ok(())
            }
            Err(Error::Controller(ControllerError::Timeout { timeout_ms })) => {
                Err(ConnectionError::HandshakeTimeout { timeout_ms }.into())
            }
            Ok(()) | Err(Error::Controller(ControllerError::Rejected { .. })) => {
                Err(ConnectionError::SignatureMismatch {
                    expected: signature,
                    received: received.join(" | "),
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    /// Close the link. Safe to call any number of times.
    pub fn disconnect(&mut self) {
        let was_open = self.transport.is_open();
        self.release_link();
        if was_open {
            tracing::info!("Disconnected from {}", self.config.connection.port);
        }
    }

    fn release_link(&mut self) {
        if let Err(e) = self.transport.close() {
            tracing::warn!("Error closing {}: {}", self.config.connection.port, e);
        }
        self.state = ConnectionState::Disconnected;
        self.in_flight = None;
        self.deferred.clear();
        self.receive.clear();
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() && self.transport.is_open() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected.into())
        }
    }

    /// Normalize and write one command without waiting for its acknowledgment.
    ///
    /// Blank and comment-only input is accepted and nothing is written.
    pub fn send_command(&mut self, raw: &str) -> Result<()> {
        self.ensure_connected()?;
        self.dispatch(raw).map(|_| ())
    }

    /// Write one command and wait for `ok`/`error`
    pub fn send_command_and_wait(&mut self, raw: &str, ack_timeout: Duration) -> Result<()> {
        self.ensure_connected()?;
        match self.dispatch(raw)? {
            Some(_) => self.await_ack(ack_timeout, |_| {}),
            None => Ok(()),
        }
    }

    /// Wait for the acknowledgment of the command in flight
    pub fn wait_for_ack(&mut self, timeout: Duration) -> Result<()> {
        self.ensure_connected()?;
        self.await_ack(timeout, |_| {})
    }

    fn dispatch(&mut self, raw: &str) -> Result<Option<Command>> {
        let Some(command) = Command::parse(raw) else {
            tracing::trace!("Skipping blank or comment line");
            return Ok(None);
        };
        self.ensure_not_aborted()?;
        if let Some(pending) = &self.in_flight {
            return Err(ControllerError::CommandInFlight {
                pending: pending.clone(),
            }
            .into());
        }
        self.transmit_command(command.as_str())?;
        tracing::debug!("Sent '{}'", command);
        Ok(Some(command))
    }

    /// Nothing may be written once the abort signal is raised
    fn ensure_not_aborted(&self) -> Result<()> {
        if self.abort.is_raised() {
            Err(ControllerError::Interrupted.into())
        } else {
            Ok(())
        }
    }

    fn transmit_command(&mut self, text: &str) -> Result<()> {
        let line = format!("{}\n", text);
        self.write_bytes(text, line.as_bytes())?;
        self.in_flight = Some(text.to_string());
        Ok(())
    }

    fn write_bytes(&mut self, label: &str, bytes: &[u8]) -> Result<()> {
        match self.transport.write(bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!("Failed to send '{}': {}", label, e);
                self.release_link();
                Err(TransmissionError::new(label, e.to_string()).into())
            }
        }
    }

    fn poll_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.receive.next_line() {
            return Ok(Some(line));
        }

        let available = match self.transport.bytes_available() {
            Ok(n) => n,
            Err(e) => return Err(self.link_lost(e)),
        };
        if available == 0 {
            return Ok(None);
        }

        let mut chunk = [0u8; READ_CHUNK];
        let want = available.min(READ_CHUNK);
        let n = match self.transport.read(&mut chunk[..want]) {
            Ok(n) => n,
            Err(e) => return Err(self.link_lost(e)),
        };
        self.receive.push(&chunk[..n]);
        Ok(self.receive.next_line())
    }

    fn link_lost(&mut self, e: Error) -> Error {
        tracing::error!("Serial link lost: {}", e);
        self.release_link();
        ConnectionError::ConnectionLost {
            reason: e.to_string(),
        }
        .into()
    }

    /// Poll until `ok`/`error` or until `timeout` elapses. Every other line
    /// goes to `on_line` and is otherwise discarded.
    fn await_ack(&mut self, timeout: Duration, mut on_line: impl FnMut(&Response)) -> Result<()> {
        let start = Instant::now();
        loop {
            self.ensure_not_aborted()?;

            let line = match self.deferred.pop_front() {
                Some(line) => Some(line),
                None => self.poll_line()?,
            };

            match line.map(|l| classify(&l)) {
                Some(Response::Ok) => {
                    if let Some(command) = self.in_flight.take() {
                        tracing::trace!("'{}' acknowledged", command);
                    }
                    return Ok(());
                }
                Some(Response::ControllerError { payload }) => {
                    let command = self.in_flight.take().unwrap_or_default();
                    let description = describe_error_payload(&payload).map(str::to_string);
                    tracing::warn!(
                        "GRBL rejected '{}': error:{} {}",
                        command,
                        payload,
                        description.as_deref().unwrap_or("")
                    );
                    return Err(ControllerError::Rejected {
                        payload,
                        description,
                    }
                    .into());
                }
                Some(other) => {
                    self.observe(&other);
                    on_line(&other);
                }
                None => {
                    if start.elapsed() < timeout {
                        std::thread::sleep(self.config.poll_interval);
                        continue;
                    }
                }
            }

            if start.elapsed() >= timeout {
                let command = self.in_flight.take().unwrap_or_default();
                tracing::warn!(
                    "No acknowledgment for '{}' within {}ms",
                    command,
                    timeout.as_millis()
                );
                return Err(ControllerError::Timeout {
                    timeout_ms: millis(timeout),
                }
                .into());
            }
        }
    }

    fn observe(&self, response: &Response) {
        match response {
            Response::Unrecognized { raw } => {
                match alarm_code(raw) {
                    Some(code) => tracing::warn!(
                        "GRBL alarm {}: {}",
                        code,
                        decode_alarm(code).unwrap_or("Unknown alarm")
                    ),
                    None => tracing::debug!("GRBL: {}", raw),
                }
                self.listener.on_message(raw);
            }
            other => tracing::trace!("GRBL: {}", other),
        }
    }

    /// Ask for a status frame with the realtime `?` query.
    ///
    /// Does not touch the command slot; an acknowledgment that arrives
    /// meanwhile is kept for the next wait.
    pub fn get_status(&mut self) -> Result<String> {
        self.ensure_connected()?;
        self.ensure_not_aborted()?;
        self.write_bytes("?", &[STATUS_QUERY])?;

        let timeout = self.config.status_timeout;
        let start = Instant::now();
        loop {
            self.ensure_not_aborted()?;

            match self.poll_line()? {
                Some(line) => match classify(&line) {
                    Response::StatusReport { raw } => return Ok(raw),
                    response if response.is_ack() => {
                        if self.in_flight.is_some() {
                            self.deferred.push_back(line);
                        } else {
                            tracing::debug!("Ignoring stray acknowledgment '{}'", line);
                        }
                    }
                    other => self.observe(&other),
                },
                None => {
                    if start.elapsed() < timeout {
                        std::thread::sleep(self.config.poll_interval);
                        continue;
                    }
                }
            }

            if start.elapsed() >= timeout {
                return Err(ControllerError::Timeout {
                    timeout_ms: millis(timeout),
                }
                .into());
            }
        }
    }

    /// Read all `$n=value` settings with `$$`.
    ///
    /// A missing final `ok` is tolerated: whatever arrived before the
    /// timeout is returned.
    pub fn get_configuration(&mut self) -> Result<BTreeMap<String, String>> {
        self.ensure_connected()?;
        self.dispatch(SETTINGS_COMMAND)?;

        let mut settings = BTreeMap::new();
        let outcome = self.await_ack(self.config.ack_timeout, |response| {
            if let Response::SettingLine { key, value } = response {
                settings.insert(key.clone(), value.clone());
            }
        });

        match outcome {
            Ok(()) => Ok(settings),
            Err(e) if e.is_timeout() => {
                tracing::warn!("$$ not acknowledged, returning {} settings", settings.len());
                Ok(settings)
            }
            Err(e) => Err(e),
        }
    }

    /// Send the realtime feed-hold byte `!`.
    ///
    /// Ignores the command slot so it can interrupt a stalled or running job.
    pub fn emergency_stop(&mut self) -> Result<()> {
        if !self.transport.is_open() {
            return Err(ConnectionError::NotConnected.into());
        }
        self.write_bytes("!", &[FEED_HOLD])?;
        tracing::warn!("Emergency stop sent");
        Ok(())
    }

    /// Clear the alarm lock with `$X`
    pub fn soft_reset(&mut self) -> Result<()> {
        let timeout = self.config.ack_timeout;
        self.send_command_and_wait(SOFT_RESET_COMMAND, timeout)?;
        tracing::info!("Soft reset done");
        Ok(())
    }

    /// Restore factory settings with `$RST=*`, then drop the link.
    ///
    /// Destroys calibration; never called implicitly.
    pub fn hard_reset(&mut self) -> Result<()> {
        let timeout = self.config.ack_timeout;
        self.send_command_and_wait(HARD_RESET_COMMAND, timeout)?;
        tracing::warn!("Hard reset done, controller settings restored to factory defaults");
        self.disconnect();
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Drop for ControllerSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
