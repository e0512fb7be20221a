//! Line-by-line G-code streaming
//!
//! Each non-comment line is sent and acknowledged before the next one is
//! written. The first rejection or timeout ends the transfer.

use super::controller::ControllerSession;
use super::listener::{noop_listener, SessionListenerHandle};
use grblsend_core::{Command, Error, ProgramError, Result, ToolCommands, TransferResult};
use std::path::Path;
use std::time::Duration;

/// Default number of acknowledged lines between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Options of a streaming run
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    /// Issue `F<value>` before the program
    pub feed_rate: Option<f64>,
    /// Report progress every this many acknowledged lines
    pub progress_interval: usize,
    /// Wait for each line's acknowledgment
    pub line_timeout: Duration,
    /// Switch the tool off after a successful run
    pub finish_tool: Option<ToolCommands>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            feed_rate: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            line_timeout: Duration::from_secs(30),
            finish_tool: None,
        }
    }
}

/// Read a G-code program into lines.
///
/// Fails with [`ProgramError::FileNotFound`] before anything is streamed.
pub fn load_program(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ProgramError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path).map_err(|e| ProgramError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Streams programs through a [`ControllerSession`]
pub struct FileStreamer {
    options: StreamOptions,
    listener: SessionListenerHandle,
}

impl FileStreamer {
    pub fn new(options: StreamOptions) -> Self {
        Self {
            options,
            listener: noop_listener(),
        }
    }

    /// Register a listener for progress and failures
    pub fn with_listener(mut self, listener: SessionListenerHandle) -> Self {
        self.listener = listener;
        self
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Load `path` and stream it
    pub fn stream_file(
        &self,
        session: &mut ControllerSession,
        path: impl AsRef<Path>,
    ) -> Result<TransferResult> {
        let path = path.as_ref();
        let lines = load_program(path)?;
        tracing::info!("Streaming {} ({} lines)", path.display(), lines.len());
        Ok(self.stream(session, lines))
    }

    /// Stream `lines` in order, stopping at the first failure.
    ///
    /// `failure_line` is the 1-based position of the failing line in `lines`.
    pub fn stream<I, S>(&self, session: &mut ControllerSession, lines: I) -> TransferResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let timeout = self.options.line_timeout;

        if let Some(rate) = self.options.feed_rate {
            let feed = format!("F{}", rate);
            tracing::info!("Setting feed rate: {}", rate);
            if let Err(e) = session.send_command_and_wait(&feed, timeout) {
                return self.abort(session, 0, None, feed, e);
            }
        }

        let interval = self.options.progress_interval.max(1);
        let mut lines_sent = 0;

        for (index, raw) in lines.into_iter().enumerate() {
            let line_no = index + 1;
            let Some(command) = Command::parse(raw.as_ref()) else {
                continue;
            };

            tracing::debug!("Sending line {}: {}", line_no, command);
            if let Err(e) = session.send_command_and_wait(command.as_str(), timeout) {
                return self.abort(session, lines_sent, Some(line_no), command.to_string(), e);
            }

            lines_sent += 1;
            if lines_sent % interval == 0 {
                tracing::info!("Lines sent: {}", lines_sent);
                self.listener.on_progress(lines_sent);
            }
        }

        if let Some(tool) = &self.options.finish_tool {
            let off = tool.tool_off().to_string();
            if let Err(e) = session.send_command_and_wait(&off, timeout) {
                return self.abort(session, lines_sent, None, off, e);
            }
        }

        tracing::info!("Transfer complete, {} lines sent", lines_sent);
        TransferResult::completed(lines_sent)
    }

    fn abort(
        &self,
        session: &mut ControllerSession,
        lines_sent: usize,
        line_no: Option<usize>,
        command: String,
        error: Error,
    ) -> TransferResult {
        if error.is_interrupted() {
            tracing::warn!("Transfer interrupted, stopping the machine");
            if let Err(e) = session.emergency_stop() {
                tracing::error!("Emergency stop failed: {}", e);
            }
        }

        match line_no {
            Some(n) => tracing::error!("Line {} '{}' failed: {}", n, command, error),
            None => tracing::error!("'{}' failed: {}", command, error),
        }
        self.listener.on_command_failed(line_no, &command, &error);

        TransferResult::failed(lines_sent, line_no, Some(command), error)
    }
}
