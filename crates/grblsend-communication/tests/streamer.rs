//! FileStreamer tests against a scripted transport

mod common;

use common::{grbl_reply, lines, test_config, MockTransport};
use grblsend_communication::{
    load_program, ControllerSession, FileStreamer, SessionListener, StreamOptions,
};
use grblsend_core::{ConnectionError, ControllerError, Error, ProgramError, ToolCommands};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn connected(transport: MockTransport) -> ControllerSession {
    let mut session = ControllerSession::new(Box::new(transport), test_config());
    session.connect().unwrap();
    session
}

fn options() -> StreamOptions {
    StreamOptions {
        line_timeout: Duration::from_millis(100),
        ..StreamOptions::default()
    }
}

/// Commands written after the handshake
fn program_writes(commands: Vec<String>) -> Vec<String> {
    commands.into_iter().skip(1).collect()
}

#[test]
fn test_stream_skips_comments() {
    let (transport, handle) = MockTransport::grbl();
    let mut session = connected(transport);
    let streamer = FileStreamer::new(options());

    let result = streamer.stream(&mut session, ["G21", "; comment", "G0 X0 Y0", "G1 X10 F500"]);

    assert!(result.succeeded);
    assert_eq!(result.lines_sent, 3);
    assert_eq!(result.failure_line, None);
    assert!(result.error.is_none());
    assert_eq!(
        program_writes(handle.commands()),
        vec!["G21", "G0 X0 Y0", "G1 X10 F500"]
    );
}

#[test]
fn test_stream_stops_at_first_rejection() {
    let (transport, handle) = MockTransport::new(|written: &str| match written.trim_end() {
        "G1 X8" => lines(&["error:22"]),
        other => grbl_reply(other),
    });
    let mut session = connected(transport);
    let streamer = FileStreamer::new(options());

    let program = [
        "G21", "G90", "; header", "G0 X0", "(pause)", "G1 X6", "G1 X7", "G1 X8", "G1 X9", "G1 X10",
    ];
    let result = streamer.stream(&mut session, program);

    assert!(!result.succeeded);
    assert_eq!(result.lines_sent, 5);
    assert_eq!(result.failure_line, Some(8));
    assert_eq!(result.failure_command.as_deref(), Some("G1 X8"));
    assert!(matches!(
        result.error,
        Some(Error::Controller(ControllerError::Rejected { ref payload, .. })) if payload == "22"
    ));

    let sent = program_writes(handle.commands());
    assert_eq!(sent.last().map(String::as_str), Some("G1 X8"));
    assert!(!sent.iter().any(|c| c == "G1 X9" || c == "G1 X10"));
}

#[test]
fn test_stream_counts_only_acknowledged_lines() {
    let (transport, _handle) = MockTransport::new(|written: &str| match written.trim_end() {
        "M3 S1000" => lines(&["error:9"]),
        other => grbl_reply(other),
    });
    let mut session = connected(transport);
    let streamer = FileStreamer::new(options());

    let program = [
        "G21", "G90", "G0 X0", "G0 Y0", "G1 X1", "G1 Y1", "(spindle)", "M3 S1000", "G1 X2", "M5",
    ];
    let result = streamer.stream(&mut session, program);

    assert_eq!(result.lines_sent, 6);
    assert_eq!(result.failure_line, Some(8));
}

#[test]
fn test_feed_rate_is_sent_first() {
    let (transport, handle) = MockTransport::grbl();
    let mut session = connected(transport);
    let streamer = FileStreamer::new(StreamOptions {
        feed_rate: Some(1500.0),
        ..options()
    });

    let result = streamer.stream(&mut session, ["G1 X1"]);

    assert!(result.succeeded);
    assert_eq!(result.lines_sent, 1);
    assert_eq!(program_writes(handle.commands()), vec!["F1500", "G1 X1"]);
}

#[test]
fn test_rejected_feed_rate_aborts_transfer() {
    let (transport, handle) = MockTransport::new(|written: &str| {
        if written.starts_with('F') {
            lines(&["error:2"])
        } else {
            grbl_reply(written)
        }
    });
    let mut session = connected(transport);
    let streamer = FileStreamer::new(StreamOptions {
        feed_rate: Some(250.5),
        ..options()
    });

    let result = streamer.stream(&mut session, ["G1 X1", "G1 X2"]);

    assert!(!result.succeeded);
    assert_eq!(result.lines_sent, 0);
    assert_eq!(result.failure_line, None);
    assert_eq!(result.failure_command.as_deref(), Some("F250.5"));
    assert_eq!(program_writes(handle.commands()), vec!["F250.5"]);
}

#[test]
fn test_stream_stops_on_timeout() {
    let (transport, handle) = MockTransport::new(|written: &str| match written.trim_end() {
        "G4 P60" => Vec::new(),
        other => grbl_reply(other),
    });
    let mut session = connected(transport);
    let streamer = FileStreamer::new(options());

    let result = streamer.stream(&mut session, ["G21", "G4 P60", "G0 X0"]);

    assert!(!result.succeeded);
    assert_eq!(result.lines_sent, 1);
    assert_eq!(result.failure_line, Some(2));
    assert!(result.error.as_ref().is_some_and(Error::is_timeout));
    assert_eq!(program_writes(handle.commands()), vec!["G21", "G4 P60"]);
}

#[derive(Default)]
struct RecordingListener {
    progress: Mutex<Vec<usize>>,
    failures: Mutex<Vec<(Option<usize>, String)>>,
}

impl SessionListener for RecordingListener {
    fn on_progress(&self, lines_sent: usize) {
        self.progress.lock().push(lines_sent);
    }

    fn on_command_failed(&self, line: Option<usize>, command: &str, _error: &Error) {
        self.failures.lock().push((line, command.to_string()));
    }
}

#[test]
fn test_progress_is_reported_per_interval() {
    let (transport, _handle) = MockTransport::grbl();
    let mut session = connected(transport);
    let listener = Arc::new(RecordingListener::default());
    let streamer = FileStreamer::new(StreamOptions {
        progress_interval: 2,
        ..options()
    })
    .with_listener(listener.clone());

    let result = streamer.stream(&mut session, ["G0 X1", "G0 X2", "; skip", "G0 X3", "G0 X4", "G0 X5"]);

    assert!(result.succeeded);
    assert_eq!(*listener.progress.lock(), vec![2, 4]);
    assert!(listener.failures.lock().is_empty());
}

#[test]
fn test_failure_is_reported_to_listener() {
    let (transport, _handle) = MockTransport::new(|written: &str| match written.trim_end() {
        "G2 X1" => lines(&["error:33"]),
        other => grbl_reply(other),
    });
    let mut session = connected(transport);
    let listener = Arc::new(RecordingListener::default());
    let streamer = FileStreamer::new(options()).with_listener(listener.clone());

    streamer.stream(&mut session, ["G0 X0", "G2 X1"]);

    assert_eq!(*listener.failures.lock(), vec![(Some(2), "G2 X1".to_string())]);
}

#[test]
fn test_feed_rate_failure_has_no_line() {
    let (transport, _handle) = MockTransport::new(|written: &str| {
        if written.starts_with('F') {
            lines(&["error:2"])
        } else {
            grbl_reply(written)
        }
    });
    let mut session = connected(transport);
    let listener = Arc::new(RecordingListener::default());
    let streamer = FileStreamer::new(StreamOptions {
        feed_rate: Some(0.5),
        ..options()
    })
    .with_listener(listener.clone());

    streamer.stream(&mut session, ["G1 X1"]);

    assert_eq!(*listener.failures.lock(), vec![(None, "F0.5".to_string())]);
}

#[test]
fn test_interrupted_stream_sends_feed_hold() {
    let (transport, handle) = MockTransport::grbl();
    let mut session = connected(transport);
    session.abort_signal().raise();
    let streamer = FileStreamer::new(options());

    let result = streamer.stream(&mut session, ["G0 X1", "G0 X2"]);

    assert!(!result.succeeded);
    assert_eq!(result.lines_sent, 0);
    assert_eq!(result.failure_line, Some(1));
    assert!(result.error.as_ref().is_some_and(Error::is_interrupted));
    assert_eq!(handle.writes(), vec!["$I\n", "!"]);
}

#[test]
fn test_abort_between_lines_sends_nothing_further() {
    let (transport, handle) = MockTransport::grbl();
    let mut session = connected(transport);
    let abort = session.abort_signal();
    let listener = Arc::new(AbortAfterProgress {
        abort: abort.clone(),
    });
    let streamer = FileStreamer::new(StreamOptions {
        progress_interval: 1,
        ..options()
    })
    .with_listener(listener);

    let result = streamer.stream(&mut session, ["G0 X1", "G0 X2", "G0 X3"]);

    assert!(!result.succeeded);
    assert_eq!(result.lines_sent, 1);
    assert_eq!(result.failure_line, Some(2));
    assert_eq!(handle.writes(), vec!["$I\n", "G0 X1\n", "!"]);
}

/// Raises the abort signal as soon as the first line is acknowledged
struct AbortAfterProgress {
    abort: grblsend_communication::AbortSignal,
}

impl SessionListener for AbortAfterProgress {
    fn on_progress(&self, _lines_sent: usize) {
        self.abort.raise();
    }
}

#[test]
fn test_stream_requires_connection() {
    let (transport, handle) = MockTransport::grbl();
    let mut session = ControllerSession::new(Box::new(transport), test_config());
    let streamer = FileStreamer::new(options());

    let result = streamer.stream(&mut session, ["G0 X1"]);

    assert!(!result.succeeded);
    assert_eq!(result.failure_line, Some(1));
    assert!(matches!(
        result.error,
        Some(Error::Connection(ConnectionError::NotConnected))
    ));
    assert!(handle.writes().is_empty());
}

#[test]
fn test_finish_tool_switches_off() {
    let (transport, handle) = MockTransport::grbl();
    let mut session = connected(transport);
    let streamer = FileStreamer::new(StreamOptions {
        finish_tool: Some(ToolCommands::default()),
        ..options()
    });

    let result = streamer.stream(&mut session, ["M3 S1000", "G1 X5"]);

    assert!(result.succeeded);
    assert_eq!(result.lines_sent, 2);
    assert_eq!(
        program_writes(handle.commands()),
        vec!["M3 S1000", "G1 X5", "M5"]
    );
}

#[test]
fn test_stream_file_missing_path() {
    let (transport, handle) = MockTransport::grbl();
    let mut session = connected(transport);
    let streamer = FileStreamer::new(options());

    let err = streamer
        .stream_file(&mut session, "/nonexistent/drawing.gcode")
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Program(ProgramError::FileNotFound { .. })
    ));
    assert_eq!(handle.commands(), vec!["$I"]);
}

#[test]
fn test_stream_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "; generated").unwrap();
    writeln!(file, "G21").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "G0 X1 Y1 ; rapid").unwrap();

    let program = load_program(file.path()).unwrap();
    assert_eq!(program.len(), 4);

    let (transport, handle) = MockTransport::grbl();
    let mut session = connected(transport);
    let streamer = FileStreamer::new(options());

    let result = streamer.stream_file(&mut session, file.path()).unwrap();

    assert!(result.succeeded);
    assert_eq!(result.lines_sent, 2);
    assert_eq!(program_writes(handle.commands()), vec!["G21", "G0 X1 Y1"]);
}
