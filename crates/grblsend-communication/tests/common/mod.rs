//! Scripted in-memory transport shared by the integration tests

#![allow(dead_code)]

use grblsend_communication::{ConnectionParams, SessionConfig, Transport};
use grblsend_core::{ConnectionError, Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Maps each write to the lines the controller answers with
pub type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

#[derive(Default)]
pub struct MockState {
    pub open: bool,
    pub close_count: usize,
    pub writes: Vec<String>,
    pub incoming: VecDeque<u8>,
    pub fail_open: bool,
    pub fail_writes: bool,
}

/// Test-side view of a mock transport
#[derive(Clone)]
pub struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    pub fn writes(&self) -> Vec<String> {
        self.0.lock().writes.clone()
    }

    /// Line commands written, without terminators and realtime bytes
    pub fn commands(&self) -> Vec<String> {
        self.0
            .lock()
            .writes
            .iter()
            .filter(|w| w.ends_with('\n'))
            .map(|w| w.trim_end().to_string())
            .collect()
    }

    pub fn is_open(&self) -> bool {
        self.0.lock().open
    }

    pub fn close_count(&self) -> usize {
        self.0.lock().close_count
    }

    pub fn fail_open(&self) {
        self.0.lock().fail_open = true;
    }

    pub fn fail_writes(&self) {
        self.0.lock().fail_writes = true;
    }
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    responder: Responder,
}

impl MockTransport {
    pub fn new(responder: impl FnMut(&str) -> Vec<String> + Send + 'static) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let transport = Self {
            state: state.clone(),
            responder: Box::new(responder),
        };
        (transport, MockHandle(state))
    }

    /// A well-behaved GRBL 1.1h controller
    pub fn grbl() -> (Self, MockHandle) {
        Self::new(grbl_reply)
    }
}

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn grbl_reply(written: &str) -> Vec<String> {
    match written.trim_end() {
        "?" => lines(&["<Idle|MPos:0.000,0.000,0.000|FS:0,0>"]),
        "!" => Vec::new(),
        "$I" => lines(&["[VER:1.1h.20190825:]", "[OPT:V,15,128]", "ok"]),
        "$$" => lines(&["$0=10", "$1=25", "$100=22.857", "ok"]),
        _ => lines(&["ok"]),
    }
}

impl Transport for MockTransport {
    fn open(&mut self, params: &ConnectionParams) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(ConnectionError::FailedToOpen {
                port: params.port.clone(),
                reason: "No such file or directory".to_string(),
            }
            .into());
        }
        state.open = true;
        state.incoming.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.open {
            state.close_count += 1;
        }
        state.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(data).to_string();
        {
            let mut state = self.state.lock();
            if !state.open {
                return Err(ConnectionError::NotConnected.into());
            }
            if state.fail_writes {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device unplugged",
                )));
            }
            state.writes.push(text.clone());
        }

        let replies = (self.responder)(&text);
        let mut state = self.state.lock();
        for reply in replies {
            state.incoming.extend(reply.as_bytes());
            state.incoming.extend(b"\r\n");
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.state.lock().incoming.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        let n = buf.len().min(state.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.state.lock().incoming.clear();
        Ok(())
    }
}

/// Session timings short enough for tests
pub fn test_config() -> SessionConfig {
    SessionConfig {
        connection: ConnectionParams::new("/dev/ttyMOCK").with_settle_delay(Duration::ZERO),
        handshake_timeout: Duration::from_millis(200),
        ack_timeout: Duration::from_millis(200),
        status_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(1),
        ..SessionConfig::default()
    }
}
