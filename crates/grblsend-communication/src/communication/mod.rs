//! Transport layer
//!
//! A `Transport` owns the byte link to the controller. It knows nothing about
//! lines or G-code: it writes bytes, reports how many bytes are waiting and
//! hands them over. Line assembly lives in [`receive::LineBuffer`].

pub mod receive;
pub mod serial;

use grblsend_core::Result;
use std::time::Duration;

/// Default GRBL baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Time the controller needs to boot after the port opens (it resets on DTR)
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Parameters used to open a link
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParams {
    /// Device name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout of the underlying device
    pub read_timeout: Duration,
    /// Pause after opening before the link is usable
    pub settle_delay: Duration,
}

impl ConnectionParams {
    /// Parameters for `port` with GRBL defaults
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the settle delay
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(1000),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Byte-level link to a controller
///
/// Implementations must be exclusively owned by one session.
pub trait Transport: Send {
    /// Open the link, wait out the settle delay and discard anything buffered
    fn open(&mut self, params: &ConnectionParams) -> Result<()>;

    /// Close the link. Closing a closed link is not an error.
    fn close(&mut self) -> Result<()>;

    /// Whether the link is open
    fn is_open(&self) -> bool;

    /// Write all of `data` and flush it
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Number of received bytes that can be read without blocking
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` received bytes
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Drop pending input and output
    fn clear_buffers(&mut self) -> Result<()>;
}

pub use receive::LineBuffer;
pub use serial::{find_candidate_port, list_ports, SerialPortInfo, SerialTransport};
