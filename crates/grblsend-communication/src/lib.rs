//! # grblsend Communication
//!
//! Serial transport and the GRBL command/acknowledgment protocol.
//! Provides port discovery, response classification, the controller session
//! and the line-by-line program streamer.

pub mod communication;
pub mod firmware;

pub use communication::{
    find_candidate_port, list_ports, ConnectionParams, LineBuffer, SerialPortInfo,
    SerialTransport, Transport,
};

pub use firmware::grbl::{
    classify, load_program, AbortSignal, ControllerSession, FileStreamer, NoOpListener,
    Response, SessionConfig, SessionListener, SessionListenerHandle, StreamOptions,
};
