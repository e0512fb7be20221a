//! GRBL firmware support
//!
//! Response classification, the acknowledgment-driven controller session
//! and the program streamer.

pub mod controller;
pub mod error_decoder;
pub mod listener;
pub mod response_parser;
pub mod streamer;

pub use controller::{AbortSignal, ControllerSession, SessionConfig};
pub use listener::{NoOpListener, SessionListener, SessionListenerHandle};
pub use response_parser::{classify, status_state, Response};
pub use streamer::{load_program, FileStreamer, StreamOptions};
