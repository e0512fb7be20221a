//! grblsend Settings Crate
//!
//! Loads, validates and saves the sender configuration and converts it into
//! session and streaming parameters.

pub mod config;
pub mod error;

pub use config::{ConnectionSettings, SenderConfig, StreamSettings, ToolSettings, AUTO_PORT};
pub use error::{SettingsError, SettingsResult};
