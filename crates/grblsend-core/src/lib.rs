//! # grblsend Core
//!
//! Core types shared by the grblsend crates: the error taxonomy, command
//! normalization, connection state, transfer results and tool commands.

pub mod command;
pub mod data;
pub mod error;
pub mod tool;

pub use command::{normalize, Command};
pub use data::{ConnectionState, TransferResult};
pub use error::{
    ConnectionError, ControllerError, Error, ProgramError, Result, TransmissionError,
};
pub use tool::ToolCommands;
