//! Tool (pen, laser, spindle) switching commands
//!
//! The motion compiler that turns drawings into G-code only needs to know
//! which command lifts the tool and which lowers it. That pair is carried as
//! a plain value instead of a generated type per machine.

use serde::{Deserialize, Serialize};

/// Commands that switch the tool off and on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommands {
    /// Sent to stop cutting/drawing (pen up, laser off)
    pub off: String,
    /// Sent to start cutting/drawing (pen down, laser on)
    pub on: String,
}

impl ToolCommands {
    /// Create a command pair
    pub fn new(off: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            off: off.into(),
            on: on.into(),
        }
    }

    /// Command that turns the tool off
    pub fn tool_off(&self) -> &str {
        &self.off
    }

    /// Command that turns the tool on
    pub fn tool_on(&self) -> &str {
        &self.on
    }
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self::new("M5", "M3 S1000")
    }
}
