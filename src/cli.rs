use crate::LogFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "grblsend",
    version,
    about = "Stream G-code to a GRBL controller, one acknowledged line at a time"
)]
pub struct Cli {
    /// G-code file to stream
    pub file: Option<PathBuf>,

    /// Serial port, or "auto" to pick the first USB serial device
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baudrate: Option<u32>,

    /// Feed rate issued as F<value> before the program
    #[arg(short, long)]
    pub feed_rate: Option<f64>,

    /// Serial read timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<f64>,

    /// Config file (.toml or .json); defaults to <config dir>/grblsend/config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long, default_value_t = false)]
    pub list_ports: bool,

    /// Print the controller status frame
    #[arg(long, default_value_t = false)]
    pub status: bool,

    /// Print the controller $$ settings
    #[arg(long, default_value_t = false)]
    pub settings: bool,

    /// Send the feed-hold byte `!`
    #[arg(long, default_value_t = false)]
    pub emergency_stop: bool,

    /// Clear the alarm lock ($X)
    #[arg(long, default_value_t = false)]
    pub soft_reset: bool,

    /// Restore factory settings ($RST=*); erases calibration
    #[arg(long, default_value_t = false)]
    pub hard_reset: bool,

    /// Debug output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// What a single invocation does
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Print the serial ports; no controller is opened
    ListPorts,
    Controller(ControllerAction),
}

/// An action run against a connected controller
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerAction {
    Status,
    Settings,
    EmergencyStop,
    SoftReset,
    HardReset,
    Stream(PathBuf),
}

impl Cli {
    /// The action selected by the flags. The first flag wins, in the order
    /// list-ports, status, settings, emergency-stop, soft-reset, hard-reset.
    /// Without any of them a file is required.
    pub fn action(&self) -> Option<Action> {
        if self.list_ports {
            return Some(Action::ListPorts);
        }
        let flags = [
            (self.status, ControllerAction::Status),
            (self.settings, ControllerAction::Settings),
            (self.emergency_stop, ControllerAction::EmergencyStop),
            (self.soft_reset, ControllerAction::SoftReset),
            (self.hard_reset, ControllerAction::HardReset),
        ];
        flags
            .into_iter()
            .find_map(|(set, action)| set.then_some(action))
            .or_else(|| self.file.clone().map(ControllerAction::Stream))
            .map(Action::Controller)
    }
}
