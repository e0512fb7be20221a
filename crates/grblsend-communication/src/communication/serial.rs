//! Serial port communication implementation
//!
//! Provides the `serialport`-backed [`Transport`] used to talk to real
//! controllers, plus port enumeration and controller port discovery.

use super::{ConnectionParams, Transport};
use grblsend_core::{ConnectionError, Error, Result};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, StopBits};
use std::io::{self, Read, Write};

/// Description prefix that marks a likely controller (USB-serial adapters)
pub const DEFAULT_DESCRIPTION_PREFIX: &str = "USB";

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB QinHeng Electronics USB Serial")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List available serial ports on the system
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::Enumeration {
            reason: e.to_string(),
        }
    })?;

    Ok(ports
        .iter()
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, get_port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb_info) => {
                    let info = info.with_usb_ids(usb_info.vid, usb_info.pid);
                    match usb_info.manufacturer {
                        Some(ref mfg) => info.with_manufacturer(mfg),
                        None => info,
                    }
                }
                _ => info,
            }
        })
        .collect())
}

/// Pick the first port whose description starts with `prefix`.
///
/// Advisory only: returns `None` when nothing matches or the host cannot
/// enumerate ports.
pub fn find_candidate_port(prefix: &str) -> Option<String> {
    match list_ports() {
        Ok(ports) => select_candidate(&ports, prefix).map(|p| p.port_name.clone()),
        Err(e) => {
            tracing::debug!("Port discovery unavailable: {}", e);
            None
        }
    }
}

/// Discovery heuristic over an already enumerated port list
pub fn select_candidate<'a>(ports: &'a [SerialPortInfo], prefix: &str) -> Option<&'a SerialPortInfo> {
    ports.iter().find(|p| p.description.starts_with(prefix))
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Real serial port transport using the serialport crate
#[derive(Default)]
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    /// Create a closed transport
    pub fn new() -> Self {
        Self::default()
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or(Error::Connection(ConnectionError::NotConnected))
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, params: &ConnectionParams) -> Result<()> {
        if self.port.is_some() {
            self.close()?;
        }

        let builder = serialport::new(&params.port, params.baud_rate)
            .timeout(params.read_timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None);

        let port = builder.open().map_err(|e| {
            tracing::warn!("Failed to open serial port {}: {}", params.port, e);
            ConnectionError::FailedToOpen {
                port: params.port.clone(),
                reason: e.to_string(),
            }
        })?;
        self.port = Some(port);

        // GRBL reboots when the port opens; anything before this is boot noise
        std::thread::sleep(params.settle_delay);
        self.clear_buffers()?;

        tracing::debug!("Opened {} at {} baud", params.port, params.baud_rate);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(port) = self.port.take() {
            tracing::debug!("Closing {}", port.name().unwrap_or_default());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let port = self.port_mut()?;
        let count = port
            .bytes_to_read()
            .map_err(|e| Error::Io(io::Error::other(e.to_string())))?;
        Ok(count as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_buffers(&mut self) -> Result<()> {
        let port = self.port_mut()?;
        port.clear(ClearBuffer::All)
            .map_err(|e| Error::Io(io::Error::other(e.to_string())))
    }
}
