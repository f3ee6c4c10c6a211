// src/io/serial/port.rs
//
// Serial transport used by the relay.
// Wraps a serialport handle split into independent read and write halves so the
// inbound and outbound pumps never wait on each other.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo, SerialPortType};

use super::utils::{
    to_serialport_data_bits, to_serialport_parity, to_serialport_stop_bits, Parity,
};

/// How long a single read waits before returning `TimedOut` so the caller can
/// check whether the session has ended.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Types and Configuration
// ============================================================================

/// Serial port line configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl SerialConfig {
    /// `9600 8-N-1` style summary
    pub fn line_summary(&self) -> String {
        format!(
            "{} {}-{}-{}",
            self.baud_rate,
            self.data_bits,
            self.parity.letter(),
            self.stop_bits
        )
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Byte-oriented full-duplex link to the remote device.
///
/// `read` and `write` may be called concurrently from different threads.
/// `read` returns `Ok(0)` once the link is closed. It may also fail with
/// `ErrorKind::TimedOut` when nothing arrived within the poll interval; that is
/// a retry, not a failure.
pub trait SerialTransport: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&self, bytes: &[u8]) -> io::Result<()>;
    fn is_open(&self) -> bool;
    fn close(&self);
}

/// `SerialTransport` backed by an OS serial port.
pub struct SerialPortTransport {
    port_name: String,
    reader: Mutex<Box<dyn SerialPort>>,
    writer: Mutex<Box<dyn SerialPort>>,
    open: AtomicBool,
}

impl SerialPortTransport {
    /// Open the port with the given line settings.
    pub fn open(config: &SerialConfig) -> Result<Self, String> {
        let data_bits = to_serialport_data_bits(config.data_bits)?;
        let stop_bits = to_serialport_stop_bits(config.stop_bits)?;
        let parity = to_serialport_parity(config.parity);

        let reader = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .timeout(READ_POLL_INTERVAL)
            .open()
            .map_err(|e| format!("Failed to open {}: {}", config.port, e))?;

        let writer = reader
            .try_clone()
            .map_err(|e| format!("Failed to clone handle for {}: {}", config.port, e))?;

        tlog!(
            "[serial] Opened {} at {}",
            config.port,
            config.line_summary()
        );

        Ok(Self {
            port_name: config.port.clone(),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            open: AtomicBool::new(true),
        })
    }
}

fn poisoned(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{} mutex poisoned", what))
}

impl SerialTransport for SerialPortTransport {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.is_open() {
            return Ok(0);
        }
        let mut port = self.reader.lock().map_err(|_| poisoned("reader"))?;
        port.read(buf)
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if !self.is_open() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is closed", self.port_name),
            ));
        }
        let mut port = self.writer.lock().map_err(|_| poisoned("writer"))?;
        port.write_all(bytes)?;
        port.flush()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            tlog!("[serial] Closed {}", self.port_name);
        }
    }
}

// ============================================================================
// Port Enumeration
// ============================================================================

/// Available serial ports, in listing order.
///
/// macOS exposes each device twice. Only the /dev/cu.* (calling unit) node is
/// kept, since /dev/tty.* blocks on open until carrier detect.
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, String> {
    let ports =
        serialport::available_ports().map_err(|e| format!("Failed to enumerate ports: {}", e))?;

    Ok(ports
        .into_iter()
        .filter(|p| !cfg!(target_os = "macos") || !p.port_name.starts_with("/dev/tty."))
        .collect())
}

/// Type, label and USB identity shown after a port name.
fn port_details(port_type: &SerialPortType) -> Vec<String> {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut details = vec!["USB".to_string()];
            let label: Vec<&str> = [usb.manufacturer.as_deref(), usb.product.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if !label.is_empty() {
                details.push(label.join(" "));
            }
            details.push(format!("{:04x}:{:04x}", usb.vid, usb.pid));
            if let Some(serial) = &usb.serial_number {
                details.push(format!("s/n {}", serial));
            }
            details
        }
        SerialPortType::BluetoothPort => vec!["Bluetooth".to_string()],
        SerialPortType::PciPort => vec!["PCI".to_string()],
        SerialPortType::Unknown => vec!["Unknown".to_string()],
    }
}

/// One line per port: `<index>: <name> (<type>[, <label>][, <vid>:<pid>][, s/n <serial>])`
pub fn format_port_listing(ports: &[SerialPortInfo]) -> Vec<String> {
    ports
        .iter()
        .enumerate()
        .map(|(index, p)| {
            format!(
                "{}: {} ({})",
                index,
                p.port_name,
                port_details(&p.port_type).join(", ")
            )
        })
        .collect()
}

/// Resolve a `--port` value that may be either a device name or an index into
/// the port listing. Names pass through unchanged.
pub fn resolve_port_name(requested: &str, ports: &[SerialPortInfo]) -> Result<String, String> {
    match requested.parse::<usize>() {
        Ok(index) => ports
            .get(index)
            .map(|p| p.port_name.clone())
            .ok_or_else(|| {
                format!(
                    "Port index {} is out of range ({} port(s) available)",
                    index,
                    ports.len()
                )
            }),
        Err(_) => Ok(requested.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
