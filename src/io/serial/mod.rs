// src/io/serial/mod.rs
//
// Serial port transport for the terminal relay.
//
// Features:
// - Line configuration (baud, data bits, parity, stop bits)
// - Concurrent read + write through split handles
// - Port enumeration and lookup by index

mod port;
pub(crate) mod utils;

pub use port::{
    format_port_listing, list_serial_ports, resolve_port_name, SerialConfig, SerialPortTransport,
    SerialTransport, READ_POLL_INTERVAL,
};
pub use serialport::SerialPortInfo;
pub use utils::Parity;
