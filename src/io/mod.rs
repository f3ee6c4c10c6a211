// src/io/mod.rs
//
// Both ends of the relay: the serial transport and the local console.

pub mod console;
pub mod serial;

pub use console::{
    ConsoleInput, InputMode, InputSource, LocalInput, LocalOutput, TerminalGuard,
};
pub use serial::{SerialConfig, SerialPortTransport, SerialTransport};
