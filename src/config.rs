// src/config.rs
//
// Command-line flags and the optional config file of defaults.
// CLI values win over the file, the file wins over built-in defaults.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::io::serial::{Parity, SerialConfig};
use crate::relay::RelayOptions;

const CONFIG_DIR_NAME: &str = "potty";
const CONFIG_FILE_NAME: &str = "config.toml";

// ============================================================================
// Command Line
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "potty",
    version,
    about = "Serial console terminal",
    after_help = "Press Ctrl+] to end an interactive session."
)]
pub struct Cli {
    /// Name or index (see --list) of the serial port to connect to
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate [default: 9600]
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Data bits, 5-8 [default: 8]
    #[arg(long)]
    pub data_bits: Option<u8>,

    /// Parity [default: none]
    #[arg(long, value_enum)]
    pub parity: Option<Parity>,

    /// Stop bits, 1 or 2 [default: 1]
    #[arg(long)]
    pub stop_bits: Option<u8>,

    /// Translate arrow, function and editing keys to ANSI escape sequences
    #[arg(long)]
    pub ansi: bool,

    /// Echo typed input locally
    #[arg(long)]
    pub echo: bool,

    /// Send CR LF when Enter is pressed
    #[arg(long)]
    pub crlf: bool,

    /// List available serial ports and exit
    #[arg(short, long)]
    pub list: bool,

    /// Config file of defaults [default: <config dir>/potty/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print diagnostic logging to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Config File
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub ansi: bool,
    #[serde(default)]
    pub echo: bool,
    #[serde(default)]
    pub crlf: bool,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: Parity::default(),
            stop_bits: default_stop_bits(),
            ansi: false,
            echo: false,
            crlf: false,
        }
    }
}

/// `<config dir>/potty/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn parse_file_config(contents: &str) -> Result<FileConfig, String> {
    toml::from_str(contents).map_err(|e| format!("Invalid config: {}", e))
}

/// Load the config file. A missing file gives the defaults; a malformed one is an error.
pub fn load_file_config(path: &Path) -> Result<FileConfig, String> {
    if !path.exists() {
        tlog!("[config] No config file at {}", path.display());
        return Ok(FileConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let config = parse_file_config(&contents)
        .map_err(|e| format!("{} ({})", e, path.display()))?;
    tlog!("[config] Loaded {}", path.display());
    Ok(config)
}

// ============================================================================
// Merged Configuration
// ============================================================================

/// What the program should do after parsing arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ListPorts,
    Connect(ConnectConfig),
}

/// Port settings plus relay flags for one session. `port` may still be an
/// index into the port listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectConfig {
    pub serial: SerialConfig,
    pub relay: RelayOptions,
}

/// Merge CLI flags over file defaults and validate the result.
pub fn resolve(cli: &Cli, file: &FileConfig) -> Result<Command, String> {
    if cli.list {
        return Ok(Command::ListPorts);
    }

    let port = cli
        .port
        .clone()
        .or_else(|| file.port.clone())
        .filter(|p| !p.trim().is_empty())
        .ok_or("No serial port given (use --port, or --list to see available ports)")?;

    let serial = SerialConfig {
        port,
        baud_rate: cli.baud.unwrap_or(file.baud_rate),
        data_bits: cli.data_bits.unwrap_or(file.data_bits),
        stop_bits: cli.stop_bits.unwrap_or(file.stop_bits),
        parity: cli.parity.unwrap_or(file.parity),
    };
    validate_serial(&serial)?;

    let relay = RelayOptions {
        ansi: cli.ansi || file.ansi,
        echo: cli.echo || file.echo,
        crlf: cli.crlf || file.crlf,
    };

    Ok(Command::Connect(ConnectConfig { serial, relay }))
}

fn validate_serial(serial: &SerialConfig) -> Result<(), String> {
    if serial.baud_rate == 0 {
        return Err("Baud rate must be greater than zero".to_string());
    }
    if !(5..=8).contains(&serial.data_bits) {
        return Err(format!(
            "Data bits must be between 5 and 8 (got {})",
            serial.data_bits
        ));
    }
    if !(1..=2).contains(&serial.stop_bits) {
        return Err(format!(
            "Stop bits must be 1 or 2 (got {})",
            serial.stop_bits
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
