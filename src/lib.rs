#[macro_use]
mod logging;

pub mod ansi;
pub mod config;
pub mod io;
pub mod keys;
pub mod relay;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use crate::config::{Cli, Command, ConnectConfig, FileConfig};
use crate::io::console::{self, ConsoleInput, InputMode, LocalOutput, TerminalGuard};
use crate::io::serial::{format_port_listing, list_serial_ports, resolve_port_name, SerialPortTransport};
use crate::relay::RelaySession;

pub use logging::set_verbose;

// ============================================================================
// Entry Point
// ============================================================================

/// Parse arguments and run. Only startup failures give a non-zero status;
/// a session that ends for any reason is a normal exit.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    set_verbose(cli.verbose);

    match run_cli(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("potty: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: &Cli) -> Result<(), String> {
    let file = load_defaults(cli)?;
    match config::resolve(cli, &file)? {
        Command::ListPorts => list_ports(),
        Command::Connect(connect_config) => connect(connect_config),
    }
}

/// An explicit `--config` must exist; the default location is optional.
fn load_defaults(cli: &Cli) -> Result<FileConfig, String> {
    match &cli.config {
        Some(path) => {
            if !path.exists() {
                return Err(format!("Config file not found: {}", path.display()));
            }
            config::load_file_config(path)
        }
        None => match config::default_config_path() {
            Some(path) => config::load_file_config(&path),
            None => Ok(FileConfig::default()),
        },
    }
}

// ============================================================================
// Commands
// ============================================================================

fn list_ports() -> Result<(), String> {
    let ports = list_serial_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for line in format_port_listing(&ports) {
        println!("{}", line);
    }
    Ok(())
}

fn connect(mut config: ConnectConfig) -> Result<(), String> {
    // A numeric --port is an index into the listing
    if config.serial.port.parse::<usize>().is_ok() {
        let ports = list_serial_ports()?;
        config.serial.port = resolve_port_name(&config.serial.port, &ports)?;
    }

    if let Err(e) = console::enable_virtual_terminal_output() {
        tlog!("[console] Escape sequence output not enabled: {}", e);
    }

    let transport = Arc::new(SerialPortTransport::open(&config.serial)?);

    let input = ConsoleInput::detect();
    let interactive = input.mode() == InputMode::Interactive;

    eprintln!(
        "Connected to {} at {}.{}",
        config.serial.port,
        config.serial.line_summary(),
        if interactive {
            format!(" Press {} to exit.", console::EXIT_KEY_HINT)
        } else {
            String::new()
        }
    );

    console::install_panic_hook();
    let guard = TerminalGuard::enter(interactive)?;

    let session = RelaySession::new(transport, config.relay);
    let result = relay::run(session, input, LocalOutput::stdout());

    drop(guard);

    let summary = result?;
    eprintln!("\nDisconnected: {}", summary.reason);
    Ok(())
}
