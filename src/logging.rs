// src/logging.rs
//
// Timestamped diagnostic logging to stderr.
// Silent unless verbose mode is switched on, since the relay owns the terminal.

use std::sync::atomic::{AtomicBool, Ordering};

/// When `true`, `tlog!` writes to stderr.
pub(crate) static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Turn diagnostic logging on or off for the rest of the process.
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Local time prefix used by `tlog!`.
pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time to every message written to stderr.
/// Lines end in CRLF so they stay aligned while the terminal is in raw mode.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        if $crate::logging::is_verbose() {
            use std::io::Write as _;
            let msg = format!("{} {}", $crate::logging::timestamp(), format_args!($($arg)*));
            let mut stderr = std::io::stderr().lock();
            let _ = write!(stderr, "{}\r\n", msg);
            let _ = stderr.flush();
        }
    }};
}
