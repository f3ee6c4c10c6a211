// src/io/console.rs
//
// Local terminal side of the relay.
// Reads key events (or raw bytes when stdin is redirected), owns the shared
// stdout sink, and puts the terminal back the way it was found on exit.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::tty::IsTty;
use crossterm::{cursor, execute, terminal};

use crate::keys::{KeyEvent, Modifiers, NamedKey};

/// How long a key-event wait lasts before the outbound pump gets a chance to
/// check whether the session has ended.
pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Size of one redirected-stdin read.
const STDIN_CHUNK: usize = 1024;

/// Description of the key that ends an interactive session.
pub const EXIT_KEY_HINT: &str = "Ctrl+]";

// ============================================================================
// Input
// ============================================================================

/// One fetch from the local side.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalInput {
    /// Interactive key press
    Key(KeyEvent),
    /// Raw bytes from redirected stdin, forwarded untouched
    Bytes(Vec<u8>),
    /// Nothing arrived within the poll interval
    Idle,
    /// Local input is finished (stdin EOF or the exit key)
    Eof,
}

/// Source of local input for the outbound pump.
pub trait InputSource: Send {
    fn next_input(&mut self) -> io::Result<LocalInput>;
}

/// Where [`ConsoleInput`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// stdin is a terminal: read key events
    Interactive,
    /// stdin is a file or pipe: read bytes
    Redirected,
}

/// Process stdin as an [`InputSource`].
pub struct ConsoleInput {
    mode: InputMode,
    buf: Vec<u8>,
}

impl ConsoleInput {
    pub fn new(mode: InputMode) -> Self {
        Self {
            mode,
            buf: vec![0u8; STDIN_CHUNK],
        }
    }

    /// Interactive when stdin is a terminal, redirected otherwise.
    pub fn detect() -> Self {
        let mode = if io::stdin().is_tty() {
            InputMode::Interactive
        } else {
            InputMode::Redirected
        };
        Self::new(mode)
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }
}

impl InputSource for ConsoleInput {
    fn next_input(&mut self) -> io::Result<LocalInput> {
        match self.mode {
            InputMode::Interactive => {
                if !event::poll(INPUT_POLL_INTERVAL)? {
                    return Ok(LocalInput::Idle);
                }
                match event::read()? {
                    Event::Key(key) => Ok(translate_key(&key)),
                    _ => Ok(LocalInput::Idle),
                }
            }
            InputMode::Redirected => {
                let n = io::stdin().lock().read(&mut self.buf)?;
                if n == 0 {
                    Ok(LocalInput::Eof)
                } else {
                    Ok(LocalInput::Bytes(self.buf[..n].to_vec()))
                }
            }
        }
    }
}

// ============================================================================
// Key Translation
// ============================================================================

fn to_modifiers(m: KeyModifiers) -> Modifiers {
    let mut out = Modifiers::empty();
    if m.contains(KeyModifiers::SHIFT) {
        out |= Modifiers::SHIFT;
    }
    if m.contains(KeyModifiers::ALT) {
        out |= Modifiers::ALT;
    }
    if m.contains(KeyModifiers::CONTROL) {
        out |= Modifiers::CONTROL;
    }
    out
}

/// Ctrl without Alt. Windows reports AltGr as Ctrl+Alt, and the character it
/// carries is already the one the layout produced.
fn is_ctrl_chord(modifiers: KeyModifiers) -> bool {
    modifiers.contains(KeyModifiers::CONTROL) && !modifiers.contains(KeyModifiers::ALT)
}

/// Ctrl+] on any platform. Unix terminals deliver 0x1D, which crossterm reports as Ctrl+5.
fn is_exit_key(key: &event::KeyEvent) -> bool {
    is_ctrl_chord(key.modifiers) && matches!(key.code, KeyCode::Char(']') | KeyCode::Char('5'))
}

/// Control code for Ctrl+`c`, if `c` has one.
fn control_code(c: char) -> Option<char> {
    let code = match c {
        'a'..='z' => c as u8 - b'a' + 1,
        'A'..='Z' => c as u8 - b'A' + 1,
        '[' | '3' => 0x1B,
        '\\' | '4' => 0x1C,
        ']' | '5' => 0x1D,
        '^' | '6' => 0x1E,
        '_' | '7' => 0x1F,
        _ => return None,
    };
    Some(code as char)
}

/// Map a crossterm key event onto our [`KeyEvent`].
///
/// Release events are ignored. The exit key becomes [`LocalInput::Eof`].
pub fn translate_key(key: &event::KeyEvent) -> LocalInput {
    if key.kind == KeyEventKind::Release {
        return LocalInput::Idle;
    }
    if is_exit_key(key) {
        return LocalInput::Eof;
    }

    let modifiers = to_modifiers(key.modifiers);
    let ctrl = is_ctrl_chord(key.modifiers);

    let ev = match key.code {
        // Ctrl+Space / Ctrl+@ produce no character
        KeyCode::Char(' ') | KeyCode::Char('@') | KeyCode::Char('2') if ctrl => {
            KeyEvent::named(NamedKey::Spacebar)
        }
        KeyCode::Null => KeyEvent::named(NamedKey::Spacebar),
        KeyCode::Char(' ') => KeyEvent::char(' ').with_named_key(NamedKey::Spacebar),
        KeyCode::Char(c) if ctrl => KeyEvent::char(control_code(c).unwrap_or(c)),
        KeyCode::Char(c) => KeyEvent::char(c),
        KeyCode::Enter => KeyEvent::char('\r').with_named_key(NamedKey::Enter),
        KeyCode::Tab | KeyCode::BackTab => KeyEvent::char('\t'),
        KeyCode::Backspace => KeyEvent::char('\x08'),
        KeyCode::Esc => KeyEvent::char('\x1b'),
        KeyCode::Up => KeyEvent::named(NamedKey::UpArrow),
        KeyCode::Down => KeyEvent::named(NamedKey::DownArrow),
        KeyCode::Left => KeyEvent::named(NamedKey::LeftArrow),
        KeyCode::Right => KeyEvent::named(NamedKey::RightArrow),
        KeyCode::Home => KeyEvent::named(NamedKey::Home),
        KeyCode::End => KeyEvent::named(NamedKey::End),
        KeyCode::Insert => KeyEvent::named(NamedKey::Insert),
        KeyCode::Delete => KeyEvent::named(NamedKey::Delete),
        KeyCode::PageUp => KeyEvent::named(NamedKey::PageUp),
        KeyCode::PageDown => KeyEvent::named(NamedKey::PageDown),
        KeyCode::F(n) => match NamedKey::function(n) {
            Some(f) => KeyEvent::named(f),
            None => KeyEvent::default(),
        },
        _ => KeyEvent::default(),
    };

    let modifiers = if matches!(key.code, KeyCode::Null) {
        Modifiers::CONTROL
    } else {
        modifiers
    };

    LocalInput::Key(ev.with_modifiers(modifiers))
}

// ============================================================================
// Output
// ============================================================================

/// Local output shared by both pumps. Each frame is written and flushed under
/// one lock so frames from the two pumps never interleave mid-frame.
#[derive(Clone)]
pub struct LocalOutput {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LocalOutput {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn write_frame(&self, bytes: &[u8]) -> io::Result<()> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "output mutex poisoned"))?;
        sink.write_all(bytes)?;
        sink.flush()
    }
}

// ============================================================================
// Terminal Mode
// ============================================================================

/// Raw mode for the lifetime of the guard. Dropping it restores the terminal.
pub struct TerminalGuard {
    raw_mode: bool,
}

impl TerminalGuard {
    /// Enter raw mode when `interactive`; otherwise the guard only restores
    /// cursor visibility on drop.
    pub fn enter(interactive: bool) -> Result<Self, String> {
        if interactive {
            terminal::enable_raw_mode()
                .map_err(|e| format!("Failed to enable raw mode: {}", e))?;
            tlog!("[console] Raw mode enabled");
        }
        Ok(Self {
            raw_mode: interactive,
        })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
        if self.raw_mode {
            tlog!("[console] Terminal restored");
        }
    }
}

/// Leave raw mode and show the cursor. Safe to call more than once.
pub fn restore_terminal() {
    let _ = terminal::disable_raw_mode();
    let mut stdout = io::stdout();
    if stdout.is_tty() {
        let _ = execute!(stdout, cursor::Show);
    }
}

/// Restore the terminal before the default panic message is printed.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore_terminal();
        previous(info);
    }));
}

/// Let the Windows console interpret the escape sequences the remote sends.
#[cfg(target_os = "windows")]
pub fn enable_virtual_terminal_output() -> Result<(), String> {
    use windows_sys::Win32::System::Console::{
        GetConsoleMode, GetStdHandle, SetConsoleMode, CONSOLE_MODE, DISABLE_NEWLINE_AUTO_RETURN,
        ENABLE_VIRTUAL_TERMINAL_PROCESSING, STD_OUTPUT_HANDLE,
    };

    unsafe {
        let handle = GetStdHandle(STD_OUTPUT_HANDLE);
        let mut mode: CONSOLE_MODE = 0;
        if GetConsoleMode(handle, &mut mode) == 0 {
            return Err(format!(
                "GetConsoleMode failed: {}",
                io::Error::last_os_error()
            ));
        }
        mode |= ENABLE_VIRTUAL_TERMINAL_PROCESSING | DISABLE_NEWLINE_AUTO_RETURN;
        if SetConsoleMode(handle, mode) == 0 {
            return Err(format!(
                "SetConsoleMode failed: {}",
                io::Error::last_os_error()
            ));
        }
    }
    Ok(())
}

/// Other platforms' terminals already interpret escape sequences.
#[cfg(not(target_os = "windows"))]
pub fn enable_virtual_terminal_output() -> Result<(), String> {
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
