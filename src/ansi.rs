// src/ansi.rs
//
// Key event to outbound byte encoding.
// Maps named keys to the escape sequences a remote VT-style terminal expects,
// and appends line feeds after Enter when CRLF mode is on.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::keys::{KeyEvent, Modifiers, NamedKey};

const NUL: u8 = 0x00;
const ESC: u8 = 0x1B;
const LBK: u8 = b'[';
const LF: u8 = b'\n';

/// Bytes produced for one key event.
pub type OutputFrame = Vec<u8>;

// ============================================================================
// Escape Sequence Table
// ============================================================================

/// Immutable mapping from (key, modifiers) to the bytes sent for that key.
#[derive(Debug)]
pub struct EscapeSequenceTable {
    entries: HashMap<(NamedKey, Modifiers), &'static [u8]>,
}

impl EscapeSequenceTable {
    pub fn new() -> Self {
        use NamedKey::*;

        let none = Modifiers::empty();
        let ctrl = Modifiers::CONTROL;

        let entries: [((NamedKey, Modifiers), &'static [u8]); 27] = [
            // arrows, home, end
            ((UpArrow, none), &[ESC, LBK, b'A']),
            ((DownArrow, none), &[ESC, LBK, b'B']),
            ((RightArrow, none), &[ESC, LBK, b'C']),
            ((LeftArrow, none), &[ESC, LBK, b'D']),
            ((Home, none), &[ESC, LBK, b'H']),
            ((End, none), &[ESC, LBK, b'F']),
            // ctrl+arrows
            ((UpArrow, ctrl), &[ESC, LBK, b'1', b';', b'5', b'A']),
            ((DownArrow, ctrl), &[ESC, LBK, b'1', b';', b'5', b'B']),
            ((RightArrow, ctrl), &[ESC, LBK, b'1', b';', b'5', b'C']),
            ((LeftArrow, ctrl), &[ESC, LBK, b'1', b';', b'5', b'D']),
            // ctrl+space
            ((Spacebar, ctrl), &[NUL]),
            // editing block
            ((Insert, none), &[ESC, LBK, b'2', b'~']),
            ((Delete, none), &[ESC, LBK, b'3', b'~']),
            ((PageUp, none), &[ESC, LBK, b'5', b'~']),
            ((PageDown, none), &[ESC, LBK, b'6', b'~']),
            // F1-F4 use the SS3 style final bytes, F5-F12 the VT220 tilde codes
            ((F1, none), &[b'O', b'P']),
            ((F2, none), &[b'O', b'Q']),
            ((F3, none), &[b'O', b'R']),
            ((F4, none), &[b'O', b'S']),
            ((F5, none), &[ESC, LBK, b'1', b'5', b'~']),
            ((F6, none), &[ESC, LBK, b'1', b'7', b'~']),
            ((F7, none), &[ESC, LBK, b'1', b'8', b'~']),
            ((F8, none), &[ESC, LBK, b'1', b'9', b'~']),
            ((F9, none), &[ESC, LBK, b'2', b'0', b'~']),
            ((F10, none), &[ESC, LBK, b'2', b'1', b'~']),
            ((F11, none), &[ESC, LBK, b'2', b'3', b'~']),
            ((F12, none), &[ESC, LBK, b'2', b'4', b'~']),
        ];

        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Sequence for `key` with exactly `modifiers` held. Misses are empty.
    pub fn lookup(&self, key: NamedKey, modifiers: Modifiers) -> &'static [u8] {
        self.entries.get(&(key, modifiers)).copied().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EscapeSequenceTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide table, built on first use.
pub static ESCAPE_SEQUENCES: Lazy<EscapeSequenceTable> = Lazy::new(EscapeSequenceTable::new);

// ============================================================================
// Encoding
// ============================================================================

/// Single byte sent for a typed character. Characters outside ASCII become `?`.
fn char_byte(c: char) -> u8 {
    if c.is_ascii() {
        c as u8
    } else {
        b'?'
    }
}

/// Encode a key event with escape-sequence translation.
///
/// A printable character is sent as one byte. Otherwise the named key is looked
/// up in [`ESCAPE_SEQUENCES`]; unmapped keys produce an empty frame.
pub fn encode(event: &KeyEvent) -> OutputFrame {
    if let Some(c) = event.printable() {
        return vec![char_byte(c)];
    }

    match event.named_key {
        Some(key) => ESCAPE_SEQUENCES.lookup(key, event.modifiers).to_vec(),
        None => Vec::new(),
    }
}

/// Encode a key event without translation: only the raw character is sent.
///
/// Named keys that do not produce a character are dropped.
pub fn raw_character(event: &KeyEvent) -> OutputFrame {
    match event.printable() {
        Some(c) => vec![char_byte(c)],
        None => Vec::new(),
    }
}

/// Append a line feed after Enter when CRLF mode is on.
pub fn normalize(mut frame: OutputFrame, event: &KeyEvent, crlf_enabled: bool) -> OutputFrame {
    if crlf_enabled && event.is_enter() {
        frame.push(LF);
    }
    frame
}

// ============================================================================
// Tests
// ============================================================================
