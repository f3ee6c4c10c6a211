// src/keys.rs
//
// Platform-neutral key events captured from the local terminal.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys held while a key was pressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CONTROL = 1 << 2;
    }
}

/// Symbolic identity of a non-printable (or specially handled) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    UpArrow,
    DownArrow,
    LeftArrow,
    RightArrow,
    Home,
    End,
    Insert,
    Delete,
    PageUp,
    PageDown,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Spacebar,
    Enter,
}

impl NamedKey {
    /// Function key `F<n>` for `n` in 1..=12.
    pub fn function(n: u8) -> Option<NamedKey> {
        use NamedKey::*;
        const KEYS: [NamedKey; 12] = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12];
        KEYS.get(usize::from(n).checked_sub(1)?).copied()
    }
}

/// One unit of local keyboard input.
///
/// Printable input carries a `character`; everything else carries a `named_key`.
/// Keys such as Enter carry both (`'\r'` plus [`NamedKey::Enter`]) so that the
/// line-ending normalizer can recognise them after encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyEvent {
    pub character: Option<char>,
    pub named_key: Option<NamedKey>,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn char(c: char) -> Self {
        Self {
            character: Some(c),
            ..Self::default()
        }
    }

    pub fn named(key: NamedKey) -> Self {
        Self {
            named_key: Some(key),
            ..Self::default()
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_named_key(mut self, key: NamedKey) -> Self {
        self.named_key = Some(key);
        self
    }

    /// The produced character, treating NUL as "no character".
    pub fn printable(&self) -> Option<char> {
        self.character.filter(|&c| c != '\0')
    }

    pub fn is_enter(&self) -> bool {
        self.named_key == Some(NamedKey::Enter)
    }
}
