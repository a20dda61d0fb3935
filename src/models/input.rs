// Data structures for synthetic input injection

use serde::{Deserialize, Serialize};

/// Mouse button for press/release injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Platform-neutral key identity resolved from a key name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Lowercase ASCII letter `a`-`z`.
    Letter(char),
    /// ASCII digit `0`-`9`.
    Digit(char),
    /// Function key F1-F12.
    Function(u8),
    Enter,
    Tab,
    Space,
    Backspace,
    Escape,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    Shift,
    Control,
    Alt,
    Command,
    CapsLock,
    Minus,
    Equal,
    LeftBracket,
    RightBracket,
    Backslash,
    Semicolon,
    Quote,
    Comma,
    Period,
    Slash,
    Grave,
}

impl Key {
    /// Resolve a key name such as `"a"`, `"7"`, `"enter"`, `"f5"` or `"cmd"`.
    ///
    /// Single characters map to the key that produces them unshifted.
    pub fn from_name(name: &str) -> Option<Key> {
        let lower = name.to_ascii_lowercase();
        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Self::from_char(c);
        }

        if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
            return (1..=12).contains(&n).then_some(Key::Function(n));
        }

        let key = match lower.as_str() {
            "enter" | "return" => Key::Enter,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "backspace" => Key::Backspace,
            "escape" | "esc" => Key::Escape,
            "delete" | "del" => Key::Delete,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "shift" => Key::Shift,
            "control" | "ctrl" => Key::Control,
            "alt" | "option" => Key::Alt,
            "cmd" | "command" | "super" | "win" => Key::Command,
            "capslock" => Key::CapsLock,
            _ => return None,
        };
        Some(key)
    }

    fn from_char(c: char) -> Option<Key> {
        let key = match c {
            'a'..='z' => Key::Letter(c),
            '0'..='9' => Key::Digit(c),
            ' ' => Key::Space,
            '-' => Key::Minus,
            '=' => Key::Equal,
            '[' => Key::LeftBracket,
            ']' => Key::RightBracket,
            '\\' => Key::Backslash,
            ';' => Key::Semicolon,
            '\'' => Key::Quote,
            ',' => Key::Comma,
            '.' => Key::Period,
            '/' => Key::Slash,
            '`' => Key::Grave,
            '\t' => Key::Tab,
            '\n' => Key::Enter,
            _ => return None,
        };
        Some(key)
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self, Key::Shift | Key::Control | Key::Alt | Key::Command)
    }
}

/// Error types for input injection
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Unknown key name: {0}")]
    UnknownKey(String),

    #[error("Input injection unavailable: {0}")]
    Unavailable(String),

    #[error("Input injection failed: {0}")]
    Injection(String),
}

pub type InputResult<T> = Result<T, InputError>;
