// CGEvent input injection

use core_graphics::display::CGDisplay;
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTapLocation, CGEventType, CGKeyCode, CGMouseButton,
    ScrollEventUnit,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use tracing::trace;

use super::InputInjector;
use crate::models::input::{InputError, InputResult, Key, MouseButton};

/// Posts events to the session event tap, stamping key events with the
/// modifiers currently held down through this injector.
pub struct MacOSInput {
    modifiers: CGEventFlags,
}

impl MacOSInput {
    pub fn new() -> InputResult<Self> {
        Ok(Self {
            modifiers: CGEventFlags::empty(),
        })
    }

    fn source() -> InputResult<CGEventSource> {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| InputError::Unavailable("Failed to create event source".to_string()))
    }

    fn cursor_position() -> InputResult<CGPoint> {
        CGEvent::new(Self::source()?)
            .map(|event| event.location())
            .map_err(|_| InputError::Injection("Failed to read cursor position".to_string()))
    }
}

impl InputInjector for MacOSInput {
    fn move_cursor(&mut self, x: i32, y: i32) -> InputResult<()> {
        CGDisplay::warp_mouse_cursor_position(CGPoint::new(x as f64, y as f64))
            .map_err(|code| InputError::Injection(format!("Cannot move cursor: {}", code)))
    }

    fn toggle_button(&mut self, button: MouseButton, down: bool) -> InputResult<()> {
        let (event_type, cg_button) = match (button, down) {
            (MouseButton::Left, true) => (CGEventType::LeftMouseDown, CGMouseButton::Left),
            (MouseButton::Left, false) => (CGEventType::LeftMouseUp, CGMouseButton::Left),
            (MouseButton::Right, true) => (CGEventType::RightMouseDown, CGMouseButton::Right),
            (MouseButton::Right, false) => (CGEventType::RightMouseUp, CGMouseButton::Right),
            (MouseButton::Middle, true) => (CGEventType::OtherMouseDown, CGMouseButton::Center),
            (MouseButton::Middle, false) => (CGEventType::OtherMouseUp, CGMouseButton::Center),
        };

        let position = Self::cursor_position()?;
        let event = CGEvent::new_mouse_event(Self::source()?, event_type, position, cg_button)
            .map_err(|_| InputError::Injection(format!("Failed to create {:?} event", button)))?;
        event.post(CGEventTapLocation::Session);
        Ok(())
    }

    fn toggle(&mut self, key: Key, down: bool) -> InputResult<()> {
        let code = key_code(key)
            .ok_or_else(|| InputError::Injection(format!("No key code mapped for {:?}", key)))?;
        let event = CGEvent::new_keyboard_event(Self::source()?, code, down)
            .map_err(|_| InputError::Injection(format!("Failed to create {:?} event", key)))?;
        if !self.modifiers.is_empty() {
            event.set_flags(self.modifiers);
        }
        trace!(?key, code, down, "posting key event");
        event.post(CGEventTapLocation::Session);

        if let Some(flag) = modifier_flag(key) {
            self.modifiers.set(flag, down);
        }
        Ok(())
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> InputResult<()> {
        let event = CGEvent::new_scroll_event(Self::source()?, ScrollEventUnit::LINE, 2, dy, dx, 0)
            .map_err(|_| InputError::Injection("Failed to create scroll event".to_string()))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

fn modifier_flag(key: Key) -> Option<CGEventFlags> {
    match key {
        Key::Shift => Some(CGEventFlags::CGEventFlagShift),
        Key::Control => Some(CGEventFlags::CGEventFlagControl),
        Key::Alt => Some(CGEventFlags::CGEventFlagAlternate),
        Key::Command => Some(CGEventFlags::CGEventFlagCommand),
        _ => None,
    }
}

/// ANSI virtual key code for a key.
fn key_code(key: Key) -> Option<CGKeyCode> {
    let code = match key {
        Key::Letter(c) => match c {
            'a' => 0x00,
            's' => 0x01,
            'd' => 0x02,
            'f' => 0x03,
            'h' => 0x04,
            'g' => 0x05,
            'z' => 0x06,
            'x' => 0x07,
            'c' => 0x08,
            'v' => 0x09,
            'b' => 0x0B,
            'q' => 0x0C,
            'w' => 0x0D,
            'e' => 0x0E,
            'r' => 0x0F,
            'y' => 0x10,
            't' => 0x11,
            'o' => 0x1F,
            'u' => 0x20,
            'i' => 0x22,
            'p' => 0x23,
            'l' => 0x25,
            'j' => 0x26,
            'k' => 0x28,
            'n' => 0x2D,
            'm' => 0x2E,
            _ => return None,
        },
        Key::Digit(c) => match c {
            '1' => 0x12,
            '2' => 0x13,
            '3' => 0x14,
            '4' => 0x15,
            '6' => 0x16,
            '5' => 0x17,
            '9' => 0x19,
            '7' => 0x1A,
            '8' => 0x1C,
            '0' => 0x1D,
            _ => return None,
        },
        Key::Function(n) => match n {
            1 => 0x7A,
            2 => 0x78,
            3 => 0x63,
            4 => 0x76,
            5 => 0x60,
            6 => 0x61,
            7 => 0x62,
            8 => 0x64,
            9 => 0x65,
            10 => 0x6D,
            11 => 0x67,
            12 => 0x6F,
            _ => return None,
        },
        Key::Enter => 0x24,
        Key::Tab => 0x30,
        Key::Space => 0x31,
        Key::Backspace => 0x33,
        Key::Escape => 0x35,
        Key::Delete => 0x75,
        Key::Home => 0x73,
        Key::End => 0x77,
        Key::PageUp => 0x74,
        Key::PageDown => 0x79,
        Key::Left => 0x7B,
        Key::Right => 0x7C,
        Key::Down => 0x7D,
        Key::Up => 0x7E,
        Key::Shift => 0x38,
        Key::Control => 0x3B,
        Key::Alt => 0x3A,
        Key::Command => 0x37,
        Key::CapsLock => 0x39,
        Key::Minus => 0x1B,
        Key::Equal => 0x18,
        Key::LeftBracket => 0x21,
        Key::RightBracket => 0x1E,
        Key::Backslash => 0x2A,
        Key::Semicolon => 0x29,
        Key::Quote => 0x27,
        Key::Comma => 0x2B,
        Key::Period => 0x2F,
        Key::Slash => 0x2C,
        Key::Grave => 0x32,
    };
    Some(code)
}
