// SendInput injection

use tracing::trace;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP,
    MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

use super::InputInjector;
use crate::models::input::{InputError, InputResult, Key, MouseButton};

const WHEEL_DELTA: i32 = 120;

pub struct WindowsInput;

impl WindowsInput {
    pub fn new() -> InputResult<Self> {
        Ok(Self)
    }
}

impl InputInjector for WindowsInput {
    fn move_cursor(&mut self, x: i32, y: i32) -> InputResult<()> {
        unsafe { SetCursorPos(x, y) }
            .map_err(|e| InputError::Injection(format!("SetCursorPos failed: {}", e)))
    }

    fn toggle_button(&mut self, button: MouseButton, down: bool) -> InputResult<()> {
        let flags = match (button, down) {
            (MouseButton::Left, true) => MOUSEEVENTF_LEFTDOWN,
            (MouseButton::Left, false) => MOUSEEVENTF_LEFTUP,
            (MouseButton::Right, true) => MOUSEEVENTF_RIGHTDOWN,
            (MouseButton::Right, false) => MOUSEEVENTF_RIGHTUP,
            (MouseButton::Middle, true) => MOUSEEVENTF_MIDDLEDOWN,
            (MouseButton::Middle, false) => MOUSEEVENTF_MIDDLEUP,
        };
        send(&[mouse_input(flags, 0)])
    }

    fn toggle(&mut self, key: Key, down: bool) -> InputResult<()> {
        let vk = virtual_key(key);
        trace!(?key, vk, down, "SendInput key");
        let flags = if down {
            KEYBD_EVENT_FLAGS(0)
        } else {
            KEYEVENTF_KEYUP
        };
        send(&[INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }])
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> InputResult<()> {
        let mut inputs = Vec::with_capacity(2);
        if dy != 0 {
            inputs.push(mouse_input(MOUSEEVENTF_WHEEL, (dy * WHEEL_DELTA) as u32));
        }
        if dx != 0 {
            inputs.push(mouse_input(MOUSEEVENTF_HWHEEL, (dx * WHEEL_DELTA) as u32));
        }
        if inputs.is_empty() {
            return Ok(());
        }
        send(&inputs)
    }
}

fn mouse_input(flags: MOUSE_EVENT_FLAGS, data: u32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: data,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> InputResult<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(InputError::Injection(format!(
            "SendInput injected {} of {} events: {}",
            sent,
            inputs.len(),
            windows::core::Error::from_win32()
        )));
    }
    Ok(())
}

/// Windows virtual-key code for a key.
fn virtual_key(key: Key) -> u16 {
    match key {
        Key::Letter(c) => c.to_ascii_uppercase() as u16,
        Key::Digit(c) => c as u16,
        Key::Function(n) => 0x70 + u16::from(n.saturating_sub(1)),
        Key::Enter => 0x0D,
        Key::Tab => 0x09,
        Key::Space => 0x20,
        Key::Backspace => 0x08,
        Key::Escape => 0x1B,
        Key::Delete => 0x2E,
        Key::Home => 0x24,
        Key::End => 0x23,
        Key::PageUp => 0x21,
        Key::PageDown => 0x22,
        Key::Up => 0x26,
        Key::Down => 0x28,
        Key::Left => 0x25,
        Key::Right => 0x27,
        Key::Shift => 0x10,
        Key::Control => 0x11,
        Key::Alt => 0x12,
        Key::Command => 0x5B,
        Key::CapsLock => 0x14,
        Key::Minus => 0xBD,
        Key::Equal => 0xBB,
        Key::LeftBracket => 0xDB,
        Key::RightBracket => 0xDD,
        Key::Backslash => 0xDC,
        Key::Semicolon => 0xBA,
        Key::Quote => 0xDE,
        Key::Comma => 0xBC,
        Key::Period => 0xBE,
        Key::Slash => 0xBF,
        Key::Grave => 0xC0,
    }
}
