// XTest input injection

use std::os::raw::{c_int, c_uint};

use tracing::trace;
use x11::keysym::*;
use x11::{xlib, xtest};

use super::InputInjector;
use crate::models::input::{InputError, InputResult, Key, MouseButton};

pub struct LinuxInput {
    display: *mut xlib::Display,
    root: xlib::Window,
}

impl LinuxInput {
    pub fn new() -> InputResult<Self> {
        unsafe {
            let display = xlib::XOpenDisplay(std::ptr::null());
            if display.is_null() {
                return Err(InputError::Unavailable(
                    "Failed to open X display".to_string(),
                ));
            }

            let (mut event_base, mut error_base, mut major, mut minor) = (0, 0, 0, 0);
            if xtest::XTestQueryExtension(
                display,
                &mut event_base,
                &mut error_base,
                &mut major,
                &mut minor,
            ) == 0
            {
                xlib::XCloseDisplay(display);
                return Err(InputError::Unavailable(
                    "XTEST extension not available".to_string(),
                ));
            }

            let root = xlib::XDefaultRootWindow(display);
            Ok(Self { display, root })
        }
    }

    fn click(&mut self, button: c_uint, count: i32) -> InputResult<()> {
        for _ in 0..count {
            for down in [true, false] {
                let ok = unsafe {
                    xtest::XTestFakeButtonEvent(self.display, button, bool_arg(down), xlib::CurrentTime)
                };
                if ok == 0 {
                    return Err(InputError::Injection(format!(
                        "XTestFakeButtonEvent failed for button {}",
                        button
                    )));
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) {
        unsafe {
            xlib::XFlush(self.display);
        }
    }
}

impl InputInjector for LinuxInput {
    fn move_cursor(&mut self, x: i32, y: i32) -> InputResult<()> {
        unsafe {
            xlib::XWarpPointer(self.display, 0, self.root, 0, 0, 0, 0, x, y);
        }
        self.flush();
        Ok(())
    }

    fn toggle_button(&mut self, button: MouseButton, down: bool) -> InputResult<()> {
        let ok = unsafe {
            xtest::XTestFakeButtonEvent(
                self.display,
                button_number(button),
                bool_arg(down),
                xlib::CurrentTime,
            )
        };
        self.flush();
        if ok == 0 {
            return Err(InputError::Injection(format!("XTestFakeButtonEvent failed for {:?}", button)));
        }
        Ok(())
    }

    fn toggle(&mut self, key: Key, down: bool) -> InputResult<()> {
        let keycode = unsafe { xlib::XKeysymToKeycode(self.display, keysym(key) as xlib::KeySym) };
        if keycode == 0 {
            return Err(InputError::Injection(format!("No keycode mapped for {:?}", key)));
        }
        trace!(?key, keycode, down, "XTestFakeKeyEvent");

        let ok = unsafe {
            xtest::XTestFakeKeyEvent(self.display, keycode as c_uint, bool_arg(down), xlib::CurrentTime)
        };
        self.flush();
        if ok == 0 {
            return Err(InputError::Injection(format!("XTestFakeKeyEvent failed for {:?}", key)));
        }
        Ok(())
    }

    // Buttons 4/5 scroll up/down and 6/7 scroll left/right
    fn scroll(&mut self, dx: i32, dy: i32) -> InputResult<()> {
        let result = self
            .click(scroll_button(dx, 7, 6), dx.saturating_abs())
            .and_then(|()| self.click(scroll_button(dy, 4, 5), dy.saturating_abs()));
        self.flush();
        result
    }
}

impl Drop for LinuxInput {
    fn drop(&mut self) {
        unsafe {
            xlib::XCloseDisplay(self.display);
        }
    }
}

fn bool_arg(value: bool) -> c_int {
    if value {
        xlib::True
    } else {
        xlib::False
    }
}

fn scroll_button(delta: i32, positive: c_uint, negative: c_uint) -> c_uint {
    if delta > 0 {
        positive
    } else {
        negative
    }
}

fn button_number(button: MouseButton) -> c_uint {
    match button {
        MouseButton::Left => 1,
        MouseButton::Middle => 2,
        MouseButton::Right => 3,
    }
}

/// X keysym for a key. Printable ASCII keysyms equal their character code.
fn keysym(key: Key) -> c_uint {
    match key {
        Key::Letter(c) | Key::Digit(c) => c as c_uint,
        Key::Function(n) => XK_F1 + c_uint::from(n.saturating_sub(1)),
        Key::Enter => XK_Return,
        Key::Tab => XK_Tab,
        Key::Space => XK_space,
        Key::Backspace => XK_BackSpace,
        Key::Escape => XK_Escape,
        Key::Delete => XK_Delete,
        Key::Home => XK_Home,
        Key::End => XK_End,
        Key::PageUp => XK_Page_Up,
        Key::PageDown => XK_Page_Down,
        Key::Up => XK_Up,
        Key::Down => XK_Down,
        Key::Left => XK_Left,
        Key::Right => XK_Right,
        Key::Shift => XK_Shift_L,
        Key::Control => XK_Control_L,
        Key::Alt => XK_Alt_L,
        Key::Command => XK_Super_L,
        Key::CapsLock => XK_Caps_Lock,
        Key::Minus => XK_minus,
        Key::Equal => XK_equal,
        Key::LeftBracket => XK_bracketleft,
        Key::RightBracket => XK_bracketright,
        Key::Backslash => XK_backslash,
        Key::Semicolon => XK_semicolon,
        Key::Quote => XK_apostrophe,
        Key::Comma => XK_comma,
        Key::Period => XK_period,
        Key::Slash => XK_slash,
        Key::Grave => XK_grave,
    }
}
