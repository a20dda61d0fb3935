// Synthetic keyboard and mouse input
// Coordinates are the platform's global desktop coordinates, which match
// unified space whenever the primary display sits at the desktop origin.

use crate::models::input::{InputError, InputResult, Key, MouseButton};

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "macos")]
pub use macos::MacOSInput as PlatformInput;

#[cfg(target_os = "windows")]
pub mod windows;
#[cfg(target_os = "windows")]
pub use windows::WindowsInput as PlatformInput;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxInput as PlatformInput;

/// Injects one input event per call, synchronously.
pub trait InputInjector {
    fn move_cursor(&mut self, x: i32, y: i32) -> InputResult<()>;

    fn toggle_button(&mut self, button: MouseButton, down: bool) -> InputResult<()>;

    /// Press or release an already resolved key.
    fn toggle(&mut self, key: Key, down: bool) -> InputResult<()>;

    /// Scroll by `dx` columns and `dy` lines. Positive `dy` scrolls up and
    /// positive `dx` scrolls right.
    fn scroll(&mut self, dx: i32, dy: i32) -> InputResult<()>;

    /// Press or release the key named `key_name` (see [`Key::from_name`]).
    fn toggle_key(&mut self, key_name: &str, down: bool) -> InputResult<()> {
        let key = Key::from_name(key_name)
            .ok_or_else(|| InputError::UnknownKey(key_name.to_string()))?;
        self.toggle(key, down)
    }
}
