// Platform-specific pixel sources
// Each platform module implements core::source::PixelSource; exactly one is compiled in

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "macos")]
pub use macos::MacOSPixelSource as PlatformSource;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "windows")]
pub use windows::WindowsPixelSource as PlatformSource;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::LinuxPixelSource as PlatformSource;
