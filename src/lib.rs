pub mod core;
pub mod models;
pub mod platform;

pub use crate::core::config::{CaptureConfig, ConfigError, FailurePolicy};
pub use crate::core::registry::DisplayRegistry;
pub use crate::core::session::{CaptureSession, SessionState};
pub use crate::core::source::PixelSource;
pub use crate::models::capture::{CaptureError, CaptureResult, DisplayInfo, FrameBuffer, Rect};
pub use crate::models::input::{InputError, InputResult, Key, MouseButton};
pub use crate::platform::input::InputInjector;

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
pub use crate::platform::capture::PlatformSource;
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
pub use crate::platform::input::PlatformInput;

/// Open a capture session on this machine's native backend with the default
/// configuration.
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
pub fn create_session() -> CaptureResult<CaptureSession<PlatformSource>> {
    create_session_with(CaptureConfig::default())
}

/// Open a capture session on this machine's native backend.
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
pub fn create_session_with(config: CaptureConfig) -> CaptureResult<CaptureSession<PlatformSource>> {
    let source = PlatformSource::open(&config)?;
    CaptureSession::with_source(source, config)
}
