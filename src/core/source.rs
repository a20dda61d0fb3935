// Seam between the compositing session and platform capture backends

use crate::core::transform::NativeConvention;
use crate::models::capture::{CaptureResult, DisplayDescriptor, NativeBlock, RawDisplay, Rect};

/// One per-display fetch issued by the session.
///
/// All rectangles are in the backend's native space for `display`.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub display: &'a DisplayDescriptor,
    /// Full bounds of the display.
    pub display_bounds: Rect,
    /// The whole capture rectangle, as passed to [`PixelSource::prepare`].
    pub capture: Rect,
    /// Part of the capture this display covers, already rounded to even
    /// dimensions when the backend asked for it.
    pub region: Rect,
}

/// A platform capture backend.
///
/// The session enumerates displays once, then for each capture call runs
/// `prepare` followed by one `fetch` per intersecting display. Returned blocks
/// borrow the backend's transfer buffer and are consumed before the next
/// fetch.
pub trait PixelSource {
    /// Coordinate convention every rectangle handed to this backend uses.
    fn convention(&self) -> NativeConvention;

    /// Displays as the platform reports them.
    fn enumerate_displays(&mut self) -> CaptureResult<Vec<RawDisplay>>;

    /// Whether fetched regions must have even width and height.
    fn requires_even_dimensions(&self) -> bool {
        false
    }

    /// Acquire or resize per-capture resources for a capture covering
    /// `capture` in native space.
    ///
    /// Failures here should be [`ResourceAcquisition`] errors; the session
    /// aborts the call and invokes [`release`](Self::release).
    ///
    /// [`ResourceAcquisition`]: crate::models::capture::CaptureError::ResourceAcquisition
    fn prepare(&mut self, _capture: Rect) -> CaptureResult<()> {
        Ok(())
    }

    /// Capture the request's region.
    ///
    /// The block's `rect` names the native rectangle it actually covers, which
    /// may be larger than `region`.
    fn fetch(&mut self, request: &FetchRequest<'_>) -> CaptureResult<NativeBlock<'_>>;

    /// Drop cached resources. The next `prepare` recreates them.
    fn release(&mut self);
}
