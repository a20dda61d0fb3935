// Capture session: owns the backing buffer and drives one backend

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::core::config::{CaptureConfig, FailurePolicy};
use crate::core::normalize;
use crate::core::registry::DisplayRegistry;
use crate::core::source::{FetchRequest, PixelSource};
use crate::core::transform::{round_up_to_even, CoordinateTransformer};
use crate::models::capture::{
    CaptureError, CaptureRequest, CaptureResult, DisplayInfo, FrameBuffer, NativeBlock, Rect,
};

/// Lifecycle of a [`CaptureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Capturing,
    Closed,
}

/// Composites a rectangle of the desktop into one RGBA buffer.
///
/// The session enumerates displays once at construction and keeps a single
/// backing buffer that is reused while the requested size stays the same.
/// It is not meant to be shared between threads; use one session per thread.
pub struct CaptureSession<S: PixelSource> {
    source: Option<S>,
    registry: DisplayRegistry,
    transformer: CoordinateTransformer,
    config: CaptureConfig,
    frame: Option<FrameBuffer>,
    state: SessionState,
}

impl<S: PixelSource> CaptureSession<S> {
    /// Enumerate displays through `source` and take ownership of it.
    pub fn with_source(mut source: S, config: CaptureConfig) -> CaptureResult<Self> {
        let registry = DisplayRegistry::from_raw(source.enumerate_displays()?)?;
        let transformer = CoordinateTransformer::new(source.convention(), &registry);

        debug!(
            displays = registry.len(),
            convention = ?transformer.convention(),
            policy = ?config.failure_policy,
            "capture session ready"
        );

        Ok(Self {
            source: Some(source),
            registry,
            transformer,
            config,
            frame: None,
            state: SessionState::Ready,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn registry(&self) -> &DisplayRegistry {
        &self.registry
    }

    /// Displays in registry order with their unified-space bounds.
    pub fn list_displays(&self) -> CaptureResult<Vec<DisplayInfo>> {
        self.ensure_open()?;
        Ok(self.registry.list())
    }

    /// Capture the unified-space rectangle `(x, y, width, height)`.
    ///
    /// The returned buffer is the session's own and is overwritten by the next
    /// capture; use [`capture_owned`](Self::capture_owned) to keep a snapshot.
    pub fn capture(&mut self, x: i32, y: i32, width: i32, height: i32) -> CaptureResult<&FrameBuffer> {
        self.ensure_open()?;
        let request = CaptureRequest::new(x, y, width, height);
        request.validate()?;

        self.state = SessionState::Capturing;
        let result = self.composite(request.rect());
        self.state = SessionState::Ready;

        if let Err(err) = result {
            if matches!(err, CaptureError::ResourceAcquisition(_)) {
                debug!(error = %err, "dropping cached capture resources");
                if let Some(source) = self.source.as_mut() {
                    source.release();
                }
            }
            return Err(err);
        }

        self.frame.as_ref().ok_or(CaptureError::SessionClosed)
    }

    /// Like [`capture`](Self::capture), but returns an independent copy.
    pub fn capture_owned(&mut self, x: i32, y: i32, width: i32, height: i32) -> CaptureResult<FrameBuffer> {
        self.capture(x, y, width, height).cloned()
    }

    /// Capture the full bounds of the display at `index`.
    pub fn capture_display(&mut self, index: usize) -> CaptureResult<&FrameBuffer> {
        self.ensure_open()?;
        let bounds = self.registry.get(index)?.bounds;
        self.capture(bounds.min_x, bounds.min_y, bounds.width(), bounds.height())
    }

    /// Release the backend and the backing buffer. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.frame = None;
        self.state = SessionState::Closed;
        debug!("capture session closed");
    }

    fn ensure_open(&self) -> CaptureResult<()> {
        match self.state {
            SessionState::Closed => Err(CaptureError::SessionClosed),
            _ => Ok(()),
        }
    }

    fn composite(&mut self, capture: Rect) -> CaptureResult<()> {
        let Self {
            source,
            registry,
            transformer,
            config,
            frame,
            ..
        } = self;
        let source = source.as_mut().ok_or(CaptureError::SessionClosed)?;

        let (width, height) = (capture.width() as usize, capture.height() as usize);
        let frame = match frame.take() {
            Some(mut reused) if reused.has_size(width, height) => {
                reused.fill(config.background);
                frame.insert(reused)
            }
            _ => frame.insert(FrameBuffer::new(width, height, config.background)),
        };

        let capture_native = transformer.to_native(capture, registry.primary().id)?;
        trace!(%capture, native = %capture_native, "starting capture");
        source.prepare(capture_native)?;

        let even = source.requires_even_dimensions();
        let mut captured = 0usize;
        let mut last_error = None;

        for display in registry.displays() {
            let id = display.id;
            let display_bounds = transformer.to_native(display.bounds, display.id)?;
            let capture_in_display = transformer.to_native(capture, display.id)?;
            let intersection = display_bounds.intersect(&capture_in_display);
            if intersection.is_empty() {
                continue;
            }

            // Only this part of the frame belongs to the display, whatever the
            // backend hands back.
            let visible = transformer.from_native(intersection, display.id)?;
            let region = if even {
                round_up_to_even(intersection)
            } else {
                intersection
            };
            trace!(display = %id, %region, "fetching");

            let request = FetchRequest {
                display,
                display_bounds,
                capture: capture_in_display,
                region,
            };
            match source.fetch(&request) {
                Ok(block) => {
                    let covered = transformer.from_native(block.rect, display.id)?;
                    write_block(frame, &block, covered, visible, capture);
                    captured += 1;
                }
                Err(CaptureError::NativeCapture(reason))
                    if config.failure_policy == FailurePolicy::Skip =>
                {
                    warn!(display = %id, %reason, "display capture failed, leaving region blank");
                    last_error = Some(CaptureError::NativeCapture(reason));
                }
                Err(err) => return Err(err),
            }
        }

        if captured == 0 {
            if let Some(err) = last_error {
                return Err(err);
            }
        }

        frame.captured_at = Utc::now();
        Ok(())
    }
}

impl<S: PixelSource> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

// Copy the part of `block` that lies inside `visible` into the frame.
// `covered` is the unified rectangle the whole block spans.
fn write_block(frame: &mut FrameBuffer, block: &NativeBlock<'_>, covered: Rect, visible: Rect, capture: Rect) {
    let copy = covered.intersect(&visible);
    if copy.is_empty() {
        return;
    }
    normalize::blit(
        &block.pixels,
        (copy.min_x - covered.min_x) as usize,
        (copy.min_y - covered.min_y) as usize,
        frame,
        (copy.min_x - capture.min_x) as usize,
        (copy.min_y - capture.min_y) as usize,
        copy.width() as usize,
        copy.height() as usize,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{display, expected, FakeSource};
    use crate::core::transform::NativeConvention;
    use crate::models::capture::{PixelFormat, Point};

    const BLANK: [u8; 4] = [0, 0, 0, 0];

    fn session(source: FakeSource) -> CaptureSession<FakeSource> {
        CaptureSession::with_source(source, CaptureConfig::default()).unwrap()
    }

    /// Check every pixel against the display (tag, unified bounds) that covers it.
    fn assert_frame(frame: &FrameBuffer, capture: Rect, displays: &[(u8, Rect)], background: [u8; 4]) {
        assert_eq!(frame.width, capture.width() as usize);
        assert_eq!(frame.height, capture.height() as usize);
        for row in 0..frame.height {
            for col in 0..frame.width {
                let p = Point::new(capture.min_x + col as i32, capture.min_y + row as i32);
                let want = displays
                    .iter()
                    .find(|(_, bounds)| bounds.contains(p))
                    .map(|(tag, _)| expected(*tag, p.x, p.y))
                    .unwrap_or(background);
                assert_eq!(frame.pixel(col, row), Some(want), "pixel at {:?}", p);
            }
        }
    }

    #[test]
    fn test_no_displays() {
        let source = FakeSource::new(NativeConvention::TopLeft, Vec::new());
        assert!(matches!(
            CaptureSession::with_source(source, CaptureConfig::default()),
            Err(CaptureError::NoDisplaysFound)
        ));
    }

    #[test]
    fn test_list_displays() {
        let session = session(FakeSource::side_by_side());
        assert_eq!(session.state(), SessionState::Ready);

        let displays = session.list_displays().unwrap();
        assert_eq!(displays.len(), 2);
        assert_eq!(displays[0].index, 0);
        assert_eq!(displays[0].bounds, Rect::new(0, 0, 1920, 1080));
        assert_eq!(displays[1].bounds, Rect::new(1920, 0, 3840, 1080));
    }

    #[test]
    fn test_capture_spanning_two_displays() {
        let mut session = session(FakeSource::side_by_side());
        let frame = session.capture(1900, 0, 40, 40).unwrap();

        assert_eq!((frame.width, frame.height, frame.stride), (40, 40, 160));
        assert_eq!(frame.pixel(0, 0), Some(expected(1, 1900, 0)));
        assert_eq!(frame.pixel(19, 39), Some(expected(1, 1919, 39)));
        assert_eq!(frame.pixel(20, 0), Some(expected(2, 1920, 0)));
        assert_eq!(frame.pixel(39, 39), Some(expected(2, 1939, 39)));
    }

    #[test]
    fn test_capture_past_desktop_edge_keeps_fill() {
        let mut session = session(FakeSource::side_by_side());
        let capture = Rect::from_origin_size(-10, 0, 20, 5);
        let frame = session.capture(-10, 0, 20, 5).unwrap();

        assert_frame(frame, capture, &[(1, Rect::new(0, 0, 1920, 1080))], BLANK);
        assert_eq!(frame.pixel(9, 4), Some(BLANK));
        assert_eq!(frame.pixel(10, 0), Some(expected(1, 0, 0)));
    }

    #[test]
    fn test_custom_background() {
        let config = CaptureConfig {
            background: [255, 255, 255, 255],
            ..CaptureConfig::default()
        };
        let mut session = CaptureSession::with_source(FakeSource::side_by_side(), config).unwrap();
        let frame = session.capture(3830, 1070, 20, 20).unwrap();
        assert_eq!(frame.pixel(0, 0), Some(expected(2, 3830, 1070)));
        assert_eq!(frame.pixel(15, 15), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_invalid_dimensions_never_reach_backend() {
        let source = FakeSource::side_by_side();
        let log = source.log();
        let mut session = session(source);

        assert!(matches!(
            session.capture(0, 0, 0, 10),
            Err(CaptureError::InvalidDimensions { width: 0, height: 10 })
        ));
        assert!(matches!(
            session.capture(0, 0, 10, -1),
            Err(CaptureError::InvalidDimensions { .. })
        ));
        assert!(log.borrow().prepares.is_empty());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_far_edge_must_fit_in_i32() {
        let source = FakeSource::side_by_side();
        let log = source.log();
        let mut session = session(source);

        assert!(matches!(
            session.capture(i32::MAX - 5, 0, 10, 10),
            Err(CaptureError::InvalidDimensions { width: 10, height: 10 })
        ));
        assert!(matches!(
            session.capture(0, i32::MAX, 1, 1),
            Err(CaptureError::InvalidDimensions { .. })
        ));
        assert!(log.borrow().prepares.is_empty());

        // Touching i32::MAX is still valid and lies past every display
        let frame = session.capture(i32::MAX - 10, 0, 10, 10).unwrap();
        assert_eq!((frame.width, frame.height), (10, 10));
        assert!(frame.pixels.chunks_exact(4).all(|px| px == &BLANK[..]));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_offset_desktop_rejects_capture_that_overflows_native_space() {
        let source = FakeSource::new(
            NativeConvention::TopLeft,
            vec![
                display(1, Rect::new(1280, 0, 3200, 1080), true),
                display(2, Rect::new(0, 0, 1280, 1024), false),
            ],
        );
        let mut session = session(source);

        assert!(matches!(
            session.capture(i32::MAX - 10, 0, 10, 10),
            Err(CaptureError::InvalidDimensions { .. })
        ));
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.capture(0, 0, 4, 4).is_ok());
    }

    #[test]
    fn test_capture_display_by_index() {
        let source = FakeSource::side_by_side();
        let log = source.log();
        let mut session = session(source);

        assert!(matches!(
            session.capture_display(2),
            Err(CaptureError::DisplayNotFound(2))
        ));
        assert!(log.borrow().prepares.is_empty());

        let frame = session.capture_display(1).unwrap();
        assert_eq!((frame.width, frame.height), (1920, 1080));
        assert_eq!(frame.pixel(0, 0), Some(expected(2, 1920, 0)));
        assert_eq!(frame.pixel(1919, 1079), Some(expected(2, 3839, 1079)));
        assert_eq!(log.borrow().fetches.len(), 1);
    }

    #[test]
    fn test_same_size_reuses_and_clears_buffer() {
        let mut session = session(FakeSource::side_by_side());

        let first = session.capture(1900, 0, 40, 40).unwrap().pixels.as_ptr();
        let frame = session.capture(3830, 0, 40, 40).unwrap();
        assert_eq!(frame.pixels.as_ptr(), first);

        // Columns past the desktop's right edge must not keep the old pixels
        assert_eq!(frame.pixel(9, 0), Some(expected(2, 3839, 0)));
        assert_eq!(frame.pixel(10, 0), Some(BLANK));
        assert_eq!(frame.pixel(39, 39), Some(BLANK));

        let frame = session.capture(0, 0, 8, 8).unwrap();
        assert_eq!((frame.width, frame.height), (8, 8));
    }

    #[test]
    fn test_owned_copy_is_independent() {
        let mut session = session(FakeSource::side_by_side());
        let snapshot = session.capture_owned(0, 0, 4, 4).unwrap();
        session.capture(100, 100, 4, 4).unwrap();

        assert_eq!(snapshot.pixel(0, 0), Some(expected(1, 0, 0)));
        assert_eq!(snapshot.to_image().get_pixel(3, 3).0, expected(1, 3, 3));
    }

    #[test]
    fn test_close_is_terminal_and_idempotent() {
        let source = FakeSource::side_by_side();
        let log = source.log();
        let mut session = session(source);
        session.capture(0, 0, 4, 4).unwrap();

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(log.borrow().releases, 1);
        assert!(log.borrow().dropped);

        assert!(matches!(session.capture(0, 0, 4, 4), Err(CaptureError::SessionClosed)));
        assert!(matches!(session.capture_display(0), Err(CaptureError::SessionClosed)));
        assert!(matches!(session.list_displays(), Err(CaptureError::SessionClosed)));

        session.close();
        assert_eq!(log.borrow().releases, 1);
    }

    #[test]
    fn test_drop_releases_backend() {
        let source = FakeSource::side_by_side();
        let log = source.log();
        drop(session(source));
        assert_eq!(log.borrow().releases, 1);
        assert!(log.borrow().dropped);
    }

    #[test]
    fn test_skip_policy_leaves_failed_display_blank() {
        let source = FakeSource::side_by_side().failing(2);
        let log = source.log();
        let mut session = session(source);

        let frame = session.capture(1900, 0, 40, 40).unwrap();
        assert_eq!(frame.pixel(19, 0), Some(expected(1, 1919, 0)));
        assert_eq!(frame.pixel(20, 0), Some(BLANK));
        assert_eq!(log.borrow().fetches.len(), 2);
    }

    #[test]
    fn test_skip_policy_fails_when_every_display_fails() {
        let mut session = session(FakeSource::side_by_side().failing(2));
        assert!(matches!(
            session.capture(2000, 0, 10, 10),
            Err(CaptureError::NativeCapture(_))
        ));
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.capture(0, 0, 10, 10).is_ok());
    }

    #[test]
    fn test_abort_policy_fails_whole_capture() {
        let config = CaptureConfig {
            failure_policy: FailurePolicy::Abort,
            ..CaptureConfig::default()
        };
        let mut session =
            CaptureSession::with_source(FakeSource::side_by_side().failing(2), config).unwrap();

        assert!(matches!(
            session.capture(1900, 0, 40, 40),
            Err(CaptureError::NativeCapture(_))
        ));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_resource_failure_releases_and_recovers() {
        let source = FakeSource::side_by_side().failing_prepares(1);
        let log = source.log();
        let mut session = session(source);

        assert!(matches!(
            session.capture(0, 0, 10, 10),
            Err(CaptureError::ResourceAcquisition(_))
        ));
        assert_eq!(log.borrow().releases, 1);
        assert!(log.borrow().fetches.is_empty());
        assert_eq!(session.state(), SessionState::Ready);

        let frame = session.capture(0, 0, 10, 10).unwrap();
        assert_eq!(frame.pixel(5, 5), Some(expected(1, 5, 5)));
    }

    #[test]
    fn test_bottom_left_backend_with_even_rounding() {
        let primary = Rect::new(0, 0, 1920, 1080);
        let secondary = Rect::new(1920, 180, 3360, 1080);
        let source = FakeSource::new(
            NativeConvention::BottomLeft,
            vec![display(1, primary, true), display(2, secondary, false)],
        )
        .with_format(PixelFormat::Argb8)
        .with_even_dimensions()
        .with_whole_capture_blocks();
        let log = source.log();
        let mut session = session(source);

        let capture = Rect::from_origin_size(1915, 175, 11, 9);
        let frame = session.capture(1915, 175, 11, 9).unwrap();
        assert_frame(frame, capture, &[(1, primary), (2, secondary)], BLANK);

        let log = log.borrow();
        assert_eq!(log.fetches.len(), 2);
        for (_, region) in &log.fetches {
            assert_eq!(region.width() % 2, 0);
            assert_eq!(region.height() % 2, 0);
        }
        // Capture rectangle flipped about the primary display's height
        assert_eq!(log.prepares, vec![Rect::new(1915, 896, 1926, 905)]);
    }

    #[test]
    fn test_display_local_backend_on_offset_desktop() {
        let primary = Rect::new(500, 300, 1780, 1324);
        let left = Rect::new(-1420, 0, 500, 1080);
        let source = FakeSource::new(
            NativeConvention::DisplayLocal,
            vec![display(7, left, false), display(3, primary, true)],
        )
        .with_format(PixelFormat::Rgba8);
        let mut session = session(source);

        // Unified bounds: primary (0,0)-(1280,1024), left (-1920,-300)-(0,780)
        let capture = Rect::from_origin_size(-6, 770, 12, 16);
        let frame = session.capture(-6, 770, 12, 16).unwrap();
        assert_frame(
            frame,
            capture,
            &[
                (3, Rect::new(0, 0, 1280, 1024)),
                (7, Rect::new(-1920, -300, 0, 780)),
            ],
            BLANK,
        );
    }

    #[test]
    fn test_top_left_backend_on_offset_desktop() {
        let source = FakeSource::new(
            NativeConvention::TopLeft,
            vec![
                display(1, Rect::new(1280, 0, 3200, 1080), true),
                display(2, Rect::new(0, 0, 1280, 1024), false),
            ],
        );
        let mut session = session(source);

        let capture = Rect::from_origin_size(-4, 1020, 8, 8);
        let frame = session.capture(-4, 1020, 8, 8).unwrap();
        assert_frame(
            frame,
            capture,
            &[
                (1, Rect::new(0, 0, 1920, 1080)),
                (2, Rect::new(-1280, 0, 0, 1024)),
            ],
            BLANK,
        );
    }
}
