// In-memory PixelSource for exercising the session without a display server

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::source::{FetchRequest, PixelSource};
use crate::core::transform::NativeConvention;
use crate::models::capture::{
    CaptureError, CaptureResult, DisplayDescriptor, DisplayId, NativeBlock, PixelBlock,
    PixelFormat, Point, RawDisplay, Rect,
};

/// Bytes the fake writes outside the requested region.
pub const GARBAGE: u8 = 0xEE;

/// Bytes of padding after every row, to exercise stride handling.
const ROW_PADDING: usize = 8;

/// Calls observed by a [`FakeSource`], shared with the test that built it.
#[derive(Debug, Default)]
pub struct FakeLog {
    pub prepares: Vec<Rect>,
    pub fetches: Vec<(DisplayId, Rect)>,
    pub releases: usize,
    pub dropped: bool,
}

/// Fake backend whose pixels encode where they came from.
///
/// Each pixel normalizes to `[tag, x, y, 255]` where `tag` is the low byte of
/// the display id and `(x, y)` are its unified coordinates truncated to `u8`.
pub struct FakeSource {
    convention: NativeConvention,
    format: PixelFormat,
    displays: Vec<RawDisplay>,
    origin: Point,
    primary_height: i32,
    even: bool,
    whole_capture_blocks: bool,
    failing: Vec<DisplayId>,
    failing_prepares: usize,
    log: Rc<RefCell<FakeLog>>,
    buffer: Vec<u8>,
}

impl FakeSource {
    /// `displays` use top-left global coordinates, as a backend reports them.
    pub fn new(convention: NativeConvention, displays: Vec<RawDisplay>) -> Self {
        let primary = displays
            .iter()
            .find(|d| d.is_primary)
            .or(displays.first())
            .map(|d| d.bounds)
            .unwrap_or_default();
        Self {
            convention,
            format: PixelFormat::Bgrx8,
            displays,
            origin: primary.min(),
            primary_height: primary.height(),
            even: false,
            whole_capture_blocks: false,
            failing: Vec::new(),
            failing_prepares: 0,
            log: Rc::new(RefCell::new(FakeLog::default())),
            buffer: Vec::new(),
        }
    }

    /// Primary at (0,0)-(1920,1080), secondary at (1920,0)-(3840,1080).
    pub fn side_by_side() -> Self {
        Self::new(
            NativeConvention::TopLeft,
            vec![
                display(1, Rect::new(0, 0, 1920, 1080), true),
                display(2, Rect::new(1920, 0, 3840, 1080), false),
            ],
        )
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_even_dimensions(mut self) -> Self {
        self.even = true;
        self
    }

    /// Return the whole capture rectangle from every fetch, the way a
    /// backend that accumulates into one context does.
    pub fn with_whole_capture_blocks(mut self) -> Self {
        self.whole_capture_blocks = true;
        self
    }

    pub fn failing(mut self, id: u64) -> Self {
        self.failing.push(DisplayId(id));
        self
    }

    pub fn failing_prepares(mut self, count: usize) -> Self {
        self.failing_prepares = count;
        self
    }

    pub fn log(&self) -> Rc<RefCell<FakeLog>> {
        Rc::clone(&self.log)
    }

    fn to_unified(&self, rect: Rect, display: &DisplayDescriptor) -> Rect {
        match self.convention {
            NativeConvention::TopLeft => rect.translate(-self.origin.x, -self.origin.y),
            NativeConvention::BottomLeft => Rect::new(
                rect.min_x,
                self.primary_height - rect.max_y,
                rect.max_x,
                self.primary_height - rect.min_y,
            ),
            NativeConvention::DisplayLocal => {
                rect.translate(display.bounds.min_x, display.bounds.min_y)
            }
        }
    }

    fn encode(&self, tag: u8, x: i32, y: i32) -> [u8; 4] {
        let (x, y) = (x as u8, y as u8);
        match self.format {
            PixelFormat::Bgrx8 => [y, x, tag, 0x00],
            PixelFormat::Argb8 => [0x00, tag, x, y],
            PixelFormat::Rgba8 => [tag, x, y, 0x10],
        }
    }
}

/// What the session should produce for a pixel fetched from display `tag`.
pub fn expected(tag: u8, x: i32, y: i32) -> [u8; 4] {
    [tag, x as u8, y as u8, 0xFF]
}

pub fn display(id: u64, bounds: Rect, is_primary: bool) -> RawDisplay {
    RawDisplay {
        id: DisplayId(id),
        bounds,
        is_primary,
    }
}

impl PixelSource for FakeSource {
    fn convention(&self) -> NativeConvention {
        self.convention
    }

    fn enumerate_displays(&mut self) -> CaptureResult<Vec<RawDisplay>> {
        Ok(self.displays.clone())
    }

    fn requires_even_dimensions(&self) -> bool {
        self.even
    }

    fn prepare(&mut self, capture: Rect) -> CaptureResult<()> {
        self.log.borrow_mut().prepares.push(capture);
        if self.failing_prepares > 0 {
            self.failing_prepares -= 1;
            return Err(CaptureError::ResourceAcquisition(
                "fake context unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn fetch(&mut self, request: &FetchRequest<'_>) -> CaptureResult<NativeBlock<'_>> {
        let id = request.display.id;
        self.log.borrow_mut().fetches.push((id, request.region));
        if self.failing.contains(&id) {
            return Err(CaptureError::NativeCapture(format!("fake display {} failed", id)));
        }

        let rect = if self.whole_capture_blocks {
            request.capture
        } else {
            request.region
        };
        let covered = self.to_unified(rect, request.display);
        let wanted = self.to_unified(request.region, request.display);
        let (width, height) = (rect.width() as usize, rect.height() as usize);
        let stride = width * 4 + ROW_PADDING;

        let mut buffer = vec![GARBAGE; stride * height];
        for row in 0..height {
            for col in 0..width {
                let p = Point::new(covered.min_x + col as i32, covered.min_y + row as i32);
                let px = if wanted.contains(p) {
                    self.encode(id.0 as u8, p.x, p.y)
                } else {
                    [GARBAGE; 4]
                };
                let i = row * stride + col * 4;
                buffer[i..i + 4].copy_from_slice(&px);
            }
        }
        self.buffer = buffer;

        Ok(NativeBlock {
            rect,
            pixels: PixelBlock::new(&self.buffer, width, height, stride, self.format)?,
        })
    }

    fn release(&mut self) {
        self.buffer = Vec::new();
        self.log.borrow_mut().releases += 1;
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.log.borrow_mut().dropped = true;
    }
}
