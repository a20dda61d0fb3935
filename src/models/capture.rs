// Data structures for desktop capture

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque platform handle for a display (xinerama screen index, HMONITOR,
/// CGDirectDisplayID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayId(pub u64);

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Integer point in some coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, half-open on the max edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Rect {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Rectangle from an origin and a size.
    pub const fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub const fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub const fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    pub const fn min(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    /// Zero or negative area.
    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Overlap of two rectangles. The result may be empty.
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        )
    }

    pub const fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.min_x + dx, self.min_y + dy, self.max_x + dx, self.max_y + dy)
    }

    /// [`translate`](Self::translate) that returns `None` on overflow.
    pub fn checked_translate(&self, dx: i32, dy: i32) -> Option<Rect> {
        Some(Rect::new(
            self.min_x.checked_add(dx)?,
            self.min_y.checked_add(dy)?,
            self.max_x.checked_add(dx)?,
            self.max_y.checked_add(dy)?,
        ))
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x < self.max_x && p.y >= self.min_y && p.y < self.max_y
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})-({},{}) [{}x{}]",
            self.min_x,
            self.min_y,
            self.max_x,
            self.max_y,
            self.width(),
            self.height()
        )
    }
}

/// A physical display and its bounds in unified space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDescriptor {
    pub id: DisplayId,
    pub bounds: Rect,
}

/// What `list_displays` hands back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub index: usize,
    pub bounds: Rect,
}

/// A display as reported by a backend, before the registry anchors it.
///
/// `bounds` are in the platform's global desktop coordinates with a top-left
/// origin and y increasing downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDisplay {
    pub id: DisplayId,
    pub bounds: Rect,
    pub is_primary: bool,
}

/// Requested capture rectangle in unified space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CaptureRequest {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Sizes must be positive and the far edges must fit in `i32`.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.width <= 0
            || self.height <= 0
            || self.x.checked_add(self.width).is_none()
            || self.y.checked_add(self.height).is_none()
        {
            return Err(CaptureError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub const fn rect(&self) -> Rect {
        Rect::from_origin_size(self.x, self.y, self.width, self.height)
    }
}

/// Byte layout of one native 32-bit pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Alpha (or padding) first, then red, green, blue.
    Argb8,
    /// Blue, green, red, then one padding or alpha byte.
    Bgrx8,
    /// Canonical output layout.
    Rgba8,
}

/// Borrowed view over a block of native pixels, row-major and top-down.
///
/// `stride` may exceed `width * 4` when the platform pads rows.
#[derive(Debug, Clone, Copy)]
pub struct PixelBlock<'a> {
    pub data: &'a [u8],
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub format: PixelFormat,
}

impl<'a> PixelBlock<'a> {
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        stride: usize,
        format: PixelFormat,
    ) -> CaptureResult<Self> {
        let needed = if height == 0 { 0 } else { stride * (height - 1) + width * 4 };
        if stride < width * 4 || data.len() < needed {
            return Err(CaptureError::NativeCapture(format!(
                "pixel block too small: {} bytes for {}x{} with stride {}",
                data.len(),
                width,
                height,
                stride
            )));
        }
        Ok(Self { data, width, height, stride, format })
    }

    /// The `width * 4` meaningful bytes of row `y`.
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width * 4]
    }
}

/// A fetched pixel block and the native-space rectangle it covers.
#[derive(Debug, Clone, Copy)]
pub struct NativeBlock<'a> {
    pub rect: Rect,
    pub pixels: PixelBlock<'a>,
}

/// Composited RGBA8 capture result.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub pixels: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl FrameBuffer {
    /// Allocate a buffer filled with `fill`.
    pub fn new(width: usize, height: usize, fill: [u8; 4]) -> Self {
        let mut frame = Self {
            width,
            height,
            stride: width * 4,
            pixels: vec![0; width * height * 4],
            captured_at: Utc::now(),
        };
        frame.fill(fill);
        frame
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn has_size(&self, width: usize, height: usize) -> bool {
        self.width == width && self.height == height
    }

    /// RGBA value at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y * self.stride + x * 4;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[i..i + 4]);
        Some(px)
    }

    /// Mutable bytes of row `y`, `width * 4` long.
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        let len = self.width * 4;
        &mut self.pixels[start..start + len]
    }

    /// Independent copy as an `image` buffer.
    pub fn to_image(&self) -> image::RgbaImage {
        let mut out = image::RgbaImage::new(self.width as u32, self.height as u32);
        for (y, row) in out.rows_mut().enumerate() {
            let start = y * self.stride;
            let src = &self.pixels[start..start + self.width * 4];
            for (dst, px) in row.zip(src.chunks_exact(4)) {
                dst.0.copy_from_slice(px);
            }
        }
        out
    }
}

/// Error types for capture operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No active displays found")]
    NoDisplaysFound,

    #[error("Invalid capture dimensions: {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("Display not found: {0}")]
    DisplayNotFound(usize),

    #[error("Unknown display: {0}")]
    UnknownDisplay(DisplayId),

    #[error("Resource acquisition failed: {0}")]
    ResourceAcquisition(String),

    #[error("Native capture failed: {0}")]
    NativeCapture(String),

    #[error("Capture session is closed")]
    SessionClosed,
}

pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0, 0, 1920, 1080);
        let b = Rect::from_origin_size(1900, 0, 40, 40);
        assert_eq!(a.intersect(&b), Rect::new(1900, 0, 1920, 40));

        let c = Rect::new(1920, 0, 3840, 1080);
        assert!(a.intersect(&c).is_empty(), "Touching edges do not overlap");
    }

    #[test]
    fn test_capture_request_validation() {
        assert!(CaptureRequest::new(0, 0, 1, 1).validate().is_ok());
        assert!(matches!(
            CaptureRequest::new(0, 0, 0, 10).validate(),
            Err(CaptureError::InvalidDimensions { width: 0, height: 10 })
        ));
        assert!(matches!(
            CaptureRequest::new(0, 0, 10, -3).validate(),
            Err(CaptureError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_pixel_block_rejects_short_data() {
        let data = vec![0u8; 30];
        assert!(PixelBlock::new(&data, 2, 4, 8, PixelFormat::Bgrx8).is_err());
        // Last row only needs width * 4 bytes, not a full stride.
        let data = vec![0u8; 8 * 3 + 4];
        assert!(PixelBlock::new(&data, 1, 4, 8, PixelFormat::Bgrx8).is_ok());
    }

    #[test]
    fn test_frame_buffer_to_image() {
        let mut frame = FrameBuffer::new(3, 2, [0, 0, 0, 0]);
        frame.row_mut(1)[4..8].copy_from_slice(&[1, 2, 3, 255]);

        let image = frame.to_image();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(1, 1).0, [1, 2, 3, 255]);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(frame.pixel(1, 1), Some([1, 2, 3, 255]));
        assert_eq!(frame.pixel(3, 0), None);
    }
}
