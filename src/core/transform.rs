// Conversions between unified space and each backend's native space

use std::collections::HashMap;

use crate::core::registry::DisplayRegistry;
use crate::models::capture::{CaptureResult, CaptureError, DisplayId, Point, Rect};

/// Coordinate convention a backend expects its regions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeConvention {
    /// Global desktop coordinates, top-left origin, y down. Differs from
    /// unified space only by the primary display's desktop origin.
    TopLeft,
    /// Global coordinates with a bottom-left origin and y up, flipped about
    /// the primary display's height.
    BottomLeft,
    /// Top-left origin local to each display, y down.
    DisplayLocal,
}

/// Pure mapping between unified space and one backend's native space.
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    convention: NativeConvention,
    origin: Point,
    primary_height: i32,
    bounds: HashMap<DisplayId, Rect>,
}

impl CoordinateTransformer {
    pub fn new(convention: NativeConvention, registry: &DisplayRegistry) -> Self {
        Self {
            convention,
            origin: registry.desktop_origin(),
            primary_height: registry.primary().bounds.height(),
            bounds: registry
                .displays()
                .iter()
                .map(|d| (d.id, d.bounds))
                .collect(),
        }
    }

    pub fn convention(&self) -> NativeConvention {
        self.convention
    }

    /// Map a unified-space rectangle into `display`'s native space.
    pub fn to_native(&self, rect: Rect, display: DisplayId) -> CaptureResult<Rect> {
        let bounds = self.display_bounds(display)?;
        let native = match self.convention {
            NativeConvention::TopLeft => rect.checked_translate(self.origin.x, self.origin.y),
            NativeConvention::BottomLeft => flip_y(rect, self.primary_height),
            NativeConvention::DisplayLocal => shift_back(rect, bounds.min()),
        };
        native.ok_or_else(|| out_of_range(rect))
    }

    /// Inverse of [`to_native`](Self::to_native).
    pub fn from_native(&self, rect: Rect, display: DisplayId) -> CaptureResult<Rect> {
        let bounds = self.display_bounds(display)?;
        let unified = match self.convention {
            NativeConvention::TopLeft => shift_back(rect, self.origin),
            NativeConvention::BottomLeft => flip_y(rect, self.primary_height),
            NativeConvention::DisplayLocal => rect.checked_translate(bounds.min_x, bounds.min_y),
        };
        unified.ok_or_else(|| out_of_range(rect))
    }

    fn display_bounds(&self, display: DisplayId) -> CaptureResult<Rect> {
        self.bounds
            .get(&display)
            .copied()
            .ok_or(CaptureError::UnknownDisplay(display))
    }
}

// Mirror about the horizontal line y = height / 2. Self-inverse.
fn flip_y(rect: Rect, height: i32) -> Option<Rect> {
    Some(Rect::new(
        rect.min_x,
        height.checked_sub(rect.max_y)?,
        rect.max_x,
        height.checked_sub(rect.min_y)?,
    ))
}

fn shift_back(rect: Rect, by: Point) -> Option<Rect> {
    rect.checked_translate(by.x.checked_neg()?, by.y.checked_neg()?)
}

// Coordinates that no longer fit in i32 after conversion
fn out_of_range(rect: Rect) -> CaptureError {
    CaptureError::InvalidDimensions {
        width: rect.width(),
        height: rect.height(),
    }
}

/// Grow odd widths and heights by one unit on the max edge.
///
/// Some native capture calls fail on odd sizes; the extra row or column is
/// dropped again when the block is clipped into the frame.
pub fn round_up_to_even(rect: Rect) -> Rect {
    let mut out = rect;
    if rect.width() % 2 != 0 {
        out.max_x += 1;
    }
    if rect.height() % 2 != 0 {
        out.max_y += 1;
    }
    out
}

/// Convert a region in bottom-left global coordinates into top-left
/// coordinates local to the display whose bottom-left global bounds are
/// `display`.
pub fn flip_to_display_local(region: Rect, display: Rect) -> Rect {
    let top = display.max_y - region.max_y;
    Rect::from_origin_size(
        region.min_x - display.min_x,
        top,
        region.width(),
        region.height(),
    )
}
