// macOS capture backend drawing each display into one persistent bitmap context

use core_graphics::base::kCGImageAlphaNoneSkipFirst;
use core_graphics::color_space::{kCGColorSpaceSRGB, CGColorSpace};
use core_graphics::context::CGContext;
use core_graphics::display::{CGDirectDisplayID, CGDisplay};
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use tracing::{debug, trace};

use crate::core::config::CaptureConfig;
use crate::core::source::{FetchRequest, PixelSource};
use crate::core::transform::{flip_to_display_local, NativeConvention};
use crate::models::capture::{
    CaptureError, CaptureResult, DisplayId, NativeBlock, PixelBlock, PixelFormat, RawDisplay,
    Rect,
};

/// macOS pixel source.
///
/// Native space is Quartz global space flipped to a bottom-left origin. Every
/// display intersecting a capture is drawn into the same sRGB bitmap context
/// sized to the capture rectangle, so each fetch hands back the whole
/// context.
pub struct MacOSPixelSource {
    color_space: Option<CGColorSpace>,
    context: Option<BitmapContext>,
}

struct BitmapContext {
    context: CGContext,
    width: usize,
    height: usize,
}

impl MacOSPixelSource {
    pub fn open(_config: &CaptureConfig) -> CaptureResult<Self> {
        Ok(Self {
            color_space: None,
            context: None,
        })
    }

    fn color_space(&mut self) -> CaptureResult<&CGColorSpace> {
        if self.color_space.is_none() {
            let space = unsafe { CGColorSpace::create_with_name(kCGColorSpaceSRGB) }.ok_or_else(|| {
                CaptureError::ResourceAcquisition("Failed to create sRGB color space".to_string())
            })?;
            self.color_space = Some(space);
        }
        self.color_space
            .as_ref()
            .ok_or_else(|| CaptureError::ResourceAcquisition("Color space missing".to_string()))
    }
}

impl PixelSource for MacOSPixelSource {
    fn convention(&self) -> NativeConvention {
        NativeConvention::BottomLeft
    }

    fn enumerate_displays(&mut self) -> CaptureResult<Vec<RawDisplay>> {
        let ids = CGDisplay::active_displays().map_err(|code| {
            CaptureError::ResourceAcquisition(format!(
                "Failed to get display list, error code: {}",
                code
            ))
        })?;
        let main_id = CGDisplay::main().id;

        Ok(ids
            .into_iter()
            .map(|id| {
                let bounds = CGDisplay::new(id).bounds();
                RawDisplay {
                    id: DisplayId(id.into()),
                    bounds: Rect::from_origin_size(
                        bounds.origin.x as i32,
                        bounds.origin.y as i32,
                        bounds.size.width as i32,
                        bounds.size.height as i32,
                    ),
                    is_primary: id == main_id,
                }
            })
            .collect())
    }

    // CGDisplayCreateImageForRect rejects some odd-sized rectangles
    fn requires_even_dimensions(&self) -> bool {
        true
    }

    fn prepare(&mut self, capture: Rect) -> CaptureResult<()> {
        let (width, height) = (capture.width() as usize, capture.height() as usize);
        if matches!(&self.context, Some(c) if c.width == width && c.height == height) {
            return Ok(());
        }

        let space = self.color_space()?;
        let context = CGContext::create_bitmap_context(
            None,
            width,
            height,
            8,
            width * 4,
            space,
            kCGImageAlphaNoneSkipFirst,
        );
        debug!(width, height, "created bitmap context");
        self.context = Some(BitmapContext {
            context,
            width,
            height,
        });
        Ok(())
    }

    fn fetch(&mut self, request: &FetchRequest<'_>) -> CaptureResult<NativeBlock<'_>> {
        let region = request.region;
        let local = flip_to_display_local(region, request.display_bounds);
        trace!(display = %request.display.id, %region, %local, "CGDisplayCreateImageForRect");

        let display = CGDisplay::new(request.display.id.0 as CGDirectDisplayID);
        let image = display.image_for_rect(cg_rect(local)).ok_or_else(|| {
            CaptureError::NativeCapture(format!(
                "Failed to capture display {}. Check screen recording permissions.",
                request.display.id
            ))
        })?;

        let bitmap = self.context.as_mut().ok_or_else(|| {
            CaptureError::ResourceAcquisition("Bitmap context not prepared".to_string())
        })?;
        // Both rectangles share the bottom-left orientation of the context
        let target = region.translate(-request.capture.min_x, -request.capture.min_y);
        bitmap.context.draw_image(cg_rect(target), &image);

        let (width, height) = (bitmap.width, bitmap.height);
        let stride = bitmap.context.bytes_per_row();
        let data: &[u8] = bitmap.context.data();
        Ok(NativeBlock {
            rect: request.capture,
            pixels: PixelBlock::new(data, width, height, stride, PixelFormat::Argb8)?,
        })
    }

    fn release(&mut self) {
        self.context = None;
        self.color_space = None;
    }
}

fn cg_rect(rect: Rect) -> CGRect {
    CGRect::new(
        &CGPoint::new(rect.min_x as f64, rect.min_y as f64),
        &CGSize::new(rect.width() as f64, rect.height() as f64),
    )
}
