// Windows capture backend using GDI BitBlt into a cached compatible bitmap

use std::ffi::c_void;

use tracing::{debug, trace};
use windows::Win32::Foundation::{GlobalFree, BOOL, HGLOBAL, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::System::Memory::{GlobalAlloc, GlobalLock, GlobalUnlock, GMEM_MOVEABLE};

use crate::core::config::CaptureConfig;
use crate::core::source::{FetchRequest, PixelSource};
use crate::core::transform::NativeConvention;
use crate::models::capture::{
    CaptureError, CaptureResult, DisplayId, NativeBlock, PixelBlock, PixelFormat, RawDisplay,
    Rect,
};

const MONITORINFOF_PRIMARY: u32 = 1;

/// Windows pixel source.
///
/// Native space is the virtual screen, whose origin is the primary monitor's
/// top-left corner. The screen and memory DCs live as long as the source;
/// the bitmap is sized to the capture rectangle and recreated on resize.
pub struct WindowsPixelSource {
    screen_dc: HDC,
    memory_dc: HDC,
    bitmap: Option<CachedBitmap>,
    buffer: Vec<u8>,
}

struct CachedBitmap {
    handle: HBITMAP,
    width: i32,
    height: i32,
}

impl WindowsPixelSource {
    pub fn open(_config: &CaptureConfig) -> CaptureResult<Self> {
        unsafe {
            let screen_dc = GetDC(None);
            if screen_dc.is_invalid() {
                return Err(CaptureError::ResourceAcquisition(
                    "Failed to get desktop DC".to_string(),
                ));
            }

            let memory_dc = CreateCompatibleDC(screen_dc);
            if memory_dc.is_invalid() {
                let _ = ReleaseDC(None, screen_dc);
                return Err(CaptureError::ResourceAcquisition(
                    "Failed to create compatible DC".to_string(),
                ));
            }

            Ok(Self {
                screen_dc,
                memory_dc,
                bitmap: None,
                buffer: Vec::new(),
            })
        }
    }

    fn delete_bitmap(&mut self) {
        if let Some(bitmap) = self.bitmap.take() {
            unsafe {
                let _ = DeleteObject(bitmap.handle);
            }
        }
    }
}

impl PixelSource for WindowsPixelSource {
    fn convention(&self) -> NativeConvention {
        NativeConvention::TopLeft
    }

    fn enumerate_displays(&mut self) -> CaptureResult<Vec<RawDisplay>> {
        unsafe extern "system" fn collect(
            monitor: HMONITOR,
            _: HDC,
            _: *mut RECT,
            data: LPARAM,
        ) -> BOOL {
            let list = data.0 as *mut Vec<HMONITOR>;
            unsafe { (*list).push(monitor) };
            BOOL(1)
        }

        let mut monitors: Vec<HMONITOR> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(collect),
                LPARAM(&mut monitors as *mut _ as isize),
            );
        }

        let mut displays = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            let mut info = MONITORINFO {
                cbSize: std::mem::size_of::<MONITORINFO>() as u32,
                ..Default::default()
            };
            if !unsafe { GetMonitorInfoW(monitor, &mut info) }.as_bool() {
                debug!(monitor = ?monitor, "GetMonitorInfoW failed, skipping monitor");
                continue;
            }
            let r = info.rcMonitor;
            displays.push(RawDisplay {
                id: DisplayId(monitor.0 as usize as u64),
                bounds: Rect::new(r.left, r.top, r.right, r.bottom),
                is_primary: info.dwFlags & MONITORINFOF_PRIMARY != 0,
            });
        }
        Ok(displays)
    }

    fn prepare(&mut self, capture: Rect) -> CaptureResult<()> {
        let (width, height) = (capture.width(), capture.height());
        if matches!(&self.bitmap, Some(b) if b.width == width && b.height == height) {
            return Ok(());
        }

        self.delete_bitmap();
        let handle = unsafe { CreateCompatibleBitmap(self.screen_dc, width, height) };
        if handle.is_invalid() {
            return Err(CaptureError::ResourceAcquisition(format!(
                "Failed to create {}x{} bitmap",
                width, height
            )));
        }
        debug!(width, height, "created compatible bitmap");
        self.bitmap = Some(CachedBitmap {
            handle,
            width,
            height,
        });
        Ok(())
    }

    fn fetch(&mut self, request: &FetchRequest<'_>) -> CaptureResult<NativeBlock<'_>> {
        let region = request.region;
        let (width, height) = (region.width(), region.height());
        let bitmap = self.bitmap.as_ref().ok_or_else(|| {
            CaptureError::ResourceAcquisition("Bitmap not prepared".to_string())
        })?;
        trace!(display = %request.display.id, %region, "BitBlt");

        unsafe {
            {
                let _selection = Selection::select(self.memory_dc, bitmap.handle)?;
                BitBlt(
                    self.memory_dc,
                    0,
                    0,
                    width,
                    height,
                    self.screen_dc,
                    region.min_x,
                    region.min_y,
                    SRCCOPY,
                )
                .map_err(|e| CaptureError::NativeCapture(format!("BitBlt failed: {}", e)))?;
            }

            // GetDIBits wants the bitmap deselected and a GlobalAlloc'd buffer
            let stride = bitmap.width as usize * 4;
            let len = stride * bitmap.height as usize;
            let memory = GlobalMemory::alloc(len)?;

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: bitmap.width,
                    biHeight: -bitmap.height, // Negative for top-down rows
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0 as u32,
                    ..Default::default()
                },
                ..Default::default()
            };
            let lines = GetDIBits(
                self.screen_dc,
                bitmap.handle,
                0,
                bitmap.height as u32,
                Some(memory.ptr),
                &mut info,
                DIB_RGB_COLORS,
            );
            if lines == 0 {
                return Err(CaptureError::NativeCapture("GetDIBits failed".to_string()));
            }

            self.buffer.clear();
            self.buffer.extend_from_slice(memory.as_slice());
        }

        Ok(NativeBlock {
            rect: Rect::from_origin_size(region.min_x, region.min_y, width, height),
            pixels: PixelBlock::new(
                &self.buffer,
                width as usize,
                height as usize,
                bitmap.width as usize * 4,
                PixelFormat::Bgrx8,
            )?,
        })
    }

    fn release(&mut self) {
        self.delete_bitmap();
        self.buffer = Vec::new();
    }
}

impl Drop for WindowsPixelSource {
    fn drop(&mut self) {
        self.delete_bitmap();
        unsafe {
            let _ = DeleteDC(self.memory_dc);
            let _ = ReleaseDC(None, self.screen_dc);
        }
    }
}

/// Selects a bitmap into a DC, restoring the previous object on drop.
struct Selection {
    dc: HDC,
    previous: HGDIOBJ,
}

impl Selection {
    unsafe fn select(dc: HDC, bitmap: HBITMAP) -> CaptureResult<Self> {
        let previous = SelectObject(dc, bitmap);
        if previous.is_invalid() {
            return Err(CaptureError::ResourceAcquisition(
                "SelectObject failed".to_string(),
            ));
        }
        Ok(Self { dc, previous })
    }
}

impl Drop for Selection {
    fn drop(&mut self) {
        unsafe {
            let _ = SelectObject(self.dc, self.previous);
        }
    }
}

/// Locked movable global allocation, unlocked and freed on drop.
struct GlobalMemory {
    handle: HGLOBAL,
    ptr: *mut c_void,
    len: usize,
}

impl GlobalMemory {
    unsafe fn alloc(len: usize) -> CaptureResult<Self> {
        let handle = GlobalAlloc(GMEM_MOVEABLE, len).map_err(|e| {
            CaptureError::ResourceAcquisition(format!("GlobalAlloc of {} bytes failed: {}", len, e))
        })?;
        let ptr = GlobalLock(handle);
        if ptr.is_null() {
            let _ = GlobalFree(handle);
            return Err(CaptureError::ResourceAcquisition("GlobalLock failed".to_string()));
        }
        Ok(Self { handle, ptr, len })
    }

    fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr as *const u8, self.len) }
    }
}

impl Drop for GlobalMemory {
    fn drop(&mut self) {
        unsafe {
            let _ = GlobalUnlock(self.handle);
            let _ = GlobalFree(self.handle);
        }
    }
}
