// X11 capture backend: MIT-SHM transfer with an inline GetImage fallback

use tracing::{debug, trace};
use x11rb::connection::Connection;
use x11rb::protocol::shm::{self, ConnectionExt as _};
use x11rb::protocol::xinerama::ConnectionExt as _;
use x11rb::protocol::xproto::{ConnectionExt as _, ImageFormat, Window};
use x11rb::rust_connection::RustConnection;

use crate::core::config::CaptureConfig;
use crate::core::source::{FetchRequest, PixelSource};
use crate::core::transform::NativeConvention;
use crate::models::capture::{
    CaptureError, CaptureResult, DisplayId, NativeBlock, PixelBlock, PixelFormat, RawDisplay,
    Rect,
};

/// How pixels travel from the X server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// GetImage into a SysV shared-memory segment attached to the server.
    SharedMemory,
    /// Plain GetImage with the pixels inline in the reply.
    Inline,
}

/// X11 pixel source.
///
/// Works in root-window coordinates, which share unified space's axes but
/// are offset by the first Xinerama screen's origin. The transfer mode is
/// decided once when the backend opens.
pub struct LinuxPixelSource {
    conn: RustConnection,
    root: Window,
    root_size: (u16, u16),
    transfer: Transfer,
    buffer: Vec<u8>,
}

impl LinuxPixelSource {
    /// Connect to the X server named by `DISPLAY`.
    pub fn open(config: &CaptureConfig) -> CaptureResult<Self> {
        if std::env::var_os("DISPLAY").is_none() {
            return Err(CaptureError::ResourceAcquisition(
                "DISPLAY is not set. An X11 server (or XWayland) is required".to_string(),
            ));
        }

        let (conn, screen_num) = x11rb::connect(None).map_err(|e| {
            CaptureError::ResourceAcquisition(format!("Failed to connect to X server: {}", e))
        })?;
        let screen = conn.setup().roots.get(screen_num).ok_or_else(|| {
            CaptureError::ResourceAcquisition(format!("X server has no screen {}", screen_num))
        })?;
        let root = screen.root;
        let root_size = (screen.width_in_pixels, screen.height_in_pixels);

        let transfer = if config.use_shared_memory {
            negotiate_shared_memory(&conn)
        } else {
            Transfer::Inline
        };
        debug!(?transfer, root, "X11 capture backend ready");

        Ok(Self {
            conn,
            root,
            root_size,
            transfer,
            buffer: Vec::new(),
        })
    }

    pub fn transfer(&self) -> Transfer {
        self.transfer
    }

    fn fetch_shared(&mut self, geometry: Geometry) -> CaptureResult<()> {
        let segment = ShmSegment::create(geometry.byte_len())?;
        let attachment = ShmAttachment::attach(&self.conn, &segment)?;

        let reply = self
            .conn
            .shm_get_image(
                self.root,
                geometry.x,
                geometry.y,
                geometry.width,
                geometry.height,
                !0,
                u8::from(ImageFormat::Z_PIXMAP),
                attachment.seg,
                0,
            )
            .map_err(native_error)?
            .reply()
            .map_err(native_error)?;
        check_depth(reply.depth)?;

        self.buffer.clear();
        self.buffer.extend_from_slice(segment.as_slice());
        Ok(())
    }

    fn fetch_inline(&mut self, geometry: Geometry) -> CaptureResult<()> {
        let reply = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                self.root,
                geometry.x,
                geometry.y,
                geometry.width,
                geometry.height,
                !0,
            )
            .map_err(native_error)?
            .reply()
            .map_err(native_error)?;
        check_depth(reply.depth)?;

        self.buffer = reply.data;
        Ok(())
    }
}

impl PixelSource for LinuxPixelSource {
    fn convention(&self) -> NativeConvention {
        NativeConvention::TopLeft
    }

    fn enumerate_displays(&mut self) -> CaptureResult<Vec<RawDisplay>> {
        let screens = match self.conn.xinerama_query_screens() {
            Ok(cookie) => cookie.reply().map(|r| r.screen_info).unwrap_or_else(|e| {
                debug!(error = %e, "Xinerama query failed");
                Vec::new()
            }),
            Err(e) => {
                debug!(error = %e, "Xinerama unavailable");
                Vec::new()
            }
        };

        if screens.is_empty() {
            // Without Xinerama the root window is the only display
            let (width, height) = self.root_size;
            return Ok(vec![RawDisplay {
                id: DisplayId(0),
                bounds: Rect::from_origin_size(0, 0, width.into(), height.into()),
                is_primary: true,
            }]);
        }

        Ok(screens
            .iter()
            .enumerate()
            .map(|(index, s)| RawDisplay {
                id: DisplayId(index as u64),
                bounds: Rect::from_origin_size(
                    s.x_org.into(),
                    s.y_org.into(),
                    s.width.into(),
                    s.height.into(),
                ),
                is_primary: index == 0,
            })
            .collect())
    }

    fn fetch(&mut self, request: &FetchRequest<'_>) -> CaptureResult<NativeBlock<'_>> {
        let geometry = Geometry::from_rect(request.region)?;
        trace!(display = %request.display.id, ?geometry, transfer = ?self.transfer, "GetImage");

        match self.transfer {
            Transfer::SharedMemory => self.fetch_shared(geometry)?,
            Transfer::Inline => self.fetch_inline(geometry)?,
        }

        let (width, height) = (geometry.width as usize, geometry.height as usize);
        Ok(NativeBlock {
            rect: request.region,
            pixels: PixelBlock::new(&self.buffer, width, height, width * 4, PixelFormat::Bgrx8)?,
        })
    }

    fn release(&mut self) {
        self.buffer = Vec::new();
    }
}

fn negotiate_shared_memory(conn: &RustConnection) -> Transfer {
    let version = conn
        .shm_query_version()
        .map_err(|e| e.to_string())
        .and_then(|cookie| cookie.reply().map_err(|e| e.to_string()));

    match version {
        Ok(v) => {
            debug!(major = v.major_version, minor = v.minor_version, "MIT-SHM available");
            Transfer::SharedMemory
        }
        Err(reason) => {
            debug!(%reason, "MIT-SHM unavailable, using inline transfer for this session");
            Transfer::Inline
        }
    }
}

fn native_error(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::NativeCapture(format!("X11 GetImage failed: {}", e))
}

// ZPixmap at depth 24 or 32 is four bytes per pixel in B, G, R, pad order
fn check_depth(depth: u8) -> CaptureResult<()> {
    match depth {
        24 | 32 => Ok(()),
        other => Err(CaptureError::NativeCapture(format!(
            "Unsupported X11 visual depth: {}",
            other
        ))),
    }
}

/// Region in the integer widths the X protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    x: i16,
    y: i16,
    width: u16,
    height: u16,
}

impl Geometry {
    fn from_rect(rect: Rect) -> CaptureResult<Self> {
        let out_of_range =
            || CaptureError::NativeCapture(format!("Region {} exceeds X11 coordinate range", rect));
        Ok(Self {
            x: i16::try_from(rect.min_x).map_err(|_| out_of_range())?,
            y: i16::try_from(rect.min_y).map_err(|_| out_of_range())?,
            width: u16::try_from(rect.width()).map_err(|_| out_of_range())?,
            height: u16::try_from(rect.height()).map_err(|_| out_of_range())?,
        })
    }

    fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// SysV shared-memory segment, detached and removed on drop.
struct ShmSegment {
    id: libc::c_int,
    addr: *mut libc::c_void,
    len: usize,
}

impl ShmSegment {
    fn create(len: usize) -> CaptureResult<Self> {
        unsafe {
            let id = libc::shmget(libc::IPC_PRIVATE, len, libc::IPC_CREAT | 0o600);
            if id < 0 {
                return Err(CaptureError::ResourceAcquisition(format!(
                    "shmget of {} bytes failed: {}",
                    len,
                    std::io::Error::last_os_error()
                )));
            }

            let addr = libc::shmat(id, std::ptr::null(), 0);
            if addr as isize == -1 {
                let err = std::io::Error::last_os_error();
                libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut());
                return Err(CaptureError::ResourceAcquisition(format!("shmat failed: {}", err)));
            }

            Ok(Self { id, addr, len })
        }
    }

    fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.addr as *const u8, self.len) }
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        unsafe {
            libc::shmdt(self.addr);
            libc::shmctl(self.id, libc::IPC_RMID, std::ptr::null_mut());
        }
    }
}

/// Server-side attachment of a segment, detached on drop.
struct ShmAttachment<'c> {
    conn: &'c RustConnection,
    seg: shm::Seg,
}

impl<'c> ShmAttachment<'c> {
    fn attach(conn: &'c RustConnection, segment: &ShmSegment) -> CaptureResult<Self> {
        let resource = |e: &dyn std::fmt::Display| {
            CaptureError::ResourceAcquisition(format!("MIT-SHM attach failed: {}", e))
        };
        let seg = conn.generate_id().map_err(|e| resource(&e))?;
        conn.shm_attach(seg, segment.id as u32, false)
            .map_err(|e| resource(&e))?
            .check()
            .map_err(|e| resource(&e))?;
        Ok(Self { conn, seg })
    }
}

impl Drop for ShmAttachment<'_> {
    fn drop(&mut self) {
        if let Ok(cookie) = self.conn.shm_detach(self.seg) {
            cookie.ignore_error();
        }
        let _ = self.conn.flush();
    }
}
