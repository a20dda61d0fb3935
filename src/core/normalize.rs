// Native pixel layouts to canonical RGBA8

use crate::models::capture::{FrameBuffer, PixelBlock, PixelFormat};

/// Convert one row of native pixels into RGBA.
///
/// `src` and `dst` are walked four bytes at a time; the shorter one bounds the
/// copy. Alpha is always forced opaque.
pub fn normalize_row(src: &[u8], dst: &mut [u8], format: PixelFormat) {
    let pairs = src.chunks_exact(4).zip(dst.chunks_exact_mut(4));
    match format {
        PixelFormat::Argb8 => {
            for (s, d) in pairs {
                d.copy_from_slice(&[s[1], s[2], s[3], 0xFF]);
            }
        }
        PixelFormat::Bgrx8 => {
            for (s, d) in pairs {
                d.copy_from_slice(&[s[2], s[1], s[0], 0xFF]);
            }
        }
        PixelFormat::Rgba8 => {
            for (s, d) in pairs {
                d.copy_from_slice(&[s[0], s[1], s[2], 0xFF]);
            }
        }
    }
}

/// Tightly packed RGBA copy of a whole block.
pub fn normalize(block: &PixelBlock<'_>) -> Vec<u8> {
    let row_len = block.width * 4;
    let mut out = vec![0u8; row_len * block.height];
    for (y, dst) in out.chunks_exact_mut(row_len.max(1)).enumerate().take(block.height) {
        normalize_row(block.row(y), dst, block.format);
    }
    out
}

/// Copy a `width` x `height` window of `block`, starting at block pixel
/// `(src_x, src_y)`, into `frame` at `(dst_x, dst_y)`.
///
/// The window is clipped to both the block and the frame.
#[allow(clippy::too_many_arguments)]
pub fn blit(
    block: &PixelBlock<'_>,
    src_x: usize,
    src_y: usize,
    frame: &mut FrameBuffer,
    dst_x: usize,
    dst_y: usize,
    width: usize,
    height: usize,
) {
    let width = width
        .min(block.width.saturating_sub(src_x))
        .min(frame.width.saturating_sub(dst_x));
    let height = height
        .min(block.height.saturating_sub(src_y))
        .min(frame.height.saturating_sub(dst_y));
    if width == 0 || height == 0 {
        return;
    }

    for row in 0..height {
        let src = &block.row(src_y + row)[src_x * 4..(src_x + width) * 4];
        let dst = &mut frame.row_mut(dst_y + row)[dst_x * 4..(dst_x + width) * 4];
        normalize_row(src, dst, block.format);
    }
}
