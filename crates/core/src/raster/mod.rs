//! Rasterisation of interpreted pages.
//!
//! - `pixmap`: the output [`PixelBuffer`]
//! - `path`: curve flattening
//! - `fill`: scanline fill and clip masks
//! - `stroke`: stroke outlining (joins, caps, dashes)
//! - `image`: image sampling
//! - `device`: [`RasterDevice`], the sink tying them together

pub mod device;
mod fill;
mod image;
mod path;
pub mod pixmap;
mod stroke;

pub use device::RasterDevice;
pub use pixmap::{PixelBuffer, PixelFormat};

use crate::document::{PDFDocument, PageDescriptor};
use crate::error::{PdfError, Result};
use crate::interp;
use crate::utils::{Matrix, mult_matrix};

/// Largest page accepted for rendering, in pixels (16384 x 16384).
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 28;

/// Output size in pixels of `page` rendered at `scale`.
///
/// Media box extents times `scale` (and `/UserUnit`), rounded, swapped for
/// 90 and 270 degree rotation. Never smaller than 1x1.
pub fn output_size(page: &PageDescriptor, scale: f64) -> (u32, u32) {
    let s = scale * page.user_unit;
    let to_px = |v: f64| (v * s).round().clamp(1.0, f64::from(u32::MAX)) as u32;
    let (w, h) = (to_px(page.width()), to_px(page.height()));
    if page.rotate % 180 == 90 { (h, w) } else { (w, h) }
}

/// [`output_size`] for a page about to be rendered. Fails with
/// `UnsupportedFeature` above [`MAX_OUTPUT_PIXELS`].
pub fn checked_output_size(page: &PageDescriptor, scale: f64) -> Result<(u32, u32)> {
    let (width, height) = output_size(page, scale);
    match u64::from(width).checked_mul(u64::from(height)) {
        Some(pixels) if pixels <= MAX_OUTPUT_PIXELS => Ok((width, height)),
        _ => Err(PdfError::UnsupportedFeature(format!(
            "page {} renders at {width}x{height}, over the {MAX_OUTPUT_PIXELS} pixel limit",
            page.index
        ))),
    }
}

/// The page space to device pixel transform: rotation clockwise by
/// `/Rotate`, y flipped so that row 0 is the top, then scaled.
pub fn base_transform(page: &PageDescriptor, scale: f64) -> Matrix {
    let (x0, y0, x1, y1) = page.mediabox;
    let rotation: Matrix = match page.rotate {
        90 => (0.0, 1.0, 1.0, 0.0, -y0, -x0),
        180 => (-1.0, 0.0, 0.0, 1.0, x1, -y0),
        270 => (0.0, -1.0, -1.0, 0.0, y1, x1),
        _ => (1.0, 0.0, 0.0, -1.0, -x0, y1),
    };
    let s = scale * page.user_unit;
    mult_matrix(rotation, (s, 0.0, 0.0, s, 0.0, 0.0))
}

/// Render `page` into a new buffer.
pub fn rasterize(
    doc: &PDFDocument,
    page: &PageDescriptor,
    scale: f64,
    format: PixelFormat,
    anti_alias: bool,
) -> Result<PixelBuffer> {
    let (width, height) = checked_output_size(page, scale)?;
    let mut buffer = PixelBuffer::new(width, height, format);
    rasterize_into(doc, page, scale, anti_alias, &mut buffer)?;
    Ok(buffer)
}

/// Render `page` into a caller-allocated buffer, which is cleared to white
/// first. Its size must match [`checked_output_size`].
pub fn rasterize_into(
    doc: &PDFDocument,
    page: &PageDescriptor,
    scale: f64,
    anti_alias: bool,
    buffer: &mut PixelBuffer,
) -> Result<()> {
    let (width, height) = checked_output_size(page, scale)?;
    if (buffer.width(), buffer.height()) != (width, height) {
        return Err(PdfError::InvalidOption(format!(
            "buffer is {}x{}, page {} renders at {width}x{height}",
            buffer.width(),
            buffer.height(),
            page.index
        )));
    }
    buffer.clear();
    let mut device = RasterDevice::new(buffer, base_transform(page, scale), anti_alias);
    interp::run(doc, page, &mut device)
}
