//! Pixel buffer export: 24-bit BMP and binary PPM.
//!
//! Alpha is dropped; rendered pages are opaque.

use crate::error::{PdfError, Result};
use crate::raster::{PixelBuffer, PixelFormat};
use std::io::{Seek, SeekFrom, Write};

/// Align a value to a 4-byte boundary (32-bit alignment for BMP rows).
pub const fn align32(x: u32) -> u32 {
    x.div_ceil(4) * 4
}

/// BMP file writer for 24-bit images.
///
/// BMP stores rows bottom-up; [`BmpWriter::write_line`] takes rows in top
/// to bottom order and seeks to the right place.
pub struct BmpWriter {
    linesize: u32,
    pos1: u64,
}

impl BmpWriter {
    /// Write the file and info headers for a `width` x `height` image.
    pub fn new<W: Write + Seek>(fp: &mut W, width: u32, height: u32) -> Result<Self> {
        let too_large = || PdfError::InvalidOption(format!("{width}x{height} is too large for BMP"));
        let linesize = width
            .checked_mul(3)
            .map(align32)
            .ok_or_else(too_large)?;
        let datasize = linesize.checked_mul(height).ok_or_else(too_large)?;
        let headersize: u32 = 14 + 40;
        let filesize = datasize.checked_add(headersize).ok_or_else(too_large)?;
        let (w, h) = (
            i32::try_from(width).map_err(|_| too_large())?,
            i32::try_from(height).map_err(|_| too_large())?,
        );

        // BITMAPINFOHEADER (40 bytes)
        let mut info = Vec::with_capacity(40);
        info.extend_from_slice(&40u32.to_le_bytes()); // biSize
        info.extend_from_slice(&w.to_le_bytes()); // biWidth
        info.extend_from_slice(&h.to_le_bytes()); // biHeight
        info.extend_from_slice(&1u16.to_le_bytes()); // biPlanes
        info.extend_from_slice(&24u16.to_le_bytes()); // biBitCount
        info.extend_from_slice(&0u32.to_le_bytes()); // biCompression
        info.extend_from_slice(&datasize.to_le_bytes()); // biSizeImage
        info.extend_from_slice(&0i32.to_le_bytes()); // biXPelsPerMeter
        info.extend_from_slice(&0i32.to_le_bytes()); // biYPelsPerMeter
        info.extend_from_slice(&0u32.to_le_bytes()); // biClrUsed
        info.extend_from_slice(&0u32.to_le_bytes()); // biClrImportant
        debug_assert_eq!(info.len(), 40);

        // BITMAPFILEHEADER (14 bytes)
        let mut header = Vec::with_capacity(14);
        header.extend_from_slice(b"BM");
        header.extend_from_slice(&filesize.to_le_bytes()); // bfSize
        header.extend_from_slice(&0u16.to_le_bytes()); // bfReserved1
        header.extend_from_slice(&0u16.to_le_bytes()); // bfReserved2
        header.extend_from_slice(&headersize.to_le_bytes()); // bfOffBits
        debug_assert_eq!(header.len(), 14);

        fp.write_all(&header)?;
        fp.write_all(&info)?;

        let pos0 = fp.stream_position()?;
        Ok(Self {
            linesize,
            pos1: pos0 + u64::from(datasize),
        })
    }

    /// Bytes per stored row, padding included.
    pub const fn linesize(&self) -> u32 {
        self.linesize
    }

    /// Write row `y` (0 = top of the image) as BGR triples.
    pub fn write_line<W: Write + Seek>(&mut self, fp: &mut W, y: u32, data: &[u8]) -> Result<()> {
        let seek_pos = self.pos1 - (u64::from(y) + 1) * u64::from(self.linesize);
        fp.seek(SeekFrom::Start(seek_pos))?;
        fp.write_all(data)?;
        Ok(())
    }
}

/// Write `buffer` as a 24-bit BMP.
pub fn write_bmp<W: Write + Seek>(out: &mut W, buffer: &PixelBuffer) -> Result<()> {
    let mut writer = BmpWriter::new(out, buffer.width(), buffer.height())?;
    let channels = buffer.format().channels();
    let mut line = vec![0u8; writer.linesize() as usize];
    for (y, row) in buffer.data().chunks_exact(buffer.stride().max(1)).enumerate() {
        for (dst, px) in line.chunks_exact_mut(3).zip(row.chunks_exact(channels)) {
            dst.copy_from_slice(&[px[2], px[1], px[0]]);
        }
        writer.write_line(out, y as u32, &line)?;
    }
    out.flush()?;
    Ok(())
}

/// Write `buffer` as a binary (P6) PPM.
pub fn write_ppm<W: Write>(out: &mut W, buffer: &PixelBuffer) -> Result<()> {
    write!(out, "P6\n{} {}\n255\n", buffer.width(), buffer.height())?;
    match buffer.format() {
        PixelFormat::Rgb8 => out.write_all(buffer.data())?,
        PixelFormat::Rgba8 => {
            let rgb: Vec<u8> = buffer
                .data()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            out.write_all(&rgb)?;
        }
    }
    out.flush()?;
    Ok(())
}
