//! Pixel buffers.

use crate::error::{PdfError, Result};

/// Sample layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 3 bytes per pixel
    #[default]
    Rgb8,
    /// 4 bytes per pixel, straight alpha
    Rgba8,
}

impl PixelFormat {
    pub const fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// A `width` x `height` image, rows top to bottom, no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// A buffer filled with opaque white.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.channels();
        Self {
            width,
            height,
            format,
            data: vec![255; len],
        }
    }

    /// Wrap caller-provided samples. `data` must hold exactly
    /// `width * height * channels` bytes.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.channels()));
        if expected != Some(data.len()) {
            return Err(PdfError::InvalidOption(format!(
                "pixel buffer holds {} bytes, too few or too many for {width}x{height} {format:?}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row.
    pub const fn stride(&self) -> usize {
        self.width as usize * self.format.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Reset every pixel to opaque white.
    pub fn clear(&mut self) {
        self.data.fill(255);
    }

    /// RGBA of the pixel at (`x`, `y`); `Rgb8` buffers report alpha 255.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let ch = self.format.channels();
        let i = y as usize * self.stride() + x as usize * ch;
        let px = &self.data[i..i + ch];
        Some(match self.format {
            PixelFormat::Rgb8 => [px[0], px[1], px[2], 255],
            PixelFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
        })
    }

    /// Composite `color` over the pixel with opacity `alpha` (0..=1).
    pub(crate) fn blend(&mut self, x: u32, y: u32, color: [u8; 3], alpha: f32) {
        if alpha <= 0.0 || x >= self.width || y >= self.height {
            return;
        }
        let ch = self.format.channels();
        let i = y as usize * self.stride() + x as usize * ch;
        let px = &mut self.data[i..i + ch];
        if alpha >= 1.0 {
            px[..3].copy_from_slice(&color);
            if ch == 4 {
                px[3] = 255;
            }
            return;
        }
        for (dst, &src) in px[..3].iter_mut().zip(&color) {
            let v = f32::from(src) * alpha + f32::from(*dst) * (1.0 - alpha);
            *dst = v.round().clamp(0.0, 255.0) as u8;
        }
        if ch == 4 {
            let da = f32::from(px[3]) / 255.0;
            px[3] = ((alpha + da * (1.0 - alpha)) * 255.0).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_opaque_white() {
        let buf = PixelBuffer::new(3, 2, PixelFormat::Rgba8);
        assert_eq!(buf.data().len(), 24);
        assert_eq!(buf.pixel(2, 1), Some([255, 255, 255, 255]));
        assert_eq!(buf.pixel(3, 0), None);
    }

    #[test]
    fn test_blend_half_alpha() {
        let mut buf = PixelBuffer::new(1, 1, PixelFormat::Rgb8);
        buf.blend(0, 0, [0, 0, 0], 0.5);
        assert_eq!(buf.pixel(0, 0), Some([128, 128, 128, 255]));
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(PixelBuffer::from_raw(2, 2, PixelFormat::Rgb8, vec![0; 12]).is_ok());
        assert!(matches!(
            PixelBuffer::from_raw(2, 2, PixelFormat::Rgb8, vec![0; 11]),
            Err(PdfError::InvalidOption(_))
        ));
    }
}
