//! Image sample decoding.
//!
//! Turns the (filter-decoded) sample data of an image XObject or inline
//! image into 8-bit RGBA, top row first. Supports 1/2/4/8/16 bits per
//! component, `/Decode` arrays, Indexed palettes and `/ImageMask`
//! stencils painted with the current fill colour.

use crate::document::PDFDocument;
use crate::error::{PdfError, Result};
use crate::interp::ops::resolve_colorspace;
use crate::model::color::PDFColorSpace;
use crate::model::objects::{PDFDict, PDFObject};
use crate::model::state::Color;

/// Largest decoded image accepted, in RGBA bytes.
const MAX_IMAGE_DECODED_BYTES: u64 = 256 * 1024 * 1024;

/// An image ready to be painted.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, rows top to bottom
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// RGBA of the pixel at (`x`, `y`), row 0 at the top.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        match self.rgba.get(i..i + 4) {
            Some(&[r, g, b, a]) => [r, g, b, a],
            _ => [0, 0, 0, 0],
        }
    }
}

fn dict_int(doc: &PDFDocument, dict: &PDFDict, key: &str) -> Result<Option<i64>> {
    match dict.get(key) {
        Some(obj) => Ok(doc.deref(obj)?.as_int().ok()),
        None => Ok(None),
    }
}

fn decode_array(doc: &PDFDocument, dict: &PDFDict) -> Result<Vec<f64>> {
    let Some(obj) = dict.get("Decode") else {
        return Ok(Vec::new());
    };
    let obj = doc.deref(obj)?;
    Ok(match &*obj {
        PDFObject::Array(items) => items.iter().filter_map(|v| v.as_num().ok()).collect(),
        _ => Vec::new(),
    })
}

/// Read sample `index` of a row packed at `bpc` bits per sample.
fn sample(row: &[u8], index: usize, bpc: usize) -> u32 {
    match bpc {
        8 => u32::from(row[index]),
        16 => (u32::from(row[index * 2]) << 8) | u32::from(row[index * 2 + 1]),
        _ => {
            let bit = index * bpc;
            let shift = 8 - bpc - bit % 8;
            (u32::from(row[bit / 8]) >> shift) & ((1 << bpc) - 1)
        }
    }
}

/// Decode an image's samples to RGBA.
///
/// `data` is the image data with its stream filters already applied.
/// Returns `Ok(None)` when the image cannot be painted (unsupported colour
/// space, pattern-filled stencil); those cases are logged.
pub fn decode_image(
    doc: &PDFDocument,
    resources: &PDFDict,
    dict: &PDFDict,
    data: &[u8],
    fill: &Color,
) -> Result<Option<DecodedImage>> {
    let width = dict_int(doc, dict, "Width")?.unwrap_or(0);
    let height = dict_int(doc, dict, "Height")?.unwrap_or(0);
    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(PdfError::DecodeFailure(format!("bad image size {width}x{height}")));
    };
    if width == 0 || height == 0 {
        return Err(PdfError::DecodeFailure(format!("bad image size {width}x{height}")));
    }
    if u64::from(width) * u64::from(height) * 4 > MAX_IMAGE_DECODED_BYTES {
        return Err(PdfError::DecodeFailure(format!(
            "image of {width}x{height} pixels is too large"
        )));
    }

    let image_mask = match dict.get("ImageMask") {
        Some(obj) => doc.deref(obj)?.as_bool().unwrap_or(false),
        None => false,
    };
    let bpc = dict_int(doc, dict, "BitsPerComponent")?.unwrap_or(if image_mask { 1 } else { 8 });
    let bpc = match bpc {
        1 | 2 | 4 | 8 | 16 => bpc as usize,
        other => {
            return Err(PdfError::DecodeFailure(format!(
                "unsupported bits per component: {other}"
            )));
        }
    };
    let decode = decode_array(doc, dict)?;

    if image_mask {
        let Some((r, g, b)) = fill.to_rgb() else {
            tracing::debug!("stencil mask with a pattern fill is not painted");
            return Ok(None);
        };
        let q = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let ink = [q(r), q(g), q(b), 255];
        // Samples equal to `paint` are painted; Decode [1 0] flips it.
        let paint = u32::from(decode.first().is_some_and(|&d| d >= 0.5));
        let rows = padded_rows(data, width, height, 1, 1)?;
        let mut rgba = vec![0u8; width as usize * height as usize * 4];
        for (row, out) in rows.chunks(row_bytes(width, 1, 1)).zip(rgba.chunks_mut(width as usize * 4)) {
            for (x, px) in out.chunks_exact_mut(4).enumerate() {
                if sample(row, x, 1) == paint {
                    px.copy_from_slice(&ink);
                }
            }
        }
        return Ok(Some(DecodedImage { width, height, rgba }));
    }

    let cs = match dict.get("ColorSpace") {
        Some(spec) => resolve_colorspace(doc, resources, spec)?,
        None => None,
    };
    let cs = match cs {
        Some(PDFColorSpace::Pattern(_)) | None => {
            tracing::warn!(colorspace = ?dict.get("ColorSpace"), "image colour space not supported, image skipped");
            return Ok(None);
        }
        Some(cs) => cs,
    };

    let ncomp = cs.ncomponents();
    let maxval = ((1u32 << bpc) - 1) as f64;
    let default_max = if matches!(cs, PDFColorSpace::Indexed { .. }) { maxval } else { 1.0 };
    let ranges: Vec<(f64, f64)> = (0..ncomp)
        .map(|i| match (decode.get(2 * i), decode.get(2 * i + 1)) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => (0.0, default_max),
        })
        .collect();

    // Precomputed palette for Indexed images.
    let palette: Option<Vec<[u8; 3]>> = match &cs {
        PDFColorSpace::Indexed { hival, .. } => Some(
            (0..=*hival)
                .map(|i| cs.color(&[f64::from(i)]).to_rgb8())
                .collect(),
        ),
        _ => None,
    };

    let stride = row_bytes(width, ncomp, bpc);
    let rows = padded_rows(data, width, height, ncomp, bpc)?;
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    let mut comps = vec![0.0f64; ncomp];

    for (row, out) in rows.chunks(stride).zip(rgba.chunks_mut(width as usize * 4)) {
        for (x, px) in out.chunks_exact_mut(4).enumerate() {
            for (c, slot) in comps.iter_mut().enumerate() {
                let (lo, hi) = ranges[c];
                let s = f64::from(sample(row, x * ncomp + c, bpc));
                *slot = lo + s * (hi - lo) / maxval;
            }
            let [r, g, b] = match &palette {
                Some(palette) => {
                    let index = comps[0].round().clamp(0.0, (palette.len() - 1) as f64) as usize;
                    palette[index]
                }
                None => cs.color(&comps).to_rgb8(),
            };
            px.copy_from_slice(&[r, g, b, 255]);
        }
    }

    Ok(Some(DecodedImage { width, height, rgba }))
}

fn row_bytes(width: u32, ncomp: usize, bpc: usize) -> usize {
    (width as usize * ncomp * bpc).div_ceil(8)
}

/// The sample data, zero padded to a whole number of rows if short.
fn padded_rows(data: &[u8], width: u32, height: u32, ncomp: usize, bpc: usize) -> Result<Vec<u8>> {
    let needed = row_bytes(width, ncomp, bpc)
        .checked_mul(height as usize)
        .ok_or_else(|| PdfError::DecodeFailure("image size overflow".into()))?;
    let mut rows = data[..data.len().min(needed)].to_vec();
    if rows.len() < needed {
        tracing::debug!(have = rows.len(), needed, "image data short, padding with zeros");
        rows.resize(needed, 0);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_pdf;

    fn empty_doc() -> PDFDocument {
        let pdf = build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [] /Count 0 >>",
            ],
            1,
        );
        PDFDocument::open(&pdf).unwrap()
    }

    fn dict(entries: &[(&str, PDFObject)]) -> PDFDict {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn name(n: &str) -> PDFObject {
        PDFObject::Name(n.to_string())
    }

    #[test]
    fn test_gray_8bit() {
        let doc = empty_doc();
        let d = dict(&[
            ("Width", PDFObject::Int(2)),
            ("Height", PDFObject::Int(1)),
            ("ColorSpace", name("DeviceGray")),
            ("BitsPerComponent", PDFObject::Int(8)),
        ]);
        let img = decode_image(&doc, &PDFDict::new(), &d, &[0, 255], &Color::Gray(0.0))
            .unwrap()
            .unwrap();
        assert_eq!(img.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(img.pixel(1, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_rgb_rows_are_top_first() {
        let doc = empty_doc();
        let d = dict(&[
            ("Width", PDFObject::Int(1)),
            ("Height", PDFObject::Int(2)),
            ("ColorSpace", name("DeviceRGB")),
        ]);
        let img = decode_image(&doc, &PDFDict::new(), &d, &[255, 0, 0, 0, 0, 255], &Color::Gray(0.0))
            .unwrap()
            .unwrap();
        assert_eq!(img.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(img.pixel(0, 1), [0, 0, 255, 255]);
    }

    #[test]
    fn test_one_bit_with_inverting_decode() {
        let doc = empty_doc();
        let d = dict(&[
            ("Width", PDFObject::Int(8)),
            ("Height", PDFObject::Int(1)),
            ("ColorSpace", name("DeviceGray")),
            ("BitsPerComponent", PDFObject::Int(1)),
            ("Decode", PDFObject::Array(vec![PDFObject::Int(1), PDFObject::Int(0)])),
        ]);
        let img = decode_image(&doc, &PDFDict::new(), &d, &[0b1000_0000], &Color::Gray(0.0))
            .unwrap()
            .unwrap();
        assert_eq!(img.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(img.pixel(1, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_stencil_mask_uses_fill_color() {
        let doc = empty_doc();
        let d = dict(&[
            ("Width", PDFObject::Int(2)),
            ("Height", PDFObject::Int(1)),
            ("ImageMask", PDFObject::Bool(true)),
        ]);
        let img = decode_image(&doc, &PDFDict::new(), &d, &[0b0100_0000], &Color::Rgb(1.0, 0.0, 0.0))
            .unwrap()
            .unwrap();
        assert_eq!(img.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(img.pixel(1, 0)[3], 0);
    }

    #[test]
    fn test_indexed_4bit() {
        let doc = empty_doc();
        let cs = PDFObject::Array(vec![
            name("Indexed"),
            name("DeviceRGB"),
            PDFObject::Int(1),
            PDFObject::String(vec![0, 0, 0, 0, 255, 0]),
        ]);
        let d = dict(&[
            ("Width", PDFObject::Int(2)),
            ("Height", PDFObject::Int(1)),
            ("ColorSpace", cs),
            ("BitsPerComponent", PDFObject::Int(4)),
        ]);
        let img = decode_image(&doc, &PDFDict::new(), &d, &[0x01], &Color::Gray(0.0))
            .unwrap()
            .unwrap();
        assert_eq!(img.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(img.pixel(1, 0), [0, 255, 0, 255]);
    }

    #[test]
    fn test_short_data_is_padded() {
        let doc = empty_doc();
        let d = dict(&[
            ("Width", PDFObject::Int(2)),
            ("Height", PDFObject::Int(2)),
            ("ColorSpace", name("DeviceGray")),
        ]);
        let img = decode_image(&doc, &PDFDict::new(), &d, &[255], &Color::Gray(0.0))
            .unwrap()
            .unwrap();
        assert_eq!(img.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(img.pixel(1, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn test_unknown_colorspace_is_skipped() {
        let doc = empty_doc();
        let d = dict(&[
            ("Width", PDFObject::Int(1)),
            ("Height", PDFObject::Int(1)),
            ("ColorSpace", name("Nope")),
        ]);
        assert!(decode_image(&doc, &PDFDict::new(), &d, &[0], &Color::Gray(0.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_zero_size_is_a_decode_failure() {
        let doc = empty_doc();
        let d = dict(&[("Width", PDFObject::Int(0)), ("Height", PDFObject::Int(1))]);
        assert!(matches!(
            decode_image(&doc, &PDFDict::new(), &d, &[], &Color::Gray(0.0)),
            Err(PdfError::DecodeFailure(_))
        ));
    }
}
