//! Font metrics needed to place glyph boxes: advance widths, ascent and
//! descent, and how many bytes make up a character code.
//!
//! All values are in text space units per unit font size (em fractions),
//! so 1000-unit glyph widths are divided by 1000 and Type3 widths go
//! through the font's `/FontMatrix`.

use crate::document::PDFDocument;
use crate::error::Result;
use crate::model::objects::{PDFDict, PDFObject};
use rustc_hash::FxHashMap;

pub const DEFAULT_WIDTH: f64 = 0.5;
pub const DEFAULT_ASCENT: f64 = 0.7;
pub const DEFAULT_DESCENT: f64 = -0.2;

/// How a font's strings are split into codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeWidth {
    OneByte,
    TwoBytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    /// `/BaseFont` (or `/Name` for Type3), for logging
    pub basefont: Option<String>,
    pub code_width: CodeWidth,
    widths: FxHashMap<u32, f64>,
    default_width: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            basefont: None,
            code_width: CodeWidth::OneByte,
            widths: FxHashMap::default(),
            default_width: DEFAULT_WIDTH,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
        }
    }
}

/// Parse a CID font `/W` array into a code -> width mapping.
///
/// Handles two formats:
/// - `[cid [w1 w2 w3 ...]]` - consecutive widths starting at cid
/// - `[cid_start cid_end w]` - range with same width
pub fn get_widths(doc: &PDFDocument, seq: &[PDFObject]) -> Result<FxHashMap<u32, f64>> {
    let mut widths = FxHashMap::default();
    let mut pending: Vec<f64> = Vec::new();

    for v in seq {
        let resolved = doc.deref(v)?;
        match &*resolved {
            PDFObject::Array(arr) => {
                if let Some(&first) = pending.last() {
                    let first = first.max(0.0) as u32;
                    for (i, w) in arr.iter().enumerate() {
                        if let Ok(width) = doc.deref(w)?.as_num() {
                            widths.insert(first.saturating_add(i as u32), width);
                        }
                    }
                }
                pending.clear();
            }
            other => {
                if let Ok(n) = other.as_num() {
                    pending.push(n);
                    if let &[start, end, w] = pending.as_slice() {
                        let (start, end) = (start.max(0.0) as u32, end.max(0.0) as u32);
                        // Bound pathological ranges.
                        for code in start..=end.min(start.saturating_add(0xFFFF)) {
                            widths.insert(code, w);
                        }
                        pending.clear();
                    }
                }
            }
        }
    }

    Ok(widths)
}

fn num(doc: &PDFDocument, dict: &PDFDict, key: &str) -> Option<f64> {
    let obj = dict.get(key)?;
    doc.deref(obj).ok()?.as_num().ok().filter(|v| v.is_finite())
}

impl FontMetrics {
    /// Build metrics from a font dictionary.
    pub fn from_dict(doc: &PDFDocument, spec: &PDFDict) -> Result<Self> {
        let subtype = spec
            .get("Subtype")
            .and_then(|s| s.as_name().ok())
            .unwrap_or("Type1");
        let basefont = spec
            .get("BaseFont")
            .or_else(|| spec.get("Name"))
            .and_then(|n| n.as_name().ok())
            .map(str::to_string);

        let mut metrics = match subtype {
            "Type0" => Self::from_type0(doc, spec)?,
            "Type3" => Self::from_type3(doc, spec)?,
            _ => Self::from_simple(doc, spec, 0.001)?,
        };
        metrics.basefont = basefont;
        Ok(metrics)
    }

    fn from_simple(doc: &PDFDocument, spec: &PDFDict, scale: f64) -> Result<Self> {
        let mut metrics = Self::default();
        let descriptor = match spec.get("FontDescriptor") {
            Some(d) => doc.deref(d)?.as_dict().ok().cloned(),
            None => None,
        };
        if let Some(desc) = &descriptor {
            metrics.apply_descriptor(doc, desc);
            if let Some(missing) = num(doc, desc, "MissingWidth").filter(|w| *w > 0.0) {
                metrics.default_width = missing * scale;
            }
        }

        if let Some(widths) = spec.get("Widths") {
            let first = spec
                .get("FirstChar")
                .and_then(|v| doc.deref(v).ok())
                .and_then(|v| v.as_int().ok())
                .unwrap_or(0)
                .max(0) as u32;
            let widths = doc.deref(widths)?;
            for (i, w) in widths.as_array()?.iter().enumerate() {
                if let Ok(w) = doc.deref(w)?.as_num() {
                    metrics.widths.insert(first.saturating_add(i as u32), w * scale);
                }
            }
        }
        Ok(metrics)
    }

    fn from_type0(doc: &PDFDocument, spec: &PDFDict) -> Result<Self> {
        let mut metrics = Self {
            code_width: CodeWidth::TwoBytes,
            default_width: 1.0,
            ..Self::default()
        };
        if let Some(enc) = spec.get("Encoding").and_then(|e| e.as_name().ok())
            && !enc.starts_with("Identity")
        {
            tracing::debug!(encoding = enc, "non-identity CMap, reading two-byte codes");
        }

        let descendant = match spec.get("DescendantFonts") {
            Some(d) => {
                let arr = doc.deref(d)?;
                match arr.as_array()?.first() {
                    Some(first) => Some(doc.deref(first)?.as_dict()?.clone()),
                    None => None,
                }
            }
            None => None,
        };
        let Some(cid_font) = descendant else {
            return Ok(metrics);
        };

        if let Some(dw) = num(doc, &cid_font, "DW") {
            metrics.default_width = dw * 0.001;
        }
        if let Some(w) = cid_font.get("W") {
            let w = doc.deref(w)?;
            metrics.widths = get_widths(doc, w.as_array()?)?
                .into_iter()
                .map(|(code, width)| (code, width * 0.001))
                .collect();
        }
        if let Some(desc) = cid_font.get("FontDescriptor") {
            let desc = doc.deref(desc)?;
            if let Ok(desc) = desc.as_dict() {
                metrics.apply_descriptor(doc, desc);
            }
        }
        Ok(metrics)
    }

    fn from_type3(doc: &PDFDocument, spec: &PDFDict) -> Result<Self> {
        let mut fm = [0.001, 0.0, 0.0, 0.001];
        if let Some(obj) = spec.get("FontMatrix") {
            let arr = doc.deref(obj)?;
            if let Ok(items) = arr.as_array()
                && items.len() == 6
            {
                for (slot, item) in fm.iter_mut().zip(items) {
                    *slot = doc.deref(item)?.as_num()?;
                }
            }
        }
        let mut metrics = Self::from_simple(doc, spec, fm[0])?;

        if let Some(bbox) = spec.get("FontBBox") {
            let bbox = doc.deref(bbox)?;
            if let Ok([_, y0, _, y1]) = bbox.as_array()
                && let (Ok(y0), Ok(y1)) = (y0.as_num(), y1.as_num())
                && y1 > y0
            {
                metrics.ascent = y1 * fm[3];
                metrics.descent = y0 * fm[3];
            }
        }
        Ok(metrics)
    }

    fn apply_descriptor(&mut self, doc: &PDFDocument, desc: &PDFDict) {
        if let Some(ascent) = num(doc, desc, "Ascent").filter(|a| *a > 0.0) {
            self.ascent = ascent * 0.001;
        }
        if let Some(descent) = num(doc, desc, "Descent").filter(|d| *d != 0.0) {
            // Some producers write the descent as a positive number.
            self.descent = -descent.abs() * 0.001;
        }
    }

    /// Split a shown string into character codes.
    pub fn decode<'s>(&self, data: &'s [u8]) -> impl Iterator<Item = u32> + 's {
        let step = match self.code_width {
            CodeWidth::OneByte => 1,
            CodeWidth::TwoBytes => 2,
        };
        data.chunks(step).map(|chunk| {
            chunk
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
        })
    }

    /// Whether `code` receives word spacing: only the single-byte space.
    pub fn is_word_space(&self, code: u32) -> bool {
        self.code_width == CodeWidth::OneByte && code == 32
    }

    /// Advance width of `code` in em.
    pub fn char_width(&self, code: u32) -> f64 {
        self.widths
            .get(&code)
            .copied()
            .unwrap_or(self.default_width)
    }
}
