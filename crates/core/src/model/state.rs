//! PDF Graphics and Text State.

use super::color::PDFColorSpace;
use crate::font::FontMetrics;
use crate::utils::{MATRIX_IDENTITY, Matrix};
use std::sync::Arc;

/// Colour value after colour space resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    /// Greyscale color (0.0 = black, 1.0 = white)
    Gray(f64),
    /// RGB color
    Rgb(f64, f64, f64),
    /// CMYK color
    Cmyk(f64, f64, f64, f64),
    /// Pattern paint; uncoloured patterns carry their base colour
    Pattern(Option<Box<Color>>),
}

impl Default for Color {
    fn default() -> Self {
        Color::Gray(0.0)
    }
}

impl Color {
    /// RGB components in 0..=1, or `None` for a coloured pattern, which is
    /// not painted.
    pub fn to_rgb(&self) -> Option<(f64, f64, f64)> {
        match self {
            Color::Gray(g) => Some((*g, *g, *g)),
            Color::Rgb(r, g, b) => Some((*r, *g, *b)),
            Color::Cmyk(c, m, y, k) => Some((
                (1.0 - c) * (1.0 - k),
                (1.0 - m) * (1.0 - k),
                (1.0 - y) * (1.0 - k),
            )),
            Color::Pattern(base) => base.as_ref().and_then(|b| b.to_rgb()),
        }
    }

    /// 8-bit RGB; coloured patterns come out black.
    pub fn to_rgb8(&self) -> [u8; 3] {
        let (r, g, b) = self.to_rgb().unwrap_or((0.0, 0.0, 0.0));
        let q = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(r), q(g), q(b)]
    }

    /// Check if this color is a pattern color.
    pub fn is_pattern(&self) -> bool {
        matches!(self, Color::Pattern(_))
    }
}

/// PDF Text State - text positioning and rendering parameters.
#[derive(Debug, Clone)]
pub struct PDFTextState {
    /// Current font metrics (None until `Tf`)
    pub font: Option<Arc<FontMetrics>>,
    /// Current font resource name (e.g., "F1")
    pub fontname: Option<String>,
    /// Font size in user units
    pub fontsize: f64,
    /// Character spacing
    pub charspace: f64,
    /// Word spacing (applied to single-byte code 32)
    pub wordspace: f64,
    /// Horizontal scaling percentage (100 = normal)
    pub scaling: f64,
    /// Text leading
    pub leading: f64,
    /// Text rendering mode (0-7)
    pub render: i32,
    /// Text rise
    pub rise: f64,
    /// Text matrix (Tm)
    pub matrix: Matrix,
    /// Text line matrix (Tlm): the text matrix at the start of the line
    pub linematrix: Matrix,
}

impl PDFTextState {
    pub fn new() -> Self {
        Self {
            font: None,
            fontname: None,
            fontsize: 0.0,
            charspace: 0.0,
            wordspace: 0.0,
            scaling: 100.0,
            leading: 0.0,
            render: 0,
            rise: 0.0,
            matrix: MATRIX_IDENTITY,
            linematrix: MATRIX_IDENTITY,
        }
    }

    /// Reset text matrix and line matrix (`BT`).
    pub fn reset(&mut self) {
        self.matrix = MATRIX_IDENTITY;
        self.linematrix = MATRIX_IDENTITY;
    }

    /// Whether the current render mode paints anything (modes 3 and 7 are
    /// invisible or clip-only).
    pub fn is_visible(&self) -> bool {
        !matches!(self.render, 3 | 7)
    }
}

impl Default for PDFTextState {
    fn default() -> Self {
        Self::new()
    }
}

/// Line cap style (`J`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn from_int(v: i64) -> Self {
        match v {
            1 => Self::Round,
            2 => Self::Square,
            _ => Self::Butt,
        }
    }
}

/// Line join style (`j`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn from_int(v: i64) -> Self {
        match v {
            1 => Self::Round,
            2 => Self::Bevel,
            _ => Self::Miter,
        }
    }
}

/// PDF Graphics State - painting parameters saved by `q` and restored by `Q`.
///
/// The CTM and clip live beside it: the interpreter keeps the CTM, the
/// device keeps the clip.
#[derive(Debug, Clone)]
pub struct PDFGraphicState {
    /// Line width in user space
    pub linewidth: f64,
    pub linecap: LineCap,
    pub linejoin: LineJoin,
    pub miterlimit: f64,
    /// Dash pattern: (array, phase); an empty array is a solid line
    pub dash: (Vec<f64>, f64),
    /// Rendering intent name
    pub intent: Option<String>,
    /// Flatness tolerance
    pub flatness: f64,

    /// Stroking color
    pub scolor: Color,
    /// Stroking color space
    pub scs: PDFColorSpace,

    /// Non-stroking (fill) color
    pub ncolor: Color,
    /// Non-stroking color space
    pub ncs: PDFColorSpace,

    /// Stroking alpha (`/CA`)
    pub stroke_alpha: f64,
    /// Non-stroking alpha (`/ca`)
    pub fill_alpha: f64,
}

impl PDFGraphicState {
    /// Create new graphics state with the PDF defaults.
    pub fn new() -> Self {
        Self {
            linewidth: 1.0,
            linecap: LineCap::Butt,
            linejoin: LineJoin::Miter,
            miterlimit: 10.0,
            dash: (Vec::new(), 0.0),
            intent: None,
            flatness: 1.0,
            scolor: Color::Gray(0.0),
            scs: PDFColorSpace::DeviceGray,
            ncolor: Color::Gray(0.0),
            ncs: PDFColorSpace::DeviceGray,
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
        }
    }
}

impl Default for PDFGraphicState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmyk_to_rgb() {
        assert_eq!(Color::Cmyk(0.0, 0.0, 0.0, 1.0).to_rgb8(), [0, 0, 0]);
        assert_eq!(Color::Cmyk(1.0, 0.0, 0.0, 0.0).to_rgb8(), [0, 255, 255]);
    }

    #[test]
    fn test_pattern_without_base_is_not_painted() {
        assert_eq!(Color::Pattern(None).to_rgb(), None);
        let uncoloured = Color::Pattern(Some(Box::new(Color::Gray(1.0))));
        assert_eq!(uncoloured.to_rgb(), Some((1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_text_render_visibility() {
        let mut ts = PDFTextState::new();
        assert!(ts.is_visible());
        ts.render = 3;
        assert!(!ts.is_visible());
        ts.render = 2;
        assert!(ts.is_visible());
    }
}
