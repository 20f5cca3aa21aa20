//! Text operators.
//!
//! Handles: BT, ET, Tc, Tw, Tz, TL, Tf, Tr, Ts, Td, TD, Tm, T*, Tj, TJ, ', "
//!
//! Text object:
//! - BT/ET: Begin/end text object
//!
//! Text state:
//! - Tc: Character spacing
//! - Tw: Word spacing
//! - Tz: Horizontal scaling
//! - TL: Leading
//! - Tf: Font and size
//! - Tr: Rendering mode
//! - Ts: Rise (baseline offset)
//!
//! Text positioning:
//! - Td/TD: Move to next line (TD also sets leading)
//! - Tm: Set text matrix directly
//! - T*: Move to next line using current leading
//!
//! Text showing:
//! - Tj: Show string
//! - TJ: Show with individual glyph positioning
//! - ': Move to next line and show
//! - ": Set spacing, move to next line, and show
//!
//! Glyphs are not rasterised from font programs: each shown code paints a
//! box of its advance width between the font's descent and ascent.

use crate::error::{PdfError, Result};
use crate::font::FontMetrics;
use crate::interp::device::OperatorSink;
use crate::interp::interpreter::{PDFPageInterpreter, TextSeqItem};
use crate::utils::{Matrix, mult_matrix};
use std::sync::Arc;

const fn translate(tx: f64, ty: f64) -> Matrix {
    (1.0, 0.0, 0.0, 1.0, tx, ty)
}

#[allow(non_snake_case)]
impl<'a, D: OperatorSink> PDFPageInterpreter<'a, D> {
    // ========================================================================
    // Text Object Operators
    // ========================================================================

    /// BT - Begin text object: Tm and Tlm become the identity.
    pub fn do_BT(&mut self) {
        self.textstate.reset();
    }

    /// ET - End text object.
    pub fn do_ET(&mut self) {}

    // ========================================================================
    // Text State Operators
    // ========================================================================

    /// Tc - Set character spacing.
    pub fn do_Tc(&mut self, charspace: f64) {
        self.textstate.charspace = charspace;
    }

    /// Tw - Set word spacing.
    pub fn do_Tw(&mut self, wordspace: f64) {
        self.textstate.wordspace = wordspace;
    }

    /// Tz - Set horizontal scaling (percent).
    pub fn do_Tz(&mut self, scaling: f64) {
        self.textstate.scaling = scaling;
    }

    /// TL - Set text leading.
    pub fn do_TL(&mut self, leading: f64) {
        self.textstate.leading = leading;
    }

    /// Tf - Set font and size.
    ///
    /// A font that is missing from the resources, or whose dictionary cannot
    /// be read, falls back to default metrics.
    pub fn do_Tf(&mut self, fontid: &str, fontsize: f64) -> Result<()> {
        let font = self.load_font(fontid)?;
        self.textstate.font = Some(font);
        self.textstate.fontname = Some(fontid.to_string());
        self.textstate.fontsize = fontsize;
        Ok(())
    }

    /// Tr - Set text rendering mode.
    pub fn do_Tr(&mut self, render: i64) {
        self.textstate.render = render.clamp(0, 7) as i32;
    }

    /// Ts - Set text rise.
    pub fn do_Ts(&mut self, rise: f64) {
        self.textstate.rise = rise;
    }

    fn load_font(&mut self, fontid: &str) -> Result<Arc<FontMetrics>> {
        let Some((objid, spec)) = self.lookup_resource("Font", fontid)? else {
            tracing::warn!(font = fontid, "font resource not found, using default metrics");
            return Ok(Arc::new(FontMetrics::default()));
        };
        if let Some(id) = objid
            && let Some(metrics) = self.fontmap.get(&id)
        {
            return Ok(Arc::clone(metrics));
        }

        let metrics = match spec.as_dict() {
            Ok(dict) => match FontMetrics::from_dict(self.doc, dict) {
                Ok(metrics) => metrics,
                Err(err @ PdfError::CircularReference(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(font = fontid, error = %err, "unreadable font, using default metrics");
                    FontMetrics::default()
                }
            },
            Err(_) => {
                tracing::warn!(font = fontid, "font resource is not a dictionary");
                FontMetrics::default()
            }
        };
        let metrics = Arc::new(metrics);
        if let Some(id) = objid {
            self.fontmap.insert(id, Arc::clone(&metrics));
        }
        Ok(metrics)
    }

    // ========================================================================
    // Text Positioning Operators
    // ========================================================================

    /// Td - Move to the start of the next line, offset by (tx, ty).
    pub fn do_Td(&mut self, tx: f64, ty: f64) {
        let ts = &mut self.textstate;
        ts.linematrix = mult_matrix(translate(tx, ty), ts.linematrix);
        ts.matrix = ts.linematrix;
    }

    /// TD - Move to next line and set leading to -ty.
    pub fn do_TD(&mut self, tx: f64, ty: f64) {
        self.textstate.leading = -ty;
        self.do_Td(tx, ty);
    }

    /// Tm - Set text matrix and text line matrix.
    pub fn do_Tm(&mut self, matrix: Matrix) {
        self.textstate.matrix = matrix;
        self.textstate.linematrix = matrix;
    }

    /// T* - Move to start of next line.
    pub fn do_T_star(&mut self) {
        self.do_Td(0.0, -self.textstate.leading);
    }

    // ========================================================================
    // Text Showing Operators
    // ========================================================================

    /// Tj - Show text string.
    pub fn do_Tj(&mut self, s: &[u8]) {
        self.show_string(s);
    }

    /// TJ - Show text with individual glyph positioning.
    pub fn do_TJ(&mut self, seq: &[TextSeqItem]) {
        for item in seq {
            match item {
                TextSeqItem::Bytes(s) => self.show_string(s),
                TextSeqItem::Number(adj) => {
                    let ts = &mut self.textstate;
                    let tx = -adj / 1000.0 * ts.fontsize * ts.scaling / 100.0;
                    ts.matrix = mult_matrix(translate(tx, 0.0), ts.matrix);
                }
            }
        }
    }

    /// ' - Move to next line and show text.
    pub fn do_quote(&mut self, s: &[u8]) {
        self.do_T_star();
        self.do_Tj(s);
    }

    /// " - Set word/char spacing, move to next line, and show text.
    pub fn do_doublequote(&mut self, aw: f64, ac: f64, s: &[u8]) {
        self.do_Tw(aw);
        self.do_Tc(ac);
        self.do_quote(s);
    }

    /// Paint one glyph box per code and advance the text matrix.
    fn show_string(&mut self, data: &[u8]) {
        let fallback = FontMetrics::default();
        let font = self.textstate.font.clone();
        let metrics = font.as_deref().unwrap_or(&fallback);

        let ts = &self.textstate;
        let (fontsize, charspace, wordspace, rise) =
            (ts.fontsize, ts.charspace, ts.wordspace, ts.rise);
        let hscale = ts.scaling / 100.0;
        let visible = ts.is_visible();

        // Stroke-only modes paint with the stroking colour.
        let stroke_state = matches!(ts.render, 1 | 5).then(|| {
            let mut gs = self.graphicstate.clone();
            gs.ncolor = gs.scolor.clone();
            gs.fill_alpha = gs.stroke_alpha;
            gs
        });
        let gstate = stroke_state.as_ref().unwrap_or(&self.graphicstate);

        let glyph_matrix = (fontsize * hscale, 0.0, 0.0, fontsize, 0.0, rise);
        let mut matrix = self.textstate.matrix;
        for code in metrics.decode(data) {
            let width = metrics.char_width(code);
            let is_space = metrics.is_word_space(code);
            if visible && !is_space {
                let trm = mult_matrix(glyph_matrix, matrix);
                self.device
                    .draw_glyph_box(gstate, (0.0, metrics.descent, width, metrics.ascent), trm);
            }
            let mut tx = width * fontsize + charspace;
            if is_space {
                tx += wordspace;
            }
            matrix = mult_matrix(translate(tx * hscale, 0.0), matrix);
        }
        self.textstate.matrix = matrix;
    }
}
