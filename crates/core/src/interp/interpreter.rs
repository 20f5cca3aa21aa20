//! Page interpreter.
//!
//! Replays a page's content stream against an [`OperatorSink`]. Operands are
//! collected until an operator keyword arrives, then the operator runs with
//! the collected operands and the stack is cleared. Operators that are not
//! understood, or that arrive with too few operands, are skipped.
//!
//! The operators themselves live in `interp::ops`, grouped by category.

use super::content::{ContentParser, ContentToken};
use super::device::{OperatorSink, PathSegment};
use crate::document::{PDFDocument, PageDescriptor};
use crate::error::Result;
use crate::font::FontMetrics;
use crate::model::objects::{PDFDict, PDFObject};
use crate::model::state::{PDFGraphicState, PDFTextState};
use crate::parser::lexer::Keyword;
use crate::utils::{MATRIX_IDENTITY, Matrix};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Graphics state saved by `q`.
#[derive(Debug, Clone)]
pub(crate) struct SavedState {
    pub ctm: Matrix,
    pub textstate: PDFTextState,
    pub graphicstate: PDFGraphicState,
}

/// One element of a `TJ` array.
#[derive(Debug, Clone, PartialEq)]
pub enum TextSeqItem {
    Bytes(Vec<u8>),
    /// Position adjustment in thousandths of a text space unit
    Number(f64),
}

/// Executes content stream operators for one page.
///
/// Method names like `do_Q`, `do_S`, `do_B` keep the case of the operator
/// they implement (q/Q, s/S, b/B are different operators).
pub struct PDFPageInterpreter<'a, D: OperatorSink> {
    /// Document for resolving resources
    pub(crate) doc: &'a PDFDocument,
    /// Output sink
    pub(crate) device: &'a mut D,
    /// Resource dictionary in effect (the page's, or a form's while it runs)
    pub(crate) resources: PDFDict,
    /// Font metrics by font object id
    pub(crate) fontmap: FxHashMap<u32, Arc<FontMetrics>>,
    /// Graphics state stack for q/Q operators
    pub(crate) gstack: Vec<SavedState>,
    /// `Q` may not pop below this depth (raised while a form runs)
    pub(crate) gstack_floor: usize,
    /// Current transformation matrix
    pub(crate) ctm: Matrix,
    pub(crate) textstate: PDFTextState,
    pub(crate) graphicstate: PDFGraphicState,
    /// Current path being constructed
    pub(crate) curpath: Vec<PathSegment>,
    /// Current point (used by the `v` operator)
    pub(crate) current_point: Option<(f64, f64)>,
    /// Clip requested by `W`/`W*` (the flag is even-odd), applied by the
    /// next painting operator
    pub(crate) pending_clip: Option<bool>,
    /// Form XObjects being executed, innermost last
    pub(crate) form_stack: Vec<Option<u32>>,
    /// Offset of the operator being executed, for error reporting
    pub(crate) op_offset: usize,
}

impl<'a, D: OperatorSink> PDFPageInterpreter<'a, D> {
    pub fn new(doc: &'a PDFDocument, device: &'a mut D) -> Self {
        Self {
            doc,
            device,
            resources: PDFDict::new(),
            fontmap: FxHashMap::default(),
            gstack: Vec::new(),
            gstack_floor: 0,
            ctm: MATRIX_IDENTITY,
            textstate: PDFTextState::new(),
            graphicstate: PDFGraphicState::new(),
            curpath: Vec::new(),
            current_point: None,
            pending_clip: None,
            form_stack: Vec::new(),
            op_offset: 0,
        }
    }

    /// Reset the graphics state for a new page.
    pub fn init_state(&mut self, ctm: Matrix) {
        self.gstack.clear();
        self.gstack_floor = 0;
        self.ctm = ctm;
        self.device.set_ctm(self.ctm);
        self.textstate = PDFTextState::new();
        self.graphicstate = PDFGraphicState::new();
        self.curpath.clear();
        self.current_point = None;
        self.pending_clip = None;
    }

    /// Get current transformation matrix.
    pub const fn ctm(&self) -> Matrix {
        self.ctm
    }

    pub const fn graphicstate(&self) -> &PDFGraphicState {
        &self.graphicstate
    }

    pub const fn textstate(&self) -> &PDFTextState {
        &self.textstate
    }

    /// Get current path (read-only).
    pub fn current_path(&self) -> &[PathSegment] {
        &self.curpath
    }

    pub(crate) fn get_current_state(&self) -> SavedState {
        SavedState {
            ctm: self.ctm,
            textstate: self.textstate.clone(),
            graphicstate: self.graphicstate.clone(),
        }
    }

    pub(crate) fn set_current_state(&mut self, state: SavedState) {
        self.ctm = state.ctm;
        self.textstate = state.textstate;
        self.graphicstate = state.graphicstate;
        self.device.set_ctm(self.ctm);
    }

    /// Pop saved states until the stack is `depth` deep.
    pub(crate) fn restore_to_depth(&mut self, depth: usize) {
        while self.gstack.len() > depth {
            if let Some(state) = self.gstack.pop() {
                self.set_current_state(state);
                self.device.restore_state();
            }
        }
    }

    /// Look up `name` in the `category` sub-dictionary of the current
    /// resources. Returns the object id (when the entry is indirect) and the
    /// resolved object.
    pub(crate) fn lookup_resource(
        &self,
        category: &str,
        name: &str,
    ) -> Result<Option<(Option<u32>, PDFObject)>> {
        let Some(group) = self.resources.get(category) else {
            return Ok(None);
        };
        let group = self.doc.deref(group)?;
        let Some(entry) = group.as_dict().ok().and_then(|g| g.get(name)) else {
            return Ok(None);
        };
        let objid = match entry {
            PDFObject::Ref(r) => Some(r.objid),
            _ => None,
        };
        let object = (*self.doc.deref(entry)?).clone();
        Ok(Some((objid, object)))
    }

    // ========================================================================
    // Page Processing
    // ========================================================================

    /// Interpret a page: its resources become current, the CTM starts at the
    /// identity (page space) and every content stream is executed in order.
    pub fn process_page(&mut self, page: &PageDescriptor) -> Result<()> {
        tracing::debug!(page = page.index, objid = page.objid, "interpreting page");
        self.resources = page.resources.clone();
        self.init_state(MATRIX_IDENTITY);
        let content = self.doc.page_contents(page)?;
        self.execute(&content)
    }

    /// Execute a decoded content stream.
    pub fn execute(&mut self, content: &[u8]) -> Result<()> {
        let mut parser = ContentParser::new(content);
        let mut operands: Vec<PDFObject> = Vec::new();

        while let Some(token) = parser.next() {
            match token {
                ContentToken::Operand(obj) => operands.push(obj),
                ContentToken::Keyword(op) => {
                    self.op_offset = parser.tell();
                    self.dispatch_operator(&op, &mut operands)?;
                    operands.clear();
                }
                ContentToken::InlineImage { dict, data } => {
                    self.op_offset = parser.tell();
                    self.do_inline_image(dict, data)?;
                    operands.clear();
                }
            }
        }
        Ok(())
    }

    fn dispatch_operator(&mut self, op: &Keyword, args: &mut Vec<PDFObject>) -> Result<()> {
        match op {
            // Graphics state operators
            Keyword::Qq => self.do_q(),
            Keyword::Q => self.do_Q()?,
            Keyword::Cm => {
                if let Some(m) = Self::pop_matrix(args) {
                    self.do_cm(m);
                }
            }
            Keyword::Ww => {
                if let Some(w) = Self::pop_number(args) {
                    self.do_w(w);
                }
            }
            Keyword::J => {
                if let Some(n) = Self::pop_int(args) {
                    self.do_J(n);
                }
            }
            Keyword::Jj => {
                if let Some(n) = Self::pop_int(args) {
                    self.do_j(n);
                }
            }
            Keyword::M => {
                if let Some(m) = Self::pop_number(args) {
                    self.do_M(m);
                }
            }
            Keyword::D => {
                // dash pattern: [array] phase
                if args.len() >= 2 {
                    let phase = Self::pop_number(args).unwrap_or(0.0);
                    let arr = Self::pop_array(args).unwrap_or_default();
                    self.do_d(arr, phase);
                }
            }
            Keyword::Ri => {
                if let Some(intent) = Self::pop_name(args) {
                    self.do_ri(&intent);
                }
            }
            Keyword::I => {
                if let Some(f) = Self::pop_number(args) {
                    self.do_i(f);
                }
            }
            Keyword::Gs => {
                if let Some(name) = Self::pop_name(args) {
                    self.do_gs(&name)?;
                }
            }
            Keyword::Do => {
                if let Some(name) = Self::pop_name(args) {
                    self.do_Do(&name)?;
                }
            }

            // Path construction operators
            Keyword::Mm => {
                if let Some([x, y]) = Self::pop_numbers(args) {
                    self.do_m(x, y);
                }
            }
            Keyword::L => {
                if let Some([x, y]) = Self::pop_numbers(args) {
                    self.do_l(x, y);
                }
            }
            Keyword::C => {
                if let Some([x1, y1, x2, y2, x3, y3]) = Self::pop_numbers(args) {
                    self.do_c(x1, y1, x2, y2, x3, y3);
                }
            }
            Keyword::V => {
                if let Some([x2, y2, x3, y3]) = Self::pop_numbers(args) {
                    self.do_v(x2, y2, x3, y3);
                }
            }
            Keyword::Y => {
                if let Some([x1, y1, x3, y3]) = Self::pop_numbers(args) {
                    self.do_y(x1, y1, x3, y3);
                }
            }
            Keyword::H => self.do_h(),
            Keyword::Re => {
                if let Some([x, y, w, h]) = Self::pop_numbers(args) {
                    self.do_re(x, y, w, h);
                }
            }

            // Path painting operators
            Keyword::S => self.do_S(),
            Keyword::Ss => self.do_s(),
            Keyword::Ff | Keyword::F => self.do_f(),
            Keyword::FStar => self.do_f_star(),
            Keyword::B => self.do_B(),
            Keyword::BStar => self.do_B_star(),
            Keyword::Bb => self.do_b(),
            Keyword::BbStar => self.do_b_star(),
            Keyword::N => self.do_n(),

            // Clipping operators
            Keyword::WClip => self.do_W(),
            Keyword::WStar => self.do_W_star(),

            // Color operators
            Keyword::G => {
                if let Some(g) = Self::pop_number(args) {
                    self.do_G(g);
                }
            }
            Keyword::Gg => {
                if let Some(g) = Self::pop_number(args) {
                    self.do_g(g);
                }
            }
            Keyword::RG => {
                if let Some([r, g, b]) = Self::pop_numbers(args) {
                    self.do_RG(r, g, b);
                }
            }
            Keyword::Rg => {
                if let Some([r, g, b]) = Self::pop_numbers(args) {
                    self.do_rg(r, g, b);
                }
            }
            Keyword::K => {
                if let Some([c, m, y, k]) = Self::pop_numbers(args) {
                    self.do_K(c, m, y, k);
                }
            }
            Keyword::Kk => {
                if let Some([c, m, y, k]) = Self::pop_numbers(args) {
                    self.do_k(c, m, y, k);
                }
            }
            Keyword::CS => {
                if let Some(spec) = args.pop() {
                    self.do_CS(&spec)?;
                }
            }
            Keyword::Cs => {
                if let Some(spec) = args.pop() {
                    self.do_cs(&spec)?;
                }
            }
            Keyword::SC | Keyword::SCN => self.do_SC(args),
            Keyword::Sc | Keyword::Scn => self.do_sc(args),

            // Text object operators
            Keyword::BT => self.do_BT(),
            Keyword::ET => self.do_ET(),

            // Text state operators
            Keyword::Tc => {
                if let Some(cs) = Self::pop_number(args) {
                    self.do_Tc(cs);
                }
            }
            Keyword::Tw => {
                if let Some(ws) = Self::pop_number(args) {
                    self.do_Tw(ws);
                }
            }
            Keyword::Tz => {
                if let Some(s) = Self::pop_number(args) {
                    self.do_Tz(s);
                }
            }
            Keyword::TL => {
                if let Some(l) = Self::pop_number(args) {
                    self.do_TL(l);
                }
            }
            Keyword::Tf => {
                if args.len() >= 2 {
                    let size = Self::pop_number(args).unwrap_or(0.0);
                    let fontid = Self::pop_name(args).unwrap_or_default();
                    self.do_Tf(&fontid, size)?;
                }
            }
            Keyword::Tr => {
                if let Some(r) = Self::pop_int(args) {
                    self.do_Tr(r);
                }
            }
            Keyword::Ts => {
                if let Some(r) = Self::pop_number(args) {
                    self.do_Ts(r);
                }
            }

            // Text positioning operators
            Keyword::Td => {
                if let Some([tx, ty]) = Self::pop_numbers(args) {
                    self.do_Td(tx, ty);
                }
            }
            Keyword::TD => {
                if let Some([tx, ty]) = Self::pop_numbers(args) {
                    self.do_TD(tx, ty);
                }
            }
            Keyword::Tm => {
                if let Some(m) = Self::pop_matrix(args) {
                    self.do_Tm(m);
                }
            }
            Keyword::TStar => self.do_T_star(),

            // Text showing operators
            Keyword::Tj => {
                if let Some(s) = Self::pop_string(args) {
                    self.do_Tj(&s);
                }
            }
            Keyword::TJ => {
                if let Some(seq) = Self::pop_text_seq(args) {
                    self.do_TJ(&seq);
                }
            }
            Keyword::Quote => {
                if let Some(s) = Self::pop_string(args) {
                    self.do_quote(&s);
                }
            }
            Keyword::DoubleQuote => {
                if args.len() >= 3 {
                    let s = Self::pop_string(args).unwrap_or_default();
                    let ac = Self::pop_number(args).unwrap_or(0.0);
                    let aw = Self::pop_number(args).unwrap_or(0.0);
                    self.do_doublequote(aw, ac, &s);
                }
            }

            Keyword::Sh => tracing::debug!("shading fill (sh) is not painted"),

            // Marked content, compatibility sections, Type3 glyph metrics and
            // unknown operators paint nothing.
            _ => {}
        }
        Ok(())
    }

    // Helper functions to pop values from operand stack

    fn pop_number(args: &mut Vec<PDFObject>) -> Option<f64> {
        args.pop().and_then(|t| t.as_num().ok())
    }

    /// Pop the last `N` operands, all of which must be numbers.
    fn pop_numbers<const N: usize>(args: &mut Vec<PDFObject>) -> Option<[f64; N]> {
        if args.len() < N {
            return None;
        }
        let tail = args.split_off(args.len() - N);
        let mut out = [0.0; N];
        for (slot, obj) in out.iter_mut().zip(&tail) {
            *slot = obj.as_num().ok()?;
        }
        Some(out)
    }

    fn pop_int(args: &mut Vec<PDFObject>) -> Option<i64> {
        Self::pop_number(args).map(|n| n as i64)
    }

    fn pop_string(args: &mut Vec<PDFObject>) -> Option<Vec<u8>> {
        args.pop().and_then(|t| match t {
            PDFObject::String(s) => Some(s),
            _ => None,
        })
    }

    fn pop_name(args: &mut Vec<PDFObject>) -> Option<String> {
        args.pop().and_then(|t| match t {
            PDFObject::Name(s) => Some(s),
            _ => None,
        })
    }

    fn pop_array(args: &mut Vec<PDFObject>) -> Option<Vec<f64>> {
        args.pop().and_then(|t| match t {
            PDFObject::Array(arr) => Some(arr.iter().filter_map(|x| x.as_num().ok()).collect()),
            _ => None,
        })
    }

    fn pop_matrix(args: &mut Vec<PDFObject>) -> Option<Matrix> {
        Self::pop_numbers(args).map(|[a, b, c, d, e, f]| (a, b, c, d, e, f))
    }

    fn pop_text_seq(args: &mut Vec<PDFObject>) -> Option<Vec<TextSeqItem>> {
        args.pop().and_then(|t| match t {
            PDFObject::Array(arr) => Some(
                arr.into_iter()
                    .filter_map(|item| match item {
                        PDFObject::String(s) => Some(TextSeqItem::Bytes(s)),
                        other => other.as_num().ok().map(TextSeqItem::Number),
                    })
                    .collect(),
            ),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::interp::device::{RecordingSink, SinkEvent};
    use crate::test_support::single_page_pdf;

    fn run_content(content: &str, resources: &str, extra: &[&str]) -> (Result<()>, RecordingSink) {
        let pdf = single_page_pdf("[0 0 200 100]", resources, content, extra);
        let doc = PDFDocument::open(&pdf).unwrap();
        let page = doc.page_descriptor(0).unwrap().clone();
        let mut sink = RecordingSink::new();
        let result = PDFPageInterpreter::new(&doc, &mut sink).process_page(&page);
        (result, sink)
    }

    fn paints(sink: &RecordingSink) -> usize {
        sink.events
            .iter()
            .filter(|e| matches!(e, SinkEvent::Paint { .. }))
            .count()
    }

    #[test]
    fn test_unknown_operators_are_skipped() {
        let (result, sink) = run_content("1 2 foo 0 0 10 10 re f", "<< >>", &[]);
        result.unwrap();
        assert_eq!(paints(&sink), 1);
    }

    #[test]
    fn test_too_few_operands_skip_the_operator() {
        let (result, sink) = run_content("10 re f 0 0 5 5 re f", "<< >>", &[]);
        result.unwrap();
        let Some(SinkEvent::Paint { path, .. }) = sink
            .events
            .iter()
            .find(|e| matches!(e, SinkEvent::Paint { .. }))
        else {
            panic!("expected a paint event");
        };
        assert_eq!(path.first(), Some(&PathSegment::MoveTo(0.0, 0.0)));
    }

    #[test]
    fn test_restore_on_empty_stack_is_an_error() {
        let (result, _) = run_content("q Q Q", "<< >>", &[]);
        assert!(matches!(result, Err(PdfError::MalformedObject { .. })));
    }

    #[test]
    fn test_clip_is_applied_after_painting() {
        let (result, sink) = run_content("0 0 50 50 re W n 0 0 10 10 re f", "<< >>", &[]);
        result.unwrap();
        let kinds: Vec<_> = sink
            .events
            .iter()
            .filter(|e| !matches!(e, SinkEvent::SetCtm(_)))
            .collect();
        assert!(matches!(kinds[0], SinkEvent::Clip { evenodd: false, .. }));
        assert!(matches!(kinds[1], SinkEvent::Paint { fill: true, .. }));
    }

    #[test]
    fn test_save_restore_round_trips_ctm() {
        let pdf = single_page_pdf("[0 0 200 100]", "<< >>", "q 2 0 0 2 0 0 cm Q", &[]);
        let doc = PDFDocument::open(&pdf).unwrap();
        let page = doc.page_descriptor(0).unwrap().clone();
        let mut sink = RecordingSink::new();
        let mut interp = PDFPageInterpreter::new(&doc, &mut sink);
        interp.process_page(&page).unwrap();
        assert_eq!(interp.ctm(), MATRIX_IDENTITY);
    }

    #[test]
    fn test_form_xobject_runs_under_its_matrix() {
        let form = crate::test_support::stream(
            "/Type /XObject /Subtype /Form /BBox [0 0 10 10] /Matrix [1 0 0 1 20 30]",
            "0 0 5 5 re f",
        );
        let (result, sink) = run_content(
            "/Fm1 Do",
            "<< /XObject << /Fm1 5 0 R >> >>",
            &[form.as_str()],
        );
        result.unwrap();
        assert!(sink.events.contains(&SinkEvent::SetCtm((1.0, 0.0, 0.0, 1.0, 20.0, 30.0))));
        assert_eq!(paints(&sink), 1);
        // The form's state is popped again.
        assert!(sink.events.ends_with(&[SinkEvent::SetCtm(MATRIX_IDENTITY), SinkEvent::Restore]));
    }

    #[test]
    fn test_recursive_form_is_skipped() {
        let form = crate::test_support::stream(
            "/Subtype /Form /BBox [0 0 10 10] /Resources << /XObject << /Fm1 5 0 R >> >>",
            "0 0 1 1 re f /Fm1 Do",
        );
        let (result, sink) = run_content(
            "/Fm1 Do",
            "<< /XObject << /Fm1 5 0 R >> >>",
            &[form.as_str()],
        );
        result.unwrap();
        assert_eq!(paints(&sink), 1);
    }

    #[test]
    fn test_glyph_boxes_advance_by_width() {
        let (result, sink) = run_content(
            "BT /F1 10 Tf 5 20 Td (AB) Tj ET",
            "<< /Font << /F1 5 0 R >> >>",
            &["<< /Type /Font /Subtype /Type1 /FirstChar 65 /Widths [600 400] >>"],
        );
        result.unwrap();
        let boxes = sink.glyph_boxes();
        assert_eq!(boxes.len(), 2);
        let (bbox, m0) = boxes[0];
        assert!((bbox.2 - 0.6).abs() < 1e-9);
        assert_eq!(m0, (10.0, 0.0, 0.0, 10.0, 5.0, 20.0));
        let (_, m1) = boxes[1];
        assert!((m1.4 - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_space_is_not_painted_but_advances() {
        let (result, sink) = run_content(
            "BT /F1 10 Tf 2 Tw (A A) Tj ET",
            "<< /Font << /F1 5 0 R >> >>",
            &["<< /Type /Font /Subtype /Type1 /FirstChar 32 /Widths [250] >>"],
        );
        result.unwrap();
        let boxes = sink.glyph_boxes();
        assert_eq!(boxes.len(), 2);
        // A: 0.5 em default * 10, space: 0.25 * 10 + 2 word spacing.
        assert!((boxes[1].1.4 - (5.0 + 2.5 + 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_tj_adjustment_moves_left() {
        let (result, sink) = run_content("BT /F1 10 Tf [(A) -500 (B)] TJ ET", "<< >>", &[]);
        result.unwrap();
        let boxes = sink.glyph_boxes();
        assert_eq!(boxes.len(), 2);
        // 0.5 em advance plus 500/1000 em adjustment, at 10pt.
        assert!((boxes[1].1.4 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_invisible_text_paints_nothing() {
        let (result, sink) = run_content("BT /F1 12 Tf 3 Tr (Hidden) Tj ET", "<< >>", &[]);
        result.unwrap();
        assert!(sink.glyph_boxes().is_empty());
    }
}
