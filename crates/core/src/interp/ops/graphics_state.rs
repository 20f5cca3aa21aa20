//! Graphics state operators.
//!
//! Handles: q, Q, cm, w, J, j, M, d, ri, i, gs
//!
//! - q/Q: Push/pop graphics state (the sink saves and restores its clip)
//! - cm: Concatenate transformation matrix
//! - w, J, j, M, d: Line styling (width, cap, join, miter limit, dash)
//! - ri, i: Rendering intent and flatness
//! - gs: Set parameters from an `/ExtGState` resource

use crate::error::{PdfError, Result};
use crate::interp::device::OperatorSink;
use crate::interp::interpreter::PDFPageInterpreter;
use crate::model::objects::PDFObject;
use crate::model::state::{LineCap, LineJoin};
use crate::utils::{Matrix, mult_matrix};

#[allow(non_snake_case)]
impl<'a, D: OperatorSink> PDFPageInterpreter<'a, D> {
    /// Saves the current graphics state to the stack.
    ///
    /// PDF operator: `q`
    pub fn do_q(&mut self) {
        self.gstack.push(self.get_current_state());
        self.device.save_state();
    }

    /// Restores the graphics state from the stack. Popping an empty stack
    /// (or below the state a running form started from) is an error.
    ///
    /// PDF operator: `Q`
    pub fn do_Q(&mut self) -> Result<()> {
        if self.gstack.len() <= self.gstack_floor {
            return Err(PdfError::malformed(self.op_offset, "Q without a matching q"));
        }
        self.restore_to_depth(self.gstack.len() - 1);
        Ok(())
    }

    /// Concatenates a matrix to the current transformation matrix.
    ///
    /// PDF operator: `cm`
    pub fn do_cm(&mut self, matrix: Matrix) {
        self.ctm = mult_matrix(matrix, self.ctm);
        self.device.set_ctm(self.ctm);
    }

    /// Sets the line width (user space units).
    ///
    /// PDF operator: `w`
    pub fn do_w(&mut self, linewidth: f64) {
        self.graphicstate.linewidth = linewidth.abs();
    }

    /// PDF operator: `J`
    pub fn do_J(&mut self, linecap: i64) {
        self.graphicstate.linecap = LineCap::from_int(linecap);
    }

    /// PDF operator: `j`
    pub fn do_j(&mut self, linejoin: i64) {
        self.graphicstate.linejoin = LineJoin::from_int(linejoin);
    }

    /// PDF operator: `M`
    pub fn do_M(&mut self, miterlimit: f64) {
        self.graphicstate.miterlimit = miterlimit.max(1.0);
    }

    /// Sets the line dash pattern. An array of all zeros is treated as solid.
    ///
    /// PDF operator: `d`
    pub fn do_d(&mut self, dash_array: Vec<f64>, phase: f64) {
        let solid =
            dash_array.iter().any(|&d| d < 0.0) || dash_array.iter().all(|&d| d == 0.0);
        self.graphicstate.dash = if solid {
            (Vec::new(), 0.0)
        } else {
            (dash_array, phase)
        };
    }

    /// PDF operator: `ri`
    pub fn do_ri(&mut self, intent: &str) {
        self.graphicstate.intent = Some(intent.to_string());
    }

    /// PDF operator: `i`
    pub fn do_i(&mut self, flatness: f64) {
        self.graphicstate.flatness = flatness;
    }

    /// Sets parameters from a graphics state parameter dictionary.
    ///
    /// Applies `LW LC LJ ML D RI FL CA ca`; other entries (soft masks,
    /// blend modes, fonts) are ignored.
    ///
    /// PDF operator: `gs`
    pub fn do_gs(&mut self, name: &str) -> Result<()> {
        let Some((_, params)) = self.lookup_resource("ExtGState", name)? else {
            tracing::warn!(name, "ExtGState resource not found");
            return Ok(());
        };
        let Ok(params) = params.as_dict() else {
            tracing::warn!(name, "ExtGState resource is not a dictionary");
            return Ok(());
        };

        let doc = self.doc;
        for (key, value) in params {
            let value = doc.deref(value)?;
            match key.as_str() {
                "LW" => {
                    if let Ok(w) = value.as_num() {
                        self.do_w(w);
                    }
                }
                "LC" => {
                    if let Ok(n) = value.as_int() {
                        self.do_J(n);
                    }
                }
                "LJ" => {
                    if let Ok(n) = value.as_int() {
                        self.do_j(n);
                    }
                }
                "ML" => {
                    if let Ok(m) = value.as_num() {
                        self.do_M(m);
                    }
                }
                "D" => {
                    if let Ok([array, phase]) = value.as_array() {
                        let phase = doc.deref(phase)?.as_num().unwrap_or(0.0);
                        let dashes = match &*doc.deref(array)? {
                            PDFObject::Array(items) => {
                                items.iter().filter_map(|d| d.as_num().ok()).collect()
                            }
                            _ => Vec::new(),
                        };
                        self.do_d(dashes, phase);
                    }
                }
                "RI" => {
                    if let Ok(intent) = value.as_name() {
                        self.do_ri(intent);
                    }
                }
                "FL" => {
                    if let Ok(f) = value.as_num() {
                        self.do_i(f);
                    }
                }
                "CA" => {
                    if let Ok(a) = value.as_num() {
                        self.graphicstate.stroke_alpha = a.clamp(0.0, 1.0);
                    }
                }
                "ca" => {
                    if let Ok(a) = value.as_num() {
                        self.graphicstate.fill_alpha = a.clamp(0.0, 1.0);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
