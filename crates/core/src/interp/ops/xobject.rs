//! XObject operators.
//!
//! Handles: Do, BI/ID/EI
//!
//! - Do: Paint a named XObject. Images are decoded and handed to the sink;
//!   forms replay their own content under their `/Matrix`, clipped to their
//!   `/BBox`.
//! - BI/ID/EI: Inline images, decoded like image XObjects.
//!
//! Marked content operators (BMC, BDC, EMC, MP, DP) carry no painting and
//! are dropped by the dispatcher.

use crate::error::Result;
use crate::image::decode_image;
use crate::interp::device::OperatorSink;
use crate::interp::interpreter::PDFPageInterpreter;
use crate::model::objects::{PDFDict, PDFObject, PDFStream};
use crate::utils::{MATRIX_IDENTITY, Matrix, Rect};

/// Deepest form nesting replayed.
const MAX_FORM_DEPTH: usize = 32;

#[allow(non_snake_case)]
impl<'a, D: OperatorSink> PDFPageInterpreter<'a, D> {
    // ========================================================================
    // XObject Operators
    // ========================================================================

    /// Do - Invoke named XObject (images or form XObjects).
    ///
    /// PDF operator: `Do`
    pub fn do_Do(&mut self, xobjid: &str) -> Result<()> {
        let Some((objid, xobj)) = self.lookup_resource("XObject", xobjid)? else {
            tracing::warn!(name = xobjid, "XObject resource not found");
            return Ok(());
        };
        let PDFObject::Stream(stream) = xobj else {
            tracing::warn!(name = xobjid, "XObject is not a stream");
            return Ok(());
        };

        match stream.get("Subtype").and_then(|s| s.as_name().ok()) {
            Some("Image") => self.render_image(&stream),
            Some("Form") => self.render_form(objid.or(stream.objid), &stream),
            other => {
                tracing::debug!(name = xobjid, subtype = ?other, "XObject subtype not painted");
                Ok(())
            }
        }
    }

    /// BI/ID/EI - Paint an inline image.
    pub fn do_inline_image(&mut self, dict: PDFDict, data: Vec<u8>) -> Result<()> {
        self.render_image(&PDFStream::new(dict, data))
    }

    /// Decode an image and paint it into the unit square of user space.
    ///
    /// Filter errors propagate; a colour space that cannot be painted skips
    /// the image.
    fn render_image(&mut self, stream: &PDFStream) -> Result<()> {
        let data = self.doc.decode_stream(stream)?;
        let decoded = decode_image(
            self.doc,
            &self.resources,
            &stream.attrs,
            &data,
            &self.graphicstate.ncolor,
        )?;
        if let Some(image) = decoded {
            self.device.draw_image(&image, &self.graphicstate);
        }
        Ok(())
    }

    /// Replay a form XObject.
    ///
    /// The form runs inside its own `q`/`Q` pair with its resources (when it
    /// has any) in effect. Whatever the form leaves on the state stack is
    /// popped when it ends.
    fn render_form(&mut self, objid: Option<u32>, stream: &PDFStream) -> Result<()> {
        if self.form_stack.len() >= MAX_FORM_DEPTH {
            tracing::warn!(depth = self.form_stack.len(), "form XObjects nested too deeply");
            return Ok(());
        }
        if objid.is_some() && self.form_stack.contains(&objid) {
            tracing::warn!(objid = ?objid, "recursive form XObject skipped");
            return Ok(());
        }

        let content = self.doc.decode_stream(stream)?;
        let matrix = self.form_matrix(stream)?;
        let bbox = self.form_bbox(stream)?;
        let form_resources = match stream.get("Resources") {
            Some(res) => self.doc.deref(res)?.as_dict().ok().cloned(),
            None => None,
        };

        let base_depth = self.gstack.len();
        let outer_path = std::mem::take(&mut self.curpath);
        let outer_point = self.current_point.take();
        let outer_clip = self.pending_clip.take();
        let outer_resources = form_resources.map(|res| std::mem::replace(&mut self.resources, res));

        self.do_q();
        let outer_floor = std::mem::replace(&mut self.gstack_floor, self.gstack.len());
        self.form_stack.push(objid);

        self.do_cm(matrix);
        if let Some((x0, y0, x1, y1)) = bbox {
            self.do_re(x0, y0, x1 - x0, y1 - y0);
            self.do_W();
            self.do_n();
        }
        let result = self.execute(&content);

        self.form_stack.pop();
        self.gstack_floor = outer_floor;
        self.restore_to_depth(base_depth);
        if let Some(res) = outer_resources {
            self.resources = res;
        }
        self.curpath = outer_path;
        self.current_point = outer_point;
        self.pending_clip = outer_clip;
        result
    }

    fn form_matrix(&self, stream: &PDFStream) -> Result<Matrix> {
        let Some(obj) = stream.get("Matrix") else {
            return Ok(MATRIX_IDENTITY);
        };
        let obj = self.doc.deref(obj)?;
        let values: Vec<f64> = match obj.as_array() {
            Ok(items) => items.iter().filter_map(|v| v.as_num().ok()).collect(),
            Err(_) => Vec::new(),
        };
        match values.as_slice() {
            &[a, b, c, d, e, f] => Ok((a, b, c, d, e, f)),
            _ => Ok(MATRIX_IDENTITY),
        }
    }

    fn form_bbox(&self, stream: &PDFStream) -> Result<Option<Rect>> {
        let Some(obj) = stream.get("BBox") else {
            return Ok(None);
        };
        let obj = self.doc.deref(obj)?;
        let values: Vec<f64> = match obj.as_array() {
            Ok(items) => items.iter().filter_map(|v| v.as_num().ok()).collect(),
            Err(_) => Vec::new(),
        };
        match values.as_slice() {
            &[x0, y0, x1, y1] => Ok(Some((x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))),
            _ => Ok(None),
        }
    }
}
