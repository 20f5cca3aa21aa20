//! Page descriptors and page tree flattening.
//!
//! The page tree is walked depth first, in `/Kids` order. `/Resources`,
//! `/MediaBox`, `/CropBox` and `/Rotate` are inherited from the nearest
//! ancestor that defines them.

use super::catalog::PDFDocument;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject};
use crate::utils::Rect;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// US Letter, used when no media box can be found.
pub const DEFAULT_MEDIABOX: Rect = (0.0, 0.0, 612.0, 792.0);

/// Deepest page tree accepted.
const MAX_TREE_DEPTH: usize = 128;

/// Everything the renderer needs to know about one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDescriptor {
    /// Zero-based position in document order
    pub index: usize,
    /// Object number of the `/Page` dictionary (0 for a direct dictionary)
    pub objid: u32,
    /// Media box, normalised so that x0 <= x1 and y0 <= y1
    pub mediabox: Rect,
    /// Crop box, if one is set on the page or an ancestor
    pub cropbox: Option<Rect>,
    /// Clockwise rotation: 0, 90, 180 or 270
    pub rotate: u16,
    /// `/UserUnit` (PDF 1.6), 1.0 when absent
    pub user_unit: f64,
    /// Resolved resource dictionary (may be empty)
    pub resources: PDFDict,
    /// Content stream entries in drawing order
    pub contents: Vec<PDFObject>,
}

impl PageDescriptor {
    /// Media box width in user space units.
    pub fn width(&self) -> f64 {
        self.mediabox.2 - self.mediabox.0
    }

    /// Media box height in user space units.
    pub fn height(&self) -> f64 {
        self.mediabox.3 - self.mediabox.1
    }

    /// Width and height as displayed, i.e. swapped for 90/270 rotation and
    /// multiplied by `/UserUnit`.
    pub fn display_size(&self) -> (f64, f64) {
        let (w, h) = (self.width() * self.user_unit, self.height() * self.user_unit);
        if self.rotate % 180 == 90 { (h, w) } else { (w, h) }
    }
}

/// Normalise a `/Rotate` value to 0, 90, 180 or 270.
///
/// Multiples of 90 are reduced modulo 360 (negative values included).
/// Anything else is coerced to 0 with a warning.
pub fn normalize_rotation(value: &PDFObject) -> u16 {
    let degrees = match value {
        PDFObject::Int(n) => Some(*n),
        PDFObject::Real(r) if r.fract() == 0.0 && r.is_finite() => Some(*r as i64),
        _ => None,
    };
    match degrees {
        Some(d) if d % 90 == 0 => d.rem_euclid(360) as u16,
        _ => {
            tracing::warn!(rotate = ?value, "page rotation is not a multiple of 90, using 0");
            0
        }
    }
}

/// Attributes a `/Pages` node passes down to its kids.
#[derive(Debug)]
struct InheritedNode {
    parent: Option<Arc<InheritedNode>>,
    resources: Option<PDFObject>,
    mediabox: Option<PDFObject>,
    cropbox: Option<PDFObject>,
    rotate: Option<PDFObject>,
}

impl InheritedNode {
    fn root() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            resources: None,
            mediabox: None,
            cropbox: None,
            rotate: None,
        })
    }

    fn from_dict(parent: &Arc<InheritedNode>, dict: &PDFDict) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            resources: dict.get("Resources").cloned(),
            mediabox: dict.get("MediaBox").cloned(),
            cropbox: dict.get("CropBox").cloned(),
            rotate: dict.get("Rotate").cloned(),
        })
    }

    fn lookup(&self, pick: fn(&InheritedNode) -> Option<&PDFObject>) -> Option<&PDFObject> {
        pick(self).or_else(|| self.parent.as_ref().and_then(|p| p.lookup(pick)))
    }
}

struct TreeWalker<'d> {
    doc: &'d PDFDocument,
    ancestors: FxHashSet<u32>,
    pages: Vec<PageDescriptor>,
}

impl<'d> TreeWalker<'d> {
    fn walk(
        &mut self,
        node: &PDFObject,
        objid: u32,
        inherited: &Arc<InheritedNode>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(PdfError::malformed(0, "page tree is nested too deeply"));
        }
        let dict = node.as_dict()?;
        let node_type = dict.get("Type").and_then(|t| t.as_name().ok());
        let is_pages = match node_type {
            Some("Pages") => true,
            Some("Page") => false,
            // Untyped nodes: anything with kids is an intermediate node.
            _ => dict.contains_key("Kids"),
        };

        if !is_pages {
            let page = self.build_page(objid, dict, inherited)?;
            self.pages.push(page);
            return Ok(());
        }

        let here = InheritedNode::from_dict(inherited, dict);
        let kids_obj = match dict.get("Kids") {
            Some(kids) => self.doc.deref(kids)?,
            None => return Ok(()),
        };
        let kids = kids_obj.as_array()?;
        for kid in kids {
            match kid {
                PDFObject::Ref(PDFObjRef { objid: kid_id, .. }) => {
                    if !self.ancestors.insert(*kid_id) {
                        return Err(PdfError::CircularReference(*kid_id));
                    }
                    let kid_obj = self.doc.getobj_shared(*kid_id)?;
                    let result = self.walk(&kid_obj, *kid_id, &here, depth + 1);
                    self.ancestors.remove(kid_id);
                    result?;
                }
                PDFObject::Dict(_) => self.walk(kid, 0, &here, depth + 1)?,
                other => {
                    tracing::warn!(kid = ?other, "skipping page tree kid that is not a dictionary");
                }
            }
        }
        Ok(())
    }

    fn parse_box(&self, obj: Option<&PDFObject>) -> Option<Rect> {
        let resolved = self.doc.deref(obj?).ok()?;
        let arr = resolved.as_array().ok()?;
        let [x0, y0, x1, y1] = arr else {
            return None;
        };
        let (x0, y0) = (x0.as_num().ok()?, y0.as_num().ok()?);
        let (x1, y1) = (x1.as_num().ok()?, y1.as_num().ok()?);
        if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
            return None;
        }
        Some((x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
    }

    fn build_page(
        &self,
        objid: u32,
        dict: &PDFDict,
        inherited: &Arc<InheritedNode>,
    ) -> Result<PageDescriptor> {
        let index = self.pages.len();
        let pick = |key: &str, parent: fn(&InheritedNode) -> Option<&PDFObject>| {
            dict.get(key).or_else(|| inherited.lookup(parent))
        };

        let mediabox = match self.parse_box(pick("MediaBox", |n| n.mediabox.as_ref())) {
            Some(mb) => mb,
            None => {
                tracing::warn!(page = index, "page has no usable /MediaBox, assuming US Letter");
                DEFAULT_MEDIABOX
            }
        };
        let cropbox = self.parse_box(pick("CropBox", |n| n.cropbox.as_ref()));

        let rotate = match pick("Rotate", |n| n.rotate.as_ref()) {
            Some(obj) => normalize_rotation(&*self.doc.deref(obj)?),
            None => 0,
        };

        let user_unit = dict
            .get("UserUnit")
            .and_then(|u| u.as_num().ok())
            .filter(|u| u.is_finite() && *u > 0.0)
            .unwrap_or(1.0);

        let resources = match pick("Resources", |n| n.resources.as_ref()) {
            Some(obj) => match self.doc.deref(obj) {
                Ok(res) => res.as_dict().cloned().unwrap_or_default(),
                Err(err @ PdfError::CircularReference(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(page = index, error = %err, "page resources unavailable");
                    PDFDict::new()
                }
            },
            None => PDFDict::new(),
        };

        let contents = match dict.get("Contents") {
            None => Vec::new(),
            Some(obj @ PDFObject::Ref(_)) => match &*self.doc.deref(obj)? {
                // A referenced array of streams is flattened.
                PDFObject::Array(items) => items.clone(),
                _ => vec![obj.clone()],
            },
            Some(PDFObject::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        };

        Ok(PageDescriptor {
            index,
            objid,
            mediabox,
            cropbox,
            rotate,
            user_unit,
            resources,
            contents,
        })
    }
}

/// Flatten the page tree under the catalog's `/Pages` entry.
///
/// The recorded `/Count` is only compared against the result; a mismatch is
/// logged and the flattened count wins.
pub fn flatten_page_tree(doc: &PDFDocument) -> Result<Vec<PageDescriptor>> {
    let pages_entry = doc
        .catalog()
        .get("Pages")
        .ok_or_else(|| PdfError::malformed(0, "catalog has no /Pages entry"))?;

    let mut walker = TreeWalker {
        doc,
        ancestors: FxHashSet::default(),
        pages: Vec::new(),
    };

    let (root, root_id) = match pages_entry {
        PDFObject::Ref(r) => (doc.getobj_shared(r.objid)?, r.objid),
        other => (Arc::new(other.clone()), 0),
    };
    walker.ancestors.insert(root_id);
    walker.walk(&root, root_id, &InheritedNode::root(), 0)?;

    let declared = root
        .get("Count")
        .and_then(|c| doc.deref(c).ok())
        .and_then(|c| c.as_int().ok());
    if let Some(declared) = declared
        && declared != walker.pages.len() as i64
    {
        tracing::warn!(
            declared,
            actual = walker.pages.len(),
            "page tree /Count disagrees with the number of leaf pages"
        );
    }

    tracing::debug!(pages = walker.pages.len(), "flattened page tree");
    Ok(walker.pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(&PDFObject::Int(0)), 0);
        assert_eq!(normalize_rotation(&PDFObject::Int(450)), 90);
        assert_eq!(normalize_rotation(&PDFObject::Int(-90)), 270);
        assert_eq!(normalize_rotation(&PDFObject::Real(180.0)), 180);
        assert_eq!(normalize_rotation(&PDFObject::Int(45)), 0);
        assert_eq!(normalize_rotation(&PDFObject::Name("x".into())), 0);
    }

    #[test]
    fn test_display_size_swaps_for_quarter_turns() {
        let mut page = PageDescriptor {
            index: 0,
            objid: 3,
            mediabox: (0.0, 0.0, 200.0, 100.0),
            cropbox: None,
            rotate: 90,
            user_unit: 1.0,
            resources: PDFDict::new(),
            contents: Vec::new(),
        };
        assert_eq!(page.display_size(), (100.0, 200.0));
        page.rotate = 180;
        page.user_unit = 2.0;
        assert_eq!(page.display_size(), (400.0, 200.0));
    }
}
