//! Color operators.
//!
//! Handles: G, g, RG, rg, K, k, CS, cs, SC, SCN, sc, scn
//!
//! - G/g: DeviceGray (stroke/non-stroke)
//! - RG/rg: DeviceRGB (stroke/non-stroke)
//! - K/k: DeviceCMYK (stroke/non-stroke)
//! - CS/cs: Select a colour space (device name, resource name or array)
//! - SC/SCN/sc/scn: Set color in current color space

use crate::document::PDFDocument;
use crate::error::Result;
use crate::interp::device::OperatorSink;
use crate::interp::interpreter::PDFPageInterpreter;
use crate::model::color::PDFColorSpace;
use crate::model::objects::{PDFDict, PDFObject};
use crate::model::state::Color;

/// Nesting allowed in colour space definitions (Indexed base, Pattern base).
const MAX_COLORSPACE_DEPTH: usize = 8;

/// Resolve a colour space operand or `/ColorSpace` entry.
///
/// Names are looked up among the device spaces first, then in the
/// `/ColorSpace` resources. Returns `None` for spaces that cannot be
/// painted (unknown families, malformed arrays).
pub(crate) fn resolve_colorspace(
    doc: &PDFDocument,
    resources: &PDFDict,
    spec: &PDFObject,
) -> Result<Option<PDFColorSpace>> {
    resolve_at_depth(doc, resources, spec, 0)
}

fn resolve_at_depth(
    doc: &PDFDocument,
    resources: &PDFDict,
    spec: &PDFObject,
    depth: usize,
) -> Result<Option<PDFColorSpace>> {
    if depth > MAX_COLORSPACE_DEPTH {
        return Ok(None);
    }
    let spec = doc.deref(spec)?;
    match &*spec {
        PDFObject::Name(name) => {
            if let Some(cs) = PDFColorSpace::from_name(name) {
                return Ok(Some(cs));
            }
            let Some(group) = resources.get("ColorSpace") else {
                return Ok(None);
            };
            let group = doc.deref(group)?;
            match group.as_dict().ok().and_then(|g| g.get(name.as_str())) {
                Some(entry) => resolve_at_depth(doc, resources, entry, depth + 1),
                None => Ok(None),
            }
        }
        PDFObject::Array(items) => {
            let Some(family) = items.first().and_then(|f| f.as_name().ok()) else {
                return Ok(None);
            };
            match family {
                "ICCBased" => {
                    let Some(profile) = items.get(1) else {
                        return Ok(None);
                    };
                    let profile = doc.deref(profile)?;
                    let Ok(attrs) = profile.as_dict() else {
                        return Ok(None);
                    };
                    let n = attrs
                        .get("N")
                        .and_then(|n| doc.deref(n).ok())
                        .and_then(|n| n.as_int().ok());
                    if let Some(cs) = n.and_then(PDFColorSpace::from_icc_components) {
                        return Ok(Some(cs));
                    }
                    match attrs.get("Alternate") {
                        Some(alt) => resolve_at_depth(doc, resources, alt, depth + 1),
                        None => Ok(None),
                    }
                }
                "Indexed" | "I" => {
                    let [_, base, hival, lookup, ..] = items.as_slice() else {
                        return Ok(None);
                    };
                    let Some(base) = resolve_at_depth(doc, resources, base, depth + 1)? else {
                        return Ok(None);
                    };
                    let hival = doc.deref(hival)?.as_int().unwrap_or(0).clamp(0, 255) as u8;
                    let lookup = match &*doc.deref(lookup)? {
                        PDFObject::String(bytes) => bytes.clone(),
                        PDFObject::Stream(stream) => doc.decode_stream(stream)?,
                        _ => Vec::new(),
                    };
                    Ok(Some(PDFColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        lookup,
                    }))
                }
                "Separation" => Ok(Some(PDFColorSpace::Tint(1))),
                "DeviceN" => {
                    let n = match items.get(1) {
                        Some(names) => doc.deref(names)?.as_array().map_or(1, <[_]>::len),
                        None => 1,
                    };
                    Ok(Some(PDFColorSpace::Tint(n.max(1))))
                }
                "Pattern" => {
                    let base = match items.get(1) {
                        Some(base) => resolve_at_depth(doc, resources, base, depth + 1)?,
                        None => None,
                    };
                    Ok(Some(PDFColorSpace::Pattern(base.map(Box::new))))
                }
                other => Ok(PDFColorSpace::from_name(other)),
            }
        }
        _ => Ok(None),
    }
}

/// Build a colour from `SC`/`sc` style operands in `cs`.
///
/// A trailing name selects a pattern. Returns `None` when there are too few
/// numeric operands for the colour space.
fn color_from_operands(cs: &PDFColorSpace, args: &[PDFObject]) -> Option<Color> {
    let (has_pattern, nums) = match args.split_last() {
        Some((PDFObject::Name(_), rest)) => (true, rest),
        _ => (false, args),
    };
    let values: Vec<f64> = nums.iter().filter_map(|a| a.as_num().ok()).collect();
    let n = cs.ncomponents();
    let tail = &values[values.len().saturating_sub(n)..];

    match cs {
        PDFColorSpace::Pattern(Some(_)) if tail.len() == n => Some(cs.color(tail)),
        PDFColorSpace::Pattern(_) => Some(Color::Pattern(None)),
        _ if has_pattern => Some(Color::Pattern(None)),
        _ if tail.len() < n => None,
        _ => Some(cs.color(tail)),
    }
}

#[allow(non_snake_case)]
impl<'a, D: OperatorSink> PDFPageInterpreter<'a, D> {
    /// Sets the gray level for stroking operations.
    ///
    /// PDF operator: `G`
    pub fn do_G(&mut self, gray: f64) {
        self.graphicstate.scs = PDFColorSpace::DeviceGray;
        self.graphicstate.scolor = PDFColorSpace::DeviceGray.color(&[gray]);
    }

    /// Sets the gray level for non-stroking operations.
    ///
    /// PDF operator: `g`
    pub fn do_g(&mut self, gray: f64) {
        self.graphicstate.ncs = PDFColorSpace::DeviceGray;
        self.graphicstate.ncolor = PDFColorSpace::DeviceGray.color(&[gray]);
    }

    /// Sets the RGB color for stroking operations.
    ///
    /// PDF operator: `RG`
    pub fn do_RG(&mut self, r: f64, g: f64, b: f64) {
        self.graphicstate.scs = PDFColorSpace::DeviceRGB;
        self.graphicstate.scolor = PDFColorSpace::DeviceRGB.color(&[r, g, b]);
    }

    /// Sets the RGB color for non-stroking operations.
    ///
    /// PDF operator: `rg`
    pub fn do_rg(&mut self, r: f64, g: f64, b: f64) {
        self.graphicstate.ncs = PDFColorSpace::DeviceRGB;
        self.graphicstate.ncolor = PDFColorSpace::DeviceRGB.color(&[r, g, b]);
    }

    /// Sets the CMYK color for stroking operations.
    ///
    /// PDF operator: `K`
    pub fn do_K(&mut self, c: f64, m: f64, y: f64, k: f64) {
        self.graphicstate.scs = PDFColorSpace::DeviceCMYK;
        self.graphicstate.scolor = PDFColorSpace::DeviceCMYK.color(&[c, m, y, k]);
    }

    /// Sets the CMYK color for non-stroking operations.
    ///
    /// PDF operator: `k`
    pub fn do_k(&mut self, c: f64, m: f64, y: f64, k: f64) {
        self.graphicstate.ncs = PDFColorSpace::DeviceCMYK;
        self.graphicstate.ncolor = PDFColorSpace::DeviceCMYK.color(&[c, m, y, k]);
    }

    fn colorspace_or_gray(&self, spec: &PDFObject) -> Result<PDFColorSpace> {
        match resolve_colorspace(self.doc, &self.resources, spec)? {
            Some(cs) => Ok(cs),
            None => {
                tracing::warn!(colorspace = ?spec, "unsupported colour space, using DeviceGray");
                Ok(PDFColorSpace::DeviceGray)
            }
        }
    }

    /// Selects the stroking colour space and resets the colour to its
    /// initial value.
    ///
    /// PDF operator: `CS`
    pub fn do_CS(&mut self, spec: &PDFObject) -> Result<()> {
        let cs = self.colorspace_or_gray(spec)?;
        self.graphicstate.scolor = cs.initial_color();
        self.graphicstate.scs = cs;
        Ok(())
    }

    /// Selects the non-stroking colour space.
    ///
    /// PDF operator: `cs`
    pub fn do_cs(&mut self, spec: &PDFObject) -> Result<()> {
        let cs = self.colorspace_or_gray(spec)?;
        self.graphicstate.ncolor = cs.initial_color();
        self.graphicstate.ncs = cs;
        Ok(())
    }

    /// Sets the color for stroking operations in the current color space.
    ///
    /// PDF operator: `SC` / `SCN`
    pub fn do_SC(&mut self, args: &[PDFObject]) {
        if let Some(color) = color_from_operands(&self.graphicstate.scs, args) {
            self.graphicstate.scolor = color;
        }
    }

    /// Sets the color for non-stroking operations in the current color space.
    ///
    /// PDF operator: `sc` / `scn`
    pub fn do_sc(&mut self, args: &[PDFObject]) {
        if let Some(color) = color_from_operands(&self.graphicstate.ncs, args) {
            self.graphicstate.ncolor = color;
        }
    }
}
