//! Operator sink - output interface for page interpretation.
//!
//! The interpreter reduces a content stream to a handful of painting calls.
//! Geometry is passed in user space; the sink learns the CTM through
//! [`OperatorSink::set_ctm`] and composes it with its own device transform.

use crate::image::DecodedImage;
use crate::model::state::PDFGraphicState;
use crate::utils::{Matrix, Rect};

/// Path segment for graphics operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    /// Move to point (x, y)
    MoveTo(f64, f64),
    /// Line to point (x, y)
    LineTo(f64, f64),
    /// Cubic bezier curve (x1, y1, x2, y2, x3, y3)
    CurveTo(f64, f64, f64, f64, f64, f64),
    /// Close path
    ClosePath,
}

/// Receiver of interpreted page content.
///
/// Every method has a no-op default so that partial sinks (counters,
/// recorders) only implement what they need.
pub trait OperatorSink {
    /// Set the current transformation matrix (user space -> page space).
    fn set_ctm(&mut self, _ctm: Matrix) {}

    /// `q`: save the device-side state (the clip).
    fn save_state(&mut self) {}

    /// `Q`: restore the device-side state saved by the matching `q`.
    fn restore_state(&mut self) {}

    /// Paint a path with the fill and/or stroke parameters of `graphicstate`.
    fn paint_path(
        &mut self,
        _graphicstate: &PDFGraphicState,
        _stroke: bool,
        _fill: bool,
        _evenodd: bool,
        _path: &[PathSegment],
    ) {
    }

    /// Intersect the clip with `path`.
    fn clip_path(&mut self, _path: &[PathSegment], _evenodd: bool) {}

    /// Paint an image into the unit square of user space.
    fn draw_image(&mut self, _image: &DecodedImage, _graphicstate: &PDFGraphicState) {}

    /// Paint one glyph as a filled box. `bbox` is in glyph space, `matrix`
    /// maps glyph space to user space.
    fn draw_glyph_box(&mut self, _graphicstate: &PDFGraphicState, _bbox: Rect, _matrix: Matrix) {}
}

/// One call received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    SetCtm(Matrix),
    Save,
    Restore,
    Paint {
        stroke: bool,
        fill: bool,
        evenodd: bool,
        path: Vec<PathSegment>,
    },
    Clip {
        evenodd: bool,
        path: Vec<PathSegment>,
    },
    Image {
        width: u32,
        height: u32,
    },
    GlyphBox {
        bbox: Rect,
        matrix: Matrix,
    },
}

/// Sink that records every call, for inspecting what a page draws.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded glyph boxes, in drawing order.
    pub fn glyph_boxes(&self) -> Vec<(Rect, Matrix)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::GlyphBox { bbox, matrix } => Some((*bbox, *matrix)),
                _ => None,
            })
            .collect()
    }
}

impl OperatorSink for RecordingSink {
    fn set_ctm(&mut self, ctm: Matrix) {
        self.events.push(SinkEvent::SetCtm(ctm));
    }

    fn save_state(&mut self) {
        self.events.push(SinkEvent::Save);
    }

    fn restore_state(&mut self) {
        self.events.push(SinkEvent::Restore);
    }

    fn paint_path(
        &mut self,
        _graphicstate: &PDFGraphicState,
        stroke: bool,
        fill: bool,
        evenodd: bool,
        path: &[PathSegment],
    ) {
        self.events.push(SinkEvent::Paint {
            stroke,
            fill,
            evenodd,
            path: path.to_vec(),
        });
    }

    fn clip_path(&mut self, path: &[PathSegment], evenodd: bool) {
        self.events.push(SinkEvent::Clip {
            evenodd,
            path: path.to_vec(),
        });
    }

    fn draw_image(&mut self, image: &DecodedImage, _graphicstate: &PDFGraphicState) {
        self.events.push(SinkEvent::Image {
            width: image.width,
            height: image.height,
        });
    }

    fn draw_glyph_box(&mut self, _graphicstate: &PDFGraphicState, bbox: Rect, matrix: Matrix) {
        self.events.push(SinkEvent::GlyphBox { bbox, matrix });
    }
}
