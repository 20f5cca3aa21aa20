//! Operator sink that paints into a [`PixelBuffer`].

use super::fill::{ClipMask, FillRule, fill_polygons};
use super::image::draw_image;
use super::path::{FLATTEN_TOLERANCE, Polyline, flatten};
use super::pixmap::PixelBuffer;
use super::stroke::stroke_outline;
use crate::image::DecodedImage;
use crate::interp::device::{OperatorSink, PathSegment};
use crate::model::state::{Color, PDFGraphicState};
use crate::utils::{Matrix, Rect, apply_matrix_pt, mult_matrix};
use std::sync::Arc;

/// Paints interpreted page content through a fixed page-to-device
/// transform.
///
/// The device keeps the clip; `save_state`/`restore_state` bracket it the
/// same way `q`/`Q` bracket the interpreter's graphics state.
pub struct RasterDevice<'b> {
    buffer: &'b mut PixelBuffer,
    base: Matrix,
    ctm: Matrix,
    anti_alias: bool,
    clip: Option<Arc<ClipMask>>,
    clip_stack: Vec<Option<Arc<ClipMask>>>,
}

impl<'b> RasterDevice<'b> {
    /// `base` maps page space to device pixels.
    pub fn new(buffer: &'b mut PixelBuffer, base: Matrix, anti_alias: bool) -> Self {
        Self {
            buffer,
            base,
            ctm: base,
            anti_alias,
            clip: None,
            clip_stack: Vec::new(),
        }
    }

    fn fill(&mut self, polys: &[Polyline], rule: FillRule, color: &Color, alpha: f64) {
        // Coloured patterns are not painted.
        if color.to_rgb().is_none() {
            return;
        }
        let rgb = color.to_rgb8();
        let (width, height) = (self.buffer.width(), self.buffer.height());
        let clip = self.clip.as_deref();
        let buffer = &mut *self.buffer;
        fill_polygons(polys, rule, width, height, self.anti_alias, |y, x0, span| {
            for (i, &cov) in span.iter().enumerate() {
                if cov == 0 {
                    continue;
                }
                let x = x0 + i as u32;
                let clip_cov = clip.map_or(255, |c| c.coverage(x, y));
                let opacity = alpha * f64::from(cov) / 255.0 * f64::from(clip_cov) / 255.0;
                buffer.blend(x, y, rgb, opacity as f32);
            }
        });
    }
}

impl OperatorSink for RasterDevice<'_> {
    fn set_ctm(&mut self, ctm: Matrix) {
        self.ctm = mult_matrix(ctm, self.base);
    }

    fn save_state(&mut self) {
        self.clip_stack.push(self.clip.clone());
    }

    fn restore_state(&mut self) {
        if let Some(clip) = self.clip_stack.pop() {
            self.clip = clip;
        }
    }

    fn paint_path(
        &mut self,
        graphicstate: &PDFGraphicState,
        stroke: bool,
        fill: bool,
        evenodd: bool,
        path: &[PathSegment],
    ) {
        if fill {
            let polys = flatten(path, self.ctm, FLATTEN_TOLERANCE);
            self.fill(
                &polys,
                FillRule::from_evenodd(evenodd),
                &graphicstate.ncolor,
                graphicstate.fill_alpha,
            );
        }
        if stroke {
            let polys = stroke_outline(path, graphicstate, self.ctm);
            self.fill(&polys, FillRule::NonZero, &graphicstate.scolor, graphicstate.stroke_alpha);
        }
    }

    fn clip_path(&mut self, path: &[PathSegment], evenodd: bool) {
        let polys = flatten(path, self.ctm, FLATTEN_TOLERANCE);
        let mask = ClipMask::from_polygons(
            &polys,
            FillRule::from_evenodd(evenodd),
            self.buffer.width(),
            self.buffer.height(),
            self.anti_alias,
        );
        let mask = match &self.clip {
            Some(current) => current.intersect(&mask),
            None => mask,
        };
        self.clip = Some(Arc::new(mask));
    }

    fn draw_image(&mut self, image: &DecodedImage, graphicstate: &PDFGraphicState) {
        draw_image(
            self.buffer,
            image,
            self.ctm,
            graphicstate.fill_alpha,
            self.clip.as_deref(),
        );
    }

    fn draw_glyph_box(&mut self, graphicstate: &PDFGraphicState, bbox: Rect, matrix: Matrix) {
        let m = mult_matrix(matrix, self.ctm);
        let (x0, y0, x1, y1) = bbox;
        let points = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
            .into_iter()
            .map(|p| apply_matrix_pt(m, p))
            .collect();
        let poly = Polyline { points, closed: true };
        self.fill(
            &[poly],
            FillRule::NonZero,
            &graphicstate.ncolor,
            graphicstate.fill_alpha,
        );
    }
}
