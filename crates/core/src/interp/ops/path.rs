//! Path construction and painting operators.
//!
//! Handles: m, l, c, v, y, h, re, S, s, f, F, f*, B, B*, b, b*, n, W, W*
//!
//! Segments accumulate in user space until a painting operator hands the
//! whole path to the sink and clears it. `W`/`W*` only mark the path; the
//! clip is applied when the path is painted or ended with `n`.

use crate::interp::device::{OperatorSink, PathSegment};
use crate::interp::interpreter::PDFPageInterpreter;
use crate::utils::Point;

/// What a painting operator does with the current path.
#[derive(Debug, Clone, Copy)]
struct Paint {
    close: bool,
    stroke: bool,
    fill: bool,
    evenodd: bool,
}

impl Paint {
    const STROKE: Self = Self::new(false, true, false, false);
    const FILL: Self = Self::new(false, false, true, false);
    const NONE: Self = Self::new(false, false, false, false);

    const fn new(close: bool, stroke: bool, fill: bool, evenodd: bool) -> Self {
        Self {
            close,
            stroke,
            fill,
            evenodd,
        }
    }

    const fn closed(self) -> Self {
        Self { close: true, ..self }
    }

    const fn evenodd(self) -> Self {
        Self {
            evenodd: true,
            ..self
        }
    }

    const fn fill_stroke() -> Self {
        Self::new(false, true, true, false)
    }
}

#[allow(non_snake_case)]
impl<'a, D: OperatorSink> PDFPageInterpreter<'a, D> {
    fn push_segment(&mut self, segment: PathSegment, end: Point) {
        self.curpath.push(segment);
        self.current_point = Some(end);
    }

    /// `m`: start a new subpath.
    pub fn do_m(&mut self, x: f64, y: f64) {
        self.push_segment(PathSegment::MoveTo(x, y), (x, y));
    }

    /// `l`
    pub fn do_l(&mut self, x: f64, y: f64) {
        self.push_segment(PathSegment::LineTo(x, y), (x, y));
    }

    /// `c`: cubic Bezier to (x3, y3).
    pub fn do_c(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        self.push_segment(PathSegment::CurveTo(x1, y1, x2, y2, x3, y3), (x3, y3));
    }

    /// `v`: the first control point is the current point.
    pub fn do_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) {
        let (x1, y1) = self.current_point.unwrap_or((x2, y2));
        self.do_c(x1, y1, x2, y2, x3, y3);
    }

    /// `y`: the second control point is the end point.
    pub fn do_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) {
        self.do_c(x1, y1, x3, y3, x3, y3);
    }

    /// `h`: close the subpath; the current point returns to its start.
    pub fn do_h(&mut self) {
        let start = self.curpath.iter().rev().find_map(|seg| match *seg {
            PathSegment::MoveTo(x, y) => Some((x, y)),
            _ => None,
        });
        self.curpath.push(PathSegment::ClosePath);
        if start.is_some() {
            self.current_point = start;
        }
    }

    /// `re`: a closed rectangle subpath, `m l l l h`.
    pub fn do_re(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.curpath.extend([
            PathSegment::MoveTo(x, y),
            PathSegment::LineTo(x + w, y),
            PathSegment::LineTo(x + w, y + h),
            PathSegment::LineTo(x, y + h),
            PathSegment::ClosePath,
        ]);
        self.current_point = Some((x, y));
    }

    /// Paint the path, apply any pending clip, then clear the path.
    fn finish_path(&mut self, paint: Paint) {
        if paint.close {
            self.do_h();
        }
        if (paint.stroke || paint.fill) && !self.curpath.is_empty() {
            self.device.paint_path(
                &self.graphicstate,
                paint.stroke,
                paint.fill,
                paint.evenodd,
                &self.curpath,
            );
        }
        if let Some(clip_evenodd) = self.pending_clip.take() {
            self.device.clip_path(&self.curpath, clip_evenodd);
        }
        self.curpath.clear();
        self.current_point = None;
    }

    /// `S`
    pub fn do_S(&mut self) {
        self.finish_path(Paint::STROKE);
    }

    /// `s`: close, then stroke.
    pub fn do_s(&mut self) {
        self.finish_path(Paint::STROKE.closed());
    }

    /// `f` and the obsolete `F`: nonzero fill.
    pub fn do_f(&mut self) {
        self.finish_path(Paint::FILL);
    }

    /// `f*`
    pub fn do_f_star(&mut self) {
        self.finish_path(Paint::FILL.evenodd());
    }

    /// `B`: fill, then stroke.
    pub fn do_B(&mut self) {
        self.finish_path(Paint::fill_stroke());
    }

    /// `B*`
    pub fn do_B_star(&mut self) {
        self.finish_path(Paint::fill_stroke().evenodd());
    }

    /// `b`: close, fill, stroke.
    pub fn do_b(&mut self) {
        self.finish_path(Paint::fill_stroke().closed());
    }

    /// `b*`
    pub fn do_b_star(&mut self) {
        self.finish_path(Paint::fill_stroke().closed().evenodd());
    }

    /// `n`: end the path unpainted. A pending clip still applies.
    pub fn do_n(&mut self) {
        self.finish_path(Paint::NONE);
    }

    /// `W`
    pub fn do_W(&mut self) {
        self.pending_clip = Some(false);
    }

    /// `W*`
    pub fn do_W_star(&mut self) {
        self.pending_clip = Some(true);
    }
}

#[cfg(test)]
mod tests {
    use crate::document::PDFDocument;
    use crate::interp::device::{PathSegment, RecordingSink, SinkEvent};
    use crate::interp::interpreter::PDFPageInterpreter;
    use crate::test_support::single_page_pdf;

    fn record(content: &str) -> Vec<SinkEvent> {
        let pdf = single_page_pdf("[0 0 100 100]", "<< >>", content, &[]);
        let doc = PDFDocument::open(&pdf).unwrap();
        let page = doc.page_descriptor(0).unwrap().clone();
        let mut sink = RecordingSink::new();
        PDFPageInterpreter::new(&doc, &mut sink)
            .process_page(&page)
            .unwrap();
        sink.events
    }

    #[test]
    fn test_v_uses_current_point() {
        let events = record("10 10 m 20 20 30 10 v S");
        assert!(events.contains(&SinkEvent::Paint {
            stroke: true,
            fill: false,
            evenodd: false,
            path: vec![
                PathSegment::MoveTo(10.0, 10.0),
                PathSegment::CurveTo(10.0, 10.0, 20.0, 20.0, 30.0, 10.0),
            ],
        }));
    }

    #[test]
    fn test_y_repeats_end_point() {
        let events = record("0 0 m 5 5 10 0 y f");
        assert!(events.iter().any(|e| matches!(
            e,
            SinkEvent::Paint { fill: true, path, .. }
                if path.last() == Some(&PathSegment::CurveTo(5.0, 5.0, 10.0, 0.0, 10.0, 0.0))
        )));
    }

    #[test]
    fn test_close_fill_stroke_even_odd() {
        let events = record("0 0 m 10 0 l 10 10 l b*");
        assert!(events.iter().any(|e| matches!(
            e,
            SinkEvent::Paint { stroke: true, fill: true, evenodd: true, path }
                if path.last() == Some(&PathSegment::ClosePath)
        )));
    }

    #[test]
    fn test_end_path_paints_nothing() {
        let events = record("0 0 10 10 re n");
        assert!(!events.iter().any(|e| matches!(e, SinkEvent::Paint { .. })));
    }
}
