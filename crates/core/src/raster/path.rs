//! Path flattening.
//!
//! Curves are split into line segments after transformation, so the
//! tolerance is measured in the target space.

use crate::interp::device::PathSegment;
use crate::utils::{Matrix, Point, apply_matrix_pt};

/// Flattening tolerance in device pixels.
pub(crate) const FLATTEN_TOLERANCE: f64 = 0.25;

const MAX_CURVE_SEGMENTS: usize = 256;

/// A flattened subpath.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Polyline {
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Transform `path` by `m` and flatten it into polylines.
///
/// A subpath without an explicit moveto starts at the origin.
pub(crate) fn flatten(path: &[PathSegment], m: Matrix, tolerance: f64) -> Vec<Polyline> {
    let mut out = Vec::new();
    let mut current = Polyline::default();
    let mut start = apply_matrix_pt(m, (0.0, 0.0));
    let mut last = start;

    for seg in path {
        match *seg {
            PathSegment::MoveTo(x, y) => {
                push_polyline(&mut out, std::mem::take(&mut current));
                start = apply_matrix_pt(m, (x, y));
                last = start;
                current.points.push(start);
            }
            PathSegment::LineTo(x, y) => {
                if current.points.is_empty() {
                    current.points.push(last);
                }
                last = apply_matrix_pt(m, (x, y));
                current.points.push(last);
            }
            PathSegment::CurveTo(x1, y1, x2, y2, x3, y3) => {
                if current.points.is_empty() {
                    current.points.push(last);
                }
                let p1 = apply_matrix_pt(m, (x1, y1));
                let p2 = apply_matrix_pt(m, (x2, y2));
                let p3 = apply_matrix_pt(m, (x3, y3));
                flatten_cubic(&mut current.points, last, p1, p2, p3, tolerance);
                last = p3;
            }
            PathSegment::ClosePath => {
                if !current.points.is_empty() {
                    current.closed = true;
                    push_polyline(&mut out, std::mem::take(&mut current));
                }
                last = start;
            }
        }
    }
    push_polyline(&mut out, current);
    out
}

fn push_polyline(out: &mut Vec<Polyline>, poly: Polyline) {
    if !poly.points.is_empty() {
        out.push(poly);
    }
}

fn flatten_cubic(points: &mut Vec<Point>, p0: Point, p1: Point, p2: Point, p3: Point, tolerance: f64) {
    let dd = |a: Point, b: Point, c: Point| {
        let x = a.0 - 2.0 * b.0 + c.0;
        let y = a.1 - 2.0 * b.1 + c.1;
        x.hypot(y)
    };
    let d = dd(p0, p1, p2).max(dd(p1, p2, p3));
    let n = (0.75 * d / tolerance.max(1e-6)).sqrt().ceil();
    let n = if n.is_finite() {
        (n as usize).clamp(1, MAX_CURVE_SEGMENTS)
    } else {
        MAX_CURVE_SEGMENTS
    };

    for i in 1..=n {
        let t = i as f64 / n as f64;
        let mt = 1.0 - t;
        let (a, b, c, e) = (mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t);
        points.push((
            a * p0.0 + b * p1.0 + c * p2.0 + e * p3.0,
            a * p0.1 + b * p1.1 + c * p2.1 + e * p3.1,
        ));
    }
}
