//! Stroke outlining.
//!
//! A stroke becomes a set of polygons in user space (one quad per segment
//! plus join and cap pieces), all with the same orientation, so a nonzero
//! fill of the set paints their union. The polygons are then mapped to
//! device space.

use super::path::{FLATTEN_TOLERANCE, Polyline, flatten};
use crate::interp::device::PathSegment;
use crate::model::state::{LineCap, LineJoin, PDFGraphicState};
use crate::utils::{MATRIX_IDENTITY, Matrix, Point, apply_matrix_pt, matrix_scale};
use std::f64::consts::PI;

const EPSILON: f64 = 1e-9;

/// Outline the stroke of `path` under `gstate`, in device space.
///
/// Lines are never thinner than one device pixel.
pub(crate) fn stroke_outline(path: &[PathSegment], gstate: &PDFGraphicState, ctm: Matrix) -> Vec<Polyline> {
    let scale = matrix_scale(ctm);
    if !scale.is_finite() || scale <= EPSILON {
        return Vec::new();
    }
    let lines = flatten(path, MATRIX_IDENTITY, FLATTEN_TOLERANCE / scale);
    let lines = dash(lines, &gstate.dash.0, gstate.dash.1);

    let mut outliner = Outliner {
        half_width: gstate.linewidth.max(1.0 / scale) / 2.0,
        cap: gstate.linecap,
        join: gstate.linejoin,
        miter_limit: gstate.miterlimit,
        arc_segments: arc_segments(gstate.linewidth.max(1.0 / scale) / 2.0 * scale),
        out: Vec::new(),
    };
    for line in &lines {
        outliner.outline(line);
    }

    for poly in &mut outliner.out {
        for pt in &mut poly.points {
            *pt = apply_matrix_pt(ctm, *pt);
        }
    }
    outliner.out
}

/// Segments for a full circle of device radius `radius`.
fn arc_segments(radius: f64) -> usize {
    if radius <= FLATTEN_TOLERANCE {
        return 8;
    }
    let n = (PI / (1.0 - FLATTEN_TOLERANCE / radius).acos()).ceil();
    if n.is_finite() { (n as usize).clamp(8, 256) } else { 8 }
}

/// Split polylines into dashes. The pattern restarts at each subpath.
fn dash(lines: Vec<Polyline>, pattern: &[f64], phase: f64) -> Vec<Polyline> {
    let total: f64 = pattern.iter().sum();
    if pattern.is_empty() || !total.is_finite() || total <= EPSILON || pattern.iter().any(|&d| d < 0.0) {
        return lines;
    }
    // An odd-length array repeats with on and off swapped.
    let pattern: Vec<f64> = if pattern.len() % 2 == 1 {
        pattern.iter().chain(pattern).copied().collect()
    } else {
        pattern.to_vec()
    };
    let period: f64 = pattern.iter().sum();

    let mut start_idx = 0;
    let mut start_phase = phase.rem_euclid(period);
    while start_phase >= pattern[start_idx] {
        start_phase -= pattern[start_idx];
        start_idx = (start_idx + 1) % pattern.len();
    }

    let mut out = Vec::new();
    for line in lines {
        let mut pts = line.points;
        if line.closed && let Some(&first) = pts.first() {
            pts.push(first);
        }
        let Some(&first) = pts.first() else { continue };

        let mut idx = start_idx;
        let mut remaining = pattern[idx] - start_phase;
        let mut current = vec![first];
        for seg in pts.windows(2) {
            let (a, b) = (seg[0], seg[1]);
            let len = (b.0 - a.0).hypot(b.1 - a.1);
            let mut pos = 0.0;
            while len - pos > remaining {
                pos += remaining;
                let pt = (a.0 + (b.0 - a.0) * pos / len, a.1 + (b.1 - a.1) * pos / len);
                if idx % 2 == 0 {
                    current.push(pt);
                    out.push(Polyline {
                        points: std::mem::take(&mut current),
                        closed: false,
                    });
                } else {
                    current = vec![pt];
                }
                idx = (idx + 1) % pattern.len();
                remaining = pattern[idx];
            }
            remaining -= len - pos;
            if idx % 2 == 0 {
                current.push(b);
            }
        }
        if idx % 2 == 0 && !current.is_empty() {
            out.push(Polyline {
                points: current,
                closed: false,
            });
        }
    }
    out
}

struct Outliner {
    half_width: f64,
    cap: LineCap,
    join: LineJoin,
    miter_limit: f64,
    arc_segments: usize,
    out: Vec<Polyline>,
}

impl Outliner {
    fn outline(&mut self, line: &Polyline) {
        let mut pts: Vec<Point> = Vec::with_capacity(line.points.len());
        for &p in &line.points {
            if pts.last().is_none_or(|&q| !same_point(p, q)) {
                pts.push(p);
            }
        }
        if line.closed && pts.len() > 1 && same_point(pts[0], pts[pts.len() - 1]) {
            pts.pop();
        }

        match pts.len() {
            0 => return,
            1 => {
                self.dot(pts[0]);
                return;
            }
            _ => {}
        }

        let closed = line.closed && pts.len() > 2;
        let nseg = if closed { pts.len() } else { pts.len() - 1 };
        let dirs: Vec<Point> = (0..nseg)
            .map(|i| unit(pts[i], pts[(i + 1) % pts.len()]))
            .collect();

        for (i, &d) in dirs.iter().enumerate() {
            self.segment(pts[i], pts[(i + 1) % pts.len()], d);
        }
        for i in 1..nseg {
            self.join_at(pts[i], dirs[i - 1], dirs[i]);
        }
        if closed {
            self.join_at(pts[0], dirs[nseg - 1], dirs[0]);
        } else {
            self.cap_at(pts[0], (-dirs[0].0, -dirs[0].1));
            self.cap_at(pts[pts.len() - 1], dirs[nseg - 1]);
        }
    }

    fn normal(&self, d: Point) -> Point {
        (-d.1 * self.half_width, d.0 * self.half_width)
    }

    fn segment(&mut self, a: Point, b: Point, d: Point) {
        let n = self.normal(d);
        self.push(vec![
            (a.0 + n.0, a.1 + n.1),
            (b.0 + n.0, b.1 + n.1),
            (b.0 - n.0, b.1 - n.1),
            (a.0 - n.0, a.1 - n.1),
        ]);
    }

    fn join_at(&mut self, v: Point, d0: Point, d1: Point) {
        let cross = d0.0 * d1.1 - d0.1 * d1.0;
        let dot = d0.0 * d1.0 + d0.1 * d1.1;
        if cross.abs() < EPSILON && dot > 0.0 {
            return;
        }
        if self.join == LineJoin::Round {
            self.circle(v);
            return;
        }
        // The outer side of a left turn is on the right.
        let s = if cross > 0.0 { -1.0 } else { 1.0 };
        let (n0, n1) = (self.normal(d0), self.normal(d1));
        let a = (v.0 + s * n0.0, v.1 + s * n0.1);
        let b = (v.0 + s * n1.0, v.1 + s * n1.1);

        if self.join == LineJoin::Miter && dot > -1.0 + EPSILON {
            let ratio = 1.0 / ((1.0 + dot) / 2.0).sqrt();
            if ratio <= self.miter_limit {
                let tip = (
                    v.0 + s * (n0.0 + n1.0) / (1.0 + dot),
                    v.1 + s * (n0.1 + n1.1) / (1.0 + dot),
                );
                self.push(vec![v, a, tip, b]);
                return;
            }
        }
        self.push(vec![v, a, b]);
    }

    /// Cap at `p`, where `d` points away from the line.
    fn cap_at(&mut self, p: Point, d: Point) {
        match self.cap {
            LineCap::Butt => {}
            LineCap::Round => self.circle(p),
            LineCap::Square => {
                let n = self.normal(d);
                let e = (d.0 * self.half_width, d.1 * self.half_width);
                self.push(vec![
                    (p.0 + n.0, p.1 + n.1),
                    (p.0 + n.0 + e.0, p.1 + n.1 + e.1),
                    (p.0 - n.0 + e.0, p.1 - n.1 + e.1),
                    (p.0 - n.0, p.1 - n.1),
                ]);
            }
        }
    }

    /// A zero-length subpath paints a dot for round and square caps.
    fn dot(&mut self, p: Point) {
        let h = self.half_width;
        match self.cap {
            LineCap::Butt => {}
            LineCap::Round => self.circle(p),
            LineCap::Square => self.push(vec![
                (p.0 - h, p.1 - h),
                (p.0 + h, p.1 - h),
                (p.0 + h, p.1 + h),
                (p.0 - h, p.1 + h),
            ]),
        }
    }

    fn circle(&mut self, c: Point) {
        let n = self.arc_segments;
        let points = (0..n)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / n as f64;
                (c.0 + self.half_width * t.cos(), c.1 + self.half_width * t.sin())
            })
            .collect();
        self.push(points);
    }

    /// Add a polygon, reversed if needed so that all pieces wind alike.
    fn push(&mut self, mut points: Vec<Point>) {
        if signed_area(&points) < 0.0 {
            points.reverse();
        }
        self.out.push(Polyline { points, closed: true });
    }
}

fn same_point(a: Point, b: Point) -> bool {
    (a.0 - b.0).abs() < EPSILON && (a.1 - b.1).abs() < EPSILON
}

fn unit(a: Point, b: Point) -> Point {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = dx.hypot(dy);
    (dx / len, dy / len)
}

fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.0 * b.1 - b.0 * a.1
        })
        .sum::<f64>()
        / 2.0
}
