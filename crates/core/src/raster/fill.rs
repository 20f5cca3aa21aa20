//! Scanline polygon fill and clip masks.
//!
//! Coverage is sampled at pixel centres. With anti-aliasing on, each pixel
//! takes a 4x4 grid of samples instead.

use super::path::Polyline;
use smallvec::SmallVec;

const AA_GRID: usize = 4;

/// Winding rule for fills and clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FillRule {
    NonZero,
    EvenOdd,
}

impl FillRule {
    pub(crate) const fn from_evenodd(evenodd: bool) -> Self {
        if evenodd { Self::EvenOdd } else { Self::NonZero }
    }

    const fn inside(self, winding: i32) -> bool {
        match self {
            Self::NonZero => winding != 0,
            Self::EvenOdd => winding % 2 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    y1: f64,
    dxdy: f64,
    dir: i32,
}

impl Edge {
    fn new(a: (f64, f64), b: (f64, f64)) -> Option<Self> {
        if a.1 == b.1 || !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite())
        {
            return None;
        }
        let (top, bottom, dir) = if a.1 < b.1 { (a, b, 1) } else { (b, a, -1) };
        Some(Self {
            x0: top.0,
            y0: top.1,
            y1: bottom.1,
            dxdy: (bottom.0 - top.0) / (bottom.1 - top.1),
            dir,
        })
    }

    fn x_at(&self, y: f64) -> f64 {
        self.x0 + (y - self.y0) * self.dxdy
    }
}

/// Rasterise the union of `polys` (each implicitly closed) into a
/// `width` x `height` grid.
///
/// `emit` is called once per touched row with the row index, the first
/// touched column and the coverage (0..=255) of that column onward.
pub(crate) fn fill_polygons(
    polys: &[Polyline],
    rule: FillRule,
    width: u32,
    height: u32,
    anti_alias: bool,
    mut emit: impl FnMut(u32, u32, &[u8]),
) {
    let mut edges: Vec<Edge> = Vec::new();
    for poly in polys {
        let pts = &poly.points;
        for (i, &a) in pts.iter().enumerate() {
            let b = pts[(i + 1) % pts.len()];
            edges.extend(Edge::new(a, b));
        }
    }
    if edges.is_empty() || width == 0 || height == 0 {
        return;
    }
    edges.sort_by(|a, b| a.y0.total_cmp(&b.y0));

    let ymin = edges[0].y0.floor().max(0.0);
    let ymax = edges.iter().map(|e| e.y1).fold(f64::NEG_INFINITY, f64::max);
    let ymax = ymax.ceil().min(f64::from(height));
    if ymin >= ymax {
        return;
    }

    let grid = if anti_alias { AA_GRID } else { 1 };
    let full = (grid * grid) as u32;
    let sub_width = width as usize * grid;
    let mut counts = vec![0u32; width as usize];
    let mut row = vec![0u8; width as usize];
    let mut active: Vec<Edge> = Vec::new();
    let mut crossings: SmallVec<[(f64, i32); 16]> = SmallVec::new();
    let mut next = 0;

    for y in ymin as u32..ymax as u32 {
        counts.fill(0);
        let mut touched = (usize::MAX, 0usize);

        for s in 0..grid {
            let sy = f64::from(y) + (s as f64 + 0.5) / grid as f64;
            active.retain(|e| e.y1 > sy);
            while next < edges.len() && edges[next].y0 <= sy {
                if edges[next].y1 > sy {
                    active.push(edges[next]);
                }
                next += 1;
            }

            crossings.clear();
            crossings.extend(active.iter().map(|e| (e.x_at(sy), e.dir)));
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if !rule.inside(winding) {
                    continue;
                }
                // Subsample columns whose centres fall in [xa, xb).
                let k0 = (pair[0].0 * grid as f64 - 0.5).ceil().max(0.0);
                let k1 = (pair[1].0 * grid as f64 - 0.5).ceil().min(sub_width as f64);
                if k0 >= k1 {
                    continue;
                }
                let (k0, k1) = (k0 as usize, k1 as usize);
                for k in k0..k1 {
                    counts[k / grid] += 1;
                }
                touched.0 = touched.0.min(k0 / grid);
                touched.1 = touched.1.max((k1 - 1) / grid + 1);
            }
        }

        if touched.0 >= touched.1 {
            continue;
        }
        let span = &mut row[touched.0..touched.1];
        for (out, &c) in span.iter_mut().zip(&counts[touched.0..touched.1]) {
            *out = (c * 255 / full) as u8;
        }
        emit(y, touched.0 as u32, span);
    }
}

/// Per-pixel clip coverage for a whole page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClipMask {
    width: u32,
    coverage: Vec<u8>,
}

impl ClipMask {
    /// Mask covering the inside of `polys`.
    pub(crate) fn from_polygons(
        polys: &[Polyline],
        rule: FillRule,
        width: u32,
        height: u32,
        anti_alias: bool,
    ) -> Self {
        let mut coverage = vec![0u8; width as usize * height as usize];
        fill_polygons(polys, rule, width, height, anti_alias, |y, x0, span| {
            let start = y as usize * width as usize + x0 as usize;
            coverage[start..start + span.len()].copy_from_slice(span);
        });
        Self { width, coverage }
    }

    /// Coverage of both masks: the product of the two.
    pub(crate) fn intersect(&self, other: &ClipMask) -> ClipMask {
        let coverage = self
            .coverage
            .iter()
            .zip(&other.coverage)
            .map(|(&a, &b)| ((u32::from(a) * u32::from(b) + 127) / 255) as u8)
            .collect();
        ClipMask {
            width: self.width,
            coverage,
        }
    }

    pub(crate) fn coverage(&self, x: u32, y: u32) -> u8 {
        if x >= self.width {
            return 0;
        }
        self.coverage
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polyline {
        Polyline {
            points: vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)],
            closed: true,
        }
    }

    fn rasterise(polys: &[Polyline], rule: FillRule, aa: bool) -> Vec<Vec<u8>> {
        let mut grid = vec![vec![0u8; 10]; 10];
        fill_polygons(polys, rule, 10, 10, aa, |y, x0, span| {
            grid[y as usize][x0 as usize..x0 as usize + span.len()].copy_from_slice(span);
        });
        grid
    }

    #[test]
    fn test_pixel_centres() {
        let grid = rasterise(&[square(2.0, 2.0, 5.0, 4.0)], FillRule::NonZero, false);
        assert_eq!(grid[2][2], 255);
        assert_eq!(grid[3][4], 255);
        assert_eq!(grid[4][4], 0);
        assert_eq!(grid[2][5], 0);
        assert_eq!(grid[1][2], 0);
        let filled: usize = grid.iter().flatten().filter(|&&c| c == 255).count();
        assert_eq!(filled, 6);
    }

    #[test]
    fn test_evenodd_leaves_hole() {
        let polys = [square(0.0, 0.0, 10.0, 10.0), square(3.0, 3.0, 7.0, 7.0)];
        let nonzero = rasterise(&polys, FillRule::NonZero, false);
        let evenodd = rasterise(&polys, FillRule::EvenOdd, false);
        assert_eq!(nonzero[5][5], 255);
        assert_eq!(evenodd[5][5], 0);
        assert_eq!(evenodd[1][1], 255);
    }

    #[test]
    fn test_opposite_winding_cancels_under_nonzero() {
        let mut inner = square(3.0, 3.0, 7.0, 7.0);
        inner.points.reverse();
        let grid = rasterise(&[square(0.0, 0.0, 10.0, 10.0), inner], FillRule::NonZero, false);
        assert_eq!(grid[5][5], 0);
    }

    #[test]
    fn test_anti_aliased_half_pixel() {
        let grid = rasterise(&[square(0.0, 0.0, 2.5, 1.0)], FillRule::NonZero, true);
        assert_eq!(grid[0][1], 255);
        assert_eq!(grid[0][2], 127);
    }

    #[test]
    fn test_clip_intersection() {
        let a = ClipMask::from_polygons(&[square(0.0, 0.0, 6.0, 6.0)], FillRule::NonZero, 10, 10, false);
        let b = ClipMask::from_polygons(&[square(4.0, 4.0, 10.0, 10.0)], FillRule::NonZero, 10, 10, false);
        let both = a.intersect(&b);
        assert_eq!(both.coverage(5, 5), 255);
        assert_eq!(both.coverage(2, 2), 0);
        assert_eq!(both.coverage(8, 8), 0);
        assert_eq!(both.coverage(20, 20), 0);
    }
}
