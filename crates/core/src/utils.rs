//! Miscellaneous utilities.
//!
//! - Geometric types (Point, Rect, Matrix)
//! - Matrix transformation operations
//! - Path string helpers used by callers naming output files

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// A rectangle defined by (x0, y0, x1, y1) where (x0, y0) is typically bottom-left
/// and (x1, y1) is top-right.
pub type Rect = (f64, f64, f64, f64);

/// A 6-element affine transformation matrix (a, b, c, d, e, f).
/// Transforms point (x, y) to (ax + cy + e, bx + dy + f).
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// Identity transformation matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// Compares two floats for approximate equality.
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Multiplies two matrices: result = m1 * m0.
/// This applies m1 first, then m0.
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a0 * a1 + c0 * b1,
        b0 * a1 + d0 * b1,
        a0 * c1 + c0 * d1,
        b0 * c1 + d0 * d1,
        a0 * e1 + c0 * f1 + e0,
        b0 * e1 + d0 * f1 + f0,
    )
}

/// Applies a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Applies a matrix to a rectangle.
///
/// Note that the result is not a rotated rectangle, but a rectangle with the same
/// orientation that tightly fits the outside of the rotated content.
pub fn apply_matrix_rect(m: Matrix, rect: Rect) -> Rect {
    let (x0, y0, x1, y1) = rect;
    let corners = [
        apply_matrix_pt(m, (x0, y0)),
        apply_matrix_pt(m, (x1, y0)),
        apply_matrix_pt(m, (x1, y1)),
        apply_matrix_pt(m, (x0, y1)),
    ];
    corners.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(l, b, r, t), &(x, y)| (l.min(x), b.min(y), r.max(x), t.max(y)),
    )
}

/// Inverts an affine matrix. Returns `None` for singular matrices.
pub fn invert_matrix(m: Matrix) -> Option<Matrix> {
    let (a, b, c, d, e, f) = m;
    let det = a * d - b * c;
    if det.abs() < 1e-12 {
        return None;
    }
    let ia = d / det;
    let ib = -b / det;
    let ic = -c / det;
    let id = a / det;
    Some((ia, ib, ic, id, -(e * ia + f * ic), -(e * ib + f * id)))
}

/// Geometric mean of the matrix axis scales, used to map widths into device space.
pub fn matrix_scale(m: Matrix) -> f64 {
    let (a, b, c, d, _, _) = m;
    (a * d - b * c).abs().sqrt()
}

/// Returns the last path segment of `path`, after stripping a `file://` scheme.
///
/// ```
/// use pdftoolkit_core::utils::file_name;
/// assert_eq!(file_name("file:///tmp/docs/report.pdf"), "report.pdf");
/// ```
pub fn file_name(path: &str) -> String {
    let path = path.strip_prefix("file://").unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, last)) => last.to_string(),
        None => trimmed.to_string(),
    }
}

/// Like [`file_name`] but without the final extension.
pub fn file_stem(path: &str) -> String {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mult_matrix_identity() {
        let m = (2.0, 0.0, 0.0, 3.0, 5.0, 7.0);
        assert_eq!(mult_matrix(m, MATRIX_IDENTITY), m);
        assert_eq!(mult_matrix(MATRIX_IDENTITY, m), m);
    }

    #[test]
    fn test_mult_matrix_applies_first_argument_first() {
        let scale = (2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = (1.0, 0.0, 0.0, 1.0, 10.0, 0.0);
        let m = mult_matrix(scale, shift);
        assert_eq!(apply_matrix_pt(m, (1.0, 1.0)), (12.0, 2.0));
    }

    #[test]
    fn test_invert_matrix_roundtrip() {
        let m = (0.0, 2.0, -3.0, 0.0, 4.0, 5.0);
        let inv = invert_matrix(m).unwrap();
        let p = apply_matrix_pt(inv, apply_matrix_pt(m, (7.0, -2.0)));
        assert!(approx_eq(p.0, 7.0, 1e-9));
        assert!(approx_eq(p.1, -2.0, 1e-9));
        assert!(invert_matrix((1.0, 2.0, 2.0, 4.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_file_name_strips_scheme_and_dirs() {
        assert_eq!(file_name("file:///var/mobile/a b.pdf"), "a b.pdf");
        assert_eq!(file_name("/tmp/x.pdf"), "x.pdf");
        assert_eq!(file_name("plain.pdf"), "plain.pdf");
        assert_eq!(file_name("/tmp/dir/"), "dir");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("file:///tmp/report.v2.pdf"), "report.v2");
        assert_eq!(file_stem("/tmp/.hidden"), ".hidden");
        assert_eq!(file_stem("noext"), "noext");
    }
}
