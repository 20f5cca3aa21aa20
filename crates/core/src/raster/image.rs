//! Image painting.

use super::fill::ClipMask;
use super::pixmap::PixelBuffer;
use crate::image::DecodedImage;
use crate::utils::{Matrix, apply_matrix_pt, apply_matrix_rect, invert_matrix};

/// Paint `image` into the unit square mapped to device space by `m`.
///
/// Each device pixel whose centre lands inside the square takes the
/// nearest image sample. Image row 0 is the top of the square (v = 1).
pub(crate) fn draw_image(
    buffer: &mut PixelBuffer,
    image: &DecodedImage,
    m: Matrix,
    alpha: f64,
    clip: Option<&ClipMask>,
) {
    if image.width == 0 || image.height == 0 {
        return;
    }
    let Some(inv) = invert_matrix(m) else {
        return;
    };
    let (x0, y0, x1, y1) = apply_matrix_rect(m, (0.0, 0.0, 1.0, 1.0));
    let px0 = x0.floor().max(0.0);
    let py0 = y0.floor().max(0.0);
    let px1 = x1.ceil().min(f64::from(buffer.width()));
    let py1 = y1.ceil().min(f64::from(buffer.height()));
    if !(px0 < px1 && py0 < py1) {
        return;
    }

    let (w, h) = (f64::from(image.width), f64::from(image.height));
    for py in py0 as u32..py1 as u32 {
        for px in px0 as u32..px1 as u32 {
            let (u, v) = apply_matrix_pt(inv, (f64::from(px) + 0.5, f64::from(py) + 0.5));
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            let col = ((u * w) as u32).min(image.width - 1);
            let row = (((1.0 - v) * h) as u32).min(image.height - 1);
            let [r, g, b, a] = image.pixel(col, row);
            let clip_cov = clip.map_or(255, |c| c.coverage(px, py));
            let opacity = alpha * f64::from(a) / 255.0 * f64::from(clip_cov) / 255.0;
            buffer.blend(px, py, [r, g, b], opacity as f32);
        }
    }
}
