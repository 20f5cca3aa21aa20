//! PNG and TIFF predictors (`/DecodeParms /Predictor`).

use crate::error::{PdfError, Result};

/// Predictor parameters taken from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }

    fn row_bytes(&self) -> usize {
        (self.colors * self.bits_per_component * self.columns).div_ceil(8)
    }
}

/// Undo the predictor applied before compression.
pub fn apply_predictor(data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data),
        2 => tiff_predictor(data, params),
        10..=15 => png_predictor(&data, params),
        other => Err(PdfError::DecodeFailure(format!(
            "unknown predictor {}",
            other
        ))),
    }
}

fn tiff_predictor(mut data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(PdfError::UnsupportedFeature(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.row_bytes();
    let bpp = params.bytes_per_pixel();
    if row_len == 0 {
        return Ok(data);
    }
    for row in data.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(data)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn png_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let row_len = params.row_bytes();
    let bpp = params.bytes_per_pixel();
    if row_len == 0 {
        return Ok(Vec::new());
    }

    let mut output = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    let mut row = vec![0u8; row_len];

    // Every row carries its own filter type byte.
    for chunk in data.chunks(row_len + 1) {
        let (&filter, raw) = chunk
            .split_first()
            .ok_or_else(|| PdfError::DecodeFailure("empty predictor row".into()))?;
        row.fill(0);
        row[..raw.len()].copy_from_slice(raw);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            row[i] = match filter {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(PdfError::DecodeFailure(format!(
                        "invalid PNG filter type {}",
                        other
                    )));
                }
            };
        }

        output.extend_from_slice(&row[..raw.len()]);
        std::mem::swap(&mut prev, &mut row);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(predictor: i64, colors: usize, columns: usize) -> PredictorParams {
        PredictorParams {
            predictor,
            colors,
            bits_per_component: 8,
            columns,
        }
    }

    #[test]
    fn test_png_up_and_sub_rows() {
        // Row 1: Sub filter, row 2: Up filter.
        let data = [1, 10, 5, 5, 2, 1, 1, 1];
        let out = apply_predictor(data.to_vec(), &params(12, 1, 3)).unwrap();
        assert_eq!(out, vec![10, 15, 20, 11, 16, 21]);
    }

    #[test]
    fn test_png_paeth() {
        let data = [0, 1, 2, 4, 4, 1, 1, 1];
        let out = apply_predictor(data.to_vec(), &params(15, 1, 3)).unwrap();
        assert_eq!(out, vec![1, 2, 4, 2, 3, 5]);
    }

    #[test]
    fn test_short_final_row_is_kept() {
        let data = [0, 1, 2, 4, 1, 1, 1];
        let out = apply_predictor(data.to_vec(), &params(12, 1, 3)).unwrap();
        assert_eq!(out, vec![1, 2, 4, 1, 2]);
    }

    #[test]
    fn test_tiff_predictor_rgb() {
        let data = vec![10, 20, 30, 1, 1, 1];
        let out = apply_predictor(data, &params(2, 3, 2)).unwrap();
        assert_eq!(out, vec![10, 20, 30, 11, 21, 31]);
    }

    #[test]
    fn test_bad_png_filter_byte() {
        let err = apply_predictor(vec![9, 1, 2], &params(10, 1, 2)).unwrap_err();
        assert!(matches!(err, PdfError::DecodeFailure(_)));
    }
}
