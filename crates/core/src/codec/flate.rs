//! FlateDecode (zlib / deflate) stream decoder.

use crate::error::{PdfError, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// Inflate zlib-wrapped data.
///
/// Streams without a valid zlib header are retried as raw deflate. A stream
/// that breaks off after producing output keeps that output (damaged trailers
/// are common); one that produces nothing is a `DecodeFailure`.
pub fn flatedecode(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let mut output = Vec::with_capacity(data.len().saturating_mul(3));
    match ZlibDecoder::new(data).read_to_end(&mut output) {
        Ok(_) => return Ok(output),
        Err(err) if !output.is_empty() => {
            tracing::warn!(error = %err, decoded = output.len(), "flate stream damaged, keeping partial output");
            return Ok(output);
        }
        Err(_) => {}
    }

    output.clear();
    match DeflateDecoder::new(data).read_to_end(&mut output) {
        Ok(_) if !output.is_empty() => Ok(output),
        Ok(_) => Err(PdfError::DecodeFailure("flate stream produced no data".into())),
        Err(err) if !output.is_empty() => {
            tracing::warn!(error = %err, decoded = output.len(), "raw deflate stream damaged, keeping partial output");
            Ok(output)
        }
        Err(err) => Err(PdfError::DecodeFailure(format!("flate: {}", err))),
    }
}
