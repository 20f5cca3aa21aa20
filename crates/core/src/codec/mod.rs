//! Stream filters.
//!
//! This module contains:
//! - `flate`: FlateDecode (zlib/deflate)
//! - `ascii85`: ASCII85 and ASCIIHex decoding
//! - `lzw`: LZW decompression
//! - `runlength`: Run-length decoding
//! - `predictor`: PNG/TIFF predictors applied after Flate or LZW

pub mod ascii85;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

pub use ascii85::{ascii85decode, asciihexdecode};
pub use flate::flatedecode;
pub use lzw::{lzwdecode, lzwdecode_with_earlychange};
pub use predictor::{PredictorParams, apply_predictor};
pub use runlength::rldecode;

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObject};

/// A stream filter named in a `/Filter` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Flate,
    Ascii85,
    AsciiHex,
    Lzw,
    RunLength,
}

impl Filter {
    /// Map a filter name (full or inline-image abbreviation) to a decoder.
    ///
    /// Image codecs and `Crypt` are recognised but not decoded here, so they
    /// come back as `UnsupportedFilter`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "FlateDecode" | "Fl" => Ok(Self::Flate),
            "ASCII85Decode" | "A85" => Ok(Self::Ascii85),
            "ASCIIHexDecode" | "AHx" => Ok(Self::AsciiHex),
            "LZWDecode" | "LZW" => Ok(Self::Lzw),
            "RunLengthDecode" | "RL" => Ok(Self::RunLength),
            other => Err(PdfError::UnsupportedFilter(other.to_string())),
        }
    }
}

fn int_param(parms: Option<&PDFDict>, key: &str, default: i64) -> i64 {
    parms
        .and_then(|d| d.get(key))
        .and_then(|v| v.as_int().ok())
        .unwrap_or(default)
}

fn predictor_params(parms: Option<&PDFDict>) -> PredictorParams {
    PredictorParams {
        predictor: int_param(parms, "Predictor", 1),
        colors: int_param(parms, "Colors", 1).clamp(1, 32) as usize,
        bits_per_component: int_param(parms, "BitsPerComponent", 8).clamp(1, 16) as usize,
        columns: int_param(parms, "Columns", 1).clamp(1, 1 << 20) as usize,
    }
}

/// Run `data` through a filter chain.
///
/// `chain` pairs each filter name with its (already resolved) decode
/// parameters. Filters are applied in order.
pub fn apply_filters(data: &[u8], chain: &[(String, Option<PDFDict>)]) -> Result<Vec<u8>> {
    // Validate the whole chain up front so an unsupported filter never yields
    // half-decoded bytes.
    let filters = chain
        .iter()
        .map(|(name, _)| Filter::from_name(name))
        .collect::<Result<Vec<_>>>()?;

    let mut current = data.to_vec();
    for (filter, (_, parms)) in filters.into_iter().zip(chain) {
        let parms = parms.as_ref();
        current = match filter {
            Filter::Flate => apply_predictor(flatedecode(&current)?, &predictor_params(parms))?,
            Filter::Lzw => {
                let early = int_param(parms, "EarlyChange", 1);
                apply_predictor(
                    lzwdecode_with_earlychange(&current, early)?,
                    &predictor_params(parms),
                )?
            }
            Filter::Ascii85 => ascii85decode(&current)?,
            Filter::AsciiHex => asciihexdecode(&current)?,
            Filter::RunLength => rldecode(&current)?,
        };
    }
    Ok(current)
}

/// Normalise `/Filter` + `/DecodeParms` values (name or array forms) into a
/// chain of `(name, parms)` pairs. Both objects must already be resolved.
pub fn filter_chain(
    filter: Option<&PDFObject>,
    parms: Option<&PDFObject>,
) -> Result<Vec<(String, Option<PDFDict>)>> {
    let names: Vec<String> = match filter {
        None | Some(PDFObject::Null) => return Ok(Vec::new()),
        Some(PDFObject::Name(n)) => vec![n.clone()],
        Some(PDFObject::Array(items)) => items
            .iter()
            .map(|item| item.as_name().map(str::to_string))
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(PdfError::TypeError {
                expected: "name or array",
                got: other.type_name(),
            });
        }
    };

    let parms: Vec<Option<PDFDict>> = match parms {
        Some(PDFObject::Dict(d)) => vec![Some(d.clone())],
        Some(PDFObject::Array(items)) => items
            .iter()
            .map(|item| match item {
                PDFObject::Dict(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, parms.get(i).cloned().flatten()))
        .collect())
}
