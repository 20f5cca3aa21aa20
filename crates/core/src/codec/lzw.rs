//! LZW stream decoder using weezl crate.

use crate::error::{PdfError, Result};
use weezl::{BitOrder, decode::Decoder};

/// Decode LZW-encoded data (PDF variant: MSB first, 8-bit).
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    lzwdecode_with_earlychange(data, 1)
}

/// Decode LZW-encoded data with EarlyChange setting.
///
/// EarlyChange=1 (the PDF default) widens codes one entry early, which is
/// the TIFF size switch in weezl.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i64) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let status = decoder.into_vec(&mut output).decode(data);
    match status.status {
        Ok(_) => Ok(output),
        // Truncated or trailing garbage after usable output is tolerated.
        Err(_) if !output.is_empty() => {
            tracing::debug!(len = output.len(), "LZW stream ended early, keeping partial output");
            Ok(output)
        }
        Err(err) => Err(PdfError::DecodeFailure(format!("LZW: {}", err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weezl::encode::Encoder;

    #[test]
    fn test_decodes_tiff_style_stream() {
        let plain = b"BT /F1 12 Tf (hello hello hello) Tj ET".repeat(20);
        let encoded = Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
            .encode(&plain)
            .unwrap();
        assert_eq!(lzwdecode(&encoded).unwrap(), plain);
    }

    #[test]
    fn test_early_change_zero() {
        let plain = b"0 0 m 10 10 l S ".repeat(40);
        let encoded = Encoder::new(BitOrder::Msb, 8).encode(&plain).unwrap();
        assert_eq!(lzwdecode_with_earlychange(&encoded, 0).unwrap(), plain);
    }
}
