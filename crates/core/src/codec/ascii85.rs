//! ASCII85 and ASCIIHex stream decoders.

use crate::error::{PdfError, Result};

/// Decode ASCII85-encoded data (PDF variant).
/// Handles: z-encoding, <~ ~> markers, whitespace, missing EOD.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);

    // Everything after the '~' of the EOD marker is ignored.
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut result = Vec::with_capacity(data.len() / 5 * 4 + 4);
    let mut group = [0u8; 5];
    let mut filled = 0;

    for (idx, &byte) in data.iter().enumerate() {
        match byte {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x00' | b'\x0c' => {}
            b'z' if filled == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[filled] = byte - b'!';
                filled += 1;
                if filled == 5 {
                    result.extend_from_slice(&group_value(&group, idx)?.to_be_bytes());
                    filled = 0;
                }
            }
            _ => {
                return Err(PdfError::DecodeFailure(format!(
                    "invalid ASCII85 byte 0x{:02x} at {}",
                    byte, idx
                )));
            }
        }
    }

    if filled == 1 {
        return Err(PdfError::DecodeFailure(
            "ASCII85 data ends with a single-character group".into(),
        ));
    }
    if filled > 1 {
        // Pad the partial group with 'u' and keep filled - 1 bytes.
        for slot in group.iter_mut().skip(filled) {
            *slot = b'u' - b'!';
        }
        let bytes = group_value(&group, data.len())?.to_be_bytes();
        result.extend_from_slice(&bytes[..filled - 1]);
    }

    Ok(result)
}

fn group_value(group: &[u8; 5], pos: usize) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value).map_err(|_| {
        PdfError::DecodeFailure(format!("ASCII85 group overflows 32 bits near {}", pos))
    })
}

/// Decode ASCIIHex-encoded data. Whitespace is skipped, `>` ends the data and
/// an odd final digit is padded with zero.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for (idx, &byte) in data.iter().enumerate() {
        if byte == b'>' {
            break;
        }
        if matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x00' | b'\x0c') {
            continue;
        }
        let Some(nibble) = hex_nibble(byte) else {
            return Err(PdfError::DecodeFailure(format!(
                "invalid hex digit 0x{:02x} at {}",
                byte, idx
            )));
        };
        match pending.take() {
            Some(high) => result.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }

    if let Some(high) = pending {
        result.push(high << 4);
    }

    Ok(result)
}

const fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asciihex_decode_expected() {
        let data = b"48656c6c6f 20776f726c64>"; // "Hello world"
        assert_eq!(asciihexdecode(data).unwrap(), b"Hello world");
        assert_eq!(asciihexdecode(b"4>").unwrap(), vec![0x40]);
    }

    #[test]
    fn asciihex_rejects_garbage() {
        assert!(matches!(
            asciihexdecode(b"4g"),
            Err(PdfError::DecodeFailure(_))
        ));
    }

    #[test]
    fn ascii85_decode_expected() {
        let data = b"<~87cURD]i,\"Ebo7~>";
        assert_eq!(ascii85decode(data).unwrap(), b"Hello World");
    }

    #[test]
    fn ascii85_z_and_partial_group() {
        assert_eq!(ascii85decode(b"z@:E^~>").unwrap(), b"\0\0\0\0abc");
        assert_eq!(ascii85decode(b"0H`%l\n0d(LL").unwrap(), b"0 0 1 rg");
    }

    #[test]
    fn ascii85_overflow_is_decode_failure() {
        assert!(matches!(
            ascii85decode(b"uuuuu~>"),
            Err(PdfError::DecodeFailure(_))
        ));
    }
}
