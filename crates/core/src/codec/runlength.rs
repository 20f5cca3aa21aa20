//! RunLength stream decoder.

use crate::error::Result;

/// Decode `RunLengthDecode` data.
///
/// A length byte `n` below 128 copies the next `n + 1` bytes, above 128
/// repeats the next byte `257 - n` times, and 128 ends the data. Input that
/// stops mid-run yields what was decoded so far.
pub fn rldecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut rest = data;

    while let Some((&n, tail)) = rest.split_first() {
        rest = match n {
            128 => break,
            0..=127 => {
                let take = (usize::from(n) + 1).min(tail.len());
                out.extend_from_slice(&tail[..take]);
                &tail[take..]
            }
            _ => match tail.split_first() {
                Some((&byte, after)) => {
                    out.resize(out.len() + 257 - usize::from(n), byte);
                    after
                }
                None => break,
            },
        };
    }
    Ok(out)
}
