//! Cross-reference loading.
//!
//! Handles:
//! - classic `xref` tables with their `trailer` dictionaries
//! - cross-reference streams (PDF 1.5+)
//! - hybrid files whose trailer points at an `/XRefStm`
//! - the `/Prev` chain left by incremental updates
//! - a regex scan for `N G obj` headers when none of the above can be read

use crate::codec;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject};
use crate::parser::lexer::is_whitespace;
use crate::parser::pdf_parser::{ObjectParser, find_bytes, rfind_bytes};
use regex::bytes::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::LazyLock;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Byte offset of `N G obj` in the file.
    InFile { offset: usize, genno: u32 },
    /// Object `index` inside the object stream `stream_id`.
    InStream { stream_id: u32, index: usize },
    /// Deleted (`f` row, or type 0 in an xref stream). Hides definitions of
    /// the same id in older sections.
    Free,
}

/// One cross-reference section with its trailer.
#[derive(Debug, Default, Clone)]
pub struct XRef {
    entries: FxHashMap<u32, XRefEntry>,
    /// Trailer dictionary (for xref streams: the stream dictionary)
    pub trailer: PDFDict,
    /// Whether this section was rebuilt by scanning the file
    pub is_fallback: bool,
}

impl XRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, objid: u32) -> Option<&XRefEntry> {
        self.entries.get(&objid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge entries of a hybrid `/XRefStm` section. Objects the table
    /// lists as in use keep their table entry; missing or free ones take the
    /// stream's.
    fn merge_missing(&mut self, other: XRef) {
        for (objid, entry) in other.entries {
            match self.entries.get(&objid) {
                Some(XRefEntry::InFile { .. } | XRefEntry::InStream { .. }) => {}
                Some(XRefEntry::Free) | None => {
                    self.entries.insert(objid, entry);
                }
            }
        }
    }

    fn trailer_offset(&self, key: &str) -> Option<usize> {
        self.trailer
            .get(key)
            .and_then(|v| v.as_int().ok())
            .and_then(|n| usize::try_from(n).ok())
    }
}

/// Locate the offset recorded after the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Option<usize> {
    let search_start = data.len().saturating_sub(2048);
    let keyword = search_start + rfind_bytes(&data[search_start..], b"startxref")?;
    let rest = &data[keyword + b"startxref".len()..];
    let digits_start = rest.iter().position(|&b| !is_whitespace(b))?;
    let digits = &rest[digits_start..];
    let len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    std::str::from_utf8(&digits[..len]).ok()?.parse().ok()
}

/// Load the section at `startxref` and everything reachable through `/Prev`
/// and `/XRefStm`, newest first.
pub fn load_xref_chain(data: &[u8], startxref: usize) -> Result<Vec<XRef>> {
    let mut xrefs = Vec::new();
    let mut visited = FxHashSet::default();
    let mut next = Some(startxref);

    while let Some(pos) = next {
        if !visited.insert(pos) {
            tracing::warn!(offset = pos, "xref /Prev chain loops back on itself");
            break;
        }
        let mut xref = match load_xref_at(data, pos) {
            Ok(xref) => xref,
            // The newest section must load; older ones are best effort.
            Err(err) if xrefs.is_empty() => return Err(err),
            Err(err) => {
                tracing::warn!(offset = pos, error = %err, "ignoring unreadable older xref section");
                break;
            }
        };

        if let Some(stm_pos) = xref.trailer_offset("XRefStm")
            && visited.insert(stm_pos)
        {
            match load_xref_stream(data, stm_pos) {
                Ok(stm) => xref.merge_missing(stm),
                Err(err) => {
                    tracing::warn!(offset = stm_pos, error = %err, "ignoring unreadable /XRefStm")
                }
            }
        }

        next = xref.trailer_offset("Prev");
        xrefs.push(xref);
    }

    Ok(xrefs)
}

/// Load one xref section, dispatching on its syntax.
pub fn load_xref_at(data: &[u8], pos: usize) -> Result<XRef> {
    if pos >= data.len() {
        return Err(PdfError::TruncatedFile(format!(
            "xref offset {} past end of file ({} bytes)",
            pos,
            data.len()
        )));
    }
    let skip = data[pos..]
        .iter()
        .take_while(|&&b| is_whitespace(b))
        .count();
    if data[pos + skip..].starts_with(b"xref") {
        load_classic_xref(data, pos + skip)
    } else {
        load_xref_stream(data, pos)
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.data.len() && is_whitespace(self.data[self.pos]) {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<u64> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| PdfError::malformed(start, "expected number in xref table"))
    }

    fn byte(&mut self) -> Option<u8> {
        self.skip_ws();
        let b = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    fn starts_with(&mut self, s: &[u8]) -> bool {
        self.skip_ws();
        self.data[self.pos.min(self.data.len())..].starts_with(s)
    }
}

/// Parse a classic `xref` table followed by `trailer << ... >>`.
fn load_classic_xref(data: &[u8], pos: usize) -> Result<XRef> {
    let mut xref = XRef::new();
    let mut cur = Cursor {
        data,
        pos: pos + b"xref".len(),
    };

    loop {
        if cur.starts_with(b"trailer") {
            cur.pos += b"trailer".len();
            break;
        }
        if cur.pos >= data.len() {
            return Err(PdfError::TruncatedFile(
                "xref table has no trailer".into(),
            ));
        }

        let mut base = cur.number()?;
        let count = cur.number()?;
        for i in 0..count {
            let offset = cur.number()?;
            let genno = cur.number()?;
            let marker = cur.byte().ok_or_else(|| {
                PdfError::TruncatedFile("xref table ends inside an entry".into())
            })?;

            // Subsections that start at 1 but still carry the object 0 free
            // entry are shifted down by one.
            if i == 0 && base > 0 && marker == b'f' && offset == 0 && genno == 65535 {
                base -= 1;
            }

            let Some(objid) = base.checked_add(i).and_then(|n| u32::try_from(n).ok()) else {
                continue;
            };
            // Later lines for the same id inside one table win.
            match marker {
                b'n' => {
                    xref.entries.insert(
                        objid,
                        XRefEntry::InFile {
                            offset: offset as usize,
                            genno: genno as u32,
                        },
                    );
                }
                b'f' => {
                    xref.entries.insert(objid, XRefEntry::Free);
                }
                other => {
                    return Err(PdfError::malformed(
                        cur.pos - 1,
                        format!("invalid xref entry marker {:?}", other as char),
                    ));
                }
            }
        }
    }

    let mut parser = ObjectParser::at(data, cur.pos);
    xref.trailer = match parser.parse_object()? {
        PDFObject::Dict(d) => d,
        other => {
            return Err(PdfError::TypeError {
                expected: "dict",
                got: other.type_name(),
            });
        }
    };
    Ok(xref)
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Parse a cross-reference stream object at `pos`.
pub fn load_xref_stream(data: &[u8], pos: usize) -> Result<XRef> {
    let mut parser = ObjectParser::at(data, pos);
    let (_, obj) = parser.parse_indirect(&|r: PDFObjRef| Err(PdfError::ObjectNotFound(r.objid)))?;
    let stream = obj.as_stream()?;

    let widths = stream
        .get("W")
        .ok_or_else(|| PdfError::malformed(pos, "xref stream without /W"))?
        .as_array()?
        .iter()
        .map(|w| w.as_int().map(|n| n.clamp(0, 8) as usize))
        .collect::<Result<Vec<_>>>()?;
    let &[w0, w1, w2] = &widths[..] else {
        return Err(PdfError::malformed(pos, "/W must have 3 elements"));
    };
    let entry_size = w0 + w1 + w2;
    if entry_size == 0 {
        return Err(PdfError::malformed(pos, "xref stream entries have zero width"));
    }

    let size = stream.get("Size").and_then(|s| s.as_int().ok()).unwrap_or(0);
    let index: Vec<(u64, u64)> = match stream.get("Index") {
        Some(idx) => idx
            .as_array()?
            .chunks_exact(2)
            .map(|pair| {
                let start = u64::try_from(pair[0].as_int()?);
                let count = u64::try_from(pair[1].as_int()?);
                match (start, count) {
                    (Ok(start), Ok(count)) => Ok((start, count)),
                    _ => Err(PdfError::malformed(pos, "negative /Index entry in xref stream")),
                }
            })
            .collect::<Result<_>>()?,
        None => vec![(0, size.max(0) as u64)],
    };

    let chain = codec::filter_chain(stream.get("Filter"), stream.get("DecodeParms"))?;
    let body = codec::apply_filters(stream.get_rawdata(), &chain)?;

    let mut xref = XRef::new();
    let mut rows = body.chunks_exact(entry_size);
    'sections: for (start, count) in index {
        for i in 0..count {
            let Some(row) = rows.next() else {
                break 'sections;
            };
            let Some(objid) = start.checked_add(i).and_then(|n| u32::try_from(n).ok()) else {
                continue;
            };
            let kind = if w0 == 0 { 1 } else { read_be(&row[..w0]) };
            let field1 = read_be(&row[w0..w0 + w1]);
            let field2 = read_be(&row[w0 + w1..]);
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InFile {
                    offset: field1 as usize,
                    genno: field2 as u32,
                },
                2 => XRefEntry::InStream {
                    stream_id: field1 as u32,
                    index: field2 as usize,
                },
                _ => continue,
            };
            xref.entries.insert(objid, entry);
        }
    }

    for (key, value) in &stream.attrs {
        if !matches!(
            key.as_str(),
            "Length" | "Filter" | "DecodeParms" | "W" | "Index" | "Type"
        ) {
            xref.trailer.insert(key.clone(), value.clone());
        }
    }
    Ok(xref)
}

static OBJ_HEADER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(\d+)\s+obj\b"));

static CATALOG_TYPE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"/Type\s*/Catalog\b"));

fn regex(re: &'static LazyLock<std::result::Result<Regex, regex::Error>>) -> Result<&'static Regex> {
    re.as_ref()
        .map_err(|e| PdfError::UnsupportedFeature(format!("xref scan pattern: {}", e)))
}

fn parse_digits(bytes: &[u8]) -> Option<u32> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Rebuild a cross-reference section by scanning the whole file for object
/// headers. Later definitions of an id override earlier ones.
pub fn load_xref_fallback(data: &[u8]) -> Result<XRef> {
    let mut xref = XRef::new();
    xref.is_fallback = true;
    let mut starts: Vec<(usize, u32, u32)> = Vec::new();

    for cap in regex(&OBJ_HEADER)?.captures_iter(data) {
        let (Some(whole), Some(objid), Some(genno)) = (
            cap.get(0),
            cap.get(1).and_then(|m| parse_digits(m.as_bytes())),
            cap.get(2).and_then(|m| parse_digits(m.as_bytes())),
        ) else {
            continue;
        };
        xref.entries.insert(
            objid,
            XRefEntry::InFile {
                offset: whole.start(),
                genno,
            },
        );
        starts.push((whole.start(), objid, genno));
    }

    if xref.entries.is_empty() {
        return Err(PdfError::TruncatedFile(
            "no cross-reference data and no objects found".into(),
        ));
    }

    // Newest trailer that names a root wins.
    let mut search_end = data.len();
    while let Some(at) = rfind_bytes(&data[..search_end], b"trailer") {
        let mut parser = ObjectParser::at(data, at + b"trailer".len());
        if let Ok(PDFObject::Dict(dict)) = parser.parse_object()
            && dict.contains_key("Root")
        {
            xref.trailer = dict;
            break;
        }
        search_end = at;
    }

    if !xref.trailer.contains_key("Root")
        && let Some(m) = regex(&CATALOG_TYPE)?.find_iter(data).last()
        && let Some(&(_, objid, genno)) = starts.iter().rev().find(|(start, _, _)| *start < m.start())
    {
        xref.trailer
            .insert("Root".into(), PDFObject::Ref(PDFObjRef::new(objid, genno)));
    }

    tracing::warn!(objects = xref.len(), "rebuilt cross-reference table by scanning the file");
    Ok(xref)
}

/// Offset of the `%PDF-` signature, which must appear in the first 1024 bytes.
pub fn find_header(data: &[u8]) -> Option<usize> {
    find_bytes(&data[..data.len().min(1024)], b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[u8] = b"xref\n0 3\n0000000000 65535 f \n0000000017 00000 n \n0000000081 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF";

    #[test]
    fn test_find_startxref_uses_last() {
        let data = b"startxref\n11\n%%EOF\nstartxref\r\n 42\n%%EOF";
        assert_eq!(find_startxref(data), Some(42));
        assert_eq!(find_startxref(b"nothing here"), None);
    }

    #[test]
    fn test_classic_table() {
        let xref = load_xref_at(TABLE, 0).unwrap();
        assert_eq!(xref.len(), 3);
        assert_eq!(
            xref.get(1),
            Some(&XRefEntry::InFile {
                offset: 17,
                genno: 0
            })
        );
        assert_eq!(xref.get(0), Some(&XRefEntry::Free));
        assert_eq!(
            xref.trailer.get("Root"),
            Some(&PDFObject::Ref(PDFObjRef::new(1, 0)))
        );
    }

    #[test]
    fn test_off_by_one_subsection_is_shifted() {
        let data = b"xref\n1 2\n0000000000 65535 f \n0000000010 00000 n \ntrailer << /Size 2 >>";
        let xref = load_xref_at(data, 0).unwrap();
        assert_eq!(
            xref.get(1),
            Some(&XRefEntry::InFile {
                offset: 10,
                genno: 0
            })
        );
    }

    #[test]
    fn test_xref_stream_entries() {
        // W [1 2 1]: one free, one in-file at 0x0102, one in stream 5 index 3
        let rows: Vec<u8> = vec![0, 0, 0, 0, 1, 1, 2, 0, 2, 0, 5, 3];
        let mut pdf = Vec::new();
        pdf.extend_from_slice(
            format!(
                "9 0 obj << /Type /XRef /W [1 2 1] /Size 3 /Root 1 0 R /Length {} >> stream\n",
                rows.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&rows);
        pdf.extend_from_slice(b"\nendstream endobj");

        let xref = load_xref_at(&pdf, 0).unwrap();
        assert_eq!(xref.get(0), Some(&XRefEntry::Free));
        assert_eq!(
            xref.get(1),
            Some(&XRefEntry::InFile {
                offset: 0x0102,
                genno: 0
            })
        );
        assert_eq!(
            xref.get(2),
            Some(&XRefEntry::InStream {
                stream_id: 5,
                index: 3
            })
        );
        assert!(xref.trailer.contains_key("Root"));
        assert!(!xref.trailer.contains_key("W"));
    }

    #[test]
    fn test_subsection_ids_past_u32_are_skipped() {
        let data = b"xref\n0 2\n0000000000 65535 f \n0000000010 00000 n \n18446744073709551615 2\n0000000020 00000 n \n0000000030 00000 n \ntrailer << /Size 2 >>";
        let xref = load_xref_at(data, 0).unwrap();
        assert_eq!(xref.len(), 2);
        assert_eq!(
            xref.get(1),
            Some(&XRefEntry::InFile {
                offset: 10,
                genno: 0
            })
        );
    }

    fn xref_stream(dict: &str, rows: &[u8]) -> Vec<u8> {
        let mut pdf = format!("9 0 obj << /Type /XRef /W [1 2 1] {dict} /Length {} >> stream\n", rows.len())
            .into_bytes();
        pdf.extend_from_slice(rows);
        pdf.extend_from_slice(b"\nendstream endobj\n");
        pdf
    }

    #[test]
    fn test_negative_index_is_rejected() {
        let pdf = xref_stream("/Index [-1 2] /Size 2", &[1, 0, 9, 0, 1, 0, 9, 0]);
        assert!(matches!(
            load_xref_at(&pdf, 0),
            Err(PdfError::MalformedObject { .. })
        ));
    }

    #[test]
    fn test_hybrid_table_entries_take_precedence() {
        // Stream: 3 at 0x30, 4 at 0x40, 5 at 0x50.
        let mut data = xref_stream("/Index [3 3] /Size 6", &[1, 0, 0x30, 0, 1, 0, 0x40, 0, 1, 0, 0x50, 0]);
        let table_at = data.len();
        data.extend_from_slice(
            b"xref\n3 2\n0000000099 00000 n \n0000000000 00001 f \ntrailer\n<< /Size 6 /XRefStm 0 >>\n",
        );

        let xrefs = load_xref_chain(&data, table_at).unwrap();
        assert_eq!(xrefs.len(), 1);
        let xref = &xrefs[0];
        let in_file = |offset| Some(XRefEntry::InFile { offset, genno: 0 });
        assert_eq!(xref.get(3).copied(), in_file(99));
        assert_eq!(xref.get(4).copied(), in_file(0x40));
        assert_eq!(xref.get(5).copied(), in_file(0x50));
    }

    #[test]
    fn test_fallback_scan_prefers_later_definitions() {
        let data = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n2 0 obj 5 endobj\n2 0 obj 6 endobj\n";
        let xref = load_xref_fallback(data).unwrap();
        let later = find_bytes(data, b"2 0 obj 6").unwrap();
        assert_eq!(
            xref.get(2),
            Some(&XRefEntry::InFile {
                offset: later,
                genno: 0
            })
        );
        assert_eq!(
            xref.trailer.get("Root"),
            Some(&PDFObject::Ref(PDFObjRef::new(1, 0)))
        );
    }

    #[test]
    fn test_fallback_without_objects_is_truncated() {
        assert!(matches!(
            load_xref_fallback(b"%PDF-1.4\n"),
            Err(PdfError::TruncatedFile(_))
        ));
    }

    #[test]
    fn test_header_search_window() {
        assert_eq!(find_header(b"%PDF-1.7"), Some(0));
        let mut junk = vec![b' '; 10];
        junk.extend_from_slice(b"%PDF-1.4");
        assert_eq!(find_header(&junk), Some(10));
        assert_eq!(find_header(&vec![b'x'; 2000]), None);
    }
}
