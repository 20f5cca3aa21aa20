//! Synthetic PDF construction shared by the integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

/// Collects numbered objects and writes them with a classic xref table.
#[derive(Debug, Default)]
pub struct PdfBuilder {
    objects: Vec<(u32, Vec<u8>)>,
    trailer_extra: String,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, id: u32, body: &str) -> Self {
        self.objects.push((id, body.as_bytes().to_vec()));
        self
    }

    /// Extra trailer entries, e.g. `/Encrypt 9 0 R`.
    pub fn trailer(mut self, extra: &str) -> Self {
        self.trailer_extra = extra.to_string();
        self
    }

    /// A stream object; `/Length` is filled in.
    pub fn stream(mut self, id: u32, extra: &str, data: &[u8]) -> Self {
        let mut body = format!("<< /Length {} {extra} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((id, body));
        self
    }

    /// A complete file.
    pub fn build(self, root: u32) -> Vec<u8> {
        let mut out = b"%PDF-1.7\n".to_vec();
        write_section(&mut out, &self.objects, &self.trailer_extra, root, None);
        out
    }

    /// Append these objects to `base` as an incremental update.
    pub fn append_to(self, mut base: Vec<u8>, root: u32) -> Vec<u8> {
        let prev = last_startxref(&base);
        write_section(&mut base, &self.objects, &self.trailer_extra, root, Some(prev));
        base
    }
}

fn write_section(
    out: &mut Vec<u8>,
    objects: &[(u32, Vec<u8>)],
    trailer_extra: &str,
    root: u32,
    prev: Option<usize>,
) {
    let mut entries = Vec::new();
    for (id, body) in objects {
        entries.push((*id, out.len()));
        out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    entries.sort_unstable();

    let xref = out.len();
    out.extend_from_slice(b"xref\n");
    if prev.is_none() {
        out.extend_from_slice(b"0 1\n0000000000 65535 f \n");
    }
    for (id, off) in &entries {
        out.extend_from_slice(format!("{id} 1\n{off:010} 00000 n \n").as_bytes());
    }
    let size = entries.iter().map(|(id, _)| id + 1).max().unwrap_or(1);
    let prev = prev.map(|p| format!(" /Prev {p}")).unwrap_or_default();
    out.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root {root} 0 R{prev} {trailer_extra} >>\nstartxref\n{xref}\n%%EOF\n")
            .as_bytes(),
    );
}

/// Offset recorded after the last `startxref` keyword.
pub fn last_startxref(data: &[u8]) -> usize {
    let key = b"startxref";
    let pos = data
        .windows(key.len())
        .rposition(|w| w == key)
        .expect("no startxref");
    let tail = std::str::from_utf8(&data[pos + key.len()..]).expect("ascii trailer");
    tail.split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .expect("startxref offset")
}

/// `N 0 obj ... endobj` as written by the builder.
pub fn raw_object(id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = format!("{id} 0 obj\n").into_bytes();
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
    out
}

/// Cross-reference stream rows for `/W [1 4 1]`: `(type, field 2, field 3)`.
pub fn xref_rows(rows: &[(u8, u32, u8)]) -> Vec<u8> {
    rows.iter()
        .flat_map(|&(kind, field2, field3)| {
            let mut row = vec![kind];
            row.extend_from_slice(&field2.to_be_bytes());
            row.push(field3);
            row
        })
        .collect()
}

/// A `/Type /XRef` stream object with `/W [1 4 1]`.
pub fn xref_stream_object(id: u32, index: &str, rows: &[u8], extra: &str) -> Vec<u8> {
    let mut body = format!(
        "<< /Type /XRef /W [1 4 1] /Index [{index}] /Length {} {extra} >>\nstream\n",
        rows.len()
    )
    .into_bytes();
    body.extend_from_slice(rows);
    body.extend_from_slice(b"\nendstream");
    raw_object(id, &body)
}

/// Append an update whose only cross-reference data is an xref stream
/// (object `stream_id`). `objects` are written and listed as in use,
/// `freed` ids are listed as free.
pub fn append_xref_stream_update(
    mut base: Vec<u8>,
    objects: &[(u32, &[u8])],
    freed: &[u32],
    stream_id: u32,
) -> Vec<u8> {
    let prev = last_startxref(&base);
    let mut index = Vec::new();
    let mut rows = Vec::new();
    for (id, body) in objects {
        rows.push((1, base.len() as u32, 0));
        index.push(format!("{id} 1"));
        base.extend_from_slice(&raw_object(*id, body));
    }
    for id in freed {
        rows.push((0, 0, 1));
        index.push(format!("{id} 1"));
    }
    let pos = base.len();
    let extra = format!("/Size {} /Root 1 0 R /Prev {prev}", stream_id + 1);
    base.extend_from_slice(&xref_stream_object(stream_id, &index.join(" "), &xref_rows(&rows), &extra));
    base.extend_from_slice(format!("startxref\n{pos}\n%%EOF\n").as_bytes());
    base
}

/// Stream object body with `/Length` filled in.
pub fn stream_body(data: &[u8]) -> Vec<u8> {
    let mut body = format!("<< /Length {} >>\nstream\n", data.len()).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

pub fn flate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Catalog (1), pages (2), one page (3) and its content stream (4).
pub fn single_page_builder(mediabox: &str, page_extra: &str, content: &[u8]) -> PdfBuilder {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            &format!("<< /Type /Page /Parent 2 0 R /MediaBox {mediabox} /Contents 4 0 R {page_extra} >>"),
        )
        .stream(4, "", content)
}

pub fn single_page(mediabox: &str, page_extra: &str, content: &[u8]) -> Vec<u8> {
    single_page_builder(mediabox, page_extra, content).build(1)
}

/// A page tree with one leaf per `(stream attributes, data)` pair, all
/// under object 2. Leaves are objects 3, 5, 7... with contents 4, 6, 8...
pub fn page_tree(mediabox: &str, count: usize, pages: &[(&str, &[u8])]) -> Vec<u8> {
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!("<< /Type /Pages /Kids [{}] /Count {count} /MediaBox {mediabox} >>", kids.join(" ")),
        );
    for (i, (extra, data)) in pages.iter().enumerate() {
        let page = 3 + 2 * i as u32;
        builder = builder
            .object(page, &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1))
            .stream(page + 1, extra, data);
    }
    builder.build(1)
}

/// Unfiltered pages with a correct `/Count`.
pub fn multi_page(mediabox: &str, contents: &[&str]) -> Vec<u8> {
    let pages: Vec<(&str, &[u8])> = contents.iter().map(|c| ("", c.as_bytes())).collect();
    page_tree(mediabox, pages.len(), &pages)
}
