//! Synthetic PDF assembly for unit tests.

/// Assemble a PDF with a correct classic xref table. Object `i` of the
/// slice becomes object number `i + 1`.
pub(crate) fn build_pdf(objects: &[&str], root: u32) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_pos = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root {root} 0 R >>\nstartxref\n{xref_pos}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

/// An unfiltered stream object body.
pub(crate) fn stream(extra: &str, data: &str) -> String {
    format!("<< /Length {} {extra} >>\nstream\n{data}\nendstream", data.len())
}

/// A one-page document (objects 1..=4: catalog, pages, page, contents)
/// followed by `extra` objects numbered from 5.
pub(crate) fn single_page_pdf(mediabox: &str, resources: &str, content: &str, extra: &[&str]) -> Vec<u8> {
    let page = format!(
        "<< /Type /Page /Parent 2 0 R /MediaBox {mediabox} /Resources {resources} /Contents 4 0 R >>"
    );
    let contents = stream("", content);
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        page.as_str(),
        contents.as_str(),
    ];
    objects.extend_from_slice(extra);
    build_pdf(&objects, 1)
}
