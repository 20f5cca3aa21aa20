//! Document opening, cross-reference resolution and page tree tests.

mod common;

use common::{
    PdfBuilder, append_xref_stream_update, flate, last_startxref, page_tree, raw_object, single_page,
    single_page_builder, stream_body, xref_rows, xref_stream_object,
};
use pdftoolkit_core::model::PDFObject;
use pdftoolkit_core::{PDFDocument, PdfError};

#[test]
fn test_open_rejects_missing_header() {
    let mut pdf = single_page("[0 0 10 10]", "", b"");
    pdf[..5].copy_from_slice(b"%XYZ-");
    let err = PDFDocument::open(&pdf).unwrap_err();
    assert!(matches!(err, PdfError::InvalidHeader), "got {err:?}");
}

#[test]
fn test_open_rejects_encrypted() {
    let pdf = single_page_builder("[0 0 10 10]", "", b"")
        .object(5, "<< /Filter /Standard /V 1 /R 2 >>")
        .trailer("/Encrypt 5 0 R")
        .build(1);
    let err = PDFDocument::open(&pdf).unwrap_err();
    assert!(matches!(err, PdfError::EncryptedUnsupported), "got {err:?}");
}

#[test]
fn test_incremental_update_overrides_object() {
    let base = single_page("[0 0 10 10]", "", b"0 0 1 rg 0 0 10 10 re f");
    let updated = PdfBuilder::new()
        .stream(4, "", b"1 0 0 rg 0 0 10 10 re f")
        .append_to(base.clone(), 1);

    let old = PDFDocument::open(&base).unwrap();
    let new = PDFDocument::open(&updated).unwrap();
    let old_obj = old.resolve(4, 0).unwrap();
    let new_obj = new.resolve(4, 0).unwrap();
    assert_eq!(old_obj.as_stream().unwrap().get_rawdata(), b"0 0 1 rg 0 0 10 10 re f");
    assert_eq!(new_obj.as_stream().unwrap().get_rawdata(), b"1 0 0 rg 0 0 10 10 re f");

    // Objects only defined in the first revision are still reachable.
    assert_eq!(new.page_count(), 1);
    let page = new.page_descriptor(0).unwrap();
    assert_eq!(new.page_contents(page).unwrap(), b"1 0 0 rg 0 0 10 10 re f");
}

#[test]
fn test_incremental_update_can_add_pages() {
    let base = single_page("[0 0 10 10]", "", b"");
    let updated = PdfBuilder::new()
        .object(2, "<< /Type /Pages /Kids [3 0 R 5 0 R] /Count 2 >>")
        .object(5, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 30 40] >>")
        .append_to(base, 1);
    let doc = PDFDocument::open(&updated).unwrap();
    assert_eq!(doc.page_count(), 2);
    let second = doc.page_descriptor(1).unwrap();
    assert_eq!(second.objid, 5);
    assert_eq!(second.mediabox, (0.0, 0.0, 30.0, 40.0));
    assert!(second.contents.is_empty());
}

#[test]
fn test_free_entry_in_update_deletes_object() {
    let base = single_page_builder("[0 0 10 10]", "", b"")
        .object(5, "[1 2 3]")
        .build(1);
    let prev = last_startxref(&base);
    let mut updated = base.clone();
    let xref = updated.len();
    updated.extend_from_slice(
        format!(
            "xref\n5 1\n0000000000 00001 f \ntrailer\n<< /Size 6 /Root 1 0 R /Prev {prev} >>\nstartxref\n{xref}\n%%EOF\n"
        )
        .as_bytes(),
    );

    let old = PDFDocument::open(&base).unwrap();
    assert!(matches!(old.resolve(5, 0).unwrap().as_ref(), PDFObject::Array(_)));
    let new = PDFDocument::open(&updated).unwrap();
    let err = new.resolve(5, 0).unwrap_err();
    assert!(matches!(err, PdfError::ObjectNotFound(5)), "got {err:?}");
    assert_eq!(new.page_count(), 1);
}

#[test]
fn test_hybrid_xref_stream_fills_gaps_only() {
    let base = single_page("[0 0 10 10]", "", b"0 0 1 rg 0 0 10 10 re f");
    let prev = last_startxref(&base);
    let mut pdf = base;

    let marker_at = pdf.len();
    pdf.extend_from_slice(&raw_object(5, b"<< /Marker 5 >>"));
    let content_at = pdf.len();
    pdf.extend_from_slice(&raw_object(4, &stream_body(b"1 0 0 rg 0 0 10 10 re f")));
    // The stream also lists object 4, at a bogus offset.
    let stm_at = pdf.len();
    let rows = xref_rows(&[(1, 1, 0), (1, marker_at as u32, 0)]);
    pdf.extend_from_slice(&xref_stream_object(6, "4 2", &rows, "/Size 7"));

    let xref = pdf.len();
    pdf.extend_from_slice(
        format!(
            "xref\n4 1\n{content_at:010} 00000 n \ntrailer\n<< /Size 7 /Root 1 0 R /Prev {prev} /XRefStm {stm_at} >>\nstartxref\n{xref}\n%%EOF\n"
        )
        .as_bytes(),
    );

    let doc = PDFDocument::open(&pdf).unwrap();
    let marker = doc.resolve(5, 0).unwrap();
    assert_eq!(marker.get("Marker"), Some(&PDFObject::Int(5)));
    let page = doc.page_descriptor(0).unwrap();
    assert_eq!(doc.page_contents(page).unwrap(), b"1 0 0 rg 0 0 10 10 re f");
}

#[test]
fn test_updates_chained_through_xref_streams() {
    let base = single_page_builder("[0 0 10 10]", "", b"0 0 1 rg 0 0 10 10 re f")
        .object(5, "[1 2 3]")
        .build(1);
    let red = stream_body(b"1 0 0 rg 0 0 10 10 re f");
    let first = append_xref_stream_update(base, &[(4, red.as_slice())], &[], 6);
    let second = append_xref_stream_update(first.clone(), &[(7, b"(added)".as_slice())], &[5], 8);

    let doc = PDFDocument::open(&first).unwrap();
    assert!(doc.resolve(5, 0).is_ok());

    let doc = PDFDocument::open(&second).unwrap();
    let page = doc.page_descriptor(0).unwrap();
    assert_eq!(doc.page_contents(page).unwrap(), b"1 0 0 rg 0 0 10 10 re f");
    assert_eq!(doc.resolve(7, 0).unwrap().as_ref(), &PDFObject::String(b"added".to_vec()));
    assert!(matches!(doc.resolve(5, 0), Err(PdfError::ObjectNotFound(5))));
    assert!(matches!(doc.resolve(1, 0).unwrap().get("Type"), Some(PDFObject::Name(n)) if n == "Catalog"));
}

#[test]
fn test_out_of_range_subsection_base_is_skipped() {
    let pdf = single_page("[0 0 10 10]", "", b"0 0 1 rg 0 0 10 10 re f");
    let xref = last_startxref(&pdf);
    let trailer = xref + pdf[xref..].windows(7).position(|w| w == b"trailer").unwrap();
    let mut patched = pdf[..trailer].to_vec();
    patched.extend_from_slice(b"18446744073709551615 2\n0000000009 00000 n \n0000000009 00000 n \n");
    patched.extend_from_slice(&pdf[trailer..]);

    let doc = PDFDocument::open(&patched).unwrap();
    assert_eq!(doc.page_count(), 1);
    let page = doc.page_descriptor(0).unwrap();
    assert_eq!(doc.page_contents(page).unwrap(), b"0 0 1 rg 0 0 10 10 re f");
}

#[test]
fn test_reference_cycle_fails_open() {
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Contents 5 0 R >>")
        .object(5, "6 0 R")
        .object(6, "5 0 R")
        .build(1);
    let err = PDFDocument::open(&pdf).unwrap_err();
    assert!(matches!(err, PdfError::CircularReference(_)), "got {err:?}");
}

#[test]
fn test_page_tree_cycle_fails_open() {
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Pages /Kids [2 0 R] /Count 1 >>")
        .build(1);
    let err = PDFDocument::open(&pdf).unwrap_err();
    assert!(matches!(err, PdfError::CircularReference(2)), "got {err:?}");
}

#[test]
fn test_count_mismatch_uses_flattened_pages() {
    let blank: &[u8] = b"";
    let pdf = page_tree("[0 0 10 10]", 7, &[("", blank), ("", blank), ("", blank)]);
    let doc = PDFDocument::open(&pdf).unwrap();
    assert_eq!(doc.page_count(), 3);
    let ids: Vec<u32> = doc.pages().iter().map(|p| p.objid).collect();
    assert_eq!(ids, vec![3, 5, 7]);
}

#[test]
fn test_inherited_attributes() {
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R] /Count 2 /MediaBox [0 0 300 200] /Rotate -90 \
             /Resources << /XObject << >> >> >>",
        )
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 5 0 R] /Count 2 /Rotate 45 >>")
        .object(4, "<< /Type /Page /Parent 3 0 R >>")
        .object(5, "<< /Type /Page /Parent 3 0 R /Rotate 180 /CropBox [10 10 50 50] /UserUnit 2 >>")
        .build(1);
    let doc = PDFDocument::open(&pdf).unwrap();
    let first = doc.page_descriptor(0).unwrap();
    let second = doc.page_descriptor(1).unwrap();

    assert_eq!(first.mediabox, (0.0, 0.0, 300.0, 200.0));
    // The nearest /Rotate is 45, which is not a quarter turn.
    assert_eq!(first.rotate, 0);
    assert!(first.resources.contains_key("XObject"));
    assert_eq!(first.cropbox, None);
    assert_eq!(first.user_unit, 1.0);

    assert_eq!(second.rotate, 180);
    assert_eq!(second.cropbox, Some((10.0, 10.0, 50.0, 50.0)));
    assert_eq!(second.user_unit, 2.0);
    assert_eq!(second.display_size(), (600.0, 400.0));
}

#[test]
fn test_negative_rotation_normalised() {
    let pdf = single_page("[0 0 200 100]", "/Rotate -90", b"");
    let doc = PDFDocument::open(&pdf).unwrap();
    assert_eq!(doc.page_descriptor(0).unwrap().rotate, 270);
}

#[test]
fn test_page_index_out_of_range() {
    let pdf = single_page("[0 0 10 10]", "", b"");
    let doc = PDFDocument::open(&pdf).unwrap();
    let err = doc.page_descriptor(1).unwrap_err();
    assert!(matches!(err, PdfError::PageIndexOutOfRange { index: 1, count: 1 }));
}

#[test]
fn test_flate_content_round_trip() {
    let content = b"q 1 0 0 RG 2 w 0 0 m 10 10 l S Q\nBT /F1 12 Tf (Hello) Tj ET";
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Contents 4 0 R >>")
        .stream(4, "/Filter /FlateDecode", &flate(content))
        .build(1);
    let doc = PDFDocument::open(&pdf).unwrap();
    let page = doc.page_descriptor(0).unwrap();
    assert_eq!(doc.page_contents(page).unwrap(), content);
}

#[test]
fn test_content_array_is_joined() {
    let pdf = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Contents [4 0 R 5 0 R] >>")
        .stream(4, "", b"0 0 m")
        .stream(5, "/Filter [/FlateDecode]", &flate(b"5 5 l S"))
        .build(1);
    let doc = PDFDocument::open(&pdf).unwrap();
    let page = doc.page_descriptor(0).unwrap();
    assert_eq!(doc.page_contents(page).unwrap(), b"0 0 m\n5 5 l S");
}

#[test]
fn test_unsupported_filter_reported() {
    let pdf = single_page_builder("[0 0 10 10]", "", b"")
        .stream(5, "/Filter /DCTDecode", b"\xff\xd8\xff")
        .build(1);
    let doc = PDFDocument::open(&pdf).unwrap();
    let stream = doc.resolve(5, 0).unwrap();
    let err = doc.decode_stream(stream.as_stream().unwrap()).unwrap_err();
    assert!(matches!(err, PdfError::UnsupportedFilter(ref name) if name == "DCTDecode"), "got {err:?}");
}

#[test]
fn test_missing_startxref_recovers_by_scanning() {
    let mut pdf = single_page("[0 0 40 20]", "", b"0 0 m 10 10 l S");
    let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
    pdf.truncate(pos);
    let doc = PDFDocument::open(&pdf).unwrap();
    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.page_descriptor(0).unwrap().mediabox, (0.0, 0.0, 40.0, 20.0));
}

#[test]
fn test_document_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PDFDocument>();
}
