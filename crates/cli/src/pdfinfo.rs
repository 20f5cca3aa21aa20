//! pdfinfo - Print the page list of PDF files as JSON
//!
//! One JSON document per input file: its name, page count and every page
//! descriptor (media box, crop box, rotation, user unit, pixel size at
//! scale 1).

mod common;

use clap::{ArgAction, Parser};
use pdftoolkit_core::raster::output_size;
use pdftoolkit_core::{PDFDocument, PageDescriptor, file_name};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

/// Print the page list of PDF files as JSON.
#[derive(Parser, Debug)]
#[command(name = "pdfinfo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One or more paths to PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Pretty-print the JSON
    #[arg(short = 'p', long, action = ArgAction::SetTrue)]
    pretty: bool,
}

#[derive(Debug, Serialize)]
struct PageInfo {
    /// 1-based page number
    page: usize,
    objid: u32,
    mediabox: [f64; 4],
    cropbox: Option<[f64; 4]>,
    rotate: u16,
    user_unit: f64,
    width_px: u32,
    height_px: u32,
}

#[derive(Debug, Serialize)]
struct DocumentInfo {
    file_name: String,
    page_count: usize,
    pages: Vec<PageInfo>,
}

fn page_info(page: &PageDescriptor) -> PageInfo {
    let (x0, y0, x1, y1) = page.mediabox;
    let (width_px, height_px) = output_size(page, 1.0);
    PageInfo {
        page: page.index + 1,
        objid: page.objid,
        mediabox: [x0, y0, x1, y1],
        cropbox: page.cropbox.map(|(a, b, c, d)| [a, b, c, d]),
        rotate: page.rotate,
        user_unit: page.user_unit,
        width_px,
        height_px,
    }
}

fn document_info(path: &str, doc: &PDFDocument) -> DocumentInfo {
    DocumentInfo {
        file_name: file_name(path),
        page_count: doc.page_count(),
        pages: doc.pages().iter().map(page_info).collect(),
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    common::init_logging(args.debug);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = false;
    for path in &args.files {
        let doc = match common::open_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                eprintln!("Error processing {}: {e}", path.display());
                failed = true;
                continue;
            }
        };
        let info = document_info(&path.to_string_lossy(), &doc);
        if args.pretty {
            serde_json::to_writer_pretty(&mut out, &info)?;
        } else {
            serde_json::to_writer(&mut out, &info)?;
        }
        writeln!(out)?;
    }
    out.flush()?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_page_pdf() -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 200 100] >>",
            "<< /Type /Page /Parent 2 0 R >>",
            "<< /Type /Page /Parent 2 0 R /Rotate 90 >>",
        ];
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }
        let xref = out.len();
        out.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for off in offsets {
            out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(format!("trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n").as_bytes());
        out
    }

    #[test]
    fn test_document_info_json() {
        let doc = PDFDocument::open(two_page_pdf()).unwrap();
        let info = document_info("file:///tmp/scans/report.pdf", &doc);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["file_name"], "report.pdf");
        assert_eq!(json["page_count"], 2);
        assert_eq!(json["pages"][0]["width_px"], 200);
        assert_eq!(json["pages"][1]["rotate"], 90);
        assert_eq!(json["pages"][1]["width_px"], 100);
        assert_eq!(json["pages"][1]["height_px"], 200);
        assert!(json["pages"][0]["cropbox"].is_null());
    }
}
