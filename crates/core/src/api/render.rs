//! Page rendering entry points.
//!
//! - `open()` / `open_with_cache()` - Parse a document from bytes
//! - `page_count()` / `page_descriptor()` / `page_dimensions()` - Page queries
//! - `render_page()` / `render_page_into()` - Render one page
//! - `render_all()` - Render every page in order, reporting progress
//! - `render_all_parallel()` - Render every page on a rayon pool

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use super::options::RenderOptions;
use super::progress::Progress;
use crate::document::{PDFDocument, PageDescriptor};
use crate::error::{PdfError, Result};
use crate::raster::{self, PixelBuffer};

pub(crate) fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Parse a document.
///
/// # Example
/// ```ignore
/// use pdftoolkit_core::api::{open, render_page, RenderOptions};
///
/// let doc = open(std::fs::read("document.pdf")?)?;
/// let first = render_page(&doc, 0, &RenderOptions::new().scale(0.5))?;
/// ```
pub fn open<D: AsRef<[u8]>>(data: D) -> Result<PDFDocument> {
    PDFDocument::open(data)
}

/// Parse a document with an explicit object cache capacity.
pub fn open_with_cache<D: AsRef<[u8]>>(data: D, cache_capacity: usize) -> Result<PDFDocument> {
    PDFDocument::open_with_cache(data, cache_capacity)
}

/// Number of leaf pages in the page tree.
pub fn page_count(doc: &PDFDocument) -> usize {
    doc.page_count()
}

pub fn page_descriptor(doc: &PDFDocument, index: usize) -> Result<&PageDescriptor> {
    doc.page_descriptor(index)
}

/// Pixel size `render_page` would produce for page `index`.
pub fn page_dimensions(doc: &PDFDocument, index: usize, options: &RenderOptions) -> Result<(u32, u32)> {
    options.validate()?;
    let page = doc.page_descriptor(index)?;
    raster::checked_output_size(page, options.scale)
}

/// Render page `index` into a new buffer.
pub fn render_page(doc: &PDFDocument, index: usize, options: &RenderOptions) -> Result<PixelBuffer> {
    options.validate()?;
    let page = doc.page_descriptor(index)?;
    let buffer = raster::rasterize(doc, page, options.scale, options.format, options.anti_alias)?;
    tracing::debug!(
        page = index,
        width = buffer.width(),
        height = buffer.height(),
        "rendered page"
    );
    Ok(buffer)
}

/// Render page `index` into a buffer the caller allocated, e.g. one reused
/// across pages of the same size. Its size and format must match
/// [`page_dimensions`] and `options.format`.
pub fn render_page_into(
    doc: &PDFDocument,
    index: usize,
    options: &RenderOptions,
    buffer: &mut PixelBuffer,
) -> Result<()> {
    options.validate()?;
    if buffer.format() != options.format {
        return Err(PdfError::InvalidOption(format!(
            "buffer format {:?} does not match requested {:?}",
            buffer.format(),
            options.format
        )));
    }
    let page = doc.page_descriptor(index)?;
    raster::rasterize_into(doc, page, options.scale, options.anti_alias, buffer)
}

/// Render every page in document order.
///
/// A failing page yields its error in its slot and the run continues.
/// `on_progress` is called after each page. Invalid options fail the whole
/// call before any page is rendered.
pub fn render_all(
    doc: &PDFDocument,
    options: &RenderOptions,
    mut on_progress: impl FnMut(Progress),
) -> Result<Vec<Result<PixelBuffer>>> {
    options.validate()?;
    let total = doc.page_count();
    let mut results = Vec::with_capacity(total);
    for index in 0..total {
        let result = render_page(doc, index, options);
        if let Err(err) = &result {
            tracing::warn!(page = index + 1, error = %err, "page failed to render");
        }
        results.push(result);
        on_progress(Progress::after_page(index, total));
    }
    Ok(results)
}

/// Render every page on a pool of `threads` workers (0 picks one per CPU).
///
/// Results come back in page order.
pub fn render_all_parallel(
    doc: &PDFDocument,
    options: &RenderOptions,
    threads: usize,
) -> Result<Vec<Result<PixelBuffer>>> {
    options.validate()?;
    let threads = if threads == 0 { default_thread_count() } else { threads };
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| PdfError::InvalidOption(e.to_string()))?;

    let results = pool.install(|| {
        (0..doc.page_count())
            .into_par_iter()
            .map(|index| render_page(doc, index, options))
            .collect()
    });
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelFormat;
    use crate::test_support::single_page_pdf;

    fn red_square_doc() -> PDFDocument {
        let pdf = single_page_pdf("[0 0 20 10]", "<< >>", "1 0 0 rg 0 0 5 5 re f", &[]);
        open(&pdf).unwrap()
    }

    #[test]
    fn test_render_page_reports_index_errors() {
        let doc = red_square_doc();
        let err = render_page(&doc, 3, &RenderOptions::new()).unwrap_err();
        assert!(matches!(err, PdfError::PageIndexOutOfRange { index: 3, count: 1 }));
    }

    #[test]
    fn test_render_page_into_reuses_buffer() {
        let doc = red_square_doc();
        let opts = RenderOptions::new().format(PixelFormat::Rgba8);
        let (w, h) = page_dimensions(&doc, 0, &opts).unwrap();
        let mut buffer = PixelBuffer::new(w, h, PixelFormat::Rgba8);
        render_page_into(&doc, 0, &opts, &mut buffer).unwrap();
        assert_eq!(buffer, render_page(&doc, 0, &opts).unwrap());
        assert_eq!(buffer.pixel(0, 9), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_render_page_into_checks_format() {
        let doc = red_square_doc();
        let mut buffer = PixelBuffer::new(20, 10, PixelFormat::Rgba8);
        let err = render_page_into(&doc, 0, &RenderOptions::new(), &mut buffer).unwrap_err();
        assert!(matches!(err, PdfError::InvalidOption(_)));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let doc = red_square_doc();
        let opts = RenderOptions::new();
        let seq = render_all(&doc, &opts, |_| {}).unwrap();
        let par = render_all_parallel(&doc, &opts, 2).unwrap();
        assert_eq!(seq.len(), par.len());
        for (a, b) in seq.iter().zip(&par) {
            assert_eq!(a.as_ref().unwrap(), b.as_ref().unwrap());
        }
    }
}
