//! pdftoolkit - PDF page rendering from scratch.
//!
//! Bytes are parsed into a [`PDFDocument`] (xref tables and streams, the
//! page tree), a page's content stream is interpreted into painting calls,
//! and the rasteriser turns those into a [`PixelBuffer`].
//!
//! ```ignore
//! use pdftoolkit_core::api::{open, render_page, RenderOptions};
//!
//! let doc = open(std::fs::read("document.pdf")?)?;
//! let pixels = render_page(&doc, 0, &RenderOptions::new().scale(2.0))?;
//! ```

pub mod api;
pub mod codec;
pub mod document;
pub mod error;
pub mod font;
pub mod image;
pub mod interp;
pub mod model;
pub mod parser;
pub mod raster;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use api::{Progress, RenderOptions};
pub use document::{PDFDocument, PageDescriptor};
pub use error::{PdfError, Result};
pub use raster::{PixelBuffer, PixelFormat};
pub use utils::{file_name, file_stem};
