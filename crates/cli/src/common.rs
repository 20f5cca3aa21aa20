//! Helpers shared by the command line tools.

use memmap2::Mmap;
use pdftoolkit_core::PDFDocument;
use pdftoolkit_core::error::Result;
use std::fs::File;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Log to stderr at `warn` (`debug` with `--debug`); `RUST_LOG` wins.
pub fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open a PDF by memory-mapping it.
pub fn open_document(path: &Path) -> Result<PDFDocument> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file) }?;
    PDFDocument::from_mmap(mmap)
}
