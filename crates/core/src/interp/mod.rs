//! Content stream interpretation.
//!
//! This module contains:
//! - `content`: tokenizer for content streams, including inline images
//! - `interpreter`: the page interpreter and its state stack
//! - `device`: the [`OperatorSink`] trait painting calls are sent to
//! - `ops`: operator implementations by category

pub mod content;
pub mod device;
pub mod interpreter;
pub(crate) mod ops;

pub use content::{ContentParser, ContentToken};
pub use device::{OperatorSink, PathSegment, RecordingSink, SinkEvent};
pub use interpreter::{PDFPageInterpreter, TextSeqItem};

use crate::document::{PDFDocument, PageDescriptor};
use crate::error::Result;

/// Interpret the content of `page` into `sink`.
///
/// The sink receives geometry in user space along with every CTM change;
/// the initial CTM is the identity.
pub fn run<D: OperatorSink>(doc: &PDFDocument, page: &PageDescriptor, sink: &mut D) -> Result<()> {
    PDFPageInterpreter::new(doc, sink).process_page(page)
}
