//! PDF Document module - document structure and pages.
//!
//! This module contains:
//! - `xref` - cross-reference tables, streams and fallback scanning
//! - `catalog` - document opening, object resolution and caching (PDFDocument)
//! - `page` - page descriptors and page tree flattening

pub mod catalog;
pub mod page;
pub mod xref;

pub use catalog::{DEFAULT_CACHE_CAPACITY, PDFDocument, Resolved};
pub use page::{PageDescriptor, normalize_rotation};
pub use xref::{XRef, XRefEntry};
