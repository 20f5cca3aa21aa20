//! Public rendering API.
//!
//! # Example
//!
//! ```ignore
//! use pdftoolkit_core::api::{open, render_all, RenderOptions};
//!
//! let doc = open(std::fs::read("document.pdf")?)?;
//! let pages = render_all(&doc, &RenderOptions::new().scale(2.0), |p| {
//!     eprintln!("{}/{}", p.page, p.total);
//! })?;
//! ```

pub mod options;
pub mod progress;
pub mod render;

pub use options::RenderOptions;
pub use progress::Progress;
pub use render::{
    open, open_with_cache, page_count, page_descriptor, page_dimensions, render_all,
    render_all_parallel, render_page, render_page_into,
};
