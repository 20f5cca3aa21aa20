//! Font handling.
//!
//! Glyphs are painted as boxes, so only metrics are read:
//! - `metrics` - advance widths, ascent/descent, code length (FontMetrics)

pub mod metrics;

pub use metrics::{CodeWidth, FontMetrics};
