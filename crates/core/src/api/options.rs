//! Render configuration.
//!
//! # Example
//! ```
//! use pdftoolkit_core::api::RenderOptions;
//! use pdftoolkit_core::raster::PixelFormat;
//!
//! let opts = RenderOptions::new().scale(2.0).format(PixelFormat::Rgba8);
//! assert!(opts.validate().is_ok());
//! ```

use crate::error::{PdfError, Result};
use crate::raster::PixelFormat;

/// Options for page rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Device pixels per PDF unit. Must be finite and positive.
    pub scale: f64,
    /// Output sample layout.
    pub format: PixelFormat,
    /// 4x4 supersampled edges instead of pixel-centre sampling.
    pub anti_alias: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            format: PixelFormat::Rgb8,
            anti_alias: false,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scale (1.0 renders one pixel per point).
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn anti_alias(mut self, on: bool) -> Self {
        self.anti_alias = on;
        self
    }

    /// Reject settings that cannot render. Nothing is coerced to a default.
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(PdfError::InvalidOption(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}
