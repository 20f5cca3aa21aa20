//! Data model shared by the parser, document and interpreter:
//! - `objects` - PDF object types (PDFObject, PDFStream, PDFObjRef)
//! - `state` - Graphics and text state (PDFGraphicState, PDFTextState, Color)
//! - `color` - Color spaces (PDFColorSpace)

pub mod color;
pub mod objects;
pub mod state;

pub use color::PDFColorSpace;
pub use objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
pub use state::{Color, LineCap, LineJoin, PDFGraphicState, PDFTextState};
