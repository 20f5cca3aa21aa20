//! Images: decoding of image XObjects and inline images, and export of
//! rendered pages.

pub mod decode;
pub mod writer;

pub use decode::{DecodedImage, decode_image};
pub use writer::{BmpWriter, write_bmp, write_ppm};
