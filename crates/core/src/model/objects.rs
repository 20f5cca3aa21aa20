//! PDF object types.
//!
//! Everything the object parser produces is a [`PDFObject`]. Indirect
//! references stay unresolved ([`PDFObject::Ref`]) until the document
//! dereferences them, so the object graph never owns a cycle.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use std::collections::HashMap;

/// Dictionary type shared by dicts and stream attributes.
pub type PDFDict = HashMap<String, PDFObject>;

/// A parsed PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Name without the leading slash, `#xx` escapes already decoded
    Name(String),
    /// Literal or hex string as raw bytes
    String(Vec<u8>),
    Array(Vec<Self>),
    Dict(PDFDict),
    Stream(Box<PDFStream>),
    /// `objid genno R`
    Ref(PDFObjRef),
}

impl PDFObject {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn mismatch(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Integer value. Reals with no fractional part are accepted.
    pub fn as_int(&self) -> Result<i64> {
        match *self {
            Self::Int(n) => Ok(n),
            Self::Real(r) if r.is_finite() && r.fract() == 0.0 => Ok(r as i64),
            _ => Err(self.mismatch("int")),
        }
    }

    /// Int or real as `f64`.
    pub fn as_num(&self) -> Result<f64> {
        match *self {
            Self::Int(n) => Ok(n as f64),
            Self::Real(r) => Ok(r),
            _ => Err(self.mismatch("number")),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(name) => Ok(name),
            _ => Err(self.mismatch("name")),
        }
    }

    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(bytes) => Ok(bytes),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[Self]> {
        match self {
            Self::Array(items) => Ok(items),
            _ => Err(self.mismatch("array")),
        }
    }

    /// Dictionary view. A stream yields its attribute dictionary.
    pub fn as_dict(&self) -> Result<&PDFDict> {
        match self {
            Self::Dict(dict) => Ok(dict),
            Self::Stream(stream) => Ok(&stream.attrs),
            _ => Err(self.mismatch("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&PDFStream> {
        match self {
            Self::Stream(stream) => Ok(stream),
            _ => Err(self.mismatch("stream")),
        }
    }

    /// Key lookup on a dict or stream; `None` for everything else.
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_dict().ok()?.get(key)
    }

    /// Short variant name used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }
}

/// Indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PDFObjRef {
    pub objid: u32,
    pub genno: u32,
}

impl PDFObjRef {
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

/// Stream attributes plus the still-encoded data.
///
/// Filters are applied on demand by
/// [`crate::document::PDFDocument::decode_stream`]. The data is a slice of
/// the file buffer, not a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct PDFStream {
    pub attrs: PDFDict,
    rawdata: Bytes,
    /// Number of the indirect object holding this stream, when known
    pub objid: Option<u32>,
    pub genno: Option<u32>,
}

impl PDFStream {
    pub fn new(attrs: PDFDict, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            objid: None,
            genno: None,
        }
    }

    /// Record which indirect object this stream was read from.
    pub const fn set_objid(&mut self, objid: u32, genno: u32) {
        self.objid = Some(objid);
        self.genno = Some(genno);
    }

    pub fn get_rawdata(&self) -> &[u8] {
        &self.rawdata
    }

    pub fn get(&self, name: &str) -> Option<&PDFObject> {
        self.attrs.get(name)
    }

    /// First attribute present under any of `names` (full or abbreviated key).
    pub fn get_any(&self, names: &[&str]) -> Option<&PDFObject> {
        names.iter().find_map(|name| self.attrs.get(*name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(PDFObject::Int(3).as_num().unwrap(), 3.0);
        assert_eq!(PDFObject::Real(2.0).as_int().unwrap(), 2);
        assert!(PDFObject::Real(2.5).as_int().is_err());
        assert!(PDFObject::Real(f64::INFINITY).as_int().is_err());
    }

    #[test]
    fn test_type_error_names_both_sides() {
        let err = PDFObject::Name("X".into()).as_array().unwrap_err();
        assert!(matches!(
            err,
            PdfError::TypeError {
                expected: "array",
                got: "name"
            }
        ));
    }

    #[test]
    fn test_stream_behaves_as_dict() {
        let mut attrs = PDFDict::new();
        attrs.insert("Length".into(), PDFObject::Int(3));
        let obj = PDFObject::Stream(Box::new(PDFStream::new(attrs, b"abc".to_vec())));
        assert_eq!(obj.get("Length"), Some(&PDFObject::Int(3)));
        assert!(obj.as_dict().is_ok());
        assert_eq!(obj.as_stream().unwrap().get_rawdata(), b"abc");
        assert_eq!(PDFObject::Int(1).get("Length"), None);
    }
}
