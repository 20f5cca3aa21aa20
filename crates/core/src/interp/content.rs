//! Content stream parser.
//!
//! Splits a decoded content stream into operands and operators. Arrays and
//! dictionaries are assembled here; inline images (`BI ... ID ... EI`) come
//! out as a single token carrying their dictionary and raw data.
//!
//! Lexical errors are skipped byte by byte: a damaged content stream still
//! yields every operator that can be recovered.

use crate::model::objects::{PDFDict, PDFObject};
use crate::parser::lexer::{Keyword, Lexer, Token, is_whitespace};
use crate::parser::pdf_parser::find_bytes;

/// Token types produced by [`ContentParser`].
#[derive(Debug, Clone, PartialEq)]
pub enum ContentToken {
    /// An operand (number, string, name, array, dict)
    Operand(PDFObject),
    /// An operator keyword (BT, Tj, re, ...)
    Keyword(Keyword),
    /// An inline image with its (expanded) dictionary and raw data
    InlineImage { dict: PDFDict, data: Vec<u8> },
}

/// Context frame for array/dict construction.
#[derive(Debug)]
enum Context {
    Array(Vec<PDFObject>),
    Dict(Vec<PDFObject>),
}

/// Parser for PDF content streams.
pub struct ContentParser<'a> {
    lexer: Lexer<'a>,
    context_stack: Vec<Context>,
}

/// Expand inline image keys to their full names.
fn expand_inline_key(key: &str) -> &str {
    match key {
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "D" => "Decode",
        "DP" => "DecodeParms",
        "F" => "Filter",
        "H" => "Height",
        "W" => "Width",
        "IM" => "ImageMask",
        "I" => "Interpolate",
        "L" => "Length",
        other => other,
    }
}

fn int_value(dict: &PDFDict, key: &str) -> Option<usize> {
    dict.get(key)
        .and_then(|v| v.as_int().ok())
        .and_then(|v| usize::try_from(v).ok())
}

/// Byte length of an unfiltered inline image, when it can be computed from
/// the dictionary alone.
fn inline_data_len(dict: &PDFDict) -> Option<usize> {
    if dict.contains_key("Filter") {
        return None;
    }
    let width = int_value(dict, "Width")?;
    let height = int_value(dict, "Height")?;
    let image_mask = matches!(dict.get("ImageMask"), Some(PDFObject::Bool(true)));
    let (bpc, ncomp) = if image_mask {
        (1, 1)
    } else {
        let ncomp = match dict.get("ColorSpace")?.as_name().ok()? {
            "G" | "DeviceGray" | "CalGray" => 1,
            "RGB" | "DeviceRGB" | "CalRGB" => 3,
            "CMYK" | "DeviceCMYK" => 4,
            _ => return None,
        };
        (int_value(dict, "BitsPerComponent").unwrap_or(8), ncomp)
    };
    let row = (width.checked_mul(bpc)?.checked_mul(ncomp)?).div_ceil(8);
    row.checked_mul(height)
}

/// Does `rest` start with whitespace + `EI` + (whitespace | end)?
fn ei_follows(rest: &[u8]) -> bool {
    let skip = rest.iter().take_while(|&&b| is_whitespace(b)).count();
    let after = &rest[skip..];
    after.starts_with(b"EI") && after.get(2).is_none_or(|&b| is_whitespace(b))
}

impl<'a> ContentParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            context_stack: Vec::new(),
        }
    }

    /// Position of the next unread byte.
    pub fn tell(&self) -> usize {
        self.lexer.tell()
    }

    fn next_raw(&mut self) -> Option<Token> {
        loop {
            match self.lexer.next_token()? {
                Ok((_, token)) => return Some(token),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping bad content token");
                    let pos = self.lexer.tell();
                    self.lexer.set_pos(pos + 1);
                }
            }
        }
    }

    fn token_to_operand(token: Token) -> Option<PDFObject> {
        match token {
            Token::Int(n) => Some(PDFObject::Int(n)),
            Token::Real(n) => Some(PDFObject::Real(n)),
            Token::Bool(b) => Some(PDFObject::Bool(b)),
            Token::Name(n) => Some(PDFObject::Name(n)),
            Token::String(s) => Some(PDFObject::String(s)),
            Token::Keyword(Keyword::Null) => Some(PDFObject::Null),
            Token::Keyword(_) => None,
        }
    }

    fn build_dict(items: Vec<PDFObject>) -> PDFDict {
        let mut dict = PDFDict::new();
        let mut iter = items.into_iter();
        while let Some(key) = iter.next() {
            if let PDFObject::Name(name) = key
                && let Some(value) = iter.next()
            {
                dict.insert(name, value);
            }
        }
        dict
    }

    /// Finish a value: push it into the open array/dict, or return it.
    fn emit_value(&mut self, value: PDFObject) -> Option<PDFObject> {
        match self.context_stack.last_mut() {
            Some(Context::Array(items)) | Some(Context::Dict(items)) => {
                items.push(value);
                None
            }
            None => Some(value),
        }
    }

    /// Read `BI` dictionary entries up to `ID`, then the image data.
    fn read_inline_image(&mut self) -> Option<ContentToken> {
        let mut items = Vec::new();
        loop {
            match self.next_raw()? {
                Token::Keyword(Keyword::ID) => break,
                Token::Keyword(Keyword::ArrayStart) => {
                    let mut arr = Vec::new();
                    loop {
                        match self.next_raw()? {
                            Token::Keyword(Keyword::ArrayEnd) => break,
                            tok => arr.extend(Self::token_to_operand(tok)),
                        }
                    }
                    items.push(PDFObject::Array(arr));
                }
                Token::Keyword(Keyword::DictStart) => {
                    let mut entries = Vec::new();
                    loop {
                        match self.next_raw()? {
                            Token::Keyword(Keyword::DictEnd) => break,
                            tok => entries.extend(Self::token_to_operand(tok)),
                        }
                    }
                    items.push(PDFObject::Dict(Self::build_dict(entries)));
                }
                tok => items.extend(Self::token_to_operand(tok)),
            }
        }

        let mut dict = PDFDict::new();
        for (key, value) in Self::build_dict(items) {
            dict.insert(expand_inline_key(&key).to_string(), value);
        }

        // A single whitespace byte separates ID from the data.
        let data = self.lexer.data();
        let mut start = self.lexer.tell();
        if data.get(start).is_some_and(|&b| is_whitespace(b)) {
            start += 1;
        }
        let rest = &data[start.min(data.len())..];

        let end = match inline_data_len(&dict) {
            Some(len) if len <= rest.len() && ei_follows(&rest[len..]) => len,
            _ => Self::scan_for_ei(rest),
        };
        let image_data = rest[..end].to_vec();

        // Continue after EI.
        let after = start + end;
        let tail = &data[after.min(data.len())..];
        let ei = find_bytes(tail, b"EI").map_or(tail.len(), |p| p + 2);
        self.lexer.set_pos(after + ei);

        Some(ContentToken::InlineImage {
            dict,
            data: image_data,
        })
    }

    /// Length of inline data ending at the first `EI` delimited by whitespace.
    fn scan_for_ei(rest: &[u8]) -> usize {
        let mut from = 0;
        while let Some(rel) = find_bytes(&rest[from..], b"EI") {
            let pos = from + rel;
            let before_ok = pos > 0 && is_whitespace(rest[pos - 1]);
            let after_ok = rest.get(pos + 2).is_none_or(|&b| is_whitespace(b));
            if before_ok && after_ok {
                return pos - 1;
            }
            from = pos + 2;
        }
        rest.len()
    }

    /// Next operand, operator or inline image.
    pub fn next_token(&mut self) -> Option<ContentToken> {
        loop {
            let token = match self.next_raw() {
                Some(token) => token,
                None => {
                    // Unclosed arrays/dicts at the end of the stream are dropped.
                    self.context_stack.clear();
                    return None;
                }
            };

            let value = match token {
                Token::Keyword(Keyword::ArrayStart) => {
                    self.context_stack.push(Context::Array(Vec::new()));
                    continue;
                }
                Token::Keyword(Keyword::DictStart) => {
                    self.context_stack.push(Context::Dict(Vec::new()));
                    continue;
                }
                Token::Keyword(Keyword::ArrayEnd) => match self.context_stack.pop() {
                    Some(Context::Array(items)) => PDFObject::Array(items),
                    Some(other) => {
                        self.context_stack.push(other);
                        continue;
                    }
                    None => continue,
                },
                Token::Keyword(Keyword::DictEnd) => match self.context_stack.pop() {
                    Some(Context::Dict(items)) => PDFObject::Dict(Self::build_dict(items)),
                    Some(other) => {
                        self.context_stack.push(other);
                        continue;
                    }
                    None => continue,
                },
                Token::Keyword(Keyword::BI) if self.context_stack.is_empty() => {
                    return self.read_inline_image();
                }
                Token::Keyword(Keyword::Null) => PDFObject::Null,
                Token::Keyword(kw) => {
                    if self.context_stack.is_empty() {
                        return Some(ContentToken::Keyword(kw));
                    }
                    // Operators inside arrays are not meaningful; drop them.
                    continue;
                }
                other => match Self::token_to_operand(other) {
                    Some(v) => v,
                    None => continue,
                },
            };

            if let Some(value) = self.emit_value(value) {
                return Some(ContentToken::Operand(value));
            }
        }
    }
}

impl Iterator for ContentParser<'_> {
    type Item = ContentToken;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
