//! PDF object parser - converts tokens into PDF objects.
//!
//! Builds arrays, dictionaries, indirect references (`n g R`) and, for
//! indirect objects, stream bodies sized by their `/Length`.

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
use crate::parser::lexer::{Keyword, Lexer, Token};

/// Nesting limit for arrays and dictionaries.
const MAX_DEPTH: usize = 256;

/// PDF Parser - parses PDF object syntax.
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    /// Lookahead buffer for tokens, most recent last
    lookahead: Vec<(usize, Token)>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            lookahead: Vec::new(),
        }
    }

    /// Parser positioned at `offset`.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        let mut parser = Self::new(data);
        parser.lexer.set_pos(offset);
        parser
    }

    /// Position of the next unread token.
    pub fn tell(&self) -> usize {
        match self.lookahead.last() {
            Some((pos, _)) => *pos,
            None => self.lexer.tell(),
        }
    }

    /// Get next token (from lookahead or lexer).
    pub fn next_token(&mut self) -> Result<Option<(usize, Token)>> {
        if let Some(tok) = self.lookahead.pop() {
            return Ok(Some(tok));
        }
        self.lexer.next_token().transpose()
    }

    /// Push token back to lookahead.
    fn push_back(&mut self, tok: (usize, Token)) {
        self.lookahead.push(tok);
    }

    fn eof_error(&self, what: &str) -> PdfError {
        PdfError::MalformedToken {
            pos: self.lexer.tell(),
            msg: format!("unexpected end of data in {}", what),
        }
    }

    /// Parse next PDF object.
    pub fn parse_object(&mut self) -> Result<PDFObject> {
        self.parse_nested(0)
    }

    fn parse_nested(&mut self, depth: usize) -> Result<PDFObject> {
        let (pos, token) = self
            .next_token()?
            .ok_or_else(|| self.eof_error("object"))?;
        self.token_to_object(pos, token, depth)
    }

    /// Convert a token to a PDF object.
    fn token_to_object(&mut self, pos: usize, token: Token, depth: usize) -> Result<PDFObject> {
        if depth > MAX_DEPTH {
            return Err(PdfError::malformed(pos, "objects nested too deeply"));
        }
        match token {
            Token::Int(n) => self.int_or_ref(pos, n),
            Token::Real(n) => Ok(PDFObject::Real(n)),
            Token::Bool(b) => Ok(PDFObject::Bool(b)),
            Token::Name(s) => Ok(PDFObject::Name(s)),
            Token::String(s) => Ok(PDFObject::String(s)),
            Token::Keyword(Keyword::Null) => Ok(PDFObject::Null),
            Token::Keyword(Keyword::ArrayStart) => self.parse_array(depth),
            Token::Keyword(Keyword::DictStart) => self.parse_dict(depth).map(PDFObject::Dict),
            Token::Keyword(kw) => Err(PdfError::malformed(
                pos,
                format!("unexpected keyword: {}", String::from_utf8_lossy(kw.as_bytes())),
            )),
        }
    }

    /// An integer may be the start of an indirect reference: `objid genno R`.
    fn int_or_ref(&mut self, pos: usize, n: i64) -> Result<PDFObject> {
        let Some(tok2) = self.next_token()? else {
            return Ok(PDFObject::Int(n));
        };
        if let (_, Token::Int(m)) = tok2 {
            match self.next_token()? {
                Some((_, Token::Keyword(Keyword::R))) => {
                    let objid = u32::try_from(n)
                        .map_err(|_| PdfError::malformed(pos, "object number out of range"))?;
                    let genno = u32::try_from(m)
                        .map_err(|_| PdfError::malformed(pos, "generation out of range"))?;
                    return Ok(PDFObject::Ref(PDFObjRef::new(objid, genno)));
                }
                Some(tok3) => self.push_back(tok3),
                None => {}
            }
        }
        self.push_back(tok2);
        Ok(PDFObject::Int(n))
    }

    /// Parse array contents until ].
    fn parse_array(&mut self, depth: usize) -> Result<PDFObject> {
        let mut arr = Vec::new();
        loop {
            let (pos, token) = self
                .next_token()?
                .ok_or_else(|| self.eof_error("array"))?;
            if token == Token::Keyword(Keyword::ArrayEnd) {
                break;
            }
            arr.push(self.token_to_object(pos, token, depth + 1)?);
        }
        Ok(PDFObject::Array(arr))
    }

    /// Parse dict contents until >>.
    fn parse_dict(&mut self, depth: usize) -> Result<PDFDict> {
        let mut dict = PDFDict::new();
        loop {
            let (pos, token) = self
                .next_token()?
                .ok_or_else(|| self.eof_error("dictionary"))?;

            let key = match token {
                Token::Keyword(Keyword::DictEnd) => break,
                Token::Name(name) => name,
                _ => return Err(PdfError::malformed(pos, "expected name as dict key")),
            };

            // A key directly followed by >> has no value; treat it as null.
            let (vpos, vtoken) = self
                .next_token()?
                .ok_or_else(|| self.eof_error("dictionary"))?;
            if vtoken == Token::Keyword(Keyword::DictEnd) {
                break;
            }
            let value = self.token_to_object(vpos, vtoken, depth + 1)?;
            if !value.is_null() {
                dict.insert(key, value);
            }
        }
        Ok(dict)
    }

    /// Expect a specific keyword as the next token.
    pub fn expect_keyword(&mut self, expected: Keyword) -> Result<usize> {
        match self.next_token()? {
            Some((pos, Token::Keyword(kw))) if kw == expected => Ok(pos),
            Some((pos, tok)) => Err(PdfError::malformed(
                pos,
                format!(
                    "expected '{}', found {:?}",
                    String::from_utf8_lossy(expected.as_bytes()),
                    tok
                ),
            )),
            None => Err(self.eof_error("object")),
        }
    }

    fn expect_uint(&mut self, what: &str) -> Result<(usize, u32)> {
        match self.next_token()? {
            Some((pos, Token::Int(n))) => u32::try_from(n)
                .map(|v| (pos, v))
                .map_err(|_| PdfError::malformed(pos, format!("{} out of range", what))),
            Some((pos, _)) => Err(PdfError::malformed(pos, format!("expected {}", what))),
            None => Err(self.eof_error(what)),
        }
    }

    /// Parse an indirect object `objid genno obj ... endobj` at the current
    /// position.
    ///
    /// `resolve_length` is called when a stream's `/Length` is an indirect
    /// reference. A missing or wrong length falls back to scanning for
    /// `endstream`.
    pub fn parse_indirect(
        &mut self,
        resolve_length: &dyn Fn(PDFObjRef) -> Result<i64>,
    ) -> Result<(PDFObjRef, PDFObject)> {
        let (start, objid) = self.expect_uint("object number")?;
        let (_, genno) = self.expect_uint("generation number")?;
        self.expect_keyword(Keyword::Obj)?;
        let objref = PDFObjRef::new(objid, genno);

        let obj = self.parse_object()?;
        let next = self.next_token()?;
        match (obj, next) {
            (PDFObject::Dict(attrs), Some((_, Token::Keyword(Keyword::Stream)))) => {
                let mut stream = self.read_stream_body(start, attrs, resolve_length)?;
                stream.set_objid(objid, genno);
                Ok((objref, PDFObject::Stream(Box::new(stream))))
            }
            (obj, Some(tok)) => {
                // Usually `endobj`; anything else is left for the caller.
                if tok.1 != Token::Keyword(Keyword::EndObj) {
                    self.push_back(tok);
                }
                Ok((objref, obj))
            }
            (obj, None) => Ok((objref, obj)),
        }
    }

    fn read_stream_body(
        &mut self,
        obj_start: usize,
        attrs: PDFDict,
        resolve_length: &dyn Fn(PDFObjRef) -> Result<i64>,
    ) -> Result<PDFStream> {
        // The lexer sits right after the `stream` keyword.
        debug_assert!(self.lookahead.is_empty());
        self.lexer.skip_stream_eol();
        let body_start = self.lexer.tell();
        let data = self.lexer.data();

        let declared = match attrs.get("Length") {
            Some(PDFObject::Ref(r)) => match resolve_length(*r) {
                Ok(len) => Some(len),
                Err(err @ PdfError::CircularReference(_)) => return Err(err),
                Err(err) => {
                    tracing::debug!(error = %err, "indirect stream length unavailable");
                    None
                }
            },
            Some(obj) => obj.as_int().ok(),
            None => None,
        };

        if let Some(len) = declared.and_then(|l| usize::try_from(l).ok())
            && let Some(end) = body_start.checked_add(len).filter(|&e| e <= data.len())
            && endstream_follows(&data[end..])
        {
            let raw = self.lexer.read_raw(len)?;
            let raw = raw.to_vec();
            self.skip_past_endstream();
            return Ok(PDFStream::new(attrs, raw));
        }

        // Length absent, wrong or past the end: trust the endstream marker.
        let Some(rel) = find_bytes(&data[body_start..], b"endstream") else {
            return Err(PdfError::TruncatedFile(format!(
                "stream of object at offset {} has no endstream",
                obj_start
            )));
        };
        if declared.is_some() {
            tracing::warn!(offset = obj_start, "stream /Length is wrong, using endstream marker");
        }
        let mut end = body_start + rel;
        // Drop the EOL that precedes endstream.
        if end > body_start && data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > body_start && data[end - 1] == b'\r' {
            end -= 1;
        }
        let raw = data[body_start..end].to_vec();
        self.lexer.set_pos(body_start + rel);
        self.skip_past_endstream();
        Ok(PDFStream::new(attrs, raw))
    }

    fn skip_past_endstream(&mut self) {
        self.lexer.skip_whitespace();
        if self.lexer.remaining().starts_with(b"endstream") {
            self.lexer.set_pos(self.lexer.tell() + b"endstream".len());
        }
        self.lexer.skip_whitespace();
        if self.lexer.remaining().starts_with(b"endobj") {
            self.lexer.set_pos(self.lexer.tell() + b"endobj".len());
        }
    }
}

fn endstream_follows(rest: &[u8]) -> bool {
    let trimmed = rest
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c'))
        .map_or(&rest[rest.len()..], |p| &rest[p..]);
    trimmed.starts_with(b"endstream")
}

/// Find the first occurrence of `needle` in `haystack`.
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Find the last occurrence of `needle` in `haystack`.
pub(crate) fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_refs(_: PDFObjRef) -> Result<i64> {
        Err(PdfError::ObjectNotFound(0))
    }

    #[test]
    fn test_parse_ref_and_ints() {
        let mut p = ObjectParser::new(b"[1 0 R 2 3 4]");
        let obj = p.parse_object().unwrap();
        assert_eq!(
            obj,
            PDFObject::Array(vec![
                PDFObject::Ref(PDFObjRef::new(1, 0)),
                PDFObject::Int(2),
                PDFObject::Int(3),
                PDFObject::Int(4),
            ])
        );
    }

    #[test]
    fn test_parse_nested_dict() {
        let mut p = ObjectParser::new(b"<< /Type /Page /MediaBox [0 0 612.5 792] /Sub << /A null /B (x) >> >>");
        let obj = p.parse_object().unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type"), Some(&PDFObject::Name("Page".into())));
        let sub = dict.get("Sub").unwrap().as_dict().unwrap();
        assert!(sub.get("A").is_none());
        assert_eq!(sub.get("B"), Some(&PDFObject::String(b"x".to_vec())));
    }

    #[test]
    fn test_unterminated_dict_is_malformed_token() {
        let mut p = ObjectParser::new(b"<< /A 1 /B [2 3]");
        assert!(matches!(
            p.parse_object(),
            Err(PdfError::MalformedToken { .. })
        ));
    }

    #[test]
    fn test_non_name_key_is_malformed_object() {
        let mut p = ObjectParser::new(b"<< 1 2 >>");
        assert!(matches!(
            p.parse_object(),
            Err(PdfError::MalformedObject { offset: 3, .. })
        ));
    }

    #[test]
    fn test_indirect_stream_with_direct_length() {
        let data = b"7 0 obj\n<< /Length 5 >>\nstream\nhello\nendstream\nendobj\n";
        let mut p = ObjectParser::new(data);
        let (r, obj) = p.parse_indirect(&no_refs).unwrap();
        assert_eq!(r, PDFObjRef::new(7, 0));
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.get_rawdata(), b"hello");
        assert_eq!(stream.objid, Some(7));
    }

    #[test]
    fn test_indirect_stream_with_wrong_length_uses_endstream() {
        let data = b"1 0 obj << /Length 99 >> stream\r\nabc\r\nendstream endobj";
        let mut p = ObjectParser::new(data);
        let (_, obj) = p.parse_indirect(&no_refs).unwrap();
        assert_eq!(obj.as_stream().unwrap().get_rawdata(), b"abc");
    }

    #[test]
    fn test_indirect_stream_with_ref_length() {
        let data = b"3 0 obj << /Length 4 0 R >> stream\nabcd\nendstream endobj";
        let mut p = ObjectParser::new(data);
        let (_, obj) = p
            .parse_indirect(&|r: PDFObjRef| {
                assert_eq!(r.objid, 4);
                Ok(4)
            })
            .unwrap();
        assert_eq!(obj.as_stream().unwrap().get_rawdata(), b"abcd");
    }

    #[test]
    fn test_missing_endstream_is_truncated() {
        let data = b"3 0 obj << >> stream\nabcd";
        let mut p = ObjectParser::new(data);
        assert!(matches!(
            p.parse_indirect(&no_refs),
            Err(PdfError::TruncatedFile(_))
        ));
    }

    #[test]
    fn test_find_helpers() {
        assert_eq!(find_bytes(b"abcabc", b"bc"), Some(1));
        assert_eq!(rfind_bytes(b"abcabc", b"bc"), Some(4));
        assert_eq!(find_bytes(b"ab", b"abc"), None);
    }
}
