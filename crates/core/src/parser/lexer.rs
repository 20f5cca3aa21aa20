//! PDF tokenizer.
//!
//! Turns raw bytes into primitive tokens: numbers, names, literal and hex
//! strings, delimiters and keywords. Stream bodies are never tokenized; the
//! object parser asks for them as raw bytes via [`Lexer::read_raw`].

use crate::error::{PdfError, Result};

macro_rules! keywords {
    ($($variant:ident => $text:literal,)*) => {
        /// Keywords and content operators. Known ones are unit variants;
        /// anything else keeps its bytes in [`Keyword::Unknown`].
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant,)*
            Unknown(Vec<u8>),
        }

        impl Keyword {
            pub fn from_bytes(bytes: &[u8]) -> Self {
                match bytes {
                    $($text => Self::$variant,)*
                    other => Self::Unknown(other.to_vec()),
                }
            }

            pub fn as_bytes(&self) -> &[u8] {
                match self {
                    $(Self::$variant => $text,)*
                    Self::Unknown(bytes) => bytes.as_slice(),
                }
            }
        }
    };
}

// Case pairs are told apart by doubling the lowercase form: `Q`/`Qq`,
// `Ff` is `f`, `Bb` is `b`.
keywords! {
    ArrayStart => b"[",
    ArrayEnd => b"]",
    DictStart => b"<<",
    DictEnd => b">>",
    BraceOpen => b"{",
    BraceClose => b"}",
    Null => b"null",

    Obj => b"obj",
    EndObj => b"endobj",
    R => b"R",
    Stream => b"stream",
    EndStream => b"endstream",
    Xref => b"xref",
    Trailer => b"trailer",
    StartXref => b"startxref",

    Q => b"Q",
    Qq => b"q",
    Cm => b"cm",
    Ww => b"w",
    J => b"J",
    Jj => b"j",
    M => b"M",
    D => b"d",
    Ri => b"ri",
    I => b"i",
    Gs => b"gs",

    Mm => b"m",
    L => b"l",
    C => b"c",
    V => b"v",
    Y => b"y",
    H => b"h",
    Re => b"re",

    S => b"S",
    Ss => b"s",
    F => b"F",
    Ff => b"f",
    FStar => b"f*",
    B => b"B",
    BStar => b"B*",
    Bb => b"b",
    BbStar => b"b*",
    N => b"n",
    WClip => b"W",
    WStar => b"W*",

    BT => b"BT",
    ET => b"ET",
    Tc => b"Tc",
    Tw => b"Tw",
    Tz => b"Tz",
    TL => b"TL",
    Tf => b"Tf",
    Tr => b"Tr",
    Ts => b"Ts",
    Td => b"Td",
    TD => b"TD",
    Tm => b"Tm",
    TStar => b"T*",
    Tj => b"Tj",
    TJ => b"TJ",
    Quote => b"'",
    DoubleQuote => b"\"",

    CS => b"CS",
    Cs => b"cs",
    SC => b"SC",
    SCN => b"SCN",
    Sc => b"sc",
    Scn => b"scn",
    G => b"G",
    Gg => b"g",
    RG => b"RG",
    Rg => b"rg",
    K => b"K",
    Kk => b"k",

    Do => b"Do",
    BI => b"BI",
    ID => b"ID",
    EI => b"EI",

    MP => b"MP",
    DP => b"DP",
    BMC => b"BMC",
    BDC => b"BDC",
    EMC => b"EMC",
    BX => b"BX",
    EX => b"EX",
    Sh => b"sh",
    D0 => b"d0",
    D1 => b"d1",
}

/// A primitive token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Real(f64),
    Bool(bool),
    /// Stored without the slash, `#xx` escapes decoded
    Name(String),
    /// Literal or hex string, already unescaped
    String(Vec<u8>),
    Keyword(Keyword),
}

/// PDF whitespace: space, tab, CR, LF, NUL and form feed.
#[inline]
pub const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

#[inline]
pub const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

const fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Byte produced by a single-character escape in a literal string.
const fn simple_escape(c: u8) -> u8 {
    match c {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'b' => 0x08,
        b'f' => 0x0c,
        // `\(`, `\)`, `\\` and unknown escapes keep the character.
        other => other,
    }
}

/// Byte-level tokenizer over a borrowed buffer.
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Move to `pos`, clamped to the end of the buffer.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Advance past every byte matching `pred`; returns the skipped slice.
    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        let len = self.data[start..].iter().take_while(|&&b| pred(b)).count();
        self.pos += len;
        &self.data[start..self.pos]
    }

    fn malformed(pos: usize, msg: impl Into<String>) -> PdfError {
        PdfError::MalformedToken {
            pos,
            msg: msg.into(),
        }
    }

    /// Skip whitespace and `%` comments.
    pub fn skip_whitespace(&mut self) {
        loop {
            self.eat_while(is_whitespace);
            if self.peek() != Some(b'%') {
                return;
            }
            self.eat_while(|b| b != b'\r' && b != b'\n');
        }
    }

    /// Consume the end-of-line marker that follows the `stream` keyword.
    pub fn skip_stream_eol(&mut self) {
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
    }

    /// Read `len` raw bytes without tokenizing them.
    ///
    /// Fails with `TruncatedFile` when fewer than `len` bytes remain.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        let Some(end) = self.pos.checked_add(len).filter(|&e| e <= self.data.len()) else {
            return Err(PdfError::TruncatedFile(format!(
                "stream of {len} bytes at offset {} runs past end of data",
                self.pos
            )));
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn lex_name(&mut self) -> Token {
        self.pos += 1;
        let raw = self.eat_while(is_regular);
        let mut name = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            let escaped = match raw.get(i + 1..i + 3) {
                Some(&[h, l]) if raw[i] == b'#' => hex_value(h).zip(hex_value(l)),
                _ => None,
            };
            match escaped {
                Some((h, l)) => {
                    name.push((h << 4) | l);
                    i += 3;
                }
                None => {
                    name.push(raw[i]);
                    i += 1;
                }
            }
        }
        Token::Name(String::from_utf8_lossy(&name).into_owned())
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        self.eat_while(|b| b.is_ascii_digit());
        let is_real = self.peek() == Some(b'.');
        if is_real {
            self.pos += 1;
            self.eat_while(|b| b.is_ascii_digit());
        }

        // Only ASCII digits, sign and dot were consumed.
        let text = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| Self::malformed(start, "invalid number"))?;
        let text = text.strip_prefix('+').unwrap_or(text);

        if !is_real && let Ok(n) = text.parse::<i64>() {
            return Ok(Token::Int(n));
        }
        // "-.5", "4." and integers too large for i64 land here.
        let text = match text {
            "" | "-" | "." | "-." => "0",
            t => t,
        };
        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| Self::malformed(start, format!("invalid number: {text}")))
    }

    fn lex_literal_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1usize;

        loop {
            let Some(c) = self.bump() else {
                return Err(Self::malformed(start, "unterminated literal string"));
            };
            match c {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Token::String(out));
                    }
                }
                b'\\' => {
                    match self.bump() {
                        // Line continuation: backslash-newline produces nothing.
                        Some(b'\r') => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        Some(b'\n') => {}
                        Some(d @ b'0'..=b'7') => {
                            let mut code = u32::from(d - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        self.pos += 1;
                                        code = code * 8 + u32::from(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            out.push((code & 0xff) as u8);
                        }
                        Some(e) => out.push(simple_escape(e)),
                        None => return Err(Self::malformed(start, "unterminated literal string")),
                    }
                    continue;
                }
                _ => {}
            }
            out.push(c);
        }
    }

    fn lex_hex_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            match self.bump() {
                None => return Err(Self::malformed(start, "unterminated hex string")),
                Some(b'>') => break,
                Some(c) if is_whitespace(c) => {}
                Some(c) => {
                    let nibble = hex_value(c).ok_or_else(|| {
                        Self::malformed(self.pos - 1, format!("invalid hex digit {:?}", c as char))
                    })?;
                    match high.take() {
                        Some(h) => out.push((h << 4) | nibble),
                        None => high = Some(nibble),
                    }
                }
            }
        }
        // An odd trailing digit is padded with zero.
        out.extend(high.map(|h| h << 4));
        Ok(Token::String(out))
    }

    fn lex_keyword(&mut self) -> Token {
        let start = self.pos;
        self.eat_while(is_regular);
        // A stray delimiter such as ')' still has to make progress.
        if self.pos == start {
            self.pos += 1;
        }
        match &self.data[start..self.pos] {
            b"true" => Token::Bool(true),
            b"false" => Token::Bool(false),
            bytes => Token::Keyword(Keyword::from_bytes(bytes)),
        }
    }

    fn single(&mut self, len: usize, keyword: Keyword) -> Token {
        self.pos += len;
        Token::Keyword(keyword)
    }

    /// Next token with its starting offset, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Result<(usize, Token)>> {
        self.skip_whitespace();
        let start = self.pos;
        let next = self.peek_at(1);

        let token = match self.peek()? {
            b'/' => Ok(self.lex_name()),
            b'(' => self.lex_literal_string(),
            b'<' if next == Some(b'<') => Ok(self.single(2, Keyword::DictStart)),
            b'<' => self.lex_hex_string(),
            b'>' if next == Some(b'>') => Ok(self.single(2, Keyword::DictEnd)),
            b'>' => Ok(self.single(1, Keyword::Unknown(b">".to_vec()))),
            b'[' => Ok(self.single(1, Keyword::ArrayStart)),
            b']' => Ok(self.single(1, Keyword::ArrayEnd)),
            b'{' => Ok(self.single(1, Keyword::BraceOpen)),
            b'}' => Ok(self.single(1, Keyword::BraceClose)),
            b'+' | b'-' | b'.' if next.is_some_and(|c| c.is_ascii_digit() || c == b'.') => {
                self.lex_number()
            }
            c if c.is_ascii_digit() => self.lex_number(),
            _ => Ok(self.lex_keyword()),
        };
        Some(token.map(|t| (start, t)))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<(usize, Token)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
