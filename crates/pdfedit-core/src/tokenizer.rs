//! Content stream tokenizer
//!
//! Splits a decoded content stream into a flat list of tokens with exact byte
//! offsets. Offsets always refer to the decoded buffer, never to the filtered
//! bytes stored in the file.
//!
//! Each byte is treated as one character. Content stream syntax is ASCII, and
//! string literals may carry arbitrary binary for CID fonts, which passes
//! through untouched.

use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::borrow::Cow;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)$").unwrap();
    static ref OPERATOR: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9*]*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `( ... )`
    LiteralString,
    /// `< ... >`
    HexString,
    /// `[ ... ]`, kept whole; re-scan the interior with [`tokenize_range`]
    Array,
    Name,
    Number,
    Operator,
    /// Dictionary delimiters, comments, stray closers, anything unclassified
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub raw: &'a [u8],
    pub start: usize,
    pub end: usize,
    /// False when a string or array runs off the end of the buffer
    pub closed: bool,
}

impl<'a> Token<'a> {
    pub fn is_string(&self) -> bool {
        matches!(self.kind, TokenKind::LiteralString | TokenKind::HexString)
    }

    pub fn is_operator(&self, op: &[u8]) -> bool {
        self.kind == TokenKind::Operator && self.raw == op
    }

    pub fn as_number(&self) -> Option<f64> {
        if self.kind != TokenKind::Number {
            return None;
        }
        std::str::from_utf8(self.raw).ok()?.parse().ok()
    }

    /// Name without the leading slash
    pub fn as_name(&self) -> Option<Cow<'a, str>> {
        if self.kind != TokenKind::Name {
            return None;
        }
        Some(String::from_utf8_lossy(&self.raw[1..]))
    }

    /// Byte span between the delimiters of a string or array token.
    pub fn inner_span(&self) -> (usize, usize) {
        match self.kind {
            TokenKind::LiteralString | TokenKind::HexString | TokenKind::Array => {
                let end = if self.closed { self.end - 1 } else { self.end };
                (self.start + 1, end.max(self.start + 1))
            }
            _ => (self.start, self.end),
        }
    }
}

/// Tokenize a whole decoded content stream.
pub fn tokenize(buf: &[u8]) -> Vec<Token<'_>> {
    tokenize_range(buf, 0, buf.len())
}

/// Tokenize `buf[start..end]`, reporting offsets relative to `buf`.
pub fn tokenize_range(buf: &[u8], start: usize, end: usize) -> Vec<Token<'_>> {
    let end = end.min(buf.len());
    let mut tokens = Vec::new();
    let mut pos = start;

    while pos < end {
        let byte = buf[pos];
        if is_whitespace(byte) {
            pos += 1;
            continue;
        }

        let (kind, token_end, closed) = match byte {
            b'(' => {
                let (stop, closed) = scan_literal(buf, pos, end);
                (TokenKind::LiteralString, stop, closed)
            }
            b'<' if buf.get(pos + 1) == Some(&b'<') && pos + 1 < end => {
                (TokenKind::Other, pos + 2, true)
            }
            b'<' => {
                let (stop, closed) = scan_hex(buf, pos, end);
                (TokenKind::HexString, stop, closed)
            }
            b'>' if buf.get(pos + 1) == Some(&b'>') && pos + 1 < end => {
                (TokenKind::Other, pos + 2, true)
            }
            b'[' => {
                let (stop, closed) = scan_array(buf, pos, end);
                (TokenKind::Array, stop, closed)
            }
            b')' | b']' | b'>' | b'{' | b'}' => (TokenKind::Other, pos + 1, true),
            b'%' => (TokenKind::Other, scan_comment(buf, pos, end), true),
            _ => {
                let stop = scan_bare(buf, pos, end);
                (classify_bare(&buf[pos..stop]), stop, true)
            }
        };

        let starts_image_data = kind == TokenKind::Operator && &buf[pos..token_end] == b"ID";
        tokens.push(Token {
            kind,
            raw: &buf[pos..token_end],
            start: pos,
            end: token_end,
            closed,
        });
        pos = token_end;

        // Inline image data is binary and runs up to the next standalone `EI`.
        if starts_image_data {
            let (data_start, data_end, closed) = scan_inline_image(buf, token_end, end);
            if data_end > data_start {
                tokens.push(Token {
                    kind: TokenKind::Other,
                    raw: &buf[data_start..data_end],
                    start: data_start,
                    end: data_end,
                    closed,
                });
            }
            pos = data_end;
        }
    }

    tokens
}

pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'[' | b']' | b'<' | b'>' | b'/' | b'{' | b'}' | b'%'
    )
}

fn classify_bare(raw: &[u8]) -> TokenKind {
    if raw.first() == Some(&b'/') {
        TokenKind::Name
    } else if NUMBER.is_match(raw) {
        TokenKind::Number
    } else if raw == b"'" || raw == b"\"" || OPERATOR.is_match(raw) {
        TokenKind::Operator
    } else {
        TokenKind::Other
    }
}

/// `pos` points at `(`. Returns the offset after the closing paren.
fn scan_literal(buf: &[u8], pos: usize, end: usize) -> (usize, bool) {
    let mut depth = 0usize;
    let mut i = pos;
    while i < end {
        match buf[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return (i + 1, true);
                }
            }
            _ => {}
        }
        i += 1;
    }
    (end, false)
}

fn scan_hex(buf: &[u8], pos: usize, end: usize) -> (usize, bool) {
    match buf[pos + 1..end].iter().position(|&b| b == b'>') {
        Some(offset) => (pos + 1 + offset + 1, true),
        None => (end, false),
    }
}

fn scan_array(buf: &[u8], pos: usize, end: usize) -> (usize, bool) {
    let mut depth = 0usize;
    let mut i = pos;
    while i < end {
        match buf[i] {
            b'(' => {
                let (stop, _) = scan_literal(buf, i, end);
                i = stop;
                continue;
            }
            b'<' if buf.get(i + 1) == Some(&b'<') => i += 1,
            b'<' => {
                let (stop, _) = scan_hex(buf, i, end);
                i = stop;
                continue;
            }
            b'%' => {
                i = scan_comment(buf, i, end);
                continue;
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return (i + 1, true);
                }
            }
            _ => {}
        }
        i += 1;
    }
    (end, false)
}

fn scan_comment(buf: &[u8], pos: usize, end: usize) -> usize {
    buf[pos..end]
        .iter()
        .position(|&b| b == b'\n' || b == b'\r')
        .map_or(end, |offset| pos + offset)
}

/// `pos` is the offset just after an `ID` operator. Returns the span of the
/// image data and whether a closing `EI` was found.
fn scan_inline_image(buf: &[u8], pos: usize, end: usize) -> (usize, usize, bool) {
    let data_start = if pos < end && is_whitespace(buf[pos]) {
        pos + 1
    } else {
        pos
    };
    let mut i = pos + 1;
    while i + 1 < end {
        let standalone = is_whitespace(buf[i - 1])
            && buf[i] == b'E'
            && buf[i + 1] == b'I'
            && (i + 2 >= end || is_whitespace(buf[i + 2]) || is_delimiter(buf[i + 2]));
        if standalone {
            return (data_start, i - 1, true);
        }
        i += 1;
    }
    (data_start, end, false)
}

fn scan_bare(buf: &[u8], pos: usize, end: usize) -> usize {
    let mut i = pos + 1;
    while i < end && !is_whitespace(buf[i]) && !is_delimiter(buf[i]) {
        i += 1;
    }
    i
}
