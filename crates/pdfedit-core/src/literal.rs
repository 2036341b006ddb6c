//! String literal codecs
//!
//! Converts between the bytes written inside `( ... )` or `< ... >` in a
//! content stream and the string bytes they denote.

use serde::Serialize;

use crate::tokenizer::is_whitespace;

/// Which delimiters a string literal was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralForm {
    Parenthesized,
    Hex,
}

/// Unescape the interior of a parenthesized literal.
pub fn decode_literal(inner: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        match inner[i] {
            b'\\' => {
                i += 1;
                let Some(&next) = inner.get(i) else {
                    break;
                };
                match next {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'0'..=b'7' => {
                        let mut value: u32 = 0;
                        let mut digits = 0;
                        while digits < 3 {
                            match inner.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    i += 1;
                                    digits += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push((value & 0xff) as u8);
                        continue;
                    }
                    // Line continuation
                    b'\r' => {
                        if inner.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    b'\n' => {}
                    other => out.push(other),
                }
                i += 1;
            }
            b'\r' => {
                out.push(b'\n');
                if inner.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    out
}

/// Escape string bytes for writing between parens.
pub fn encode_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 4);
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out
}

/// Decode the interior of a hex string. Whitespace is skipped and an odd
/// trailing digit is padded with zero.
pub fn decode_hex(inner: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(inner.len() / 2);
    let mut high: Option<u8> = None;
    for &byte in inner {
        if is_whitespace(byte) {
            continue;
        }
        let Some(nibble) = hex_value(byte) else {
            continue;
        };
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    out
}

pub fn encode_hex(bytes: &[u8], lowercase: bool) -> Vec<u8> {
    const UPPER: &[u8; 16] = b"0123456789ABCDEF";
    const LOWER: &[u8; 16] = b"0123456789abcdef";
    let digits = if lowercase { LOWER } else { UPPER };
    let mut out = Vec::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(digits[usize::from(byte >> 4)]);
        out.push(digits[usize::from(byte & 0x0f)]);
    }
    out
}

/// True when the hex interior uses lowercase digits.
pub fn hex_is_lowercase(inner: &[u8]) -> bool {
    inner.iter().any(|b| matches!(b, b'a'..=b'f'))
        && !inner.iter().any(|b| matches!(b, b'A'..=b'F'))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
