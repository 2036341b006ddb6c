//! ToUnicode CMap tables
//!
//! Parses `bfchar` / `bfrange` / `codespacerange` sections of a ToUnicode
//! CMap into a forward map (code bytes to Unicode) and a reverse map used to
//! re-encode replacement text.

use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap};

use crate::literal::decode_hex;
use crate::tokenizer::{tokenize, tokenize_range, Token, TokenKind};

/// Source code bytes. ToUnicode codes are 1 to 4 bytes wide.
pub type CodeBytes = SmallVec<[u8; 4]>;

const MAX_CODE_WIDTH: usize = 4;
const MAX_RANGE_SPAN: u32 = 0x1_0000;

/// Decoded text plus the number of codes it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub glyph_count: usize,
}

/// Encoded bytes plus the number of codes written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub bytes: Vec<u8>,
    pub glyph_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ToUnicodeCMap {
    code_to_unicode: HashMap<CodeBytes, String>,
    unicode_to_code: HashMap<String, CodeBytes>,
    code_lengths: BTreeSet<usize>,
    max_unicode_run: usize,
}

#[derive(Clone, Copy)]
enum Section {
    None,
    BfChar,
    BfRange,
    CodeSpace,
}

impl ToUnicodeCMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a decoded ToUnicode stream.
    pub fn parse(data: &[u8]) -> Self {
        let mut cmap = Self::new();
        let mut section = Section::None;
        let mut operands: Vec<Token<'_>> = Vec::new();

        for token in tokenize(data) {
            if token.kind != TokenKind::Operator {
                operands.push(token);
                continue;
            }
            match token.raw {
                b"beginbfchar" => section = Section::BfChar,
                b"beginbfrange" => section = Section::BfRange,
                b"begincodespacerange" => section = Section::CodeSpace,
                b"endbfchar" | b"endbfrange" | b"endcodespacerange" => {
                    match section {
                        Section::BfChar => cmap.read_bfchar(&operands),
                        Section::BfRange => cmap.read_bfrange(data, &operands),
                        Section::CodeSpace => cmap.read_codespace(&operands),
                        Section::None => {}
                    }
                    section = Section::None;
                }
                _ => {}
            }
            operands.clear();
        }

        cmap
    }

    fn read_bfchar(&mut self, operands: &[Token<'_>]) {
        for pair in operands.chunks_exact(2) {
            let (Some(src), Some(dst)) = (hex_bytes(&pair[0]), hex_bytes(&pair[1])) else {
                continue;
            };
            if let Some(code) = to_code(&src) {
                self.insert(code, utf16be_to_string(&dst));
            }
        }
    }

    fn read_bfrange(&mut self, data: &[u8], operands: &[Token<'_>]) {
        for triple in operands.chunks_exact(3) {
            let (Some(lo), Some(hi)) = (hex_bytes(&triple[0]), hex_bytes(&triple[1])) else {
                continue;
            };
            if lo.is_empty() || lo.len() > MAX_CODE_WIDTH || lo.len() != hi.len() {
                continue;
            }
            let width = lo.len();
            let first = code_value(&lo);
            let last = code_value(&hi);
            if last < first || last - first >= MAX_RANGE_SPAN {
                continue;
            }

            match triple[2].kind {
                TokenKind::HexString => {
                    let Some(dst) = hex_bytes(&triple[2]) else {
                        continue;
                    };
                    let base = utf16_units(&dst);
                    if base.is_empty() {
                        continue;
                    }
                    for offset in 0..=(last - first) {
                        let mut units = base.clone();
                        if let Some(tail) = units.last_mut() {
                            *tail = tail.wrapping_add(offset as u16);
                        }
                        let code = code_from_value(first + offset, width);
                        self.insert(code, String::from_utf16_lossy(&units));
                    }
                }
                TokenKind::Array => {
                    let (start, end) = triple[2].inner_span();
                    let entries = tokenize_range(data, start, end);
                    let destinations = entries.iter().filter_map(hex_bytes);
                    for (offset, dst) in (0..=(last - first)).zip(destinations) {
                        let code = code_from_value(first + offset, width);
                        self.insert(code, utf16be_to_string(&dst));
                    }
                }
                _ => {}
            }
        }
    }

    fn read_codespace(&mut self, operands: &[Token<'_>]) {
        for pair in operands.chunks_exact(2) {
            if let Some(lo) = hex_bytes(&pair[0]) {
                if (1..=MAX_CODE_WIDTH).contains(&lo.len()) {
                    self.code_lengths.insert(lo.len());
                }
            }
        }
    }

    /// Record a mapping. The reverse entry keeps the first code seen for a
    /// given Unicode string.
    pub fn insert(&mut self, code: CodeBytes, unicode: String) {
        if unicode.is_empty() || code.is_empty() {
            return;
        }
        self.code_lengths.insert(code.len());
        self.max_unicode_run = self.max_unicode_run.max(unicode.chars().count());
        self.unicode_to_code
            .entry(unicode.clone())
            .or_insert_with(|| code.clone());
        self.code_to_unicode.insert(code, unicode);
    }

    pub fn is_empty(&self) -> bool {
        self.code_to_unicode.is_empty()
    }

    pub fn len(&self) -> usize {
        self.code_to_unicode.len()
    }

    pub fn lookup(&self, code: &[u8]) -> Option<&str> {
        self.code_to_unicode.get(code).map(String::as_str)
    }

    pub fn reverse_lookup(&self, unicode: &str) -> Option<&[u8]> {
        self.unicode_to_code.get(unicode).map(|code| code.as_slice())
    }

    /// Observed code widths, longest first.
    pub fn code_lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.code_lengths.iter().rev().copied()
    }

    pub fn max_unicode_run(&self) -> usize {
        self.max_unicode_run
    }

    /// Maximal-munch decode. Unmapped codes become U+FFFD and consume the
    /// shortest known code width.
    pub fn decode(&self, bytes: &[u8]) -> DecodedText {
        let fallback_width = self.code_lengths.iter().next().copied().unwrap_or(1);
        let mut text = String::new();
        let mut glyph_count = 0;
        let mut i = 0;

        while i < bytes.len() {
            let hit = self.code_lengths().find_map(|width| {
                let code = bytes.get(i..i + width)?;
                self.lookup(code).map(|unicode| (width, unicode))
            });
            match hit {
                Some((width, unicode)) => {
                    text.push_str(unicode);
                    i += width;
                }
                None => {
                    text.push(char::REPLACEMENT_CHARACTER);
                    i += fallback_width;
                }
            }
            glyph_count += 1;
        }

        DecodedText { text, glyph_count }
    }

    /// Maximal-munch encode over the reverse map. Fails with the first
    /// character that no code produces.
    pub fn encode(&self, text: &str) -> Result<EncodedText, char> {
        let chars: Vec<char> = text.chars().collect();
        let mut bytes = Vec::with_capacity(chars.len() * 2);
        let mut glyph_count = 0;
        let mut i = 0;

        while i < chars.len() {
            let longest = self.max_unicode_run.min(chars.len() - i);
            let hit = (1..=longest).rev().find_map(|n| {
                let key: String = chars[i..i + n].iter().collect();
                self.reverse_lookup(&key).map(|code| (n, code))
            });
            let Some((consumed, code)) = hit else {
                return Err(chars[i]);
            };
            bytes.extend_from_slice(code);
            glyph_count += 1;
            i += consumed;
        }

        Ok(EncodedText { bytes, glyph_count })
    }
}

fn hex_bytes(token: &Token<'_>) -> Option<Vec<u8>> {
    if token.kind != TokenKind::HexString {
        return None;
    }
    let (start, end) = token.inner_span();
    let offset = token.start;
    Some(decode_hex(&token.raw[start - offset..end - offset]))
}

fn to_code(bytes: &[u8]) -> Option<CodeBytes> {
    if bytes.is_empty() || bytes.len() > MAX_CODE_WIDTH {
        return None;
    }
    Some(CodeBytes::from_slice(bytes))
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn code_from_value(value: u32, width: usize) -> CodeBytes {
    CodeBytes::from_slice(&value.to_be_bytes()[MAX_CODE_WIDTH - width..])
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() % 2 == 1 {
        let mut padded = Vec::with_capacity(bytes.len() + 1);
        padded.push(0);
        padded.extend_from_slice(bytes);
        return utf16_units(&padded);
    }
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

fn utf16be_to_string(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}
