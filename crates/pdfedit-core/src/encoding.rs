//! Font encoding resolution
//!
//! Builds, per font resource on a page, the table used to decode text runs
//! and re-encode replacement text. The ToUnicode CMap is preferred. Without
//! one, only a few simple encodings are trusted.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

use crate::cmap::{DecodedText, EncodedText, ToUnicodeCMap};
use crate::content::{decode_stream, page_resources, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleEncoding {
    /// Byte value equals code point. Only right for Latin text.
    SingleByteLatin1,
    /// Two-byte codes that are UTF-16BE units (UCS-2 predefined CMaps).
    DoubleByteBe,
}

#[derive(Debug, Clone)]
pub enum DecodePath {
    ToUnicode(ToUnicodeCMap),
    Simple(SimpleEncoding),
    /// No trustworthy mapping. Runs are extracted but never rewritten.
    Unavailable { code_width: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    Unencodable(char),
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct FontEncoding {
    pub resource_name: String,
    pub base_font: Option<String>,
    pub path: DecodePath,
}

impl FontEncoding {
    pub fn new(resource_name: impl Into<String>, path: DecodePath) -> Self {
        Self {
            resource_name: resource_name.into(),
            base_font: None,
            path,
        }
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self.path, DecodePath::Unavailable { .. })
    }

    /// Display name for error messages
    pub fn label(&self) -> String {
        match &self.base_font {
            Some(base) => format!("{} ({})", self.resource_name, base),
            None => self.resource_name.clone(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> DecodedText {
        match &self.path {
            DecodePath::ToUnicode(cmap) => cmap.decode(bytes),
            DecodePath::Simple(SimpleEncoding::SingleByteLatin1) => decode_latin1(bytes),
            DecodePath::Simple(SimpleEncoding::DoubleByteBe) => decode_ucs2(bytes),
            DecodePath::Unavailable { code_width: 1 } => decode_latin1(bytes),
            DecodePath::Unavailable { code_width } => {
                let glyph_count = bytes.len().div_ceil((*code_width).max(1));
                DecodedText {
                    text: std::iter::repeat(char::REPLACEMENT_CHARACTER)
                        .take(glyph_count)
                        .collect(),
                    glyph_count,
                }
            }
        }
    }

    pub fn encode(&self, text: &str) -> Result<EncodedText, EncodeError> {
        match &self.path {
            DecodePath::ToUnicode(cmap) => cmap.encode(text).map_err(EncodeError::Unencodable),
            DecodePath::Simple(SimpleEncoding::SingleByteLatin1) => {
                let bytes = text
                    .chars()
                    .map(|ch| u8::try_from(u32::from(ch)).map_err(|_| EncodeError::Unencodable(ch)))
                    .collect::<Result<Vec<u8>, _>>()?;
                let glyph_count = bytes.len();
                Ok(EncodedText { bytes, glyph_count })
            }
            DecodePath::Simple(SimpleEncoding::DoubleByteBe) => {
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for ch in text.chars() {
                    // Outside the BMP would need a surrogate pair
                    let unit = u16::try_from(u32::from(ch))
                        .map_err(|_| EncodeError::Unencodable(ch))?;
                    bytes.extend_from_slice(&unit.to_be_bytes());
                }
                let glyph_count = bytes.len() / 2;
                Ok(EncodedText { bytes, glyph_count })
            }
            DecodePath::Unavailable { .. } => Err(EncodeError::Unavailable),
        }
    }
}

fn decode_latin1(bytes: &[u8]) -> DecodedText {
    DecodedText {
        text: bytes.iter().map(|&b| char::from(b)).collect(),
        glyph_count: bytes.len(),
    }
}

fn decode_ucs2(bytes: &[u8]) -> DecodedText {
    let text = bytes
        .chunks(2)
        .map(|unit| {
            let value = match unit {
                [hi, lo] => u16::from_be_bytes([*hi, *lo]),
                [single] => u16::from(*single),
                _ => 0,
            };
            char::from_u32(u32::from(value)).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect();
    DecodedText {
        text,
        glyph_count: bytes.len().div_ceil(2),
    }
}

/// All fonts of one page, keyed by resource name (without the slash).
#[derive(Debug, Clone, Default)]
pub struct FontSet {
    fonts: HashMap<String, FontEncoding>,
}

impl FontSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, encoding: FontEncoding) {
        self.fonts.insert(encoding.resource_name.clone(), encoding);
    }

    pub fn get(&self, name: &str) -> Option<&FontEncoding> {
        self.fonts.get(name)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Resolve every font in the page's `/Resources/Font` dictionary.
    pub fn for_page(doc: &Document, page_id: ObjectId) -> Self {
        let mut set = Self::new();
        let Some(font_dict) = page_resources(doc, page_id)
            .and_then(|resources| resources.get(b"Font").ok())
            .and_then(|fonts| resolve(doc, fonts))
            .and_then(|fonts| fonts.as_dict().ok())
        else {
            tracing::debug!("Page {:?} has no font resources", page_id);
            return set;
        };

        for (name, font) in font_dict.iter() {
            let name = String::from_utf8_lossy(name).into_owned();
            let Some(font) = resolve(doc, font).and_then(|f| f.as_dict().ok()) else {
                tracing::warn!("Font resource /{} is not a dictionary", name);
                continue;
            };
            set.insert(resolve_font(doc, &name, font));
        }

        set
    }
}

/// Build the encoding for one font dictionary.
pub fn resolve_font(doc: &Document, name: &str, font: &Dictionary) -> FontEncoding {
    let base_font = font
        .get(b"BaseFont")
        .ok()
        .and_then(|b| b.as_name().ok())
        .map(|b| String::from_utf8_lossy(b).into_owned());

    let path = match find_to_unicode(doc, font) {
        Some(cmap) => DecodePath::ToUnicode(cmap),
        None => simple_path(doc, font),
    };

    if !matches!(path, DecodePath::ToUnicode(_)) {
        tracing::debug!("Font /{} resolved without ToUnicode: {:?}", name, path);
    }

    FontEncoding {
        resource_name: name.to_string(),
        base_font,
        path,
    }
}

fn find_to_unicode(doc: &Document, font: &Dictionary) -> Option<ToUnicodeCMap> {
    if let Some(cmap) = to_unicode_of(doc, font) {
        return Some(cmap);
    }
    let descendant = font
        .get(b"DescendantFonts")
        .ok()
        .and_then(|d| resolve(doc, d))
        .and_then(|d| d.as_array().ok())
        .and_then(|d| d.first())
        .and_then(|d| resolve(doc, d))
        .and_then(|d| d.as_dict().ok())?;
    to_unicode_of(doc, descendant)
}

fn to_unicode_of(doc: &Document, font: &Dictionary) -> Option<ToUnicodeCMap> {
    let stream = font
        .get(b"ToUnicode")
        .ok()
        .and_then(|t| resolve(doc, t))
        .and_then(|t| t.as_stream().ok())?;
    let data = match decode_stream(stream) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("Ignoring undecodable ToUnicode stream: {}", e);
            return None;
        }
    };
    let cmap = ToUnicodeCMap::parse(&data);
    if cmap.is_empty() {
        tracing::warn!("Ignoring ToUnicode stream with no mappings");
        return None;
    }
    Some(cmap)
}

fn simple_path(doc: &Document, font: &Dictionary) -> DecodePath {
    let composite = font
        .get(b"Subtype")
        .ok()
        .and_then(|s| s.as_name().ok())
        .is_some_and(|s| s == b"Type0");
    let unavailable = DecodePath::Unavailable {
        code_width: if composite { 2 } else { 1 },
    };

    let Some(encoding) = font.get(b"Encoding").ok().and_then(|e| resolve(doc, e)) else {
        return unavailable;
    };

    match encoding {
        Object::Name(name) => match name.as_slice() {
            b"WinAnsiEncoding" | b"MacRomanEncoding" | b"StandardEncoding" if !composite => {
                DecodePath::Simple(SimpleEncoding::SingleByteLatin1)
            }
            b"Identity-H" | b"Identity-V" => DecodePath::Unavailable { code_width: 2 },
            other if composite && is_ucs2_cmap(other) => {
                DecodePath::Simple(SimpleEncoding::DoubleByteBe)
            }
            _ => unavailable,
        },
        Object::Dictionary(dict) if !composite => {
            let base_ok = dict
                .get(b"BaseEncoding")
                .ok()
                .and_then(|b| b.as_name().ok())
                .is_some_and(|b| {
                    matches!(b, b"WinAnsiEncoding" | b"MacRomanEncoding" | b"StandardEncoding")
                });
            if base_ok && !dict.has(b"Differences") {
                DecodePath::Simple(SimpleEncoding::SingleByteLatin1)
            } else {
                unavailable
            }
        }
        _ => unavailable,
    }
}

/// Predefined CMaps whose codes are UTF-16 code units, e.g. `UniGB-UCS2-H`.
fn is_ucs2_cmap(name: &[u8]) -> bool {
    let name = String::from_utf8_lossy(name);
    name.starts_with("Uni")
        && (name.contains("UCS2") || name.contains("UTF16"))
        && (name.ends_with("-H") || name.ends_with("-V"))
}
