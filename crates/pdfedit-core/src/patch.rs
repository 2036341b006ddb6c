//! Literal re-encoding and content stream splicing

use crate::encoding::EncodeError;
use crate::error::PdfEditError;
use crate::extract::TextRun;
use crate::literal::{encode_hex, encode_literal, LiteralForm};

/// Bytes to write over `start..end` of one content stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedReplacement {
    pub stream_index: usize,
    pub start: usize,
    pub end: usize,
    pub bytes: Vec<u8>,
}

/// Encode `replacement` for `run` and check that it fits the original
/// string exactly: same number of string bytes, same number of glyphs.
pub fn stage_replacement(
    page: u32,
    run_index: usize,
    run: &TextRun<'_>,
    replacement: &str,
) -> Result<StagedReplacement, PdfEditError> {
    let font = run.font.ok_or_else(|| PdfEditError::FontEncodingUnavailable {
        page,
        font: run.font_label(),
        run_index,
    })?;

    let encoded = font.encode(replacement).map_err(|e| match e {
        EncodeError::Unencodable(character) => PdfEditError::UnencodableCharacter {
            page,
            font: font.label(),
            character,
            replacement: replacement.to_string(),
        },
        EncodeError::Unavailable => PdfEditError::FontEncodingUnavailable {
            page,
            font: font.label(),
            run_index,
        },
    })?;

    if encoded.bytes.len() != run.original_bytes.len() {
        return Err(PdfEditError::ByteLengthMismatch {
            page,
            run_index,
            replacement: replacement.to_string(),
            expected: run.original_bytes.len(),
            actual: encoded.bytes.len(),
        });
    }
    if encoded.glyph_count != run.glyph_count {
        return Err(PdfEditError::GlyphCountMismatch {
            page,
            run_index,
            replacement: replacement.to_string(),
            expected: run.glyph_count,
            actual: encoded.glyph_count,
        });
    }

    let bytes = match run.form {
        LiteralForm::Parenthesized => encode_literal(&encoded.bytes),
        LiteralForm::Hex => encode_hex(&encoded.bytes, run.lowercase_hex),
    };

    Ok(StagedReplacement {
        stream_index: run.stream_index,
        start: run.literal_start,
        end: run.literal_end,
        bytes,
    })
}

/// Splice replacements into `buf`. Applied from the highest offset down so
/// earlier spans stay valid.
pub fn apply_replacements(buf: &[u8], mut replacements: Vec<StagedReplacement>) -> Vec<u8> {
    replacements.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = buf.to_vec();
    for replacement in replacements {
        out.splice(replacement.start..replacement.end, replacement.bytes);
    }
    out
}
