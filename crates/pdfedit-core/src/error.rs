use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfEditError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Page {page} does not exist (document has {page_count} pages)")]
    InvalidPage { page: u32, page_count: u32 },

    #[error("Page {page}: /Contents is neither a stream nor an array of streams")]
    UnsupportedStreamStructure { page: u32 },

    #[error("Page {page}: font {font} of run {run_index} has no usable encoding")]
    FontEncodingUnavailable {
        page: u32,
        font: String,
        run_index: usize,
    },

    #[error("Page {page}: no text run matches {original_text:?} (source index {source_index})")]
    RunNotFound {
        page: u32,
        source_index: usize,
        original_text: String,
    },

    #[error("Page {page}: {replacement:?} encodes to {actual} glyphs, run {run_index} has {expected}")]
    GlyphCountMismatch {
        page: u32,
        run_index: usize,
        replacement: String,
        expected: usize,
        actual: usize,
    },

    #[error("Page {page}: {replacement:?} encodes to {actual} bytes, run {run_index} has {expected}")]
    ByteLengthMismatch {
        page: u32,
        run_index: usize,
        replacement: String,
        expected: usize,
        actual: usize,
    },

    #[error("Page {page}: font {font} cannot encode {character:?} in {replacement:?}")]
    UnencodableCharacter {
        page: u32,
        font: String,
        character: char,
        replacement: String,
    },

    #[error("Failed to decode content stream: {0}")]
    StreamDecodeError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PdfEditError {
    /// True for failures caused by a specific edit rather than by the
    /// document itself. The caller may retry these with overlay placement.
    pub fn is_edit_rejection(&self) -> bool {
        matches!(
            self,
            PdfEditError::FontEncodingUnavailable { .. }
                | PdfEditError::RunNotFound { .. }
                | PdfEditError::GlyphCountMismatch { .. }
                | PdfEditError::ByteLengthMismatch { .. }
                | PdfEditError::UnencodableCharacter { .. }
                | PdfEditError::UnsupportedStreamStructure { .. }
        )
    }
}
