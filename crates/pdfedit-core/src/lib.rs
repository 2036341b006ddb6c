//! Exact in-place PDF text editing
//!
//! Replaces text runs inside page content streams with same-length,
//! same-glyph-count byte sequences encoded through the run's own font. The
//! font, layout and every untouched byte of the stream are preserved. Edits
//! that cannot be applied that way are rejected with a typed error so the
//! caller can fall back to overlay placement.
//!
//! Pipeline per page:
//! - `encoding`: resolve each font resource to a decode/encode table
//! - `extract`: tokenize content streams and replay text operators into runs
//! - `matcher`: map each edit onto exactly one run
//! - `patch`: re-encode, check the fidelity gate, and splice bytes
//! - `content`: write patched streams back as new objects

pub mod apply;
pub mod cmap;
pub mod command;
pub mod config;
pub mod content;
pub mod edit;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod literal;
pub mod matcher;
pub mod patch;
pub mod tokenizer;

pub use apply::{
    apply_exact_edits, apply_exact_edits_with_config, apply_exact_edits_with_report,
    list_page_runs, EditReport,
};
pub use command::{process_request, EditMetrics, ProcessResult};
pub use config::{EngineConfig, MatcherConfig};
pub use edit::{parse_edits, ExactTextEdit};
pub use error::PdfEditError;
pub use extract::RunSummary;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfEditError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| PdfEditError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}
