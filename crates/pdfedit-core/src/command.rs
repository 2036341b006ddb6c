use base64::Engine;
use serde::Serialize;

use crate::apply::{apply_exact_edits_with_report, EditReport};
use crate::config::EngineConfig;
use crate::edit::parse_edits;
use crate::error::PdfEditError;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Base64-encoded PDF data
    pub data: Option<String>,
    pub error: Option<String>,
    /// The edit was rejected; the caller should fall back to overlay placement
    pub fallback: bool,
    pub metrics: Option<EditMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub pages_touched: usize,
    pub edits_applied: usize,
    pub processing_time_ms: u64,
}

impl From<EditReport> for EditMetrics {
    fn from(report: EditReport) -> Self {
        Self {
            input_size_bytes: report.input_size_bytes,
            output_size_bytes: report.output_size_bytes,
            pages_touched: report.pages_touched,
            edits_applied: report.edits_applied,
            processing_time_ms: report.processing_time_ms,
        }
    }
}

impl ProcessResult {
    fn failure(error: PdfEditError) -> Self {
        Self {
            success: false,
            data: None,
            fallback: error.is_edit_rejection(),
            error: Some(error.to_string()),
            metrics: None,
        }
    }
}

/// Run a JSON edit request against a PDF. Every failure is reported in the
/// result rather than returned.
pub fn process_request(pdf_bytes: &[u8], edits_json: &str, config: &EngineConfig) -> ProcessResult {
    let outcome = parse_edits(edits_json)
        .and_then(|edits| apply_exact_edits_with_report(pdf_bytes, &edits, config));

    match outcome {
        Ok((output, report)) => ProcessResult {
            success: true,
            data: Some(base64::engine::general_purpose::STANDARD.encode(&output)),
            error: None,
            fallback: false,
            metrics: Some(report.into()),
        },
        Err(e) => {
            tracing::warn!("Edit request failed: {}", e);
            ProcessResult::failure(e)
        }
    }
}
