//! Apply exact text edits to PDF documents
//!
//! All edits of a call succeed together or none do: they are applied to a
//! working copy of the document that is only serialized once every page has
//! been patched.

use lopdf::{Document, ObjectId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::content::{decode_stream, page_streams, replace_stream};
use crate::edit::{group_by_page, ExactTextEdit};
use crate::encoding::FontSet;
use crate::error::PdfEditError;
use crate::extract::{extract_runs, RunSummary};
use crate::matcher::{MatchFailure, RunMatcher};
use crate::patch::{apply_replacements, stage_replacement, StagedReplacement};

/// What a successful call changed.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct EditReport {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub pages_touched: usize,
    pub edits_applied: usize,
    pub streams_rewritten: usize,
    pub processing_time_ms: u64,
}

/// Replace text runs in place with the default configuration.
pub fn apply_exact_edits(pdf_bytes: &[u8], edits: &[ExactTextEdit]) -> Result<Vec<u8>, PdfEditError> {
    apply_exact_edits_with_config(pdf_bytes, edits, &EngineConfig::default())
}

pub fn apply_exact_edits_with_config(
    pdf_bytes: &[u8],
    edits: &[ExactTextEdit],
    config: &EngineConfig,
) -> Result<Vec<u8>, PdfEditError> {
    apply_exact_edits_with_report(pdf_bytes, edits, config).map(|(output, _)| output)
}

pub fn apply_exact_edits_with_report(
    pdf_bytes: &[u8],
    edits: &[ExactTextEdit],
    config: &EngineConfig,
) -> Result<(Vec<u8>, EditReport), PdfEditError> {
    let started = Instant::now();

    if edits.is_empty() {
        // No changes, return original
        let report = EditReport {
            input_size_bytes: pdf_bytes.len(),
            output_size_bytes: pdf_bytes.len(),
            ..EditReport::default()
        };
        return Ok((pdf_bytes.to_vec(), report));
    }

    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfEditError::ParseError(e.to_string()))?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;

    let mut report = EditReport {
        input_size_bytes: pdf_bytes.len(),
        ..EditReport::default()
    };

    for (page_number, page_edits) in group_by_page(edits) {
        let page_id = *pages
            .get(&page_number)
            .ok_or(PdfEditError::InvalidPage {
                page: page_number,
                page_count,
            })?;

        report.streams_rewritten +=
            edit_page(&mut doc, page_number, page_id, &page_edits, config)?;
        report.edits_applied += page_edits.len();
        report.pages_touched += 1;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| PdfEditError::OperationError(e.to_string()))?;

    report.output_size_bytes = output.len();
    report.processing_time_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        "Applied {} edits on {} pages ({} streams rewritten) in {}ms",
        report.edits_applied,
        report.pages_touched,
        report.streams_rewritten,
        report.processing_time_ms
    );

    Ok((output, report))
}

/// Patch one page. Returns the number of content streams rewritten.
fn edit_page(
    doc: &mut Document,
    page_number: u32,
    page_id: ObjectId,
    edits: &[&ExactTextEdit],
    config: &EngineConfig,
) -> Result<usize, PdfEditError> {
    let fonts = FontSet::for_page(doc, page_id);
    tracing::debug!("Page {}: {} fonts resolved", page_number, fonts.len());

    let entries = page_streams(doc, page_number, page_id)?;
    let buffers = entries
        .iter()
        .map(|entry| decode_stream(&entry.stream))
        .collect::<Result<Vec<_>, _>>()?;
    let runs = extract_runs(&fonts, &buffers[..]);
    tracing::debug!(
        "Page {}: {} runs extracted from {} streams",
        page_number,
        runs.len(),
        buffers.len()
    );

    let mut matcher = RunMatcher::new(&runs, &config.matcher);
    let mut staged: BTreeMap<usize, Vec<StagedReplacement>> = BTreeMap::new();
    for edit in edits {
        let run_index = matcher.claim(edit).map_err(|failure| match failure {
            MatchFailure::NotFound => PdfEditError::RunNotFound {
                page: page_number,
                source_index: edit.source_index,
                original_text: edit.original_text.clone(),
            },
            MatchFailure::FontUnavailable { run_index, font } => {
                PdfEditError::FontEncodingUnavailable {
                    page: page_number,
                    font,
                    run_index,
                }
            }
        })?;

        let replacement =
            stage_replacement(page_number, run_index, &runs[run_index], &edit.replacement_text)?;
        tracing::debug!(
            "Page {}: run {} {:?} -> {:?} staged in stream {} at {}..{}",
            page_number,
            run_index,
            runs[run_index].text,
            edit.replacement_text,
            replacement.stream_index,
            replacement.start,
            replacement.end
        );
        staged
            .entry(replacement.stream_index)
            .or_default()
            .push(replacement);
    }

    let patched: Vec<(usize, Vec<u8>)> = staged
        .into_iter()
        .map(|(stream_index, replacements)| {
            (stream_index, apply_replacements(&buffers[stream_index], replacements))
        })
        .collect();
    tracing::debug!("Page {}: {} streams patched", page_number, patched.len());

    let rewritten = patched.len();
    for (stream_index, content) in patched {
        replace_stream(
            doc,
            page_id,
            &entries[stream_index],
            content,
            config.recompress_streams,
        )?;
    }
    Ok(rewritten)
}

/// Text runs of one page as the engine sees them, for diagnosing how
/// `sourceIndex` values line up with extracted runs.
pub fn list_page_runs(pdf_bytes: &[u8], page_number: u32) -> Result<Vec<RunSummary>, PdfEditError> {
    let doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfEditError::ParseError(e.to_string()))?;
    let pages = doc.get_pages();
    let page_id = *pages.get(&page_number).ok_or(PdfEditError::InvalidPage {
        page: page_number,
        page_count: pages.len() as u32,
    })?;

    let fonts = FontSet::for_page(&doc, page_id);
    let buffers = page_streams(&doc, page_number, page_id)?
        .iter()
        .map(|entry| decode_stream(&entry.stream))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(extract_runs(&fonts, &buffers[..])
        .iter()
        .enumerate()
        .map(|(index, run)| run.summary(index))
        .collect())
}
