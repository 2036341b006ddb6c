//! Run matching
//!
//! Maps an edit request onto exactly one extracted run. The caller's source
//! index is only trusted once the text agrees; otherwise the whole page is
//! searched and candidates are ranked by index distance, position distance
//! and how much normalization the match needed.

use unicode_normalization::UnicodeNormalization;

use crate::config::MatcherConfig;
use crate::edit::ExactTextEdit;
use crate::extract::TextRun;

/// How loosely a run's text had to be compared to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    Exact = 0,
    Normalized = 1,
    Compact = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFailure {
    NotFound,
    /// The text is on the page, but only in runs whose font cannot be
    /// re-encoded
    FontUnavailable { run_index: usize, font: String },
}

fn is_dropped(ch: char) -> bool {
    matches!(
        ch,
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

fn expand_ligature(ch: char) -> Option<&'static str> {
    match ch {
        '\u{FB00}' => Some("ff"),
        '\u{FB01}' => Some("fi"),
        '\u{FB02}' => Some("fl"),
        '\u{FB03}' => Some("ffi"),
        '\u{FB04}' => Some("ffl"),
        '\u{FB05}' => Some("ft"),
        '\u{FB06}' => Some("st"),
        _ => None,
    }
}

/// Comparison form: special spaces unified, invisible characters dropped,
/// ligatures expanded, NFKC, whitespace collapsed and trimmed.
pub fn normalize_text(text: &str) -> String {
    let mut expanded = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_dropped(ch) {
            continue;
        }
        match expand_ligature(ch) {
            Some(letters) => expanded.push_str(letters),
            None if ch == '\u{00A0}' => expanded.push(' '),
            None => expanded.push(ch),
        }
    }

    let mut out = String::with_capacity(expanded.len());
    let mut pending_space = false;
    for ch in expanded.nfkc() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    out
}

/// [`normalize_text`] with every whitespace character removed.
pub fn compact_text(text: &str) -> String {
    normalize_text(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Normalized forms of one string, computed once.
#[derive(Debug, Clone)]
struct Forms {
    exact: String,
    normalized: String,
    compact: String,
}

impl Forms {
    fn new(text: &str) -> Self {
        let normalized = normalize_text(text);
        let compact = normalized.chars().filter(|c| !c.is_whitespace()).collect();
        Self {
            exact: text.to_string(),
            normalized,
            compact,
        }
    }

    fn compare(&self, other: &Forms) -> Option<MatchTier> {
        if self.exact == other.exact {
            Some(MatchTier::Exact)
        } else if !self.normalized.is_empty() && self.normalized == other.normalized {
            Some(MatchTier::Normalized)
        } else if !self.compact.is_empty() && self.compact == other.compact {
            Some(MatchTier::Compact)
        } else {
            None
        }
    }
}

/// Compare a run's text against an edit's original text.
pub fn compare_text(run_text: &str, original: &str) -> Option<MatchTier> {
    Forms::new(run_text).compare(&Forms::new(original))
}

/// Claims runs for edits within one page batch.
pub struct RunMatcher<'r, 'f> {
    runs: &'r [TextRun<'f>],
    forms: Vec<Forms>,
    used: Vec<bool>,
    config: &'r MatcherConfig,
}

impl<'r, 'f> RunMatcher<'r, 'f> {
    pub fn new(runs: &'r [TextRun<'f>], config: &'r MatcherConfig) -> Self {
        Self {
            runs,
            forms: runs.iter().map(|r| Forms::new(&r.text)).collect(),
            used: vec![false; runs.len()],
            config,
        }
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    /// Find and reserve the run an edit targets.
    pub fn claim(&mut self, edit: &ExactTextEdit) -> Result<usize, MatchFailure> {
        let wanted = Forms::new(&edit.original_text);

        let index = self
            .direct(edit.source_index, &wanted)
            .or_else(|| {
                self.config
                    .global_search
                    .then(|| self.search(edit, &wanted))
                    .flatten()
            })
            .ok_or_else(|| self.explain_failure(edit.source_index, &wanted))?;

        self.used[index] = true;
        Ok(index)
    }

    fn available(&self, index: usize) -> bool {
        !self.used[index] && self.runs[index].editable
    }

    fn direct(&self, index: usize, wanted: &Forms) -> Option<usize> {
        if index >= self.runs.len() || !self.available(index) {
            return None;
        }
        self.forms[index].compare(wanted).map(|_| index)
    }

    fn search(&self, edit: &ExactTextEdit, wanted: &Forms) -> Option<usize> {
        let target = edit.position();
        let mut best: Option<(f64, usize)> = None;

        for (index, run) in self.runs.iter().enumerate() {
            if !self.available(index) {
                continue;
            }
            let Some(tier) = self.forms[index].compare(wanted) else {
                continue;
            };

            let index_distance = index.abs_diff(edit.source_index) as f64;
            let position_distance = match (run.position, target) {
                (Some(a), Some(b)) => a.distance(&b),
                _ => 0.0,
            };
            let score = self.config.index_weight * index_distance
                + position_distance
                + self.config.normalization_penalty * tier as u8 as f64;

            if best.map_or(true, |(best_score, _)| score < best_score) {
                best = Some((score, index));
            }
        }

        if let Some((score, index)) = best {
            tracing::debug!(
                "Fallback matched {:?} to run {} (source index {}, score {:.2})",
                edit.original_text,
                index,
                edit.source_index,
                score
            );
        }
        best.map(|(_, index)| index)
    }

    fn explain_failure(&self, source_index: usize, wanted: &Forms) -> MatchFailure {
        let direct = self
            .runs
            .get(source_index)
            .filter(|run| !run.editable && !self.used[source_index])
            .map(|_| source_index);
        let textual = || {
            self.runs.iter().enumerate().position(|(index, run)| {
                !run.editable && !self.used[index] && self.forms[index].compare(wanted).is_some()
            })
        };

        match direct.or_else(textual) {
            Some(run_index) => MatchFailure::FontUnavailable {
                run_index,
                font: self.runs[run_index].font_label(),
            },
            None => MatchFailure::NotFound,
        }
    }
}
