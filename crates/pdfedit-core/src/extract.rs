//! Text run extraction
//!
//! Replays the text-state operators of a page's content streams and emits one
//! [`TextRun`] per string shown by `Tj`, `TJ`, `'` or `"`. The replay is a
//! fold: a [`Replay`] accumulator consumes tokens one at a time, and its
//! [`TextState`] is carried from one stream to the next.
//!
//! Form XObjects invoked with `Do` are not followed, so their text yields no runs.

use serde::{Deserialize, Serialize};

use crate::cmap::DecodedText;
use crate::encoding::{FontEncoding, FontSet};
use crate::literal::{decode_hex, decode_literal, hex_is_lowercase, LiteralForm};
use crate::tokenizer::{tokenize, tokenize_range, Token, TokenKind};

pub type Matrix = [f64; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// `a × b` for PDF row-vector matrices
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

/// One shown string and where it lives in the stream.
#[derive(Debug, Clone)]
pub struct TextRun<'f> {
    pub text: String,
    pub stream_index: usize,
    /// Interior of the literal, delimiters excluded
    pub literal_start: usize,
    pub literal_end: usize,
    pub form: LiteralForm,
    /// Hex runs written with lowercase digits
    pub lowercase_hex: bool,
    pub editable: bool,
    pub original_bytes: Vec<u8>,
    pub glyph_count: usize,
    pub font_name: Option<String>,
    pub font: Option<&'f FontEncoding>,
    /// Text matrix translation; `None` outside `BT ... ET`
    pub position: Option<Point>,
}

impl TextRun<'_> {
    pub fn font_label(&self) -> String {
        match (self.font, &self.font_name) {
            (Some(font), _) => font.label(),
            (None, Some(name)) => format!("{} (missing)", name),
            (None, None) => "<none>".to_string(),
        }
    }

    pub fn summary(&self, index: usize) -> RunSummary {
        RunSummary {
            index,
            stream_index: self.stream_index,
            text: self.text.clone(),
            font: self.font_name.clone(),
            editable: self.editable,
            glyph_count: self.glyph_count,
            byte_length: self.original_bytes.len(),
            form: self.form,
            x: self.position.map(|p| p.x),
            y: self.position.map(|p| p.y),
        }
    }
}

/// Serializable view of a run for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub index: usize,
    pub stream_index: usize,
    pub text: String,
    pub font: Option<String>,
    pub editable: bool,
    pub glyph_count: usize,
    pub byte_length: usize,
    pub form: LiteralForm,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Text state parameters that `q`/`Q` save and restore.
#[derive(Debug, Clone, Default, PartialEq)]
struct SavedText {
    font: Option<String>,
    font_size: f64,
    leading: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    pub font: Option<String>,
    pub font_size: f64,
    pub text_matrix: Matrix,
    pub line_matrix: Matrix,
    pub leading: f64,
    pub in_text: bool,
    saved: Vec<SavedText>,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            leading: 0.0,
            in_text: false,
            saved: Vec::new(),
        }
    }
}

impl TextState {
    pub fn begin_text(&mut self) {
        self.text_matrix = IDENTITY;
        self.line_matrix = IDENTITY;
        self.in_text = true;
    }

    pub fn end_text(&mut self) {
        self.in_text = false;
    }

    pub fn set_matrix(&mut self, m: Matrix) {
        self.text_matrix = m;
        self.line_matrix = m;
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        self.line_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    pub fn next_line(&mut self) {
        let leading = self.leading;
        self.translate(0.0, -leading);
    }

    pub fn save(&mut self) {
        self.saved.push(SavedText {
            font: self.font.clone(),
            font_size: self.font_size,
            leading: self.leading,
        });
    }

    pub fn restore(&mut self) {
        if let Some(saved) = self.saved.pop() {
            self.font = saved.font;
            self.font_size = saved.font_size;
            self.leading = saved.leading;
        }
    }

    pub fn position(&self) -> Option<Point> {
        self.in_text.then(|| Point {
            x: self.text_matrix[4],
            y: self.text_matrix[5],
        })
    }
}

/// Fold accumulator for one content stream.
pub struct Replay<'a, 'f> {
    fonts: &'f FontSet,
    stream_index: usize,
    buf: &'a [u8],
    state: TextState,
    operands: Vec<Token<'a>>,
    runs: Vec<TextRun<'f>>,
}

impl<'a, 'f> Replay<'a, 'f> {
    pub fn new(
        fonts: &'f FontSet,
        stream_index: usize,
        buf: &'a [u8],
        state: TextState,
        runs: Vec<TextRun<'f>>,
    ) -> Self {
        Self {
            fonts,
            stream_index,
            buf,
            state,
            operands: Vec::new(),
            runs,
        }
    }

    pub fn step(mut self, token: Token<'a>) -> Self {
        if token.kind == TokenKind::Operator {
            self.apply(token.raw);
            self.operands.clear();
        } else {
            self.operands.push(token);
        }
        self
    }

    pub fn finish(self) -> (TextState, Vec<TextRun<'f>>) {
        (self.state, self.runs)
    }

    fn numbers(&self) -> Vec<f64> {
        self.operands.iter().filter_map(Token::as_number).collect()
    }

    /// Trailing `n` numeric operands, if present.
    fn last_numbers<const N: usize>(&self) -> Option<[f64; N]> {
        let numbers = self.numbers();
        let tail = numbers.get(numbers.len().checked_sub(N)?..)?;
        tail.try_into().ok()
    }

    fn last_string(&self) -> Option<Token<'a>> {
        self.operands.iter().rev().find(|t| t.is_string()).copied()
    }

    fn apply(&mut self, op: &[u8]) {
        match op {
            b"BT" => self.state.begin_text(),
            b"ET" => self.state.end_text(),
            b"q" => self.state.save(),
            b"Q" => self.state.restore(),
            b"Tf" => {
                if let Some(name) = self.operands.iter().find_map(Token::as_name) {
                    self.state.font = Some(name.into_owned());
                }
                if let Some([size]) = self.last_numbers::<1>() {
                    self.state.font_size = size;
                }
            }
            b"TL" => {
                if let Some([leading]) = self.last_numbers::<1>() {
                    self.state.leading = leading;
                }
            }
            b"Td" => {
                if let Some([tx, ty]) = self.last_numbers::<2>() {
                    self.state.translate(tx, ty);
                }
            }
            b"TD" => {
                if let Some([tx, ty]) = self.last_numbers::<2>() {
                    self.state.leading = -ty;
                    self.state.translate(tx, ty);
                }
            }
            b"Tm" => {
                if let Some(m) = self.last_numbers::<6>() {
                    self.state.set_matrix(m);
                }
            }
            b"T*" => self.state.next_line(),
            b"Tj" => {
                if let Some(token) = self.last_string() {
                    self.show(token);
                }
            }
            b"TJ" => {
                let Some(array) = self
                    .operands
                    .iter()
                    .rev()
                    .find(|t| t.kind == TokenKind::Array)
                    .copied()
                else {
                    return;
                };
                let (start, end) = array.inner_span();
                for element in tokenize_range(self.buf, start, end) {
                    if element.is_string() {
                        self.show(element);
                    }
                }
            }
            b"'" | b"\"" => {
                self.state.next_line();
                if let Some(token) = self.last_string() {
                    self.show(token);
                }
            }
            _ => {}
        }
    }

    fn show(&mut self, token: Token<'a>) {
        let (start, end) = token.inner_span();
        let inner = &self.buf[start..end];
        let (form, original_bytes) = match token.kind {
            TokenKind::HexString => (LiteralForm::Hex, decode_hex(inner)),
            _ => (LiteralForm::Parenthesized, decode_literal(inner)),
        };

        let fonts: &'f FontSet = self.fonts;
        let font = self.state.font.as_deref().and_then(|name| fonts.get(name));
        let decoded = match font {
            Some(font) => font.decode(&original_bytes),
            None => DecodedText {
                text: original_bytes.iter().map(|&b| char::from(b)).collect(),
                glyph_count: original_bytes.len(),
            },
        };

        self.runs.push(TextRun {
            text: decoded.text,
            stream_index: self.stream_index,
            literal_start: start,
            literal_end: end,
            form,
            lowercase_hex: form == LiteralForm::Hex && hex_is_lowercase(inner),
            editable: font.is_some_and(FontEncoding::is_editable),
            original_bytes,
            glyph_count: decoded.glyph_count,
            font_name: self.state.font.clone(),
            font,
            position: self.state.position(),
        });
    }
}

/// Extract the runs of a page from its decoded content streams, in order.
pub fn extract_runs<'f, B: AsRef<[u8]>>(fonts: &'f FontSet, streams: &[B]) -> Vec<TextRun<'f>> {
    let (_, runs) = streams.iter().enumerate().fold(
        (TextState::default(), Vec::new()),
        |(state, runs), (index, buf)| {
            let buf = buf.as_ref();
            tokenize(buf)
                .into_iter()
                .fold(Replay::new(fonts, index, buf, state, runs), Replay::step)
                .finish()
        },
    );
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{DecodePath, SimpleEncoding};
    use pretty_assertions::assert_eq;

    fn latin_fonts() -> FontSet {
        let mut fonts = FontSet::new();
        fonts.insert(FontEncoding::new(
            "F1",
            DecodePath::Simple(SimpleEncoding::SingleByteLatin1),
        ));
        fonts.insert(FontEncoding::new("F9", DecodePath::Unavailable { code_width: 2 }));
        fonts
    }

    fn texts(runs: &[TextRun<'_>]) -> Vec<String> {
        runs.iter().map(|r| r.text.clone()).collect()
    }

    #[test]
    fn test_tj_run_span_and_position() {
        let fonts = latin_fonts();
        let buf = b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET";
        let runs = extract_runs(&fonts, &[buf]);
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.text, "Hello");
        assert_eq!(&buf[run.literal_start..run.literal_end], b"Hello");
        assert_eq!(run.glyph_count, 5);
        assert!(run.editable);
        assert_eq!(run.position, Some(Point { x: 100.0, y: 700.0 }));
        assert_eq!(run.font_name.as_deref(), Some("F1"));
    }

    #[test]
    fn test_tj_array_emits_each_string() {
        let fonts = latin_fonts();
        let buf = b"BT /F1 10 Tf [(Sub)-15(total)] TJ ET";
        let runs = extract_runs(&fonts, &[buf]);
        assert_eq!(texts(&runs), vec!["Sub", "total"]);
        assert_eq!(&buf[runs[1].literal_start..runs[1].literal_end], b"total");
    }

    #[test]
    fn test_hex_and_escaped_literals() {
        let fonts = latin_fonts();
        let buf = br"BT /F1 10 Tf <48690a> Tj (a\(b) Tj ET";
        let runs = extract_runs(&fonts, &[buf]);
        assert_eq!(runs[0].form, LiteralForm::Hex);
        assert!(runs[0].lowercase_hex);
        assert_eq!(runs[0].original_bytes, b"Hi\n".to_vec());
        assert_eq!(runs[1].original_bytes, b"a(b".to_vec());
        assert_eq!(&buf[runs[1].literal_start..runs[1].literal_end], br"a\(b");
    }

    #[test]
    fn test_line_operators_move_position() {
        let fonts = latin_fonts();
        let buf = b"BT /F1 10 Tf 14 TL 50 600 Td (a) Tj T* (b) Tj (c)' 1 2 (d)\" 0 -20 TD (e) Tj T* (f) Tj ET";
        let runs = extract_runs(&fonts, &[buf]);
        let ys: Vec<f64> = runs.iter().map(|r| r.position.unwrap().y).collect();
        assert_eq!(texts(&runs), vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(ys, vec![600.0, 586.0, 572.0, 558.0, 538.0, 518.0]);
        assert!(runs.iter().all(|r| r.position.unwrap().x == 50.0));
    }

    #[test]
    fn test_tm_sets_absolute_matrix() {
        let fonts = latin_fonts();
        let buf = b"BT /F1 1 Tf 12 0 0 12 72 720 Tm (x) Tj 2 -1 Td (y) Tj ET";
        let runs = extract_runs(&fonts, &[buf]);
        assert_eq!(runs[0].position, Some(Point { x: 72.0, y: 720.0 }));
        // Td is scaled by the line matrix
        assert_eq!(runs[1].position, Some(Point { x: 96.0, y: 708.0 }));
    }

    #[test]
    fn test_bt_resets_matrix() {
        let fonts = latin_fonts();
        let buf = b"BT /F1 1 Tf 10 10 Td (a) Tj ET BT (b) Tj ET";
        let runs = extract_runs(&fonts, &[buf]);
        assert_eq!(runs[1].position, Some(Point { x: 0.0, y: 0.0 }));
        assert_eq!(runs[1].font_name.as_deref(), Some("F1"));
    }

    #[test]
    fn test_q_restores_font() {
        let fonts = latin_fonts();
        let buf = b"BT /F1 10 Tf ET q BT /F9 10 Tf (a) Tj ET Q BT (b) Tj ET";
        let runs = extract_runs(&fonts, &[buf]);
        assert!(!runs[0].editable);
        assert!(runs[1].editable);
    }

    #[test]
    fn test_state_carries_across_streams() {
        let fonts = latin_fonts();
        let first: &[u8] = b"BT /F1 10 Tf 20 30 Td";
        let second: &[u8] = b"(tail) Tj ET";
        let runs = extract_runs(&fonts, &[first, second]);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].stream_index, 1);
        assert!(runs[0].editable);
        assert_eq!(runs[0].position, Some(Point { x: 20.0, y: 30.0 }));
    }

    #[test]
    fn test_unknown_font_is_not_editable() {
        let fonts = latin_fonts();
        let runs = extract_runs(&fonts, &[b"BT /F7 10 Tf (abc) Tj ET"]);
        assert_eq!(runs[0].text, "abc");
        assert!(!runs[0].editable);
        assert_eq!(runs[0].font_label(), "F7 (missing)");
    }

    #[test]
    fn test_text_outside_bt_has_no_position() {
        let fonts = latin_fonts();
        let runs = extract_runs(&fonts, &[b"/F1 10 Tf (x) Tj"]);
        assert_eq!(runs[0].position, None);
    }

    #[test]
    fn test_summary_projection() {
        let fonts = latin_fonts();
        let runs = extract_runs(&fonts, &[b"BT /F1 10 Tf 1 2 Td (ab) Tj ET"]);
        let summary = runs[0].summary(0);
        assert_eq!(summary.byte_length, 2);
        assert_eq!(summary.x, Some(1.0));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["form"], "parenthesized");
        assert_eq!(json["streamIndex"], 0);
    }

    #[test]
    fn test_run_after_inline_image() {
        let fonts = latin_fonts();
        let buf = b"BT /F1 12 Tf (Hello) Tj ET q BI /W 1 /H 1 /CS /G /BPC 8 ID \x28 EI Q BT /F1 12 Tf (World) Tj ET";
        let runs = extract_runs(&fonts, &[buf]);
        assert_eq!(texts(&runs), vec!["Hello", "World"]);
        assert_eq!(&buf[runs[1].literal_start..runs[1].literal_end], b"World");
    }

    #[test]
    fn test_multiply_identity() {
        let m = [2.0, 0.0, 0.0, 2.0, 5.0, 6.0];
        assert_eq!(multiply(&IDENTITY, &m), m);
        assert_eq!(multiply(&m, &IDENTITY), m);
    }
}
