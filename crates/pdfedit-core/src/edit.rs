//! Edit requests as produced by the browser-side text extraction pass

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PdfEditError;
use crate::extract::Point;

/// One requested text substitution.
///
/// `source_index` indexes the caller's own text-item list for the page. It is
/// only a hint: the engine always checks the text before trusting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExactTextEdit {
    /// 1-based
    pub page_number: u32,
    pub source_index: usize,
    pub original_text: String,
    #[serde(rename = "text")]
    pub replacement_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// PDF text matrix `[a b c d e f]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<[f64; 6]>,
}

impl ExactTextEdit {
    pub fn new(
        page_number: u32,
        source_index: usize,
        original_text: impl Into<String>,
        replacement_text: impl Into<String>,
    ) -> Self {
        Self {
            page_number,
            source_index,
            original_text: original_text.into(),
            replacement_text: replacement_text.into(),
            x: None,
            y: None,
            transform: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// User-space position of the edited item, if the caller supplied one.
    pub fn position(&self) -> Option<Point> {
        match (self.x, self.y, self.transform) {
            (Some(x), Some(y), _) => Some(Point { x, y }),
            (_, _, Some(t)) => Some(Point { x: t[4], y: t[5] }),
            _ => None,
        }
    }
}

/// Parse the JSON edit list sent alongside the PDF.
pub fn parse_edits(json: &str) -> Result<Vec<ExactTextEdit>, PdfEditError> {
    serde_json::from_str(json).map_err(|e| PdfEditError::SerializationError(e.to_string()))
}

/// Group edits by page, keeping submission order within each page.
pub fn group_by_page(edits: &[ExactTextEdit]) -> BTreeMap<u32, Vec<&ExactTextEdit>> {
    let mut pages: BTreeMap<u32, Vec<&ExactTextEdit>> = BTreeMap::new();
    for edit in edits {
        pages.entry(edit.page_number).or_default().push(edit);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserializes_wire_format() {
        let json = r#"[{"pageNumber":2,"sourceIndex":7,"originalText":"Hello","text":"World",
                        "x":100.5,"y":700,"transform":[12,0,0,12,100.5,700]}]"#;
        let edits = parse_edits(json).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].page_number, 2);
        assert_eq!(edits[0].source_index, 7);
        assert_eq!(edits[0].replacement_text, "World");
        assert_eq!(edits[0].position(), Some(Point { x: 100.5, y: 700.0 }));
    }

    #[test]
    fn test_optional_fields_may_be_missing_or_null() {
        let json = r#"[{"pageNumber":1,"sourceIndex":0,"originalText":"a","text":"b","x":null}]"#;
        let edits = parse_edits(json).unwrap();
        assert_eq!(edits[0].position(), None);
    }

    #[test]
    fn test_transform_supplies_position() {
        let mut edit = ExactTextEdit::new(1, 0, "a", "b");
        edit.transform = Some([1.0, 0.0, 0.0, 1.0, 30.0, 40.0]);
        assert_eq!(edit.position(), Some(Point { x: 30.0, y: 40.0 }));
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = parse_edits("{not json").unwrap_err();
        assert!(matches!(err, PdfEditError::SerializationError(_)));
    }

    #[test]
    fn test_serializes_replacement_as_text() {
        let json = serde_json::to_string(&ExactTextEdit::new(1, 3, "a", "b")).unwrap();
        assert_eq!(
            json,
            r#"{"pageNumber":1,"sourceIndex":3,"originalText":"a","text":"b"}"#
        );
    }

    #[test]
    fn test_group_by_page_keeps_order() {
        let edits = vec![
            ExactTextEdit::new(2, 0, "a", "b"),
            ExactTextEdit::new(1, 0, "c", "d"),
            ExactTextEdit::new(2, 1, "e", "f"),
        ];
        let grouped = group_by_page(&edits);
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(grouped[&2][0].original_text, "a");
        assert_eq!(grouped[&2][1].original_text, "e");
    }
}
