//! Page content stream plumbing
//!
//! Normalizes a page's `/Contents` into an ordered list of streams, decodes
//! them, and writes patched buffers back as new stream objects.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

use crate::error::PdfEditError;

/// Reference chains longer than this are treated as broken
const MAX_REF_DEPTH: usize = 32;

/// One stream of a page's `/Contents`.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub index: usize,
    /// `None` for a stream written directly into the page dictionary
    pub object_id: Option<ObjectId>,
    pub stream: Stream,
}

/// Follow indirect references until a direct object.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_REF_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

fn resolve_with_id<'a>(
    doc: &'a Document,
    object: &'a Object,
) -> Option<(Option<ObjectId>, &'a Object)> {
    let mut id = None;
    let mut current = object;
    for _ in 0..MAX_REF_DEPTH {
        match current {
            Object::Reference(next) => {
                id = Some(*next);
                current = doc.get_object(*next).ok()?;
            }
            other => return Some((id, other)),
        }
    }
    None
}

/// The page's `/Resources`, inherited from ancestors when absent.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_REF_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources).and_then(|r| r.as_dict().ok());
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve(doc, parent)?.as_dict().ok()?;
    }
    None
}

/// Decoded stream bytes. Unfiltered streams are returned as stored.
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>, PdfEditError> {
    if !stream.dict.has(b"Filter") {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|e| PdfEditError::StreamDecodeError(e.to_string()))
}

/// Normalize `/Contents` into an ordered stream list.
pub fn page_streams(
    doc: &Document,
    page_number: u32,
    page_id: ObjectId,
) -> Result<Vec<StreamEntry>, PdfEditError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfEditError::ParseError(e.to_string()))?;

    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    let unsupported = || PdfEditError::UnsupportedStreamStructure { page: page_number };

    let (id, target) = resolve_with_id(doc, contents).ok_or_else(unsupported)?;
    match target {
        Object::Stream(stream) => Ok(vec![StreamEntry {
            index: 0,
            object_id: id,
            stream: stream.clone(),
        }]),
        Object::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match resolve_with_id(doc, item) {
                Some((object_id, Object::Stream(stream))) => Ok(StreamEntry {
                    index,
                    object_id,
                    stream: stream.clone(),
                }),
                _ => Err(unsupported()),
            })
            .collect(),
        _ => Err(unsupported()),
    }
}

/// Build the replacement stream for a patched buffer.
pub fn build_stream(original: &Stream, content: Vec<u8>, compress: bool) -> Result<Stream, PdfEditError> {
    let mut dict = original.dict.clone();
    dict.remove(b"Filter");
    dict.remove(b"DecodeParms");
    dict.remove(b"Length");

    if !compress {
        return Ok(Stream::new(dict, content));
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&content)
        .map_err(|e| PdfEditError::OperationError(format!("Compression failed: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| PdfEditError::OperationError(format!("Compression failed: {}", e)))?;
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    Ok(Stream::new(dict, compressed))
}

/// Register `content` as a new stream object and point the page at it in
/// place of `entry`. The old stream object, which may be shared with other
/// pages, is left untouched.
pub fn replace_stream(
    doc: &mut Document,
    page_id: ObjectId,
    entry: &StreamEntry,
    content: Vec<u8>,
    compress: bool,
) -> Result<ObjectId, PdfEditError> {
    let stream = build_stream(&entry.stream, content, compress)?;
    let new_id = doc.add_object(stream);

    let contents = doc
        .get_dictionary(page_id)
        .and_then(|page| page.get(b"Contents"))
        .map_err(|e| PdfEditError::OperationError(e.to_string()))?
        .clone();

    let repointed = match resolve(doc, &contents) {
        Some(Object::Array(items)) => {
            let mut items = items.clone();
            let slot = items.get_mut(entry.index).ok_or_else(|| {
                PdfEditError::OperationError(format!(
                    "Content stream {} vanished from page",
                    entry.index
                ))
            })?;
            *slot = Object::Reference(new_id);
            Object::Array(items)
        }
        _ => Object::Reference(new_id),
    };

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfEditError::OperationError(e.to_string()))?;
    page.set("Contents", repointed);

    tracing::debug!(
        "Content stream {} of page {:?} rewritten as object {:?}",
        entry.index,
        page_id,
        new_id
    );
    Ok(new_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn page_with_contents(doc: &mut Document, contents: Object) -> ObjectId {
        doc.add_object(dictionary! {
            "Type" => "Page",
            "Contents" => contents,
        })
    }

    #[test]
    fn test_single_stream_reference() {
        let mut doc = Document::with_version("1.7");
        let stream_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let page_id = page_with_contents(&mut doc, Object::Reference(stream_id));

        let entries = page_streams(&doc, 1, page_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].object_id, Some(stream_id));
        assert_eq!(decode_stream(&entries[0].stream).unwrap(), b"BT ET".to_vec());
    }

    #[test]
    fn test_array_of_streams_keeps_order() {
        let mut doc = Document::with_version("1.7");
        let a = doc.add_object(Stream::new(dictionary! {}, b"q".to_vec()));
        let b = doc.add_object(Stream::new(dictionary! {}, b"Q".to_vec()));
        let page_id = page_with_contents(
            &mut doc,
            Object::Array(vec![Object::Reference(a), Object::Reference(b)]),
        );

        let entries = page_streams(&doc, 1, page_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].index, 1);
        assert_eq!(entries[1].object_id, Some(b));
    }

    #[test]
    fn test_indirect_array_is_followed() {
        let mut doc = Document::with_version("1.7");
        let a = doc.add_object(Stream::new(dictionary! {}, b"q".to_vec()));
        let array_id = doc.add_object(Object::Array(vec![Object::Reference(a)]));
        let page_id = page_with_contents(&mut doc, Object::Reference(array_id));
        assert_eq!(page_streams(&doc, 1, page_id).unwrap().len(), 1);
    }

    #[test]
    fn test_non_stream_contents_is_unsupported() {
        let mut doc = Document::with_version("1.7");
        let page_id = page_with_contents(&mut doc, Object::Integer(5));
        let err = page_streams(&doc, 3, page_id).unwrap_err();
        assert!(matches!(err, PdfEditError::UnsupportedStreamStructure { page: 3 }));

        let mut doc = Document::with_version("1.7");
        let page_id = page_with_contents(&mut doc, Object::Array(vec![Object::Integer(1)]));
        assert!(page_streams(&doc, 1, page_id).is_err());
    }

    #[test]
    fn test_missing_contents_is_empty() {
        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        assert!(page_streams(&doc, 1, page_id).unwrap().is_empty());
    }

    #[test]
    fn test_resources_inherited_from_parent() {
        let mut doc = Document::with_version("1.7");
        let parent_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Resources" => dictionary! { "Font" => dictionary! {} },
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(parent_id),
        });
        assert!(page_resources(&doc, page_id).is_some_and(|r| r.has(b"Font")));
    }

    #[test]
    fn test_compressed_stream_round_trips() {
        let original = Stream::new(dictionary! { "Foo" => 1 }, Vec::new());
        let built = build_stream(&original, b"BT (Hi) Tj ET".to_vec(), true).unwrap();
        assert!(built.dict.has(b"Filter"));
        assert!(built.dict.has(b"Foo"));
        assert_eq!(decode_stream(&built).unwrap(), b"BT (Hi) Tj ET".to_vec());

        let plain = build_stream(&original, b"x".to_vec(), false).unwrap();
        assert!(!plain.dict.has(b"Filter"));
        assert_eq!(plain.content, b"x".to_vec());
    }

    #[test]
    fn test_replace_stream_repoints_array_slot_only() {
        let mut doc = Document::with_version("1.7");
        let a = doc.add_object(Stream::new(dictionary! {}, b"q".to_vec()));
        let b = doc.add_object(Stream::new(dictionary! {}, b"Q".to_vec()));
        let page_id = page_with_contents(
            &mut doc,
            Object::Array(vec![Object::Reference(a), Object::Reference(b)]),
        );

        let entries = page_streams(&doc, 1, page_id).unwrap();
        let new_id = replace_stream(&mut doc, page_id, &entries[1], b"Q Q".to_vec(), false).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents[0].as_reference().unwrap(), a);
        assert_eq!(contents[1].as_reference().unwrap(), new_id);
        // Old object untouched
        let old = doc.get_object(b).unwrap().as_stream().unwrap();
        assert_eq!(old.content, b"Q".to_vec());
    }
}
