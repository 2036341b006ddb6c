#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use pdfedit_core::content::{decode_stream, page_streams};
use std::io::Write;

/// CMap for a Type0 font: two-byte codes 0x0041.. map to "A"..
pub const TYPE0_CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfrange
<0041> <005A> <0041>
endbfrange
2 beginbfchar
<0020> <0020>
<0061> <0061>
endbfchar
endcmap
end end";

/// Mixed one- and two-byte codes, so byte count and glyph count can diverge.
pub const MIXED_WIDTH_CMAP: &[u8] = b"begincmap
2 begincodespacerange
<00> <7F>
<8000> <FFFF>
endcodespacerange
2 beginbfchar
<41> <0041>
<8001> <0042>
endbfchar
endcmap";

/// Builds small in-memory PDFs with lopdf.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    shared_resources: Option<Dictionary>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            shared_resources: None,
        }
    }

    pub fn winansi_font(&mut self) -> ObjectId {
        self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        })
    }

    pub fn type0_font(&mut self, to_unicode: &[u8]) -> ObjectId {
        let cmap_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, to_unicode.to_vec()));
        let descendant_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "NotoSans",
        });
        self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "NotoSans",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant_id)],
            "ToUnicode" => cmap_id,
        })
    }

    /// Identity-H with no ToUnicode: text can be shown but never re-encoded.
    pub fn opaque_font(&mut self) -> ObjectId {
        self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "SubsetFont",
            "Encoding" => "Identity-H",
        })
    }

    pub fn stream(&mut self, content: &[u8]) -> ObjectId {
        self.doc
            .add_object(Stream::new(dictionary! {}, content.to_vec()))
    }

    pub fn flate_stream(&mut self, content: &[u8]) -> ObjectId {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        let compressed = encoder.finish().unwrap();
        self.doc.add_object(Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            compressed,
        ))
    }

    /// Put font resources on the page tree root instead of on each page.
    pub fn shared_fonts(&mut self, fonts: &[(&str, ObjectId)]) {
        self.shared_resources = Some(dictionary! { "Font" => font_dict(fonts) });
    }

    pub fn page(&mut self, fonts: &[(&str, ObjectId)], contents: Object) -> ObjectId {
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => contents,
        };
        if !fonts.is_empty() {
            page.set("Resources", dictionary! { "Font" => font_dict(fonts) });
        }
        let page_id = self.doc.add_object(page);
        self.kids.push(page_id);
        page_id
    }

    pub fn build(mut self) -> Vec<u8> {
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => self.kids.len() as i64,
        };
        if let Some(resources) = self.shared_resources.take() {
            pages.set("Resources", resources);
        }
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        self.doc.save_to(&mut output).unwrap();
        output
    }
}

fn font_dict(fonts: &[(&str, ObjectId)]) -> Dictionary {
    let mut dict = Dictionary::new();
    for (name, id) in fonts {
        dict.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }
    dict
}

/// One-page PDF with a single WinAnsi font `F1` and one content stream.
pub fn simple_pdf(content: &[u8]) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let font = builder.winansi_font();
    let stream = builder.stream(content);
    builder.page(&[("F1", font)], Object::Reference(stream));
    builder.build()
}

/// Decoded content streams of a page, in `/Contents` order.
pub fn page_buffers(pdf: &[u8], page: u32) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&page];
    page_streams(&doc, page, page_id)
        .unwrap()
        .iter()
        .map(|entry| decode_stream(&entry.stream).unwrap())
        .collect()
}

pub fn page_content(pdf: &[u8], page: u32) -> Vec<u8> {
    page_buffers(pdf, page).concat()
}

/// Stream object ids referenced by a page's `/Contents`.
pub fn content_ids(pdf: &[u8], page: u32) -> Vec<ObjectId> {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&page];
    page_streams(&doc, page, page_id)
        .unwrap()
        .iter()
        .map(|entry| entry.object_id.unwrap())
        .collect()
}
