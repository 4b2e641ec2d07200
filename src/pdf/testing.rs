// src/pdf/testing.rs
//! In-memory PDF fixtures for tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// A string drawn at an absolute position with the test font.
pub struct Placed {
    x: i64,
    y: i64,
    bytes: Vec<u8>,
}

impl Placed {
    pub fn new(x: i64, y: i64, text: &str) -> Self {
        Self::raw(x, y, text.as_bytes())
    }

    /// Operand bytes written as-is, to be read through the font's encoding.
    pub fn raw(x: i64, y: i64, bytes: &[u8]) -> Self {
        Self { x, y, bytes: bytes.to_vec() }
    }
}

/// Builds a PDF with one page per entry; each string gets its own text object.
pub fn build_pdf(pages: &[Vec<Placed>]) -> Vec<u8> {
    build_pdf_with_encoding(pages, None)
}

/// Same as [`build_pdf`], with an `/Encoding` set on the font.
pub fn build_pdf_with_encoding(pages: &[Vec<Placed>], encoding: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    };
    if let Some(encoding) = encoding {
        font.set("Encoding", Object::Name(encoding.as_bytes().to_vec()));
    }
    let font_id = doc.add_object(font);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for placed in pages {
        let mut operations = Vec::new();
        for item in placed {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Integer(item.x), Object::Integer(item.y)],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(item.bytes.clone())]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("test content should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_count),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("test PDF should serialize");
    buffer
}
