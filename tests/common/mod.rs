//! PDF fixtures generated in memory with lopdf
#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{
    dictionary, Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId,
    Permissions, Stream,
};

pub const LETTER: [i64; 4] = [0, 0, 612, 792];

fn rect(values: [i64; 4]) -> Object {
    Object::Array(values.iter().map(|&v| v.into()).collect())
}

fn assemble(doc: &mut Document, pages_id: ObjectId, kids: Vec<ObjectId>) {
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("Failed to save fixture");
    out
}

fn finish(mut doc: Document, pages_id: ObjectId, kids: Vec<ObjectId>) -> Vec<u8> {
    assemble(&mut doc, pages_id, kids);
    save(doc)
}

fn text_operations(line: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 24.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
        Operation::new("Tj", vec![Object::string_literal(line)]),
        Operation::new("ET", vec![]),
    ]
}

fn add_text_page(
    doc: &mut Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    line: &str,
    extra: Dictionary,
) -> ObjectId {
    let content = Content {
        operations: text_operations(line),
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("Failed to encode fixture content"),
    ));
    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => rect(LETTER),
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    };
    for (key, value) in extra.iter() {
        page.set(key.clone(), value.clone());
    }
    doc.add_object(page)
}

fn helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    })
}

fn text_document(pages: usize) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);
    let kids = (0..pages)
        .map(|i| {
            let line = format!("Page {}", i + 1);
            add_text_page(&mut doc, pages_id, font_id, &line, dictionary! {})
        })
        .collect();
    assemble(&mut doc, pages_id, kids);
    doc
}

/// A digital document: `pages` letter-size pages, each with one line of text
pub fn text_pdf(pages: usize) -> Vec<u8> {
    save(text_document(pages))
}

/// `text_pdf` encrypted with RC4-128. An empty `user_password` gives a
/// document that opens without a password but carries an owner password.
pub fn encrypted_text_pdf(pages: usize, user_password: &str) -> Vec<u8> {
    let mut doc = text_document(pages);
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::string_literal(b"eyesaver-fixture".to_vec()),
            Object::string_literal(b"eyesaver-fixture".to_vec()),
        ]),
    );
    let version = EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).expect("Failed to set up encryption");
    doc.encrypt(&state).expect("Failed to encrypt fixture");
    save(doc)
}

/// A scanned-style page: a full-page white RGB image and nothing else
pub fn scanned_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let (width, height) = (8i64, 8i64);
    let pixels = vec![0xFFu8; (width * height * 3) as usize];
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        pixels,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![612.into(), 0.into(), 0.into(), 792.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("Failed to encode fixture content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => rect(LETTER),
        "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
    });
    finish(doc, pages_id, vec![page_id])
}

/// Two text pages; the first is cropped and rotated, the second is landscape
pub fn mixed_boxes_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);

    let cropped = add_text_page(
        &mut doc,
        pages_id,
        font_id,
        "Cropped",
        dictionary! {
            "CropBox" => rect([36, 36, 576, 756]),
            "Rotate" => 90,
        },
    );
    let landscape = add_text_page(
        &mut doc,
        pages_id,
        font_id,
        "Landscape",
        dictionary! { "MediaBox" => rect([0, 0, 842, 595]) },
    );
    finish(doc, pages_id, vec![cropped, landscape])
}

/// Decoded operations of a page's combined content streams
pub fn page_operations(data: &[u8], page: u32) -> Vec<Operation> {
    let doc = Document::load_mem(data).expect("Failed to load output");
    let page_id = *doc.get_pages().get(&page).expect("Missing page");
    let content = doc
        .get_page_content(page_id)
        .expect("Failed to read page content");
    Content::decode(&content)
        .expect("Failed to decode page content")
        .operations
}

/// Operators only, for easy comparison
pub fn operators(operations: &[Operation]) -> Vec<String> {
    operations.iter().map(|op| op.operator.clone()).collect()
}

/// A page attribute as stored on the page dictionary itself
pub fn page_attribute(data: &[u8], page: u32, key: &[u8]) -> Option<Object> {
    let doc = Document::load_mem(data).expect("Failed to load output");
    let page_id = *doc.get_pages().get(&page).expect("Missing page");
    doc.get_object(page_id)
        .and_then(Object::as_dict)
        .ok()?
        .get(key)
        .ok()
        .cloned()
}
