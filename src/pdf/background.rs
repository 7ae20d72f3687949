//! Page background recoloring
//!
//! The transform never rewrites existing content streams. It adds a new
//! stream holding a filled rectangle to each page's `/Contents` array:
//!
//! - standard mode prepends an opaque rectangle, so every original drawing
//!   operation paints over it;
//! - overlay mode wraps the original streams in `q`/`Q` and appends a
//!   translucent rectangle whose alpha comes from an `/ExtGState` entry in
//!   the page's own resources.
//!
//! The rectangle covers the page's visible area: the CropBox (clipped to the
//! MediaBox) if present, otherwise the MediaBox. Both are inheritable.

use crate::error::{Error, Result};
use crate::pdf::color::{BackgroundMode, BackgroundOptions, Rgb};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument};

/// Prefix for the graphics state resource added in overlay mode
const OVERLAY_STATE_PREFIX: &str = "EyeSaverGS";

/// Guard against cyclic `/Parent` chains in broken page trees
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// How far into the file the `%PDF` marker may appear
const HEADER_SEARCH_LIMIT: usize = 1024;

/// Axis-aligned page rectangle in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBounds {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl PageBounds {
    fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            left: x0.min(x1),
            bottom: y0.min(y1),
            right: x0.max(x1),
            top: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    fn intersect(&self, other: &PageBounds) -> PageBounds {
        PageBounds {
            left: self.left.max(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.min(other.right),
            top: self.top.min(other.top),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageSelection {
    All,
    First,
}

/// Recolor the background of every page.
///
/// All-or-nothing: if any page cannot be processed, no output is produced.
pub fn recolor_background(data: &[u8], options: &BackgroundOptions) -> Result<Vec<u8>> {
    recolor(data, options, PageSelection::All)
}

/// Recolor only the first page, leaving the rest of the document untouched.
/// Used for previews.
pub fn recolor_first_page(data: &[u8], options: &BackgroundOptions) -> Result<Vec<u8>> {
    recolor(data, options, PageSelection::First)
}

/// Number of pages in a PDF
pub fn page_count(data: &[u8]) -> Result<u32> {
    Ok(load_document(data)?.get_pages().len() as u32)
}

/// Visible bounds of every page, in page order
pub fn page_bounds(data: &[u8]) -> Result<Vec<PageBounds>> {
    let document = load_document(data)?;
    document
        .get_pages()
        .iter()
        .map(|(&number, &page_id)| visible_bounds(&document, page_id, number))
        .collect()
}

#[instrument(skip_all, fields(bytes_len = data.len(), mode = %options.mode, color = %options.color))]
fn recolor(data: &[u8], options: &BackgroundOptions, selection: PageSelection) -> Result<Vec<u8>> {
    options.validate()?;

    let mut document = load_document(data)?;
    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(Error::MalformedInput {
            reason: "PDF has no pages".to_string(),
        });
    }

    let limit = match selection {
        PageSelection::All => pages.len(),
        PageSelection::First => 1,
    };

    for (&number, &page_id) in pages.iter().take(limit) {
        recolor_page(&mut document, page_id, number, options)?;
    }

    debug!(pages = limit, total = pages.len(), "Background applied");

    let mut output = Vec::new();
    document.save_to(&mut output).map_err(|e| Error::PdfWrite {
        reason: e.to_string(),
    })?;

    Ok(output)
}

/// Parse PDF bytes.
///
/// Documents that open with the empty user password (owner-password-only
/// protection) come back decrypted and are written out unencrypted. Anything
/// that needs a real password is rejected.
fn load_document(data: &[u8]) -> Result<Document> {
    let head = &data[..data.len().min(HEADER_SEARCH_LIMIT)];
    if !head.windows(4).any(|window| window == b"%PDF") {
        return Err(Error::MalformedInput {
            reason: "Not a valid PDF file".to_string(),
        });
    }

    let mut document = Document::load_mem(data).map_err(|e| Error::MalformedInput {
        reason: format!("Failed to parse PDF: {}", e),
    })?;

    if document.is_encrypted() {
        if document.encryption_state.is_none() {
            return Err(Error::Encrypted);
        }
        if let Some(Object::Reference(id)) = document.trailer.remove(b"Encrypt") {
            document.objects.remove(&id);
        }
        document.encryption_state = None;
        debug!("Opened with empty user password, saving unencrypted");
    }

    Ok(document)
}

fn recolor_page(
    document: &mut Document,
    page_id: ObjectId,
    number: u32,
    options: &BackgroundOptions,
) -> Result<()> {
    let bounds = visible_bounds(document, page_id, number)?;
    let mut contents = page_contents(document, page_id, number)?;

    match options.mode {
        BackgroundMode::Standard => {
            let background = add_content(document, fill_rect(options.color, &bounds, None), "")?;
            contents.insert(0, background);
        }
        BackgroundMode::Overlay => {
            let state = register_overlay_state(document, page_id, number, options.overlay_opacity)?;

            let save = add_content(document, vec![Operation::new("q", vec![])], "")?;
            let mut operations = vec![Operation::new("Q", vec![])];
            operations.extend(fill_rect(options.color, &bounds, Some(&state)));
            // The page's last stream may not end in whitespace
            let overlay = add_content(document, operations, "\n")?;

            contents.insert(0, save);
            contents.push(overlay);
        }
    }

    page_dictionary_mut(document, page_id, number)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// `q [/GS gs] r g b rg x y w h re f Q`
fn fill_rect(color: Rgb, bounds: &PageBounds, state: Option<&str>) -> Vec<Operation> {
    let (r, g, b) = color.to_unit();
    let mut operations = vec![Operation::new("q", vec![])];
    if let Some(name) = state {
        operations.push(Operation::new(
            "gs",
            vec![Object::Name(name.as_bytes().to_vec())],
        ));
    }
    operations.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
    operations.push(Operation::new(
        "re",
        vec![
            bounds.left.into(),
            bounds.bottom.into(),
            bounds.width().into(),
            bounds.height().into(),
        ],
    ));
    operations.push(Operation::new("f", vec![]));
    operations.push(Operation::new("Q", vec![]));
    operations
}

/// Encode operations as a new content stream object and return a reference to it.
///
/// The page's streams are parsed as one concatenated sequence, so the added
/// stream always ends in whitespace and, with `prefix`, may start with it.
fn add_content(document: &mut Document, operations: Vec<Operation>, prefix: &str) -> Result<Object> {
    let encoded = Content { operations }.encode().map_err(|e| Error::PdfWrite {
        reason: format!("Failed to encode content stream: {}", e),
    })?;

    let mut bytes = prefix.as_bytes().to_vec();
    bytes.extend_from_slice(&encoded);
    if !bytes.ends_with(b"\n") {
        bytes.push(b'\n');
    }

    let id = document.add_object(Stream::new(Dictionary::new(), bytes));
    Ok(Object::Reference(id))
}

fn malformed_page(number: u32, detail: impl std::fmt::Display) -> Error {
    Error::MalformedInput {
        reason: format!("page {}: {}", number, detail),
    }
}

fn page_dictionary(document: &Document, page_id: ObjectId, number: u32) -> Result<&Dictionary> {
    document
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| malformed_page(number, e))
}

fn page_dictionary_mut(
    document: &mut Document,
    page_id: ObjectId,
    number: u32,
) -> Result<&mut Dictionary> {
    document
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| malformed_page(number, e))
}

/// Follow a single indirect reference
fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, walking the `/Parent` chain for inherited values
fn inherited_attribute<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = document.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(document, value);
        }
        node = match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => document.get_object(*parent).ok()?.as_dict().ok()?,
            _ => return None,
        };
    }
    None
}

fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn page_box(document: &Document, page_id: ObjectId, key: &[u8]) -> Option<PageBounds> {
    let array = inherited_attribute(document, page_id, key)?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut corners = [0.0f32; 4];
    for (slot, item) in corners.iter_mut().zip(array) {
        *slot = as_number(resolve(document, item)?)?;
    }
    let bounds = PageBounds::from_corners(corners[0], corners[1], corners[2], corners[3]);
    (!bounds.is_empty()).then_some(bounds)
}

fn visible_bounds(document: &Document, page_id: ObjectId, number: u32) -> Result<PageBounds> {
    let media_box = page_box(document, page_id, b"MediaBox");
    let crop_box = page_box(document, page_id, b"CropBox");

    let bounds = match (crop_box, media_box) {
        (Some(crop), Some(media)) => {
            let visible = crop.intersect(&media);
            if visible.is_empty() {
                media
            } else {
                visible
            }
        }
        (Some(crop), None) => crop,
        (None, Some(media)) => media,
        (None, None) => return Err(malformed_page(number, "no valid MediaBox")),
    };

    Ok(bounds)
}

/// Current `/Contents` as a list of stream references
fn page_contents(document: &Document, page_id: ObjectId, number: u32) -> Result<Vec<Object>> {
    let page = page_dictionary(document, page_id, number)?;
    let contents = match page.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Reference(id) => match document.get_object(*id) {
            Ok(Object::Array(items)) => Ok(items.clone()),
            Ok(Object::Stream(_)) => Ok(vec![Object::Reference(*id)]),
            Ok(Object::Null) => Ok(Vec::new()),
            Ok(_) => Err(malformed_page(number, "/Contents is not a stream")),
            Err(e) => Err(malformed_page(number, e)),
        },
        Object::Array(items) => Ok(items.clone()),
        Object::Null => Ok(Vec::new()),
        _ => Err(malformed_page(number, "/Contents is not a stream reference")),
    }
}

/// Add a translucent fill state to the page's own resources and return its name.
///
/// Inherited or shared resource dictionaries are copied onto the page so that
/// other pages are not affected.
fn register_overlay_state(
    document: &mut Document,
    page_id: ObjectId,
    number: u32,
    opacity: f32,
) -> Result<String> {
    let mut resources = match inherited_attribute(document, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Null) | None => Dictionary::new(),
        Some(_) => return Err(malformed_page(number, "/Resources is not a dictionary")),
    };

    let mut states = match resources.get(b"ExtGState").ok().and_then(|o| resolve(document, o)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let name = (0u32..)
        .map(|i| format!("{}{}", OVERLAY_STATE_PREFIX, i))
        .find(|candidate| !states.has(candidate.as_bytes()))
        .unwrap_or_else(|| OVERLAY_STATE_PREFIX.to_string());

    let mut state = Dictionary::new();
    state.set("Type", Object::Name(b"ExtGState".to_vec()));
    state.set("ca", Object::from(opacity));
    state.set("CA", Object::from(opacity));
    let state_id = document.add_object(Object::Dictionary(state));

    states.set(name.as_bytes().to_vec(), Object::Reference(state_id));
    resources.set("ExtGState", Object::Dictionary(states));
    page_dictionary_mut(document, page_id, number)?.set("Resources", Object::Dictionary(resources));

    Ok(name)
}
