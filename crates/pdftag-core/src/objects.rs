//! Small helpers over the lopdf object model

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::geometry::Rect;

/// Upper bound on chained references and `/Parent` hops
const MAX_CHAIN: usize = 64;

/// US Letter, used when a page has neither CropBox nor MediaBox
const DEFAULT_PAGE_BOX: Rect = Rect {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

/// Follow references until a direct object is reached
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_CHAIN {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Resolved dictionary entry
pub fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    resolve(doc, dict.get(key).ok()?)
}

/// Resolved dictionary entry that is itself a dictionary (or a stream's dictionary)
pub fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    as_dict(get(doc, dict, key)?)
}

pub fn as_dict(obj: &Object) -> Option<&Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub fn as_name(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(n) => Some(n.as_slice()),
        _ => None,
    }
}

/// True when `dict[key]` is the name `expected`
pub fn name_is(doc: &Document, dict: &Dictionary, key: &[u8], expected: &[u8]) -> bool {
    get(doc, dict, key).and_then(as_name) == Some(expected)
}

pub fn as_int(obj: &Object) -> Option<i64> {
    match obj {
        Object::Integer(i) => Some(*i),
        _ => None,
    }
}

/// The document catalog
pub fn catalog(doc: &Document) -> Option<&Dictionary> {
    let root = doc.trailer.get(b"Root").ok()?;
    as_dict(resolve(doc, root)?)
}

/// The StructTreeRoot dictionary reachable from the catalog
pub fn struct_tree_root(doc: &Document) -> Option<&Dictionary> {
    get_dict(doc, catalog(doc)?, b"StructTreeRoot")
}

/// Maps page object ids to 1-based page numbers
#[derive(Debug, Default)]
pub struct PageIndex {
    numbers: HashMap<ObjectId, u32>,
}

impl PageIndex {
    pub fn build(doc: &Document) -> Self {
        let pages: BTreeMap<u32, ObjectId> = doc.get_pages();
        let numbers = pages.into_iter().map(|(num, id)| (id, num)).collect();
        Self { numbers }
    }

    pub fn number_of(&self, page: ObjectId) -> Option<u32> {
        self.numbers.get(&page).copied()
    }

    pub fn contains(&self, page: ObjectId) -> bool {
        self.numbers.contains_key(&page)
    }
}

/// Page attribute lookup honouring inheritance through `/Parent`
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_CHAIN {
        if let Some(value) = get(doc, node, key) {
            return Some(value);
        }
        node = get_dict(doc, node, b"Parent")?;
    }
    None
}

/// Visible page region: CropBox, falling back to MediaBox
pub fn crop_box(doc: &Document, page_id: ObjectId) -> Rect {
    inherited(doc, page_id, b"CropBox")
        .and_then(Rect::from_object)
        .or_else(|| inherited(doc, page_id, b"MediaBox").and_then(Rect::from_object))
        .unwrap_or(DEFAULT_PAGE_BOX)
}

pub fn resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    inherited(doc, page_id, b"Resources").and_then(as_dict)
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or PDFDocEncoding)
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| pdf_doc_char(b)).collect()
}

/// PDFDocEncoding differs from Latin-1 only in 0x18..0x1F and 0x80..0x9F
fn pdf_doc_char(b: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}',
        '\u{2044}', '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}',
        '\u{201D}', '\u{2018}', '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}',
        '\u{0141}', '\u{0152}', '\u{0160}', '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}',
        '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}',
    ];
    const LOW: [char; 8] = [
        '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}',
        '\u{02DC}',
    ];
    match b {
        0x18..=0x1F => LOW[(b - 0x18) as usize],
        0x80..=0x9F => HIGH[(b - 0x80) as usize],
        0xA0 => '\u{20AC}',
        _ => b as char,
    }
}
