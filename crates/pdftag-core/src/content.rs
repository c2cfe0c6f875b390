//! Content stream walking
//!
//! Maps marked-content ids to the region of the page they paint. The walker
//! keeps a graphics-state stack for the CTM and a marked-content stack for the
//! active MCID, and records:
//! - image XObjects and inline images (the unit square mapped through the CTM)
//! - form XObjects (their `/BBox` mapped through `/Matrix` and the CTM)
//! - painted vector paths (every construction point mapped through the CTM)
//!
//! Text is not measured; an element made only of text gets no region here.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

use crate::error::{PdfTagError, Result};
use crate::geometry::{number, Matrix, Rect};
use crate::objects;

/// Path-painting operators that make a path visible
pub(crate) const PAINT_OPERATORS: &[&str] = &["S", "s", "f", "F", "f*", "B", "B*", "b", "b*"];

/// Path construction operators, including the clip modifiers
pub(crate) const PATH_OPERATORS: &[&str] = &["m", "l", "c", "v", "y", "h", "re", "W", "W*"];

/// Operator standing in for a whole inline image. Its one operand is the raw
/// `BI … ID … EI` text, written back byte for byte.
pub(crate) const INLINE_IMAGE: &str = "BI";

/// Decoded bytes of a stream, whether or not it carries a `/Filter`
pub fn plain_content(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| PdfTagError::MalformedPdf(format!("Cannot decode stream: {}", e)))
    } else {
        Ok(stream.content.clone())
    }
}

/// Decode the operations of one content stream object
pub fn decode_stream(doc: &Document, id: ObjectId) -> Result<Vec<Operation>> {
    let stream = doc
        .get_object(id)
        .and_then(Object::as_stream)
        .map_err(|e| PdfTagError::MalformedPdf(format!("Content {:?}: {}", id, e)))?;
    let data = plain_content(stream)?;
    decode_content(&data).map_err(|e| PdfTagError::MalformedPdf(format!("Content {:?}: {}", id, e)))
}

/// Parse content bytes into operations, keeping inline images as single [`INLINE_IMAGE`] operations
pub fn decode_content(data: &[u8]) -> lopdf::Result<Vec<Operation>> {
    let mut operations = Vec::new();
    for segment in split_inline_images(data) {
        match segment {
            Segment::Operators(bytes) => {
                if !bytes.iter().all(|b| is_whitespace(*b)) {
                    operations.extend(Content::decode(bytes)?.operations);
                }
            }
            Segment::InlineImage(bytes) => operations.push(Operation::new(
                INLINE_IMAGE,
                vec![Object::String(bytes.to_vec(), StringFormat::Literal)],
            )),
        }
    }
    Ok(operations)
}

/// Inverse of [`decode_content`]
pub fn encode_content(operations: Vec<Operation>) -> lopdf::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pending = Vec::new();
    for op in operations {
        if op.operator == INLINE_IMAGE {
            if let [Object::String(raw, _)] = op.operands.as_slice() {
                flush_operations(&mut out, &mut pending)?;
                out.extend_from_slice(raw);
                out.push(b'\n');
                continue;
            }
        }
        pending.push(op);
    }
    flush_operations(&mut out, &mut pending)?;
    Ok(out)
}

fn flush_operations(out: &mut Vec<u8>, pending: &mut Vec<Operation>) -> lopdf::Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let encoded = Content {
        operations: std::mem::take(pending),
    }
    .encode()?;
    out.extend_from_slice(&encoded);
    if !encoded.ends_with(b"\n") {
        out.push(b'\n');
    }
    Ok(())
}

enum Segment<'a> {
    Operators(&'a [u8]),
    InlineImage(&'a [u8]),
}

/// Cut `BI … ID … EI` out of the stream; lopdf's content parser cannot read the binary payload
fn split_inline_images(data: &[u8]) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    while pos < data.len() {
        match data[pos] {
            b'%' => pos = skip_comment(data, pos),
            b'(' => pos = skip_literal_string(data, pos),
            b'<' if data.get(pos + 1) == Some(&b'<') => pos += 2,
            b'<' => pos = skip_hex_string(data, pos),
            _ if keyword_at(data, pos, b"BI") => match inline_image_end(data, pos) {
                Some(end) => {
                    if start < pos {
                        segments.push(Segment::Operators(&data[start..pos]));
                    }
                    segments.push(Segment::InlineImage(&data[pos..end]));
                    start = end;
                    pos = end;
                }
                // Unterminated: leave it to the parser to reject
                None => pos += 2,
            },
            _ => pos += 1,
        }
    }
    if start < data.len() {
        segments.push(Segment::Operators(&data[start..]));
    }
    segments
}

/// End offset (after `EI`) of the inline image starting at `begin`
fn inline_image_end(data: &[u8], begin: usize) -> Option<usize> {
    let mut pos = begin + 2;
    while pos < data.len() && !keyword_at(data, pos, b"ID") {
        pos = match data[pos] {
            b'(' => skip_literal_string(data, pos),
            _ => pos + 1,
        };
    }
    // One whitespace byte separates `ID` from the image data
    let payload = pos.checked_add(3)?;
    (payload..data.len().saturating_sub(1))
        .find(|&i| is_whitespace(data[i - 1]) && keyword_at(data, i, b"EI"))
        .map(|i| i + 2)
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// `keyword` as a whole token at `pos`; a name such as `/BI` does not count
fn keyword_at(data: &[u8], pos: usize, keyword: &[u8]) -> bool {
    let before = pos == 0 || {
        let b = data[pos - 1];
        is_whitespace(b) || (is_delimiter(b) && b != b'/' && b != b'%')
    };
    let after = data
        .get(pos + keyword.len())
        .map_or(true, |b| is_whitespace(*b) || is_delimiter(*b));
    before && after && data[pos..].starts_with(keyword)
}

fn skip_comment(data: &[u8], pos: usize) -> usize {
    data[pos..]
        .iter()
        .position(|b| matches!(b, b'\r' | b'\n'))
        .map_or(data.len(), |n| pos + n)
}

fn skip_hex_string(data: &[u8], pos: usize) -> usize {
    data[pos..]
        .iter()
        .position(|b| *b == b'>')
        .map_or(data.len(), |n| pos + n + 1)
}

fn skip_literal_string(data: &[u8], pos: usize) -> usize {
    let mut depth = 0usize;
    let mut i = pos;
    while i < data.len() {
        match data[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    data.len()
}

/// Key of a marked-content sequence: MCIDs are unique per page only
pub type McidKey = (ObjectId, i64);

/// Painted region of every marked-content id in the document
#[derive(Debug, Default)]
pub struct ContentRegions {
    regions: HashMap<McidKey, Rect>,
}

impl ContentRegions {
    /// Walk the content streams of every page
    pub fn collect(doc: &Document) -> Self {
        let mut regions = Self::default();
        for (page_num, page_id) in doc.get_pages() {
            regions.scan_page(doc, page_id);
            debug!(page = page_num, "scanned page content for marked regions");
        }
        regions
    }

    pub fn region(&self, page: ObjectId, mcid: i64) -> Option<Rect> {
        self.regions.get(&(page, mcid)).copied()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn scan_page(&mut self, doc: &Document, page_id: ObjectId) {
        let mut walker = RegionWalker::new(doc, page_id, objects::resources(doc, page_id));
        for content_id in doc.get_page_contents(page_id) {
            match decode_stream(doc, content_id) {
                Ok(operations) => {
                    for op in &operations {
                        walker.apply(op);
                    }
                }
                Err(e) => warn!(?content_id, "skipping undecodable content stream: {}", e),
            }
        }
        for (mcid, rect) in walker.found {
            self.regions
                .entry((page_id, mcid))
                .and_modify(|r| *r = r.union(&rect))
                .or_insert(rect);
        }
    }
}

struct RegionWalker<'a> {
    doc: &'a Document,
    page_id: ObjectId,
    resources: Option<&'a Dictionary>,
    ctm: Matrix,
    saved: Vec<Matrix>,
    marked: Vec<Option<i64>>,
    path: Option<Rect>,
    found: HashMap<i64, Rect>,
}

impl<'a> RegionWalker<'a> {
    fn new(doc: &'a Document, page_id: ObjectId, resources: Option<&'a Dictionary>) -> Self {
        Self {
            doc,
            page_id,
            resources,
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            marked: Vec::new(),
            path: None,
            found: HashMap::new(),
        }
    }

    fn current_mcid(&self) -> Option<i64> {
        self.marked.iter().rev().find_map(|m| *m)
    }

    fn apply(&mut self, op: &Operation) {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_objects(operands) {
                    self.ctm = m.then(&self.ctm);
                }
            }
            "BDC" => {
                let mcid = operands.get(1).and_then(|props| self.property_mcid(props));
                self.marked.push(mcid);
            }
            "BMC" => self.marked.push(None),
            "EMC" => {
                self.marked.pop();
            }
            "m" | "l" | "c" | "v" | "y" => self.add_points(operands),
            "re" => {
                if let [x, y, w, h] = operands {
                    if let (Some(x), Some(y), Some(w), Some(h)) =
                        (number(x), number(y), number(w), number(h))
                    {
                        let rect = Rect::new(x.min(x + w), y.min(y + h), x.max(x + w), y.max(y + h));
                        let mapped = self.ctm.transform_rect(&rect);
                        self.extend_path(mapped);
                    }
                }
            }
            "n" => self.path = None,
            INLINE_IMAGE => self.record(self.ctm.transform_rect(&Rect::UNIT)),
            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    if let Some(rect) = self.xobject_region(name) {
                        self.record(rect);
                    }
                }
            }
            paint if PAINT_OPERATORS.contains(&paint) => {
                if let Some(rect) = self.path.take() {
                    self.record(rect);
                }
            }
            _ => {}
        }
    }

    /// MCID from an inline property dictionary or a named `/Properties` entry
    fn property_mcid(&self, props: &Object) -> Option<i64> {
        let dict = match props {
            Object::Dictionary(d) => d,
            Object::Name(name) => {
                let properties = objects::get_dict(self.doc, self.resources?, b"Properties")?;
                objects::get_dict(self.doc, properties, name)?
            }
            _ => return None,
        };
        objects::get(self.doc, dict, b"MCID").and_then(objects::as_int)
    }

    fn add_points(&mut self, operands: &[Object]) {
        for pair in operands.chunks_exact(2) {
            if let (Some(x), Some(y)) = (number(&pair[0]), number(&pair[1])) {
                let (x, y) = self.ctm.apply(x, y);
                self.extend_path(Rect::point(x, y));
            }
        }
    }

    fn extend_path(&mut self, rect: Rect) {
        self.path = Some(match self.path {
            Some(current) => current.union(&rect),
            None => rect,
        });
    }

    fn xobject_region(&self, name: &[u8]) -> Option<Rect> {
        let xobjects = objects::get_dict(self.doc, self.resources?, b"XObject")?;
        let xobject = objects::get_dict(self.doc, xobjects, name)?;
        match objects::get(self.doc, xobject, b"Subtype").and_then(objects::as_name)? {
            b"Image" => Some(self.ctm.transform_rect(&Rect::UNIT)),
            b"Form" => {
                let bbox = objects::get(self.doc, xobject, b"BBox").and_then(Rect::from_object)?;
                let matrix = match objects::get(self.doc, xobject, b"Matrix") {
                    Some(Object::Array(values)) => {
                        Matrix::from_objects(values).unwrap_or(Matrix::IDENTITY)
                    }
                    _ => Matrix::IDENTITY,
                };
                Some(matrix.then(&self.ctm).transform_rect(&bbox))
            }
            other => {
                debug!(
                    page = ?self.page_id,
                    subtype = %String::from_utf8_lossy(other),
                    "ignoring XObject"
                );
                None
            }
        }
    }

    fn record(&mut self, rect: Rect) {
        if let Some(mcid) = self.current_mcid() {
            self.found
                .entry(mcid)
                .and_modify(|r| *r = r.union(&rect))
                .or_insert(rect);
        }
    }
}
