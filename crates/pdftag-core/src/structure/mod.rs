//! Read model of the logical structure tree
//!
//! [`StructTree::load`] walks `/StructTreeRoot /K` once and produces owned
//! nodes. Every element remembers where its dictionary lives in the object
//! graph ([`Location`]) so mutations can be applied after the walk without
//! holding a borrow of the document.

mod bbox;
mod render;

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{PdfTagError, Result};
use crate::geometry::number;
use crate::objects::{self, PageIndex};

pub use bbox::ensure_layout_bboxes;
pub use render::render;

/// Role-map hops followed before giving up
const MAX_ROLE_HOPS: usize = 8;

/// Upper bound on `/P` hops when looking for a page
const MAX_PARENT_HOPS: usize = 64;

/// One step from a container to a nested direct object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(Vec<u8>),
    Index(usize),
}

/// Address of a possibly-direct dictionary: an indirect object plus the steps into it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub object: ObjectId,
    pub path: Vec<PathStep>,
}

impl Location {
    pub fn object(object: ObjectId) -> Self {
        Self {
            object,
            path: Vec::new(),
        }
    }

    fn child(&self, step: PathStep) -> Self {
        let mut path = self.path.clone();
        path.push(step);
        Self {
            object: self.object,
            path,
        }
    }

    /// Follow the location to a mutable dictionary
    pub fn resolve_mut<'a>(&self, doc: &'a mut Document) -> Option<&'a mut Dictionary> {
        let mut current = doc.get_object_mut(self.object).ok()?;
        for step in &self.path {
            current = match (step, current) {
                (PathStep::Key(key), Object::Dictionary(dict)) => dict.get_mut(key).ok()?,
                (PathStep::Index(i), Object::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        match current {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }
}

/// A node of the structure tree
#[derive(Debug, Clone, PartialEq)]
pub enum StructNode {
    Element(StructElement),
    /// Marked-content id on the enclosing element's page
    Mcid(i64),
    Mcr {
        mcid: i64,
        page: Option<ObjectId>,
        page_number: Option<u32>,
    },
    Objr {
        object: Option<ObjectId>,
    },
    Stream {
        length: usize,
    },
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructElement {
    pub id: Option<ObjectId>,
    pub location: Location,
    pub tag: String,
    /// Standard type from `/RoleMap`, when the tag is mapped
    pub role: Option<String>,
    /// First `/Pg` found on the element or its `/P` ancestors that names a page
    pub page: Option<ObjectId>,
    pub page_number: Option<u32>,
    /// `/Pg` of the first kid dictionary that has one
    pub kid_page: Option<ObjectId>,
    pub alt: Option<String>,
    pub actual_text: Option<String>,
    pub title: Option<String>,
    pub lang: Option<String>,
    pub element_id: Option<String>,
    pub classes: Option<Vec<String>>,
    /// Raw `/BBox` entry; non-numeric items are kept as `None`
    pub bbox: Option<[Option<f64>; 4]>,
    /// `/BBox` of the Layout attribute object in `/A`
    pub layout_bbox: Option<[f64; 4]>,
    pub artifact_type: Option<String>,
    pub namespace: Option<String>,
    pub children: Vec<StructNode>,
}

impl StructElement {
    /// Structure type after role mapping
    pub fn standard_type(&self) -> &str {
        self.role.as_deref().unwrap_or(&self.tag)
    }

    pub fn is_figure(&self) -> bool {
        self.standard_type() == "Figure"
    }

    /// Depth-first, parents before children
    pub fn walk<'s>(&'s self, visit: &mut impl FnMut(&'s StructElement)) {
        visit(self);
        for child in &self.children {
            if let StructNode::Element(element) = child {
                element.walk(visit);
            }
        }
    }
}

/// The structure tree of a document
#[derive(Debug, Clone, PartialEq)]
pub struct StructTree {
    pub kids: Vec<StructNode>,
}

impl StructTree {
    pub fn load(doc: &Document) -> Result<Self> {
        let (catalog_id, catalog) = catalog(doc)?;
        let entry = catalog
            .get(b"StructTreeRoot")
            .map_err(|_| PdfTagError::MissingStructTree)?;
        let (root_location, root) = match entry {
            Object::Reference(id) => {
                let root = doc
                    .get_dictionary(*id)
                    .map_err(|_| PdfTagError::MissingStructTree)?;
                (Location::object(*id), root)
            }
            Object::Dictionary(root) => (
                Location::object(catalog_id).child(PathStep::Key(b"StructTreeRoot".to_vec())),
                root,
            ),
            _ => return Err(PdfTagError::MissingStructTree),
        };

        let mut builder = TreeBuilder::new(doc, root);
        let mut kids = Vec::new();
        if let Ok(k) = root.get(b"K") {
            builder.collect(k, root_location.child(PathStep::Key(b"K".to_vec())), &mut kids);
        }
        Ok(Self { kids })
    }

    pub fn elements(&self) -> Vec<&StructElement> {
        let mut out = Vec::new();
        for kid in &self.kids {
            if let StructNode::Element(element) = kid {
                element.walk(&mut |e| out.push(e));
            }
        }
        out
    }
}

fn catalog(doc: &Document) -> Result<(ObjectId, &Dictionary)> {
    let root = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|obj| obj.as_reference().ok())
        .ok_or_else(|| PdfTagError::MalformedPdf("Trailer has no /Root reference".to_string()))?;
    let dict = doc
        .get_dictionary(root)
        .map_err(|e| PdfTagError::MalformedPdf(format!("Catalog {:?}: {}", root, e)))?;
    Ok((root, dict))
}

struct TreeBuilder<'a> {
    doc: &'a Document,
    pages: PageIndex,
    role_map: HashMap<Vec<u8>, Vec<u8>>,
    on_path: HashSet<ObjectId>,
}

impl<'a> TreeBuilder<'a> {
    fn new(doc: &'a Document, root: &'a Dictionary) -> Self {
        let role_map = objects::get_dict(doc, root, b"RoleMap")
            .map(|map| {
                map.iter()
                    .filter_map(|(key, value)| {
                        let target = objects::resolve(doc, value).and_then(objects::as_name)?;
                        Some((key.clone(), target.to_vec()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            doc,
            pages: PageIndex::build(doc),
            role_map,
            on_path: HashSet::new(),
        }
    }

    /// Append the nodes for `obj`, flattening arrays into the same level
    fn collect(&mut self, obj: &'a Object, location: Location, out: &mut Vec<StructNode>) {
        match obj {
            Object::Reference(id) => {
                if !self.on_path.insert(*id) {
                    out.push(StructNode::Unknown("Cycle".to_string()));
                    return;
                }
                match self.doc.get_object(*id) {
                    Ok(target) => self.collect(target, Location::object(*id), out),
                    Err(_) => out.push(StructNode::Unknown("null".to_string())),
                }
                self.on_path.remove(id);
            }
            Object::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.collect(item, location.child(PathStep::Index(i)), out);
                }
            }
            Object::Integer(mcid) => out.push(StructNode::Mcid(*mcid)),
            Object::Dictionary(dict) => out.push(self.dictionary(dict, location)),
            Object::Stream(stream) => {
                let length = crate::content::plain_content(stream)
                    .map(|data| data.len())
                    .unwrap_or(stream.content.len());
                out.push(StructNode::Stream { length });
            }
            other => out.push(StructNode::Unknown(type_name(other).to_string())),
        }
    }

    fn dictionary(&mut self, dict: &'a Dictionary, location: Location) -> StructNode {
        match objects::get(self.doc, dict, b"Type").and_then(objects::as_name) {
            Some(b"MCR") => {
                let page = dict.get(b"Pg").ok().and_then(|pg| pg.as_reference().ok());
                StructNode::Mcr {
                    mcid: objects::get(self.doc, dict, b"MCID")
                        .and_then(objects::as_int)
                        .unwrap_or(-1),
                    page,
                    page_number: page.and_then(|p| self.pages.number_of(p)),
                }
            }
            Some(b"OBJR") => StructNode::Objr {
                object: dict.get(b"Obj").ok().and_then(|o| o.as_reference().ok()),
            },
            _ if dict.has(b"S") || objects::name_is(self.doc, dict, b"Type", b"StructElem") => {
                StructNode::Element(self.element(dict, location))
            }
            _ => StructNode::Unknown("Dictionary".to_string()),
        }
    }

    fn element(&mut self, dict: &'a Dictionary, location: Location) -> StructElement {
        let doc = self.doc;
        let tag = objects::get(doc, dict, b"S")
            .and_then(objects::as_name)
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_else(|| "Unknown".to_string());
        let role = self.role_of(tag.as_bytes());
        let page = self.page_of(dict);
        let text = |key: &[u8]| match objects::get(doc, dict, key) {
            Some(Object::String(bytes, _)) => Some(objects::decode_text(bytes)),
            _ => None,
        };

        let artifact_type = if tag == "Artifact" {
            objects::get(doc, dict, b"Type")
                .and_then(objects::as_name)
                .filter(|name| *name != b"StructElem")
                .map(|name| String::from_utf8_lossy(name).into_owned())
        } else {
            None
        };

        let mut element = StructElement {
            id: location.path.is_empty().then_some(location.object),
            location: location.clone(),
            role,
            page,
            page_number: page.and_then(|p| self.pages.number_of(p)),
            kid_page: self.kid_page(dict),
            alt: text(b"Alt"),
            actual_text: text(b"ActualText"),
            title: text(b"T"),
            lang: text(b"Lang"),
            element_id: text(b"ID"),
            classes: self.classes(dict),
            bbox: objects::get(doc, dict, b"BBox").and_then(raw_bbox),
            layout_bbox: self.layout_bbox(dict),
            artifact_type,
            namespace: self.namespace(dict),
            tag,
            children: Vec::new(),
        };

        if let Ok(kids) = dict.get(b"K") {
            let mut children = Vec::new();
            self.collect(kids, location.child(PathStep::Key(b"K".to_vec())), &mut children);
            element.children = children;
        }
        element
    }

    fn role_of(&self, tag: &[u8]) -> Option<String> {
        let mut current = tag;
        let mut mapped = None;
        for _ in 0..MAX_ROLE_HOPS {
            match self.role_map.get(current) {
                Some(target) if target.as_slice() != current => {
                    current = target.as_slice();
                    mapped = Some(current);
                }
                _ => break,
            }
        }
        mapped.map(|name| String::from_utf8_lossy(name).into_owned())
    }

    /// `/Pg` on the element, else on the nearest `/P` ancestor, that names a known page
    fn page_of(&self, dict: &Dictionary) -> Option<ObjectId> {
        let mut node = dict;
        for _ in 0..MAX_PARENT_HOPS {
            if let Ok(Object::Reference(page)) = node.get(b"Pg") {
                if self.pages.contains(*page) {
                    return Some(*page);
                }
            }
            node = objects::get_dict(self.doc, node, b"P")?;
        }
        None
    }

    fn kid_page(&self, dict: &Dictionary) -> Option<ObjectId> {
        let kids = objects::get(self.doc, dict, b"K")?;
        let first_with_page = |kid: &Object| {
            let kid = objects::as_dict(objects::resolve(self.doc, kid)?)?;
            kid.get(b"Pg").ok()?.as_reference().ok()
        };
        match kids {
            Object::Array(items) => items.iter().find_map(first_with_page),
            single => first_with_page(single),
        }
    }

    fn classes(&self, dict: &Dictionary) -> Option<Vec<String>> {
        let name = |obj: &Object| {
            objects::resolve(self.doc, obj)
                .and_then(objects::as_name)
                .map(|n| String::from_utf8_lossy(n).into_owned())
        };
        match objects::get(self.doc, dict, b"C")? {
            Object::Array(items) => Some(items.iter().filter_map(name).collect()),
            single => name(single).map(|n| vec![n]),
        }
    }

    fn layout_bbox(&self, dict: &Dictionary) -> Option<[f64; 4]> {
        let attribute = |obj: &Object| {
            let attr = objects::as_dict(objects::resolve(self.doc, obj)?)?;
            if !objects::name_is(self.doc, attr, b"O", b"Layout") {
                return None;
            }
            let bbox = raw_bbox(objects::get(self.doc, attr, b"BBox")?)?;
            Some([bbox[0]?, bbox[1]?, bbox[2]?, bbox[3]?])
        };
        match objects::get(self.doc, dict, b"A")? {
            Object::Array(items) => items.iter().find_map(attribute),
            single => attribute(single),
        }
    }

    fn namespace(&self, dict: &Dictionary) -> Option<String> {
        let ns = objects::get_dict(self.doc, dict, b"NS")?;
        match objects::get(self.doc, ns, b"NS")? {
            Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            Object::String(bytes, _) => Some(objects::decode_text(bytes)),
            _ => None,
        }
    }
}

fn raw_bbox(obj: &Object) -> Option<[Option<f64>; 4]> {
    match obj {
        Object::Array(items) if items.len() == 4 => {
            Some([number(&items[0]), number(&items[1]), number(&items[2]), number(&items[3])])
        }
        _ => None,
    }
}

fn type_name(obj: &Object) -> &'static str {
    match obj {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) => "integer",
        Object::Real(_) => "real",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        Object::Reference(_) => "reference",
    }
}
