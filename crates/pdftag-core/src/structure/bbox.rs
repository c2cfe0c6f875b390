//! Layout bounding boxes for figures

use std::collections::HashSet;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::{Location, StructElement, StructNode, StructTree};
use crate::content::ContentRegions;
use crate::error::Result;
use crate::geometry::Rect;
use crate::objects;

/// Give every Figure without a Layout `/BBox` one. Returns the number inserted.
pub fn ensure_layout_bboxes(doc: &mut Document) -> Result<usize> {
    let tree = StructTree::load(doc)?;
    let regions = ContentRegions::collect(doc);
    debug!(regions = regions.len(), "collected marked-content regions");

    let mut seen = HashSet::new();
    let mut pending: Vec<(Location, Rect)> = Vec::new();
    for element in tree.elements() {
        if !element.is_figure() || element.layout_bbox.is_some() {
            continue;
        }
        if !seen.insert(element.location.clone()) {
            continue;
        }
        match figure_box(doc, &regions, element) {
            Some(rect) => pending.push((element.location.clone(), rect)),
            None => warn!(
                tag = %element.tag,
                id = ?element.id,
                "figure has no page reference, leaving it without a bounding box"
            ),
        }
    }

    let mut inserted = 0;
    for (location, rect) in pending {
        match location.resolve_mut(doc) {
            Some(dict) => {
                add_layout_attribute(dict, &rect);
                debug!(object = ?location.object, ?rect, "inserted layout bounding box");
                inserted += 1;
            }
            None => warn!(object = ?location.object, "structure element vanished before update"),
        }
    }
    Ok(inserted)
}

/// Union of the element's painted regions clamped to the page, or the page itself
fn figure_box(doc: &Document, regions: &ContentRegions, element: &StructElement) -> Option<Rect> {
    let page = element.page.or(element.kid_page)?;
    let crop = objects::crop_box(doc, page);
    let mut found = None;
    gather_regions(regions, element, page, &mut found);
    Some(match found {
        Some(rect) => rect.clamp_to(&crop),
        None => crop,
    })
}

fn gather_regions(
    regions: &ContentRegions,
    element: &StructElement,
    page: ObjectId,
    found: &mut Option<Rect>,
) {
    for child in &element.children {
        let region = match child {
            StructNode::Mcid(mcid) => regions.region(page, *mcid),
            StructNode::Mcr {
                mcid,
                page: mcr_page,
                ..
            } => regions.region(mcr_page.unwrap_or(page), *mcid),
            StructNode::Element(nested) => {
                gather_regions(regions, nested, nested.page.unwrap_or(page), found);
                None
            }
            _ => None,
        };
        if let Some(rect) = region {
            *found = Some(match found {
                Some(current) => current.union(&rect),
                None => rect,
            });
        }
    }
}

/// `/A` absent: the new dictionary. A dictionary or reference: `[old new]`. An array: appended.
fn add_layout_attribute(dict: &mut Dictionary, rect: &Rect) {
    let attribute = Object::Dictionary(dictionary! {
        "O" => "Layout",
        "BBox" => rect.to_object(),
    });
    match dict.get_mut(b"A") {
        Ok(Object::Array(items)) => items.push(attribute),
        Ok(existing) => {
            let old = std::mem::replace(existing, Object::Null);
            *existing = Object::Array(vec![old, attribute]);
        }
        Err(_) => dict.set("A", attribute),
    }
}
