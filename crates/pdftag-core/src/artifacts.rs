//! Artifact marking for untagged vector paths
//!
//! Decorative rules, borders and backgrounds are usually painted outside any
//! marked-content sequence. Assistive technology then has no way to tell
//! them apart from real content, so every such path object is wrapped in
//! `/Artifact BMC … EMC`.

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::content::{decode_stream, encode_content, PAINT_OPERATORS, PATH_OPERATORS};
use crate::error::{PdfTagError, Result};

/// Marking state carried from one content stream of a page into the next
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    /// Marked-content nesting depth
    pub depth: usize,
    /// A path object was still being constructed when the last stream ended
    pub open_path: bool,
}

/// Wrap every unmarked, painted path on every page. Returns the number wrapped.
pub fn mark_paths_as_artifacts(doc: &mut Document) -> Result<usize> {
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    let mut total = 0;

    for (page_num, page_id) in pages {
        let mut state = PageState::default();
        for content_id in doc.get_page_contents(page_id) {
            let operations = match decode_stream(doc, content_id) {
                Ok(ops) => ops,
                Err(e) => {
                    warn!(page = page_num, ?content_id, "leaving content stream untouched: {}", e);
                    continue;
                }
            };

            let (rewritten, wrapped) = wrap_unmarked_paths(operations, &mut state);
            if wrapped == 0 {
                continue;
            }
            replace_stream_content(doc, content_id, rewritten)?;
            debug!(page = page_num, ?content_id, wrapped, "marked paths as artifacts");
            total += wrapped;
        }
    }

    Ok(total)
}

/// Rewrite an operation list, wrapping painted paths found at marked-content depth 0.
///
/// A path object split across streams is left unwrapped: its construction
/// operators stay in the earlier stream, so no `BMC` may sit between them and
/// the paint operator.
pub fn wrap_unmarked_paths(
    operations: Vec<Operation>,
    state: &mut PageState,
) -> (Vec<Operation>, usize) {
    let mut out = Vec::with_capacity(operations.len());
    let mut path: Vec<Operation> = Vec::new();
    let mut continued = state.open_path;
    let mut wrapped = 0;

    for op in operations {
        let operator = op.operator.as_str();
        if PATH_OPERATORS.contains(&operator) {
            path.push(op);
            continue;
        }

        if PAINT_OPERATORS.contains(&operator) {
            path.push(op);
            if state.depth == 0 && !continued {
                out.push(Operation::new(
                    "BMC",
                    vec![Object::Name(b"Artifact".to_vec())],
                ));
                out.append(&mut path);
                out.push(Operation::new("EMC", vec![]));
                wrapped += 1;
            } else {
                out.append(&mut path);
            }
            continued = false;
            continue;
        }

        // `n` and anything unexpected end the path object unchanged
        out.append(&mut path);
        continued = false;
        match operator {
            "BDC" | "BMC" => state.depth += 1,
            "EMC" => state.depth = state.depth.saturating_sub(1),
            _ => {}
        }
        out.push(op);
    }
    state.open_path = continued || !path.is_empty();
    out.append(&mut path);

    (out, wrapped)
}

fn replace_stream_content(doc: &mut Document, id: ObjectId, operations: Vec<Operation>) -> Result<()> {
    let data = encode_content(operations)
        .map_err(|e| PdfTagError::Serialization(format!("Content {:?}: {}", id, e)))?;

    let stream = doc
        .get_object_mut(id)
        .and_then(Object::as_stream_mut)
        .map_err(|e| PdfTagError::MalformedPdf(format!("Content {:?}: {}", id, e)))?;
    stream.set_plain_content(data);
    if let Err(e) = stream.compress() {
        warn!(?id, "storing content stream uncompressed: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::INLINE_IMAGE;
    use crate::test_support::{single_page_document, tagged_document, PageSpec};
    use lopdf::content::Content;
    use lopdf::{Dictionary, Stream};

    fn operators(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|op| op.operator.as_str()).collect()
    }

    fn decode(content: &[u8]) -> Vec<Operation> {
        Content::decode(content).unwrap().operations
    }

    #[test]
    fn test_wraps_unmarked_rectangle() {
        let mut state = PageState::default();
        let (ops, wrapped) = wrap_unmarked_paths(decode(b"0.5 g 72 600 468 2 re f"), &mut state);
        assert_eq!(wrapped, 1);
        assert_eq!(operators(&ops), vec!["g", "BMC", "re", "f", "EMC"]);
        assert!(matches!(ops[1].operands.as_slice(), [Object::Name(tag)] if tag == b"Artifact"));
    }

    #[test]
    fn test_wraps_whole_path_object() {
        let mut state = PageState::default();
        let (ops, wrapped) =
            wrap_unmarked_paths(decode(b"10 10 m 20 20 l 30 10 l h B*"), &mut state);
        assert_eq!(wrapped, 1);
        assert_eq!(operators(&ops), vec!["BMC", "m", "l", "l", "h", "B*", "EMC"]);
    }

    #[test]
    fn test_leaves_marked_paths_alone() {
        let mut state = PageState::default();
        let (ops, wrapped) = wrap_unmarked_paths(
            decode(b"/Figure <</MCID 0>> BDC 0 0 m 10 10 l S EMC"),
            &mut state,
        );
        assert_eq!(wrapped, 0);
        assert_eq!(operators(&ops), vec!["BDC", "m", "l", "S", "EMC"]);
        assert_eq!(state.depth, 0);
    }

    #[test]
    fn test_leaves_clip_only_paths_alone() {
        let mut state = PageState::default();
        let (ops, wrapped) = wrap_unmarked_paths(decode(b"q 0 0 100 100 re W n Q"), &mut state);
        assert_eq!(wrapped, 0);
        assert_eq!(operators(&ops), vec!["q", "re", "W", "n", "Q"]);
    }

    #[test]
    fn test_depth_carries_across_streams() {
        let mut state = PageState::default();
        let (_, wrapped) = wrap_unmarked_paths(decode(b"/P <</MCID 0>> BDC"), &mut state);
        assert_eq!((wrapped, state.depth), (0, 1));
        let (_, wrapped) = wrap_unmarked_paths(decode(b"0 0 5 5 re f EMC 0 0 5 5 re f"), &mut state);
        assert_eq!((wrapped, state.depth), (1, 0));
    }

    #[test]
    fn test_marking_is_idempotent() {
        let mut state = PageState::default();
        let (once, first) = wrap_unmarked_paths(decode(b"1 w 0 0 m 5 5 l S 0 0 5 5 re f"), &mut state);
        let (twice, second) = wrap_unmarked_paths(once.clone(), &mut state);
        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(operators(&once), operators(&twice));
    }

    #[test]
    fn test_document_marking_rewrites_only_changed_streams() {
        let (mut doc, _) = tagged_document();
        assert_eq!(mark_paths_as_artifacts(&mut doc).unwrap(), 1);
        assert_eq!(mark_paths_as_artifacts(&mut doc).unwrap(), 0);
    }

    #[test]
    fn test_document_marking_produces_decodable_content() {
        let (mut doc, page_id) = single_page_document(PageSpec {
            content: b"0 0 1 rg 10 10 100 100 re f".to_vec(),
            ..PageSpec::default()
        });
        mark_paths_as_artifacts(&mut doc).unwrap();

        let content_id = doc.get_page_contents(page_id)[0];
        let ops = decode_stream(&doc, content_id).unwrap();
        assert_eq!(operators(&ops), vec!["rg", "BMC", "re", "f", "EMC"]);
    }

    #[test]
    fn test_path_split_across_streams_is_left_unwrapped() {
        let mut state = PageState::default();
        let (first, wrapped) = wrap_unmarked_paths(decode(b"0 0 m 10 10 l"), &mut state);
        assert_eq!(wrapped, 0);
        assert_eq!(operators(&first), vec!["m", "l"]);
        assert!(state.open_path);

        let (second, wrapped) = wrap_unmarked_paths(decode(b"S 5 5 10 10 re f"), &mut state);
        assert_eq!(wrapped, 1);
        assert_eq!(operators(&second), vec!["S", "BMC", "re", "f", "EMC"]);
        assert!(!state.open_path);
    }

    #[test]
    fn test_document_with_split_path_keeps_paint_next_to_construction() {
        let (mut doc, page_id) = single_page_document(PageSpec {
            content: b"0 0 m 100 100 l".to_vec(),
            ..PageSpec::default()
        });
        let first = doc.get_page_contents(page_id)[0];
        let second = doc.add_object(Stream::new(Dictionary::new(), b"S 0 0 5 5 re f".to_vec()));
        doc.get_dictionary_mut(page_id).unwrap().set(
            "Contents",
            vec![Object::Reference(first), Object::Reference(second)],
        );

        assert_eq!(mark_paths_as_artifacts(&mut doc).unwrap(), 1);
        assert_eq!(operators(&decode_stream(&doc, first).unwrap()), vec!["m", "l"]);
        assert_eq!(
            operators(&decode_stream(&doc, second).unwrap()),
            vec!["S", "BMC", "re", "f", "EMC"]
        );
    }

    #[test]
    fn test_stream_with_inline_image_is_marked() {
        let image: &[u8] = b"BI /W 2 /H 2 /BPC 8 /CS /G ID \x00\xffEI EI";
        let mut content = b"0 0 10 10 re f q 10 0 0 10 0 0 cm ".to_vec();
        content.extend_from_slice(image);
        content.extend_from_slice(b" Q");
        let (mut doc, page_id) = single_page_document(PageSpec {
            content,
            ..PageSpec::default()
        });

        assert_eq!(mark_paths_as_artifacts(&mut doc).unwrap(), 1);
        let content_id = doc.get_page_contents(page_id)[0];
        let ops = decode_stream(&doc, content_id).unwrap();
        assert_eq!(
            operators(&ops),
            vec!["BMC", "re", "f", "EMC", "q", "cm", INLINE_IMAGE, "Q"]
        );
        assert!(matches!(ops[6].operands.as_slice(), [Object::String(raw, _)] if raw == image));
        assert_eq!(mark_paths_as_artifacts(&mut doc).unwrap(), 0);
    }
}
