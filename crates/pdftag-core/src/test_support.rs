//! Programmatic fixtures shared by the unit and integration tests

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

#[derive(Default)]
pub struct PageSpec {
    pub content: Vec<u8>,
    pub with_image: bool,
    pub properties: Option<Dictionary>,
}

fn image_stream() -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0, 255, 255, 0],
    )
}

/// One Letter-sized page (MediaBox inherited from `/Pages`) with the given content and resources
pub fn single_page_document(page: PageSpec) -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut resources = dictionary! {
        "Font" => dictionary! {
            "F1" => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            },
        },
    };
    if page.with_image {
        let image_id = doc.add_object(image_stream());
        resources.set("XObject", dictionary! { "Im1" => Object::Reference(image_id) });
    }
    if let Some(properties) = page.properties {
        resources.set("Properties", properties);
    }

    let content_id = doc.add_object(Stream::new(Dictionary::new(), page.content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "Resources" => resources,
        "Contents" => Object::Reference(content_id),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    (doc, page_id)
}

pub fn text(value: &str) -> Object {
    Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
}

/// Object ids of the tagged fixture
#[derive(Debug, Clone, Copy)]
pub struct TaggedIds {
    pub page: ObjectId,
    pub document: ObjectId,
    pub paragraph: ObjectId,
    pub chart: ObjectId,
    pub drawing: ObjectId,
}

pub const TAGGED_CONTENT: &[u8] = b"/P <</MCID 0>> BDC
BT /F1 12 Tf 72 720 Td (Quarterly report) Tj ET
EMC
0.5 g
72 600 468 2 re f
/Figure <</MCID 1>> BDC
q 200 0 0 100 72 450 cm /Im1 Do Q
EMC
/Figure /MC0 BDC
q 1 0 0 1 300 200 cm 0 0 m 100 0 l 100 50 l h S Q
EMC
q 0 0 612 792 re W n Q
";

/// A tagged one-page document: Document > [P, Figure (image), Figure (drawing via MCR)].
/// The drawing has no `/Pg` of its own; only its MCR names the page.
pub fn tagged_document() -> (Document, TaggedIds) {
    let (mut doc, page) = single_page_document(PageSpec {
        content: TAGGED_CONTENT.to_vec(),
        with_image: true,
        properties: Some(dictionary! { "MC0" => dictionary! { "MCID" => 2 } }),
    });

    let root_id = doc.new_object_id();
    let document = doc.new_object_id();
    let paragraph = doc.add_object(dictionary! {
        "Type" => "StructElem",
        "S" => "P",
        "P" => Object::Reference(document),
        "Pg" => Object::Reference(page),
        "K" => 0,
    });
    let chart = doc.add_object(dictionary! {
        "Type" => "StructElem",
        "S" => "Figure",
        "P" => Object::Reference(document),
        "Pg" => Object::Reference(page),
        "Alt" => text("Revenue by quarter"),
        "K" => 1,
    });
    let drawing = doc.add_object(dictionary! {
        "Type" => "StructElem",
        "S" => "Figure",
        "P" => Object::Reference(document),
        "Alt" => text("Signature line"),
        "K" => dictionary! {
            "Type" => "MCR",
            "Pg" => Object::Reference(page),
            "MCID" => 2,
        },
    });
    doc.objects.insert(
        document,
        Object::Dictionary(dictionary! {
            "Type" => "StructElem",
            "S" => "Document",
            "P" => Object::Reference(root_id),
            "Lang" => text("en-US"),
            "K" => vec![
                Object::Reference(paragraph),
                Object::Reference(chart),
                Object::Reference(drawing),
            ],
        }),
    );
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "StructTreeRoot",
            "K" => Object::Reference(document),
        }),
    );

    let catalog_id = match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => *id,
        _ => unreachable!("fixture always has a catalog reference"),
    };
    if let Ok(catalog) = doc.get_dictionary_mut(catalog_id) {
        catalog.set("StructTreeRoot", Object::Reference(root_id));
        catalog.set("MarkInfo", dictionary! { "Marked" => true });
    }

    (
        doc,
        TaggedIds {
            page,
            document,
            paragraph,
            chart,
            drawing,
        },
    )
}

/// Serialize a fixture document
pub fn to_bytes(mut doc: Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
