//! Fixture PDFs for the integration tests, built by the same code as the unit test fixtures

#![allow(dead_code)]

#[path = "../../src/test_support.rs"]
mod fixtures;

pub use fixtures::{single_page_document, tagged_document, to_bytes, PageSpec, TaggedIds};

/// The tagged fixture serialized, with the ids of its interesting objects
pub struct Fixture {
    pub bytes: Vec<u8>,
    pub ids: TaggedIds,
}

pub fn tagged_fixture() -> Fixture {
    let (doc, ids) = tagged_document();
    Fixture {
        bytes: to_bytes(doc),
        ids,
    }
}

/// Structure dump of the fixture after artifacts and bounding boxes are patched in
pub fn expected_structure(fixture: &Fixture) -> String {
    format!(
        r#"
<Document obj="{document} 0" Lang="en-US">
  <P obj="{paragraph} 0" Page="1">
    [MCID: 0]
  </P>
  <Figure obj="{chart} 0" Alt="Revenue by quarter" BBox="[72, 450, 272, 550]" Page="1">
    [MCID: 1]
  </Figure>
  <Figure obj="{drawing} 0" Alt="Signature line" BBox="[300, 200, 400, 250]">
    [MCR: MCID=2 PageObj={page} Gen=0 PageNumber=1]
  </Figure>
</Document>
"#,
        document = fixture.ids.document.0,
        paragraph = fixture.ids.paragraph.0,
        chart = fixture.ids.chart.0,
        drawing = fixture.ids.drawing.0,
        page = fixture.ids.page.0,
    )
}

/// Trim every line and drop blank ones
pub fn normalize(dump: &str) -> String {
    dump.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
