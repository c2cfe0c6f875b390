//! Indented XML-like dump of a structure tree

use std::fmt::Write;

use super::{StructElement, StructNode, StructTree};

const INDENT: &str = "  ";

/// Render every top-level kid, two spaces per nesting level
pub fn render(tree: &StructTree) -> String {
    let mut out = String::new();
    for kid in &tree.kids {
        render_node(&mut out, kid, 0);
    }
    out
}

fn render_node(out: &mut String, node: &StructNode, level: usize) {
    if let StructNode::Element(element) = node {
        render_element(out, element, level);
        return;
    }

    out.push_str(&INDENT.repeat(level));
    // Writing to a String cannot fail
    let _ = match node {
        StructNode::Mcid(mcid) => writeln!(out, "[MCID: {}]", mcid),
        StructNode::Mcr {
            mcid,
            page,
            page_number,
        } => {
            let (num, gen) = page.map(|(n, g)| (n as i64, g as i64)).unwrap_or((-1, -1));
            let _ = write!(out, "[MCR: MCID={} PageObj={} Gen={}", mcid, num, gen);
            if let Some(number) = page_number {
                let _ = write!(out, " PageNumber={}", number);
            }
            writeln!(out, "]")
        }
        StructNode::Objr { object } => match object {
            Some((num, gen)) => writeln!(out, "[OBJR: obj={} {}]", num, gen),
            None => writeln!(out, "[OBJR: obj=null]"),
        },
        StructNode::Stream { length } => writeln!(out, "[Stream: length={}]", length),
        StructNode::Unknown(type_name) => writeln!(out, "[Unhandled type: {}]", type_name),
        StructNode::Element(_) => Ok(()),
    };
}

fn render_element(out: &mut String, element: &StructElement, level: usize) {
    let indent = INDENT.repeat(level);
    let tag = escape(&element.tag);

    let mut open = format!("{}<{}", indent, tag);
    if let Some((num, gen)) = element.id {
        let _ = write!(open, " obj=\"{} {}\"", num, gen);
    }
    let texts = [
        ("Alt", &element.alt),
        ("ActualText", &element.actual_text),
        ("Title", &element.title),
        ("Lang", &element.lang),
        ("ID", &element.element_id),
    ];
    for (name, value) in texts {
        if let Some(value) = value {
            attribute(&mut open, name, value);
        }
    }
    if let Some(classes) = &element.classes {
        attribute(&mut open, "Class", &classes.join(" "));
    }
    if let Some(bbox) = &element.bbox {
        let items: Vec<String> = bbox
            .iter()
            .map(|v| v.map(format_number).unwrap_or_default())
            .collect();
        attribute(&mut open, "BBox", &items.join(" "));
    }
    if let Some(bbox) = &element.layout_bbox {
        let items: Vec<String> = bbox.iter().copied().map(format_number).collect();
        attribute(&mut open, "BBox", &format!("[{}]", items.join(", ")));
    }
    if let Some(artifact_type) = &element.artifact_type {
        attribute(&mut open, "ArtifactType", artifact_type);
    }
    if let Some(namespace) = &element.namespace {
        attribute(&mut open, "NS", namespace);
    }
    if let Some(role) = &element.role {
        attribute(&mut open, "Role", role);
    }
    if let Some(page) = element.page_number {
        let _ = write!(open, " Page=\"{}\"", page);
    }
    open.push_str(">\n");
    out.push_str(&open);

    for child in &element.children {
        render_node(out, child, level + 1);
    }

    let _ = writeln!(out, "{}</{}>", indent, tag);
}

fn attribute(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {}=\"{}\"", name, escape(value));
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Six significant digits, trailing zeros dropped, like C's `%g`
pub fn format_number(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_finite() { "0".to_string() } else { value.to_string() };
    }

    let exponent = value.abs().log10().floor() as i32;
    if !(-4..6).contains(&exponent) {
        let formatted = format!("{:.5e}", value);
        let (mantissa, exp) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs());
    }

    let decimals = (5 - exponent).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}
