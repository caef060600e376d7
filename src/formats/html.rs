//! HTML format implementation using tree-sitter-html.
//!
//! Rich-text editors render their buffer as a flat run of block elements, so headings are the
//! `h1`-`h6` elements and the text of any element is its inner markup with inline tags removed
//! and the escapes the editor writes decoded.

use crate::formats::Format;
use regex::Regex;
use std::sync::LazyLock;
use tree_sitter::Node;

static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

/// Tree-sitter queries for `h1`..`h6` elements.
pub struct HtmlFormat;

impl Format for HtmlFormat {
    fn language(&self) -> tree_sitter::Language {
        tree_sitter_html::LANGUAGE.into()
    }

    fn section_query(&self) -> &'static str {
        r#"(element (start_tag (tag_name) @tag (#match? @tag "^[hH][1-6]$"))) @heading"#
    }

    fn heading_level(&self, node: Node<'_>, src: &str) -> usize {
        child_of_kind(node, "start_tag")
            .and_then(|tag| child_of_kind(tag, "tag_name"))
            .and_then(|name| src.get(name.start_byte()..name.end_byte()))
            .and_then(|name| name.get(1..))
            .and_then(|digit| digit.parse().ok())
            .unwrap_or(1)
    }

    fn heading_title(&self, node: Node<'_>, src: &str) -> String {
        element_text(node, src)
    }

    fn block_text(&self, node: Node<'_>, src: &str) -> String {
        match node.kind() {
            "element" => element_text(node, src),
            "text" | "entity" => decode_entities(&src[node.start_byte()..node.end_byte()])
                .trim()
                .to_string(),
            _ => String::new(),
        }
    }
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Inner text of an element: everything between its start and end tags, tags stripped.
fn element_text(node: Node<'_>, src: &str) -> String {
    let inner_start = child_of_kind(node, "start_tag").map_or(node.start_byte(), |t| t.end_byte());
    let inner_end = child_of_kind(node, "end_tag").map_or(node.end_byte(), |t| t.start_byte());
    let Some(inner) = src.get(inner_start..inner_end.max(inner_start)) else {
        return String::new();
    };
    let stripped = INLINE_TAG.replace_all(inner, "");
    decode_entities(&stripped).trim().to_string()
}

#[must_use]
/// Escape the characters that cannot appear literally in element text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[must_use]
/// Reverse of [`escape`], plus the non-breaking space editors like to emit.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}
