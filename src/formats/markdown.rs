//! Markdown format implementation using tree-sitter-md.
//!
//! This module provides tree-sitter queries for parsing markdown documents
//! and extracting section structure from ATX-style headings (# syntax).

use crate::formats::Format;
use tree_sitter::Node;

/// Tree-sitter queries for ATX-style markdown headings (# syntax).
pub struct MarkdownFormat;

impl Format for MarkdownFormat {
    fn language(&self) -> tree_sitter::Language {
        tree_sitter_md::LANGUAGE.into()
    }

    fn section_query(&self) -> &'static str {
        "(atx_heading) @heading"
    }

    fn heading_level(&self, node: Node<'_>, _src: &str) -> usize {
        let mut cursor = node.walk();
        let level = node
            .children(&mut cursor)
            .find_map(|child| {
                child
                    .kind()
                    .strip_prefix("atx_h")
                    .and_then(|rest| rest.strip_suffix("_marker"))
                    .and_then(|digit| digit.parse().ok())
            })
            .unwrap_or(1);
        level
    }

    fn heading_title(&self, node: Node<'_>, src: &str) -> String {
        let mut cursor = node.walk();
        let inline = node
            .children(&mut cursor)
            .find(|child| child.kind() == "inline");
        inline
            .and_then(|n| src.get(n.start_byte()..n.end_byte()))
            .map(|title| title.trim().to_string())
            .unwrap_or_default()
    }

    fn block_text(&self, node: Node<'_>, src: &str) -> String {
        src.get(node.start_byte()..node.end_byte())
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    }
}
