//! Format trait and section extraction for the markup kinds a document can render to.
//!
//! A format supplies the tree-sitter grammar and heading query for one markup kind (HTML as
//! rendered by the rich-text editor, or Markdown), plus the rules for reading a heading's
//! level and title and the text content of a block. [`extract_sections`] is shared.

pub mod html;
pub mod markdown;

use crate::offsets::{byte_to_char, char_to_byte, len_chars};
use crate::section::Section;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Query, QueryCursor};

/// Markup flavour rendered by an editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MarkupKind {
    /// `<h1>`..`<h6>` and `<p>` blocks.
    #[default]
    Html,
    /// ATX headings (`#`) and blank-line separated paragraphs.
    Markdown,
}

/// Grammar and heading rules for one markup kind.
pub trait Format {
    /// Tree-sitter grammar for the markup.
    fn language(&self) -> tree_sitter::Language;
    /// Query capturing each heading node as `@heading`.
    fn section_query(&self) -> &str;
    /// Heading depth of a captured heading node.
    fn heading_level(&self, node: Node<'_>, src: &str) -> usize;
    /// Heading text with markup removed.
    fn heading_title(&self, node: Node<'_>, src: &str) -> String;
    /// Text content of a block that follows a heading.
    fn block_text(&self, node: Node<'_>, src: &str) -> String;
}

#[must_use]
/// Heading rules for the given markup kind.
pub fn for_kind(kind: MarkupKind) -> Box<dyn Format> {
    match kind {
        MarkupKind::Html => Box::new(html::HtmlFormat),
        MarkupKind::Markdown => Box::new(markdown::MarkdownFormat),
    }
}

/// Collect the sections of `markup`, anchoring each heading in `plain_text`.
///
/// Headings are taken in document order. A section's body is the text of the sibling blocks
/// after its heading that start before the next heading. Heading offsets are found by a
/// sequential scan of `plain_text` that resumes after the previous heading, so a repeated
/// title binds to its own occurrence rather than the first one in the document.
#[must_use]
pub fn extract_sections(format: &dyn Format, markup: &str, plain_text: &str) -> Vec<Section> {
    let language = format.language();
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&language) {
        tracing::warn!("cannot load markup grammar: {e}");
        return Vec::new();
    }
    let Some(tree) = parser.parse(markup, None) else {
        return Vec::new();
    };
    let query = match Query::new(&language, format.section_query()) {
        Ok(query) => query,
        Err(e) => {
            tracing::warn!("invalid section query: {e}");
            return Vec::new();
        }
    };
    let Some(heading_idx) = query.capture_index_for_name("heading") else {
        return Vec::new();
    };

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), markup.as_bytes());
    let mut headings: Vec<Node<'_>> = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index == heading_idx {
                headings.push(capture.node);
            }
        }
    }
    headings.sort_by_key(Node::start_byte);
    headings.dedup_by_key(|node| node.id());

    let mut sections = Vec::with_capacity(headings.len());
    let mut scan_from = 0;

    for (i, heading) in headings.iter().enumerate() {
        let next_start = headings.get(i + 1).map(Node::start_byte);
        let title = format.heading_title(*heading, markup);
        let level = format.heading_level(*heading, markup);

        let mut body_parts = Vec::new();
        let mut sibling = heading.next_named_sibling();
        while let Some(node) = sibling {
            if next_start.is_some_and(|start| node.start_byte() >= start) {
                break;
            }
            let text = format.block_text(node, markup);
            if !text.is_empty() {
                body_parts.push(text);
            }
            sibling = node.next_named_sibling();
        }

        let offset = locate_heading(plain_text, &title, scan_from);
        scan_from = offset + len_chars(&title);

        sections.push(Section {
            title,
            level,
            offset,
            body: body_parts.join("\n"),
        });
    }

    sections
}

/// First occurrence of `title` at or after char `from`, else anywhere, else `from`.
fn locate_heading(plain_text: &str, title: &str, from: usize) -> usize {
    if title.is_empty() {
        return from.min(len_chars(plain_text));
    }
    let start_byte = char_to_byte(plain_text, from).unwrap_or(plain_text.len());
    if let Some(found) = plain_text[start_byte..].find(title) {
        return byte_to_char(plain_text, start_byte + found);
    }
    plain_text
        .find(title)
        .map_or(from.min(len_chars(plain_text)), |found| {
            byte_to_char(plain_text, found)
        })
}

#[cfg(test)]
#[path = "tests/formats.rs"]
mod tests;
