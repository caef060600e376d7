//! In-process rich-text buffer: plain text, per-line block formats and inline format spans.
//!
//! This is the editor the terminal front end mounts and the one the tests drive. It speaks the
//! same structured API a browser editor does (text, markup, delete/insert/format by char
//! offset) and renders its content as HTML or Markdown. Formats follow the text through edits:
//! inline spans shift and shrink with insertions and deletions, block formats (headings)
//! belong to lines and are merged or split with them.

use crate::editor::{
    AccessPath, ChangeEvent, ChangeKind, ChangeSource, EditError, EditorHost, RichTextEditor,
    TextNodeTree,
};
use crate::formats::html::escape;
use crate::formats::MarkupKind;
use crate::offsets::{char_to_byte, len_chars};
use std::collections::BTreeSet;

/// Formats the buffer understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    /// Block heading, value is the level `1`..`6`.
    Header,
    /// Inline bold.
    Bold,
    /// Inline italic.
    Italic,
    /// Inline underline.
    Underline,
    /// Inline strike-through.
    Strike,
    /// Inline highlight.
    Background,
}

impl Attribute {
    /// Parse the attribute names browser editors use.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "header" | "heading" => Some(Self::Header),
            "bold" | "strong" => Some(Self::Bold),
            "italic" | "em" => Some(Self::Italic),
            "underline" => Some(Self::Underline),
            "strike" => Some(Self::Strike),
            "background" | "highlight" => Some(Self::Background),
            _ => None,
        }
    }

    fn html_tag(self) -> &'static str {
        match self {
            Self::Header => "h1",
            Self::Bold => "strong",
            Self::Italic => "em",
            Self::Underline => "u",
            Self::Strike => "s",
            Self::Background => "mark",
        }
    }

    fn markdown_marker(self) -> &'static str {
        match self {
            Self::Bold => "**",
            Self::Italic => "*",
            Self::Strike => "~~",
            Self::Header | Self::Underline | Self::Background => "",
        }
    }
}

/// Inline format applied to chars `start..start + len`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatSpan {
    /// First formatted char.
    pub start: usize,
    /// Number of formatted chars.
    pub len: usize,
    /// Which format.
    pub attribute: Attribute,
}

impl FormatSpan {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Rich-text buffer with HTML or Markdown rendering.
#[derive(Clone, Debug)]
pub struct RichBuffer {
    text: String,
    /// Heading level per line, `None` for paragraphs.
    blocks: Vec<Option<u8>>,
    spans: Vec<FormatSpan>,
    kind: MarkupKind,
}

impl RichBuffer {
    #[must_use]
    /// Unformatted buffer holding `text`.
    pub fn from_plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            blocks: vec![None; text.split('\n').count()],
            spans: Vec::new(),
            kind: MarkupKind::Html,
        }
    }

    #[must_use]
    /// Buffer from Markdown source: ATX heading lines become header-formatted lines.
    pub fn from_markdown(src: &str) -> Self {
        let mut lines = Vec::new();
        let mut blocks = Vec::new();
        for line in src.split('\n') {
            let hashes = line.chars().take_while(|c| *c == '#').count();
            let rest = &line[hashes..];
            if (1..=6).contains(&hashes) && (rest.starts_with(' ') || rest.is_empty()) {
                lines.push(rest.trim().to_string());
                blocks.push(u8::try_from(hashes).ok());
            } else {
                lines.push(line.to_string());
                blocks.push(None);
            }
        }
        Self {
            text: lines.join("\n"),
            blocks,
            spans: Vec::new(),
            kind: MarkupKind::Html,
        }
    }

    #[must_use]
    /// Render to the given markup kind from now on.
    pub fn with_markup(mut self, kind: MarkupKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    /// Markup kind this buffer renders.
    pub fn markup_kind(&self) -> MarkupKind {
        self.kind
    }

    #[must_use]
    /// Plain text, borrowed.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    /// Heading level of each line.
    pub fn blocks(&self) -> &[Option<u8>] {
        &self.blocks
    }

    #[must_use]
    /// Inline format spans.
    pub fn spans(&self) -> &[FormatSpan] {
        &self.spans
    }

    #[must_use]
    /// Render as HTML: one `<hN>`/`<p>` element per line with nested inline tags.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let mut line_start = 0;
        for (row, line) in self.text.split('\n').enumerate() {
            let tag = match self.blocks.get(row).copied().flatten() {
                Some(level) => format!("h{level}"),
                None => "p".to_string(),
            };
            let inner = self.render_inline(line, line_start, |attr, open| {
                if open {
                    format!("<{}>", attr.html_tag())
                } else {
                    format!("</{}>", attr.html_tag())
                }
            }, escape);
            if inner.is_empty() {
                out.push_str(&format!("<{tag}><br></{tag}>"));
            } else {
                out.push_str(&format!("<{tag}>{inner}</{tag}>"));
            }
            line_start += len_chars(line) + 1;
        }
        out
    }

    #[must_use]
    /// Render as Markdown: `#` headings, `**`/`*`/`~~` inline markers.
    pub fn to_markdown(&self) -> String {
        let mut lines = Vec::new();
        let mut line_start = 0;
        for (row, line) in self.text.split('\n').enumerate() {
            let inner = self.render_inline(
                line,
                line_start,
                |attr, _| attr.markdown_marker().to_string(),
                str::to_string,
            );
            match self.blocks.get(row).copied().flatten() {
                Some(level) => lines.push(format!("{} {inner}", "#".repeat(usize::from(level)))),
                None => lines.push(inner),
            }
            line_start += len_chars(line) + 1;
        }
        lines.join("\n")
    }

    /// Render one line, reopening inline tags whenever the active format set changes.
    fn render_inline(
        &self,
        line: &str,
        line_start: usize,
        tag: impl Fn(Attribute, bool) -> String,
        text: impl Fn(&str) -> String,
    ) -> String {
        let mut out = String::new();
        let mut open: Vec<Attribute> = Vec::new();
        let mut run = String::new();
        for (i, c) in line.chars().enumerate() {
            let pos = line_start + i;
            let active: Vec<Attribute> = self
                .spans
                .iter()
                .filter(|span| span.start <= pos && pos < span.end())
                .map(|span| span.attribute)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if active != open {
                out.push_str(&text(&run));
                run.clear();
                for attr in open.iter().rev() {
                    out.push_str(&tag(*attr, false));
                }
                for attr in &active {
                    out.push_str(&tag(*attr, true));
                }
                open = active;
            }
            run.push(c);
        }
        out.push_str(&text(&run));
        for attr in open.iter().rev() {
            out.push_str(&tag(*attr, false));
        }
        out
    }

    /// Line index containing char `offset`.
    fn row_of(&self, offset: usize) -> usize {
        self.text.chars().take(offset).filter(|c| *c == '\n').count()
    }

    /// Char range `start..end` of line `row` (end excludes the newline).
    fn row_range(&self, row: usize) -> (usize, usize) {
        let mut start = 0;
        for (i, line) in self.text.split('\n').enumerate() {
            let len = len_chars(line);
            if i == row {
                return (start, start + len);
            }
            start += len + 1;
        }
        (start, start)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(usize, usize), EditError> {
        let total = len_chars(&self.text);
        let end = offset.saturating_add(len);
        if end > total {
            return Err(EditError::OutOfRange {
                offset,
                end,
                len: total,
            });
        }
        let from = char_to_byte(&self.text, offset).unwrap_or(self.text.len());
        let to = char_to_byte(&self.text, end).unwrap_or(self.text.len());
        Ok((from, to))
    }

    fn remove(&mut self, offset: usize, len: usize) -> Result<(), EditError> {
        let (from, to) = self.check_range(offset, len)?;
        let first_row = self.row_of(offset);
        let merged_rows = self.text[from..to].matches('\n').count();
        self.text.replace_range(from..to, "");
        if merged_rows > 0 {
            let last = (first_row + merged_rows).min(self.blocks.len().saturating_sub(1));
            if first_row < last {
                self.blocks.drain(first_row + 1..=last);
            }
        }

        let end = offset + len;
        let map = |pos: usize| {
            if pos <= offset {
                pos
            } else if pos >= end {
                pos - len
            } else {
                offset
            }
        };
        for span in &mut self.spans {
            let start = map(span.start);
            let stop = map(span.end());
            span.start = start;
            span.len = stop - start;
        }
        self.spans.retain(|span| span.len > 0);
        Ok(())
    }

    fn add(&mut self, offset: usize, text: &str) -> Result<(), EditError> {
        let (at, _) = self.check_range(offset, 0)?;
        let row = self.row_of(offset);
        let new_rows = text.matches('\n').count();
        self.text.insert_str(at, text);
        let insert_at = (row + 1).min(self.blocks.len());
        for _ in 0..new_rows {
            self.blocks.insert(insert_at, None);
        }

        let n = len_chars(text);
        for span in &mut self.spans {
            if offset <= span.start {
                span.start += n;
            } else if offset < span.end() {
                span.len += n;
            }
        }
        Ok(())
    }

    fn clear_inline(&mut self, start: usize, end: usize, attribute: Attribute) {
        let mut kept = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            if span.attribute != attribute || span.end() <= start || span.start >= end {
                kept.push(span);
                continue;
            }
            if span.start < start {
                kept.push(FormatSpan {
                    start: span.start,
                    len: start - span.start,
                    attribute,
                });
            }
            if span.end() > end {
                kept.push(FormatSpan {
                    start: end,
                    len: span.end() - end,
                    attribute,
                });
            }
        }
        self.spans = kept;
    }

    /// Replace the whole text with `new_text`, keeping formats attached to the unchanged
    /// prefix and suffix. Returns the change as a user edit, or `None` if nothing differs.
    pub fn sync_text(&mut self, new_text: &str) -> Option<ChangeEvent> {
        if new_text == self.text {
            return None;
        }
        let old: Vec<char> = self.text.chars().collect();
        let new: Vec<char> = new_text.chars().collect();
        let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        let removed = old.len() - prefix - suffix;
        let inserted: String = new[prefix..new.len() - suffix].iter().collect();

        if self.remove(prefix, removed).is_err() || self.add(prefix, &inserted).is_err() {
            *self = Self::from_plain(new_text).with_markup(self.kind);
        }
        Some(ChangeEvent {
            source: ChangeSource::User,
            kind: ChangeKind::Text,
            offset: prefix,
            removed,
            inserted: len_chars(&inserted),
        })
    }
}

impl RichTextEditor for RichBuffer {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn markup(&self) -> String {
        match self.kind {
            MarkupKind::Html => self.to_html(),
            MarkupKind::Markdown => self.to_markdown(),
        }
    }

    fn delete_text(&mut self, offset: usize, len: usize) -> Result<(), EditError> {
        self.remove(offset, len)
    }

    fn insert_text(&mut self, offset: usize, text: &str) -> Result<(), EditError> {
        self.add(offset, text)
    }

    fn format_text(
        &mut self,
        offset: usize,
        len: usize,
        attribute: &str,
        value: &str,
    ) -> Result<(), EditError> {
        let attr = Attribute::parse(attribute)
            .ok_or_else(|| EditError::UnsupportedAttribute(attribute.to_string()))?;
        self.check_range(offset, len)?;
        let clear = value.is_empty() || value == "false";

        if attr == Attribute::Header {
            let level = if clear {
                None
            } else {
                let level: u8 = value
                    .parse()
                    .map_err(|_| EditError::Rejected(format!("invalid heading level `{value}`")))?;
                if !(1..=6).contains(&level) {
                    return Err(EditError::Rejected(format!("invalid heading level `{value}`")));
                }
                Some(level)
            };
            let first = self.row_of(offset);
            let last = self.row_of(if len == 0 { offset } else { offset + len - 1 });
            for row in first..=last {
                if let Some(block) = self.blocks.get_mut(row) {
                    *block = level;
                }
            }
            return Ok(());
        }

        let end = offset + len;
        self.clear_inline(offset, end, attr);
        if !clear && len > 0 {
            self.spans.push(FormatSpan {
                start: offset,
                len,
                attribute: attr,
            });
            self.spans.sort_by_key(|span| (span.start, span.attribute));
        }
        Ok(())
    }
}

impl TextNodeTree for RichBuffer {
    fn nodes(&self) -> Vec<String> {
        self.text.split('\n').map(str::to_string).collect()
    }

    fn splice_node(&mut self, node: usize, start: usize, end: usize, text: &str) -> bool {
        if end < start {
            return false;
        }
        let (node_start, node_end) = self.row_range(node);
        if node_start + end > node_end {
            return false;
        }
        self.remove(node_start + start, end - start).is_ok()
            && self.add(node_start + start, text).is_ok()
    }
}

impl EditorHost for RichBuffer {
    fn editor(&self, path: AccessPath) -> Option<&dyn RichTextEditor> {
        match path {
            AccessPath::Direct => Some(self),
            AccessPath::Nested | AccessPath::TextNodes => None,
        }
    }

    fn editor_mut(&mut self, path: AccessPath) -> Option<&mut dyn RichTextEditor> {
        match path {
            AccessPath::Direct => Some(self),
            AccessPath::Nested | AccessPath::TextNodes => None,
        }
    }

    fn text_nodes(&self) -> Option<&dyn TextNodeTree> {
        Some(self)
    }

    fn text_nodes_mut(&mut self) -> Option<&mut dyn TextNodeTree> {
        Some(self)
    }
}

#[cfg(test)]
#[path = "tests/buffer.rs"]
mod tests;
