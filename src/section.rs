//! Section representation for headings found in a document snapshot.
//!
//! A section is what a heading introduces: its title, its depth and the text of the
//! elements that follow it until the next heading. Offsets point into the plain text of
//! the snapshot the section was extracted from and are meaningless against any other.

#[derive(Clone, Debug, PartialEq, Eq)]
/// Heading-derived division of a document, anchored in the snapshot's plain text.
pub struct Section {
    /// Heading text without markup.
    pub title: String,
    /// Heading depth (1 for `h1`/`#`).
    pub level: usize,
    /// Char index into the snapshot's plain text where the heading text begins.
    pub offset: usize,
    /// Text of the sibling elements following the heading, up to the next heading.
    pub body: String,
}

impl Section {
    #[must_use]
    /// Char index just past the heading text.
    pub fn title_end(&self) -> usize {
        self.offset + self.title.chars().count()
    }
}
