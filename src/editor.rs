//! The editor adapter: one contract over however the rich-text editor is exposed.
//!
//! The UI mounts an editor and hands us an [`EditorHost`]. Depending on how the editor was
//! wired, its structured API is reachable directly, through a nested property, or not at all,
//! in which case only the rendered text nodes are. [`EditorAdapter`] probes those access paths
//! in rank order and presents the rest of the core with plain-text reads and offset-based
//! writes that never fail hard: reads degrade to empty strings and writes to `false`.
//!
//! Offsets are char indices into the plain text, never byte offsets into the markup.

use crate::formats::html::escape;
use crate::offsets::len_chars;
use thiserror::Error;

/// Rejections from an editor's structured API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    /// The range does not fit inside the document.
    #[error("range {offset}..{end} is outside the document ({len} chars)")]
    OutOfRange {
        /// Requested start.
        offset: usize,
        /// Requested end (exclusive).
        end: usize,
        /// Document length in chars.
        len: usize,
    },
    /// The editor has no such format.
    #[error("attribute `{0}` is not supported")]
    UnsupportedAttribute(String),
    /// The editor refused the change for its own reasons.
    #[error("editor rejected the change: {0}")]
    Rejected(String),
}

/// Ways the editor can be reached, in the order they are tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessPath {
    /// The host is (or directly holds) the editor.
    Direct,
    /// The editor hangs off a property of the host.
    Nested,
    /// Only the rendered text nodes are reachable.
    TextNodes,
}

const RANKED_PATHS: [AccessPath; 3] = [AccessPath::Direct, AccessPath::Nested, AccessPath::TextNodes];

/// Structured editing API of a rich-text editor.
pub trait RichTextEditor {
    /// Full plain text of the buffer.
    fn text(&self) -> String;
    /// Full rendered markup of the buffer.
    fn markup(&self) -> String;
    /// Remove `len` chars starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error when the editor rejects the range.
    fn delete_text(&mut self, offset: usize, len: usize) -> Result<(), EditError>;
    /// Insert `text` before the char at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error when the editor rejects the offset.
    fn insert_text(&mut self, offset: usize, text: &str) -> Result<(), EditError>;
    /// Apply `attribute = value` to a range; an empty or `"false"` value clears it.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown attributes or out-of-range offsets.
    fn format_text(
        &mut self,
        offset: usize,
        len: usize,
        attribute: &str,
        value: &str,
    ) -> Result<(), EditError>;
}

/// The rendered text nodes of an editor, one per block, in document order.
///
/// Blocks are separated by a single newline in the plain text.
pub trait TextNodeTree {
    /// Text of every node.
    fn nodes(&self) -> Vec<String>;
    /// Replace chars `start..end` of node `node` with `text`.
    fn splice_node(&mut self, node: usize, start: usize, end: usize, text: &str) -> bool;
}

/// The mounted editor as the UI exposes it.
///
/// Every accessor defaults to "not available"; hosts override the ones they can serve.
pub trait EditorHost {
    /// Structured editor reachable through `path`.
    fn editor(&self, _path: AccessPath) -> Option<&dyn RichTextEditor> {
        None
    }
    /// Mutable structured editor reachable through `path`.
    fn editor_mut(&mut self, _path: AccessPath) -> Option<&mut dyn RichTextEditor> {
        None
    }
    /// Rendered text nodes.
    fn text_nodes(&self) -> Option<&dyn TextNodeTree> {
        None
    }
    /// Mutable rendered text nodes.
    fn text_nodes_mut(&mut self) -> Option<&mut dyn TextNodeTree> {
        None
    }
    /// Called after the adapter changed the buffer.
    fn after_change(&mut self) {}
}

/// Who caused a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeSource {
    /// Typing, pasting, anything the user did in the editor.
    User,
    /// A programmatic write through the adapter.
    Api,
    /// Changes that should not be observed (loading a document).
    Silent,
}

/// What a change touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Text was removed and/or inserted.
    Text,
    /// Formatting changed; the text did not.
    Format,
}

/// Change notification delivered to [`EditorAdapter::on_change`] listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Origin of the change.
    pub source: ChangeSource,
    /// Text or formatting.
    pub kind: ChangeKind,
    /// Char offset where the change starts.
    pub offset: usize,
    /// Chars removed (or formatted, for [`ChangeKind::Format`]).
    pub removed: usize,
    /// Chars inserted.
    pub inserted: usize,
}

impl ChangeEvent {
    #[must_use]
    /// Whether this change should invalidate cached derived state.
    pub fn is_user_edit(&self) -> bool {
        self.source == ChangeSource::User
    }
}

/// Handle returned by [`EditorAdapter::on_change`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&ChangeEvent)>;

/// Uniform, fail-soft access to the mounted editor.
pub struct EditorAdapter<H> {
    host: H,
    resolved: Option<AccessPath>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl<H: EditorHost> EditorAdapter<H> {
    /// Wrap a host, resolving the best available access path.
    pub fn new(host: H) -> Self {
        let mut adapter = Self {
            host,
            resolved: None,
            listeners: Vec::new(),
            next_listener: 0,
        };
        adapter.resolve();
        adapter
    }

    /// Re-probe the host, e.g. after the UI swapped the editor out.
    pub fn resolve(&mut self) -> Option<AccessPath> {
        self.resolved = RANKED_PATHS
            .into_iter()
            .find(|path| probe(&self.host, *path));
        match self.resolved {
            Some(path) => tracing::debug!(?path, "editor resolved"),
            None => tracing::debug!("no editor mounted"),
        }
        self.resolved
    }

    #[must_use]
    /// Access path currently in use, falling down the ranking if the resolved one vanished.
    pub fn access_path(&self) -> Option<AccessPath> {
        match self.resolved {
            Some(path) if probe(&self.host, path) => Some(path),
            _ => RANKED_PATHS
                .into_iter()
                .find(|path| probe(&self.host, *path)),
        }
    }

    #[must_use]
    /// True iff some access path reaches an editor.
    pub fn is_ready(&self) -> bool {
        self.access_path().is_some()
    }

    #[must_use]
    /// The wrapped host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The wrapped host, mutably. Call [`EditorAdapter::resolve`] after swapping editors.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Live plain text, or an empty string when nothing is mounted.
    #[must_use]
    pub fn plain_text(&self) -> String {
        match self.access_path() {
            Some(path @ (AccessPath::Direct | AccessPath::Nested)) => self
                .host
                .editor(path)
                .map(|editor| editor.text())
                .unwrap_or_default(),
            Some(AccessPath::TextNodes) => self
                .host
                .text_nodes()
                .map(|nodes| nodes.nodes().join("\n"))
                .unwrap_or_default(),
            None => {
                tracing::warn!("plain text requested with no editor mounted");
                String::new()
            }
        }
    }

    /// Live markup, or an empty string when nothing is mounted.
    #[must_use]
    pub fn markup(&self) -> String {
        match self.access_path() {
            Some(path @ (AccessPath::Direct | AccessPath::Nested)) => self
                .host
                .editor(path)
                .map(|editor| editor.markup())
                .unwrap_or_default(),
            Some(AccessPath::TextNodes) => self
                .host
                .text_nodes()
                .map(|nodes| {
                    nodes
                        .nodes()
                        .iter()
                        .map(|node| format!("<p>{}</p>", escape(node)))
                        .collect::<String>()
                })
                .unwrap_or_default(),
            None => {
                tracing::warn!("markup requested with no editor mounted");
                String::new()
            }
        }
    }

    /// Remove `len` chars at `offset`.
    pub fn delete_range(&mut self, offset: usize, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        let done = match self.structured(|editor| editor.delete_text(offset, len)) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!("structured delete failed, walking text nodes: {e}");
                self.splice_nodes(offset, len, "")
            }
            None => self.splice_nodes(offset, len, ""),
        };
        if done {
            self.changed(ChangeKind::Text, offset, len, 0);
        } else {
            tracing::warn!(offset, len, "delete failed");
        }
        done
    }

    /// Insert `text` at `offset`.
    pub fn insert_at(&mut self, offset: usize, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        let done = match self.structured(|editor| editor.insert_text(offset, text)) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!("structured insert failed, walking text nodes: {e}");
                self.splice_nodes(offset, 0, text)
            }
            None => self.splice_nodes(offset, 0, text),
        };
        if done {
            self.changed(ChangeKind::Text, offset, 0, len_chars(text));
        } else {
            tracing::warn!(offset, "insert failed");
        }
        done
    }

    /// Apply a format to a range. Text nodes carry no formatting, so there is no fallback.
    pub fn format_range(&mut self, offset: usize, len: usize, attribute: &str, value: &str) -> bool {
        match self.structured(|editor| editor.format_text(offset, len, attribute, value)) {
            Some(Ok(())) => {
                self.changed(ChangeKind::Format, offset, len, 0);
                true
            }
            Some(Err(e)) => {
                tracing::warn!("format `{attribute}` failed: {e}");
                false
            }
            None => {
                tracing::warn!("format `{attribute}` needs the structured editor");
                false
            }
        }
    }

    /// Subscribe to change notifications.
    pub fn on_change(&mut self, callback: impl FnMut(&ChangeEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(callback)));
        id
    }

    /// Unsubscribe; returns whether the listener existed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    /// Deliver a change observed outside the adapter (user typing) to the listeners.
    pub fn notify(&mut self, event: &ChangeEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    fn changed(&mut self, kind: ChangeKind, offset: usize, removed: usize, inserted: usize) {
        self.host.after_change();
        let event = ChangeEvent {
            source: ChangeSource::Api,
            kind,
            offset,
            removed,
            inserted,
        };
        self.notify(&event);
    }

    fn structured<T>(&mut self, op: impl FnOnce(&mut dyn RichTextEditor) -> T) -> Option<T> {
        let path = self.access_path()?;
        match path {
            AccessPath::Direct | AccessPath::Nested => self.host.editor_mut(path).map(op),
            AccessPath::TextNodes => None,
        }
    }

    /// Last-resort write: find the node holding the range by accumulating node lengths, then
    /// splice inside that node. Ranges spanning several nodes are refused.
    fn splice_nodes(&mut self, offset: usize, len: usize, text: &str) -> bool {
        let Some(tree) = self.host.text_nodes_mut() else {
            return false;
        };
        let nodes = tree.nodes();
        let Some((node, local)) = locate_in_nodes(&nodes, offset) else {
            return false;
        };
        if local + len > len_chars(&nodes[node]) {
            return false;
        }
        tree.splice_node(node, local, local + len, text)
    }
}

fn probe<H: EditorHost>(host: &H, path: AccessPath) -> bool {
    match path {
        AccessPath::Direct | AccessPath::Nested => host.editor(path).is_some(),
        AccessPath::TextNodes => host.text_nodes().is_some(),
    }
}

/// Node index and node-local char offset for a document offset.
fn locate_in_nodes(nodes: &[String], offset: usize) -> Option<(usize, usize)> {
    let mut seen = 0;
    for (i, node) in nodes.iter().enumerate() {
        let len = len_chars(node);
        if offset <= seen + len {
            return Some((i, offset - seen));
        }
        seen += len + 1;
    }
    None
}

#[cfg(test)]
#[path = "tests/editor.rs"]
mod tests;
