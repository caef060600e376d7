//! The document service: the editor adapter, the snapshot cache and the offset-based mutations.
//!
//! UI components and the assistant talk to the document only through this type. Reads either
//! come from the cache (when it is fresh enough) or straight from the editor; writes go through
//! the adapter and schedule a cache refresh, since a programmatic write does not arrive as a
//! user change.

use crate::cache::{DocumentCache, DocumentSnapshot, RefreshOutcome, RefreshPolicy};
use crate::editor::{ChangeEvent, EditorAdapter, EditorHost};
use crate::formats::{for_kind, Format, MarkupKind};
use crate::locator::{find_all, LocateError, Occurrence, QueryMode};
use crate::offsets::{len_chars, slice_chars};
use crate::section::Section;
use std::sync::Arc;
use std::time::Instant;

/// One mounted document with its cache.
pub struct DocumentService<H> {
    adapter: EditorAdapter<H>,
    cache: DocumentCache,
    format: Box<dyn Format>,
    refresh_due: Option<Instant>,
}

impl<H: EditorHost> DocumentService<H> {
    /// Mount `host`; if an editor is already reachable the first snapshot is taken now.
    pub fn new(host: H, markup: MarkupKind, policy: RefreshPolicy) -> Self {
        let mut service = Self {
            adapter: EditorAdapter::new(host),
            cache: DocumentCache::new(policy),
            format: for_kind(markup),
            refresh_due: None,
        };
        if service.adapter.is_ready() {
            service.refresh(false);
        }
        service
    }

    #[must_use]
    /// The editor adapter.
    pub fn adapter(&self) -> &EditorAdapter<H> {
        &self.adapter
    }

    /// The editor adapter, mutably (listener registration, host access).
    pub fn adapter_mut(&mut self) -> &mut EditorAdapter<H> {
        &mut self.adapter
    }

    #[must_use]
    /// The snapshot cache.
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    #[must_use]
    /// Current snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<DocumentSnapshot>> {
        self.cache.snapshot()
    }

    /// Rebuild the snapshot now (subject to the policy unless `force`).
    pub fn refresh(&mut self, force: bool) -> RefreshOutcome {
        self.refresh_at(force, Instant::now())
    }

    /// [`DocumentService::refresh`] at a given time.
    pub fn refresh_at(&mut self, force: bool, now: Instant) -> RefreshOutcome {
        self.cache
            .refresh(&self.adapter, self.format.as_ref(), force, now)
    }

    /// Run due work: scheduled refreshes, deferred section scans, the periodic refresh.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// [`DocumentService::tick`] at a given time.
    pub fn tick_at(&mut self, now: Instant) {
        if self.refresh_due.is_some_and(|due| now >= due) {
            self.refresh_due = None;
            self.refresh_at(false, now);
        }
        self.cache.tick(&self.adapter, self.format.as_ref(), now);
    }

    /// Feed a change observed in the editor: listeners hear about it, user edits refresh the
    /// cache.
    pub fn editor_changed(&mut self, event: &ChangeEvent) {
        self.adapter.notify(event);
        if event.is_user_edit() {
            self.refresh(false);
        }
    }

    #[must_use]
    /// Whether an editor is mounted.
    pub fn is_ready(&self) -> bool {
        self.adapter.is_ready()
    }

    #[must_use]
    /// Document text: the cached copy while it is fresh, the live buffer otherwise.
    pub fn plain_text(&self) -> String {
        let policy = self.cache.policy();
        if self.cache.is_fresh(policy.fresh_max_age, Instant::now()) {
            if let Some(snap) = self.cache.snapshot() {
                return snap.plain_text.clone();
            }
        }
        self.adapter.plain_text()
    }

    #[must_use]
    /// Live text straight from the editor.
    pub fn live_text(&self) -> String {
        self.adapter.plain_text()
    }

    #[must_use]
    /// Live chars `offset..offset + len`, `None` if out of range.
    pub fn live_slice(&self, offset: usize, len: usize) -> Option<String> {
        slice_chars(&self.adapter.plain_text(), offset, len).map(str::to_string)
    }

    #[must_use]
    /// Document markup: cached while fresh, live otherwise.
    pub fn markup(&self) -> String {
        let policy = self.cache.policy();
        if self.cache.is_fresh(policy.fresh_max_age, Instant::now()) {
            if let Some(snap) = self.cache.snapshot() {
                return snap.markup.clone();
            }
        }
        self.adapter.markup()
    }

    #[must_use]
    /// Sections of the current snapshot.
    pub fn sections(&self) -> Vec<Section> {
        self.cache
            .snapshot()
            .map(|snap| snap.sections.clone())
            .unwrap_or_default()
    }

    /// Locate `query` in the live text.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid patterns.
    pub fn find(&self, query: &str, mode: QueryMode) -> Result<Vec<Occurrence>, LocateError> {
        find_all(&self.adapter.plain_text(), query, mode)
    }

    /// Replace `len` chars at `offset` with `new_text`.
    ///
    /// If the insert is refused after the delete went through, the removed text is put back.
    pub fn replace_range(&mut self, offset: usize, len: usize, new_text: &str) -> bool {
        let Some(original) = self.live_slice(offset, len) else {
            tracing::warn!(offset, len, "replace outside the document");
            return false;
        };
        if !self.adapter.delete_range(offset, len) {
            return false;
        }
        if !self.adapter.insert_at(offset, new_text) {
            self.adapter.insert_at(offset, &original);
            return false;
        }
        self.schedule_refresh();
        true
    }

    /// Insert `text` at `offset`.
    pub fn insert_at(&mut self, offset: usize, text: &str) -> bool {
        let done = self.adapter.insert_at(offset, text);
        if done {
            self.schedule_refresh();
        }
        done
    }

    /// Apply a format to a range.
    pub fn format_range(&mut self, offset: usize, len: usize, attribute: &str, value: &str) -> bool {
        let done = self.adapter.format_range(offset, len, attribute, value);
        if done {
            self.schedule_refresh();
        }
        done
    }

    /// Move `source_len` chars at `source_offset` so they land at `dest_offset`.
    ///
    /// `dest_offset` is expressed against the text before the move. The source is removed
    /// first, so a destination after it is shifted left by `source_len`. A destination strictly
    /// inside the source is refused.
    pub fn move_range(&mut self, source_offset: usize, source_len: usize, dest_offset: usize) -> bool {
        let total = len_chars(&self.adapter.plain_text());
        if source_offset + source_len > total || dest_offset > total {
            return false;
        }
        if dest_offset > source_offset && dest_offset < source_offset + source_len {
            return false;
        }
        if source_len == 0 || dest_offset == source_offset || dest_offset == source_offset + source_len {
            return true;
        }
        let Some(moved) = self.live_slice(source_offset, source_len) else {
            return false;
        };
        let target = if dest_offset > source_offset {
            dest_offset - source_len
        } else {
            dest_offset
        };
        self.relocate(source_offset, source_len, target, &moved)
    }

    /// Move a block of text together with the whitespace that separates it from its neighbours.
    ///
    /// The separator is taken from after the block (or before it, for the last block) and put
    /// back between the block and the text it lands next to, so moving `A.` after `C.` in
    /// `A. B. C.` gives `B. C. A.`.
    pub fn move_block(&mut self, source_offset: usize, source_len: usize, dest_offset: usize) -> bool {
        let chars: Vec<char> = self.adapter.plain_text().chars().collect();
        let source_end = source_offset + source_len;
        if source_end > chars.len() || dest_offset > chars.len() {
            return false;
        }
        if dest_offset > source_offset && dest_offset < source_end {
            return false;
        }
        let block: String = chars[source_offset..source_end].iter().collect();
        let trailing = chars[source_end..]
            .iter()
            .take_while(|c| c.is_whitespace())
            .count();
        let leading = chars[..source_offset]
            .iter()
            .rev()
            .take_while(|c| c.is_whitespace())
            .count();

        let (cut_start, cut_len, separator) = if trailing > 0 {
            let sep: String = chars[source_end..source_end + trailing].iter().collect();
            (source_offset, source_len + trailing, sep)
        } else if leading > 0 {
            let sep: String = chars[source_offset - leading..source_offset].iter().collect();
            (source_offset - leading, source_len + leading, sep)
        } else {
            return self.move_range(source_offset, source_len, dest_offset);
        };

        let cut_end = cut_start + cut_len;
        if dest_offset > cut_start && dest_offset < cut_end {
            // Landing inside the block's own separator leaves the text as it is.
            return true;
        }
        if dest_offset >= cut_end {
            let moved = format!("{separator}{block}");
            self.relocate(cut_start, cut_len, dest_offset - cut_len, &moved)
        } else {
            let moved = format!("{block}{separator}");
            self.relocate(cut_start, cut_len, dest_offset, &moved)
        }
    }

    /// Delete `len` chars at `from`, then insert `text` at `to` (post-delete coordinates).
    fn relocate(&mut self, from: usize, len: usize, to: usize, text: &str) -> bool {
        let Some(original) = self.live_slice(from, len) else {
            return false;
        };
        if !self.adapter.delete_range(from, len) {
            return false;
        }
        if !self.adapter.insert_at(to, text) {
            self.adapter.insert_at(from, &original);
            return false;
        }
        self.schedule_refresh();
        true
    }

    fn schedule_refresh(&mut self) {
        let delay = self.cache.policy().section_scan_delay;
        if self.refresh_due.is_none() {
            self.refresh_due = Some(Instant::now() + delay);
        }
    }
}

#[cfg(test)]
#[path = "tests/service.rs"]
mod tests;
