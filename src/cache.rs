//! Cached snapshot of the document and the policy deciding when to rebuild it.
//!
//! Reading the markup and plain text back from the editor is cheap; scanning the markup for
//! headings is not. The cache therefore tolerates staleness in proportion to document size and
//! edit magnitude, and a forced refresh splits the work: text and markup are replaced at once
//! while the section scan is deferred to the next [`DocumentCache::tick`] after a short delay.
//!
//! Time is always passed in, so every decision here can be replayed in tests.

use crate::config::Config;
use crate::editor::{EditorAdapter, EditorHost};
use crate::formats::{extract_sections, Format};
use crate::offsets::len_chars;
use crate::section::Section;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Immutable point-in-time copy of the document.
#[derive(Clone, Debug)]
pub struct DocumentSnapshot {
    /// Full rendered markup.
    pub markup: String,
    /// Flattened text; every offset in the core refers to this.
    pub plain_text: String,
    /// When the markup and text were read.
    pub captured_at: Instant,
    /// Heading-derived sections, anchored in `plain_text`.
    pub sections: Vec<Section>,
    /// The sections were carried over from an older snapshot and a rescan is pending.
    pub sections_stale: bool,
}

/// Thresholds steering the cache.
#[derive(Clone, Debug, PartialEq)]
pub struct RefreshPolicy {
    /// Documents longer than this many chars are only rescanned every `large_doc_interval`.
    pub large_doc_chars: usize,
    /// Minimum snapshot age before a large document is rescanned.
    pub large_doc_interval: Duration,
    /// Size changes below this fraction of the cached size count as small.
    pub small_delta_ratio: f64,
    /// Minimum snapshot age before a small change triggers a rescan.
    pub small_delta_interval: Duration,
    /// Readers serve the cached text while the snapshot is younger than this.
    pub fresh_max_age: Duration,
    /// Delay between a forced refresh and its section scan.
    pub section_scan_delay: Duration,
    /// Safety-net refresh period.
    pub periodic_interval: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            large_doc_chars: 10_000,
            large_doc_interval: Duration::from_secs(15),
            small_delta_ratio: 0.02,
            small_delta_interval: Duration::from_secs(20),
            fresh_max_age: Duration::from_secs(5),
            section_scan_delay: Duration::from_millis(50),
            periodic_interval: Duration::from_secs(120),
        }
    }
}

impl RefreshPolicy {
    #[must_use]
    /// Thresholds from the loaded configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            large_doc_chars: cfg.large_doc_chars,
            large_doc_interval: Duration::from_secs(cfg.large_doc_interval_secs),
            small_delta_ratio: f64::from(cfg.small_delta_percent) / 100.0,
            small_delta_interval: Duration::from_secs(cfg.small_delta_interval_secs),
            fresh_max_age: Duration::from_millis(cfg.fresh_max_age_ms),
            section_scan_delay: Duration::from_millis(cfg.section_scan_delay_ms),
            periodic_interval: Duration::from_secs(cfg.periodic_refresh_secs),
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    /// Whether a non-forced refresh should rebuild the snapshot.
    ///
    /// `doc_size` is the cached plain-text length, `size_delta` the absolute difference
    /// between it and the live length.
    pub fn should_refresh(&self, snapshot_age: Duration, size_delta: usize, doc_size: usize) -> bool {
        if doc_size > self.large_doc_chars && snapshot_age < self.large_doc_interval {
            return false;
        }
        let ratio = if doc_size == 0 {
            if size_delta == 0 {
                0.0
            } else {
                1.0
            }
        } else {
            size_delta as f64 / doc_size as f64
        };
        !(ratio < self.small_delta_ratio && snapshot_age < self.small_delta_interval)
    }
}

/// What a refresh call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The policy kept the current snapshot (or no editor was mounted).
    Skipped,
    /// Markup, text and sections were rebuilt.
    Full,
    /// Markup and text were rebuilt; the section scan is scheduled.
    Deferred,
}

/// Owner of the current [`DocumentSnapshot`].
#[derive(Debug)]
pub struct DocumentCache {
    policy: RefreshPolicy,
    snapshot: Option<Arc<DocumentSnapshot>>,
    scan_due: Option<Instant>,
    periodic_due: Option<Instant>,
    section_scans: u64,
}

impl DocumentCache {
    #[must_use]
    /// Empty cache; the first refresh always builds a snapshot.
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            snapshot: None,
            scan_due: None,
            periodic_due: None,
            section_scans: 0,
        }
    }

    #[must_use]
    /// Thresholds in use.
    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    #[must_use]
    /// Current snapshot, `None` before the first refresh.
    pub fn snapshot(&self) -> Option<Arc<DocumentSnapshot>> {
        self.snapshot.clone()
    }

    #[must_use]
    /// How many section scans have run; each scan is a full markup parse.
    pub fn section_scans(&self) -> u64 {
        self.section_scans
    }

    #[must_use]
    /// Whether a snapshot exists and is younger than `max_age`.
    pub fn is_fresh(&self, max_age: Duration, now: Instant) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snap| now.saturating_duration_since(snap.captured_at) < max_age)
    }

    /// Rebuild the snapshot if the policy (or `force`) says so.
    pub fn refresh<H: EditorHost>(
        &mut self,
        adapter: &EditorAdapter<H>,
        format: &dyn Format,
        force: bool,
        now: Instant,
    ) -> RefreshOutcome {
        if !adapter.is_ready() {
            tracing::debug!("cache refresh skipped: editor not mounted");
            return RefreshOutcome::Skipped;
        }
        if self.periodic_due.is_none() {
            self.periodic_due = Some(now + self.policy.periodic_interval);
        }

        if force {
            let sections = self
                .snapshot
                .as_ref()
                .map(|snap| snap.sections.clone())
                .unwrap_or_default();
            self.snapshot = Some(Arc::new(DocumentSnapshot {
                markup: adapter.markup(),
                plain_text: adapter.plain_text(),
                captured_at: now,
                sections,
                sections_stale: true,
            }));
            self.scan_due = Some(now + self.policy.section_scan_delay);
            tracing::debug!("forced refresh, section scan deferred");
            return RefreshOutcome::Deferred;
        }

        if let Some(snap) = &self.snapshot {
            let age = now.saturating_duration_since(snap.captured_at);
            let cached = len_chars(&snap.plain_text);
            let live = len_chars(&adapter.plain_text());
            if !self.policy.should_refresh(age, live.abs_diff(cached), cached) {
                tracing::debug!(?age, cached, live, "cache refresh skipped by policy");
                return RefreshOutcome::Skipped;
            }
        }

        let markup = adapter.markup();
        let plain_text = adapter.plain_text();
        let sections = self.scan(format, &markup, &plain_text);
        self.snapshot = Some(Arc::new(DocumentSnapshot {
            markup,
            plain_text,
            captured_at: now,
            sections,
            sections_stale: false,
        }));
        self.scan_due = None;
        RefreshOutcome::Full
    }

    /// Run whatever is due: a deferred section scan, or the periodic safety-net refresh.
    pub fn tick<H: EditorHost>(
        &mut self,
        adapter: &EditorAdapter<H>,
        format: &dyn Format,
        now: Instant,
    ) -> Option<RefreshOutcome> {
        if self.scan_due.is_some_and(|due| now >= due) {
            self.scan_due = None;
            if let Some(snap) = self.snapshot.take() {
                let sections = self.scan(format, &snap.markup, &snap.plain_text);
                self.snapshot = Some(Arc::new(DocumentSnapshot {
                    markup: snap.markup.clone(),
                    plain_text: snap.plain_text.clone(),
                    captured_at: snap.captured_at,
                    sections,
                    sections_stale: false,
                }));
                return Some(RefreshOutcome::Full);
            }
        }

        if self.snapshot.is_none() && adapter.is_ready() {
            return Some(self.refresh(adapter, format, false, now));
        }

        if self.periodic_due.is_some_and(|due| now >= due) {
            self.periodic_due = Some(now + self.policy.periodic_interval);
            tracing::debug!("periodic cache refresh");
            return Some(self.refresh(adapter, format, false, now));
        }
        None
    }

    fn scan(&mut self, format: &dyn Format, markup: &str, plain_text: &str) -> Vec<Section> {
        self.section_scans += 1;
        extract_sections(format, markup, plain_text)
    }
}

#[cfg(test)]
#[path = "tests/cache.rs"]
mod tests;
