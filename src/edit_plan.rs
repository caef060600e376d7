//! The edit plan batches replacements computed against one version of the document.
//!
//! Every edit's offset refers to the same plain text, so the plan applies them from the highest
//! offset down: an edit never moves the text an earlier-offset edit still has to find. Plans are
//! serialisable so a session's pending changes can be saved as JSON and replayed on a fresh
//! copy of the document.

use crate::editor::EditorHost;
use crate::locator::Occurrence;
use crate::service::DocumentService;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
/// Serialisable collection of replacements against one plain-text version.
pub struct EditPlan {
    /// Individual replacements, in any order.
    pub edits: Vec<Edit>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
/// One char range and what replaces it.
pub struct Edit {
    /// Char offset of the replaced range.
    pub offset: usize,
    /// Replaced length in chars.
    pub length: usize,
    /// New text for the range.
    pub replacement: String,
    /// What was there, for tracking and debugging edits.
    #[serde(default)]
    pub original: String,
}

impl EditPlan {
    #[must_use]
    /// Replace every occurrence with the same text.
    pub fn from_occurrences(occurrences: &[Occurrence], replacement: &str) -> Self {
        Self {
            edits: occurrences
                .iter()
                .map(|occ| Edit {
                    offset: occ.offset,
                    length: occ.length,
                    replacement: replacement.to_string(),
                    original: occ.matched_text.clone(),
                })
                .collect(),
        }
    }

    #[must_use]
    /// Whether there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply all edits in descending offset order; returns how many succeeded.
    ///
    /// Edits whose `original` no longer matches the document are skipped.
    pub fn apply<H: EditorHost>(&self, service: &mut DocumentService<H>) -> usize {
        let mut ordered: Vec<&Edit> = self.edits.iter().collect();
        ordered.sort_by(|a, b| b.offset.cmp(&a.offset));

        let mut applied = 0;
        for edit in ordered {
            if !edit.original.is_empty() {
                let current = service.live_slice(edit.offset, edit.length);
                if current.as_deref() != Some(edit.original.as_str()) {
                    tracing::warn!(offset = edit.offset, "edit skipped: text changed underneath");
                    continue;
                }
            }
            if service.replace_range(edit.offset, edit.length, &edit.replacement) {
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
#[path = "tests/edit_plan.rs"]
mod tests;
