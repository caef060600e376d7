//! Persistence for saved documents and the interactions had about them.
//!
//! The editing core never touches storage; the front end saves through a [`DocumentStore`].
//! [`JsonStore`] keeps one pretty-printed JSON file per record under two directories:
//!
//! ```text
//! <root>/documents/<id>.json
//! <root>/interactions/<id>.json
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use thiserror::Error;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("storage i/o failed: {0}")]
    Io(#[from] io::Error),
    /// A record could not be (de)serialised.
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
    /// No record with this id.
    #[error("no record with id {0}")]
    NotFound(String),
    /// Ids may only contain ASCII letters, digits, `-` and `_`.
    #[error("invalid record id {0:?}")]
    InvalidId(String),
    /// Ratings go from 1 to 5.
    #[error("rating {0} is outside 1..=5")]
    InvalidRating(u8),
}

/// A saved document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Record id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Kind of legal document.
    #[serde(default)]
    pub doc_type: Option<String>,
    /// Document body (Markdown).
    pub content: String,
    /// Marked as favourite.
    #[serde(default)]
    pub favorite: bool,
    /// First save.
    pub created_at: DateTime<Utc>,
    /// Last save.
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    #[must_use]
    /// A new, never saved document.
    pub fn new(title: &str, doc_type: Option<String>, content: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("doc"),
            title: title.to_string(),
            doc_type,
            content: content.to_string(),
            favorite: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One question and answer exchanged with the assistant.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InteractionRecord {
    /// Record id.
    pub id: String,
    /// Document discussed, if saved.
    #[serde(default)]
    pub document_id: Option<String>,
    /// What the user sent.
    pub submitted: String,
    /// What the assistant answered.
    pub reply: String,
    /// Whether the answer was useful.
    #[serde(default)]
    pub usefulness: Option<bool>,
    /// Rating, 1 to 5.
    #[serde(default)]
    pub rating: Option<u8>,
    /// Free-text feedback.
    #[serde(default)]
    pub comment: Option<String>,
    /// Model, token usage and whatever else the endpoint reported.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// When the reply arrived.
    pub created_at: DateTime<Utc>,
}

impl InteractionRecord {
    #[must_use]
    /// A new interaction with no feedback yet.
    pub fn new(document_id: Option<String>, submitted: &str, reply: &str) -> Self {
        Self {
            id: new_id("int"),
            document_id,
            submitted: submitted.to_string(),
            reply: reply.to_string(),
            usefulness: None,
            rating: None,
            comment: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }
}

/// Where documents and interactions are kept.
pub trait DocumentStore {
    /// All documents, most recently updated first.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be read.
    fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    /// One document.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::NotFound`] for unknown ids.
    fn get_document(&self, id: &str) -> Result<DocumentRecord, StoreError>;

    /// Create or overwrite a document; its `updated_at` is bumped.
    ///
    /// # Errors
    ///
    /// Fails when the record cannot be written.
    fn save_document(&self, record: &DocumentRecord) -> Result<DocumentRecord, StoreError>;

    /// Remove a document.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::NotFound`] for unknown ids.
    fn delete_document(&self, id: &str) -> Result<(), StoreError>;

    /// Flip the favourite flag; returns the new value.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::NotFound`] for unknown ids.
    fn toggle_favorite(&self, id: &str) -> Result<bool, StoreError>;

    /// Store an interaction.
    ///
    /// # Errors
    ///
    /// Fails when the record cannot be written.
    fn record_interaction(&self, record: &InteractionRecord) -> Result<(), StoreError>;

    /// Attach feedback to an interaction. `None` fields are left as they are.
    ///
    /// # Errors
    ///
    /// Fails for unknown ids and ratings outside 1..=5.
    fn update_feedback(
        &self,
        id: &str,
        usefulness: Option<bool>,
        rating: Option<u8>,
        comment: Option<String>,
    ) -> Result<InteractionRecord, StoreError>;

    /// Interactions, oldest first, optionally only those about one document.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be read.
    fn list_interactions(&self, document_id: Option<&str>) -> Result<Vec<InteractionRecord>, StoreError>;
}

/// Directory of JSON files.
#[derive(Clone, Debug)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Fails when the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { root: root.into() };
        fs::create_dir_all(store.documents_dir())?;
        fs::create_dir_all(store.interactions_dir())?;
        tracing::debug!(root = %store.root.display(), "opened document store");
        Ok(store)
    }

    #[must_use]
    /// Store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    fn interactions_dir(&self) -> PathBuf {
        self.root.join("interactions")
    }

    fn record_path(dir: &Path, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(dir.join(format!("{id}.json")))
        } else {
            Err(StoreError::InvalidId(id.to_string()))
        }
    }

    fn read<T: serde::de::DeserializeOwned>(path: &Path, id: &str) -> Result<T, StoreError> {
        match fs::read_to_string(path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn write<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_all<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let json = fs::read_to_string(&path)?;
            match serde_json::from_str(&json) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }
}

impl DocumentStore for JsonStore {
    fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut docs: Vec<DocumentRecord> = Self::read_all(&self.documents_dir())?;
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(docs)
    }

    fn get_document(&self, id: &str) -> Result<DocumentRecord, StoreError> {
        let path = Self::record_path(&self.documents_dir(), id)?;
        Self::read(&path, id)
    }

    fn save_document(&self, record: &DocumentRecord) -> Result<DocumentRecord, StoreError> {
        let path = Self::record_path(&self.documents_dir(), &record.id)?;
        let mut saved = record.clone();
        saved.updated_at = Utc::now();
        Self::write(&path, &saved)?;
        Ok(saved)
    }

    fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        let path = Self::record_path(&self.documents_dir(), id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn toggle_favorite(&self, id: &str) -> Result<bool, StoreError> {
        let path = Self::record_path(&self.documents_dir(), id)?;
        let mut doc: DocumentRecord = Self::read(&path, id)?;
        doc.favorite = !doc.favorite;
        Self::write(&path, &doc)?;
        Ok(doc.favorite)
    }

    fn record_interaction(&self, record: &InteractionRecord) -> Result<(), StoreError> {
        let path = Self::record_path(&self.interactions_dir(), &record.id)?;
        Self::write(&path, record)
    }

    fn update_feedback(
        &self,
        id: &str,
        usefulness: Option<bool>,
        rating: Option<u8>,
        comment: Option<String>,
    ) -> Result<InteractionRecord, StoreError> {
        if let Some(stars) = rating {
            if !(1..=5).contains(&stars) {
                return Err(StoreError::InvalidRating(stars));
            }
        }
        let path = Self::record_path(&self.interactions_dir(), id)?;
        let mut record: InteractionRecord = Self::read(&path, id)?;
        if usefulness.is_some() {
            record.usefulness = usefulness;
        }
        if rating.is_some() {
            record.rating = rating;
        }
        if comment.is_some() {
            record.comment = comment;
        }
        Self::write(&path, &record)?;
        Ok(record)
    }

    fn list_interactions(&self, document_id: Option<&str>) -> Result<Vec<InteractionRecord>, StoreError> {
        let mut records: Vec<InteractionRecord> = Self::read_all(&self.interactions_dir())?;
        if let Some(doc) = document_id {
            records.retain(|record| record.document_id.as_deref() == Some(doc));
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }
}

/// Run `op` up to `attempts` times, sleeping `base_delay * n` after the n-th failure.
///
/// # Errors
///
/// Returns the last error when every attempt fails.
pub fn with_retry<T, E: Display>(
    attempts: u32,
    base_delay: Duration,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                tracing::warn!(attempt, error = %e, "store operation failed, retrying");
                thread::sleep(base_delay * attempt);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn new_id(prefix: &str) -> String {
    let count = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let stamp = Utc::now().format("%Y%m%d%H%M%S%f");
    format!("{prefix}-{stamp}-{count}")
}

#[cfg(test)]
#[path = "tests/store.rs"]
mod tests;
