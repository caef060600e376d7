//! jurisia: a legal document editor with a chat assistant that edits the text it talks about.
//!
//! The core is [`service::DocumentService`]: it wraps whatever rich-text editor is mounted
//! (through [`editor::EditorAdapter`]), keeps a cached snapshot of the document with its
//! sections, and performs char-offset mutations. [`assistant::EditorAssistant`] turns chat
//! messages into those mutations or into requests for the completion endpoint.

/// Terminal session state: the document pane, chat input and request worker.
pub mod app_state;
/// Chat command loop.
pub mod assistant;
/// The in-memory rich text buffer behind the terminal editor.
pub mod buffer;
/// Document snapshot cache and refresh policy.
pub mod cache;
/// Parsing of replace/move commands and disambiguation replies.
pub mod commands;
/// Settings read from `jurisia.toml`.
pub mod config;
/// Serialisable batches of replacements.
pub mod edit_plan;
/// Capability-ranked access to the mounted editor.
pub mod editor;
/// Markup formats and section extraction.
pub mod formats;
/// Completion endpoint client.
pub mod llm;
/// Text search over the plain text.
pub mod locator;
/// Char and byte offset conversions.
pub mod offsets;
/// Document sections.
pub mod section;
/// The document service.
pub mod service;
/// Saved documents and interactions.
pub mod store;
/// Chat transcript.
pub mod transcript;
/// Rendering.
pub mod ui;
