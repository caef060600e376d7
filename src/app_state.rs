//! Terminal session state: the document pane, the chat and the request workers.
//!
//! The document lives in two places that are kept in step. [`EditorPane`] pairs the rich
//! buffer the service edits with the `edtui` state the user types into: after each keystroke
//! the typed lines are diffed into the buffer (a user change), and after each programmatic
//! edit the buffer's text is pushed back into the editor lines. Completion requests run on
//! their own threads and their replies are collected on the next tick, in the order they
//! settle.

use crate::assistant::{EditorAssistant, SessionContext, TurnOutcome};
use crate::buffer::RichBuffer;
use crate::cache::RefreshPolicy;
use crate::config::Config;
use crate::edit_plan::EditPlan;
use crate::editor::{AccessPath, ChangeEvent, EditorHost, RichTextEditor, TextNodeTree};
use crate::formats::MarkupKind;
use crate::llm::{CompletionClient, CompletionReply, CompletionRequest, LlmError};
use crate::offsets::len_chars;
use crate::service::DocumentService;
use crate::store::{DocumentRecord, DocumentStore, InteractionRecord, JsonStore};
use edtui::{EditorState, Lines};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::{fs, io, thread};

/// Completion client shared with the request threads.
pub type SharedClient = Arc<dyn CompletionClient + Send + Sync>;

type Settled = (CompletionRequest, Result<CompletionReply, LlmError>);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// Which pane receives keystrokes.
pub enum View {
    /// Typing goes to the document editor.
    Document,
    /// Typing goes to the chat input.
    Chat,
    /// A `:` command is being typed.
    Command,
}

/// Outcome of a `:` command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CommandResult {
    /// Keep running.
    Continue,
    /// Leave the application.
    Quit,
}

/// The editor the user types into, together with the buffer the service edits.
pub struct EditorPane {
    buffer: RichBuffer,
    /// `edtui` state rendered in the document pane.
    pub state: EditorState,
}

impl EditorPane {
    #[must_use]
    /// Pane showing `buffer`.
    pub fn new(buffer: RichBuffer) -> Self {
        let state = EditorState::new(Lines::from(buffer.as_str()));
        Self { buffer, state }
    }

    #[must_use]
    /// The rich buffer.
    pub fn buffer(&self) -> &RichBuffer {
        &self.buffer
    }

    #[must_use]
    /// Text currently in the editor lines.
    pub fn editor_text(&self) -> String {
        self.state
            .lines
            .iter_row()
            .map(|line| line.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fold what the user typed into the buffer; returns the resulting change, if any.
    pub fn sync_from_editor(&mut self) -> Option<ChangeEvent> {
        let typed = self.editor_text();
        self.buffer.sync_text(&typed)
    }

    #[must_use]
    /// Char offset of the cursor in the plain text.
    pub fn cursor_offset(&self) -> usize {
        let row = self.state.cursor.row;
        let col = self.state.cursor.col;
        let mut offset = 0;
        for (i, line) in self.buffer.as_str().split('\n').enumerate() {
            let width = len_chars(line);
            if i == row {
                return offset + col.min(width);
            }
            offset += width + 1;
        }
        len_chars(self.buffer.as_str())
    }

    #[must_use]
    /// Char range `(offset, len)` of the line under the cursor.
    pub fn cursor_line(&self) -> (usize, usize) {
        let row = self.state.cursor.row;
        let mut offset = 0;
        for (i, line) in self.buffer.as_str().split('\n').enumerate() {
            let width = len_chars(line);
            if i == row {
                return (offset, width);
            }
            offset += width + 1;
        }
        (len_chars(self.buffer.as_str()), 0)
    }
}

impl EditorHost for EditorPane {
    fn editor(&self, path: AccessPath) -> Option<&dyn RichTextEditor> {
        self.buffer.editor(path)
    }

    fn editor_mut(&mut self, path: AccessPath) -> Option<&mut dyn RichTextEditor> {
        self.buffer.editor_mut(path)
    }

    fn text_nodes(&self) -> Option<&dyn TextNodeTree> {
        self.buffer.text_nodes()
    }

    fn text_nodes_mut(&mut self) -> Option<&mut dyn TextNodeTree> {
        self.buffer.text_nodes_mut()
    }

    fn after_change(&mut self) {
        let text = self.buffer.as_str().to_string();
        let rows: Vec<&str> = text.split('\n').collect();
        let row = self.state.cursor.row.min(rows.len().saturating_sub(1));
        let col = self.state.cursor.col.min(rows.get(row).map_or(0, |line| len_chars(line)));
        self.state.lines = Lines::from(text.as_str());
        self.state.cursor.row = row;
        self.state.cursor.col = col;
    }
}

/// Everything the terminal front end shows and edits.
pub struct AppState {
    /// The open document.
    pub service: DocumentService<EditorPane>,
    /// The chat.
    pub assistant: EditorAssistant,
    /// Pane receiving keystrokes.
    pub current_view: View,
    /// Chat message being typed.
    pub chat_input: String,
    /// Accumulates vim-style command input after ':' is pressed.
    pub command_buffer: String,
    /// Status feedback displayed in the help bar.
    pub message: Option<String>,
    /// Maximum line width for text wrapping in the chat pane.
    pub wrap_width: usize,
    /// File being edited.
    pub path: PathBuf,
    /// View to go back to after a command.
    pub previous_view: View,
    client: SharedClient,
    store: Option<JsonStore>,
    record: Option<DocumentRecord>,
    interactions: HashMap<u64, String>,
    settled_tx: Sender<Settled>,
    settled_rx: Receiver<Settled>,
}

impl AppState {
    #[must_use]
    /// Session over `buffer`, saved back to `path`.
    pub fn new(
        path: PathBuf,
        buffer: RichBuffer,
        cfg: &Config,
        client: SharedClient,
        store: Option<JsonStore>,
    ) -> Self {
        let pane = EditorPane::new(buffer.with_markup(MarkupKind::Html));
        let service = DocumentService::new(pane, MarkupKind::Html, RefreshPolicy::from_config(cfg));
        let session = SessionContext {
            document_id: None,
            document_type: None,
            user_id: cfg.user_id.clone(),
        };
        let (settled_tx, settled_rx) = mpsc::channel();
        Self {
            service,
            assistant: EditorAssistant::new(session, cfg.context_chars),
            current_view: View::Document,
            chat_input: String::new(),
            command_buffer: String::new(),
            message: None,
            wrap_width: cfg.wrap_width,
            path,
            previous_view: View::Document,
            client,
            store,
            record: None,
            interactions: HashMap::new(),
            settled_tx,
            settled_rx,
        }
    }

    /// Open the file at `path`; Markdown headings become header lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn open(
        path: &Path,
        cfg: &Config,
        client: SharedClient,
        store: Option<JsonStore>,
    ) -> io::Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        let buffer = if is_markdown(path) {
            RichBuffer::from_markdown(&content)
        } else {
            RichBuffer::from_plain(&content)
        };
        Ok(Self::new(path.to_path_buf(), buffer, cfg, client, store))
    }

    /// Editor state for the document pane.
    pub fn editor_state_mut(&mut self) -> &mut EditorState {
        &mut self.service.adapter_mut().host_mut().state
    }

    /// Fold keystrokes already applied to the editor lines into the document.
    pub fn editor_input_done(&mut self) {
        if let Some(event) = self.service.adapter_mut().host_mut().sync_from_editor() {
            self.service.editor_changed(&event);
        }
    }

    /// Send the typed chat message.
    pub fn submit_chat(&mut self) {
        let input = std::mem::take(&mut self.chat_input);
        if let TurnOutcome::Dispatch(request) = self.assistant.submit(&input, &mut self.service) {
            self.dispatch(request);
        }
    }

    /// Run `request` on its own thread.
    pub fn dispatch(&self, request: CompletionRequest) {
        let client = Arc::clone(&self.client);
        let tx = self.settled_tx.clone();
        thread::spawn(move || {
            let result = client.complete(&request);
            // The receiver only goes away when the application is closing.
            let _ = tx.send((request, result));
        });
    }

    /// Collect settled replies and run the document's due work.
    pub fn tick(&mut self) {
        while let Ok((request, result)) = self.settled_rx.try_recv() {
            let turn_id = self.assistant.receive_reply(result);
            self.record_interaction(&request, turn_id);
        }
        self.service.tick();
    }

    fn record_interaction(&mut self, request: &CompletionRequest, turn_id: u64) {
        let Some(store) = &self.store else {
            return;
        };
        let Some(turn) = self.assistant.transcript().get(turn_id) else {
            return;
        };
        let mut record =
            InteractionRecord::new(request.document_id.clone(), &request.message, &turn.content);
        record.metadata = serde_json::json!({
            "operation": request.operation,
            "modelUsed": turn.model_used,
            "tokenUsage": turn.token_usage,
        });
        match store.record_interaction(&record) {
            Ok(()) => {
                self.interactions.insert(turn_id, record.id);
            }
            Err(e) => tracing::warn!(error = %e, "interaction not recorded"),
        }
    }

    /// Execute the `:` command in the command buffer.
    pub fn run_command(&mut self) -> CommandResult {
        let cmd = std::mem::take(&mut self.command_buffer);
        self.current_view = self.previous_view;
        let mut words = cmd.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        match (name, args.as_slice()) {
            ("w", []) => {
                self.report_save();
            }
            ("x", []) => {
                if self.report_save() {
                    return CommandResult::Quit;
                }
            }
            ("q" | "q!", []) => return CommandResult::Quit,
            ("a" | "ar", [turn]) => match turn.parse() {
                Ok(turn_id) => self.apply_suggestion(turn_id, name == "ar"),
                Err(_) => self.message = Some(format!("Not a message number: {turn}")),
            },
            ("analyze", []) => {
                let request = self.assistant.request_analysis(&mut self.service);
                self.dispatch(request);
                self.message = Some("Analysis requested".to_string());
            }
            ("rate", [turn, stars, comment @ ..]) => {
                let comment = (!comment.is_empty()).then(|| comment.join(" "));
                match (turn.parse(), stars.parse()) {
                    (Ok(turn_id), Ok(stars)) => self.rate(turn_id, stars, comment),
                    _ => self.message = Some("Usage: :rate TURN STARS [COMMENT]".to_string()),
                }
            }
            ("docs", []) => self.list_stored(),
            ("open", [id]) => self.open_stored(id),
            ("fav", []) => self.toggle_favorite(),
            ("delete", [id]) => self.delete_stored(id),
            ("history", []) => self.count_interactions(),
            _ => self.message = Some(format!("Unknown command: {cmd}")),
        }
        CommandResult::Continue
    }

    /// The configured store; reports its absence in the help bar.
    fn store_or_report(&mut self) -> Option<JsonStore> {
        if self.store.is_none() {
            self.message = Some("No document store configured".to_string());
        }
        self.store.clone()
    }

    fn list_stored(&mut self) {
        let Some(store) = self.store_or_report() else {
            return;
        };
        self.message = Some(match store.list_documents() {
            Ok(docs) if docs.is_empty() => "No stored documents".to_string(),
            Ok(docs) => docs
                .iter()
                .map(|doc| {
                    let star = if doc.favorite { " *" } else { "" };
                    format!("{} {}{star}", doc.id, doc.title)
                })
                .collect::<Vec<_>>()
                .join(" | "),
            Err(e) => format!("Error listing documents: {e}"),
        });
    }

    /// Replace the open document with stored record `id`. Saving afterwards updates that record.
    fn open_stored(&mut self, id: &str) {
        let Some(store) = self.store_or_report() else {
            return;
        };
        let record = match store.get_document(id) {
            Ok(record) => record,
            Err(e) => {
                self.message = Some(format!("Error opening {id}: {e}"));
                return;
            }
        };
        let policy = self.service.cache().policy().clone();
        let buffer = RichBuffer::from_markdown(&record.content).with_markup(MarkupKind::Html);
        let pane = EditorPane::new(buffer);
        self.service = DocumentService::new(pane, MarkupKind::Html, policy);
        let session = self.assistant.session_mut();
        session.document_id = Some(record.id.clone());
        session.document_type.clone_from(&record.doc_type);
        tracing::info!(id = %record.id, "stored document opened");
        self.message = Some(format!("Opened {}", record.title));
        self.record = Some(record);
    }

    fn toggle_favorite(&mut self) {
        let Some(store) = self.store_or_report() else {
            return;
        };
        let Some(record) = self.record.as_mut() else {
            self.message = Some("Save the document first".to_string());
            return;
        };
        self.message = Some(match store.toggle_favorite(&record.id) {
            Ok(favorite) => {
                record.favorite = favorite;
                if favorite {
                    "Marked as favourite".to_string()
                } else {
                    "Removed from favourites".to_string()
                }
            }
            Err(e) => format!("Error: {e}"),
        });
    }

    fn delete_stored(&mut self, id: &str) {
        let Some(store) = self.store_or_report() else {
            return;
        };
        if self.record.as_ref().is_some_and(|record| record.id == id) {
            self.message = Some("Cannot delete the open document".to_string());
            return;
        }
        self.message = Some(match store.delete_document(id) {
            Ok(()) => format!("Deleted {id}"),
            Err(e) => format!("Error deleting {id}: {e}"),
        });
    }

    fn count_interactions(&mut self) {
        let Some(store) = self.store_or_report() else {
            return;
        };
        let document_id = self.assistant.session().document_id.clone();
        self.message = Some(match store.list_interactions(document_id.as_deref()) {
            Ok(found) => format!("{} stored interactions", found.len()),
            Err(e) => format!("Error reading interactions: {e}"),
        });
    }

    fn report_save(&mut self) -> bool {
        match self.save() {
            Ok(()) => {
                self.message = Some(format!("Saved {}", self.path.display()));
                true
            }
            Err(e) => {
                self.message = Some(format!("Error saving: {e}"));
                false
            }
        }
    }

    /// Write the document to its file and, when a store is configured, to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written. Store failures are only logged.
    pub fn save(&mut self) -> io::Result<()> {
        let buffer = self.service.adapter().host().buffer();
        let content = if is_markdown(&self.path) {
            buffer.to_markdown()
        } else {
            buffer.as_str().to_string()
        };
        fs::write(&self.path, &content)?;
        tracing::info!(path = %self.path.display(), "document saved");

        if let Some(store) = &self.store {
            let mut record = self.record.take().unwrap_or_else(|| {
                let title = self
                    .path
                    .file_stem()
                    .map_or_else(String::new, |stem| stem.to_string_lossy().to_string());
                DocumentRecord::new(&title, self.assistant.session().document_type.clone(), "")
            });
            record.content = content;
            match store.save_document(&record) {
                Ok(saved) => {
                    self.assistant.session_mut().document_id = Some(saved.id.clone());
                    self.record = Some(saved);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "document not stored");
                    self.record = Some(record);
                }
            }
        }
        Ok(())
    }

    /// Apply the excerpt suggested in `turn_id` at the cursor, or over the cursor's line.
    pub fn apply_suggestion(&mut self, turn_id: u64, replace_line: bool) {
        let pane = self.service.adapter().host();
        let (offset, len) = if replace_line {
            pane.cursor_line()
        } else {
            (pane.cursor_offset(), 0)
        };
        let done = self
            .assistant
            .apply_suggestion(turn_id, offset, len, &mut self.service);
        self.message = Some(if done {
            format!("Applied suggestion from message {turn_id}")
        } else {
            format!("Could not apply message {turn_id}")
        });
    }

    /// Rate assistant reply `turn_id`.
    pub fn rate(&mut self, turn_id: u64, stars: u8, comment: Option<String>) {
        if let Err(e) = self
            .assistant
            .rate_turn(turn_id, Some(stars >= 3), Some(stars), comment.clone())
        {
            self.message = Some(e.to_string());
            return;
        }
        if let (Some(store), Some(id)) = (&self.store, self.interactions.get(&turn_id)) {
            if let Err(e) = store.update_feedback(id, Some(stars >= 3), Some(stars), comment) {
                tracing::warn!(error = %e, "feedback not stored");
            }
        }
        self.message = Some(format!("Rated message {turn_id}: {stars}/5"));
    }

    /// Apply a saved edit plan; returns how many edits applied.
    pub fn load_edits(&mut self, plan: &EditPlan) -> usize {
        let applied = plan.apply(&mut self.service);
        self.message = Some(format!("Applied {applied} of {} saved edits", plan.edits.len()));
        applied
    }

    #[must_use]
    /// Width the chat transcript wraps at inside a pane `available` columns wide.
    pub fn chat_width(&self, available: u16) -> u16 {
        u16::try_from(self.wrap_width.max(1))
            .unwrap_or(u16::MAX)
            .min(available)
    }

    /// The transcript as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn transcript_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self.assistant.transcript())
    }

    /// Switch to the command line, remembering where to return.
    pub fn enter_command(&mut self) {
        self.previous_view = self.current_view;
        self.current_view = View::Command;
        self.command_buffer.clear();
        self.message = None;
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

#[cfg(test)]
#[path = "tests/app_state.rs"]
mod tests;
