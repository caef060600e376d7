//! The chat assistant: executes replace and move commands against the document and forwards
//! everything else to the completion endpoint.
//!
//! The assistant is a small state machine. Its state is derived, never stored: a pending
//! replacement means it is waiting for the user to pick a candidate, a non-zero count of
//! requests in flight means it is waiting for the endpoint, otherwise it is idle. Offsets are
//! located against the live text right before each mutation.

use crate::commands::{parse_command, parse_selection, Command, Placement, Selection};
use crate::edit_plan::EditPlan;
use crate::editor::EditorHost;
use crate::llm::{
    CompletionClient, CompletionReply, CompletionRequest, LlmError, Operation, CONTINGENCY_MESSAGE,
};
use crate::locator::{context_preview, Occurrence, QueryMode};
use crate::service::DocumentService;
use crate::transcript::{Author, ChatTurn, FeedbackError, Transcript};
use chrono::Utc;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

/// Words in a reply that mark it as carrying text meant for the document.
const SUGGESTION_MARKERS: [&str; 8] = [
    "sugestão",
    "sugestao",
    "correção",
    "correcao",
    "trecho sugerido",
    "suggestion",
    "correction",
    "suggested excerpt",
];

/// How many earlier turns travel with a chat request.
const HISTORY_TURNS: usize = 6;

static FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").expect("valid fence pattern"));

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"([^"]+)"|“([^”]+)”"#).expect("valid quotation pattern")
});

/// Where the assistant is in the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssistantState {
    /// Ready for a new message.
    Idle,
    /// A replacement matched several places and the user has to pick.
    AwaitingDisambiguation,
    /// At least one request is waiting for the endpoint.
    AwaitingAssistantReply,
}

/// A replacement waiting for the user to choose among its candidates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingOperation {
    /// Text that was searched for.
    pub target: String,
    /// Text that will replace it.
    pub replacement: String,
    /// Candidates, in document order, as they were listed to the user.
    pub occurrences: Vec<Occurrence>,
}

/// Who is talking and about which document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Stored document id, once saved.
    pub document_id: Option<String>,
    /// Kind of legal document.
    pub document_type: Option<String>,
    /// Requesting user.
    pub user_id: String,
}

/// Result of handing a message to the assistant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Answered locally; the transcript already holds the reply.
    Handled,
    /// Has to go to the endpoint; pass the reply to [`EditorAssistant::receive_reply`].
    Dispatch(CompletionRequest),
}

/// The chat side of an editing session.
pub struct EditorAssistant {
    session: SessionContext,
    transcript: Transcript,
    pending: Option<PendingOperation>,
    in_flight: usize,
    context_chars: usize,
}

impl EditorAssistant {
    #[must_use]
    /// Assistant for `session`, showing `context_chars` chars around each candidate.
    pub fn new(session: SessionContext, context_chars: usize) -> Self {
        Self {
            session,
            transcript: Transcript::new(),
            pending: None,
            in_flight: 0,
            context_chars,
        }
    }

    #[must_use]
    /// Current state.
    pub fn state(&self) -> AssistantState {
        if self.pending.is_some() {
            AssistantState::AwaitingDisambiguation
        } else if self.in_flight > 0 {
            AssistantState::AwaitingAssistantReply
        } else {
            AssistantState::Idle
        }
    }

    #[must_use]
    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    /// The replacement waiting for a choice, if any.
    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    #[must_use]
    /// Session details sent with each request.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Session details, mutably (the document id is known only after the first save).
    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    /// Handle one user message.
    pub fn submit<H: EditorHost>(
        &mut self,
        input: &str,
        doc: &mut DocumentService<H>,
    ) -> TurnOutcome {
        let input = input.trim();
        if input.is_empty() {
            return TurnOutcome::Handled;
        }
        self.transcript.push_user(input);
        let command = parse_command(input);

        if let Some(pending) = self.pending.take() {
            if command.is_none() {
                self.resolve_pending(pending, input, doc);
                return TurnOutcome::Handled;
            }
            tracing::debug!(target = %pending.target, "pending replacement superseded");
        }

        match command {
            Some(Command::Replace {
                target,
                replacement,
            }) => {
                self.run_replace(&target, &replacement, doc);
                TurnOutcome::Handled
            }
            Some(Command::Move {
                source,
                anchor,
                placement,
            }) => {
                self.run_move(&source, &anchor, placement, doc);
                TurnOutcome::Handled
            }
            None => TurnOutcome::Dispatch(self.request(Operation::Chat, input, doc)),
        }
    }

    /// Submit a message and, if it needs the endpoint, wait for `client`. Returns the id of the
    /// last turn appended.
    pub fn submit_blocking<H: EditorHost, C: CompletionClient + ?Sized>(
        &mut self,
        input: &str,
        doc: &mut DocumentService<H>,
        client: &C,
    ) -> Option<u64> {
        if let TurnOutcome::Dispatch(request) = self.submit(input, doc) {
            self.receive_reply(client.complete(&request));
        }
        self.transcript.last().map(|turn| turn.id)
    }

    /// Ask the endpoint for a structured analysis of the document.
    pub fn request_analysis<H: EditorHost>(&mut self, doc: &mut DocumentService<H>) -> CompletionRequest {
        let message = "Analise o documento.";
        self.transcript.push_user(message);
        self.request(Operation::Analyze, message, doc)
    }

    /// Record the endpoint's answer (or failure) for one dispatched request; returns the id of
    /// the appended turn.
    pub fn receive_reply(&mut self, result: Result<CompletionReply, LlmError>) -> u64 {
        self.in_flight = self.in_flight.saturating_sub(1);
        match result {
            Ok(reply) => {
                let applicable = is_applicable(&reply.reply);
                self.transcript.push_turn(ChatTurn {
                    id: 0,
                    author: Author::Assistant,
                    content: reply.reply,
                    created_at: Utc::now(),
                    usefulness: None,
                    rating: None,
                    comment: None,
                    analysis: reply.analysis,
                    applicable,
                    model_used: reply.model_used,
                    token_usage: reply.token_usage,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "completion request failed");
                self.transcript.push_assistant(CONTINGENCY_MESSAGE)
            }
        }
    }

    /// Put the excerpt suggested in turn `turn_id` into the document: it replaces the `len`
    /// chars at `offset`, or is inserted there when `len` is zero.
    pub fn apply_suggestion<H: EditorHost>(
        &mut self,
        turn_id: u64,
        offset: usize,
        len: usize,
        doc: &mut DocumentService<H>,
    ) -> bool {
        let Some(turn) = self.transcript.get(turn_id) else {
            self.transcript
                .push_assistant(&format!("Não há mensagem {turn_id} na conversa."));
            return false;
        };
        if turn.author != Author::Assistant || !turn.applicable {
            self.transcript
                .push_assistant(&format!("A mensagem {turn_id} não traz trecho para aplicar."));
            return false;
        }
        let excerpt = suggested_excerpt(&turn.content);
        let done = if len == 0 {
            doc.insert_at(offset, &excerpt)
        } else {
            doc.replace_range(offset, len, &excerpt)
        };
        if done {
            self.transcript
                .push_assistant("Sugestão aplicada ao documento.");
        } else {
            self.transcript
                .push_assistant("Não consegui aplicar a sugestão ao documento.");
        }
        done
    }

    /// Record feedback on an assistant reply.
    ///
    /// # Errors
    ///
    /// Fails for unknown or user turns and ratings outside 1..=5.
    pub fn rate_turn(
        &mut self,
        turn_id: u64,
        usefulness: Option<bool>,
        rating: Option<u8>,
        comment: Option<String>,
    ) -> Result<&ChatTurn, FeedbackError> {
        self.transcript
            .set_feedback(turn_id, usefulness, rating, comment)
    }

    fn request<H: EditorHost>(
        &mut self,
        operation: Operation,
        message: &str,
        doc: &mut DocumentService<H>,
    ) -> CompletionRequest {
        self.in_flight += 1;
        // A forced refresh rebuilds the cached text synchronously.
        doc.refresh(true);
        CompletionRequest {
            operation,
            message: message.to_string(),
            document_id: self.session.document_id.clone(),
            document_type: self.session.document_type.clone(),
            user_id: self.session.user_id.clone(),
            full_document_content: doc.plain_text(),
            context: self.history(),
        }
    }

    /// Earlier turns, oldest first, excluding the message being sent.
    fn history(&self) -> String {
        let turns = self.transcript.turns();
        let earlier = &turns[..turns.len().saturating_sub(1)];
        let start = earlier.len().saturating_sub(HISTORY_TURNS);
        earlier[start..]
            .iter()
            .map(|turn| {
                let who = match turn.author {
                    Author::User => "Usuário",
                    Author::Assistant => "Assistente",
                };
                format!("{who}: {}", turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn locate<H: EditorHost>(doc: &DocumentService<H>, query: &str) -> Vec<Occurrence> {
        match doc.find(query, QueryMode::Literal) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "lookup failed");
                Vec::new()
            }
        }
    }

    fn run_replace<H: EditorHost>(
        &mut self,
        target: &str,
        replacement: &str,
        doc: &mut DocumentService<H>,
    ) {
        doc.refresh(true);
        let occurrences = Self::locate(doc, target);
        match occurrences.as_slice() {
            [] => {
                self.transcript
                    .push_assistant(&format!("Não encontrei \"{target}\" no documento."));
            }
            [only] => {
                let reply = if doc.replace_range(only.offset, only.length, replacement) {
                    format!("Substituí \"{target}\" por \"{replacement}\".")
                } else {
                    format!("Não consegui substituir \"{target}\" no documento.")
                };
                self.transcript.push_assistant(&reply);
            }
            many => {
                let text = doc.live_text();
                let mut prompt = format!(
                    "Encontrei {} ocorrências de \"{target}\". Qual delas devo substituir por \"{replacement}\"?",
                    many.len()
                );
                for (i, occ) in many.iter().enumerate() {
                    let _ = write!(
                        prompt,
                        "\n{}. {}",
                        i + 1,
                        context_preview(&text, occ, self.context_chars)
                    );
                }
                prompt.push_str("\nResponda com o número, \"todas\" ou \"cancelar\".");
                self.transcript.push_assistant(&prompt);
                self.pending = Some(PendingOperation {
                    target: target.to_string(),
                    replacement: replacement.to_string(),
                    occurrences,
                });
            }
        }
    }

    fn resolve_pending<H: EditorHost>(
        &mut self,
        pending: PendingOperation,
        input: &str,
        doc: &mut DocumentService<H>,
    ) {
        let total = pending.occurrences.len();
        match parse_selection(input, total) {
            Some(Selection::All) => {
                let plan = EditPlan::from_occurrences(&pending.occurrences, &pending.replacement);
                let applied = plan.apply(doc);
                self.transcript.push_assistant(&format!(
                    "Substituí {applied} de {total} ocorrências de \"{}\" por \"{}\".",
                    pending.target, pending.replacement
                ));
            }
            Some(Selection::Index(n)) => {
                let chosen = &pending.occurrences[n - 1..n];
                let plan = EditPlan::from_occurrences(chosen, &pending.replacement);
                let reply = if plan.apply(doc) == 1 {
                    format!(
                        "Substituí a ocorrência {n} de \"{}\" por \"{}\".",
                        pending.target, pending.replacement
                    )
                } else {
                    format!(
                        "Não consegui substituir a ocorrência {n}: o texto mudou desde a busca."
                    )
                };
                self.transcript.push_assistant(&reply);
            }
            Some(Selection::Cancel) => {
                self.transcript.push_assistant("Substituição cancelada.");
            }
            None => {
                self.transcript.push_assistant(&format!(
                    "Não entendi. Responda com um número de 1 a {total}, \"todas\" ou \"cancelar\"."
                ));
                self.pending = Some(pending);
            }
        }
    }

    fn run_move<H: EditorHost>(
        &mut self,
        source: &str,
        anchor: &str,
        placement: Placement,
        doc: &mut DocumentService<H>,
    ) {
        doc.refresh(true);
        let sources = Self::locate(doc, source);
        let anchors = Self::locate(doc, anchor);
        let reply = match (sources.as_slice(), anchors.as_slice()) {
            ([], _) => format!("Não encontrei \"{source}\" no documento."),
            (_, []) => format!("Não encontrei \"{anchor}\" no documento."),
            ([block], [target]) => {
                let (dest, side) = match placement {
                    Placement::After => (target.end(), "depois de"),
                    Placement::Before => (target.offset, "antes de"),
                };
                if doc.move_block(block.offset, block.length, dest) {
                    format!("Movi \"{source}\" para {side} \"{anchor}\".")
                } else {
                    format!("Não consegui mover \"{source}\" para {side} \"{anchor}\".")
                }
            }
            (found, _) if found.len() > 1 => format!(
                "\"{source}\" aparece {} vezes no documento. Use um trecho mais específico.",
                found.len()
            ),
            (_, found) => format!(
                "\"{anchor}\" aparece {} vezes no documento. Use um trecho mais específico.",
                found.len()
            ),
        };
        self.transcript.push_assistant(&reply);
    }
}

#[must_use]
/// Whether a reply carries text meant to go into the document.
pub fn is_applicable(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    SUGGESTION_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[must_use]
/// The passage of a reply that should go into the document: a fenced block, else the first
/// quoted passage, else the whole reply.
pub fn suggested_excerpt(reply: &str) -> String {
    if let Some(caps) = FENCED.captures(reply) {
        return caps[1].trim_end_matches('\n').to_string();
    }
    if let Some(caps) = QUOTED.captures(reply) {
        if let Some(quoted) = caps.get(1).or_else(|| caps.get(2)) {
            return quoted.as_str().to_string();
        }
    }
    reply.trim().to_string()
}

#[cfg(test)]
#[path = "tests/assistant.rs"]
mod tests;
