//! The chat transcript: an append-only list of turns with feedback attached after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who wrote a turn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// The lawyer.
    User,
    /// The assistant.
    Assistant,
}

/// One section of a document analysis.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisSection {
    /// Section title as the analysis names it.
    pub title: String,
    /// What the section says.
    #[serde(default)]
    pub summary: String,
}

/// Payload of an `analyze` completion.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StructuredAnalysis {
    /// Sections the analysis recognised.
    #[serde(default)]
    pub sections: Vec<AnalysisSection>,
    /// Problems found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Proposed improvements.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Token accounting reported by the endpoint.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u32,
    /// Sum of both.
    #[serde(default)]
    pub total_tokens: u32,
}

/// One message in the transcript.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatTurn {
    /// Unique within the transcript, increasing.
    pub id: u64,
    /// Who wrote it.
    pub author: Author,
    /// Message text.
    pub content: String,
    /// When it was appended.
    pub created_at: DateTime<Utc>,
    /// Whether the user found the answer useful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usefulness: Option<bool>,
    /// User rating, 1 to 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Free-text feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Structured result of a document analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<StructuredAnalysis>,
    /// The reply proposes text that can be applied to the document.
    #[serde(default)]
    pub applicable: bool,
    /// Model that produced the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    /// Token accounting for the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// Feedback that cannot be recorded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedbackError {
    /// No turn has this id.
    #[error("no chat turn with id {0}")]
    UnknownTurn(u64),
    /// Only assistant replies are rated.
    #[error("turn {0} was written by the user")]
    NotAssistant(u64),
    /// Ratings go from 1 to 5.
    #[error("rating {0} is outside 1..=5")]
    RatingOutOfRange(u8),
}

/// Append-only list of turns.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
    next_id: u64,
}

impl Transcript {
    #[must_use]
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message; returns its id.
    pub fn push_user(&mut self, content: &str) -> u64 {
        self.push(Author::User, content)
    }

    /// Append an assistant message; returns its id.
    pub fn push_assistant(&mut self, content: &str) -> u64 {
        self.push(Author::Assistant, content)
    }

    /// Append a fully built turn, assigning it the next id.
    pub fn push_turn(&mut self, mut turn: ChatTurn) -> u64 {
        turn.id = self.next_id;
        self.next_id += 1;
        let id = turn.id;
        self.turns.push(turn);
        id
    }

    fn push(&mut self, author: Author, content: &str) -> u64 {
        self.push_turn(ChatTurn {
            id: 0,
            author,
            content: content.to_string(),
            created_at: Utc::now(),
            usefulness: None,
            rating: None,
            comment: None,
            analysis: None,
            applicable: false,
            model_used: None,
            token_usage: None,
        })
    }

    #[must_use]
    /// All turns, oldest first.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[must_use]
    /// Turn by id.
    pub fn get(&self, id: u64) -> Option<&ChatTurn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    #[must_use]
    /// Most recent turn.
    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    #[must_use]
    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    /// Whether nothing has been said yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Attach feedback to an assistant turn.
    ///
    /// # Errors
    ///
    /// Fails for unknown ids, user turns and ratings outside 1..=5.
    pub fn set_feedback(
        &mut self,
        id: u64,
        usefulness: Option<bool>,
        rating: Option<u8>,
        comment: Option<String>,
    ) -> Result<&ChatTurn, FeedbackError> {
        if let Some(stars) = rating {
            if !(1..=5).contains(&stars) {
                return Err(FeedbackError::RatingOutOfRange(stars));
            }
        }
        let turn = self
            .turns
            .iter_mut()
            .find(|turn| turn.id == id)
            .ok_or(FeedbackError::UnknownTurn(id))?;
        if turn.author != Author::Assistant {
            return Err(FeedbackError::NotAssistant(id));
        }
        if usefulness.is_some() {
            turn.usefulness = usefulness;
        }
        if rating.is_some() {
            turn.rating = rating;
        }
        if comment.is_some() {
            turn.comment = comment;
        }
        Ok(turn)
    }
}
