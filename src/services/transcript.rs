//! Captures the AI-side text tokens of a live call into a turn-structured
//! transcript for post-call processing.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptTurn {
    pub role: String, // "user" or "assistant"
    pub content: String,
}

#[derive(Debug, Default)]
pub struct TranscriptCapture {
    /// Every token ever seen, concatenated in arrival order.
    tokens: String,
    /// Accumulator for the assistant turn currently in flight.
    current: String,
    turns: Vec<TranscriptTurn>,
}

impl TranscriptCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text token from the AI stream.
    pub fn add_token(&mut self, text: &str) {
        self.tokens.push_str(text);
        self.current.push_str(text);
    }

    /// Close the current assistant turn. Whitespace-only turns are discarded.
    pub fn end_turn(&mut self) {
        let trimmed = self.current.trim();
        if !trimmed.is_empty() {
            self.turns.push(TranscriptTurn {
                role: "assistant".to_string(),
                content: trimmed.to_string(),
            });
        }
        self.current.clear();
    }

    /// Record a user-side note (STT hook; nothing calls this during a live call yet).
    #[allow(dead_code)]
    pub fn add_user_note(&mut self, note: &str) {
        let trimmed = note.trim();
        if !trimmed.is_empty() {
            self.turns.push(TranscriptTurn {
                role: "user".to_string(),
                content: trimmed.to_string(),
            });
        }
    }

    /// Flush the in-flight turn and return the accumulated transcript.
    pub fn transcript(&mut self) -> Vec<TranscriptTurn> {
        self.end_turn();
        self.turns.clone()
    }

    /// All raw text ever captured. Fallback when no turn boundaries were observed.
    pub fn full_text(&self) -> &str {
        &self.tokens
    }
}
