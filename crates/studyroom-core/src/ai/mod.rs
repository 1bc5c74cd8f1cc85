//! Text generation for summaries, explanations and study plans.
//!
//! The bot treats the model as a black box: one system prompt, one user
//! prompt, one text answer. [`GroqClient`] talks to an OpenAI-compatible
//! chat-completions endpoint.

mod groq;
pub mod prompts;

pub use groq::GroqClient;

use async_trait::async_trait;

use crate::error::ServiceError;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError>;
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Splits on character boundaries, ignoring words and lines. Concatenating
/// the pieces gives back `text`.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Cut `text` to its first `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_splits_into_two_chunks() {
        let text: String = "abcdefghij".repeat(250);
        let chunks = split_chunks(&text, 1900);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1900);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        let text = "é".repeat(5);
        let chunks = split_chunks(&text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_chunks("", 10).is_empty());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
