use std::sync::Arc;

use tracing::warn;

use crate::error::GenerationError;
use crate::services::text_generation::{GenerationConfig, TextGenerator};

pub const ERROR_REPLY_PREFIX: &str = "Sorry, I encountered an error: ";

/// Inference adapter: one message in, one reply out, no memory between calls.
pub struct ChatBot {
    generator: Arc<dyn TextGenerator>,
    config: GenerationConfig,
}

impl ChatBot {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_config(generator, GenerationConfig::PHI)
    }

    pub fn with_config(generator: Arc<dyn TextGenerator>, config: GenerationConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Run the model on `message` and strip the echoed prompt from the first
    /// candidate. Generation runs on the blocking pool.
    pub async fn generate(&self, message: &str) -> Result<String, GenerationError> {
        let generator = Arc::clone(&self.generator);
        let config = self.config;
        let prompt = message.to_string();

        let candidates =
            tokio::task::spawn_blocking(move || generator.generate(&prompt, &config)).await??;

        let raw = candidates
            .into_iter()
            .next()
            .ok_or(GenerationError::NoCandidate)?;

        Ok(strip_echo(message, &raw))
    }
}

/// Drop `message` from the front of `generated` if it is an exact string
/// prefix, trimming what is left. Anything else passes through untouched.
pub fn strip_echo(message: &str, generated: &str) -> String {
    match generated.strip_prefix(message) {
        Some(rest) => rest.trim().to_string(),
        None => generated.to_string(),
    }
}

/// Flatten the adapter result into reply text. Failures become an apology.
pub async fn generate_reply(chatbot: &ChatBot, message: &str) -> String {
    match chatbot.generate(message).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "generation failed");
            error_reply(&e)
        }
    }
}

pub fn error_reply(error: &GenerationError) -> String {
    format!("{ERROR_REPLY_PREFIX}{error}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_exact_prefix_and_trims() {
        assert_eq!(strip_echo("hello", "hello world"), "world");
        assert_eq!(strip_echo("hello", "hello\n\n  there  \n"), "there");
    }

    #[test]
    fn leaves_non_echo_untouched() {
        assert_eq!(strip_echo("hello", "  Hello world "), "  Hello world ");
        assert_eq!(strip_echo("hello", "well hello"), "well hello");
    }

    #[test]
    fn prefix_match_is_not_word_aware() {
        assert_eq!(strip_echo("hell", "hello"), "o");
    }

    #[test]
    fn pure_echo_becomes_empty() {
        assert_eq!(strip_echo("hi there", "hi there"), "");
    }

    #[test]
    fn empty_message_only_trims() {
        assert_eq!(strip_echo("", "  reply "), "reply");
    }

    #[test]
    fn error_reply_embeds_display() {
        let err = GenerationError::Other(anyhow::anyhow!("boom"));
        assert_eq!(error_reply(&err), "Sorry, I encountered an error: boom");
    }
}
