/// Whisper model inference engine
pub mod engine;

pub use engine::{TranscriptionError, WhisperEngine};

/// Prompt passed when the punctuation preference is enabled
/// (`no_context = false`).
pub const PUNCTUATED_PROMPT: &str = "Hello, how are you? I'm fine, thank you.";

/// Prompt passed when the punctuation preference is disabled
/// (`no_context = true`).
pub const PLAIN_PROMPT: &str = "hello how are you i'm fine thank you";

/// External speech-to-text collaborator.
///
/// Input is 16 kHz mono f32 PCM. A trimmed-empty result means "no speech
/// detected"; the session treats errors the same way.
#[cfg_attr(test, mockall::automock)]
pub trait Transcriber: Send + Sync {
    /// Transcribes audio samples to text.
    ///
    /// # Errors
    /// Returns error if inference fails.
    fn transcribe(
        &self,
        samples: &[f32],
        prompt: Option<&str>,
        no_context: bool,
    ) -> Result<String, TranscriptionError>;
}

/// Prompt and context flag derived from the punctuation preference.
#[must_use]
pub const fn prompt_for(punctuation: bool) -> (&'static str, bool) {
    if punctuation {
        (PUNCTUATED_PROMPT, false)
    } else {
        (PLAIN_PROMPT, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_preference_selects_prompt_and_context() {
        assert_eq!(prompt_for(true), (PUNCTUATED_PROMPT, false));
        assert_eq!(prompt_for(false), (PLAIN_PROMPT, true));
    }
}
