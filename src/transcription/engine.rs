use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::Transcriber;

/// Errors that can occur during transcription
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Failed to load Whisper model
    #[error("failed to load whisper model from {path}: {source}")]
    ModelLoad {
        /// Path to model file
        path: String,
        /// Underlying error
        source: anyhow::Error,
    },

    /// Failed to create Whisper inference state
    #[error("failed to create whisper state")]
    StateCreation,

    /// Transcription inference failed
    #[error("failed to transcribe audio")]
    Inference(#[from] anyhow::Error),
}

/// Whisper-backed implementation of the [`Transcriber`] contract.
pub struct WhisperEngine {
    /// Whisper context (thread-safe behind the mutex)
    ctx: Arc<Mutex<WhisperContext>>,
    /// Number of CPU threads for inference
    threads: i32,
    /// Beam search width
    beam_size: i32,
    /// Language code (None = auto-detect)
    language: Option<String>,
}

impl WhisperEngine {
    /// Sampling strategy for the configured beam size (pure, testable)
    const fn sampling_strategy(beam_size: i32) -> SamplingStrategy {
        if beam_size > 1 {
            SamplingStrategy::BeamSearch {
                beam_size,
                patience: -1.0,
            }
        } else {
            SamplingStrategy::Greedy { best_of: 1 }
        }
    }

    /// Loads the model at `model_path`.
    ///
    /// # Errors
    /// Returns error if the model file is missing or invalid, or if
    /// `threads`/`beam_size` are zero or exceed `i32::MAX`.
    pub fn new(
        model_path: &Path,
        threads: usize,
        beam_size: usize,
        language: Option<String>,
    ) -> Result<Self, TranscriptionError> {
        let invalid = |message: String| TranscriptionError::ModelLoad {
            path: model_path.display().to_string(),
            source: anyhow::anyhow!(message),
        };

        if threads == 0 {
            return Err(invalid("threads must be > 0".to_owned()));
        }
        if beam_size == 0 {
            return Err(invalid("beam_size must be > 0".to_owned()));
        }
        let threads_i32 = i32::try_from(threads)
            .map_err(|_| invalid(format!("threads value too large (max: {})", i32::MAX)))?;
        let beam_size_i32 = i32::try_from(beam_size)
            .map_err(|_| invalid(format!("beam_size value too large (max: {})", i32::MAX)))?;

        tracing::info!(
            path = %model_path.display(),
            threads,
            beam_size,
            language = ?language,
            "loading whisper model"
        );

        let path_str = model_path
            .to_str()
            .ok_or_else(|| invalid("model path contains invalid UTF-8".to_owned()))?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| TranscriptionError::ModelLoad {
                path: model_path.display().to_string(),
                source: anyhow::anyhow!("{e:?}"),
            })?;

        tracing::info!("whisper model loaded");

        Ok(Self {
            ctx: Arc::new(Mutex::new(ctx)),
            threads: threads_i32,
            beam_size: beam_size_i32,
            language,
        })
    }
}

impl Transcriber for WhisperEngine {
    fn transcribe(
        &self,
        samples: &[f32],
        prompt: Option<&str>,
        no_context: bool,
    ) -> Result<String, TranscriptionError> {
        let _span = tracing::debug_span!("transcription", samples = samples.len()).entered();

        let mut state = self
            .ctx
            .lock()
            .map_err(|e| anyhow::anyhow!("mutex poisoned: {e}"))?
            .create_state()
            .map_err(|_| TranscriptionError::StateCreation)?;

        let mut params = FullParams::new(Self::sampling_strategy(self.beam_size));
        params.set_n_threads(self.threads);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_language(self.language.as_deref());
        params.set_translate(false);
        params.set_no_context(no_context);
        if let Some(prompt) = prompt {
            params.set_initial_prompt(prompt);
        }

        let start = std::time::Instant::now();
        state
            .full(params, samples)
            .map_err(|e| anyhow::anyhow!("whisper inference failed: {e:?}"))?;
        let inference_duration = start.elapsed();

        let mut result = String::new();
        for segment in state.as_iter() {
            result.push_str(&segment.to_string());
        }
        let result = result.trim().to_owned();

        tracing::info!(
            segments = state.full_n_segments(),
            text_len = result.len(),
            inference_ms = inference_duration.as_millis(),
            no_context,
            "transcription completed"
        );

        Ok(result)
    }
}

// SAFETY: WhisperEngine is thread-safe because:
// 1. WhisperContext is wrapped in Arc<Mutex<>>, ensuring exclusive access
// 2. All methods acquire the mutex before touching the context
// 3. No shared mutable state exists outside the mutex
#[allow(unsafe_code)]
unsafe impl Send for WhisperEngine {}
#[allow(unsafe_code)]
unsafe impl Sync for WhisperEngine {}
