use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::audio::capture::{RecordingControl, RecordingHandle};
use crate::audio::level::LevelSample;
use crate::audio::vad::{self, VadTuning};
use crate::audio::wav;
use crate::input::insert::TextInjector;
use crate::transcription::{prompt_for, Transcriber};

/// Maximum status-message preview length for transcribed text.
const PREVIEW_CHARS: usize = 60;

/// The session lifecycle as published to presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Ready for the next engage.
    Idle,
    /// Microphone live.
    Recording,
    /// Trimming and running the transcriber.
    Transcribing,
    /// The last engage failed; cleared by the next successful one.
    Error(String),
}

/// Read-only snapshot published through the status watch channel.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Human-readable detail line.
    pub message: String,
    /// Latest normalized microphone level (zero outside `Recording`).
    pub audio_level: f32,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            message: "Initializing...".to_owned(),
            audio_level: 0.0,
        }
    }
}

/// Everything that can move the session state machine.
///
/// All producers (event tap, capture sampling loop, transcription task,
/// engine loader) funnel through one channel; the single consumer is the
/// only place session state mutates.
pub enum SessionEvent {
    /// The transcription engine finished loading.
    EngineReady(Arc<dyn Transcriber>),
    /// The transcription engine could not be loaded.
    EngineFailed(String),
    /// Shortcut engaged.
    Engage,
    /// Shortcut released / toggled off.
    Disengage,
    /// Recording aborted by the user.
    Cancel,
    /// Trailing silence exceeded during capture.
    AutoStop {
        /// Recording cycle that requested the stop; stale cycles are ignored.
        generation: u64,
    },
    /// Live microphone level reading.
    Level(LevelSample),
    /// Background transcription completed (`None` = no speech or failure).
    TranscriptionFinished {
        /// Recording cycle the result belongs to.
        generation: u64,
        /// Recognized text, if any.
        text: Option<String>,
    },
}

impl std::fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EngineReady(_) => f.write_str("EngineReady"),
            Self::EngineFailed(reason) => write!(f, "EngineFailed({reason})"),
            Self::Engage => f.write_str("Engage"),
            Self::Disengage => f.write_str("Disengage"),
            Self::Cancel => f.write_str("Cancel"),
            Self::AutoStop { generation } => write!(f, "AutoStop({generation})"),
            Self::Level(sample) => write!(f, "Level({})", sample.0),
            Self::TranscriptionFinished { generation, text } => {
                write!(f, "TranscriptionFinished({generation}, {:?})", text.is_some())
            }
        }
    }
}

/// Single-owner dictation state machine.
///
/// Owns the only mutable `SessionStatus`; every transition happens inside
/// `handle_event`, driven from one serialized event stream. Collaborators
/// are injected behind traits, and the only blocking work (inference) runs
/// on a background task whose completion re-enters the event stream.
pub struct DictationSession {
    capture: Box<dyn RecordingControl>,
    injector: Box<dyn TextInjector>,
    engine: Option<Arc<dyn Transcriber>>,
    punctuation: bool,
    vad: VadTuning,
    ready_message: String,
    status: SessionStatus,
    generation: u64,
    pending: Option<RecordingHandle>,
    events: mpsc::UnboundedSender<SessionEvent>,
    published: watch::Sender<StatusSnapshot>,
}

impl DictationSession {
    /// Creates a session and the status channel presentation reads from.
    pub fn new(
        capture: Box<dyn RecordingControl>,
        injector: Box<dyn TextInjector>,
        punctuation: bool,
        vad: VadTuning,
        ready_message: String,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> (Self, watch::Receiver<StatusSnapshot>) {
        let (published, status_rx) = watch::channel(StatusSnapshot::default());
        let session = Self {
            capture,
            injector,
            engine: None,
            punctuation,
            vad,
            ready_message,
            status: SessionStatus::Idle,
            generation: 0,
            pending: None,
            events,
            published,
        };
        (session, status_rx)
    }

    /// Current state, for tests and wiring.
    #[must_use]
    pub const fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Drains the event channel until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        info!("session event channel closed");
    }

    /// Applies one event. The single entry point for state transitions.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::EngineReady(engine) => {
                self.engine = Some(engine);
                if self.status == SessionStatus::Idle {
                    self.publish(self.ready_message.clone(), 0.0);
                }
                info!("transcription engine ready");
            }
            SessionEvent::EngineFailed(reason) => {
                warn!(reason = %reason, "transcription engine failed to load");
                self.publish(reason, 0.0);
            }
            SessionEvent::Engage => self.on_engage(),
            SessionEvent::Disengage => self.on_stop("shortcut released"),
            SessionEvent::AutoStop { generation } => {
                if generation == self.generation {
                    self.on_stop("trailing silence");
                } else {
                    debug!(generation, current = self.generation, "stale auto-stop ignored");
                }
            }
            SessionEvent::Cancel => self.on_cancel(),
            SessionEvent::Level(sample) => {
                if self.status == SessionStatus::Recording {
                    let message = self.published.borrow().message.clone();
                    self.publish(message, sample.0);
                }
            }
            SessionEvent::TranscriptionFinished { generation, text } => {
                self.on_transcription_finished(generation, text);
            }
        }
    }

    fn on_engage(&mut self) {
        match self.status {
            SessionStatus::Idle | SessionStatus::Error(_) => {}
            SessionStatus::Recording | SessionStatus::Transcribing => {
                debug!(status = ?self.status, "engage ignored, session busy");
                return;
            }
        }
        if self.engine.is_none() {
            debug!("engage ignored, transcription engine not ready");
            return;
        }

        self.generation += 1;
        match self.capture.start(self.events.clone(), self.generation) {
            Ok(()) => {
                self.status = SessionStatus::Recording;
                self.publish(
                    "Recording... (release to transcribe, Esc to cancel)".to_owned(),
                    0.0,
                );
                info!(generation = self.generation, "recording engaged");
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(reason = %reason, "capture failed to start");
                self.status = SessionStatus::Error(reason.clone());
                self.publish(reason, 0.0);
            }
        }
    }

    fn on_stop(&mut self, cause: &str) {
        if self.status != SessionStatus::Recording {
            debug!(cause, status = ?self.status, "stop ignored");
            return;
        }

        info!(cause, "stopping recording");
        let Some(handle) = self.capture.stop() else {
            // Zero captured samples is not an error.
            self.status = SessionStatus::Idle;
            self.publish("Ready".to_owned(), 0.0);
            return;
        };

        self.status = SessionStatus::Transcribing;
        self.publish("Transcribing...".to_owned(), 0.0);

        let samples = match wav::read_recording(&handle.path) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("failed to read recording artifact: {e:#}");
                self.discard(&handle);
                self.status = SessionStatus::Idle;
                self.publish("No speech detected".to_owned(), 0.0);
                return;
            }
        };

        let trimmed = vad::trim(&samples, wav::SAMPLE_RATE, &self.vad);
        debug!(
            captured = samples.len(),
            trimmed = trimmed.len(),
            "silence trimmed from capture"
        );

        // The engine was checked at engage; a session cannot reach Recording
        // without one.
        let Some(engine) = self.engine.clone() else {
            self.discard(&handle);
            self.status = SessionStatus::Idle;
            self.publish("No speech detected".to_owned(), 0.0);
            return;
        };

        self.pending = Some(handle);
        let generation = self.generation;
        let punctuation = self.punctuation;
        let completions = self.events.clone();
        tokio::task::spawn_blocking(move || {
            let (prompt, no_context) = prompt_for(punctuation);
            let text = match engine.transcribe(&trimmed, Some(prompt), no_context) {
                Ok(text) if text.trim().is_empty() => None,
                Ok(text) => Some(text),
                Err(e) => {
                    // A failed attempt degrades to "no speech"; no retries.
                    warn!("transcription failed: {e}");
                    None
                }
            };
            let _ = completions.send(SessionEvent::TranscriptionFinished { generation, text });
        });
    }

    fn on_cancel(&mut self) {
        if self.status != SessionStatus::Recording {
            debug!(status = ?self.status, "cancel ignored");
            return;
        }

        if let Some(handle) = self.capture.stop() {
            self.discard(&handle);
        }
        self.status = SessionStatus::Idle;
        self.publish("Cancelled".to_owned(), 0.0);
        info!("recording cancelled");
    }

    fn on_transcription_finished(&mut self, generation: u64, text: Option<String>) {
        if self.status != SessionStatus::Transcribing || generation != self.generation {
            debug!(generation, "stale transcription result ignored");
            return;
        }

        if let Some(handle) = self.pending.take() {
            self.discard(&handle);
        }

        let message = match text {
            Some(text) => {
                if !self.injector.inject(&text) {
                    warn!("text insertion failed");
                }
                preview(&text)
            }
            None => "No speech detected".to_owned(),
        };

        self.status = SessionStatus::Idle;
        self.publish(message, 0.0);
    }

    fn discard(&self, handle: &RecordingHandle) {
        if let Err(e) = std::fs::remove_file(&handle.path) {
            warn!(path = %handle.path.display(), "failed to remove recording artifact: {e}");
        }
    }

    fn publish(&self, message: String, audio_level: f32) {
        let snapshot = StatusSnapshot {
            status: self.status.clone(),
            message,
            audio_level,
        };
        let _ = self.published.send(snapshot);
    }
}

/// First 60 characters of the transcription, with an ellipsis when longer.
fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
