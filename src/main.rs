use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use whisper_dictation::audio::capture::AudioCapture;
use whisper_dictation::config::Config;
use whisper_dictation::input::insert::ClipboardInjector;
use whisper_dictation::session::{DictationSession, SessionEvent};
use whisper_dictation::shortcut::ShortcutMatcher;
use whisper_dictation::telemetry;
use whisper_dictation::transcription::{Transcriber, WhisperEngine};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    telemetry::init(&config.telemetry)?;
    info!("whisper-dictation starting");

    let definition = config.shortcut.to_definition()?;
    let mode_hint = if definition.is_hold_mode() {
        format!("hold {} to record", definition.describe())
    } else {
        format!("press {} to start and stop", definition.describe())
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let capture = AudioCapture::new(config.audio.clone(), config.endpointing.clone());
    let (session, mut status_rx) = DictationSession::new(
        Box::new(capture),
        Box::new(ClipboardInjector::new()),
        config.transcription.punctuation,
        config.vad.to_tuning(),
        format!("Ready - {mode_hint}, Esc cancels"),
        events_tx.clone(),
    );

    // The model load is the slow part of startup; the session stays idle
    // until its completion event arrives.
    let loader_tx = events_tx.clone();
    let transcription = config.transcription.clone();
    tokio::task::spawn_blocking(move || {
        let model_path = match Config::expand_path(&transcription.model_path) {
            Ok(path) => path,
            Err(e) => {
                let _ = loader_tx.send(SessionEvent::EngineFailed(e.to_string()));
                return;
            }
        };
        match WhisperEngine::new(
            &model_path,
            transcription.threads,
            transcription.beam_size,
            transcription.language,
        ) {
            Ok(engine) => {
                let engine: Arc<dyn Transcriber> = Arc::new(engine);
                let _ = loader_tx.send(SessionEvent::EngineReady(engine));
            }
            Err(e) => {
                let _ = loader_tx.send(SessionEvent::EngineFailed(e.to_string()));
            }
        }
    });

    spawn_monitor(definition, events_tx)?;

    // Presentation stand-in: log every status transition.
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let snapshot = status_rx.borrow().clone();
            info!(status = ?snapshot.status, message = %snapshot.message, "status");
        }
    });

    tokio::select! {
        () = session.run(events_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

#[cfg(target_os = "macos")]
fn spawn_monitor(
    definition: whisper_dictation::shortcut::ShortcutDefinition,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> Result<()> {
    let matcher = ShortcutMatcher::new(definition);
    whisper_dictation::input::monitor::spawn(matcher, events)?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn spawn_monitor(
    definition: whisper_dictation::shortcut::ShortcutDefinition,
    _events: mpsc::UnboundedSender<SessionEvent>,
) -> Result<()> {
    let _ = ShortcutMatcher::new(definition);
    tracing::error!("global key monitoring is only implemented on macOS; shortcuts are inactive");
    Ok(())
}
