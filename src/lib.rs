//! Whisper Dictation - hold-to-talk voice dictation pipeline
//!
//! This library exports the core modules for testing and reuse: shortcut
//! matching, the dictation session state machine, capture/endpointing/VAD,
//! and the thin wrappers around the transcription engine and the OS.

/// Audio capture, level metering, endpointing, and VAD trimming
pub mod audio;
/// Configuration management
pub mod config;
/// Input handling (key event monitoring, text insertion)
pub mod input;
/// Dictation session state machine
pub mod session;
/// Shortcut definitions and matching
pub mod shortcut;
/// Telemetry and crash logging
pub mod telemetry;
/// Whisper transcription engine
pub mod transcription;
