/// Microphone capture and the recording lifecycle
pub mod capture;
/// Level metering and live endpointing
pub mod level;
/// Offline voice-activity trimming
pub mod vad;
/// Recording artifact IO
pub mod wav;
