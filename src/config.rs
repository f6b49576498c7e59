use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::shortcut::{Modifiers, ShortcutDefinition};

/// Persisted application configuration (`~/.whisper-dictation.toml`).
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Recording shortcut.
    pub shortcut: ShortcutConfig,
    /// Capture and level metering.
    pub audio: AudioConfig,
    /// Live trailing-silence auto-stop.
    pub endpointing: EndpointingConfig,
    /// Offline silence trimming.
    pub vad: VadConfig,
    /// Transcription engine settings.
    pub transcription: TranscriptionConfig,
    /// Logging destination.
    pub telemetry: TelemetryConfig,
}

/// Shortcut persistence: optional physical key code plus modifier names.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShortcutConfig {
    /// Physical key code; omitted for modifiers-only hold shortcuts.
    pub key_code: Option<u16>,
    /// Modifier names: Control, Option, Shift, Command.
    pub modifiers: Vec<String>,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            key_code: None,
            modifiers: vec!["Control".to_owned(), "Option".to_owned()],
        }
    }
}

impl ShortcutConfig {
    /// Parses the persisted record into a matcher definition.
    ///
    /// # Errors
    /// Returns error on an unrecognized modifier name.
    pub fn to_definition(&self) -> Result<ShortcutDefinition> {
        let mut mask = Modifiers::empty();
        for name in &self.modifiers {
            let bit = Modifiers::parse(name).map_err(|name| anyhow!("unknown modifier: {name}"))?;
            mask = mask.with(bit);
        }
        Ok(ShortcutDefinition {
            key_code: self.key_code,
            modifiers: mask,
        })
    }

    /// Builds the persisted record from a definition.
    #[must_use]
    pub fn from_definition(definition: &ShortcutDefinition) -> Self {
        Self {
            key_code: definition.key_code,
            modifiers: definition
                .modifiers
                .names()
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Capture and level metering settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AudioConfig {
    /// Upper bound on a single recording, sizing the capture ring buffer.
    pub max_recording_secs: usize,
    /// Cadence of level readings during capture.
    pub level_interval_ms: u64,
    /// dBFS mapped to meter value 0.0.
    pub level_floor_db: f32,
    /// dBFS mapped to meter value 1.0.
    pub level_ceiling_db: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            max_recording_secs: 30,
            level_interval_ms: 50,
            level_floor_db: -60.0,
            level_ceiling_db: -10.0,
        }
    }
}

/// Live auto-stop settings. The threshold is dBFS power, a deliberately
/// different unit from the VAD's linear amplitude threshold.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EndpointingConfig {
    /// Readings below this dBFS power count as silence.
    pub silence_threshold_db: f32,
    /// Consecutive silence that ends the recording.
    pub trailing_silence_ms: u64,
}

impl Default for EndpointingConfig {
    fn default() -> Self {
        Self {
            silence_threshold_db: -50.0,
            trailing_silence_ms: 2000,
        }
    }
}

/// Offline trim settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VadConfig {
    /// Classification window length.
    pub window_ms: u64,
    /// Linear peak amplitude above which a window is speech.
    pub amplitude_threshold: f32,
    /// Silence kept around each speech region.
    pub padding_ms: u64,
    /// Trim results shorter than this fall back to the untrimmed buffer.
    pub min_output_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            window_ms: 30,
            amplitude_threshold: 0.05,
            padding_ms: 300,
            min_output_ms: 500,
        }
    }
}

impl VadConfig {
    /// Converts the persisted record into trimmer tunables.
    #[must_use]
    pub const fn to_tuning(&self) -> crate::audio::vad::VadTuning {
        crate::audio::vad::VadTuning {
            window: std::time::Duration::from_millis(self.window_ms),
            amplitude_threshold: self.amplitude_threshold,
            padding: std::time::Duration::from_millis(self.padding_ms),
            min_output: std::time::Duration::from_millis(self.min_output_ms),
        }
    }
}

/// Transcription engine settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranscriptionConfig {
    /// Whisper model path (`~` expanded).
    pub model_path: String,
    /// Inference threads.
    pub threads: usize,
    /// Beam search width (1 = greedy).
    pub beam_size: usize,
    /// Language code, omitted for auto-detect.
    pub language: Option<String>,
    /// Whether to bias the engine toward punctuated output.
    pub punctuation: bool,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model_path: "~/.whisper-dictation/models/ggml-base.bin".to_owned(),
            threads: 4,
            beam_size: 1,
            language: None,
            punctuation: true,
        }
    }
}

/// Logging destination settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelemetryConfig {
    /// Whether to log to a file instead of stdout.
    pub enabled: bool,
    /// Log file path (`~` expanded).
    pub log_path: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: "~/.whisper-dictation/whisper-dictation.log".to_owned(),
        }
    }
}

impl Config {
    /// Loads config from `~/.whisper-dictation.toml`, writing the defaults
    /// there on first run.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, written, or parsed.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let defaults = Self::default();
            defaults
                .save()
                .context("failed to create default config")?;
            return Ok(defaults);
        }

        let contents = fs::read_to_string(&config_path).context("failed to read config file")?;
        let config: Self = toml::from_str(&contents).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Rewrites the whole config file; preferences are replaced wholesale.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&config_path, contents).context("failed to write config file")?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".whisper-dictation.toml"))
    }

    /// Expand `~` in paths to the home directory
    ///
    /// # Errors
    /// Returns error if `HOME` is unset.
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test assertions on known-good fixtures
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(parsed.shortcut.key_code, None);
        assert_eq!(parsed.shortcut.modifiers, vec!["Control", "Option"]);
        assert_eq!(parsed.audio.level_interval_ms, 50);
        assert!((parsed.endpointing.silence_threshold_db - (-50.0)).abs() < f32::EPSILON);
        assert!((parsed.vad.amplitude_threshold - 0.05).abs() < f32::EPSILON);
        assert!(parsed.transcription.punctuation);
    }

    #[test]
    fn default_shortcut_is_control_option_hold() {
        let definition = ShortcutConfig::default().to_definition().unwrap();
        assert_eq!(definition, ShortcutDefinition::default());
        assert!(definition.is_hold_mode());
    }

    #[test]
    fn shortcut_definition_round_trip() {
        let definition = ShortcutDefinition {
            key_code: Some(49),
            modifiers: Modifiers::COMMAND.with(Modifiers::SHIFT),
        };
        let record = ShortcutConfig::from_definition(&definition);
        assert_eq!(record.to_definition().unwrap(), definition);
    }

    #[test]
    fn unknown_modifier_name_fails_parsing() {
        let record = ShortcutConfig {
            key_code: None,
            modifiers: vec!["Hyper".to_owned()],
        };
        let err = record.to_definition().unwrap_err();
        assert!(err.to_string().contains("unknown modifier: Hyper"));
    }

    #[test]
    fn vad_config_converts_to_tuning() {
        let tuning = VadConfig::default().to_tuning();
        assert_eq!(tuning.window.as_millis(), 30);
        assert_eq!(tuning.padding.as_millis(), 300);
        assert_eq!(tuning.min_output.as_millis(), 500);
    }

    #[test]
    fn expand_path_with_tilde() {
        let home = std::env::var("HOME").unwrap();
        let result = Config::expand_path("~/models/ggml-base.bin").unwrap();
        assert_eq!(result, PathBuf::from(home).join("models/ggml-base.bin"));
    }

    #[test]
    fn expand_path_without_tilde() {
        let result = Config::expand_path("/var/tmp/model.bin").unwrap();
        assert_eq!(result, PathBuf::from("/var/tmp/model.bin"));
    }
}
