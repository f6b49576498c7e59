use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapRb,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::level::{self, Endpointer, LevelScale};
use crate::audio::wav;
use crate::config::{AudioConfig, EndpointingConfig};
use crate::session::SessionEvent;

/// Capture startup failures, surfaced to the session as `Error(reason)`.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No default input device (unplugged, or permission denied).
    #[error("no audio input device available")]
    NoInputDevice,

    /// The device rejected the config query.
    #[error("failed to query input device config: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),

    /// Stream construction failed.
    #[error("failed to build input stream: {0}")]
    StreamBuild(#[from] cpal::BuildStreamError),

    /// The stream refused to start.
    #[error("failed to start input stream: {0}")]
    StreamStart(#[from] cpal::PlayStreamError),
}

/// One in-flight capture: its unique artifact location and start time.
///
/// Owned by `AudioCapture` while recording, moved to the session on stop,
/// discarded after transcription or cancellation. At most one exists at a
/// time.
#[derive(Debug)]
pub struct RecordingHandle {
    /// Unique temp WAV path for this recording.
    pub path: PathBuf,
    /// Capture start time.
    pub started_at: Instant,
}

/// Capture lifecycle as the session sees it.
///
/// `start` posts level samples and at most one auto-stop into `events`;
/// `stop` is idempotent and returns `None` when nothing was captured.
pub trait RecordingControl {
    /// Begins a capture, reporting into the session event channel.
    ///
    /// # Errors
    /// Returns `CaptureError` if the input device cannot be opened.
    fn start(
        &mut self,
        events: UnboundedSender<SessionEvent>,
        generation: u64,
    ) -> Result<(), CaptureError>;

    /// Halts capture and the sampling loop, yielding the handle.
    fn stop(&mut self) -> Option<RecordingHandle>;
}

struct ActiveRecording {
    handle: RecordingHandle,
    consumer: HeapCons<f32>,
    is_recording: Arc<AtomicBool>,
    sampler: JoinHandle<()>,
    device_sample_rate: u32,
    device_channels: u16,
}

/// Microphone capture over CPAL.
///
/// The input stream is opened per recording so that a missing device is a
/// per-session failure and the next engage retries from scratch. Samples
/// move out of the realtime callback through a lock-free ring buffer; the
/// callback additionally publishes each buffer's mean-square power for the
/// 50 ms sampling loop.
pub struct AudioCapture {
    audio: AudioConfig,
    endpointing: EndpointingConfig,
    stream: Option<cpal::Stream>,
    active: Option<ActiveRecording>,
}

impl AudioCapture {
    /// Creates an idle capture shell; no device is touched until `start`.
    #[must_use]
    pub const fn new(audio: AudioConfig, endpointing: EndpointingConfig) -> Self {
        Self {
            audio,
            endpointing,
            stream: None,
            active: None,
        }
    }

    fn scratch_path() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        std::env::temp_dir().join(format!("dictation_{nanos}.wav"))
    }
}

impl RecordingControl for AudioCapture {
    fn start(
        &mut self,
        events: UnboundedSender<SessionEvent>,
        generation: u64,
    ) -> Result<(), CaptureError> {
        if self.active.is_some() {
            debug!("capture already active, ignoring start");
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoInputDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_owned());

        let supported = device.default_input_config()?;
        let device_sample_rate = supported.sample_rate().0;
        let device_channels = supported.channels();
        info!(
            device = %device_name,
            rate = device_sample_rate,
            channels = device_channels,
            "opening input device"
        );

        // Sized for the maximum recording so the callback never blocks.
        let capacity = (device_sample_rate as usize)
            * (device_channels as usize)
            * self.audio.max_recording_secs;
        let (mut producer, consumer) = HeapRb::<f32>::new(capacity).split();

        let is_recording = Arc::new(AtomicBool::new(true));
        let power = Arc::new(AtomicU32::new(0));

        let recording_flag = Arc::clone(&is_recording);
        let power_writer = Arc::clone(&power);
        let stream = device.build_input_stream(
            &supported.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !recording_flag.load(Ordering::Relaxed) {
                    return;
                }
                let pushed = producer.push_slice(data);
                if pushed < data.len() {
                    warn!("ring buffer full, dropped {} samples", data.len() - pushed);
                }
                power_writer.store(level::mean_square(data).to_bits(), Ordering::Relaxed);
            },
            move |err| {
                warn!("audio stream error: {}", err);
            },
            None,
        )?;
        stream.play()?;

        let handle = RecordingHandle {
            path: Self::scratch_path(),
            started_at: Instant::now(),
        };

        let interval = Duration::from_millis(self.audio.level_interval_ms);
        let scale = LevelScale::new(self.audio.level_floor_db, self.audio.level_ceiling_db);
        let mut endpointer = Endpointer::new(
            self.endpointing.silence_threshold_db,
            Duration::from_millis(self.endpointing.trailing_silence_ms),
            interval,
        );
        let power_reader = Arc::clone(&power);

        let sampler = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let power_db =
                    level::power_dbfs(f32::from_bits(power_reader.load(Ordering::Relaxed)));
                if events
                    .send(SessionEvent::Level(scale.normalize(power_db)))
                    .is_err()
                {
                    break;
                }
                if endpointer.observe(power_db) {
                    debug!(generation, "trailing silence exceeded, requesting auto-stop");
                    let _ = events.send(SessionEvent::AutoStop { generation });
                }
            }
        });

        info!(path = %handle.path.display(), "recording started");
        self.stream = Some(stream);
        self.active = Some(ActiveRecording {
            handle,
            consumer,
            is_recording,
            sampler,
            device_sample_rate,
            device_channels,
        });
        Ok(())
    }

    fn stop(&mut self) -> Option<RecordingHandle> {
        let mut active = self.active.take()?;

        active.is_recording.store(false, Ordering::Relaxed);
        active.sampler.abort();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("failed to pause input stream: {}", e);
            }
            drop(stream);
        }

        let mut raw = Vec::new();
        while let Some(sample) = active.consumer.try_pop() {
            raw.push(sample);
        }
        debug!(samples = raw.len(), "ring buffer drained");

        let samples = to_mono_16k(&raw, active.device_channels, active.device_sample_rate);
        if samples.is_empty() {
            info!("capture produced no data, discarding");
            return None;
        }

        if let Err(e) = wav::write_recording(&samples, &active.handle.path) {
            warn!("failed to write recording artifact: {e:#}");
            return None;
        }

        info!(
            samples = samples.len(),
            elapsed_ms = active.handle.started_at.elapsed().as_millis(),
            "recording stopped"
        );
        Some(active.handle)
    }
}

/// Downmixes interleaved frames to mono and linearly resamples to 16 kHz.
pub(crate) fn to_mono_16k(samples: &[f32], channels: u16, sample_rate: u32) -> Vec<f32> {
    let mono = downmix(samples, channels);
    resample(&mono, sample_rate, wav::SAMPLE_RATE)
}

fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = usize::from(channels);
    #[allow(clippy::cast_precision_loss)]
    let divisor = channels as f32;
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / divisor)
        .collect()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn resample(mono: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || mono.is_empty() {
        return mono.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = ((mono.len() as f64) / ratio).ceil() as usize;
    let last = mono.len() - 1;

    let mut out = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let position = (i as f64) * ratio;
        let index = (position.floor() as usize).min(last);
        let next = (index + 1).min(last);
        let fraction = (position - position.floor()) as f32;

        out.push(mono[index] + (mono[next] - mono[index]) * fraction);
    }
    out
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::unwrap_used)] // Test assertions with known exact values
mod tests {
    use super::*;

    #[test]
    fn stereo_frames_average_to_mono() {
        let stereo = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(to_mono_16k(&stereo, 2, 16_000), vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn four_channels_average_to_mono() {
        let frames = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(to_mono_16k(&frames, 4, 16_000), vec![2.5, 6.5]);
    }

    #[test]
    fn native_rate_mono_passes_through() {
        let mono = [0.1, 0.2, 0.3];
        assert_eq!(to_mono_16k(&mono, 1, 16_000), mono.to_vec());
    }

    #[test]
    fn downsampling_halves_sample_count() {
        let mono = vec![0.5_f32; 20];
        let out = to_mono_16k(&mono, 1, 32_000);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn upsampling_doubles_sample_count() {
        let mono = vec![0.5_f32; 10];
        let out = to_mono_16k(&mono, 1, 8_000);
        assert_eq!(out.len(), 20);
    }

    #[test]
    fn resampling_interpolates_within_bounds() {
        let mono = [-1.0, -0.5, 0.0, 0.5, 1.0];
        for &sample in &to_mono_16k(&mono, 1, 44_100) {
            assert!((-1.0..=1.0).contains(&sample));
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(to_mono_16k(&[], 2, 48_000).is_empty());
    }

    #[test]
    fn scratch_paths_are_unique() {
        let a = AudioCapture::scratch_path();
        std::thread::sleep(Duration::from_millis(1));
        let b = AudioCapture::scratch_path();
        assert_ne!(a, b);
    }

    // Hardware-dependent coverage, run with: cargo test -- --ignored

    #[tokio::test]
    #[ignore = "requires audio hardware"]
    async fn start_then_stop_produces_levels() {
        let mut capture = AudioCapture::new(AudioConfig::default(), EndpointingConfig::default());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        capture.start(tx, 1).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut saw_level = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::Level(_)) {
                saw_level = true;
            }
        }
        assert!(saw_level, "sampling loop should have posted level readings");

        if let Some(handle) = capture.stop() {
            let _ = std::fs::remove_file(handle.path);
        }
    }

    #[tokio::test]
    #[ignore = "requires audio hardware"]
    async fn stop_is_idempotent() {
        let mut capture = AudioCapture::new(AudioConfig::default(), EndpointingConfig::default());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        capture.start(tx, 1).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let first = capture.stop();
        let second = capture.stop();
        assert!(second.is_none());

        if let Some(handle) = first {
            let _ = std::fs::remove_file(handle.path);
        }
    }
}
