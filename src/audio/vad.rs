use std::time::Duration;

/// Tunables for the offline trim pass.
///
/// The amplitude threshold is linear (peak sample magnitude), deliberately a
/// different unit from the endpointer's live dBFS threshold.
#[derive(Debug, Clone, Copy)]
pub struct VadTuning {
    /// Classification window length.
    pub window: Duration,
    /// Peak amplitude above which a window counts as speech (0.05 ≈ −26 dB).
    pub amplitude_threshold: f32,
    /// Silence kept on each side of a speech region.
    pub padding: Duration,
    /// Results shorter than this are assumed over-trimmed and discarded.
    pub min_output: Duration,
}

impl Default for VadTuning {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(30),
            amplitude_threshold: 0.05,
            padding: Duration::from_millis(300),
            min_output: Duration::from_millis(500),
        }
    }
}

/// Half-open sample interval of detected speech. Never escapes this module.
#[derive(Debug, Clone, Copy)]
struct SpeechRegion {
    start: usize,
    end: usize,
}

/// Removes leading, trailing, and internal silence from a finished recording.
///
/// Deterministic and side-effect free: one classification pass over fixed
/// windows, then a pad-and-merge pass over the detected regions. Two safety
/// fallbacks return the input unchanged: no speech found at all (the engine
/// downstream decides what silence means), and output shorter than half a
/// second (aggressive trimming is assumed to have eaten real speech).
#[must_use]
pub fn trim(samples: &[f32], sample_rate: u32, tuning: &VadTuning) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let window = samples_for(tuning.window, sample_rate).max(1);
    let regions = detect_regions(samples, window, tuning.amplitude_threshold);
    if regions.is_empty() {
        return samples.to_vec();
    }

    let padding = samples_for(tuning.padding, sample_rate);
    let merged = pad_and_merge(&regions, padding, samples.len());

    let mut out = Vec::with_capacity(merged.iter().map(|r| r.end - r.start).sum());
    for region in &merged {
        out.extend_from_slice(&samples[region.start..region.end]);
    }

    if out.len() < samples_for(tuning.min_output, sample_rate) {
        return samples.to_vec();
    }
    out
}

fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (duration.as_secs_f64() * f64::from(sample_rate)) as usize
    }
}

/// Single pass: peak-classify each window, merging consecutive speech
/// windows; a region closes on the first silence window.
fn detect_regions(samples: &[f32], window: usize, threshold: f32) -> Vec<SpeechRegion> {
    let mut regions = Vec::new();
    let mut open: Option<usize> = None;

    for (index, chunk) in samples.chunks(window).enumerate() {
        let peak = chunk.iter().fold(0.0_f32, |max, &s| max.max(s.abs()));
        let window_start = index * window;

        if peak > threshold {
            if open.is_none() {
                open = Some(window_start);
            }
        } else if let Some(start) = open.take() {
            regions.push(SpeechRegion {
                start,
                end: window_start,
            });
        }
    }

    if let Some(start) = open {
        regions.push(SpeechRegion {
            start,
            end: samples.len(),
        });
    }
    regions
}

/// Pads every region on both sides (clamped to the buffer) and merges any
/// padded region that starts at or before the previous one's padded end.
/// Regions arrive in detection order, which is start order.
fn pad_and_merge(regions: &[SpeechRegion], padding: usize, len: usize) -> Vec<SpeechRegion> {
    let mut merged: Vec<SpeechRegion> = Vec::with_capacity(regions.len());

    for region in regions {
        let start = region.start.saturating_sub(padding);
        let end = (region.end + padding).min(len);

        match merged.last_mut() {
            Some(previous) if start <= previous.end => {
                previous.end = previous.end.max(end);
            }
            _ => merged.push(SpeechRegion { start, end }),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn buffer_with_speech(len: usize, speech: std::ops::Range<usize>) -> Vec<f32> {
        let mut samples = vec![0.0_f32; len];
        for sample in &mut samples[speech] {
            *sample = 0.5;
        }
        samples
    }

    #[test]
    fn all_silence_returns_input_unchanged() {
        let samples = vec![0.01_f32; 32_000];
        let out = trim(&samples, RATE, &VadTuning::default());
        assert_eq!(out, samples);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert!(trim(&[], RATE, &VadTuning::default()).is_empty());
    }

    #[test]
    fn leading_and_trailing_silence_is_removed() {
        // 4 s buffer, speech in the middle second.
        let samples = buffer_with_speech(64_000, 24_000..40_000);
        let out = trim(&samples, RATE, &VadTuning::default());

        // Speech plus at most 300 ms padding on each side.
        assert!(out.len() < samples.len());
        assert!(out.len() >= 16_000);
        assert!(out.len() <= 16_000 + 2 * 4_800 + 2 * 480);
        assert!(out.iter().any(|&s| s > 0.4));
    }

    #[test]
    fn internal_silence_between_distant_regions_is_removed() {
        // Two speech bursts separated by 2 s of silence.
        let mut samples = buffer_with_speech(96_000, 8_000..16_000);
        for sample in &mut samples[72_000..80_000] {
            *sample = 0.5;
        }

        let out = trim(&samples, RATE, &VadTuning::default());
        assert!(out.len() < samples.len());
        // Both bursts survive.
        let speech_samples = out.iter().filter(|&&s| s > 0.4).count();
        assert_eq!(speech_samples, 16_000);
    }

    #[test]
    fn overlapping_padded_regions_merge() {
        // Two bursts 200 ms apart: padding (300 ms each side) overlaps, so
        // the gap must be kept rather than excised twice.
        let mut samples = buffer_with_speech(64_000, 16_000..19_200);
        for sample in &mut samples[22_400..25_600] {
            *sample = 0.5;
        }

        let out = trim(&samples, RATE, &VadTuning::default());
        // One contiguous region: bursts plus the 3_200-sample gap plus padding.
        let expected_min = (25_600 - 16_000) + 2 * 4_800 - 480;
        assert!(out.len() >= expected_min, "len {}", out.len());
        assert!(out.len() < samples.len());
    }

    #[test]
    fn trim_is_idempotent_on_single_region() {
        let samples = buffer_with_speech(16_000, 6_000..12_000);
        let tuning = VadTuning::default();

        let once = trim(&samples, RATE, &tuning);
        let twice = trim(&once, RATE, &tuning);
        assert_eq!(once, twice);
    }

    #[test]
    fn short_result_falls_back_to_original() {
        // A lone 30 ms blip at the very start: the padded region is only
        // ~330 ms, below the half-second floor.
        let samples = buffer_with_speech(16_000, 0..480);
        let out = trim(&samples, RATE, &VadTuning::default());
        assert_eq!(out, samples);
    }

    #[test]
    fn output_never_below_half_second_when_speech_present() {
        let tuning = VadTuning::default();
        for speech_start in [0, 480, 4_000, 10_000] {
            let samples = buffer_with_speech(24_000, speech_start..speech_start + 480);
            let out = trim(&samples, RATE, &tuning);
            assert!(
                out.len() >= 8_000,
                "speech at {speech_start}: got {} samples",
                out.len()
            );
        }
    }

    #[test]
    fn threshold_is_strict_peak_comparison() {
        // Exactly at the threshold classifies as silence.
        let samples = vec![0.05_f32; 32_000];
        let out = trim(&samples, RATE, &VadTuning::default());
        assert_eq!(out, samples);
    }

    #[test]
    fn speech_running_to_buffer_end_closes_region() {
        let samples = buffer_with_speech(32_000, 24_000..32_000);
        let out = trim(&samples, RATE, &VadTuning::default());
        assert!(out.len() < samples.len());
        assert!(out.iter().filter(|&&s| s > 0.4).count() >= 8_000 - 480);
    }
}
