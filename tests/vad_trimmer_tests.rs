// Offline trimmer properties over synthetic waveforms.

use whisper_dictation::audio::vad::{trim, VadTuning};

const RATE: u32 = 16_000;
const HALF_SECOND: usize = 8_000;

fn silence(len: usize) -> Vec<f32> {
    vec![0.0; len]
}

/// A buffer with 0.5-amplitude square speech over the given sample ranges.
fn with_speech(len: usize, regions: &[std::ops::Range<usize>]) -> Vec<f32> {
    let mut samples = silence(len);
    for region in regions {
        for sample in &mut samples[region.clone()] {
            *sample = 0.5;
        }
    }
    samples
}

#[test]
fn all_below_threshold_input_is_returned_unchanged() {
    let tuning = VadTuning::default();

    let quiet = vec![0.04_f32; 48_000];
    assert_eq!(trim(&quiet, RATE, &tuning), quiet);

    let dithered: Vec<f32> = (0..48_000)
        .map(|i| if i % 2 == 0 { 0.01 } else { -0.01 })
        .collect();
    assert_eq!(trim(&dithered, RATE, &tuning), dithered);
}

#[test]
fn trimming_removes_long_leading_and_trailing_silence() {
    let tuning = VadTuning::default();
    // 5 s buffer with one speech second in the middle.
    let samples = with_speech(80_000, &[32_000..48_000]);

    let out = trim(&samples, RATE, &tuning);
    assert!(out.len() < samples.len());
    // All the speech energy survives.
    assert_eq!(out.iter().filter(|&&s| s > 0.4).count(), 16_000);
}

#[test]
fn trim_is_idempotent_on_a_single_bounded_region() {
    let tuning = VadTuning::default();
    let samples = with_speech(32_000, &[12_000..20_000]);

    let once = trim(&samples, RATE, &tuning);
    let twice = trim(&once, RATE, &tuning);
    assert_eq!(twice, once);
}

#[test]
fn output_is_never_shorter_than_half_a_second_when_speech_exists() {
    let tuning = VadTuning::default();

    // Sweep a short blip across a 2 s buffer; wherever it lands, the result
    // must never drop below rate/2 samples (the fallback reinstates the
    // original buffer when trimming was too aggressive).
    for start in (0..31_000).step_by(1_700) {
        let samples = with_speech(32_000, &[start..start + 700]);
        let out = trim(&samples, RATE, &tuning);
        assert!(
            out.len() >= HALF_SECOND,
            "blip at {start}: output shrank to {} samples",
            out.len()
        );
    }
}

#[test]
fn internal_pause_longer_than_padding_is_excised() {
    let tuning = VadTuning::default();
    // Two bursts with 3 s of silence between them.
    let samples = with_speech(96_000, &[8_000..16_000, 64_000..72_000]);

    let out = trim(&samples, RATE, &tuning);
    assert!(out.len() < samples.len());

    // The excised gap is what accounts for most of the reduction: both
    // bursts plus padding survive, the multi-second pause does not.
    let speech = out.iter().filter(|&&s| s > 0.4).count();
    assert_eq!(speech, 16_000);
    assert!(out.len() <= 16_000 + 4 * 4_800 + 4 * 480);
}

#[test]
fn close_pauses_are_bridged_by_padding() {
    let tuning = VadTuning::default();
    // Two bursts 150 ms apart: padded regions overlap and merge, so the
    // inter-word gap is preserved in the output.
    let gap_start = 24_000;
    let gap_end = gap_start + 2_400;
    let samples = with_speech(64_000, &[20_800..gap_start, gap_end..27_200]);

    let out = trim(&samples, RATE, &tuning);

    // The output must contain the silent gap between the bursts intact:
    // find the first and last loud samples and check the span.
    let first = out.iter().position(|&s| s > 0.4).unwrap();
    let last = out.iter().rposition(|&s| s > 0.4).unwrap();
    let span = last + 1 - first;
    assert_eq!(span, 27_200 - 20_800);
}

#[test]
fn speech_filling_the_whole_buffer_is_untouched() {
    let tuning = VadTuning::default();
    let samples = vec![0.5_f32; 32_000];
    assert_eq!(trim(&samples, RATE, &tuning), samples);
}

#[test]
fn empty_buffer_stays_empty() {
    assert!(trim(&[], RATE, &VadTuning::default()).is_empty());
}
