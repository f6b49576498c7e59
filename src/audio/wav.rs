use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Sample rate of every recording artifact and of the transcriber input.
pub const SAMPLE_RATE: u32 = 16_000;

/// Writes a finished recording as mono 16 kHz 16-bit PCM.
///
/// # Errors
/// Returns error if directory creation or file write fails.
pub fn write_recording(samples: &[f32], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("failed to create recording directory")?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).context("failed to create WAV file")?;
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(quantized)
            .context("failed to write sample")?;
    }
    writer.finalize().context("failed to finalize WAV file")?;

    tracing::debug!(path = %path.display(), samples = samples.len(), "recording written");
    Ok(())
}

/// Reads a recording artifact back as normalized f32 samples.
///
/// # Errors
/// Returns error if the file is missing or not the 16-bit mono format this
/// crate writes.
pub fn read_recording(path: &Path) -> Result<Vec<f32>> {
    let mut reader = WavReader::open(path).context("failed to open WAV file")?;
    let spec = reader.spec();
    anyhow::ensure!(
        spec.channels == 1 && spec.sample_format == SampleFormat::Int && spec.bits_per_sample == 16,
        "unexpected WAV format: {} ch / {} bit",
        spec.channels,
        spec.bits_per_sample
    );

    reader
        .samples::<i16>()
        .map(|sample| {
            sample
                .map(|s| f32::from(s) / f32::from(i16::MAX))
                .context("failed to read sample")
        })
        .collect()
}
