use anyhow::{bail, Context, Result};
use std::io::Cursor;

use super::backend::AudioChunk;

/// Package buffered chunks into a single in-memory WAV file for upload
///
/// Chunks are concatenated in buffer order. The format (sample rate,
/// channels) is taken from the first chunk; all chunks in one session
/// share it.
pub fn chunks_to_wav(chunks: &[AudioChunk]) -> Result<Vec<u8>> {
    let first = match chunks.first() {
        Some(chunk) => chunk,
        None => bail!("No audio chunks to package"),
    };

    let spec = hound::WavSpec {
        channels: first.channels,
        sample_rate: first.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buffer, spec)
            .context("Failed to create WAV writer")?;

        for chunk in chunks {
            for &sample in &chunk.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
        }

        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(buffer.into_inner())
}
