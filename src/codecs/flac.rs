use crate::prelude::*;
use claxon::FlacReader;
use flacenc::component::BitRepr;
use flacenc::error::Verify;

// FLAC-specific constants
const FLAC_MARKER: &[u8; 4] = b"fLaC";

// Sample normalization constants
const I16_MAX_F: f32 = 32767.0;
const I16_DIVISOR: f32 = 32768.0;
const I24_MAX_F: f32 = 8388607.0;
const I24_DIVISOR: f32 = 8388608.0;
const I32_MAX_F: f32 = 2147483647.0;
const I32_DIVISOR: f32 = 2147483648.0;

// Small fixed block size; fixture clips are short and throwaway, so encode
// speed wins over compression ratio.
const FAST_BLOCK_SIZE: usize = 4096;

pub struct FlacCodec;

impl Codec for FlacCodec {
    fn file_extension(&self) -> &'static str {
        "flac"
    }

    fn validate_file_format(&self, data: &[u8]) -> R<()> {
        if data.len() < 4 {
            return Err(anyhow!("File too small to be a valid FLAC"));
        }

        // Check for 'fLaC' marker at the beginning of the file
        if &data[0..4] != FLAC_MARKER {
            return Err(anyhow!("Not a valid FLAC file: Missing fLaC marker"));
        }

        Ok(())
    }

    fn encode(&self, buffer: &AudioBuffer) -> R<Vec<u8>> {
        if buffer.data.is_empty() || buffer.data[0].is_empty() {
            return Err(anyhow!("Cannot encode empty audio buffer"));
        }

        let bits_per_sample = buffer.format.bits_per_sample();
        let channels = buffer.data.len();
        let sample_rate = buffer.sample_rate as usize;
        let num_samples = buffer.data[0].len();

        let scale_factor = match bits_per_sample {
            16 => I16_MAX_F,
            24 => I24_MAX_F,
            32 => I32_MAX_F,
            _ => {
                return Err(anyhow!(
                    "Unsupported bit depth for FLAC encoding: {}",
                    bits_per_sample
                ));
            }
        };

        let mut interleaved_samples = Vec::with_capacity(num_samples * channels);
        for i in 0..num_samples {
            for ch in 0..channels {
                let sample = buffer.data[ch][i];
                interleaved_samples.push((sample * scale_factor).round() as i32);
            }
        }

        let mut config = flacenc::config::Encoder::default();
        config.block_size = FAST_BLOCK_SIZE;

        let config = config
            .into_verified()
            .map_err(|e| anyhow!("Invalid FLAC encoder configuration: {:?}", e))?;

        let source = flacenc::source::MemSource::from_samples(
            &interleaved_samples,
            channels,
            bits_per_sample as usize,
            sample_rate,
        );

        let flac_stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
            .map_err(|e| anyhow!("FLAC encoding error: {:?}", e))?;

        // FLAC is typically ~50-60% of raw PCM
        let estimated_size = (num_samples * channels * (bits_per_sample as usize / 8) / 2) + 8192;
        let mut sink = flacenc::bitsink::ByteSink::new();
        sink.reserve(estimated_size);
        flac_stream.write(&mut sink)?;

        Ok(sink.as_slice().to_vec())
    }

    fn decode(&self, input: &[u8]) -> R<AudioBuffer> {
        self.validate_file_format(input)?;

        let cursor = Cursor::new(input);
        let mut reader = FlacReader::new(cursor)?;

        let streaminfo = reader.streaminfo();
        let sample_rate = streaminfo.sample_rate;
        let channels = streaminfo.channels as u16;
        let bits_per_sample = streaminfo.bits_per_sample as u16;

        let num_samples = streaminfo.samples.unwrap_or(0) as usize;
        let samples_per_channel = if channels > 0 { num_samples } else { 0 };

        let divisor = match bits_per_sample {
            16 => I16_DIVISOR,
            24 => I24_DIVISOR,
            32 => I32_DIVISOR,
            _ => (1u64 << (bits_per_sample - 1)) as f32,
        };

        let channel_count = channels as usize;
        let mut audio_data: Vec<Vec<f32>> =
            vec![Vec::with_capacity(samples_per_channel); channel_count];

        // Samples arrive interleaved; regroup one frame at a time
        let mut sample_buffer = Vec::with_capacity(channel_count);
        for sample_result in reader.samples() {
            let sample = sample_result.map_err(|e| anyhow!("Error reading FLAC samples: {}", e))?;
            sample_buffer.push(sample as f32 / divisor);

            if sample_buffer.len() == channel_count {
                for (ch, &sample) in sample_buffer.iter().enumerate() {
                    audio_data[ch].push(sample);
                }
                sample_buffer.clear();
            }
        }

        let format = match bits_per_sample {
            8 => SampleFormat::U8,
            16 => SampleFormat::I16,
            24 => SampleFormat::I24,
            _ => SampleFormat::I32,
        };

        Ok(AudioBuffer {
            sample_rate,
            channels,
            format,
            data: audio_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone;

    #[test]
    fn encode_produces_untagged_flac_stream() {
        let buffer = tone::sine(440.0, 8000, 0.1, 2, 0.5);
        let flac = FlacCodec.encode(&buffer).unwrap();

        assert_eq!(&flac[0..4], FLAC_MARKER);
        // No tag blocks outside the stream proper
        assert!(crate::id3::find_id3v1(&flac).is_none());
        assert!(!crate::id3::has_id3v2(&flac));
    }

    #[test]
    fn encode_decode_preserves_shape() {
        let buffer = tone::sine(440.0, 8000, 0.1, 2, 0.5);
        let flac = FlacCodec.encode(&buffer).unwrap();
        let decoded = FlacCodec.decode(&flac).unwrap();

        assert_eq!(decoded.sample_rate, buffer.sample_rate);
        assert_eq!(decoded.channels, buffer.channels);
        assert_eq!(decoded.format, SampleFormat::I16);
        assert_eq!(decoded.frames(), buffer.frames());
    }

    #[test]
    fn decode_is_deterministic_across_identical_streams() {
        let buffer = tone::sine(512.0, 8000, 0.05, 2, 0.5);
        let flac = FlacCodec.encode(&buffer).unwrap();
        let first = FlacCodec.decode(&flac).unwrap();
        let second = FlacCodec.decode(&flac).unwrap();
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn rejects_non_flac_input() {
        assert!(FlacCodec.validate_file_format(b"RIFF").is_err());
        assert!(FlacCodec.decode(b"RIFFxxxxWAVE").is_err());
    }
}
