use crate::prelude::*;

pub mod flac;
pub mod wav;

pub use flac::FlacCodec;
pub use wav::WavCodec;

pub fn get_codec(file_path: &str) -> R<Box<dyn Codec>> {
    let extension = std::path::Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| anyhow!("Invalid file extension"))?;

    match extension.to_lowercase().as_str() {
        "wav" => Ok(Box::new(WavCodec)),
        "flac" => Ok(Box::new(FlacCodec)),
        _ => Err(anyhow!(
            "No codec found for extension: {}",
            extension
        )),
    }
}

#[derive(Debug, Default, Clone)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
    pub data: Vec<Vec<f32>>, // deinterleaved float audio
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.data.first().map(|ch| ch.len()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    U8,
    #[default]
    I16,
    I24,
    I32,
    F32,
}

impl SampleFormat {
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::I16 => 16,
            SampleFormat::I24 => 24,
            SampleFormat::I32 => 32,
            SampleFormat::F32 => 32,
        }
    }
}

pub trait Codec: Send + Sync {
    fn validate_file_format(&self, data: &[u8]) -> R<()>;
    fn file_extension(&self) -> &'static str;

    fn encode(&self, buffer: &AudioBuffer) -> R<Vec<u8>>;

    fn encode_file(&self, buffer: &AudioBuffer, file_path: &str) -> R<()> {
        let encoded_data = self.encode(buffer)?;
        std::fs::write(file_path, encoded_data)?;
        Ok(())
    }

    fn decode(&self, input: &[u8]) -> R<AudioBuffer>;

    fn decode_file(&self, file_path: &str) -> R<AudioBuffer> {
        let file = std::fs::File::open(file_path)?;
        let mapped_file = unsafe { MmapOptions::new().map(&file)? };
        self.decode(&mapped_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_dispatch_by_extension() {
        assert_eq!(get_codec("fixtures/input.wav").unwrap().file_extension(), "wav");
        assert_eq!(get_codec("fixtures/input.flac").unwrap().file_extension(), "flac");
        assert_eq!(get_codec("INPUT.WAV").unwrap().file_extension(), "wav");
        assert!(get_codec("notes.txt").is_err());
        assert!(get_codec("no_extension").is_err());
    }

    #[test]
    fn bits_per_sample_mapping() {
        assert_eq!(SampleFormat::U8.bits_per_sample(), 8);
        assert_eq!(SampleFormat::I16.bits_per_sample(), 16);
        assert_eq!(SampleFormat::I24.bits_per_sample(), 24);
        assert_eq!(SampleFormat::F32.bits_per_sample(), 32);
    }
}
