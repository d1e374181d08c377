use crate::prelude::*;

// Format tags
const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

// Chunk Identifiers
const RIFF_CHUNK_ID: &[u8; 4] = b"RIFF";
const WAVE_FORMAT_ID: &[u8; 4] = b"WAVE";
const FMT_CHUNK_ID: &[u8; 4] = b"fmt ";
const DATA_CHUNK_ID: &[u8; 4] = b"data";
pub const LIST_CHUNK_ID: &[u8; 4] = b"LIST";
const INFO_TYPE_ID: &[u8; 4] = b"INFO";
const ISFT_ENTRY_ID: &[u8; 4] = b"ISFT";

// Chunk Structures
const STANDARD_FMT_CHUNK_SIZE: u32 = 16;
const HEADER_SIZE: usize = 12; // RIFF + size + WAVE

// Bit depth constants
const BIT_DEPTH_8: u16 = 8;
const BIT_DEPTH_16: u16 = 16;
const BIT_DEPTH_24: u16 = 24;
const BIT_DEPTH_32: u16 = 32;

// Sample conversion constants
const U8_SCALE: f32 = 127.0;
const U8_OFFSET: f32 = 128.0;
const I16_MAX_F: f32 = 32767.0;
const I16_DIVISOR: f32 = 32768.0;
const I24_MAX_F: f32 = 8388607.0;
const I24_DIVISOR: f32 = 8388608.0;
const I32_MAX_F: f32 = 2147483647.0;
const I32_DIVISOR: f32 = 2147483648.0;
const I24_SIGN_BIT: i32 = 0x800000;
const I24_SIGN_EXTENSION_MASK: i32 = -16777216; // 0xFF000000 as i32
const BYTE_MASK: i32 = 0xFF;

/// Name written into the LIST/INFO software entry, the same way synthesis
/// tools stamp the files they produce.
const WRITING_SOFTWARE: &str = "fixturegen";

pub struct WavCodec;

impl Codec for WavCodec {
    fn file_extension(&self) -> &'static str {
        "wav"
    }

    fn validate_file_format(&self, data: &[u8]) -> R<()> {
        // Check file size
        if data.len() < HEADER_SIZE {
            return Err(anyhow!("File too small to be a valid WAV"));
        }

        // Check for 'RIFF....WAVE' header
        if &data[0..4] != RIFF_CHUNK_ID || &data[8..12] != WAVE_FORMAT_ID {
            return Err(anyhow!("Invalid WAV File: Missing RIFF/WAVE signature"));
        }

        Ok(())
    }

    /// Writes RIFF / fmt / LIST(INFO) / data. The INFO chunk is always
    /// present; [`remove_list_chunk`] is the explicit normalization step.
    fn encode(&self, buffer: &AudioBuffer) -> R<Vec<u8>> {
        if buffer.data.is_empty() || buffer.data[0].is_empty() {
            return Err(anyhow!("Cannot encode empty audio buffer"));
        }

        // Ensure channel count in buffer is consistent with data
        let actual_channels = buffer.data.len() as u16;
        let channels = if actual_channels != buffer.channels {
            actual_channels
        } else {
            buffer.channels
        };

        let mut output = Cursor::new(Vec::new());

        // Placeholder for header
        output.write_all(RIFF_CHUNK_ID)?;
        output.write_u32::<LittleEndian>(0)?; // placeholder file size
        output.write_all(WAVE_FORMAT_ID)?;

        // ---- fmt chunk ----
        output.write_all(FMT_CHUNK_ID)?;
        output.write_u32::<LittleEndian>(STANDARD_FMT_CHUNK_SIZE)?; // PCM = 16 bytes
        let (format_tag, bits_per_sample) = match buffer.format {
            SampleFormat::U8 => (FORMAT_PCM, BIT_DEPTH_8),
            SampleFormat::I16 => (FORMAT_PCM, BIT_DEPTH_16),
            SampleFormat::I24 => (FORMAT_PCM, BIT_DEPTH_24),
            SampleFormat::I32 => (FORMAT_PCM, BIT_DEPTH_32),
            SampleFormat::F32 => (FORMAT_IEEE_FLOAT, BIT_DEPTH_32),
        };
        let sample_rate = buffer.sample_rate;
        let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
        let block_align = channels * bits_per_sample / 8;

        output.write_u16::<LittleEndian>(format_tag)?;
        output.write_u16::<LittleEndian>(channels)?;
        output.write_u32::<LittleEndian>(sample_rate)?;
        output.write_u32::<LittleEndian>(byte_rate)?;
        output.write_u16::<LittleEndian>(block_align)?;
        output.write_u16::<LittleEndian>(bits_per_sample)?;

        // ---- LIST chunk ----
        write_chunk(&mut output, LIST_CHUNK_ID, &build_info_payload())?;

        // ---- data chunk ----
        output.write_all(DATA_CHUNK_ID)?;
        let data_pos = output.position();
        output.write_u32::<LittleEndian>(0)?; // placeholder

        let start_data = output.position();

        let mut interleaved_bytes = Vec::new();
        encode_samples(&mut interleaved_bytes, buffer, bits_per_sample)?;
        output.write_all(&interleaved_bytes)?;

        let end_data = output.position();
        let data_size = (end_data - start_data) as u32;

        // Fill in data chunk size
        let mut out = output.into_inner();
        (&mut out[(data_pos as usize)..(data_pos as usize + 4)])
            .write_u32::<LittleEndian>(data_size)?;

        // Fill in RIFF file size
        let riff_size = out.len() as u32 - 8;
        (&mut out[4..8]).write_u32::<LittleEndian>(riff_size)?;

        Ok(out)
    }

    fn decode(&self, input: &[u8]) -> R<AudioBuffer> {
        self.validate_file_format(input)?;

        let mut cursor = Cursor::new(input);

        // Skip past the RIFF header we already validated (12 bytes)
        cursor.seek(SeekFrom::Start(HEADER_SIZE as u64))?;

        let mut fmt_chunk_found = false;
        let mut data_chunk_found = false;
        let mut sample_format = SampleFormat::I16;
        let mut channels = 0;
        let mut sample_rate = 0;
        let mut bits_per_sample = 0;
        let mut audio_data = vec![];

        while let Ok(chunk_id) = cursor.read_u32::<LittleEndian>() {
            let chunk_id = u32::to_le_bytes(chunk_id);
            let chunk_size = cursor.read_u32::<LittleEndian>()? as usize;
            match &chunk_id {
                FMT_CHUNK_ID => {
                    fmt_chunk_found = true;
                    let format_tag = cursor.read_u16::<LittleEndian>()?;
                    channels = cursor.read_u16::<LittleEndian>()?;
                    sample_rate = cursor.read_u32::<LittleEndian>()?;
                    cursor.read_u32::<LittleEndian>()?; // byte rate
                    cursor.read_u16::<LittleEndian>()?; // block align
                    bits_per_sample = cursor.read_u16::<LittleEndian>()?;

                    sample_format = match (format_tag, bits_per_sample) {
                        (FORMAT_PCM, BIT_DEPTH_8) => SampleFormat::U8,
                        (FORMAT_PCM, BIT_DEPTH_16) => SampleFormat::I16,
                        (FORMAT_PCM, BIT_DEPTH_24) => SampleFormat::I24,
                        (FORMAT_PCM, BIT_DEPTH_32) => SampleFormat::I32,
                        (FORMAT_IEEE_FLOAT, BIT_DEPTH_32) => SampleFormat::F32,
                        _ => {
                            return Err(anyhow!(
                                "Unsupported format: tag {}, bits {}",
                                format_tag,
                                bits_per_sample
                            ));
                        }
                    };

                    // Skip any extra bytes in the fmt chunk and the padding
                    // byte in one operation
                    let extra_bytes =
                        chunk_size.saturating_sub(STANDARD_FMT_CHUNK_SIZE as usize);
                    let padding_byte = chunk_size % 2;
                    cursor.seek(SeekFrom::Current((extra_bytes + padding_byte) as i64))?;
                }

                DATA_CHUNK_ID => {
                    data_chunk_found = true;
                    let mut raw_data = vec![0u8; chunk_size];
                    cursor.read_exact(&mut raw_data)?;

                    audio_data = decode_samples(
                        &raw_data,
                        channels,
                        bits_per_sample,
                        sample_format == SampleFormat::F32,
                    )?;

                    if chunk_size % 2 != 0 {
                        cursor.seek(SeekFrom::Current(1))?;
                    }
                }

                _ => {
                    // Skip chunk data and padding in one operation
                    let skip_bytes = chunk_size + (chunk_size % 2);
                    cursor.seek(SeekFrom::Current(skip_bytes as i64))?;
                }
            }
        }

        if !fmt_chunk_found || !data_chunk_found {
            return Err(anyhow!("Missing 'fmt ' or 'data' chunk"));
        }

        Ok(AudioBuffer {
            sample_rate,
            channels,
            format: sample_format,
            data: audio_data,
        })
    }
}

/// Remove the LIST chunk from a WAV file, leaving every other chunk intact
/// and fixing up the RIFF size. Input without a LIST chunk passes through
/// unchanged.
pub fn remove_list_chunk(input: &[u8]) -> R<Vec<u8>> {
    WavCodec.validate_file_format(input)?;

    let mut cursor = Cursor::new(input);
    let mut output = Cursor::new(Vec::new());

    // Copy the RIFF/WAVE header; its size field is rewritten at the end
    let mut riff_header = [0u8; 12];
    cursor.read_exact(&mut riff_header)?;
    output.write_all(&riff_header)?;

    let mut fmt_chunk_found = false;
    let mut data_chunk_found = false;

    while cursor.position() < input.len() as u64 {
        let mut chunk_id = [0u8; 4];
        if cursor.read(&mut chunk_id)? < 4 {
            break;
        }

        let chunk_size = cursor.read_u32::<LittleEndian>()? as usize;
        let chunk_start = cursor.position() as usize;
        if chunk_start + chunk_size > input.len() {
            return Err(anyhow!(
                "Chunk '{}' overruns the file",
                String::from_utf8_lossy(&chunk_id)
            ));
        }
        let padded_size = chunk_size + chunk_size % 2;
        let chunk_end = (chunk_start + padded_size).min(input.len());

        match &chunk_id {
            LIST_CHUNK_ID => {} // dropped
            _ => {
                if &chunk_id == FMT_CHUNK_ID {
                    fmt_chunk_found = true;
                } else if &chunk_id == DATA_CHUNK_ID {
                    data_chunk_found = true;
                }
                output.write_all(&chunk_id)?;
                output.write_u32::<LittleEndian>(chunk_size as u32)?;
                output.write_all(&input[chunk_start..chunk_end])?;
            }
        }

        cursor.seek(SeekFrom::Start(chunk_end as u64))?;
    }

    if !fmt_chunk_found || !data_chunk_found {
        return Err(anyhow!("Invalid WAV file: missing fmt or data chunk"));
    }

    // Update RIFF chunk size
    let mut result_data = output.into_inner();
    let final_size = result_data.len() as u32 - 8;
    (&mut result_data[4..8]).write_u32::<LittleEndian>(final_size)?;

    Ok(result_data)
}

/// Walk the chunk list and report whether a chunk with `id` is present.
pub fn contains_chunk(input: &[u8], id: &[u8; 4]) -> R<bool> {
    WavCodec.validate_file_format(input)?;

    let mut cursor = Cursor::new(input);
    cursor.seek(SeekFrom::Start(HEADER_SIZE as u64))?;

    while cursor.position() < input.len() as u64 {
        let mut chunk_id = [0u8; 4];
        if cursor.read(&mut chunk_id)? < 4 {
            break;
        }
        if &chunk_id == id {
            return Ok(true);
        }
        let chunk_size = cursor.read_u32::<LittleEndian>()? as usize;
        cursor.seek(SeekFrom::Current((chunk_size + chunk_size % 2) as i64))?;
    }

    Ok(false)
}

fn build_info_payload() -> Vec<u8> {
    let mut entry = WRITING_SOFTWARE.as_bytes().to_vec();
    entry.push(0); // INFO entries are null-terminated

    let mut payload = Vec::with_capacity(4 + 8 + entry.len() + 1);
    payload.extend_from_slice(INFO_TYPE_ID);
    payload.extend_from_slice(ISFT_ENTRY_ID);
    payload.extend_from_slice(&(entry.len() as u32).to_le_bytes());
    payload.extend_from_slice(&entry);
    if entry.len() % 2 == 1 {
        payload.push(0);
    }
    payload
}

fn decode_samples(
    input: &[u8],
    channels: u16,
    bits_per_sample: u16,
    is_float_format: bool,
) -> R<Vec<Vec<f32>>> {
    let bytes_per_sample = match bits_per_sample {
        BIT_DEPTH_8 => 1,
        BIT_DEPTH_16 => 2,
        BIT_DEPTH_24 => 3,
        BIT_DEPTH_32 => 4,
        _ => return Err(anyhow!("Unsupported bit depth")),
    };

    // Total frame count = total bytes / (bytes per sample * channel count)
    let frame_count = input.len() / (bytes_per_sample * channels as usize);
    if frame_count == 0 {
        return Err(anyhow!("No audio frames found in data"));
    }

    let output: Vec<Vec<f32>> = (0..channels as usize)
        .into_par_iter() // Parallelize over channels
        .map(|ch| {
            let mut channel_data = Vec::with_capacity(frame_count);

            for frame in 0..frame_count {
                // Byte index of this sample within the interleaved data
                let sample_idx = (frame * channels as usize + ch) * bytes_per_sample;
                if sample_idx + bytes_per_sample > input.len() {
                    break;
                }

                let val = match bits_per_sample {
                    BIT_DEPTH_8 => input[sample_idx] as f32 / U8_SCALE - 1.0,
                    BIT_DEPTH_16 => {
                        let val = i16::from_le_bytes([input[sample_idx], input[sample_idx + 1]]);
                        val as f32 / I16_DIVISOR
                    }
                    BIT_DEPTH_24 => {
                        let val = ((input[sample_idx + 2] as i32) << 16)
                            | ((input[sample_idx + 1] as i32) << 8)
                            | (input[sample_idx] as i32);
                        let val = if val & I24_SIGN_BIT != 0 {
                            val | I24_SIGN_EXTENSION_MASK
                        } else {
                            val
                        };
                        val as f32 / I24_DIVISOR
                    }
                    BIT_DEPTH_32 => {
                        if is_float_format {
                            f32::from_le_bytes([
                                input[sample_idx],
                                input[sample_idx + 1],
                                input[sample_idx + 2],
                                input[sample_idx + 3],
                            ])
                        } else {
                            let val = i32::from_le_bytes([
                                input[sample_idx],
                                input[sample_idx + 1],
                                input[sample_idx + 2],
                                input[sample_idx + 3],
                            ]);
                            val as f32 / I32_DIVISOR
                        }
                    }
                    _ => 0.0, // Should never reach here due to earlier check
                };

                channel_data.push(val);
            }

            channel_data
        })
        .collect();

    Ok(output)
}

fn encode_samples<W: Write>(out: &mut W, buffer: &AudioBuffer, bits_per_sample: u16) -> R<()> {
    // Ensure channel count doesn't exceed available data channels
    let available_channels = buffer.data.len();
    let channels = std::cmp::min(buffer.channels as usize, available_channels);
    let frames = buffer.data[0].len();

    for i in 0..frames {
        for ch in 0..channels {
            let sample = buffer.data[ch][i];
            match bits_per_sample {
                BIT_DEPTH_8 => {
                    let val = ((sample * U8_SCALE + U8_OFFSET).clamp(0.0, 255.0)) as u8;
                    out.write_u8(val)?;
                }
                BIT_DEPTH_16 => {
                    let val = (sample.clamp(-1.0, 1.0) * I16_MAX_F) as i16;
                    out.write_i16::<LittleEndian>(val)?;
                }
                BIT_DEPTH_24 => {
                    let val = (sample.clamp(-1.0, 1.0) * I24_MAX_F) as i32;
                    let bytes = [
                        (val & BYTE_MASK) as u8,
                        ((val >> 8) & BYTE_MASK) as u8,
                        ((val >> 16) & BYTE_MASK) as u8,
                    ];
                    out.write_all(&bytes)?;
                }
                BIT_DEPTH_32 => {
                    if buffer.format == SampleFormat::F32 {
                        out.write_f32::<LittleEndian>(sample)?;
                    } else {
                        let val = (sample.clamp(-1.0, 1.0) * I32_MAX_F) as i32;
                        out.write_i32::<LittleEndian>(val)?;
                    }
                }
                _ => return Err(anyhow!("Unsupported bit depth")),
            }
        }
    }

    Ok(())
}

fn write_chunk<W: Write>(writer: &mut W, id: &[u8], data: &[u8]) -> R<()> {
    writer.write_all(id)?;
    writer.write_u32::<LittleEndian>(data.len() as u32)?;
    writer.write_all(data)?;
    if data.len() % 2 == 1 {
        writer.write_all(&[0])?; // padding
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone;

    fn test_buffer() -> AudioBuffer {
        tone::sine(512.0, 8000, 0.1, 2, 0.5)
    }

    #[test]
    fn encoded_wav_carries_info_chunk() {
        let wav = WavCodec.encode(&test_buffer()).unwrap();
        assert!(contains_chunk(&wav, LIST_CHUNK_ID).unwrap());
        assert!(contains_chunk(&wav, FMT_CHUNK_ID).unwrap());
        assert!(contains_chunk(&wav, DATA_CHUNK_ID).unwrap());
    }

    #[test]
    fn remove_list_chunk_yields_canonical_layout() {
        let wav = WavCodec.encode(&test_buffer()).unwrap();
        let clean = remove_list_chunk(&wav).unwrap();

        assert!(!contains_chunk(&clean, LIST_CHUNK_ID).unwrap());

        // Canonical layout: RIFF header, fmt at 12, data at 36
        assert_eq!(&clean[0..4], RIFF_CHUNK_ID);
        let riff_size = u32::from_le_bytes(clean[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, clean.len() - 8);
        assert_eq!(&clean[12..16], FMT_CHUNK_ID);
        let fmt_size = u32::from_le_bytes(clean[16..20].try_into().unwrap());
        assert_eq!(fmt_size, STANDARD_FMT_CHUNK_SIZE);
        assert_eq!(&clean[36..40], DATA_CHUNK_ID);
        let data_size = u32::from_le_bytes(clean[40..44].try_into().unwrap());
        assert_eq!(data_size as usize, clean.len() - 44);
    }

    #[test]
    fn remove_list_chunk_preserves_sample_data() {
        let wav = WavCodec.encode(&test_buffer()).unwrap();
        let clean = remove_list_chunk(&wav).unwrap();

        let before = WavCodec.decode(&wav).unwrap();
        let after = WavCodec.decode(&clean).unwrap();
        assert_eq!(before.sample_rate, after.sample_rate);
        assert_eq!(before.channels, after.channels);
        assert_eq!(before.data, after.data);
    }

    #[test]
    fn remove_list_chunk_without_list_is_passthrough() {
        let wav = WavCodec.encode(&test_buffer()).unwrap();
        let clean = remove_list_chunk(&wav).unwrap();
        let again = remove_list_chunk(&clean).unwrap();
        assert_eq!(clean, again);
    }

    #[test]
    fn decode_roundtrip_within_16_bit_tolerance() {
        let buffer = test_buffer();
        let wav = WavCodec.encode(&buffer).unwrap();
        let decoded = WavCodec.decode(&wav).unwrap();

        assert_eq!(decoded.sample_rate, buffer.sample_rate);
        assert_eq!(decoded.channels, buffer.channels);
        assert_eq!(decoded.frames(), buffer.frames());
        for (orig, redone) in buffer.data[0].iter().zip(&decoded.data[0]) {
            assert!((orig - redone).abs() < 1.0 / I16_MAX_F);
        }
    }

    #[test]
    fn rejects_non_riff_input() {
        assert!(WavCodec.validate_file_format(b"not a wav file").is_err());
        assert!(remove_list_chunk(b"fLaC").is_err());
    }
}
