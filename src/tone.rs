use crate::prelude::*;
use std::f32::consts::PI;

// Fixture tone settings
pub const FIXTURE_FREQUENCY_HZ: f32 = 512.0;
pub const FIXTURE_SAMPLE_RATE: u32 = 48_000;
pub const FIXTURE_DURATION_SECS: f32 = 1.0;
pub const FIXTURE_CHANNELS: u16 = 2;
pub const FIXTURE_AMPLITUDE: f32 = 0.5;

/// Synthesize a sine tone as 16-bit PCM. All channels carry the same
/// signal; output is fully determined by the arguments.
pub fn sine(
    frequency_hz: f32,
    sample_rate: u32,
    duration_secs: f32,
    channels: u16,
    amplitude: f32,
) -> AudioBuffer {
    let frames = (sample_rate as f32 * duration_secs) as usize;

    let data: Vec<Vec<f32>> = (0..channels as usize)
        .into_par_iter()
        .map(|_| {
            (0..frames)
                .map(|i| {
                    let t = i as f32 / sample_rate as f32;
                    amplitude * (2.0 * PI * frequency_hz * t).sin()
                })
                .collect()
        })
        .collect();

    AudioBuffer {
        sample_rate,
        channels,
        format: SampleFormat::I16,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_matches_duration() {
        let buffer = sine(
            FIXTURE_FREQUENCY_HZ,
            FIXTURE_SAMPLE_RATE,
            FIXTURE_DURATION_SECS,
            FIXTURE_CHANNELS,
            FIXTURE_AMPLITUDE,
        );
        assert_eq!(buffer.data.len(), 2);
        assert_eq!(buffer.frames(), 48_000);
        assert_eq!(buffer.sample_rate, 48_000);
        assert_eq!(buffer.format, SampleFormat::I16);
    }

    #[test]
    fn channels_are_identical() {
        let buffer = sine(512.0, 8000, 0.25, 2, 0.5);
        assert_eq!(buffer.data[0], buffer.data[1]);
    }

    #[test]
    fn amplitude_is_bounded() {
        let buffer = sine(512.0, 8000, 0.25, 1, 0.5);
        assert!(buffer.data[0].iter().all(|s| s.abs() <= 0.5));
        // The signal actually moves
        assert!(buffer.data[0].iter().any(|s| s.abs() > 0.4));
    }

    #[test]
    fn synthesis_is_deterministic() {
        let a = sine(512.0, 48_000, 0.1, 2, 0.5);
        let b = sine(512.0, 48_000, 0.1, 2, 0.5);
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn starts_at_zero_crossing() {
        let buffer = sine(512.0, 48_000, 0.1, 1, 0.5);
        assert_eq!(buffer.data[0][0], 0.0);
    }
}
