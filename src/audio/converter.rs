// Format converter: normalizes raw device audio to the canonical stream
// format (16 kHz mono 16-bit PCM).
//
// Multi-channel input selects channel 0 only. Secondary channels on
// loopback devices are frequently empty, and averaging them in would
// halve the usable signal.

use thiserror::Error;
use tracing::debug;

use super::chunk::CANONICAL_SAMPLE_RATE;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid input format: {0}")]
    InvalidFormat(String),
    #[error("ragged interleaved buffer: {samples} samples across {channels} channels")]
    RaggedBuffer { samples: usize, channels: u16 },
}

/// Converts interleaved device samples to canonical-format samples.
///
/// Each converter instance is owned exclusively by one source pipeline;
/// converters are never shared across pipelines or threads.
#[derive(Debug)]
pub struct FormatConverter {
    input_rate: u32,
    input_channels: u16,
}

impl FormatConverter {
    /// Create a converter for the given source format.
    ///
    /// A zero sample rate or channel count is a hard error; any valid
    /// format is accepted, including rates below the canonical rate
    /// (upsampled by interpolation).
    pub fn new(input_rate: u32, input_channels: u16) -> Result<Self, ConvertError> {
        if input_rate == 0 {
            return Err(ConvertError::InvalidFormat("sample rate is zero".into()));
        }
        if input_channels == 0 {
            return Err(ConvertError::InvalidFormat("channel count is zero".into()));
        }

        debug!(
            "Format converter: {}Hz/{}ch -> {}Hz/mono",
            input_rate, input_channels, CANONICAL_SAMPLE_RATE
        );

        Ok(Self {
            input_rate,
            input_channels,
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn input_channels(&self) -> u16 {
        self.input_channels
    }

    /// Output frame capacity for a given number of input frames:
    /// `ceil(input_frames * target_rate / input_rate)`.
    pub fn output_capacity(&self, input_frames: usize) -> usize {
        (input_frames * CANONICAL_SAMPLE_RATE as usize).div_ceil(self.input_rate as usize)
    }

    /// Convert one interleaved buffer to canonical-format samples.
    ///
    /// An empty input, or a conversion that lands on zero output frames,
    /// yields an empty vector rather than an error; momentary underruns
    /// must not turn into error storms. A buffer whose length is not a
    /// multiple of the channel count is a genuine converter error.
    pub fn convert(&self, interleaved: &[i16]) -> Result<Vec<i16>, ConvertError> {
        if interleaved.is_empty() {
            return Ok(Vec::new());
        }

        let channels = self.input_channels as usize;
        if interleaved.len() % channels != 0 {
            return Err(ConvertError::RaggedBuffer {
                samples: interleaved.len(),
                channels: self.input_channels,
            });
        }

        // Explicit channel map: channel 0 only.
        let mono: Vec<i16> = if channels == 1 {
            interleaved.to_vec()
        } else {
            interleaved.iter().step_by(channels).copied().collect()
        };

        if self.input_rate == CANONICAL_SAMPLE_RATE {
            return Ok(mono);
        }

        Ok(self.resample(&mono))
    }

    /// Linear-interpolation resample to the canonical rate.
    fn resample(&self, mono: &[i16]) -> Vec<i16> {
        let frames = mono.len();
        let out_len = self.output_capacity(frames);
        if out_len == 0 {
            return Vec::new();
        }

        let step = self.input_rate as f64 / CANONICAL_SAMPLE_RATE as f64;
        let mut out = Vec::with_capacity(out_len);

        for i in 0..out_len {
            let pos = i as f64 * step;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let a = mono[idx.min(frames - 1)] as f64;
            let b = mono[(idx + 1).min(frames - 1)] as f64;
            out.push((a + (b - a) * frac).round() as i16);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_rate_and_zero_channels() {
        assert!(FormatConverter::new(0, 1).is_err());
        assert!(FormatConverter::new(48000, 0).is_err());
    }

    #[test]
    fn test_passthrough_at_canonical_format() {
        let conv = FormatConverter::new(16000, 1).unwrap();
        let samples = vec![10, -20, 30, -40];

        assert_eq!(conv.convert(&samples).unwrap(), samples);
    }

    #[test]
    fn test_channel_zero_selection() {
        let conv = FormatConverter::new(16000, 2).unwrap();
        // Interleaved stereo: channel 1 is empty, as loopback devices often are
        let interleaved = vec![100, 0, 200, 0, 300, 0];

        assert_eq!(conv.convert(&interleaved).unwrap(), vec![100, 200, 300]);
    }

    #[test]
    fn test_ragged_buffer_is_error() {
        let conv = FormatConverter::new(48000, 2).unwrap();

        assert!(matches!(
            conv.convert(&[1, 2, 3]),
            Err(ConvertError::RaggedBuffer { .. })
        ));
    }

    #[test]
    fn test_empty_input_yields_empty_chunk() {
        let conv = FormatConverter::new(48000, 2).unwrap();

        assert!(conv.convert(&[]).unwrap().is_empty());
    }
}
