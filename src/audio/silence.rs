// Silence monitor: statistical dead-audio check on converted chunks.
//
// Detection is observability-only. A flagged chunk is logged and passed
// through untouched; silence never blocks or drops audio.

use tracing::warn;

use super::chunk::SourceKind;

/// RMS threshold on the normalized [0, 1] scale below which a chunk is
/// considered likely dead audio.
pub const SILENCE_RMS_THRESHOLD: f32 = 0.01;

/// Subsample stride for the RMS computation. Full-buffer RMS on every
/// 100 ms window is wasted CPU for a health check.
pub const SILENCE_SAMPLE_STRIDE: usize = 16;

#[derive(Debug, Clone)]
pub struct SilenceMonitor {
    threshold: f32,
    stride: usize,
}

impl Default for SilenceMonitor {
    fn default() -> Self {
        Self {
            threshold: SILENCE_RMS_THRESHOLD,
            stride: SILENCE_SAMPLE_STRIDE,
        }
    }
}

impl SilenceMonitor {
    pub fn new(threshold: f32, stride: usize) -> Self {
        Self {
            threshold,
            stride: stride.max(1),
        }
    }

    /// RMS over a strided subsample of the chunk, normalized to [0, 1].
    pub fn strided_rms(&self, samples: &[i16]) -> f32 {
        let mut sum = 0.0f64;
        let mut count = 0usize;

        for &sample in samples.iter().step_by(self.stride) {
            let normalized = sample as f64 / i16::MAX as f64;
            sum += normalized * normalized;
            count += 1;
        }

        if count == 0 {
            return 0.0;
        }

        (sum / count as f64).sqrt() as f32
    }

    /// True when the strided RMS falls below the threshold.
    pub fn is_silent(&self, samples: &[i16]) -> bool {
        self.strided_rms(samples) < self.threshold
    }

    /// Check one converted chunk and log a warning when it is likely dead.
    pub fn observe(&self, source: SourceKind, samples: &[i16]) {
        let rms = self.strided_rms(samples);
        if rms < self.threshold {
            warn!(
                "Likely dead audio on {}: strided RMS {:.4} below {:.4}",
                source.label(),
                rms,
                self.threshold
            );
        }
    }
}
