//! YIN estimator.
//!
//! Only the first N/2 lags of a window of N samples are examined, and every
//! lag sums the same N/2 squared differences.

use super::{parabolic_offset, Algorithm, FrequencyRange, PitchDetector, PitchEstimate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YinConfig {
    /// Absolute threshold on the cumulative mean normalized difference.
    pub threshold: f32,
}

impl Default for YinConfig {
    fn default() -> Self {
        Self { threshold: 0.1 }
    }
}

/// YIN pitch detector.
///
/// Keeps its difference buffer between passes so repeated windows of the same
/// size do not allocate.
#[derive(Debug, Clone)]
pub struct YinDetector {
    config: YinConfig,
    range: FrequencyRange,
    yin_buffer: Vec<f32>,
}

impl YinDetector {
    pub fn new(config: YinConfig, range: FrequencyRange) -> Self {
        Self {
            config,
            range,
            yin_buffer: Vec::new(),
        }
    }

    /// The cumulative mean normalized difference of the last pass.
    pub fn normalized_difference(&self) -> &[f32] {
        &self.yin_buffer
    }
}

impl Default for YinDetector {
    fn default() -> Self {
        Self::new(YinConfig::default(), FrequencyRange::default())
    }
}

impl PitchDetector for YinDetector {
    fn estimate(&mut self, signal: &[f32], sample_rate: u32) -> PitchEstimate {
        let half = signal.len() / 2;
        if half < 3 || sample_rate == 0 {
            return PitchEstimate::NoPitch;
        }

        self.yin_buffer.clear();
        self.yin_buffer.resize(half, 0.0);
        let yin_buffer = &mut self.yin_buffer[..];

        // --- Step 1: Difference function ---
        for (tau, slot) in yin_buffer.iter_mut().enumerate() {
            *slot = signal[..half]
                .iter()
                .zip(&signal[tau..tau + half])
                .map(|(&a, &b)| {
                    let delta = a - b;
                    delta * delta
                })
                .sum();
        }

        // --- Step 2: Cumulative mean normalized difference ---
        yin_buffer[0] = 1.0;
        let mut running_sum = 0.0;
        for tau in 1..half {
            running_sum += yin_buffer[tau];
            yin_buffer[tau] = if running_sum > 0.0 {
                yin_buffer[tau] * tau as f32 / running_sum
            } else {
                // Silent window: nothing to normalize against.
                1.0
            };
        }

        // --- Step 3: First dip below the threshold, then walk down to its minimum ---
        let threshold = self.config.threshold;
        let Some(mut period) = (2..half).find(|&tau| yin_buffer[tau] < threshold) else {
            return PitchEstimate::NoPitch;
        };
        while period + 1 < half && yin_buffer[period + 1] < yin_buffer[period] {
            period += 1;
        }

        // --- Step 4: Parabolic interpolation for sub-sample precision ---
        let adjustment = if period + 1 < half {
            parabolic_offset(
                yin_buffer[period - 1],
                yin_buffer[period],
                yin_buffer[period + 1],
            )
        } else {
            0.0
        };

        let frequency = sample_rate as f32 / (period as f32 + adjustment);
        tracing::trace!(period, adjustment, frequency, "yin pass");
        self.range.gate(frequency)
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Yin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn detects_a440() {
        let signal = sine(440.0, 44100, 4096);
        let mut detector = YinDetector::default();
        let frequency = detector.estimate(&signal, 44100).frequency().unwrap();
        assert!((frequency - 440.0).abs() < 1.0, "got {frequency}");
    }

    #[test]
    fn normalized_difference_starts_at_one() {
        let signal = sine(220.0, 44100, 2048);
        let mut detector = YinDetector::default();
        detector.estimate(&signal, 44100);
        let cmnd = detector.normalized_difference();
        assert_eq!(cmnd.len(), 1024);
        assert_eq!(cmnd[0], 1.0);
        // Near the period (~200.45 lags) the normalized difference is tiny.
        assert!(cmnd[200] < 0.01);
    }

    #[test]
    fn silence_has_no_pitch() {
        let mut detector = YinDetector::default();
        assert_eq!(detector.estimate(&[0.0; 4096], 44100), PitchEstimate::NoPitch);
    }

    #[test]
    fn tiny_windows_and_zero_rate_have_no_pitch() {
        let mut detector = YinDetector::default();
        assert_eq!(detector.estimate(&[0.1, -0.1, 0.1, -0.1], 44100), PitchEstimate::NoPitch);
        let signal = sine(220.0, 44100, 2048);
        assert_eq!(detector.estimate(&signal, 0), PitchEstimate::NoPitch);
    }

    #[test]
    fn out_of_band_tones_are_rejected() {
        let mut detector = YinDetector::default();
        // 2 kHz is periodic enough but above the instrument band.
        let signal = sine(2000.0, 44100, 4096);
        assert_eq!(detector.estimate(&signal, 44100), PitchEstimate::NoPitch);

        let mut wide = YinDetector::new(
            YinConfig::default(),
            FrequencyRange {
                min: 50.0,
                max: 4000.0,
            },
        );
        let frequency = wide.estimate(&signal, 44100).frequency().unwrap();
        assert!((frequency - 2000.0).abs() < 5.0, "got {frequency}");
    }

    #[test]
    fn reuses_buffer_across_window_sizes() {
        let mut detector = YinDetector::default();
        detector.estimate(&sine(220.0, 44100, 4096), 44100);
        assert_eq!(detector.normalized_difference().len(), 2048);
        let frequency = detector
            .estimate(&sine(330.0, 44100, 2048), 44100)
            .frequency()
            .unwrap();
        assert_eq!(detector.normalized_difference().len(), 1024);
        assert!((frequency - 330.0).abs() < 1.0, "got {frequency}");
    }
}
