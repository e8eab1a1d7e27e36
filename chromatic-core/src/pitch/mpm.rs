//! McLeod Pitch Method.
//!
//! The normalized square difference function (NSDF) is evaluated for every lag
//! of the window:
//!
//! ```text
//! nsdf(t) = 2 * Σ x[i] * x[i+t] / Σ (x[i]² + x[i+t]²)
//! ```
//!
//! It lies in [-1, 1] and peaks near 1 at multiples of the period. The highest
//! positive peak sets the reference; the earliest positive peak within
//! `cutoff` of it is taken as the period. On a stationary tone every period
//! multiple is a near-equal peak, so the earliest qualifying one is the
//! fundamental rather than an arbitrary multiple of it.

use super::{parabolic_offset, Algorithm, FrequencyRange, PitchDetector, PitchEstimate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpmConfig {
    /// Fraction of the highest peak a candidate must reach. `1.0` selects
    /// the highest peak itself.
    pub cutoff: f32,
    /// Minimum NSDF value of the selected peak.
    pub clarity_threshold: f32,
}

impl Default for MpmConfig {
    fn default() -> Self {
        Self {
            cutoff: 0.93,
            clarity_threshold: 0.5,
        }
    }
}

/// A positive local maximum of the NSDF.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    lag: usize,
    value: f32,
}

/// McLeod pitch detector.
#[derive(Debug, Clone)]
pub struct McLeodDetector {
    config: MpmConfig,
    range: FrequencyRange,
    nsdf: Vec<f32>,
    peaks: Vec<Peak>,
}

impl McLeodDetector {
    pub fn new(config: MpmConfig, range: FrequencyRange) -> Self {
        Self {
            config,
            range,
            nsdf: Vec::new(),
            peaks: Vec::new(),
        }
    }

    /// The NSDF of the last pass.
    pub fn nsdf(&self) -> &[f32] {
        &self.nsdf
    }
}

impl Default for McLeodDetector {
    fn default() -> Self {
        Self::new(MpmConfig::default(), FrequencyRange::default())
    }
}

/// Fills `nsdf` with the normalized square difference of `signal` for every lag.
fn normalized_square_difference(signal: &[f32], nsdf: &mut Vec<f32>) {
    let n = signal.len();
    nsdf.clear();
    nsdf.extend((0..n).map(|tau| {
        let (acf, divisor) = signal[..n - tau]
            .iter()
            .zip(&signal[tau..])
            .fold((0.0f32, 0.0f32), |(acf, divisor), (&a, &b)| {
                (acf + a * b, divisor + a * a + b * b)
            });
        if divisor != 0.0 { 2.0 * acf / divisor } else { 0.0 }
    }));
}

/// Collects the strictly positive strict local maxima of `nsdf`.
fn positive_peaks(nsdf: &[f32], peaks: &mut Vec<Peak>) {
    peaks.clear();
    peaks.extend(
        nsdf.windows(3)
            .enumerate()
            .filter(|(_, w)| w[1] > 0.0 && w[1] > w[0] && w[1] > w[2])
            .map(|(i, w)| Peak {
                lag: i + 1,
                value: w[1],
            }),
    );
}

/// Highest peak; the earliest one wins a tie.
fn highest_peak(peaks: &[Peak]) -> Option<Peak> {
    peaks.iter().copied().fold(None, |best, peak| match best {
        Some(best) if best.value >= peak.value => Some(best),
        _ => Some(peak),
    })
}

/// Earliest peak reaching `cutoff` times the highest one.
fn select_peak(peaks: &[Peak], cutoff: f32) -> Option<Peak> {
    let highest = highest_peak(peaks)?;
    let threshold = highest.value * cutoff;
    peaks
        .iter()
        .copied()
        .find(|peak| peak.value >= threshold)
        .or(Some(highest))
}

impl PitchDetector for McLeodDetector {
    fn estimate(&mut self, signal: &[f32], sample_rate: u32) -> PitchEstimate {
        if signal.len() < 3 || sample_rate == 0 {
            return PitchEstimate::NoPitch;
        }

        normalized_square_difference(signal, &mut self.nsdf);
        positive_peaks(&self.nsdf, &mut self.peaks);

        let Some(chosen) = select_peak(&self.peaks, self.config.cutoff) else {
            return PitchEstimate::NoPitch;
        };

        if chosen.value < self.config.clarity_threshold {
            return PitchEstimate::NoPitch;
        }

        // Peaks are interior points, so both neighbours exist.
        let adjustment = parabolic_offset(
            self.nsdf[chosen.lag - 1],
            self.nsdf[chosen.lag],
            self.nsdf[chosen.lag + 1],
        );
        let frequency = sample_rate as f32 / (chosen.lag as f32 + adjustment);
        tracing::trace!(
            lag = chosen.lag,
            clarity = chosen.value,
            adjustment,
            frequency,
            "mpm pass"
        );
        self.range.gate(frequency)
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Mpm
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
        let signal = sine(440.0, 44100, 2048);
        let mut detector = McLeodDetector::default();
        let frequency = detector.estimate(&signal, 44100).frequency().unwrap();
        assert!((frequency - 440.0).abs() < 1.0, "got {frequency}");
    }

    #[test]
    fn nsdf_is_one_at_zero_lag() {
        let signal = sine(300.0, 44100, 1024);
        let mut nsdf = Vec::new();
        normalized_square_difference(&signal, &mut nsdf);
        assert_eq!(nsdf.len(), 1024);
        assert!((nsdf[0] - 1.0).abs() < 1e-6);
        assert!(nsdf.iter().all(|v| (-1.0001..=1.0001).contains(v)));
    }

    #[test]
    fn peaks_are_strict_positive_maxima() {
        let nsdf = [1.0, 0.2, 0.5, 0.5, 0.1, -0.3, -0.1, -0.2, 0.7, 0.3];
        let mut peaks = Vec::new();
        positive_peaks(&nsdf, &mut peaks);
        // the 0.5 plateau is not a strict maximum, the -0.1 bump is not positive
        assert_eq!(peaks, vec![Peak { lag: 8, value: 0.7 }]);
    }

    #[test]
    fn highest_peak_prefers_earliest_on_tie() {
        let peaks = [
            Peak { lag: 10, value: 0.9 },
            Peak { lag: 20, value: 0.95 },
            Peak { lag: 30, value: 0.95 },
        ];
        assert_eq!(highest_peak(&peaks), Some(Peak { lag: 20, value: 0.95 }));
        assert_eq!(highest_peak(&[]), None);
    }

    #[test]
    fn cutoff_picks_earliest_strong_peak() {
        let peaks = [
            Peak { lag: 50, value: 0.4 },
            Peak { lag: 100, value: 0.97 },
            Peak { lag: 200, value: 0.99 },
            Peak { lag: 300, value: 0.995 },
        ];
        assert_eq!(select_peak(&peaks, 0.93).map(|p| p.lag), Some(100));
        // a cutoff of 1.0 is the plain highest-peak rule
        assert_eq!(select_peak(&peaks, 1.0).map(|p| p.lag), Some(300));
        assert_eq!(select_peak(&[], 0.93), None);
    }

    #[test]
    fn stationary_tone_is_not_reported_at_a_period_multiple() {
        // 220 Hz has a period of ~200.45 samples; lag 2205 lines up almost exactly
        // with 11 periods, much closer than lag 200 does with one.
        let signal = sine(220.0, 44100, 4096);
        let mut detector = McLeodDetector::default();
        let frequency = detector.estimate(&signal, 44100).frequency().unwrap();
        assert!((frequency - 220.0).abs() < 1.0, "got {frequency}");
    }

    #[test]
    fn silence_and_dc_have_no_pitch() {
        let mut detector = McLeodDetector::default();
        assert_eq!(detector.estimate(&[0.0; 2048], 44100), PitchEstimate::NoPitch);
        // constant signal: the NSDF is flat, so there are no strict peaks
        assert_eq!(detector.estimate(&[0.5; 2048], 44100), PitchEstimate::NoPitch);
    }
}
