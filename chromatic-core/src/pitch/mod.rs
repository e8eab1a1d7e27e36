//! # Pitch Detection Module
//!
//! Two interchangeable fundamental-frequency estimators working on one full
//! analysis window at a time:
//!
//! - [`YinDetector`]: cumulative mean normalized difference with an absolute
//!   threshold (de Cheveigné & Kawahara, 2002).
//! - [`McLeodDetector`]: peak picking on the normalized square difference
//!   function (McLeod & Wyvill, 2005).
//!
//! Both compute their lag functions directly, so a pass costs O(N²) in the
//! window size N. Windows are expected to be a few thousand samples.

mod mpm;
mod yin;

pub use mpm::{McLeodDetector, MpmConfig};
pub use yin::{YinConfig, YinDetector};

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which estimator an analysis pass uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "YIN")]
    Yin,
    #[serde(rename = "MPM")]
    Mpm,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Yin => "YIN",
            Algorithm::Mpm => "MPM",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Algorithm::Yin => 0,
            Algorithm::Mpm => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Algorithm::Mpm,
            _ => Algorithm::Yin,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YIN" => Ok(Algorithm::Yin),
            "MPM" | "MCLEOD" => Ok(Algorithm::Mpm),
            other => Err(Error::InvalidConfig(format!("unknown algorithm '{other}'"))),
        }
    }
}

/// Outcome of one detection pass.
///
/// A detected frequency is always finite and strictly positive; silence and
/// noise are reported as [`PitchEstimate::NoPitch`], never as 0 Hz.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PitchEstimate {
    Detected(f32),
    #[default]
    NoPitch,
}

impl PitchEstimate {
    /// Wraps a frequency, rejecting zero, negative and non-finite values.
    pub fn from_frequency(frequency: f32) -> Self {
        if frequency.is_finite() && frequency > 0.0 {
            PitchEstimate::Detected(frequency)
        } else {
            PitchEstimate::NoPitch
        }
    }

    pub fn frequency(self) -> Option<f32> {
        match self {
            PitchEstimate::Detected(frequency) => Some(frequency),
            PitchEstimate::NoPitch => None,
        }
    }

    pub fn is_detected(self) -> bool {
        matches!(self, PitchEstimate::Detected(_))
    }
}

/// Band of fundamentals a detector may report.
///
/// This is a product constraint sized for the instruments the tuner targets,
/// not a physical limit: estimates outside it are reported as no pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min: f32,
    pub max: f32,
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self {
            min: 50.0,
            max: 1000.0,
        }
    }
}

impl FrequencyRange {
    pub fn contains(&self, frequency: f32) -> bool {
        frequency >= self.min && frequency <= self.max
    }

    /// Applies the band to a candidate frequency.
    pub(crate) fn gate(&self, frequency: f32) -> PitchEstimate {
        match PitchEstimate::from_frequency(frequency) {
            PitchEstimate::Detected(f) if self.contains(f) => PitchEstimate::Detected(f),
            _ => PitchEstimate::NoPitch,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min < self.max)
        {
            return Err(Error::InvalidConfig(format!(
                "frequency range must satisfy 0 < min < max, got {}..{}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// A fundamental-frequency estimator over a full analysis window.
pub trait PitchDetector: Send {
    /// Estimates the fundamental frequency of one analysis window.
    ///
    /// Detectors keep scratch buffers between calls, hence `&mut self`.
    ///
    /// # Arguments
    /// * `signal` - One full window of mono samples in [-1, 1]
    /// * `sample_rate` - Sampling rate of `signal` in Hz
    ///
    /// # Returns
    /// * [`PitchEstimate::Detected`] with a finite positive frequency inside the
    ///   detector's [`FrequencyRange`]
    /// * [`PitchEstimate::NoPitch`] for silence, noise, out-of-band results,
    ///   windows too short to analyse, or a zero sample rate
    fn estimate(&mut self, signal: &[f32], sample_rate: u32) -> PitchEstimate;

    fn algorithm(&self) -> Algorithm;
}

/// Sub-sample offset of the vertex of the parabola through three equally
/// spaced points centred on the middle one.
///
/// Falls back to 0 (the unrefined lag) when the points are collinear or the
/// result would not be finite.
pub(crate) fn parabolic_offset(prev: f32, center: f32, next: f32) -> f32 {
    let denominator = 2.0 * (prev - 2.0 * center + next);
    if denominator.abs() < f32::EPSILON {
        return 0.0;
    }
    let offset = (prev - next) / denominator;
    if offset.is_finite() { offset } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn estimate_never_holds_non_positive_frequencies() {
        assert_eq!(PitchEstimate::from_frequency(0.0), PitchEstimate::NoPitch);
        assert_eq!(PitchEstimate::from_frequency(-20.0), PitchEstimate::NoPitch);
        assert_eq!(PitchEstimate::from_frequency(f32::NAN), PitchEstimate::NoPitch);
        assert_eq!(
            PitchEstimate::from_frequency(f32::INFINITY),
            PitchEstimate::NoPitch
        );
        assert_eq!(PitchEstimate::from_frequency(220.0).frequency(), Some(220.0));
    }

    #[test]
    fn parabola_vertex() {
        // y = -(x - 0.25)^2 sampled at -1, 0, 1
        let f = |x: f32| -(x - 0.25) * (x - 0.25);
        assert_relative_eq!(parabolic_offset(f(-1.0), f(0.0), f(1.0)), 0.25);
        // minimum works the same way
        let g = |x: f32| (x + 0.4) * (x + 0.4);
        assert_relative_eq!(parabolic_offset(g(-1.0), g(0.0), g(1.0)), -0.4, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_parabola_falls_back_to_integer_lag() {
        assert_eq!(parabolic_offset(1.0, 1.0, 1.0), 0.0);
        assert_eq!(parabolic_offset(0.0, 0.5, 1.0), 0.0);
        assert_eq!(parabolic_offset(f32::MAX, -f32::MAX, f32::MAX), 0.0);
    }

    #[test]
    fn range_gate() {
        let range = FrequencyRange::default();
        assert!(range.gate(440.0).is_detected());
        assert!(!range.gate(20.0).is_detected());
        assert!(!range.gate(4000.0).is_detected());
        assert!(range.validate().is_ok());
        assert!(FrequencyRange { min: 500.0, max: 100.0 }.validate().is_err());
    }

    #[test]
    fn algorithm_names() {
        assert_eq!("yin".parse::<Algorithm>().unwrap(), Algorithm::Yin);
        assert_eq!("MPM".parse::<Algorithm>().unwrap(), Algorithm::Mpm);
        assert!("fft".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::from_u8(Algorithm::Mpm.to_u8()), Algorithm::Mpm);
        assert_eq!(serde_json::to_string(&Algorithm::Mpm).unwrap(), "\"MPM\"");
    }
}
