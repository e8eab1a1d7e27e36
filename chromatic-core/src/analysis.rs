//! One detection pass: window in, frequency and note out.

use crate::config::SessionConfig;
use crate::pitch::{Algorithm, McLeodDetector, PitchDetector, YinDetector};
use crate::tuning::{self, TuningStandard};
use crate::AnalysisResult;

/// Owns one detector per algorithm so switching between them keeps each
/// detector's scratch buffers warm.
#[derive(Debug, Clone)]
pub struct Analyzer {
    yin: YinDetector,
    mpm: McLeodDetector,
}

impl Analyzer {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            yin: YinDetector::new(config.yin, config.frequency_range),
            mpm: McLeodDetector::new(config.mpm, config.frequency_range),
        }
    }

    pub fn detector(&mut self, algorithm: Algorithm) -> &mut dyn PitchDetector {
        match algorithm {
            Algorithm::Yin => &mut self.yin,
            Algorithm::Mpm => &mut self.mpm,
        }
    }

    /// Estimates the pitch of `window` and maps it onto the scale of `tuning`.
    pub fn analyze(
        &mut self,
        window: &[f32],
        sample_rate: u32,
        algorithm: Algorithm,
        tuning: TuningStandard,
    ) -> AnalysisResult {
        let estimate = self.detector(algorithm).estimate(window, sample_rate);
        let note = match estimate.frequency() {
            Some(frequency) => tuning::classify(frequency, tuning),
            None => Default::default(),
        };
        AnalysisResult {
            estimate,
            note,
            algorithm,
            tuning,
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::PitchEstimate;
    use crate::tuning::NoteName;

    fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn both_algorithms_name_the_same_note() {
        let window = sine(196.0, 44100, 4096); // G3
        let mut analyzer = Analyzer::default();
        for algorithm in [Algorithm::Yin, Algorithm::Mpm] {
            let result = analyzer.analyze(&window, 44100, algorithm, TuningStandard::A440);
            assert_eq!(result.algorithm, algorithm);
            assert_eq!(result.note.note, Some(NoteName::G), "{algorithm}");
            assert_eq!(result.note.octave, Some(3), "{algorithm}");
            assert!(result.note.cents.unwrap().abs() <= 2, "{algorithm}");
        }
    }

    #[test]
    fn no_pitch_maps_to_absent_note() {
        let mut analyzer = Analyzer::default();
        let result = analyzer.analyze(&[0.0; 1024], 44100, Algorithm::Yin, TuningStandard::A440);
        assert_eq!(result.estimate, PitchEstimate::NoPitch);
        assert!(result.note.is_absent());
    }

    #[test]
    fn detector_matches_algorithm() {
        let mut analyzer = Analyzer::default();
        assert_eq!(analyzer.detector(Algorithm::Yin).algorithm(), Algorithm::Yin);
        assert_eq!(analyzer.detector(Algorithm::Mpm).algorithm(), Algorithm::Mpm);
    }
}
