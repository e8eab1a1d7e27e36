//! Headless core of the chromatic tuner.
//!
//! This crate turns a live stream of mono audio samples into monophonic pitch
//! readings: it accumulates fixed-size windows, estimates the fundamental with
//! YIN or MPM, and maps the result onto the nearest equal-tempered note. It
//! contains no UI code; audio arrives through an [`audio::AudioSource`].

pub mod analysis;
pub mod audio;
pub mod buffer;
pub mod config;
pub mod error;
pub mod pitch;
pub mod session;
pub mod settings;
pub mod tuning;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use pitch::{Algorithm, PitchEstimate};
pub use session::{AnalysisSession, Reading, SessionEvent};
pub use tuning::{NoteName, NoteResult, TuningStandard};

use serde::{Deserialize, Serialize};

/// Outcome of one analysis pass over a full window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub estimate: PitchEstimate,
    /// All fields absent when `estimate` is [`PitchEstimate::NoPitch`].
    pub note: NoteResult,
    /// Detector that produced `estimate`.
    pub algorithm: Algorithm,
    /// Reference the note was computed against.
    pub tuning: TuningStandard,
}
