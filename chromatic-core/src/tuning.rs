//! # Musical Tuning Module
//!
//! Maps detected frequencies onto the 12-tone equal-tempered scale relative to a
//! selectable reference pitch for A4.
//!
//! ## Features
//! - Historical and custom tuning standards (A440, A432, A415, ...)
//! - Frequency to note name, octave and cents deviation
//! - Note name ("C#3", "Bb2") to frequency conversion
//! - MIDI numbering where A4 is note 69

use crate::error::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// MIDI index of A4.
pub const A4_MIDI: i32 = 69;

/// Octave assumed by [`frequency_of_note`] when the name carries none.
const DEFAULT_OCTAVE: i32 = 4;

/// Reference pitch assigned to A4.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TuningStandard {
    /// Concert pitch, A4 = 440 Hz.
    #[default]
    A440,
    A432,
    /// Baroque pitch, A4 = 415.3 Hz.
    A415,
    /// French baroque pitch, A4 = 392 Hz.
    A392,
    /// Venetian pitch, A4 = 466.16 Hz.
    A466,
    /// Any other positive reference in Hz.
    Custom(f32),
}

impl TuningStandard {
    pub const PRESETS: [TuningStandard; 5] = [
        TuningStandard::A440,
        TuningStandard::A432,
        TuningStandard::A415,
        TuningStandard::A392,
        TuningStandard::A466,
    ];

    /// Frequency of A4 in Hz under this standard.
    pub fn reference_hz(self) -> f32 {
        match self {
            TuningStandard::A440 => 440.0,
            TuningStandard::A432 => 432.0,
            TuningStandard::A415 => 415.3,
            TuningStandard::A392 => 392.0,
            TuningStandard::A466 => 466.16,
            TuningStandard::Custom(hz) => hz,
        }
    }

    /// Whether the reference is a finite, strictly positive frequency.
    pub fn is_valid(self) -> bool {
        let hz = self.reference_hz();
        hz.is_finite() && hz > 0.0
    }

    /// Rejects references no note can be computed against.
    pub fn validate(self) -> Result<(), Error> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "tuning reference must be a positive frequency, got {}",
                self.reference_hz()
            )))
        }
    }

    /// Builds a standard from a reference frequency, preferring a named preset.
    pub fn from_reference(hz: f32) -> Result<Self, Error> {
        TuningStandard::Custom(hz).validate()?;
        Ok(Self::PRESETS
            .into_iter()
            .find(|preset| (preset.reference_hz() - hz).abs() < 1e-3)
            .unwrap_or(TuningStandard::Custom(hz)))
    }

    /// Short label used in settings and on screen ("440", "415", ...).
    pub fn label(self) -> String {
        match self {
            TuningStandard::A440 => "440".to_string(),
            TuningStandard::A432 => "432".to_string(),
            TuningStandard::A415 => "415".to_string(),
            TuningStandard::A392 => "392".to_string(),
            TuningStandard::A466 => "466".to_string(),
            TuningStandard::Custom(hz) => hz.to_string(),
        }
    }
}

impl fmt::Display for TuningStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A4 = {} Hz", self.reference_hz())
    }
}

impl FromStr for TuningStandard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix(['A', 'a']).unwrap_or(trimmed);
        match digits {
            "440" => Ok(TuningStandard::A440),
            "432" => Ok(TuningStandard::A432),
            "415" => Ok(TuningStandard::A415),
            "392" => Ok(TuningStandard::A392),
            "466" => Ok(TuningStandard::A466),
            other => {
                let hz: f32 = other.parse().map_err(|_| {
                    Error::InvalidConfig(format!("unknown tuning standard '{trimmed}'"))
                })?;
                Self::from_reference(hz)
            }
        }
    }
}

impl TryFrom<String> for TuningStandard {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TuningStandard> for String {
    fn from(value: TuningStandard) -> Self {
        value.label()
    }
}

/// One of the 12 pitch classes, in order starting at C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

impl NoteName {
    pub const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::DSharp,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::ASharp,
        NoteName::B,
    ];

    /// Pitch class of a MIDI note number; negative numbers wrap.
    pub fn from_midi(midi: i32) -> Self {
        Self::ALL[midi.rem_euclid(12) as usize]
    }

    /// Position in the octave, C = 0.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Sharp spelling ("C#").
    pub fn as_str(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::D => "D",
            NoteName::DSharp => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::A => "A",
            NoteName::ASharp => "A#",
            NoteName::B => "B",
        }
    }

    /// Flat spelling ("Db").
    pub fn flat_name(self) -> &'static str {
        match self {
            NoteName::CSharp => "Db",
            NoteName::DSharp => "Eb",
            NoteName::FSharp => "Gb",
            NoteName::GSharp => "Ab",
            NoteName::ASharp => "Bb",
            natural => natural.as_str(),
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both spellings of every pitch class, for name lookups.
static NOTE_MAP: Lazy<BTreeMap<&'static str, NoteName>> = Lazy::new(|| {
    NoteName::ALL
        .iter()
        .flat_map(|&note| [(note.as_str(), note), (note.flat_name(), note)])
        .collect()
});

/// Classification of a frequency against the equal-tempered scale.
///
/// Every field is `None` when the frequency could not be mapped (zero, negative
/// or not finite). `octave` alone is also `None` for notes below C0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteResult {
    pub note: Option<NoteName>,
    pub octave: Option<i32>,
    /// Deviation from the nearest note, roughly -50..=50.
    pub cents: Option<i32>,
    pub midi_note: Option<i32>,
    /// Frequency of the nearest equal-tempered note.
    pub exact_frequency: Option<f32>,
}

impl NoteResult {
    /// True when no note could be assigned.
    pub fn is_absent(&self) -> bool {
        self.note.is_none()
    }

    /// Note name with octave ("A4"), or just the pitch class below C0.
    pub fn label(&self) -> Option<String> {
        let note = self.note?;
        Some(match self.octave {
            Some(octave) => format!("{note}{octave}"),
            None => note.to_string(),
        })
    }
}

/// Finds the nearest note to `frequency` and how far off it is.
///
/// The nearest equal-tempered semitone is counted from A4 of `tuning`, and the
/// deviation from it is rounded to whole cents.
///
/// # Arguments
/// * `frequency` - Detected frequency in Hz
/// * `tuning` - Reference pitch for A4
///
/// # Returns
/// * A fully populated [`NoteResult`], or one with every field `None` when
///   `frequency` or the reference is zero, negative or not finite
///
/// ```
/// use chromatic_core::tuning::{classify, NoteName, TuningStandard};
///
/// let result = classify(440.0, TuningStandard::A440);
/// assert_eq!(result.note, Some(NoteName::A));
/// assert_eq!(result.octave, Some(4));
/// assert_eq!(result.cents, Some(0));
/// ```
pub fn classify(frequency: f32, tuning: TuningStandard) -> NoteResult {
    if !(frequency.is_finite() && frequency > 0.0 && tuning.is_valid()) {
        return NoteResult::default();
    }

    let reference = f64::from(tuning.reference_hz());
    let frequency = f64::from(frequency);

    let semitones_from_a4 = 12.0 * (frequency / reference).log2();
    let nearest_semitone = semitones_from_a4.round();
    let midi_note = A4_MIDI + nearest_semitone as i32;

    let octave = midi_note.div_euclid(12) - 1;
    let exact_frequency = reference * 2f64.powf(nearest_semitone / 12.0);
    let cents = (1200.0 * (frequency / exact_frequency).log2()).round() as i32;

    NoteResult {
        note: Some(NoteName::from_midi(midi_note)),
        octave: (octave >= 0).then_some(octave),
        cents: Some(cents),
        midi_note: Some(midi_note),
        exact_frequency: Some(exact_frequency as f32),
    }
}

/// Frequency of the note `semitones` away from A4.
pub fn exact_frequency_for_semitone(semitones: i32, tuning: TuningStandard) -> f32 {
    let reference = f64::from(tuning.reference_hz());
    (reference * 2f64.powf(f64::from(semitones) / 12.0)) as f32
}

/// Frequency of a MIDI note number.
pub fn midi_to_frequency(midi_note: i32, tuning: TuningStandard) -> f32 {
    exact_frequency_for_semitone(midi_note - A4_MIDI, tuning)
}

/// Equal-tempered frequency of a named note such as "A4", "C#3" or "Bb2".
///
/// Sharp and flat spellings are both accepted; a name without an octave is
/// taken to be in octave 4. Returns `None` for names that are not notes.
pub fn frequency_of_note(name: &str, tuning: TuningStandard) -> Option<f32> {
    let name = name.trim();
    let split = name
        .find(|c: char| c == '-' || c.is_ascii_digit())
        .unwrap_or(name.len());
    let (pitch_class, octave) = name.split_at(split);

    let note = NOTE_MAP.get(pitch_class)?;
    let octave = if octave.is_empty() {
        DEFAULT_OCTAVE
    } else {
        octave.parse::<i32>().ok()?
    };

    let semitones = note.index() as i32 - NoteName::A.index() as i32 + (octave - 4) * 12;
    Some(exact_frequency_for_semitone(semitones, tuning))
}

/// Calculates the deviation from a target frequency in cents.
///
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn cents_between(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
