//! Error type shared by every fallible operation of the core.
//!
//! "No pitch" and "frequency cannot be mapped" are ordinary values
//! ([`PitchEstimate::NoPitch`](crate::PitchEstimate) and an empty
//! [`NoteResult`](crate::tuning::NoteResult)), so they never show up here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The audio source could not be obtained (permission refused, no device, ...).
    #[error("audio source could not be acquired: {0}")]
    AcquisitionDenied(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("settings store: {0}")]
    Store(String),

    /// The analysis worker thread could not be spawned.
    #[error("analysis worker: {0}")]
    Worker(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
