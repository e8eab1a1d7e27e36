//! # Audio Source Module
//!
//! The analysis session does not capture audio itself. It asks an
//! [`AudioSource`] to start delivering mono sample chunks into a channel, and
//! holds the returned [`AudioCapture`] for as long as it listens. Dropping the
//! capture releases the underlying device.
//!
//! ## Sources
//! - [`FeedSource`]: chunks pushed by the caller through a [`Feed`] handle
//!   (file players, foreign audio callbacks, tests)
//! - `CpalSource` (feature `capture`): the default input device via CPAL

#[cfg(feature = "capture")]
mod capture;

#[cfg(feature = "capture")]
pub use capture::{CpalCapture, CpalSource};

use crate::error::{Error, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;

/// Something that can start delivering audio on request.
pub trait AudioSource {
    type Capture: AudioCapture;

    /// Starts capture, sending mono chunks of samples in [-1, 1] to `chunks`.
    ///
    /// May block while the platform asks for permission. Delivery stops when the
    /// returned capture is dropped; a source that closes `chunks` early ends
    /// the listening session.
    ///
    /// # Arguments
    /// * `chunks` - Bounded queue feeding the analysis worker
    ///
    /// # Returns
    /// * `Ok(capture)` - A running capture reporting its fixed sample rate
    /// * `Err(Error::AcquisitionDenied)` - Permission refused, no device, or
    ///   the stream could not be opened
    fn begin_capture(&mut self, chunks: Sender<Vec<f32>>) -> Result<Self::Capture>;
}

/// A running capture. Dropping it stops delivery and releases the device.
pub trait AudioCapture {
    /// Sample rate of the delivered chunks in Hz; fixed for the capture's lifetime.
    fn sample_rate(&self) -> u32;
}

type Slot = Arc<Mutex<Option<Sender<Vec<f32>>>>>;

/// An audio source fed by hand through its [`Feed`].
#[derive(Debug)]
pub struct FeedSource {
    sample_rate: u32,
    slot: Slot,
}

/// Producer side of a [`FeedSource`]; cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct Feed {
    slot: Slot,
}

/// Capture handle of a [`FeedSource`].
#[derive(Debug)]
pub struct FeedCapture {
    sample_rate: u32,
    slot: Slot,
}

impl FeedSource {
    pub fn new(sample_rate: u32) -> (Self, Feed) {
        let slot: Slot = Arc::new(Mutex::new(None));
        let feed = Feed { slot: slot.clone() };
        (Self { sample_rate, slot }, feed)
    }
}

impl AudioSource for FeedSource {
    type Capture = FeedCapture;

    fn begin_capture(&mut self, chunks: Sender<Vec<f32>>) -> Result<FeedCapture> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(Error::AcquisitionDenied("feed is already capturing".into()));
        }
        *slot = Some(chunks);
        Ok(FeedCapture {
            sample_rate: self.sample_rate,
            slot: self.slot.clone(),
        })
    }
}

impl AudioCapture for FeedCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for FeedCapture {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

impl Feed {
    /// Whether a session is currently capturing from this feed.
    pub fn is_capturing(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Sends a chunk, waiting for room in the session's queue.
    ///
    /// Returns `false` when nothing is capturing.
    pub fn push(&self, chunk: &[f32]) -> bool {
        let sender = self.slot.lock().clone();
        match sender {
            Some(sender) => sender.send(chunk.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Sends a chunk without waiting; a full queue drops it.
    ///
    /// Suitable for real-time callbacks. Returns `false` when the chunk was not queued.
    pub fn try_push(&self, chunk: &[f32]) -> bool {
        let sender = self.slot.lock().clone();
        match sender {
            Some(sender) => sender.try_send(chunk.to_vec()).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_delivers_only_while_captured() {
        let (mut source, feed) = FeedSource::new(48_000);
        assert!(!feed.is_capturing());
        assert!(!feed.push(&[0.0; 4]));

        let (tx, rx) = crossbeam_channel::unbounded();
        let capture = source.begin_capture(tx).unwrap();
        assert_eq!(capture.sample_rate(), 48_000);
        assert!(feed.is_capturing());
        assert!(feed.push(&[0.25, -0.25]));
        assert_eq!(rx.try_recv().unwrap(), vec![0.25, -0.25]);

        drop(capture);
        assert!(!feed.is_capturing());
        assert!(!feed.push(&[0.0]));
    }

    #[test]
    fn feed_is_exclusive() {
        let (mut source, _feed) = FeedSource::new(44_100);
        let (tx, _rx) = crossbeam_channel::unbounded();
        let _capture = source.begin_capture(tx.clone()).unwrap();
        assert!(matches!(
            source.begin_capture(tx),
            Err(Error::AcquisitionDenied(_))
        ));
    }

    #[test]
    fn try_push_drops_when_full() {
        let (mut source, feed) = FeedSource::new(44_100);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _capture = source.begin_capture(tx).unwrap();
        assert!(feed.try_push(&[1.0]));
        assert!(!feed.try_push(&[2.0]));
        assert_eq!(rx.len(), 1);
    }
}
