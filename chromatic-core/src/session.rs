//! # Analysis Session
//!
//! Ties an [`AudioSource`] to the detectors:
//!
//! ```text
//! audio callback --chunks--> worker thread: SampleBuffer -> Analyzer -> throttle -> publish
//! ```
//!
//! - **Idle** until [`AnalysisSession::start`] acquires the source, then **Listening**
//! - One analysis pass per full window, strictly in order, on a dedicated worker
//! - Published readings are rate limited by a minimum interval
//! - [`AnalysisSession::stop`] (or dropping the session) releases the capture,
//!   joins the worker and clears the published state

use crate::analysis::Analyzer;
use crate::audio::{AudioCapture, AudioSource};
use crate::buffer::SampleBuffer;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::pitch::Algorithm;
use crate::tuning::{NoteResult, TuningStandard};
use crate::AnalysisResult;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A published analysis result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub analysis: AnalysisResult,
    /// Index of the analysed window since the session started, from 1.
    pub sequence: u64,
    pub published_at: Instant,
}

impl Reading {
    pub fn frequency(&self) -> Option<f32> {
        self.analysis.estimate.frequency()
    }

    pub fn note(&self) -> &NoteResult {
        &self.analysis.note
    }
}

/// What subscribers receive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Reading(Reading),
    /// The session stopped; any previously published reading is void.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
}

/// Minimum-interval rate limiter.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Whether an update at `now` may go out; records it if so.
    ///
    /// Accepted instants never decrease.
    pub fn ready(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now < last || now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

struct Published {
    listening: bool,
    latest: Option<Reading>,
}

/// State shared between the session and its worker.
struct Shared {
    algorithm: AtomicU8,
    tuning: Mutex<TuningStandard>,
    // Lock order: `published` before `subscribers`.
    published: Mutex<Published>,
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl Shared {
    fn new(algorithm: Algorithm, tuning: TuningStandard) -> Self {
        Self {
            algorithm: AtomicU8::new(algorithm.to_u8()),
            tuning: Mutex::new(tuning),
            published: Mutex::new(Published {
                listening: false,
                latest: None,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::from_u8(self.algorithm.load(Ordering::Acquire))
    }

    fn tuning(&self) -> TuningStandard {
        *self.tuning.lock()
    }

    fn begin(&self) {
        let mut published = self.published.lock();
        published.listening = true;
        published.latest = None;
    }

    fn is_listening(&self) -> bool {
        self.published.lock().listening
    }

    /// Leaves the listening state, optionally telling subscribers.
    ///
    /// Returns whether the session was listening; `Stopped` goes out at most
    /// once per listening period.
    fn end(&self, notify: bool) -> bool {
        let mut published = self.published.lock();
        let was_listening = std::mem::replace(&mut published.listening, false);
        published.latest = None;
        if notify && was_listening {
            self.broadcast(SessionEvent::Stopped);
        }
        was_listening
    }

    /// Stores and broadcasts `reading` unless the session stopped meanwhile.
    fn publish(&self, reading: Reading) {
        let mut published = self.published.lock();
        if !published.listening {
            return;
        }
        published.latest = Some(reading);
        self.broadcast(SessionEvent::Reading(reading));
    }

    fn broadcast(&self, event: SessionEvent) {
        // Receivers that went away are forgotten.
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event).is_ok());
    }
}

struct Active<C> {
    capture: C,
    shutdown: Sender<()>,
    worker: JoinHandle<()>,
    sample_rate: u32,
}

/// A listening session over an audio source.
///
/// ```
/// use chromatic_core::audio::FeedSource;
/// use chromatic_core::config::SessionConfig;
/// use chromatic_core::session::AnalysisSession;
///
/// let (source, _feed) = FeedSource::new(44_100);
/// let mut session = AnalysisSession::new(source, SessionConfig::default()).unwrap();
/// session.start().unwrap();
/// assert!(session.is_listening());
/// session.stop();
/// assert_eq!(session.latest_frequency(), None);
/// ```
pub struct AnalysisSession<S: AudioSource> {
    source: S,
    config: SessionConfig,
    shared: Arc<Shared>,
    active: Option<Active<S::Capture>>,
}

impl<S: AudioSource> AnalysisSession<S> {
    pub fn new(source: S, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(Shared::new(config.algorithm, config.tuning));
        Ok(Self {
            source,
            config,
            shared,
            active: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Acquires the audio source and starts analysing.
    ///
    /// A fresh sample buffer and analysis worker are created for every
    /// listening period. Calling this while listening does nothing. A session
    /// whose worker ended on its own (the source closed its channel) is
    /// cleaned up and started again.
    ///
    /// # Returns
    /// * `Ok(())` - The session is listening
    /// * `Err(Error::AcquisitionDenied)` - The source refused; the session stays idle
    /// * `Err(Error::InvalidConfig)` - The capture reported a sample rate of 0 Hz
    /// * `Err(Error::Worker)` - The analysis thread could not be spawned
    ///
    /// On every error the capture is released and `start` may be retried.
    pub fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            if self.shared.is_listening() {
                return Ok(());
            }
            self.stop();
        }

        let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(self.config.chunk_queue);
        let capture = self.source.begin_capture(chunk_tx).inspect_err(|e| {
            tracing::warn!("could not start listening: {e}");
        })?;

        let sample_rate = capture.sample_rate();
        if sample_rate == 0 {
            return Err(Error::InvalidConfig(
                "audio source reported a sample rate of 0 Hz".into(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let analysis = AnalysisLoop {
            buffer: SampleBuffer::new(self.config.window_size),
            analyzer: Analyzer::new(&self.config),
            throttle: Throttle::new(self.config.publish_interval()),
            shared: self.shared.clone(),
            sample_rate,
            sequence: 0,
        };

        self.shared.begin();
        let worker = thread::Builder::new()
            .name("pitch-analysis".into())
            .spawn(move || run_worker(chunk_rx, shutdown_rx, analysis));
        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                self.shared.end(false);
                return Err(Error::Worker(e));
            }
        };

        tracing::info!(
            sample_rate,
            window_size = self.config.window_size,
            algorithm = %self.algorithm(),
            "listening"
        );
        self.active = Some(Active {
            capture,
            shutdown: shutdown_tx,
            worker,
            sample_rate,
        });
        Ok(())
    }

    /// Releases the audio source and discards unanalysed samples. No-op while idle.
    pub fn stop(&mut self) {
        let Some(Active {
            capture,
            shutdown,
            worker,
            ..
        }) = self.active.take()
        else {
            return;
        };

        self.shared.end(true);
        let _ = shutdown.try_send(());
        drop(capture);
        if worker.join().is_err() {
            tracing::error!("analysis worker panicked");
        }
        tracing::info!("stopped listening");
    }

    /// False once stopped, and also once the worker has ended on its own.
    pub fn is_listening(&self) -> bool {
        self.active.is_some() && self.shared.is_listening()
    }

    pub fn state(&self) -> SessionState {
        if self.is_listening() {
            SessionState::Listening
        } else {
            SessionState::Idle
        }
    }

    /// Sample rate of the running capture.
    pub fn sample_rate(&self) -> Option<u32> {
        self.active
            .as_ref()
            .filter(|_| self.shared.is_listening())
            .map(|active| active.sample_rate)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.shared.algorithm()
    }

    /// Switches detectors; the next analysed window uses `algorithm`.
    pub fn set_algorithm(&self, algorithm: Algorithm) {
        let previous = Algorithm::from_u8(
            self.shared
                .algorithm
                .swap(algorithm.to_u8(), Ordering::AcqRel),
        );
        if previous != algorithm {
            tracing::debug!(%previous, %algorithm, "algorithm changed");
        }
    }

    pub fn tuning_standard(&self) -> TuningStandard {
        self.shared.tuning()
    }

    /// Changes the reference pitch; the next analysed window uses `tuning`.
    ///
    /// A reference that is not a positive finite frequency is rejected with
    /// [`Error::InvalidConfig`] and the current standard is kept.
    pub fn set_tuning_standard(&self, tuning: TuningStandard) -> Result<()> {
        tuning.validate()?;
        let previous = std::mem::replace(&mut *self.shared.tuning.lock(), tuning);
        if previous != tuning {
            tracing::debug!(%previous, %tuning, "tuning standard changed");
        }
        Ok(())
    }

    /// The most recent published reading; `None` while idle.
    pub fn latest(&self) -> Option<Reading> {
        self.shared.published.lock().latest
    }

    pub fn latest_frequency(&self) -> Option<f32> {
        self.latest().and_then(|reading| reading.frequency())
    }

    pub fn latest_note(&self) -> Option<NoteResult> {
        self.latest()
            .map(|reading| reading.analysis.note)
            .filter(|note| !note.is_absent())
    }

    /// Receives every published reading and every stop, across restarts.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }
}

impl<S: AudioSource> Drop for AnalysisSession<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker-side state of one listening period.
struct AnalysisLoop {
    buffer: SampleBuffer,
    analyzer: Analyzer,
    throttle: Throttle,
    shared: Arc<Shared>,
    sample_rate: u32,
    sequence: u64,
}

impl AnalysisLoop {
    fn feed(&mut self, chunk: &[f32]) {
        let Self {
            buffer,
            analyzer,
            throttle,
            shared,
            sample_rate,
            sequence,
        } = self;

        buffer.push_chunk(chunk, |window| {
            // Controls are read once per pass; changes apply from the next window.
            let analysis = analyzer.analyze(window, *sample_rate, shared.algorithm(), shared.tuning());
            *sequence += 1;
            tracing::trace!(
                sequence = *sequence,
                estimate = ?analysis.estimate,
                "analysed window"
            );

            let now = Instant::now();
            if throttle.ready(now) {
                shared.publish(Reading {
                    analysis,
                    sequence: *sequence,
                    published_at: now,
                });
            }
        });
    }
}

/// Ends the listening period when the worker exits without a stop request,
/// including by panic.
struct ExitGuard {
    shared: Arc<Shared>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if self.shared.end(true) {
            if thread::panicking() {
                tracing::error!("analysis worker panicked; session stopped");
            } else {
                tracing::warn!("analysis worker ended; session stopped");
            }
        }
    }
}

fn run_worker(chunks: Receiver<Vec<f32>>, shutdown: Receiver<()>, mut analysis: AnalysisLoop) {
    let _guard = ExitGuard {
        shared: analysis.shared.clone(),
    };
    loop {
        crossbeam_channel::select! {
            recv(chunks) -> msg => match msg {
                Ok(chunk) => analysis.feed(&chunk),
                Err(_) => {
                    tracing::debug!("audio source closed");
                    break;
                }
            },
            recv(shutdown) -> _ => break,
        }
    }
    tracing::debug!(windows = analysis.sequence, "analysis worker finished");
}
