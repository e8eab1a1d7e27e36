//! Fixed-size accumulation of incoming samples into analysis windows.
//!
//! Windows do not overlap: once the buffer fills it is handed out whole and
//! writing starts over from the beginning. This keeps one pass per window and
//! costs up to one window of latency.

/// Accumulates samples until exactly `capacity` of them are available.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    len: usize,
}

impl SampleBuffer {
    /// A buffer producing windows of `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Samples collected toward the next window.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends one sample and returns the full window when this sample completes it.
    pub fn push(&mut self, sample: f32) -> Option<&[f32]> {
        self.samples[self.len] = sample;
        self.len += 1;
        if self.len == self.samples.len() {
            self.len = 0;
            Some(&self.samples)
        } else {
            None
        }
    }

    /// Appends a chunk, calling `on_window` once for every window it completes.
    ///
    /// Returns the number of completed windows. Leftover samples stay buffered
    /// for the next chunk.
    pub fn push_chunk<F>(&mut self, mut chunk: &[f32], mut on_window: F) -> usize
    where
        F: FnMut(&[f32]),
    {
        let capacity = self.samples.len();
        let mut windows = 0;
        while !chunk.is_empty() {
            let take = (capacity - self.len).min(chunk.len());
            self.samples[self.len..self.len + take].copy_from_slice(&chunk[..take]);
            self.len += take;
            chunk = &chunk[take..];

            if self.len == capacity {
                self.len = 0;
                windows += 1;
                on_window(&self.samples);
            }
        }
        windows
    }

    /// Discards any partially collected window.
    pub fn clear(&mut self) {
        self.len = 0;
        self.samples.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_hands_out_full_windows() {
        let mut buffer = SampleBuffer::new(4);
        assert!(buffer.push(1.0).is_none());
        assert!(buffer.push(2.0).is_none());
        assert!(buffer.push(3.0).is_none());
        assert_eq!(buffer.push(4.0), Some(&[1.0, 2.0, 3.0, 4.0][..]));
        assert!(buffer.is_empty());

        // the next window starts from scratch
        for sample in [5.0, 6.0, 7.0] {
            assert!(buffer.push(sample).is_none());
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.push(8.0), Some(&[5.0, 6.0, 7.0, 8.0][..]));
    }

    #[test]
    fn chunks_split_across_windows() {
        let mut buffer = SampleBuffer::new(3);
        let mut windows = Vec::new();

        let completed = buffer.push_chunk(&[1.0, 2.0], |w| windows.push(w.to_vec()));
        assert_eq!(completed, 0);
        assert_eq!(buffer.len(), 2);

        let completed = buffer.push_chunk(&[3.0, 4.0, 5.0, 6.0, 7.0], |w| windows.push(w.to_vec()));
        assert_eq!(completed, 2);
        assert_eq!(windows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let mut buffer = SampleBuffer::new(8);
        assert_eq!(buffer.push_chunk(&[], |_| panic!("no window expected")), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn clear_discards_partial_window() {
        let mut buffer = SampleBuffer::new(4);
        buffer.push_chunk(&[0.5, 0.5, 0.5], |_| {});
        buffer.clear();
        assert!(buffer.is_empty());

        let mut seen = None;
        buffer.push_chunk(&[1.0, 1.0, 1.0, 1.0], |w| seen = Some(w.to_vec()));
        assert_eq!(seen, Some(vec![1.0; 4]));
    }

    #[test]
    fn capacity_is_fixed() {
        let mut buffer = SampleBuffer::new(16);
        buffer.push_chunk(&[0.0; 100], |w| assert_eq!(w.len(), 16));
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(SampleBuffer::new(0).capacity(), 1);
    }
}
