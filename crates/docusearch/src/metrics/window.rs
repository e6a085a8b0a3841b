//! Fixed-capacity rolling window of latency samples.

use std::collections::VecDeque;

/// Nearest-rank percentile over an already sorted slice.
///
/// `p` is clamped to `[0, 100]`. The rank is `floor(p / 100 * n)`, clamped to
/// the last index, so `p = 100` yields the maximum. Empty input yields `0.0`.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let len = sorted.len();
    let index = ((p / 100.0) * len as f64).floor() as usize;
    sorted[index.min(len - 1)]
}

/// Arithmetic mean, `0.0` for empty input.
pub fn mean_of(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sorts a sample copy in place using a total order (NaN sorts last).
pub fn sort_samples(samples: &mut [f64]) {
    samples.sort_by(|a, b| a.total_cmp(b));
}

/// FIFO buffer of the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// Creates an empty window.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "rolling window capacity must be > 0");
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Creates a window pre-filled with `samples`, keeping only the newest
    /// `capacity` of them.
    pub fn from_samples<I>(capacity: usize, samples: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut window = Self::new(capacity);
        for value in samples {
            window.push(value);
        }
        window
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Copy of the current samples in arrival order.
    pub fn samples(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    /// Nearest-rank percentile over a sorted copy of the window.
    pub fn percentile(&self, p: f64) -> f64 {
        let mut sorted = self.samples();
        sort_samples(&mut sorted);
        percentile_of_sorted(&sorted, p)
    }

    pub fn mean(&self) -> f64 {
        mean_of(&self.samples())
    }
}
