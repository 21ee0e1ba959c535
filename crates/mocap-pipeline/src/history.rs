use mocap_core::Real;
use std::collections::VecDeque;

/// Timestamped samples in arrival order, bounded to a time horizon.
///
/// Samples older than `horizon` relative to the newest one are dropped on
/// push. The newest sample is always kept.
#[derive(Debug, Clone)]
pub struct TimedHistory<T> {
    samples: VecDeque<(Real, T)>,
    horizon: Real,
}

impl<T> TimedHistory<T> {
    pub fn new(horizon: Real) -> Self {
        Self {
            samples: VecDeque::new(),
            horizon,
        }
    }

    pub fn push(&mut self, timestamp: Real, value: T) {
        self.samples.push_back((timestamp, value));
        while self.samples.len() > 1 {
            match self.samples.front() {
                Some((t, _)) if *t <= timestamp - self.horizon => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&(Real, T)> {
        self.samples.back()
    }

    /// Samples with `|timestamp - t| < half_width`, oldest first.
    pub fn window(&self, t: Real, half_width: Real) -> Vec<&(Real, T)> {
        self.samples
            .iter()
            .filter(|(ts, _)| (ts - t).abs() < half_width)
            .collect()
    }
}
