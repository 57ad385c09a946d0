//! Bounded time-series history for throughput and congestion charts.

use std::collections::VecDeque;

use serde::Serialize;

/// Maximum number of samples kept per buffer.
pub const HISTORY_CAPACITY: usize = 100;

/// One point of the throughput chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputSample {
    /// Unix time in fractional seconds.
    pub timestamp: f64,
    /// Megabits per second.
    pub throughput: f64,
    pub packets_sent: Option<u64>,
    pub retransmissions: Option<u64>,
}

/// One point of the congestion-window chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CongestionSample {
    /// Unix time in fractional seconds.
    pub timestamp: f64,
    pub cwnd: Option<f64>,
    pub ssthresh: Option<f64>,
    /// Smoothed RTT in milliseconds (the control plane reports seconds).
    pub rtt_millis: Option<f64>,
}

/// Append-only FIFO buffer holding at most [`HISTORY_CAPACITY`] samples.
///
/// The only mutations are [`push`](Self::push) and [`clear`](Self::clear);
/// consumers get read-only access through iterators.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer<T> {
    samples: VecDeque<T>,
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HistoryBuffer<T> {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// Append a sample, evicting the oldest one once over capacity.
    pub fn push(&mut self, sample: T) {
        self.samples.push_back(sample);
        if self.samples.len() > HISTORY_CAPACITY {
            self.samples.pop_front();
        }
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.samples.iter()
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }
}

impl<T: Serialize> Serialize for HistoryBuffer<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.samples.iter())
    }
}

/// Normalize values to the 0-7 range for an eight-level sparkline.
///
/// Returns an empty Vec if there are fewer than two values.
pub fn sparkline<I>(values: I) -> Vec<u8>
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if values.len() < 2 {
        return Vec::new();
    }

    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min).min(0.0);
    let range = (max - min).max(f64::EPSILON);

    values
        .iter()
        .map(|&v| {
            let normalized = ((v - min) / range * 7.0) as u8;
            normalized.min(7)
        })
        .collect()
}
