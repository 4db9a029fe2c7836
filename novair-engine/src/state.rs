//! Bounded in-memory store of current state values, with jitter/trend
//! analytics and degenerate-range-safe normalization.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Maximum number of snapshots retained in history. Oldest is evicted first.
const MAX_HISTORY: usize = 100;

/// One captured copy of `current` at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub timestamp_ms: u64,
    pub values: HashMap<String, f64>,
}

/// Per-state bounds used by [`StateManager::normalize`]. Both default when absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateMetadata {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Latest sampled values, bounded history, and per-state metadata for a
/// running system.
#[derive(Debug, Clone, Default)]
pub struct StateManager {
    current: HashMap<String, f64>,
    history: VecDeque<StateSnapshot>,
    metadata: HashMap<String, StateMetadata>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, name: &str, value: f64) {
        self.current.insert(name.to_string(), value);
    }

    pub fn update_many(&mut self, values: impl IntoIterator<Item = (String, f64)>) {
        self.current.extend(values);
    }

    pub fn get(&self, name: &str, default: f64) -> f64 {
        self.current.get(name).copied().unwrap_or(default)
    }

    pub fn get_opt(&self, name: &str) -> Option<f64> {
        self.current.get(name).copied()
    }

    pub fn current(&self) -> &HashMap<String, f64> {
        &self.current
    }

    pub fn set_metadata(&mut self, name: impl Into<String>, metadata: StateMetadata) {
        self.metadata.insert(name.into(), metadata);
    }

    /// Copies `current` into history, evicting the oldest snapshot once the
    /// ring buffer exceeds [`MAX_HISTORY`].
    pub fn snapshot(&mut self, timestamp_ms: u64) {
        self.history.push_back(StateSnapshot {
            timestamp_ms,
            values: self.current.clone(),
        });
        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Last `window` recorded values for `name`, oldest first, skipping
    /// snapshots where the state was absent.
    pub fn history(&self, name: &str, window: usize) -> Vec<f64> {
        let skip = self.history.len().saturating_sub(window);
        self.history
            .iter()
            .skip(skip)
            .filter_map(|snap| snap.values.get(name).copied())
            .collect()
    }

    /// Standard deviation of the last `window` samples; `0.0` with fewer
    /// than two samples.
    pub fn jitter(&self, name: &str, window: usize) -> f64 {
        stddev(&self.history(name, window))
    }

    /// Slope of the least-squares line through the last `window` samples;
    /// `0.0` with fewer than two samples or zero x-variance.
    pub fn trend(&self, name: &str, window: usize) -> f64 {
        least_squares_slope(&self.history(name, window))
    }

    /// Maps `value` into `[0, 1]` using `name`'s metadata bounds (default
    /// `0`/`100`), clamping the result. A degenerate (zero-width) range
    /// returns `0.5`.
    pub fn normalize(&self, name: &str, value: f64) -> f64 {
        let meta = self.metadata.get(name).copied().unwrap_or_default();
        let min = meta.min.unwrap_or(0.0);
        let max = meta.max.unwrap_or(100.0);
        if (max - min).abs() < f64::EPSILON {
            return 0.5;
        }
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    }
}

fn stddev(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance =
        samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    variance.sqrt()
}

fn least_squares_slope(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n as f64;
    let y_mean = samples.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..n {
        numerator += (xs[i] - x_mean) * (samples[i] - y_mean);
        denominator += (xs[i] - x_mean).powi(2);
    }
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    numerator / denominator
}
