//! Storage thresholds
//!
//! A threshold decides, chunk by chunk, whether the best marginal return on
//! offer is worth taking now or whether the chunk should wait in the pit for
//! a later snapshot.

use serde::{Deserialize, Serialize};

pub trait StorageThreshold: Send + Sync {
    /// Minimum best return a chunk needs to be sent to an operation.
    ///
    /// `average_return` is the running mean of best returns in the current
    /// call, including the chunk being decided.
    fn threshold(&self, average_return: f64, pit_volume: f64, pit_capacity: f64) -> f64;
}

/// Threshold scaled by how full the pit is:
/// `(average / return_divisor - return_offset) * (fill_weight * volume / capacity)`.
///
/// With an empty pit the threshold is zero, so any non-negative return is
/// allocated and losses are stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillRatioThreshold {
    pub return_divisor: f64,
    pub return_offset: f64,
    pub fill_weight: f64,
}

impl Default for FillRatioThreshold {
    fn default() -> Self {
        Self {
            return_divisor: 4.0,
            return_offset: 2000.0,
            fill_weight: 10.0,
        }
    }
}

impl StorageThreshold for FillRatioThreshold {
    fn threshold(&self, average_return: f64, pit_volume: f64, pit_capacity: f64) -> f64 {
        (average_return / self.return_divisor - self.return_offset)
            * (self.fill_weight * pit_volume / pit_capacity)
    }
}

/// Store only when the best return falls below a fixed floor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedThreshold {
    pub minimum_return: f64,
}

impl StorageThreshold for FixedThreshold {
    fn threshold(&self, _average_return: f64, _pit_volume: f64, _pit_capacity: f64) -> f64 {
        self.minimum_return
    }
}

/// Always allocate when any operation can price the chunk
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeverStore;

impl StorageThreshold for NeverStore {
    fn threshold(&self, _average_return: f64, _pit_volume: f64, _pit_capacity: f64) -> f64 {
        f64::NEG_INFINITY
    }
}

/// Configurable selection of a [`StorageThreshold`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, strum::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdPolicy {
    FillRatio(FillRatioThreshold),
    Fixed(FixedThreshold),
    NeverStore,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::FillRatio(FillRatioThreshold::default())
    }
}

impl ThresholdPolicy {
    pub fn build(&self) -> Box<dyn StorageThreshold> {
        match *self {
            ThresholdPolicy::FillRatio(t) => Box::new(t),
            ThresholdPolicy::Fixed(t) => Box::new(t),
            ThresholdPolicy::NeverStore => Box::new(NeverStore),
        }
    }
}
