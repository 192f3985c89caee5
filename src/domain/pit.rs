use serde::Serialize;
use thiserror::Error;

/// Pit-specific errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PitError {
    #[error("Invalid pit capacity: {0} (must be finite and positive)")]
    InvalidCapacity(f64),
    #[error("Pit volume {volume} outside 0..={capacity}")]
    VolumeOutOfRange { volume: f64, capacity: f64 },
}

/// Volume held by a pit at a point in an allocation call, used to undo a
/// failed call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitCheckpoint {
    volume: f64,
}

/// Bounded holding reservoir for flow not sent to operations.
///
/// The only state carried from one snapshot to the next.
#[derive(Debug, Clone, Serialize)]
pub struct PitReservoir {
    volume: f64,
    capacity: f64,
    history: Vec<f64>,
}

impl PitReservoir {
    pub fn new(capacity: f64) -> Result<Self, PitError> {
        Self::with_volume(capacity, 0.0)
    }

    /// Create a pit that already holds `volume`
    pub fn with_volume(capacity: f64, volume: f64) -> Result<Self, PitError> {
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(PitError::InvalidCapacity(capacity));
        }
        if !volume.is_finite() || volume < 0.0 || volume > capacity {
            return Err(PitError::VolumeOutOfRange { volume, capacity });
        }

        Ok(Self {
            volume,
            capacity,
            history: Vec::new(),
        })
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Post-call volumes, oldest first
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn headroom(&self) -> f64 {
        (self.capacity - self.volume).max(0.0)
    }

    /// Fraction of capacity in use (0-1)
    pub fn fill_ratio(&self) -> f64 {
        self.volume / self.capacity
    }

    /// Store up to `amount`, returning how much was actually absorbed.
    ///
    /// Anything above the remaining headroom is left to the caller.
    pub fn deposit(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let stored = amount.min(self.headroom());
        self.volume = (self.volume + stored).min(self.capacity);
        stored
    }

    /// Empty the pit, returning what it held
    pub fn withdraw_all(&mut self) -> f64 {
        std::mem::take(&mut self.volume)
    }

    pub fn record_history(&mut self, volume: f64) {
        self.history.push(volume);
    }

    pub fn checkpoint(&self) -> PitCheckpoint {
        PitCheckpoint {
            volume: self.volume,
        }
    }

    pub fn restore(&mut self, checkpoint: PitCheckpoint) {
        self.volume = checkpoint.volume;
    }
}
