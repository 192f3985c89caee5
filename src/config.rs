use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::{PitError, PitReservoir};
use crate::optimizer::{FlowAllocator, GreedyChunkAllocator, ThresholdPolicy, DEFAULT_CHUNK_DIVISOR};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pit: PitConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PitConfig {
    pub capacity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_chunk_divisor")]
    pub chunk_divisor: f64,
    #[serde(default)]
    pub threshold: ThresholdPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_divisor: DEFAULT_CHUNK_DIVISOR,
            threshold: ThresholdPolicy::default(),
        }
    }
}

fn default_chunk_divisor() -> f64 {
    DEFAULT_CHUNK_DIVISOR
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub url: String,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl ClientConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("WELLFLOW__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    /// Empty pit plus the configured greedy strategy
    pub fn build_allocator(&self) -> Result<FlowAllocator, PitError> {
        let pit = PitReservoir::new(self.pit.capacity)?;
        let strategy =
            GreedyChunkAllocator::new(self.engine.chunk_divisor, self.engine.threshold.build());
        Ok(FlowAllocator::new(pit, Box::new(strategy)))
    }
}
