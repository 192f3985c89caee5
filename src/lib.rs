//! Well flow allocator
//!
//! Splits the water flow reported in each snapshot between revenue-earning
//! operations and a bounded holding pit. The pit is the only state carried
//! from one snapshot to the next.

pub mod config;
pub mod domain;
pub mod optimizer;
pub mod report;
pub mod telemetry;
pub mod transport;
