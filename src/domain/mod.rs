pub mod curve;
pub mod pit;
pub mod types;

pub use curve::*;
pub use pit::*;
pub use types::*;
