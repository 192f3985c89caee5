pub mod greedy;
pub mod threshold;
pub mod types;

pub use greedy::*;
pub use threshold::*;
pub use types::*;
