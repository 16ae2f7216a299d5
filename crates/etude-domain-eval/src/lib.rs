pub mod matcher;
pub mod stats;

pub use matcher::*;
pub use stats::*;
