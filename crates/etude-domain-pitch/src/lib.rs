pub mod detector;
pub mod estimator;
pub mod mapper;

pub use detector::*;
pub use estimator::*;
pub use mapper::*;
