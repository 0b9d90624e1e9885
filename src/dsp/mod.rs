//! Signal-conditioning building blocks for the pulse detector.

pub mod dc_block;
pub mod level;
pub mod median;
pub mod peak;

pub use dc_block::DcBlocker;
pub use median::MedianFilter;
pub use peak::PeakFollower;
