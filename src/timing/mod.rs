pub mod bridge;
pub mod gap_distribution;

pub use bridge::bridge_intervals;
pub use gap_distribution::distribute_gaps;
