pub mod classifier;
pub mod config;
pub mod country;
pub mod error;
pub mod polls;
pub mod race;
pub mod scorer;
pub mod simulate;
pub mod snapshot;
pub mod stats;
pub mod tipping_point;
