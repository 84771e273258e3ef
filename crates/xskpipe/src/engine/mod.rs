pub mod receive;
pub mod replenish;
pub mod runner;
pub mod stats;

pub use runner::{CycleReport, Pipeline, Shutdown};
pub use stats::{Rates, RxStats, StatsRecord};
