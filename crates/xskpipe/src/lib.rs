pub mod config;
pub mod engine;
pub mod error;
pub mod packet;
pub mod readiness;
pub mod simulator;

#[cfg(target_os = "linux")]
pub mod builder;
#[cfg(target_os = "linux")]
pub mod loader;
#[cfg(all(target_os = "linux", feature = "async"))]
pub mod reactor;

pub use config::{BindMode, PipelineConfig, Poller, XdpMode};
pub use engine::{CycleReport, Pipeline, Shutdown};
pub use error::PipelineError;
pub use packet::{Inspect, Malformed, Packet, SourcePrinter};
pub use readiness::{CancelToken, Readiness};
