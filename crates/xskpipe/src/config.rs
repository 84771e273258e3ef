use crate::error::PipelineError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poller {
    /// Block in `poll` until the socket is readable.
    Wait,
    /// Zero-timeout `poll`; burns a core, lowest latency.
    Busy,
}

impl Poller {
    pub fn timeout_ms(self) -> i32 {
        match self {
            Poller::Wait => -1,
            Poller::Busy => 0,
        }
    }
}

/// How the socket binds to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Let the kernel pick zero-copy when the driver supports it.
    Auto,
    Copy,
    ZeroCopy,
}

/// Where the XDP program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XdpMode {
    Skb,
    Driver,
    Hardware,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound on descriptors drained from the Rx ring per cycle.
    pub batch_size: u32,
    pub poller: Poller,
    /// Log receive rates at this period. `None` disables the report.
    pub stats_interval: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            poller: Poller::Wait,
            stats_interval: None,
        }
    }
}

impl PipelineConfig {
    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = Some(interval);
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.stats_interval.is_some_and(|i| i.is_zero()) {
            return Err(PipelineError::InvalidConfiguration(
                "stats interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.poller.timeout_ms(), -1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_batch() {
        let config = PipelineConfig::default().batch_size(0);
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = PipelineConfig::default().stats_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
