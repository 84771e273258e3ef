use std::fmt;
use std::time::{Duration, Instant};

/// Running counters kept by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RxStats {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    /// Descriptors that could not be read as an Ethernet frame.
    pub malformed: u64,
    /// Rx descriptors pointing at frames the pool never handed out.
    pub foreign_frames: u64,
    /// Replenish passes that ran out of free frames.
    pub pool_exhausted: u64,
    /// Replenish passes where the Fill ring had less room than the pool had
    /// frames.
    pub reserve_short: u64,
    pub cycles: u64,
    pub spurious_wakeups: u64,
}

impl RxStats {
    #[inline]
    pub(crate) fn record_rx(&mut self, len: usize) {
        self.rx_packets += 1;
        self.rx_bytes += len as u64;
    }

    pub fn snapshot(&self) -> StatsRecord {
        StatsRecord::at(self, Instant::now())
    }
}

/// Timestamped copy of the traffic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRecord {
    pub timestamp: Instant,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
}

impl StatsRecord {
    pub fn at(stats: &RxStats, timestamp: Instant) -> Self {
        Self {
            timestamp,
            rx_packets: stats.rx_packets,
            rx_bytes: stats.rx_bytes,
            tx_packets: stats.tx_packets,
            tx_bytes: stats.tx_bytes,
        }
    }

    /// Rates over the period between `prev` and `self`.
    pub fn rates_since(&self, prev: &StatsRecord) -> Rates {
        let period = self.timestamp.saturating_duration_since(prev.timestamp);
        let secs = period.as_secs_f64();
        let per_sec = |now: u64, then: u64| {
            if secs > 0.0 {
                now.saturating_sub(then) as f64 / secs
            } else {
                0.0
            }
        };

        Rates {
            period,
            rx_pps: per_sec(self.rx_packets, prev.rx_packets),
            rx_mbps: per_sec(self.rx_bytes, prev.rx_bytes) * 8.0 / 1_000_000.0,
            tx_pps: per_sec(self.tx_packets, prev.tx_packets),
            tx_mbps: per_sec(self.tx_bytes, prev.tx_bytes) * 8.0 / 1_000_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub period: Duration,
    pub rx_pps: f64,
    pub rx_mbps: f64,
    pub tx_pps: f64,
    pub tx_mbps: f64,
}

impl fmt::Display for Rates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx {:>12.0} pps {:>10.3} Mbit/s | tx {:>12.0} pps {:>10.3} Mbit/s | period {:.3}s",
            self.rx_pps,
            self.rx_mbps,
            self.tx_pps,
            self.tx_mbps,
            self.period.as_secs_f64()
        )
    }
}

/// Emits [`Rates`] at most once per interval.
pub(crate) struct StatsReporter {
    interval: Duration,
    prev: StatsRecord,
}

impl StatsReporter {
    pub(crate) fn new(interval: Duration, stats: &RxStats, now: Instant) -> Self {
        Self {
            interval,
            prev: StatsRecord::at(stats, now),
        }
    }

    pub(crate) fn poll(&mut self, stats: &RxStats, now: Instant) -> Option<Rates> {
        if now.saturating_duration_since(self.prev.timestamp) < self.interval {
            return None;
        }
        let current = StatsRecord::at(stats, now);
        let rates = current.rates_since(&self.prev);
        self.prev = current;
        Some(rates)
    }
}
