use crate::config::PipelineConfig;
use crate::engine::receive::drain;
use crate::engine::replenish::replenish;
use crate::engine::stats::{RxStats, StatsReporter};
use crate::error::PipelineError;
use crate::packet::Inspect;
use crate::readiness::{CancelToken, Readiness};
use log::{info, trace};
use std::sync::Arc;
use std::time::Instant;
use xskpipe_core::ring::RingSet;
use xskpipe_core::umem::{FrameCensus, FramePool, UmemRegion};

/// What one replenish-then-drain cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub filled: u32,
    pub received: u32,
}

/// Why [`Pipeline::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Cancelled,
}

/// Single-threaded receive path over one socket's rings and UMEM.
pub struct Pipeline {
    umem: Arc<UmemRegion>,
    rings: RingSet,
    pool: FramePool,
    stats: RxStats,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        umem: Arc<UmemRegion>,
        rings: RingSet,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let pool = FramePool::new(umem.layout());

        Ok(Self {
            umem,
            rings,
            pool,
            stats: RxStats::default(),
            config,
        })
    }

    /// Top up the Fill ring from the frame pool.
    pub fn replenish(&mut self) -> u32 {
        replenish(&mut self.rings.fill, &mut self.pool, &mut self.stats)
    }

    /// Drain one batch from the Rx ring through `inspect`.
    pub fn process_rx<I: Inspect + ?Sized>(&mut self, inspect: &mut I) -> u32 {
        drain(
            &mut self.rings.rx,
            &self.umem,
            &mut self.pool,
            &mut self.stats,
            self.config.batch_size,
            inspect,
        )
    }

    /// Replenish, then drain. Frames freed by this drain reach the Fill
    /// ring on the next cycle.
    pub fn cycle<I: Inspect + ?Sized>(&mut self, inspect: &mut I) -> CycleReport {
        self.stats.cycles += 1;
        let filled = self.replenish();
        let received = self.process_rx(inspect);
        CycleReport { filled, received }
    }

    /// Event loop: wait for readiness, cycle, repeat until `cancel` fires.
    ///
    /// A failed readiness wait ends the loop with
    /// [`PipelineError::ReadinessWaitFailed`]. Cancellation is checked once
    /// per iteration, so an in-progress cycle always completes.
    pub fn run<R, I>(
        &mut self,
        readiness: &mut R,
        cancel: &CancelToken,
        mut inspect: I,
    ) -> Result<Shutdown, PipelineError>
    where
        R: Readiness + ?Sized,
        I: Inspect,
    {
        let mut reporter = self.start();

        while !cancel.is_cancelled() {
            if !self.fill_starved() {
                let ready = readiness
                    .wait()
                    .map_err(PipelineError::ReadinessWaitFailed)?;
                if !ready {
                    if !cancel.is_cancelled() {
                        self.stats.spurious_wakeups += 1;
                    }
                    continue;
                }
            }

            let report = self.cycle(&mut inspect);
            self.after_cycle(report, &mut reporter);
        }

        self.finish();
        Ok(Shutdown::Cancelled)
    }

    /// Prime the Fill ring and set up the periodic rate report.
    pub(crate) fn start(&mut self) -> Option<StatsReporter> {
        let primed = self.replenish();
        info!(
            "Fill ring primed with {} frames ({} left in pool, batch {})",
            primed,
            self.pool.available(),
            self.config.batch_size
        );
        self.config
            .stats_interval
            .map(|interval| StatsReporter::new(interval, &self.stats, Instant::now()))
    }

    /// The kernel holds no fill buffers but the pool does: nothing can arrive
    /// until the next replenish, so waiting would never end.
    pub(crate) fn fill_starved(&mut self) -> bool {
        let size = self.rings.fill.len();
        let starved = self.pool.available() > 0 && self.rings.fill.free(size) == size;
        if starved {
            trace!("Fill ring empty with {} free frames, skipping wait", self.pool.available());
        }
        starved
    }

    pub(crate) fn after_cycle(&mut self, report: CycleReport, reporter: &mut Option<StatsReporter>) {
        if report.received == 0 {
            self.stats.spurious_wakeups += 1;
        }
        if let Some(reporter) = reporter.as_mut() {
            if let Some(rates) = reporter.poll(&self.stats, Instant::now()) {
                info!("{}", rates);
            }
        }
    }

    pub(crate) fn finish(&self) {
        let census = self.pool.census();
        info!(
            "Stopped after {} cycles: {} packets / {} bytes received, {} malformed, {} foreign",
            self.stats.cycles,
            self.stats.rx_packets,
            self.stats.rx_bytes,
            self.stats.malformed,
            self.stats.foreign_frames
        );
        info!(
            "Frames: {} free, {} in flight, {} ready",
            census.free, census.in_flight, census.ready
        );
    }

    pub fn stats(&self) -> &RxStats {
        &self.stats
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    pub fn census(&self) -> FrameCensus {
        self.pool.census()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn umem(&self) -> &Arc<UmemRegion> {
        &self.umem
    }

    pub fn rings(&self) -> &RingSet {
        &self.rings
    }
}
