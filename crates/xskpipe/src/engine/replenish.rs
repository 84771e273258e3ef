use crate::engine::stats::RxStats;
use log::trace;
use xskpipe_core::ring::ProducerRing;
use xskpipe_core::umem::FramePool;

/// Move free frames into the Fill ring, as many as both the ring and the
/// pool allow. Returns the number of frames published.
///
/// The reservation asks for every frame the pool can supply, so
/// `reserve_short` counts passes where the ring was the limit and
/// `pool_exhausted` counts passes where the pool was. Neither is an error:
/// the pass is simply partial and the next cycle tries again.
pub(crate) fn replenish(
    fill: &mut ProducerRing<u64>,
    pool: &mut FramePool,
    stats: &mut RxStats,
) -> u32 {
    let room = fill.free(fill.len());
    if room == 0 {
        return 0;
    }

    let supply = pool.available().min(fill.len() as usize) as u32;
    if supply < room {
        stats.pool_exhausted += 1;
    }
    if supply == 0 {
        return 0;
    }

    let (granted, start) = fill.reserve(supply);
    if granted < supply {
        stats.reserve_short += 1;
    }

    let mut written = 0;
    while written < granted {
        let Some(addr) = pool.allocate() else {
            break;
        };
        unsafe { fill.write_at(start.wrapping_add(written), addr) };
        written += 1;
    }

    fill.cancel(granted - written);
    fill.submit(written);
    if written > 0 {
        trace!("Fill ring topped up with {} frames", written);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use xskpipe_core::ring::HeapRing;
    use xskpipe_core::umem::{FrameState, UmemLayout};

    fn pool(frames: u32) -> FramePool {
        FramePool::new(UmemLayout::new(2048, frames).unwrap())
    }

    #[test]
    fn test_initial_fill_takes_every_slot() {
        let mem = HeapRing::<u64>::new(4).unwrap();
        let mut fill = unsafe { mem.producer() };
        let mut kernel = unsafe { mem.consumer() };
        let mut pool = pool(4);
        let mut stats = RxStats::default();

        assert_eq!(replenish(&mut fill, &mut pool, &mut stats), 4);
        assert_eq!(pool.available(), 0);
        assert_eq!(mem.producer_index(), 4);

        let (count, start) = kernel.peek(4);
        assert_eq!(count, 4);
        for i in 0..count {
            let addr = unsafe { kernel.read_at(start + i) };
            assert_eq!(pool.state(addr), Some(FrameState::InFlight));
        }
        assert_eq!(stats.pool_exhausted, 0);
    }

    #[test]
    fn test_exhausted_pool_publishes_only_what_it_has() {
        let mem = HeapRing::<u64>::new(8).unwrap();
        let mut fill = unsafe { mem.producer() };
        let mut pool = pool(4);
        let mut stats = RxStats::default();

        assert_eq!(replenish(&mut fill, &mut pool, &mut stats), 4);
        assert_eq!(mem.producer_index(), 4);
        assert_eq!(stats.pool_exhausted, 1);

        // Unused reservation went back: the next pass sees four free slots.
        assert_eq!(fill.free(8), 4);
        assert_eq!(replenish(&mut fill, &mut pool, &mut stats), 0);
        assert_eq!(mem.producer_index(), 4);
    }

    #[test]
    fn test_full_ring_is_a_no_op() {
        let mem = HeapRing::<u64>::new(2).unwrap();
        let mut fill = unsafe { mem.producer() };
        let mut pool = pool(8);
        let mut stats = RxStats::default();

        assert_eq!(replenish(&mut fill, &mut pool, &mut stats), 2);
        assert_eq!(replenish(&mut fill, &mut pool, &mut stats), 0);
        assert_eq!(pool.available(), 6);
        assert_eq!(stats, RxStats::default());
    }

    #[test]
    fn test_ring_limited_pass_counts_short_reservation() {
        let mem = HeapRing::<u64>::new(4).unwrap();
        let mut fill = unsafe { mem.producer() };
        let mut kernel = unsafe { mem.consumer() };
        let mut pool = pool(8);
        let mut stats = RxStats::default();

        assert_eq!(replenish(&mut fill, &mut pool, &mut stats), 4);
        assert_eq!(stats.reserve_short, 0);

        let (count, _) = kernel.peek(2);
        assert_eq!(count, 2);
        kernel.release(count);

        assert_eq!(replenish(&mut fill, &mut pool, &mut stats), 2);
        assert_eq!(stats.reserve_short, 1);
        assert_eq!(stats.pool_exhausted, 0);
        assert_eq!(pool.available(), 2);
        assert_eq!(mem.producer_index(), 6);
    }
}
