use crate::engine::stats::RxStats;
use crate::packet::{Inspect, Packet};
use log::{debug, error};
use xskpipe_core::ring::{ConsumerRing, XdpDesc};
use xskpipe_core::umem::{FramePool, UmemRegion};

/// Drain at most `batch_size` descriptors from the Rx ring.
///
/// Each packet is inspected while its frame is `Ready`, then the frame goes
/// straight back to the pool. Rx slots are released once, after the whole
/// batch, with the count that was peeked.
pub(crate) fn drain<I: Inspect + ?Sized>(
    rx: &mut ConsumerRing<XdpDesc>,
    umem: &UmemRegion,
    pool: &mut FramePool,
    stats: &mut RxStats,
    batch_size: u32,
    inspect: &mut I,
) -> u32 {
    let (count, start) = rx.peek(batch_size);
    if count == 0 {
        return 0;
    }

    for i in 0..count {
        let desc = unsafe { rx.read_at(start.wrapping_add(i)) };

        let frame = match pool.mark_ready(desc.addr) {
            Ok(frame) => frame,
            Err(e) => {
                // Not ours to recycle.
                error!("Dropping Rx descriptor {:#x}+{}: {}", desc.addr, desc.len, e);
                stats.foreign_frames += 1;
                continue;
            }
        };

        match Packet::resolve(umem, frame, desc) {
            Ok(packet) => {
                stats.record_rx(packet.len());
                inspect.inspect(&packet);
            }
            Err(e) => {
                debug!("Malformed packet in frame {:#x}: {}", frame, e);
                stats.malformed += 1;
            }
        }

        if let Err(e) = pool.release(frame) {
            error!("Frame {:#x} could not be recycled: {}", frame, e);
        }
    }

    rx.release(count);
    count
}
