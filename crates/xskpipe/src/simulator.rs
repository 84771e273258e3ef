//! In-process stand-in for the kernel side of an AF_XDP socket.
//!
//! [`loopback`] builds the four rings on the heap and returns the
//! application's [`RingSet`] together with a [`LoopbackPeer`] that plays the
//! kernel: it takes buffers from the Fill ring, copies packet bytes into the
//! UMEM and posts descriptors on the Rx ring.

use std::io;
use std::ptr;
use std::sync::Arc;
use thiserror::Error;
use xskpipe_core::ring::{ConsumerRing, HeapRing, ProducerRing, RingSet, XdpDesc};
use xskpipe_core::umem::{UmemLayout, UmemRegion};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliverError {
    #[error("RX dropped: no buffers in the Fill ring")]
    NoFillBuffers,

    #[error("RX dropped: Rx ring is full")]
    RxRingFull,

    #[error("{len} byte packet does not fit a {frame_size} byte frame")]
    FrameTooLarge { len: usize, frame_size: u32 },

    #[error("Fill ring carried address {addr:#x}, not a frame base in the UMEM")]
    BadFillAddress { addr: u64 },
}

pub struct LoopbackPeer {
    umem: Arc<UmemRegion>,
    fill_mem: Arc<HeapRing<u64>>,
    rx_mem: Arc<HeapRing<XdpDesc>>,
    fill: ConsumerRing<u64>,
    rx: ProducerRing<XdpDesc>,
}

/// UMEM plus heap-backed rings of `ring_size` entries each.
pub fn loopback(
    layout: UmemLayout,
    ring_size: u32,
) -> io::Result<(Arc<UmemRegion>, RingSet, LoopbackPeer)> {
    let umem = Arc::new(UmemRegion::new(layout)?);
    let fill_mem = HeapRing::<u64>::new(ring_size)?;
    let comp_mem = HeapRing::<u64>::new(ring_size)?;
    let rx_mem = HeapRing::<XdpDesc>::new(ring_size)?;
    let tx_mem = HeapRing::<XdpDesc>::new(ring_size)?;

    // One producer and one consumer view per ring; the Arcs in the backing
    // keep the memory alive for the application side.
    let rings = unsafe {
        RingSet::new(
            fill_mem.producer(),
            comp_mem.consumer(),
            rx_mem.consumer(),
            tx_mem.producer(),
        )
    }
    .with_backing((fill_mem.clone(), comp_mem, rx_mem.clone(), tx_mem));

    let peer = LoopbackPeer {
        umem: umem.clone(),
        fill: unsafe { fill_mem.consumer() },
        rx: unsafe { rx_mem.producer() },
        fill_mem,
        rx_mem,
    };

    Ok((umem, rings, peer))
}

impl LoopbackPeer {
    /// Receive `frame` into the next Fill buffer and post it on the Rx ring.
    /// Returns the UMEM address the packet landed at.
    pub fn deliver(&mut self, frame: &[u8]) -> Result<u64, DeliverError> {
        let frame_size = self.umem.layout().frame_size;
        if frame.len() > frame_size as usize {
            return Err(DeliverError::FrameTooLarge {
                len: frame.len(),
                frame_size,
            });
        }
        if self.rx.free(1) == 0 {
            return Err(DeliverError::RxRingFull);
        }

        let (got, idx) = self.fill.peek(1);
        if got == 0 {
            return Err(DeliverError::NoFillBuffers);
        }
        let addr = unsafe { self.fill.read_at(idx) };
        if self.umem.layout().frame_base(addr) != Some(addr) {
            // Leave the entry on the ring.
            self.fill.cancel(1);
            return Err(DeliverError::BadFillAddress { addr });
        }
        self.fill.release(1);

        unsafe {
            ptr::copy_nonoverlapping(
                frame.as_ptr(),
                self.umem.as_ptr().add(addr as usize),
                frame.len(),
            );
        }
        self.post(XdpDesc::new(addr, frame.len() as u32))?;
        Ok(addr)
    }

    /// Post an arbitrary descriptor, bypassing the Fill ring.
    pub fn deliver_desc(&mut self, desc: XdpDesc) -> Result<(), DeliverError> {
        self.post(desc)
    }

    /// Consume one Fill buffer without posting anything, like a driver that
    /// holds on to it. The caller decides what to do with the address.
    pub fn take_fill(&mut self) -> Option<u64> {
        let (got, idx) = self.fill.peek(1);
        if got == 0 {
            return None;
        }
        let addr = unsafe { self.fill.read_at(idx) };
        self.fill.release(1);
        Some(addr)
    }

    /// Buffers published on the Fill ring and not yet taken.
    pub fn fill_pending(&self) -> u32 {
        self.fill_mem
            .producer_index()
            .wrapping_sub(self.fill_mem.consumer_index())
    }

    /// Descriptors posted on the Rx ring and not yet released.
    pub fn rx_pending(&self) -> u32 {
        self.rx_mem
            .producer_index()
            .wrapping_sub(self.rx_mem.consumer_index())
    }

    pub fn umem(&self) -> &Arc<UmemRegion> {
        &self.umem
    }

    fn post(&mut self, desc: XdpDesc) -> Result<(), DeliverError> {
        let (granted, idx) = self.rx.reserve(1);
        if granted == 0 {
            return Err(DeliverError::RxRingFull);
        }
        unsafe { self.rx.write_at(idx, desc) };
        self.rx.submit(1);
        Ok(())
    }
}
