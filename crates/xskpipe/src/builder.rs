use crate::config::BindMode;
use log::{debug, info};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use xskpipe_core::ring::{ConsumerRing, ProducerRing, RingSet, XdpDesc};
use xskpipe_core::sys::if_xdp::{
    XdpRingOffset, XDP_COPY, XDP_PGOFF_RX_RING, XDP_PGOFF_TX_RING, XDP_RX_RING, XDP_TX_RING,
    XDP_UMEM_COMPLETION_RING, XDP_UMEM_FILL_RING, XDP_UMEM_PGOFF_COMPLETION_RING,
    XDP_UMEM_PGOFF_FILL_RING, XDP_ZEROCOPY,
};
use xskpipe_core::sys::mmap::MmapArea;
use xskpipe_core::sys::socket::{
    bind_socket, create_xsk_socket, get_mmap_offsets, mmap_range, set_ring_size, set_umem_reg,
};
use xskpipe_core::sys::utils::if_nametoindex;
use xskpipe_core::umem::{UmemLayout, UmemRegion};

/// A bound AF_XDP socket with its UMEM and mapped rings.
pub struct XskSocket {
    pub umem: Arc<UmemRegion>,
    pub rings: RingSet,
    pub fd: OwnedFd,
    pub if_index: u32,
    pub queue_id: u32,
}

impl XskSocket {
    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

pub struct XskBuilder {
    interface: String,
    queue_id: u32,
    frame_count: u32,
    frame_size: u32,
    ring_size: u32,
    headroom: u32,
    bind_mode: BindMode,
}

impl XskBuilder {
    pub fn new(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            queue_id: 0,
            frame_count: 4096,
            frame_size: 4096,
            ring_size: 2048,
            headroom: 0,
            bind_mode: BindMode::Auto,
        }
    }

    pub fn queue_id(mut self, id: u32) -> Self {
        self.queue_id = id;
        self
    }

    pub fn frame_count(mut self, count: u32) -> Self {
        self.frame_count = count;
        self
    }

    pub fn frame_size(mut self, size: u32) -> Self {
        self.frame_size = size;
        self
    }

    /// Entries in each of the four rings.
    pub fn ring_size(mut self, size: u32) -> Self {
        self.ring_size = size;
        self
    }

    /// Bytes the kernel leaves free in front of each packet.
    pub fn headroom(mut self, headroom: u32) -> Self {
        self.headroom = headroom;
        self
    }

    pub fn bind_mode(mut self, mode: BindMode) -> Self {
        self.bind_mode = mode;
        self
    }

    pub fn build(self) -> io::Result<XskSocket> {
        if self.ring_size == 0 || !self.ring_size.is_power_of_two() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ring size must be a non-zero power of two",
            ));
        }
        let if_index = if_nametoindex(&self.interface)?;

        let layout = UmemLayout::new(self.frame_size, self.frame_count)?;
        let umem = UmemRegion::new(layout)?;

        let fd = create_xsk_socket()?;
        let raw = fd.as_raw_fd();

        set_umem_reg(
            raw,
            umem.as_ptr() as u64,
            umem.len() as u64,
            self.frame_size,
            self.headroom,
        )?;

        let size = self.ring_size;
        set_ring_size(raw, XDP_UMEM_FILL_RING, size)?;
        set_ring_size(raw, XDP_UMEM_COMPLETION_RING, size)?;
        set_ring_size(raw, XDP_RX_RING, size)?;
        set_ring_size(raw, XDP_TX_RING, size)?;

        let off = get_mmap_offsets(raw)?;
        debug!("XDP mmap offsets: {:?}", off);

        let fill_map = map_ring(raw, &off.fr, size, 8, XDP_UMEM_PGOFF_FILL_RING)?;
        let comp_map = map_ring(raw, &off.cr, size, 8, XDP_UMEM_PGOFF_COMPLETION_RING)?;
        let rx_map = map_ring(raw, &off.rx, size, 16, XDP_PGOFF_RX_RING)?;
        let tx_map = map_ring(raw, &off.tx, size, 16, XDP_PGOFF_TX_RING)?;

        let rings = unsafe {
            let fill = ProducerRing::<u64>::new(
                fill_map.at(off.fr.producer),
                fill_map.at(off.fr.consumer),
                fill_map.at(off.fr.desc),
                size,
            );
            let comp = ConsumerRing::<u64>::new(
                comp_map.at(off.cr.producer),
                comp_map.at(off.cr.consumer),
                comp_map.at(off.cr.desc),
                size,
            );
            let rx = ConsumerRing::<XdpDesc>::new(
                rx_map.at(off.rx.producer),
                rx_map.at(off.rx.consumer),
                rx_map.at(off.rx.desc),
                size,
            );
            let tx = ProducerRing::<XdpDesc>::new(
                tx_map.at(off.tx.producer),
                tx_map.at(off.tx.consumer),
                tx_map.at(off.tx.desc),
                size,
            );
            RingSet::new(fill, comp, rx, tx).with_backing([fill_map, comp_map, rx_map, tx_map])
        };

        bind_socket(raw, if_index, self.queue_id, bind_flags(self.bind_mode))?;
        info!(
            "AF_XDP socket bound to {} (ifindex {}) queue {}: {} frames of {} bytes, rings of {}",
            self.interface, if_index, self.queue_id, self.frame_count, self.frame_size, size
        );

        Ok(XskSocket {
            umem: Arc::new(umem),
            rings,
            fd,
            if_index,
            queue_id: self.queue_id,
        })
    }
}

fn bind_flags(mode: BindMode) -> u16 {
    match mode {
        BindMode::Auto => 0,
        BindMode::Copy => XDP_COPY,
        BindMode::ZeroCopy => XDP_ZEROCOPY,
    }
}

fn map_ring(
    fd: RawFd,
    off: &XdpRingOffset,
    entries: u32,
    entry_size: usize,
    pgoff: u64,
) -> io::Result<MmapArea> {
    let len = off.desc as usize + entries as usize * entry_size;
    let ptr = unsafe { mmap_range(fd, len, pgoff)? };
    unsafe { MmapArea::from_raw(ptr, len) }
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "ring mmap returned null"))
}
