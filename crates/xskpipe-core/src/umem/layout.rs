use std::io;

/// Geometry of the UMEM: `frame_count` equal frames of `frame_size` bytes,
/// addressed by byte offset from the start of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UmemLayout {
    pub frame_size: u32,
    pub frame_count: u32,
}

impl UmemLayout {
    pub fn new(frame_size: u32, frame_count: u32) -> io::Result<Self> {
        // The kernel accepts 2048..=PAGE_SIZE chunks in aligned mode.
        if !frame_size.is_power_of_two() || frame_size < 2048 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame size {frame_size} must be a power of two >= 2048"),
            ));
        }
        if frame_count == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame count must be non-zero",
            ));
        }

        Ok(Self {
            frame_size,
            frame_count,
        })
    }

    pub fn size(&self) -> usize {
        (self.frame_size as usize) * (self.frame_count as usize)
    }

    #[inline]
    pub fn addr_to_idx(&self, addr: u64) -> Option<u32> {
        if addr >= (self.size() as u64) {
            return None;
        }
        Some((addr / self.frame_size as u64) as u32)
    }

    #[inline]
    pub fn idx_to_addr(&self, idx: u32) -> Option<u64> {
        if idx >= self.frame_count {
            return None;
        }
        Some((idx as u64) * (self.frame_size as u64))
    }

    /// Base offset of the frame containing `addr`. Rx descriptors may point
    /// past the base when the kernel leaves headroom in front of the packet.
    #[inline]
    pub fn frame_base(&self, addr: u64) -> Option<u64> {
        if addr >= (self.size() as u64) {
            return None;
        }
        Some(addr & !(self.frame_size as u64 - 1))
    }
}
