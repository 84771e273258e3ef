use crate::umem::layout::UmemLayout;
use memmap2::{MmapMut, MmapOptions};
use std::io;
use std::slice;

/// The packet buffer memory shared with the kernel.
///
/// Frames are written by the kernel while they sit in the Fill ring, so the
/// region hands out raw pointers and bounds-checked views of individual
/// frames rather than a slice over the whole mapping.
pub struct UmemRegion {
    _mmap: MmapMut,
    ptr: *mut u8,
    layout: UmemLayout,
}

unsafe impl Send for UmemRegion {}
unsafe impl Sync for UmemRegion {}

impl UmemRegion {
    pub fn new(layout: UmemLayout) -> io::Result<Self> {
        let len = layout.size();
        let mut mmap = MmapOptions::new().len(len).populate().map_anon()?;
        let ptr = mmap.as_mut_ptr();

        Ok(Self {
            _mmap: mmap,
            ptr,
            layout,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn layout(&self) -> UmemLayout {
        self.layout
    }

    /// `len` bytes at `addr`, provided they stay inside one frame.
    ///
    /// The caller must own the frame (it is not in the Fill ring), otherwise
    /// the kernel may write to it while the view is alive.
    pub fn data(&self, addr: u64, len: usize) -> Option<&[u8]> {
        let base = self.layout.frame_base(addr)?;
        let end = (addr - base).checked_add(len as u64)?;
        if end > self.layout.frame_size as u64 {
            return None;
        }
        Some(unsafe { slice::from_raw_parts(self.ptr.add(addr as usize), len) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_stays_inside_frame() {
        let layout = UmemLayout::new(2048, 4).unwrap();
        let umem = UmemRegion::new(layout).expect("Failed to create umem");
        assert_eq!(umem.len(), 8192);

        assert_eq!(umem.data(2048, 2048).map(|d| d.len()), Some(2048));
        assert!(umem.data(2048 + 100, 2000).is_none());
        assert!(umem.data(8192, 1).is_none());
        assert_eq!(umem.data(6144 + 14, 0).map(|d| d.len()), Some(0));
    }

    #[test]
    fn test_region_is_zeroed() {
        let layout = UmemLayout::new(2048, 2).unwrap();
        let umem = UmemRegion::new(layout).expect("Failed to create umem");
        assert!(umem.data(0, 2048).unwrap().iter().all(|b| *b == 0));
    }
}
