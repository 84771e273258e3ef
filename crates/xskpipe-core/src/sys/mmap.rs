use crate::sys::socket::munmap;
use std::ptr::NonNull;

/// A ring mapping obtained from `mmap_range`, unmapped on drop.
pub struct MmapArea {
    ptr: NonNull<u8>,
    len: usize,
}

unsafe impl Send for MmapArea {}
unsafe impl Sync for MmapArea {}

impl MmapArea {
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    /// `ptr` must be a live mapping of `len` bytes whose ownership passes to
    /// the returned value.
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> Option<Self> {
        Some(Self {
            ptr: NonNull::new(ptr)?,
            len,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Pointer `offset` bytes into the mapping.
    ///
    /// # Safety
    /// `offset` must come from the kernel's mmap offsets for this ring.
    pub unsafe fn at<T>(&self, offset: u64) -> *mut T {
        self.ptr.as_ptr().add(offset as usize) as *mut T
    }
}

impl Drop for MmapArea {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.ptr.as_ptr(), self.len);
        }
    }
}
