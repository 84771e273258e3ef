use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Producer side of a single-producer/single-consumer descriptor ring.
///
/// Slots between the published producer index and `cached_prod` are
/// reserved: written (or about to be written) by us but not yet visible
/// to the consumer. `cached_cons` is the consumer index plus the ring size,
/// so `cached_cons - cached_prod` is the number of free slots as last seen.
pub struct ProducerRing<T> {
    producer: *mut AtomicU32,
    consumer: *const AtomicU32,
    descriptors: *mut T,
    mask: u32,
    size: u32,
    cached_prod: u32,
    cached_cons: u32,
}

unsafe impl<T> Send for ProducerRing<T> {}

impl<T: Copy> ProducerRing<T> {
    /// # Safety
    /// Pointers must be valid for the lifetime of the ring (mapped from the
    /// kernel or owned by a [`super::HeapRing`]) and `size` must be a power
    /// of two. There must be exactly one producer view per ring.
    pub unsafe fn new(
        producer: *mut u32,
        consumer: *mut u32,
        descriptors: *mut T,
        size: u32,
    ) -> Self {
        debug_assert!(size.is_power_of_two(), "ring size must be a power of two");
        let producer = producer as *mut AtomicU32;
        let consumer = consumer as *const AtomicU32;
        let cached_prod = (*producer).load(Ordering::Relaxed);
        let cached_cons = (*consumer).load(Ordering::Acquire).wrapping_add(size);

        Self {
            producer,
            consumer,
            descriptors,
            mask: size - 1,
            size,
            cached_prod,
            cached_cons,
        }
    }

    /// Number of free slots. The shared consumer index is only re-read when
    /// the cached view has fewer than `wanted` free slots.
    #[inline]
    pub fn free(&mut self, wanted: u32) -> u32 {
        let free = self.cached_cons.wrapping_sub(self.cached_prod);
        if free >= wanted {
            return free;
        }

        let consumer_idx = unsafe { (*self.consumer).load(Ordering::Acquire) };
        self.cached_cons = consumer_idx.wrapping_add(self.size);
        self.cached_cons.wrapping_sub(self.cached_prod)
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.size
    }

    /// Reserve up to `count` slots. Returns `(granted, start_idx)` where
    /// `granted = min(count, free)`; zero is not an error.
    #[inline]
    pub fn reserve(&mut self, count: u32) -> (u32, u32) {
        let granted = count.min(self.free(count));
        let start = self.cached_prod;
        self.cached_prod = self.cached_prod.wrapping_add(granted);
        (granted, start)
    }

    /// Hand back the last `count` reserved slots without publishing them.
    #[inline]
    pub fn cancel(&mut self, count: u32) {
        debug_assert!(count <= self.reserved(), "cancel past reservation");
        self.cached_prod = self.cached_prod.wrapping_sub(count);
    }

    /// Publish `count` reserved slots to the consumer. The release store
    /// orders every preceding `write_at` before the index update.
    #[inline]
    pub fn submit(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        debug_assert!(count <= self.reserved(), "submit past reservation");
        let producer_idx = unsafe { (*self.producer).load(Ordering::Relaxed) };
        unsafe { (*self.producer).store(producer_idx.wrapping_add(count), Ordering::Release) };
    }

    /// # Safety
    /// `idx` must lie inside the current reservation.
    #[inline]
    pub unsafe fn write_at(&mut self, idx: u32, item: T) {
        let offset = (idx & self.mask) as usize;
        ptr::write(self.descriptors.add(offset), item);
    }

    /// Published producer index.
    #[inline]
    pub fn producer_idx(&self) -> u32 {
        unsafe { (*self.producer).load(Ordering::Relaxed) }
    }

    #[inline]
    fn reserved(&self) -> u32 {
        self.cached_prod.wrapping_sub(self.producer_idx())
    }
}
