use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Consumer side of a single-producer/single-consumer descriptor ring.
///
/// Entries between the published consumer index and `cached_cons` have been
/// handed out by `peek` but not yet released back to the producer.
pub struct ConsumerRing<T> {
    producer: *const AtomicU32,
    consumer: *mut AtomicU32,
    descriptors: *const T,
    mask: u32,
    size: u32,
    cached_prod: u32,
    cached_cons: u32,
}

unsafe impl<T> Send for ConsumerRing<T> {}

impl<T: Copy> ConsumerRing<T> {
    /// # Safety
    /// Pointers must be valid for the lifetime of the ring (mapped from the
    /// kernel or owned by a [`super::HeapRing`]) and `size` must be a power
    /// of two. There must be exactly one consumer view per ring.
    pub unsafe fn new(
        producer: *mut u32,
        consumer: *mut u32,
        descriptors: *mut T,
        size: u32,
    ) -> Self {
        debug_assert!(size.is_power_of_two(), "ring size must be a power of two");
        let producer = producer as *const AtomicU32;
        let consumer = consumer as *mut AtomicU32;
        let cached_cons = (*consumer).load(Ordering::Relaxed);
        let cached_prod = (*producer).load(Ordering::Acquire);

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

    /// Claim up to `max` entries. Returns `(available, start_idx)` with
    /// `available = min(max, producer - consumer)`.
    ///
    /// The shared producer index is only re-read when the cached view holds
    /// fewer than `max` entries. It is loaded with acquire ordering, so
    /// descriptor payloads up to that index are visible to `read_at`.
    #[inline]
    pub fn peek(&mut self, max: u32) -> (u32, u32) {
        let mut entries = self.cached_prod.wrapping_sub(self.cached_cons);
        if entries < max {
            self.cached_prod = unsafe { (*self.producer).load(Ordering::Acquire) };
            entries = self.cached_prod.wrapping_sub(self.cached_cons);
        }

        let count = entries.min(max);
        let start = self.cached_cons;
        self.cached_cons = self.cached_cons.wrapping_add(count);
        (count, start)
    }

    /// Return `count` peeked entries to the producer. The release store keeps
    /// every preceding `read_at` ahead of the index update.
    #[inline]
    pub fn release(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        let current = self.consumer_idx();
        debug_assert!(
            count <= self.cached_cons.wrapping_sub(current),
            "release past peeked entries"
        );
        unsafe { (*self.consumer).store(current.wrapping_add(count), Ordering::Release) };
    }

    /// Un-peek the last `count` entries; they are handed out again by the
    /// next `peek`.
    #[inline]
    pub fn cancel(&mut self, count: u32) {
        debug_assert!(
            count <= self.cached_cons.wrapping_sub(self.consumer_idx()),
            "cancel past peeked entries"
        );
        self.cached_cons = self.cached_cons.wrapping_sub(count);
    }

    /// # Safety
    /// `idx` must lie inside the range returned by the last `peek`.
    #[inline]
    pub unsafe fn read_at(&self, idx: u32) -> T {
        let offset = (idx & self.mask) as usize;
        ptr::read(self.descriptors.add(offset))
    }

    /// Published consumer index.
    #[inline]
    pub fn consumer_idx(&self) -> u32 {
        unsafe { (*self.consumer).load(Ordering::Relaxed) }
    }

    /// Entries published by the producer and not yet peeked.
    #[inline]
    pub fn pending(&self) -> u32 {
        let producer_idx = unsafe { (*self.producer).load(Ordering::Acquire) };
        producer_idx.wrapping_sub(self.cached_cons)
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.size
    }
}
