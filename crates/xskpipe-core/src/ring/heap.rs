use std::cell::UnsafeCell;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::ring::{ConsumerRing, ProducerRing};

/// Ring memory owned by the process instead of mapped from the kernel.
///
/// Both sides of a ring are handed out as views over the same words, which
/// lets a simulated peer play the kernel's half of the protocol.
pub struct HeapRing<T> {
    producer: AtomicU32,
    consumer: AtomicU32,
    descriptors: Box<[UnsafeCell<T>]>,
    size: u32,
}

unsafe impl<T: Send> Send for HeapRing<T> {}
unsafe impl<T: Send> Sync for HeapRing<T> {}

impl<T: Copy + Default> HeapRing<T> {
    pub fn new(size: u32) -> io::Result<Arc<Self>> {
        Self::starting_at(size, 0)
    }

    /// Ring whose producer and consumer indices both start at `index`.
    pub fn starting_at(size: u32, index: u32) -> io::Result<Arc<Self>> {
        if size == 0 || !size.is_power_of_two() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ring size must be a non-zero power of two",
            ));
        }

        let descriptors = (0..size).map(|_| UnsafeCell::new(T::default())).collect();
        Ok(Arc::new(Self {
            producer: AtomicU32::new(index),
            consumer: AtomicU32::new(index),
            descriptors,
            size,
        }))
    }

    /// # Safety
    /// At most one producer view may exist, and it must not outlive `self`.
    pub unsafe fn producer(&self) -> ProducerRing<T> {
        ProducerRing::new(
            self.producer.as_ptr(),
            self.consumer.as_ptr(),
            self.slots(),
            self.size,
        )
    }

    /// # Safety
    /// At most one consumer view may exist, and it must not outlive `self`.
    pub unsafe fn consumer(&self) -> ConsumerRing<T> {
        ConsumerRing::new(
            self.producer.as_ptr(),
            self.consumer.as_ptr(),
            self.slots(),
            self.size,
        )
    }

    pub fn producer_index(&self) -> u32 {
        self.producer.load(Ordering::Acquire)
    }

    pub fn consumer_index(&self) -> u32 {
        self.consumer.load(Ordering::Acquire)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn slots(&self) -> *mut T {
        UnsafeCell::raw_get(self.descriptors.as_ptr())
    }
}
