use crate::umem::layout::UmemLayout;
use thiserror::Error;

/// Who currently owns a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// On the free list.
    Free,
    /// Handed to the kernel through the Fill ring (or queued in the Rx ring).
    InFlight,
    /// Taken off the Rx ring, holding a packet the application is reading.
    Ready,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame address {addr:#x} is outside the UMEM")]
    OutOfRange { addr: u64 },

    #[error("frame address {addr:#x} is not a frame base")]
    Misaligned { addr: u64 },

    #[error("frame {addr:#x} is already free")]
    DoubleRelease { addr: u64 },

    #[error("frame {addr:#x} is {actual:?}, expected {expected:?}")]
    UnexpectedState {
        addr: u64,
        actual: FrameState,
        expected: FrameState,
    },
}

/// Frame counts per ownership state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCensus {
    pub free: usize,
    pub in_flight: usize,
    pub ready: usize,
}

impl FrameCensus {
    pub fn total(&self) -> usize {
        self.free + self.in_flight + self.ready
    }
}

/// Fixed-size frame allocator over the UMEM.
///
/// Free frames live on a LIFO stack so the most recently recycled (and most
/// likely cache-hot) frame is handed out first. Every frame additionally
/// carries a [`FrameState`] tag, which is what catches double releases.
pub struct FramePool {
    free_frames: Vec<u64>,
    states: Box<[FrameState]>,
    layout: UmemLayout,
}

impl FramePool {
    pub fn new(layout: UmemLayout) -> Self {
        let mut free_frames = Vec::with_capacity(layout.frame_count as usize);
        for i in 0..layout.frame_count {
            if let Some(addr) = layout.idx_to_addr(i) {
                free_frames.push(addr);
            }
        }
        let states = vec![FrameState::Free; layout.frame_count as usize].into_boxed_slice();

        Self {
            free_frames,
            states,
            layout,
        }
    }

    /// Take a free frame. `None` means the pool is exhausted.
    #[inline]
    pub fn allocate(&mut self) -> Option<u64> {
        let addr = self.free_frames.pop()?;
        let idx = (addr / self.layout.frame_size as u64) as usize;
        self.states[idx] = FrameState::InFlight;
        Some(addr)
    }

    /// Record that an in-flight frame came back from the kernel with a
    /// packet in it. Accepts any address inside the frame and returns the
    /// frame's base offset.
    pub fn mark_ready(&mut self, addr: u64) -> Result<u64, FrameError> {
        let base = self
            .layout
            .frame_base(addr)
            .ok_or(FrameError::OutOfRange { addr })?;
        let idx = self.index_of(base)?;

        match self.states[idx] {
            FrameState::InFlight => {
                self.states[idx] = FrameState::Ready;
                Ok(base)
            }
            actual => Err(FrameError::UnexpectedState {
                addr: base,
                actual,
                expected: FrameState::InFlight,
            }),
        }
    }

    /// Return a frame to the free list.
    pub fn release(&mut self, addr: u64) -> Result<(), FrameError> {
        let idx = self.index_of(addr)?;
        if self.states[idx] == FrameState::Free {
            return Err(FrameError::DoubleRelease { addr });
        }

        self.states[idx] = FrameState::Free;
        self.free_frames.push(addr);
        debug_assert!(self.free_frames.len() <= self.states.len());
        Ok(())
    }

    pub fn state(&self, addr: u64) -> Option<FrameState> {
        let idx = self.layout.addr_to_idx(addr)?;
        Some(self.states[idx as usize])
    }

    pub fn available(&self) -> usize {
        self.free_frames.len()
    }

    pub fn capacity(&self) -> usize {
        self.states.len()
    }

    pub fn layout(&self) -> UmemLayout {
        self.layout
    }

    pub fn census(&self) -> FrameCensus {
        let mut census = FrameCensus::default();
        for state in self.states.iter() {
            match state {
                FrameState::Free => census.free += 1,
                FrameState::InFlight => census.in_flight += 1,
                FrameState::Ready => census.ready += 1,
            }
        }
        census
    }

    fn index_of(&self, addr: u64) -> Result<usize, FrameError> {
        let idx = self
            .layout
            .addr_to_idx(addr)
            .ok_or(FrameError::OutOfRange { addr })?;
        if addr % self.layout.frame_size as u64 != 0 {
            return Err(FrameError::Misaligned { addr });
        }
        Ok(idx as usize)
    }
}
