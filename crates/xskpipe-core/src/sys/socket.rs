use crate::sys::if_xdp::*;
use libc::{
    bind, c_void, mmap, poll, pollfd, setsockopt, sockaddr, socket, socklen_t, AF_XDP, MAP_FAILED,
    MAP_POPULATE, MAP_SHARED, POLLERR, POLLHUP, POLLIN, POLLNVAL, PROT_READ, PROT_WRITE, SOCK_RAW, SOL_XDP,
};
use std::io;
use std::mem;
use std::os::fd::{FromRawFd, OwnedFd};
pub use std::os::unix::io::RawFd;

pub fn create_xsk_socket() -> io::Result<OwnedFd> {
    let fd = unsafe { socket(AF_XDP, SOCK_RAW | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub fn bind_socket(fd: RawFd, ifindex: u32, queue_id: u32, bind_flags: u16) -> io::Result<()> {
    let mut sa: SockaddrXdp = unsafe { mem::zeroed() };
    sa.sxdp_family = AF_XDP as u16;
    sa.sxdp_ifindex = ifindex;
    sa.sxdp_queue_id = queue_id;
    sa.sxdp_flags = bind_flags;

    let ret = unsafe {
        bind(
            fd,
            &sa as *const _ as *const sockaddr,
            mem::size_of::<SockaddrXdp>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub fn set_umem_reg(
    fd: RawFd,
    umem_addr: u64,
    len: u64,
    chunk_size: u32,
    headroom: u32,
) -> io::Result<()> {
    let mr = XdpUmemReg {
        addr: umem_addr,
        len,
        chunk_size,
        headroom,
        flags: 0,
    };

    let ret = unsafe {
        setsockopt(
            fd,
            SOL_XDP,
            XDP_UMEM_REG,
            &mr as *const _ as *const c_void,
            mem::size_of::<XdpUmemReg>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub fn set_ring_size(fd: RawFd, ring_type: i32, size: u32) -> io::Result<()> {
    let ret = unsafe {
        setsockopt(
            fd,
            SOL_XDP,
            ring_type,
            &size as *const _ as *const c_void,
            mem::size_of::<u32>() as socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub fn get_mmap_offsets(fd: RawFd) -> io::Result<XdpMmapOffsets> {
    let mut off = XdpMmapOffsets::default();
    let mut len = mem::size_of::<XdpMmapOffsets>() as socklen_t;

    let ret = unsafe {
        libc::getsockopt(
            fd,
            SOL_XDP,
            XDP_MMAP_OFFSETS,
            &mut off as *mut _ as *mut c_void,
            &mut len,
        )
    };

    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(off)
}

/// # Safety
/// The returned pointer must eventually be passed to [`munmap`] exactly once.
pub unsafe fn mmap_range(fd: RawFd, len: usize, offset: u64) -> io::Result<*mut u8> {
    let ptr = mmap(
        std::ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_SHARED | MAP_POPULATE,
        fd,
        offset as libc::off_t,
    );

    if ptr == MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    Ok(ptr as *mut u8)
}

/// # Safety
/// `ptr`/`len` must describe a mapping created by [`mmap_range`].
pub unsafe fn munmap(ptr: *mut u8, len: usize) -> io::Result<()> {
    let ret = libc::munmap(ptr as *mut c_void, len);
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// What `poll(2)` reported for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    Idle,
    Readable,
    Hangup,
    Error,
    /// `POLLNVAL`: the descriptor is not open.
    Invalid,
}

impl PollEvent {
    fn from_revents(revents: i16) -> Self {
        if revents & POLLNVAL != 0 {
            PollEvent::Invalid
        } else if revents & POLLERR != 0 {
            PollEvent::Error
        } else if revents & POLLHUP != 0 {
            PollEvent::Hangup
        } else if revents & POLLIN != 0 {
            PollEvent::Readable
        } else {
            PollEvent::Idle
        }
    }

    /// `Ok(true)` if readable, `Ok(false)` if idle, an error for a broken
    /// descriptor.
    pub fn check(self) -> io::Result<bool> {
        match self {
            PollEvent::Idle => Ok(false),
            PollEvent::Readable => Ok(true),
            PollEvent::Hangup => Err(io::Error::from_raw_os_error(libc::EPIPE)),
            PollEvent::Invalid => Err(io::Error::from_raw_os_error(libc::EBADF)),
            PollEvent::Error => Err(io::Error::new(
                io::ErrorKind::Other,
                "poll reported POLLERR",
            )),
        }
    }
}

/// Wait until any of `fds` has an event. All [`PollEvent::Idle`] on timeout.
/// `EINTR` is reported as an error of kind `Interrupted` for the caller to
/// decide on.
pub fn poll_events<const N: usize>(
    fds: &[RawFd; N],
    timeout_ms: i32,
) -> io::Result<[PollEvent; N]> {
    let mut pfds = (*fds).map(|fd| pollfd {
        fd,
        events: POLLIN,
        revents: 0,
    });

    let ret = unsafe { poll(pfds.as_mut_ptr(), N as libc::nfds_t, timeout_ms) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(pfds.map(|p| PollEvent::from_revents(p.revents)))
}

/// Per-fd readability. Hangup, `POLLERR` and closed descriptors are errors.
pub fn poll_readable<const N: usize>(fds: &[RawFd; N], timeout_ms: i32) -> io::Result<[bool; N]> {
    let events = poll_events(fds, timeout_ms)?;
    let mut ready = [false; N];
    for (slot, event) in ready.iter_mut().zip(events) {
        *slot = event.check()?;
    }
    Ok(ready)
}
