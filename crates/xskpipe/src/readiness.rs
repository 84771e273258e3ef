use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(target_os = "linux")]
use crate::config::Poller;
#[cfg(target_os = "linux")]
use xskpipe_core::sys::eventfd::EventFd;
#[cfg(target_os = "linux")]
use xskpipe_core::sys::socket::{poll_events, RawFd};

/// Blocks until the Rx side may have work.
///
/// `Ok(true)` means the socket reported readable, `Ok(false)` means the wait
/// ended for some other reason (timeout, signal, cancellation). An `Err` is
/// fatal to the event loop.
pub trait Readiness {
    fn wait(&mut self) -> io::Result<bool>;
}

impl<F> Readiness for F
where
    F: FnMut() -> io::Result<bool>,
{
    fn wait(&mut self) -> io::Result<bool> {
        self()
    }
}

/// Shared stop flag. Setting it also makes the wake fd readable so a
/// blocked `poll` returns promptly.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    #[cfg(target_os = "linux")]
    waker: Arc<EventFd>,
}

impl CancelToken {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            flag: Arc::new(AtomicBool::new(false)),
            #[cfg(target_os = "linux")]
            waker: Arc::new(EventFd::new()?),
        })
    }

    pub fn cancel(&self) -> io::Result<()> {
        self.flag.store(true, Ordering::Release);
        #[cfg(target_os = "linux")]
        self.waker.notify()?;
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    #[cfg(target_os = "linux")]
    pub fn wake_fd(&self) -> RawFd {
        use std::os::unix::io::AsRawFd;
        self.waker.as_raw_fd()
    }
}

/// `poll(2)` on the socket and the cancel token's wake fd. A hangup, error
/// or closed descriptor on either fd ends the wait with an error.
#[cfg(target_os = "linux")]
pub struct PollReadiness {
    fds: [RawFd; 2],
    timeout_ms: i32,
}

#[cfg(target_os = "linux")]
impl PollReadiness {
    pub fn new(socket_fd: RawFd, cancel: &CancelToken, poller: Poller) -> Self {
        Self {
            fds: [socket_fd, cancel.wake_fd()],
            timeout_ms: poller.timeout_ms(),
        }
    }
}

#[cfg(target_os = "linux")]
impl Readiness for PollReadiness {
    fn wait(&mut self) -> io::Result<bool> {
        match poll_events(&self.fds, self.timeout_ms) {
            Ok([socket, waker]) => {
                waker.check()?;
                socket.check()
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use xskpipe_core::sys::socket::poll_readable;

    #[test]
    fn test_cancel_sets_flag_and_wakes() {
        let token = CancelToken::new().unwrap();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        clone.cancel().unwrap();
        assert!(token.is_cancelled());
        assert_eq!(poll_readable(&[token.wake_fd()], 0).unwrap(), [true]);
    }

    #[test]
    fn test_poll_readiness_reports_socket_only() {
        let token = CancelToken::new().unwrap();
        let socket = EventFd::new().unwrap();
        let mut readiness = PollReadiness::new(socket.as_raw_fd(), &token, Poller::Busy);

        assert!(!readiness.wait().unwrap());

        token.cancel().unwrap();
        assert!(!readiness.wait().unwrap());

        socket.notify().unwrap();
        assert!(readiness.wait().unwrap());
    }

    #[test]
    fn test_poll_readiness_fails_on_peer_hangup() {
        let token = CancelToken::new().unwrap();
        let (socket, peer) = UnixStream::pair().unwrap();
        let mut readiness = PollReadiness::new(socket.as_raw_fd(), &token, Poller::Busy);

        assert!(!readiness.wait().unwrap());

        drop(peer);
        assert!(readiness.wait().is_err());
    }

    #[test]
    fn test_poll_readiness_fails_on_closed_socket() {
        let token = CancelToken::new().unwrap();
        let mut readiness = PollReadiness::new(1 << 20, &token, Poller::Wait);

        // EBADF
        let err = readiness.wait().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(9));
    }
}
