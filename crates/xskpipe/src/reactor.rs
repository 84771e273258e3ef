//! Tokio-driven variant of [`Pipeline::run`].

use crate::engine::{Pipeline, Shutdown};
use crate::error::PipelineError;
use crate::packet::Inspect;
use crate::readiness::CancelToken;
use std::os::fd::RawFd;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

/// Same cycle as [`Pipeline::run`], with readiness coming from the tokio
/// reactor instead of a blocking `poll`. Must run inside a tokio runtime.
pub async fn run_async<I: Inspect>(
    pipeline: &mut Pipeline,
    socket_fd: RawFd,
    cancel: &CancelToken,
    mut inspect: I,
) -> Result<Shutdown, PipelineError> {
    let socket = AsyncFd::with_interest(socket_fd, Interest::READABLE)?;
    let waker = AsyncFd::with_interest(cancel.wake_fd(), Interest::READABLE)?;
    let batch_size = pipeline.config().batch_size;
    let mut reporter = pipeline.start();

    while !cancel.is_cancelled() {
        if pipeline.fill_starved() {
            let report = pipeline.cycle(&mut inspect);
            pipeline.after_cycle(report, &mut reporter);
            continue;
        }

        tokio::select! {
            guard = socket.readable() => {
                let mut guard = guard.map_err(PipelineError::ReadinessWaitFailed)?;
                let report = pipeline.cycle(&mut inspect);
                // A full batch may have left more behind; keep the readiness.
                if report.received < batch_size {
                    guard.clear_ready();
                }
                pipeline.after_cycle(report, &mut reporter);
            }
            _ = waker.readable() => {}
        }
    }

    pipeline.finish();
    Ok(Shutdown::Cancelled)
}
