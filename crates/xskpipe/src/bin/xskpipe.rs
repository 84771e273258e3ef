//! Receive packets on one NIC queue through AF_XDP and print each sender.
//!
//! ```text
//! sudo xskpipe -d eth0 -f target/bpfel-unknown-none/release/xdp-prog
//! ```

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
enum ExitStatus {
    Ok = 0,
    ProgramLoad = 1,
    MapLookup = 2,
    Usage = 4,
    Device = 5,
    Signal = 6,
    Memory = 7,
    Socket = 8,
    Readiness = 9,
}

struct Failure {
    status: ExitStatus,
    error: anyhow::Error,
}

trait ExitWith<T> {
    fn exit_with(self, status: ExitStatus) -> Result<T, Failure>;
}

impl<T, E: Into<anyhow::Error>> ExitWith<T> for Result<T, E> {
    fn exit_with(self, status: ExitStatus) -> Result<T, Failure> {
        self.map_err(|e| Failure {
            status,
            error: e.into(),
        })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum XdpModeArg {
    Skb,
    Native,
    Offload,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BindModeArg {
    Auto,
    Copy,
    Zerocopy,
}

#[derive(Parser, Debug)]
#[command(name = "xskpipe", version, about = "AF_XDP zero-copy receive pipeline")]
struct Cli {
    /// Network device to receive on
    #[arg(short = 'd', long = "dev")]
    dev: String,

    /// eBPF object file holding the XDP program. Searched for under
    /// `target/` when omitted.
    #[arg(short = 'f', long = "filename")]
    filename: Option<PathBuf>,

    /// XDP program name inside the object
    #[arg(long, default_value = "xdp_prog_main")]
    program: String,

    /// XSKMAP name inside the object
    #[arg(long, default_value = "xsk_map")]
    map: String,

    /// Receive queue to bind
    #[arg(short = 'q', long = "queue", default_value_t = 0)]
    queue: u32,

    #[arg(long, default_value_t = 4096)]
    frames: u32,

    #[arg(long = "frame-size", default_value_t = 4096)]
    frame_size: u32,

    /// Entries per ring (power of two)
    #[arg(long = "ring-size", default_value_t = 2048)]
    ring_size: u32,

    /// Rx descriptors drained per cycle
    #[arg(long, default_value_t = 16)]
    batch: u32,

    #[arg(long = "xdp-mode", value_enum, default_value_t = XdpModeArg::Native)]
    xdp_mode: XdpModeArg,

    #[arg(long = "bind-mode", value_enum, default_value_t = BindModeArg::Auto)]
    bind_mode: BindModeArg,

    /// Log receive rates every N seconds
    #[arg(long = "stats-interval")]
    stats_interval: Option<u64>,

    /// Spin on a zero-timeout poll instead of blocking
    #[arg(long = "busy-poll")]
    busy_poll: bool,
}

const DEFAULT_OBJECT: &str = "bpfel-unknown-none/release/xdp-prog";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let status = if e.use_stderr() {
                ExitStatus::Usage
            } else {
                ExitStatus::Ok
            };
            let _ = e.print();
            process::exit(status as i32);
        }
    };

    let status = match run(cli) {
        Ok(()) => ExitStatus::Ok,
        Err(failure) => {
            error!("{:#}", failure.error);
            failure.status
        }
    };
    process::exit(status as i32);
}

#[cfg(target_os = "linux")]
fn run(cli: Cli) -> Result<(), Failure> {
    use std::os::fd::{AsFd, AsRawFd};
    use xskpipe::builder::{XskBuilder, XskSocket};
    use xskpipe::loader::{find_program_object, XdpProgram};
    use xskpipe::readiness::PollReadiness;
    use xskpipe::{
        BindMode, CancelToken, Pipeline, PipelineConfig, PipelineError, Poller, Shutdown,
        SourcePrinter, XdpMode,
    };
    use xskpipe_core::sys::utils::if_nametoindex;

    if cli.batch == 0 {
        return Err(anyhow!("--batch must be at least 1")).exit_with(ExitStatus::Usage);
    }
    if cli.stats_interval == Some(0) {
        return Err(anyhow!("--stats-interval must be at least 1")).exit_with(ExitStatus::Usage);
    }

    let if_index = if_nametoindex(&cli.dev)
        .with_context(|| format!("unknown network device `{}`", cli.dev))
        .exit_with(ExitStatus::Device)?;
    info!("Using {} (ifindex {}) queue {}", cli.dev, if_index, cli.queue);

    let cancel = CancelToken::new()
        .context("could not create cancellation eventfd")
        .exit_with(ExitStatus::Signal)?;
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            if let Err(e) = cancel.cancel() {
                error!("Failed to signal shutdown: {}", e);
            }
        })
        .context("could not install signal handler")
        .exit_with(ExitStatus::Signal)?;
    }

    let object = match cli.filename.clone() {
        Some(path) => path,
        None => find_program_object(Path::new("target"), DEFAULT_OBJECT)
            .ok_or_else(|| anyhow!("no eBPF object given and none found under target/"))
            .exit_with(ExitStatus::Usage)?,
    };
    let mode = match cli.xdp_mode {
        XdpModeArg::Skb => XdpMode::Skb,
        XdpModeArg::Native => XdpMode::Driver,
        XdpModeArg::Offload => XdpMode::Hardware,
    };
    let mut program = XdpProgram::load(&object, &cli.program, &cli.dev, mode)
        .with_context(|| format!("could not load {}", object.display()))
        .exit_with(ExitStatus::ProgramLoad)?;

    let bind_mode = match cli.bind_mode {
        BindModeArg::Auto => BindMode::Auto,
        BindModeArg::Copy => BindMode::Copy,
        BindModeArg::Zerocopy => BindMode::ZeroCopy,
    };
    let socket = XskBuilder::new(&cli.dev)
        .queue_id(cli.queue)
        .frame_count(cli.frames)
        .frame_size(cli.frame_size)
        .ring_size(cli.ring_size)
        .bind_mode(bind_mode)
        .build()
        .map_err(|e| {
            let status = match e.kind() {
                std::io::ErrorKind::OutOfMemory => ExitStatus::Memory,
                std::io::ErrorKind::InvalidInput => ExitStatus::Usage,
                _ => ExitStatus::Socket,
            };
            Failure {
                status,
                error: anyhow::Error::new(e).context("could not create AF_XDP socket"),
            }
        })?;

    program
        .register_socket(&cli.map, cli.queue, socket.fd.as_fd())
        .with_context(|| format!("could not register socket in `{}`", cli.map))
        .exit_with(ExitStatus::MapLookup)?;

    let XskSocket { umem, rings, fd, .. } = socket;
    let poller = if cli.busy_poll {
        Poller::Busy
    } else {
        Poller::Wait
    };
    let mut config = PipelineConfig::default().batch_size(cli.batch).poller(poller);
    if let Some(secs) = cli.stats_interval {
        config = config.stats_interval(Duration::from_secs(secs));
    }

    let mut pipeline = Pipeline::new(umem, rings, config).exit_with(ExitStatus::Usage)?;
    let mut readiness = PollReadiness::new(fd.as_raw_fd(), &cancel, poller);

    match pipeline.run(&mut readiness, &cancel, SourcePrinter::stdout()) {
        Ok(Shutdown::Cancelled) => {
            info!("Shutting down");
            Ok(())
        }
        Err(e @ PipelineError::ReadinessWaitFailed(_)) => Err(e).exit_with(ExitStatus::Readiness),
        Err(e) => Err(e).exit_with(ExitStatus::Socket),
    }
}

#[cfg(not(target_os = "linux"))]
fn run(_cli: Cli) -> Result<(), Failure> {
    Err(anyhow!("AF_XDP sockets are only available on Linux")).exit_with(ExitStatus::Device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["xskpipe", "-d", "eth0"]).unwrap();
        assert_eq!(cli.program, "xdp_prog_main");
        assert_eq!(cli.map, "xsk_map");
        assert_eq!(cli.queue, 0);
        assert_eq!(cli.batch, 16);
        assert_eq!((cli.frames, cli.frame_size, cli.ring_size), (4096, 4096, 2048));
        assert!(!cli.busy_poll);
    }

    #[test]
    fn test_device_is_required() {
        let err = Cli::try_parse_from(["xskpipe"]).unwrap_err();
        assert!(err.use_stderr());
    }
}
