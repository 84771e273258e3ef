use crate::config::XdpMode;
use aya::maps::{MapError, XskMap};
use aya::programs::{ProgramError, Xdp, XdpFlags};
use aya::{Ebpf, EbpfError};
use log::info;
use std::os::fd::BorrowedFd;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load eBPF object: {0}")]
    Object(#[from] EbpfError),

    #[error("Program `{0}` not found in eBPF object")]
    MissingProgram(String),

    #[error("Map `{0}` not found in eBPF object")]
    MissingMap(String),

    #[error("XDP program error: {0}")]
    Program(#[from] ProgramError),

    #[error("XSK map error: {0}")]
    Map(#[from] MapError),
}

/// An XDP program loaded from an object file and attached to one interface.
/// Dropping it detaches the program.
pub struct XdpProgram {
    ebpf: Ebpf,
    interface: String,
}

impl XdpProgram {
    pub fn load(
        path: &Path,
        program: &str,
        interface: &str,
        mode: XdpMode,
    ) -> Result<Self, LoaderError> {
        info!("Loading eBPF object {}", path.display());
        let mut ebpf = Ebpf::load_file(path)?;

        let xdp: &mut Xdp = ebpf
            .program_mut(program)
            .ok_or_else(|| LoaderError::MissingProgram(program.to_string()))?
            .try_into()?;
        xdp.load()?;
        xdp.attach(interface, xdp_flags(mode))?;
        info!("XDP program `{}` attached to {} ({:?} mode)", program, interface, mode);

        Ok(Self {
            ebpf,
            interface: interface.to_string(),
        })
    }

    /// Redirect `queue_id` to the socket `fd` through the XSKMAP `map`.
    pub fn register_socket(
        &mut self,
        map: &str,
        queue_id: u32,
        fd: BorrowedFd<'_>,
    ) -> Result<(), LoaderError> {
        let map_ref = self
            .ebpf
            .map_mut(map)
            .ok_or_else(|| LoaderError::MissingMap(map.to_string()))?;
        let mut sockets = XskMap::try_from(map_ref)?;
        sockets.set(queue_id, fd, 0)?;
        info!("Queue {} redirected to socket through `{}`", queue_id, map);
        Ok(())
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl Drop for XdpProgram {
    fn drop(&mut self) {
        info!("Detaching XDP program from {}", self.interface);
    }
}

fn xdp_flags(mode: XdpMode) -> XdpFlags {
    let mode = match mode {
        XdpMode::Skb => XdpFlags::SKB_MODE,
        XdpMode::Driver => XdpFlags::DRV_MODE,
        XdpMode::Hardware => XdpFlags::HW_MODE,
    };
    XdpFlags::UPDATE_IF_NOEXIST | mode
}

/// First file under `root` whose path ends with `suffix`, e.g. a build
/// artifact like `bpfel-unknown-none/release/xdp-prog`.
pub fn find_program_object(root: &Path, suffix: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .find(|e| e.path().to_string_lossy().ends_with(suffix))
        .map(|e| e.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_flags_never_replace_existing_program() {
        for mode in [XdpMode::Skb, XdpMode::Driver, XdpMode::Hardware] {
            assert!(xdp_flags(mode).contains(XdpFlags::UPDATE_IF_NOEXIST));
        }
        assert!(xdp_flags(XdpMode::Driver).contains(XdpFlags::DRV_MODE));
    }

    #[test]
    fn test_find_program_object() {
        let root = std::env::temp_dir().join(format!("xskpipe-find-{}", std::process::id()));
        let nested = root.join("bpfel-unknown-none").join("release");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("xdp-prog"), b"\x7fELF").unwrap();

        let found = find_program_object(&root, "release/xdp-prog").unwrap();
        assert_eq!(found, nested.join("xdp-prog"));
        assert!(find_program_object(&root, "release/missing").is_none());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_load_missing_object_fails() {
        let err = XdpProgram::load(Path::new("/nonexistent/xdp.o"), "xdp_prog_main", "lo", XdpMode::Skb);
        assert!(matches!(err, Err(LoaderError::Object(_))));
    }
}
