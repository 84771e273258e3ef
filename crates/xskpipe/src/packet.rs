use std::io::{self, Write};
use thiserror::Error;
use xskpipe_core::ring::XdpDesc;
use xskpipe_core::umem::UmemRegion;
use xskpipe_proto::{parse_eth, parse_ipv4, EthHeader, Ipv4Header, MacAddr, ETH_HLEN, ETH_P_IP};

/// Reasons a received descriptor cannot be read as an Ethernet frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Malformed {
    #[error("descriptor {addr:#x}+{len} does not fit inside its frame")]
    OutOfBounds { addr: u64, len: u32 },

    #[error("{len} byte packet is shorter than an Ethernet header")]
    TooShort { len: u32 },
}

/// Read-only view of one received packet inside the UMEM.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    addr: u64,
    frame: u64,
    data: &'a [u8],
    eth: &'a EthHeader,
}

impl<'a> Packet<'a> {
    /// Resolve `desc` against the UMEM. `frame` is the base of the frame the
    /// descriptor points into.
    pub fn resolve(umem: &'a UmemRegion, frame: u64, desc: XdpDesc) -> Result<Self, Malformed> {
        if (desc.len as usize) < ETH_HLEN {
            return Err(Malformed::TooShort { len: desc.len });
        }
        let data = umem
            .data(desc.addr, desc.len as usize)
            .ok_or(Malformed::OutOfBounds {
                addr: desc.addr,
                len: desc.len,
            })?;
        let (eth, _) = parse_eth(data).ok_or(Malformed::TooShort { len: desc.len })?;

        Ok(Self {
            addr: desc.addr,
            frame,
            data,
            eth,
        })
    }

    /// UMEM offset of the first packet byte.
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Base offset of the owning frame.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn ethernet(&self) -> &'a EthHeader {
        self.eth
    }

    pub fn source_mac(&self) -> MacAddr {
        self.eth.source()
    }

    /// IPv4 header, when the frame carries one.
    pub fn ipv4(&self) -> Option<&'a Ipv4Header> {
        if self.eth.eth_type() != ETH_P_IP {
            return None;
        }
        parse_ipv4(&self.data[ETH_HLEN..]).map(|(header, _)| header)
    }
}

/// Per-packet hook run by the receive processor. The packet is only valid
/// for the duration of the call; its frame is recycled right after.
pub trait Inspect {
    fn inspect(&mut self, packet: &Packet<'_>);
}

impl<F> Inspect for F
where
    F: FnMut(&Packet<'_>),
{
    fn inspect(&mut self, packet: &Packet<'_>) {
        self(packet)
    }
}

/// Writes one `Received packet from <mac>` line per packet.
pub struct SourcePrinter<W> {
    out: W,
}

impl<W: Write> SourcePrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl SourcePrinter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Inspect for SourcePrinter<W> {
    fn inspect(&mut self, packet: &Packet<'_>) {
        if let Err(e) = writeln!(self.out, "Received packet from {}", packet.source_mac()) {
            log::warn!("Failed to write packet line: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xskpipe_core::umem::UmemLayout;

    fn umem_with(bytes: &[u8], at: u64) -> UmemRegion {
        let umem = UmemRegion::new(UmemLayout::new(2048, 2).unwrap()).unwrap();
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), umem.as_ptr().add(at as usize), bytes.len());
        }
        umem
    }

    fn frame(src: [u8; 6], eth_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0xff; 6];
        buf.extend_from_slice(&src);
        buf.extend_from_slice(&eth_type.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_resolve_reads_source_mac() {
        let bytes = frame([0x02, 0, 0, 0, 0, 0x01], 0x0806, &[0; 28]);
        let umem = umem_with(&bytes, 2048);

        let packet = Packet::resolve(&umem, 2048, XdpDesc::new(2048, bytes.len() as u32)).unwrap();
        assert_eq!(packet.len(), 42);
        assert_eq!(packet.frame(), 2048);
        assert_eq!(packet.source_mac().to_string(), "02:00:00:00:00:01");
        assert!(packet.ipv4().is_none());
    }

    #[test]
    fn test_resolve_rejects_short_and_overlong() {
        let umem = umem_with(&[0; 8], 0);
        assert_eq!(
            Packet::resolve(&umem, 0, XdpDesc::new(0, 8)).unwrap_err(),
            Malformed::TooShort { len: 8 }
        );
        assert_eq!(
            Packet::resolve(&umem, 0, XdpDesc::new(100, 2000)).unwrap_err(),
            Malformed::OutOfBounds { addr: 100, len: 2000 }
        );
    }

    #[test]
    fn test_ipv4_view() {
        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);
        let bytes = frame([0x02, 0, 0, 0, 0, 0x02], 0x0800, &ip);
        let umem = umem_with(&bytes, 256);

        let packet = Packet::resolve(&umem, 0, XdpDesc::new(256, bytes.len() as u32)).unwrap();
        let header = packet.ipv4().unwrap();
        assert_eq!(header.source().to_string(), "10.0.0.1");
        assert_eq!(header.destination().to_string(), "10.0.0.2");
    }

    #[test]
    fn test_source_printer_line_format() {
        let bytes = frame([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], 0x0800, &[]);
        let umem = umem_with(&bytes, 0);
        let packet = Packet::resolve(&umem, 0, XdpDesc::new(0, 14)).unwrap();

        let mut printer = SourcePrinter::new(Vec::new());
        printer.inspect(&packet);
        let out = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(out, "Received packet from aa:bb:cc:dd:ee:ff\n");
    }
}
