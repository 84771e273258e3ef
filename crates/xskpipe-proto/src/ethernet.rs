use std::fmt;

pub const ETH_HLEN: usize = std::mem::size_of::<EthHeader>();

pub const ETH_P_IP: u16 = 0x0800;
pub const ETH_P_IPV6: u16 = 0x86DD;
pub const ETH_P_ARP: u16 = 0x0806;

#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct EthHeader {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub eth_type: u16,
}

impl EthHeader {
    pub fn eth_type(&self) -> u16 {
        u16::from_be(self.eth_type)
    }

    pub fn source(&self) -> MacAddr {
        MacAddr(self.src)
    }

    pub fn destination(&self) -> MacAddr {
        MacAddr(self.dst)
    }
}

/// Hardware address, printed as `aa:bb:cc:dd:ee:ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Split `data` into an Ethernet header and its payload. `None` if the
/// buffer is shorter than a header.
pub fn parse_eth(data: &[u8]) -> Option<(&EthHeader, &[u8])> {
    if data.len() < ETH_HLEN {
        return None;
    }

    // Packed struct: alignment 1, any byte offset is valid.
    let header = unsafe { &*(data.as_ptr() as *const EthHeader) };
    Some((header, &data[ETH_HLEN..]))
}
