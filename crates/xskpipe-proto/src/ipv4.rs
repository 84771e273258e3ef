use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct Ipv4Header {
    pub ver_ihl: u8,
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub frag_off: u16,
    pub ttl: u8,
    pub proto: u8,
    pub check: u16,
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl Ipv4Header {
    pub fn version(&self) -> u8 {
        self.ver_ihl >> 4
    }

    pub fn ihl(&self) -> u8 {
        self.ver_ihl & 0x0F
    }

    pub fn header_len(&self) -> usize {
        (self.ihl() as usize) * 4
    }

    pub fn source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src)
    }

    pub fn destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst)
    }
}

/// Split `data` into an IPv4 header (options included) and its payload.
pub fn parse_ipv4(data: &[u8]) -> Option<(&Ipv4Header, &[u8])> {
    if data.len() < std::mem::size_of::<Ipv4Header>() {
        return None;
    }

    let header = unsafe { &*(data.as_ptr() as *const Ipv4Header) };
    let header_len = header.header_len();
    if header.version() != 4 || header_len < 20 || data.len() < header_len {
        return None;
    }

    Some((header, &data[header_len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_parsing() {
        let mut data = [0u8; 24];
        data[0] = 0x45; // Version 4, IHL 5 (20 bytes)
        data[2..4].copy_from_slice(&24u16.to_be_bytes());
        data[9] = 17; // UDP
        data[12..16].copy_from_slice(&[192, 168, 1, 1]);
        data[16..20].copy_from_slice(&[192, 168, 1, 100]);
        data[20..24].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);

        let (header, payload) = parse_ipv4(&data).expect("Should parse ipv4");
        assert_eq!(header.header_len(), 20);
        assert_eq!(header.proto, 17);
        assert_eq!(header.source(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(header.destination(), Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(payload, &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_ipv4_rejects_truncated_options() {
        let mut data = [0u8; 24];
        data[0] = 0x47; // IHL 7 = 28 bytes, only 24 present
        assert!(parse_ipv4(&data).is_none());

        data[0] = 0x44; // IHL 4 is below the minimum
        assert!(parse_ipv4(&data).is_none());
    }
}
