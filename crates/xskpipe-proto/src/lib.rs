pub mod ethernet;
pub mod ipv4;

pub use ethernet::{parse_eth, EthHeader, MacAddr, ETH_HLEN, ETH_P_ARP, ETH_P_IP, ETH_P_IPV6};
pub use ipv4::{parse_ipv4, Ipv4Header};
