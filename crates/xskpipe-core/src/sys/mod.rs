pub mod eventfd;
pub mod if_xdp;
pub mod mmap;
pub mod socket;
pub mod utils;
