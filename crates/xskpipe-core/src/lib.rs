pub mod ring;
pub mod umem;
#[cfg(target_os = "linux")]
pub mod sys;
