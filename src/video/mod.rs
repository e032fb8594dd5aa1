//! Configuration of one capturable stream of a device

pub mod capture;
pub use capture::Capture;
