//! lc3-vmm library
//!
//! An LC-3 virtual machine monitor: a 16-bit CPU interpreter over an
//! instrumented 64K-word memory, with keyboard registers, trap services
//! and a virtio-style block device reached through an interrupt window.

pub mod config;
pub mod device;
pub mod interpreter;
pub mod loader;
pub mod terminal;

pub use config::Config;
pub use interpreter::Monitor;
