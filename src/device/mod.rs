//! Memory and devices of the monitor.
//!
//! This module provides:
//! - The raw word store ([`Memory`]) and its address map
//! - The instrumented [`Bus`] that attaches side effects to loads and stores
//! - Host console I/O behind the [`Console`] trait
//! - Synchronous interrupt dispatch
//! - The virtio-style block device and a host-side driver for it
//!
//! # Example
//!
//! ```
//! use lc3_vmm::device::{Bus, BufferConsole, BlockDriver, VirtioBlk};
//!
//! let mut bus = Bus::new(Box::new(BufferConsole::new()));
//! bus.attach_virtio(VirtioBlk::new());
//!
//! let words = BlockDriver::default().read(&mut bus, 20, 3).unwrap();
//! assert_eq!(words, vec![b'D' as u16, b'E' as u16, b'F' as u16]);
//! ```

pub mod bus;
pub mod console;
pub mod interrupt;
pub mod memory;
pub mod memory_map;
pub mod virtio;

pub use bus::Bus;
pub use console::{BufferConsole, Console, StdConsole};
pub use interrupt::{DispatchOutcome, HandlerOutcome, InterruptDispatcher, InterruptHandler};
pub use memory::Memory;
pub use virtio::{BlockDriver, DriverError, VirtioBlk, VirtioError};
