//! Virtio-style block device living inside guest memory.
//!
//! A small cousin of virtio-blk: one ring of ten
//! descriptors, a single-slot available ring and a single-slot used ring,
//! all overlaid on the word space at [`DEVICE_VIRTIO`]. A driver (guest
//! code or the host-side [`BlockDriver`]) announces a request and rings
//! the doorbell at [`INTERRUPT_VIRTIO`]; the store dispatches straight
//! into [`VirtioBlk`], which services the ring before the store returns.
//!
//! # Ring Layout (word offsets from the ring base)
//!
//! ```text
//! +0          num                       (= VRING_SIZE)
//! +1 + 4*i    desc[i] { addr, len, flags, next }
//! +41         avail   { flags, idx }
//! +43         used    { flags, idx }
//! +45         data area, VRING_DESC_CAPACITY words per descriptor
//! ```
//!
//! Storage is a placeholder: READ synthesizes `'0' + position + i` into
//! the response and WRITE only logs the payload. Nothing is persisted.
//!
//! [`DEVICE_VIRTIO`]: crate::device::memory_map::DEVICE_VIRTIO
//! [`INTERRUPT_VIRTIO`]: crate::device::memory_map::INTERRUPT_VIRTIO

pub mod block;
pub mod driver;
pub mod request;
pub mod ring;

pub use block::{BlockStats, VirtioBlk, WriteRecord};
pub use driver::{BlockDriver, DriverError, DEFAULT_POLL_LIMIT};
pub use request::{BlockOp, BlockRequest, BLK_HEADER_WORDS, BLK_MAX_PAYLOAD};
pub use ring::{Descriptor, VirtRing};

use thiserror::Error;

/// Number of descriptors in the ring.
pub const VRING_SIZE: u16 = 10;

/// Words in the ring's data area, shared evenly by the descriptors.
pub const VRING_BUF_SIZE: u16 = VRING_SIZE * 32;

/// Per-descriptor buffer capacity in words.
pub const VRING_DESC_CAPACITY: u16 = VRING_BUF_SIZE / VRING_SIZE;

/// Doorbell value a driver stores to kick the device.
pub const VIRTIO_KICK: u16 = 0x0001;

/// Flag bit meaning "in use" on descriptors and the avail/used slots.
pub const VRING_FLAG_SET: u16 = 0x0001;

/// Errors raised by ring and request accessors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VirtioError {
    /// Descriptor index outside `0..VRING_SIZE`.
    #[error("descriptor index {index} out of range (ring holds {VRING_SIZE})")]
    DescriptorOutOfRange {
        /// The offending index.
        index: u16,
    },
}
