//! Host-side driver for the virtio block device.
//!
//! Runs the submission protocol through the instrumented [`Bus`], exactly
//! as guest code would with ST/STI: allocate a descriptor, fill in the
//! request, announce it on the available slot and kick the doorbell. The
//! completion wait polls the doorbell word for the replay code, bounded
//! by `poll_limit` so a device that never answers surfaces as
//! [`DriverError::Timeout`] instead of a hang.

use thiserror::Error;

use crate::device::bus::Bus;
use crate::device::interrupt::REPLAY;
use crate::device::memory_map::INTERRUPT_VIRTIO;

use super::request::{BlockRequest, BLK_MAX_PAYLOAD};
use super::ring::{DescField, VirtRing};
use super::{VirtioError, VIRTIO_KICK, VRING_FLAG_SET};

/// Default bound on completion polls.
pub const DEFAULT_POLL_LIMIT: u32 = 10_000;

/// Errors seen by a driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// No free descriptor; the request was dropped before the kick.
    #[error("no free descriptor, request dropped")]
    RingFull,

    /// The doorbell never showed the replay code.
    #[error("no completion after {polls} polls of the interrupt register")]
    Timeout {
        /// Polls performed before giving up.
        polls: u32,
    },

    /// Completion was signalled but the used slot holds no response.
    #[error("completion signalled without a used-ring response")]
    NoCompletion,

    /// Payload does not fit in one descriptor.
    #[error("payload of {len} words exceeds {max}")]
    TooLarge {
        len: usize,
        max: usize,
    },

    /// Ring accessor rejected an index.
    #[error(transparent)]
    Ring(#[from] VirtioError),
}

/// Blocking block-device client.
#[derive(Debug, Clone, Copy)]
pub struct BlockDriver {
    ring: VirtRing,
    doorbell: u16,
    poll_limit: u32,
}

impl Default for BlockDriver {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_LIMIT)
    }
}

impl BlockDriver {
    /// Driver for the standard ring and doorbell.
    pub fn new(poll_limit: u32) -> Self {
        Self::with_ring(VirtRing::default(), INTERRUPT_VIRTIO, poll_limit)
    }

    pub fn with_ring(ring: VirtRing, doorbell: u16, poll_limit: u32) -> Self {
        Self {
            ring,
            doorbell,
            poll_limit,
        }
    }

    pub fn poll_limit(&self) -> u32 {
        self.poll_limit
    }

    /// Read `len` words at `position`.
    pub fn read(&self, bus: &mut Bus, position: i16, len: usize) -> Result<Vec<u16>, DriverError> {
        check_len(len)?;
        let index = self.submit(bus, BlockRequest::read(position, len as u16), &[])?;
        log::debug!("driver: read submitted on descriptor {}", index);

        self.kick_and_wait(bus)?;

        let used_flags = bus.read(self.ring.used_flags_addr());
        if used_flags != VRING_FLAG_SET {
            return Err(DriverError::NoCompletion);
        }
        bus.write(self.ring.used_flags_addr(), 0);

        let used = bus.read(self.ring.used_idx_addr());
        let flags_addr = self.ring.desc_field_addr(used, DescField::Flags)?;
        if bus.read(flags_addr) != VRING_FLAG_SET {
            return Err(DriverError::NoCompletion);
        }
        bus.write(flags_addr, 0);

        let addr = bus.read(self.ring.desc_field_addr(used, DescField::Addr)?);
        let payload = BlockRequest::payload_addr(addr);
        Ok((0..len)
            .map(|i| bus.read(payload.wrapping_add(i as u16)))
            .collect())
    }

    /// Write `data` at `position`.
    pub fn write(&self, bus: &mut Bus, position: i16, data: &[u16]) -> Result<(), DriverError> {
        check_len(data.len())?;
        let index = self.submit(bus, BlockRequest::write(position, data.len() as u16), data)?;
        log::debug!("driver: write submitted on descriptor {}", index);

        self.kick_and_wait(bus)
    }

    fn submit(&self, bus: &mut Bus, request: BlockRequest, payload: &[u16]) -> Result<u16, DriverError> {
        let Some(index) = self.ring.find_empty(bus.memory()) else {
            log::warn!("driver: ring full, dropping {:?}", request.op);
            return Err(DriverError::RingFull);
        };

        let addr = bus.read(self.ring.desc_field_addr(index, DescField::Addr)?);
        bus.write(self.ring.desc_field_addr(index, DescField::Flags)?, VRING_FLAG_SET);

        for (i, word) in request.header_words().iter().enumerate() {
            bus.write(addr.wrapping_add(i as u16), *word);
        }
        let start = BlockRequest::payload_addr(addr);
        for (i, word) in payload.iter().enumerate() {
            bus.write(start.wrapping_add(i as u16), *word);
        }

        bus.write(self.ring.avail_flags_addr(), VRING_FLAG_SET);
        bus.write(self.ring.avail_idx_addr(), index);
        Ok(index)
    }

    fn kick_and_wait(&self, bus: &mut Bus) -> Result<(), DriverError> {
        bus.write(self.doorbell, VIRTIO_KICK);

        for _ in 0..self.poll_limit {
            if bus.read(self.doorbell) == REPLAY {
                return Ok(());
            }
            std::hint::spin_loop();
        }
        Err(DriverError::Timeout {
            polls: self.poll_limit,
        })
    }
}

fn check_len(len: usize) -> Result<(), DriverError> {
    if len > BLK_MAX_PAYLOAD {
        return Err(DriverError::TooLarge {
            len,
            max: BLK_MAX_PAYLOAD,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::console::BufferConsole;
    use crate::device::virtio::{VirtioBlk, VRING_SIZE};

    fn bus_with_device() -> Bus {
        let mut bus = Bus::new(Box::new(BufferConsole::new()));
        bus.attach_virtio(VirtioBlk::new());
        bus
    }

    #[test]
    fn test_read_round_trip() {
        let mut bus = bus_with_device();
        let driver = BlockDriver::default();

        let data = driver.read(&mut bus, 20, 10).unwrap();
        let text: String = data.iter().map(|w| *w as u8 as char).collect();
        assert_eq!(text, "DEFGHIJKLM");

        // Descriptor released by the driver after copying out.
        assert_eq!(driver.ring.allocated(bus.memory()), 0);
        assert_eq!(bus.memory().get(INTERRUPT_VIRTIO), REPLAY);
    }

    #[test]
    fn test_write_then_read_is_not_persistent() {
        let mut bus = bus_with_device();
        let driver = BlockDriver::default();

        let payload: Vec<u16> = "ABCDEFGHIJ".bytes().map(u16::from).collect();
        driver.write(&mut bus, 10, &payload).unwrap();

        let back = driver.read(&mut bus, 10, payload.len()).unwrap();
        let expected: Vec<u16> = (0..payload.len()).map(|i| VirtioBlk::synthesize(10, i)).collect();
        assert_eq!(back, expected);
        assert_ne!(back, payload);
    }

    #[test]
    fn test_ring_full_drops_request() {
        let mut bus = bus_with_device();
        let driver = BlockDriver::default();
        let ring = VirtRing::default();
        for i in 0..VRING_SIZE {
            ring.set_desc_flags(bus.memory_mut(), i, 1).unwrap();
        }
        let before = bus.memory().as_slice().to_vec();

        assert_eq!(driver.read(&mut bus, 0, 1), Err(DriverError::RingFull));
        // Nothing was touched, not even the doorbell.
        assert_eq!(bus.memory().as_slice(), before.as_slice());
    }

    #[test]
    fn test_timeout_without_device() {
        let mut bus = Bus::new(Box::new(BufferConsole::new()));
        VirtRing::default().init(bus.memory_mut());
        let driver = BlockDriver::new(16);

        assert_eq!(
            driver.write(&mut bus, 0, &[1]),
            Err(DriverError::Timeout { polls: 16 })
        );
    }

    #[test]
    fn test_too_large() {
        let mut bus = bus_with_device();
        let driver = BlockDriver::default();
        assert_eq!(
            driver.read(&mut bus, 0, BLK_MAX_PAYLOAD + 1),
            Err(DriverError::TooLarge { len: BLK_MAX_PAYLOAD + 1, max: BLK_MAX_PAYLOAD })
        );
    }

    #[test]
    fn test_sequential_reads_reuse_descriptor_zero() {
        let mut bus = bus_with_device();
        let driver = BlockDriver::default();

        for pos in 0..(VRING_SIZE as i16 * 2) {
            let data = driver.read(&mut bus, pos, 2).unwrap();
            assert_eq!(data, vec![VirtioBlk::synthesize(pos, 0), VirtioBlk::synthesize(pos, 1)]);
        }
        assert_eq!(driver.ring.find_empty(bus.memory()), Some(0));
    }
}
