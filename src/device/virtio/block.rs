//! Virtio block device model.
//!
//! The device is an [`InterruptHandler`] on the virtio doorbell. When a
//! kick arrives it consumes the single available slot, services the
//! request sitting in that descriptor's buffer, and (for READ) publishes
//! the descriptor in the used slot. Faults inside the ring are logged and
//! swallowed: the driver simply sees no used entry.

use crate::device::interrupt::{HandlerOutcome, InterruptHandler};
use crate::device::memory::Memory;
use crate::device::memory_map::INTERRUPT_VIRTIO;

use super::request::{BlockOp, BlockRequest, BLK_HEADER_WORDS};
use super::ring::{RingSlot, VirtRing};
use super::{VirtioError, VIRTIO_KICK, VRING_FLAG_SET};

/// Counters for serviced traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Events with the doorbell bit set.
    pub kicks: u64,
    /// READ requests completed.
    pub reads: u64,
    /// WRITE requests accepted.
    pub writes: u64,
    /// Requests with an unknown operation code.
    pub unsupported: u64,
    /// Kicks that found a malformed ring (bad index, nothing allocated).
    pub faults: u64,
}

/// Payload of the most recent WRITE, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub position: i16,
    pub data: Vec<u16>,
}

/// Placeholder-storage block device.
#[derive(Debug)]
pub struct VirtioBlk {
    ring: VirtRing,
    vector: u16,
    stats: BlockStats,
    last_write: Option<WriteRecord>,
}

impl Default for VirtioBlk {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtioBlk {
    /// Device on the standard ring base and doorbell.
    pub fn new() -> Self {
        Self::with_ring(VirtRing::default(), INTERRUPT_VIRTIO)
    }

    pub fn with_ring(ring: VirtRing, vector: u16) -> Self {
        Self {
            ring,
            vector,
            stats: BlockStats::default(),
            last_write: None,
        }
    }

    /// Lay out the ring in `mem`.
    pub fn init(&self, mem: &mut Memory) {
        self.ring.init(mem);
    }

    pub fn ring(&self) -> VirtRing {
        self.ring
    }

    pub fn stats(&self) -> BlockStats {
        self.stats
    }

    pub fn last_write(&self) -> Option<&WriteRecord> {
        self.last_write.as_ref()
    }

    /// Content a READ returns for word `i` of a request at `position`.
    ///
    /// Stands in for real storage; independent of anything written.
    #[inline]
    pub fn synthesize(position: i16, i: usize) -> u16 {
        (b'0' as u16)
            .wrapping_add(position as u16)
            .wrapping_add(i as u16)
    }

    /// Handle one event on the doorbell.
    pub fn service(&mut self, mem: &mut Memory, flags: u16) -> HandlerOutcome {
        log::debug!("virtio handler: flags 0x{:04X}", flags);

        if flags & VIRTIO_KICK == 0 {
            return HandlerOutcome::Ignored;
        }
        self.stats.kicks += 1;

        let avail = self.ring.avail(mem);
        if avail.flags & VRING_FLAG_SET != 0 {
            self.ring.set_avail(mem, RingSlot { flags: 0, idx: avail.idx });

            if let Err(e) = self.service_descriptor(mem, avail.idx) {
                self.stats.faults += 1;
                log::warn!("virtio: dropped request on descriptor {}: {}", avail.idx, e);
            }
        } else {
            log::debug!("virtio: kick with empty available ring");
        }

        HandlerOutcome::Serviced
    }

    fn service_descriptor(&mut self, mem: &mut Memory, index: u16) -> Result<(), VirtioError> {
        if !self.ring.is_allocated(mem, index)? {
            self.stats.faults += 1;
            log::debug!("virtio: descriptor {} announced but not allocated", index);
            return Ok(());
        }
        self.ring.set_desc_flags(mem, index, 0)?;

        let desc = self.ring.descriptor(mem, index)?;
        let request = BlockRequest::load(mem, desc.addr);
        let capacity = desc.len.saturating_sub(BLK_HEADER_WORDS) as usize;
        let len = request.payload_len().min(capacity);
        if len < request.length as usize {
            log::warn!(
                "virtio: request length {} truncated to {} words",
                request.length,
                len
            );
        }
        let payload = BlockRequest::payload_addr(desc.addr);

        match request.op {
            BlockOp::Read => {
                BlockRequest::clear_op(mem, desc.addr);
                log::info!("virtio read pos: {} len: {}", request.position, len);

                for i in 0..len {
                    let word = Self::synthesize(request.position, i);
                    mem.set(payload.wrapping_add(i as u16), word);
                }

                self.ring.set_used(mem, RingSlot { flags: VRING_FLAG_SET, idx: index });
                // Hand the descriptor back so the driver finds its response.
                self.ring.set_desc_flags(mem, index, VRING_FLAG_SET)?;
                self.stats.reads += 1;
            }
            BlockOp::Write => {
                BlockRequest::clear_op(mem, desc.addr);
                let data = mem.read_slice(payload, len);
                let text: String = data.iter().map(|w| (*w as u8) as char).collect();
                log::info!(
                    "virtio write pos: {} len: {} buf: {:?}",
                    request.position,
                    len,
                    text
                );

                self.last_write = Some(WriteRecord { position: request.position, data });
                self.stats.writes += 1;
            }
            BlockOp::Other(code) => {
                self.stats.unsupported += 1;
                log::warn!("virtio: unsupported block operation 0x{:04X}", code);
            }
        }

        Ok(())
    }
}

impl InterruptHandler for VirtioBlk {
    fn vector(&self) -> u16 {
        self.vector
    }

    fn name(&self) -> &'static str {
        "virtio-blk"
    }

    fn handle(&mut self, mem: &mut Memory, flags: u16) -> HandlerOutcome {
        self.service(mem, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::virtio::VRING_SIZE;

    fn setup() -> (Memory, VirtioBlk) {
        let mut mem = Memory::new();
        let blk = VirtioBlk::new();
        blk.init(&mut mem);
        (mem, blk)
    }

    /// Place a request on descriptor `index` and announce it, the way a
    /// driver does before kicking.
    fn submit(mem: &mut Memory, ring: VirtRing, index: u16, request: BlockRequest, payload: &[u16]) {
        let addr = ring.descriptor(mem, index).unwrap().addr;
        ring.set_desc_flags(mem, index, 1).unwrap();
        request.store(mem, addr);
        mem.write_slice(BlockRequest::payload_addr(addr), payload);
        ring.set_avail(mem, RingSlot { flags: 1, idx: index });
    }

    #[test]
    fn test_read_synthesizes_content() {
        let (mut mem, mut blk) = setup();
        let ring = blk.ring();
        submit(&mut mem, ring, 0, BlockRequest::read(20, 4), &[]);

        assert_eq!(blk.service(&mut mem, VIRTIO_KICK), HandlerOutcome::Serviced);

        let addr = ring.buffer_addr(0);
        let expected: Vec<u16> = (0..4).map(|i| '0' as u16 + 20 + i).collect();
        assert_eq!(mem.read_slice(BlockRequest::payload_addr(addr), 4), expected);

        // Request consumed, used slot published, descriptor handed back.
        assert_eq!(BlockRequest::load(&mem, addr).op, BlockOp::Other(0));
        assert_eq!(ring.used(&mem), RingSlot { flags: 1, idx: 0 });
        assert!(ring.is_allocated(&mem, 0).unwrap());
        assert_eq!(ring.avail(&mem).flags, 0);
        assert_eq!(blk.stats().reads, 1);
    }

    #[test]
    fn test_write_logs_without_persisting() {
        let (mut mem, mut blk) = setup();
        let ring = blk.ring();
        let payload: Vec<u16> = "hello".bytes().map(u16::from).collect();
        submit(&mut mem, ring, 3, BlockRequest::write(10, 5), &payload);

        assert_eq!(blk.service(&mut mem, VIRTIO_KICK), HandlerOutcome::Serviced);

        assert_eq!(
            blk.last_write(),
            Some(&WriteRecord { position: 10, data: payload })
        );
        // No used entry and the descriptor is free again.
        assert_eq!(ring.used(&mem), RingSlot::default());
        assert!(!ring.is_allocated(&mem, 3).unwrap());
        assert_eq!(blk.stats().writes, 1);

        // A READ at the same spot still yields synthesized content.
        submit(&mut mem, ring, 0, BlockRequest::read(10, 5), &[]);
        blk.service(&mut mem, VIRTIO_KICK);
        let got = mem.read_slice(BlockRequest::payload_addr(ring.buffer_addr(0)), 5);
        assert_eq!(got, (0..5).map(|i| VirtioBlk::synthesize(10, i)).collect::<Vec<_>>());
    }

    #[test]
    fn test_without_doorbell_is_ignored() {
        let (mut mem, mut blk) = setup();
        let ring = blk.ring();
        submit(&mut mem, ring, 0, BlockRequest::read(0, 1), &[]);

        assert_eq!(blk.service(&mut mem, 0x0002), HandlerOutcome::Ignored);
        // Nothing consumed.
        assert_eq!(ring.avail(&mem).flags, 1);
        assert_eq!(blk.stats().kicks, 0);
    }

    #[test]
    fn test_kick_with_empty_available_ring() {
        let (mut mem, mut blk) = setup();
        assert_eq!(blk.service(&mut mem, VIRTIO_KICK), HandlerOutcome::Serviced);
        assert_eq!(blk.ring().used(&mem), RingSlot::default());
    }

    #[test]
    fn test_unallocated_descriptor_is_skipped() {
        let (mut mem, mut blk) = setup();
        let ring = blk.ring();
        BlockRequest::read(1, 1).store(&mut mem, ring.buffer_addr(2));
        ring.set_avail(&mut mem, RingSlot { flags: 1, idx: 2 });

        blk.service(&mut mem, VIRTIO_KICK);
        assert_eq!(ring.used(&mem), RingSlot::default());
        assert_eq!(blk.stats().faults, 1);
    }

    #[test]
    fn test_out_of_range_avail_index() {
        let (mut mem, mut blk) = setup();
        let ring = blk.ring();
        ring.set_avail(&mut mem, RingSlot { flags: 1, idx: VRING_SIZE + 5 });

        assert_eq!(blk.service(&mut mem, VIRTIO_KICK), HandlerOutcome::Serviced);
        assert_eq!(blk.stats().faults, 1);
        assert_eq!(ring.allocated(&mem), 0);
    }

    #[test]
    fn test_oversized_read_is_truncated() {
        let (mut mem, mut blk) = setup();
        let ring = blk.ring();
        submit(&mut mem, ring, 0, BlockRequest::read(0, 200), &[]);
        blk.service(&mut mem, VIRTIO_KICK);

        // Descriptor 1's buffer starts right after descriptor 0's.
        let next_buffer = ring.buffer_addr(1);
        assert_eq!(mem.get(next_buffer), 0);
        assert_eq!(mem.get(next_buffer - 1), VirtioBlk::synthesize(0, 28));
    }

    #[test]
    fn test_unsupported_operation() {
        let (mut mem, mut blk) = setup();
        let ring = blk.ring();
        let request = BlockRequest { op: BlockOp::Other(9), position: 0, length: 1 };
        submit(&mut mem, ring, 0, request, &[]);

        blk.service(&mut mem, VIRTIO_KICK);
        assert_eq!(blk.stats().unsupported, 1);
        assert!(!ring.is_allocated(&mem, 0).unwrap());
        assert_eq!(ring.used(&mem), RingSlot::default());
    }
}
