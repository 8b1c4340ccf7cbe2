//! Typed view over the vring stored in guest memory.
//!
//! `VirtRing` holds only the base address. Every field access computes an
//! address from the base and goes through [`Memory`], with descriptor
//! indices checked against [`VRING_SIZE`]. Drivers that must go through
//! the instrumented bus use the `*_addr` helpers to find the same words.

use crate::device::memory::Memory;
use crate::device::memory_map::DEVICE_VIRTIO;

use super::{VirtioError, VRING_DESC_CAPACITY, VRING_SIZE};

/// Words per descriptor: `addr`, `len`, `flags`, `next`.
pub const DESC_WORDS: u16 = 4;

/// Offset of `desc[0]` from the ring base (after `num`).
pub const DESC_OFFSET: u16 = 1;

/// Offset of the available slot.
pub const AVAIL_OFFSET: u16 = DESC_OFFSET + DESC_WORDS * VRING_SIZE;

/// Offset of the used slot.
pub const USED_OFFSET: u16 = AVAIL_OFFSET + 2;

/// Size of the ring header; the data area starts here.
pub const RING_HEADER_WORDS: u16 = USED_OFFSET + 2;

/// Field of a descriptor, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescField {
    Addr = 0,
    Len = 1,
    Flags = 2,
    Next = 3,
}

/// Snapshot of one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Address of the descriptor's buffer.
    pub addr: u16,
    /// Buffer capacity in words.
    pub len: u16,
    /// Nonzero when the descriptor is allocated.
    pub flags: u16,
    /// Next descriptor in the free chain (0 terminates).
    pub next: u16,
}

impl Descriptor {
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.flags != 0
    }
}

/// Snapshot of the available or used slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingSlot {
    pub flags: u16,
    pub idx: u16,
}

/// Accessor for the ring at a fixed base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtRing {
    base: u16,
}

impl Default for VirtRing {
    fn default() -> Self {
        Self::new(DEVICE_VIRTIO)
    }
}

impl VirtRing {
    pub const fn new(base: u16) -> Self {
        Self { base }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    /// Lay out a fresh ring: all descriptors free, chained `i -> i + 1`,
    /// the last one terminating at 0, each owning a fixed buffer.
    pub fn init(&self, mem: &mut Memory) {
        mem.set(self.base, VRING_SIZE);

        for i in 0..VRING_SIZE {
            let next = if i + 1 == VRING_SIZE { 0 } else { i + 1 };
            self.store_descriptor(
                mem,
                i,
                Descriptor {
                    addr: self.buffer_addr(i),
                    len: VRING_DESC_CAPACITY,
                    flags: 0,
                    next,
                },
            );
        }

        self.set_avail(mem, RingSlot::default());
        self.set_used(mem, RingSlot::default());

        log::debug!(
            "vring at 0x{:04X}: {} descriptors, data 0x{:04X}..0x{:04X}",
            self.base,
            VRING_SIZE,
            self.data_start(),
            self.data_end()
        );
    }

    /// The `num` word.
    pub fn num(&self, mem: &Memory) -> u16 {
        mem.get(self.base)
    }

    /// First word of the data area.
    pub fn data_start(&self) -> u16 {
        self.base.wrapping_add(RING_HEADER_WORDS)
    }

    /// One past the last word of the data area.
    pub fn data_end(&self) -> u16 {
        self.data_start()
            .wrapping_add(VRING_DESC_CAPACITY * VRING_SIZE)
    }

    /// Fixed buffer address assigned to descriptor `index` at init.
    pub fn buffer_addr(&self, index: u16) -> u16 {
        self.data_start()
            .wrapping_add(index.wrapping_mul(VRING_DESC_CAPACITY))
    }

    /// Address of one field of descriptor `index`.
    pub fn desc_field_addr(&self, index: u16, field: DescField) -> Result<u16, VirtioError> {
        check_index(index)?;
        Ok(self
            .base
            .wrapping_add(DESC_OFFSET + index * DESC_WORDS + field as u16))
    }

    pub fn avail_flags_addr(&self) -> u16 {
        self.base.wrapping_add(AVAIL_OFFSET)
    }

    pub fn avail_idx_addr(&self) -> u16 {
        self.base.wrapping_add(AVAIL_OFFSET + 1)
    }

    pub fn used_flags_addr(&self) -> u16 {
        self.base.wrapping_add(USED_OFFSET)
    }

    pub fn used_idx_addr(&self) -> u16 {
        self.base.wrapping_add(USED_OFFSET + 1)
    }

    /// Read descriptor `index`.
    pub fn descriptor(&self, mem: &Memory, index: u16) -> Result<Descriptor, VirtioError> {
        Ok(Descriptor {
            addr: mem.get(self.desc_field_addr(index, DescField::Addr)?),
            len: mem.get(self.desc_field_addr(index, DescField::Len)?),
            flags: mem.get(self.desc_field_addr(index, DescField::Flags)?),
            next: mem.get(self.desc_field_addr(index, DescField::Next)?),
        })
    }

    /// Set the allocation flags of descriptor `index`.
    pub fn set_desc_flags(&self, mem: &mut Memory, index: u16, flags: u16) -> Result<(), VirtioError> {
        mem.set(self.desc_field_addr(index, DescField::Flags)?, flags);
        Ok(())
    }

    /// Whether descriptor `index` is allocated.
    pub fn is_allocated(&self, mem: &Memory, index: u16) -> Result<bool, VirtioError> {
        Ok(mem.get(self.desc_field_addr(index, DescField::Flags)?) != 0)
    }

    /// Lowest-indexed free descriptor, found by linear scan.
    ///
    /// The `next` chain is laid out but not walked; the flags word is the
    /// only allocation state.
    pub fn find_empty(&self, mem: &Memory) -> Option<u16> {
        (0..VRING_SIZE).find(|&i| matches!(self.is_allocated(mem, i), Ok(false)))
    }

    /// Number of allocated descriptors.
    pub fn allocated(&self, mem: &Memory) -> usize {
        (0..VRING_SIZE)
            .filter(|&i| matches!(self.is_allocated(mem, i), Ok(true)))
            .count()
    }

    pub fn avail(&self, mem: &Memory) -> RingSlot {
        RingSlot {
            flags: mem.get(self.avail_flags_addr()),
            idx: mem.get(self.avail_idx_addr()),
        }
    }

    pub fn set_avail(&self, mem: &mut Memory, slot: RingSlot) {
        mem.set(self.avail_flags_addr(), slot.flags);
        mem.set(self.avail_idx_addr(), slot.idx);
    }

    pub fn used(&self, mem: &Memory) -> RingSlot {
        RingSlot {
            flags: mem.get(self.used_flags_addr()),
            idx: mem.get(self.used_idx_addr()),
        }
    }

    pub fn set_used(&self, mem: &mut Memory, slot: RingSlot) {
        mem.set(self.used_flags_addr(), slot.flags);
        mem.set(self.used_idx_addr(), slot.idx);
    }

    fn store_descriptor(&self, mem: &mut Memory, index: u16, desc: Descriptor) {
        let at = self.base.wrapping_add(DESC_OFFSET + index * DESC_WORDS);
        mem.write_slice(at, &[desc.addr, desc.len, desc.flags, desc.next]);
    }
}

fn check_index(index: u16) -> Result<(), VirtioError> {
    if index < VRING_SIZE {
        Ok(())
    } else {
        Err(VirtioError::DescriptorOutOfRange { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Memory, VirtRing) {
        let mut mem = Memory::new();
        let ring = VirtRing::default();
        ring.init(&mut mem);
        (mem, ring)
    }

    #[test]
    fn test_layout_offsets() {
        assert_eq!(AVAIL_OFFSET, 41);
        assert_eq!(USED_OFFSET, 43);
        assert_eq!(RING_HEADER_WORDS, 45);

        let ring = VirtRing::default();
        assert_eq!(ring.avail_flags_addr(), 0x7FFF + 41);
        assert_eq!(ring.used_idx_addr(), 0x7FFF + 44);
        assert_eq!(ring.data_start(), 0x7FFF + 45);
        assert_eq!(ring.data_end(), 0x7FFF + 45 + 320);
    }

    #[test]
    fn test_init_descriptors() {
        let (mem, ring) = fresh();
        assert_eq!(ring.num(&mem), VRING_SIZE);

        for i in 0..VRING_SIZE {
            let desc = ring.descriptor(&mem, i).unwrap();
            assert_eq!(desc.addr, ring.data_start() + i * VRING_DESC_CAPACITY);
            assert_eq!(desc.len, VRING_DESC_CAPACITY);
            assert!(!desc.is_allocated());
        }

        // Free chain: 0 -> 1 -> ... -> 9 -> 0
        assert_eq!(ring.descriptor(&mem, 0).unwrap().next, 1);
        assert_eq!(ring.descriptor(&mem, 8).unwrap().next, 9);
        assert_eq!(ring.descriptor(&mem, 9).unwrap().next, 0);

        assert_eq!(ring.avail(&mem), RingSlot::default());
        assert_eq!(ring.used(&mem), RingSlot::default());
    }

    #[test]
    fn test_find_empty_lowest_index() {
        let (mut mem, ring) = fresh();
        assert_eq!(ring.find_empty(&mem), Some(0));

        ring.set_desc_flags(&mut mem, 0, 1).unwrap();
        ring.set_desc_flags(&mut mem, 2, 1).unwrap();
        assert_eq!(ring.find_empty(&mem), Some(1));

        ring.set_desc_flags(&mut mem, 1, 1).unwrap();
        assert_eq!(ring.find_empty(&mem), Some(3));

        // Freeing a lower slot makes it the next pick again.
        ring.set_desc_flags(&mut mem, 0, 0).unwrap();
        assert_eq!(ring.find_empty(&mem), Some(0));
    }

    #[test]
    fn test_find_empty_full_ring() {
        let (mut mem, ring) = fresh();
        for i in 0..VRING_SIZE {
            ring.set_desc_flags(&mut mem, i, 1).unwrap();
        }
        assert_eq!(ring.find_empty(&mem), None);
        assert_eq!(ring.allocated(&mem), VRING_SIZE as usize);
    }

    #[test]
    fn test_out_of_range_index() {
        let (mut mem, ring) = fresh();
        assert_eq!(
            ring.descriptor(&mem, VRING_SIZE),
            Err(VirtioError::DescriptorOutOfRange { index: VRING_SIZE })
        );
        assert!(ring.set_desc_flags(&mut mem, 0xFFFF, 1).is_err());
        // The failed store touched nothing.
        assert_eq!(ring.allocated(&mem), 0);
    }
}
