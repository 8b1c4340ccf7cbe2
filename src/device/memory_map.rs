//! Address map of the LC-3 word space.
//!
//! The windows below are reserved by convention only; nothing stops a
//! program from storing into them. The monitor attaches side effects to
//! two of them:
//!
//! ```text
//! 0x0000 - 0x00FF   Trap vector table
//! 0x0100 - 0x01FF   Interrupt vector table   (writes dispatch an interrupt)
//! 0x0200 - 0x2FFF   OS and supervisor stack
//! 0x3000 - 0x7FFE   User program area
//! 0x7FFF - ...      Virtio block device ring
//! 0xFE00 - 0xFFFF   Device registers         (KBSR reads poll the keyboard)
//! ```

use std::ops::RangeInclusive;

/// Number of addressable 16-bit words.
pub const MEMORY_MAX: usize = 1 << 16;

/// Trap vector table.
pub const TRAP_VECTOR_TABLE: RangeInclusive<u16> = 0x0000..=0x00FF;

/// Interrupt vector table. Any write here is routed to the dispatcher.
pub const INTERRUPT_WINDOW: RangeInclusive<u16> = 0x0100..=0x01FF;

/// Interrupt/doorbell register of the virtio block device.
pub const INTERRUPT_VIRTIO: u16 = 0x0100;

/// Base of the virtio ring.
pub const DEVICE_VIRTIO: u16 = 0x7FFF;

/// Keyboard status register. Bit 15 set means a character is ready.
pub const KBSR: u16 = 0xFE00;

/// Keyboard data register.
pub const KBDR: u16 = 0xFE02;

/// Default program entry point.
pub const PC_START: u16 = 0x3000;

/// Whether a write to `addr` must be forwarded to the interrupt dispatcher.
#[inline]
pub fn is_interrupt_vector(addr: u16) -> bool {
    INTERRUPT_WINDOW.contains(&addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_window_bounds() {
        assert!(!is_interrupt_vector(0x00FF));
        assert!(is_interrupt_vector(0x0100));
        assert!(is_interrupt_vector(0x01FF));
        assert!(!is_interrupt_vector(0x0200));
        assert!(!is_interrupt_vector(KBSR));
    }

    #[test]
    fn test_windows_do_not_overlap() {
        assert!(!TRAP_VECTOR_TABLE.contains(INTERRUPT_WINDOW.start()));
        assert!(DEVICE_VIRTIO < KBSR);
        assert!(PC_START < DEVICE_VIRTIO);
    }
}
