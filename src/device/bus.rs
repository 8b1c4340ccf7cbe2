//! Instrumented memory access.
//!
//! Every load and store the CPU performs goes through [`Bus::read`] and
//! [`Bus::write`], because that is where memory-mapped side effects
//! happen:
//!
//! - reading `KBSR` polls the console without blocking and latches a
//!   pending key into `KBSR`/`KBDR`
//! - writing into the interrupt vector window dispatches synchronously,
//!   so device work is finished before the store returns
//!
//! Raw access (`memory()`/`memory_mut()`) bypasses both and is meant for
//! loaders, trap services that scan strings, and inspection.

use std::fmt;

use super::console::Console;
use super::interrupt::{DispatchOutcome, InterruptDispatcher, InterruptHandler};
use super::memory::Memory;
use super::memory_map::{is_interrupt_vector, KBDR, KBSR};
use super::virtio::VirtioBlk;

/// Bit 15 of KBSR: a character is ready.
pub const KBSR_READY: u16 = 1 << 15;

/// Memory plus the devices hanging off it.
pub struct Bus {
    memory: Memory,
    interrupts: InterruptDispatcher,
    console: Box<dyn Console>,
    last_dispatch: Option<DispatchOutcome>,
}

impl Bus {
    /// Bus over zeroed memory with no interrupt handlers.
    pub fn new(console: Box<dyn Console>) -> Self {
        Self {
            memory: Memory::new(),
            interrupts: InterruptDispatcher::new(),
            console,
            last_dispatch: None,
        }
    }

    /// Lay out the block device's ring and wire it to its doorbell.
    pub fn attach_virtio(&mut self, device: VirtioBlk) {
        device.init(&mut self.memory);
        self.attach(Box::new(device));
    }

    /// Wire an interrupt handler without touching memory.
    pub fn attach(&mut self, handler: Box<dyn InterruptHandler>) {
        self.interrupts.register(handler);
    }

    /// Load with side effects.
    pub fn read(&mut self, addr: u16) -> u16 {
        if addr == KBSR {
            self.poll_keyboard();
        }
        self.memory.get(addr)
    }

    /// Store with side effects.
    pub fn write(&mut self, addr: u16, value: u16) {
        self.memory.set(addr, value);

        if is_interrupt_vector(addr) {
            let outcome = self.interrupts.dispatch(&mut self.memory, addr);
            self.last_dispatch = Some(outcome);
        }
    }

    fn poll_keyboard(&mut self) {
        match self.console.poll_key() {
            Ok(Some(key)) => {
                self.memory.set(KBSR, KBSR_READY);
                self.memory.set(KBDR, u16::from(key));
            }
            Ok(None) => self.memory.set(KBDR, 0),
            Err(e) => {
                log::warn!("keyboard poll failed: {}", e);
                self.memory.set(KBDR, 0);
            }
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn console_mut(&mut self) -> &mut dyn Console {
        self.console.as_mut()
    }

    pub fn interrupts(&self) -> &InterruptDispatcher {
        &self.interrupts
    }

    /// Outcome of the most recent interrupt-window store.
    pub fn last_dispatch(&self) -> Option<DispatchOutcome> {
        self.last_dispatch
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("memory", &self.memory)
            .field("interrupts", &self.interrupts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::console::BufferConsole;
    use crate::device::interrupt::{HandlerOutcome, REPLAY};
    use crate::device::memory_map::INTERRUPT_VIRTIO;

    #[test]
    fn test_keyboard_poll_latches_key() {
        let mut bus = Bus::new(Box::new(BufferConsole::with_input("k")));

        assert_eq!(bus.read(KBSR), KBSR_READY);
        assert_eq!(bus.read(KBDR), u16::from(b'k'));
    }

    #[test]
    fn test_keyboard_poll_without_key() {
        let mut bus = Bus::new(Box::new(BufferConsole::new()));
        bus.memory_mut().set(KBDR, 0x41);

        assert_eq!(bus.read(KBSR), 0);
        assert_eq!(bus.memory().get(KBDR), 0);
    }

    #[test]
    fn test_kbsr_ready_bit_is_sticky() {
        let mut bus = Bus::new(Box::new(BufferConsole::with_input("a")));
        bus.read(KBSR);

        // Second poll finds nothing: data cleared, status left alone.
        assert_eq!(bus.read(KBSR), KBSR_READY);
        assert_eq!(bus.memory().get(KBDR), 0);
    }

    #[test]
    fn test_kbdr_read_has_no_side_effect() {
        let mut bus = Bus::new(Box::new(BufferConsole::with_input("z")));
        assert_eq!(bus.read(KBDR), 0);
        // The key is still pending for the next KBSR poll.
        assert_eq!(bus.read(KBSR), KBSR_READY);
        assert_eq!(bus.read(KBDR), u16::from(b'z'));
    }

    #[test]
    fn test_kick_dispatches_before_write_returns() {
        let mut bus = Bus::new(Box::new(BufferConsole::new()));
        bus.attach_virtio(VirtioBlk::new());

        bus.write(INTERRUPT_VIRTIO, 0x0001);

        assert_eq!(
            bus.last_dispatch(),
            Some(DispatchOutcome::Handled(HandlerOutcome::Serviced))
        );
        assert_eq!(bus.memory().get(INTERRUPT_VIRTIO), REPLAY);
    }

    #[test]
    fn test_plain_write_outside_window() {
        let mut bus = Bus::new(Box::new(BufferConsole::new()));
        bus.attach_virtio(VirtioBlk::new());

        bus.write(0x3000, 0x0001);
        bus.write(0x0200, 0x0001);
        assert_eq!(bus.last_dispatch(), None);
        assert_eq!(bus.interrupts().dispatched(), 0);
    }

    #[test]
    fn test_unclaimed_vector_in_window() {
        let mut bus = Bus::new(Box::new(BufferConsole::new()));
        bus.attach_virtio(VirtioBlk::new());

        bus.write(0x0150, 0x0001);
        assert_eq!(bus.last_dispatch(), Some(DispatchOutcome::Unclaimed));
        assert_eq!(bus.memory().get(0x0150), 0x0001);
    }
}
