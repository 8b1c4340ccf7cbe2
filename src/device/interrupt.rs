//! Interrupt dispatch for the interrupt vector window.
//!
//! Interrupts here are not asynchronous. A store into `0x0100..=0x01FF`
//! calls [`InterruptDispatcher::dispatch`] from inside the bus write, so
//! the device handler (and any replay) finishes before the storing
//! instruction retires.
//!
//! ```text
//! CPU store ──► Bus::write ──► Memory::set
//!                    │
//!                    └─(addr in window)─► dispatch(entry)
//!                                            │
//!                                            ├─► handler.handle(flags)
//!                                            └─► replay (raw set of 0x0002)
//! ```

use super::memory::Memory;

/// Completion code the dispatcher stores after a serviced kick.
pub const REPLAY: u16 = 0x0002;

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The doorbell was rung and the device processed the ring.
    /// The dispatcher signals completion by replaying into the entry word.
    Serviced,
    /// The event carried no doorbell; nothing to signal.
    Ignored,
}

/// Result of a single dispatch, for callers that want to observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No handler is registered at this entry.
    Unclaimed,
    /// A handler ran and reported this outcome.
    Handled(HandlerOutcome),
}

/// A device reachable through an interrupt vector entry.
pub trait InterruptHandler {
    /// Entry address in the interrupt vector window this handler owns.
    fn vector(&self) -> u16;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Handle an event. `flags` is the word just stored at the entry.
    fn handle(&mut self, mem: &mut Memory, flags: u16) -> HandlerOutcome;
}

/// Routes interrupt-window writes to registered handlers.
#[derive(Default)]
pub struct InterruptDispatcher {
    handlers: Vec<Box<dyn InterruptHandler>>,
    dispatched: u64,
}

impl InterruptDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. A later registration for the same vector
    /// replaces the earlier one.
    pub fn register(&mut self, handler: Box<dyn InterruptHandler>) {
        let vector = handler.vector();
        self.handlers.retain(|h| h.vector() != vector);
        log::debug!("Registered {} at interrupt entry 0x{:04X}", handler.name(), vector);
        self.handlers.push(handler);
    }

    /// Whether any handler owns `entry`.
    pub fn is_claimed(&self, entry: u16) -> bool {
        self.handlers.iter().any(|h| h.vector() == entry)
    }

    /// Number of events routed to a handler so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Deliver the event stored at `entry`.
    pub fn dispatch(&mut self, mem: &mut Memory, entry: u16) -> DispatchOutcome {
        log::debug!("Interrupt entry 0x{:04X}", entry);

        let Some(handler) = self.handlers.iter_mut().find(|h| h.vector() == entry) else {
            return DispatchOutcome::Unclaimed;
        };

        self.dispatched += 1;
        let flags = mem.get(entry);
        let outcome = handler.handle(mem, flags);

        if outcome == HandlerOutcome::Serviced {
            // Raw set: the replay must not dispatch again.
            mem.set(entry, REPLAY);
            log::trace!("Replay 0x{:04X} -> 0x{:04X}", entry, REPLAY);
        }

        DispatchOutcome::Handled(outcome)
    }
}

impl std::fmt::Debug for InterruptDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vectors: Vec<_> = self.handlers.iter().map(|h| (h.name(), h.vector())).collect();
        f.debug_struct("InterruptDispatcher")
            .field("handlers", &vectors)
            .field("dispatched", &self.dispatched)
            .finish()
    }
}
