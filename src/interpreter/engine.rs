//! The monitor: a CPU wired to a bus with the standard devices.
//!
//! ```text
//!           +-----------------------------+
//!  image -> | Memory  0x0000 ..= 0xFFFF   |
//!           |   0x0100  virtio doorbell --+--> VirtioBlk
//!           |   0x7FFF  vring + buffers   |
//!           |   0xFE00  KBSR / KBDR     <-+--- Console
//!           +-------------^---------------+
//!                         | Bus::read / Bus::write
//!                       Cpu::step
//! ```
//!
//! [`Monitor::run`] steps until HALT or an abort. Host-side access to the
//! block device goes through [`Monitor::driver`] and [`Monitor::bus_mut`].

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use crate::config::Config;
use crate::device::bus::Bus;
use crate::device::console::Console;
use crate::device::memory::Memory;
use crate::device::virtio::{BlockDriver, VirtioBlk};
use crate::loader::{self, LoadError, LoadedImage};

use super::core::{Cpu, StepResult};
use super::state::{Registers, RunState};
use super::traits::VmError;

/// Virtual machine monitor.
pub struct Monitor {
    cpu: Cpu,
    bus: Bus,
    pc_start: u16,
    driver: BlockDriver,
}

impl Monitor {
    /// Monitor with default settings.
    pub fn new(console: Box<dyn Console>) -> Self {
        Self::with_config(&Config::default(), console)
    }

    /// Monitor with the block device attached and the ring laid out.
    pub fn with_config(config: &Config, console: Box<dyn Console>) -> Self {
        let mut bus = Bus::new(console);
        bus.attach_virtio(VirtioBlk::new());

        let pc_start = config.pc_start();
        let mut cpu = Cpu::new(pc_start);
        cpu.set_trace(config.trace());

        Self {
            cpu,
            bus,
            pc_start,
            driver: BlockDriver::new(config.replay_poll_limit()),
        }
    }

    /// Load a program image file.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<LoadedImage, LoadError> {
        loader::load_file(path, self.bus.memory_mut())
    }

    /// Load an image already in memory.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<LoadedImage, LoadError> {
        loader::load_bytes(bytes, self.bus.memory_mut())
    }

    /// Place `words` at `origin`; returns the number stored.
    pub fn load_words(&mut self, origin: u16, words: &[u16]) -> usize {
        self.bus.memory_mut().load_at(origin, words)
    }

    /// Restart the CPU at the configured PC. Memory is kept.
    pub fn reset(&mut self) {
        self.cpu.reset(self.pc_start);
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<StepResult, VmError> {
        self.cpu.step(&mut self.bus)
    }

    /// Run until the program halts or aborts.
    pub fn run(&mut self) -> Result<RunState, VmError> {
        log::info!("running from 0x{:04X}", self.cpu.registers().pc);
        loop {
            if let StepResult::Stopped(state) = self.step()? {
                return Ok(state);
            }
        }
    }

    /// Run at most `max_steps` instructions.
    ///
    /// Returns `Running` if the budget ran out first.
    pub fn run_for(&mut self, max_steps: u64) -> Result<RunState, VmError> {
        for _ in 0..max_steps {
            if let StepResult::Stopped(state) = self.step()? {
                return Ok(state);
            }
        }
        Ok(self.cpu.state())
    }

    /// Write the whole address space to `path` in image format.
    pub fn sync_memory(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.bus.memory().write_image(BufWriter::new(file))?;
        log::info!("memory synced to {}", path.display());
        Ok(())
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn registers(&self) -> &Registers {
        self.cpu.registers()
    }

    pub fn state(&self) -> RunState {
        self.cpu.state()
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn memory(&self) -> &Memory {
        self.bus.memory()
    }

    /// Host-side block driver configured for this monitor.
    pub fn driver(&self) -> BlockDriver {
        self.driver
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("cpu", &self.cpu)
            .field("pc_start", &format_args!("0x{:04X}", self.pc_start))
            .finish_non_exhaustive()
    }
}
