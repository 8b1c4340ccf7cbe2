//! LC-3 interpreter.
//!
//! # Architecture
//!
//! - [`decode`]: word to [`Instruction`], sign extension
//! - [`execute`]: execution units (ALU, memory, control, trap)
//! - [`state`]: register file, PC, condition code, run state
//! - [`core`]: the fetch/decode/execute step ([`Cpu`])
//! - [`engine`]: CPU plus bus and devices ([`Monitor`])
//!
//! # Example
//!
//! ```
//! use lc3_vmm::device::BufferConsole;
//! use lc3_vmm::interpreter::{Monitor, RunState};
//!
//! let mut vm = Monitor::new(Box::new(BufferConsole::new()));
//! vm.load_words(0x3000, &[0x1025, 0x103E, 0xF025]);
//!
//! assert_eq!(vm.run().unwrap(), RunState::Halted);
//! assert_eq!(vm.registers().get(0), 3);
//! ```

pub mod traits;
pub mod decode;
pub mod state;
pub mod execute;
pub mod core;
pub mod engine;

pub use traits::{CondFlag, ExecuteResult, VmError};
pub use decode::{sign_extend, Instruction, Opcode};
pub use state::{Registers, RunState};
pub use execute::{AluUnit, ControlUnit, Executor, MemoryUnit, TrapUnit, TrapVector};
pub use self::core::{Cpu, Fault, StepResult};
pub use engine::Monitor;
