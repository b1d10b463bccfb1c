//! Emulator for the LS-8, a tiny 8-bit computer
//!
//! The machine has 256 bytes of memory, eight byte-wide registers (`R7` is
//! the stack pointer), a program counter and a flags register. Programs are
//! listings of binary literals, one byte per line, loaded at address 0.
//!
//! ```
//! use emulator::program::Program;
//! use emulator::vm::Vm;
//!
//! let program: Program = "10000010\n00000000\n00000101\n01000111\n00000000\n00000001\n"
//!   .parse()
//!   .unwrap();
//! let mut vm = Vm::with_output(Vec::new());
//! vm.load(&program).unwrap();
//! vm.run().unwrap();
//! assert_eq!(vm.into_output(), b"5\n");
//! ```

pub mod opcode;
pub mod program;
pub mod vm;
