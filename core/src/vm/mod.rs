//! Stack bytecode VM.
//!
//! This module holds the instruction set, the generator that produces it, the
//! execution stacks and the `Environment` that runs compiled functions.

mod builtins;
mod bytecode;
mod call;
mod compiler;
mod config;
mod context;
mod exec;
mod stacks;
mod symbols;

pub use builtins::{expect_arity, expect_min_arity};
pub use bytecode::{Instr, ReturnKind, disassemble};
pub use compiler::Generator;
pub use config::VmConfig;
pub use context::{Environment, HALT, Hook};
pub use stacks::Address;
pub use symbols::SymbolTable;

#[cfg(test)]
mod vm_test;
