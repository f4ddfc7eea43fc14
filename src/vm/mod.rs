//! C6: the bytecode interpreter (spec §6).

pub mod activation;
pub mod interpreter;
pub mod unwind;

pub use interpreter::{ExecutionResult, Vm};
