// Gravel - a stack bytecode runtime

pub mod bytecode;
pub mod vm;
pub mod runtime;

pub use bytecode::{BytecodeModule, Constant, Instruction, OpCode};
pub use vm::{ExecutionContext, Value, VM};
pub use runtime::{execute, Runtime, RuntimeConfig, RuntimeError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
