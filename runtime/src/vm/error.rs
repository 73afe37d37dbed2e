use std::io;
use thiserror::Error;
use crate::bytecode::{DecodeError, OpCode};

/// Error type for VM operations
#[derive(Error, Debug)]
pub enum VMError {
    #[error("Stack underflow at PC {0}")]
    StackUnderflow(usize),

    #[error("Stack overflow: depth limit {0} exceeded")]
    StackOverflow(usize),

    #[error("Invalid program counter: {0}")]
    InvalidProgramCounter(usize),

    #[error("Invalid constant index: {0}")]
    InvalidConstantIndex(u16),

    #[error("Read of uninitialized local slot: {0}")]
    UninitializedLocal(u16),

    #[error("Type error: cannot apply {op:?} to {left} and {right}")]
    TypeError { op: OpCode, left: &'static str, right: &'static str },

    #[error("Invalid opcode 0x{opcode:02X} at PC {pc}")]
    InvalidOpcode { opcode: u8, pc: usize },

    #[error("Truncated operand for {opcode:?} at PC {pc}")]
    TruncatedOperand { opcode: OpCode, pc: usize },

    #[error("Output error: {0}")]
    Output(#[from] io::Error),
}

impl From<DecodeError> for VMError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnknownOpcode { opcode, offset } => VMError::InvalidOpcode { opcode, pc: offset },
            DecodeError::TruncatedOperand { opcode, offset } => VMError::TruncatedOperand { opcode, pc: offset },
            DecodeError::OutOfBounds { offset } => VMError::InvalidProgramCounter(offset),
        }
    }
}

/// Result type for VM operations
pub type VMResult<T> = Result<T, VMError>;
