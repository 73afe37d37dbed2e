mod instruction;
mod opcode;
pub mod codec;

pub use instruction::{disassemble, DecodeError, Instruction};
pub use opcode::OpCode;
pub use codec::CodecError;

/// Represents a constant value in the bytecode
///
/// `Integer` only exists before serialization; a decoded pool holds `Float`
/// for every number.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Integer(i64),
    Float(f64),
    String(String),
}

/// Represents a bytecode module: one code buffer and its constant pool
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BytecodeModule {
    pub code: Vec<u8>,
    pub constants: Vec<Constant>,
}

impl BytecodeModule {
    pub fn new(code: Vec<u8>, constants: Vec<Constant>) -> Self {
        Self { code, constants }
    }

    /// Decode a blob
    pub fn from_bytes(blob: &[u8]) -> Result<Self, CodecError> {
        codec::decode(blob)
    }

    /// Encode into a blob
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(&self.code, &self.constants)
    }
}
