use std::fmt;
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;
use crate::bytecode::OpCode;

/// Failure to decode an instruction from raw code bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("Truncated operand for {opcode:?} at offset {offset}")]
    TruncatedOperand { opcode: OpCode, offset: usize },

    #[error("Offset {offset} is past the end of the code")]
    OutOfBounds { offset: usize },
}

/// Represents a single bytecode instruction with its operand
///
/// `operand` is zero for opcodes without one. `CallBuiltin` only uses the
/// low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: u16,
}

impl Instruction {
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: 0,
        }
    }

    pub fn with_operand(mut self, operand: u16) -> Self {
        self.operand = operand;
        self
    }

    /// Number of bytes this instruction occupies in a code buffer
    pub fn encoded_len(&self) -> usize {
        1 + self.opcode.operand_width()
    }

    /// Append the encoded instruction to `buf`
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode.to_byte());
        match self.opcode.operand_width() {
            0 => {}
            1 => buf.push(self.operand as u8),
            _ => {
                let mut operand = [0u8; 2];
                LittleEndian::write_u16(&mut operand, self.operand);
                buf.extend_from_slice(&operand);
            }
        }
    }

    /// Decode the instruction starting at `offset`
    pub fn decode(code: &[u8], offset: usize) -> Result<Self, DecodeError> {
        let byte = *code.get(offset).ok_or(DecodeError::OutOfBounds { offset })?;
        let opcode = OpCode::from_byte(byte)
            .ok_or(DecodeError::UnknownOpcode { opcode: byte, offset })?;

        let start = offset + 1;
        let end = start + opcode.operand_width();
        if end > code.len() {
            return Err(DecodeError::TruncatedOperand { opcode, offset });
        }

        let operand = match opcode.operand_width() {
            0 => 0,
            1 => code[start] as u16,
            _ => LittleEndian::read_u16(&code[start..end]),
        };

        Ok(Self { opcode, operand })
    }

    /// Rewrite the operand of an already-encoded instruction in place
    pub fn patch_operand(code: &mut [u8], offset: usize, operand: u16) {
        LittleEndian::write_u16(&mut code[offset + 1..offset + 3], operand);
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode.operand_width() == 0 {
            write!(f, "{:?}", self.opcode)
        } else {
            write!(f, "{:?} {}", self.opcode, self.operand)
        }
    }
}

/// Decode a whole code buffer into `(offset, instruction)` pairs
pub fn disassemble(code: &[u8]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let instruction = Instruction::decode(code, offset)?;
        out.push((offset, instruction));
        offset += instruction.encoded_len();
    }
    Ok(out)
}
