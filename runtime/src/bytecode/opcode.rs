/// Opcodes for the VM
///
/// This table is the only place operand widths are defined. The compiler,
/// the interpreter, the linker and the disassembler all decode through it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // Control operations
    Halt = 0x00,        // End execution

    // Constants and locals
    LoadConst = 0x01,   // Push constant pool entry (u16 index)
    StoreLocal = 0x02,  // Pop into a slot (u16 slot)
    LoadLocal = 0x03,   // Push a slot's value (u16 slot)

    // Arithmetic operations
    Add = 0x04,         // Add or concatenate top two values
    Sub = 0x05,         // Subtract top value from second top value
    Mul = 0x06,         // Multiply top two values
    Div = 0x07,         // Divide second top value by top value

    // Builtins
    CallBuiltin = 0x08, // Call the print builtin (u8 argc)

    // Stack manipulation
    Pop = 0x09,         // Pop top value from stack

    // Control flow
    Jump = 0x0A,        // Jump to absolute address (u16)
    JumpIfFalse = 0x0B, // Pop, jump if falsy (u16)
}

const HALT: u8 = OpCode::Halt as u8;

const LOAD_CONST: u8 = OpCode::LoadConst as u8;
const STORE_LOCAL: u8 = OpCode::StoreLocal as u8;
const LOAD_LOCAL: u8 = OpCode::LoadLocal as u8;

const ADD: u8 = OpCode::Add as u8;
const SUB: u8 = OpCode::Sub as u8;
const MUL: u8 = OpCode::Mul as u8;
const DIV: u8 = OpCode::Div as u8;

const CALL_BUILTIN: u8 = OpCode::CallBuiltin as u8;
const POP: u8 = OpCode::Pop as u8;

const JUMP: u8 = OpCode::Jump as u8;
const JUMP_IF_FALSE: u8 = OpCode::JumpIfFalse as u8;

impl OpCode {
    /// Every opcode in byte order.
    pub const ALL: [OpCode; 12] = [
        OpCode::Halt,
        OpCode::LoadConst,
        OpCode::StoreLocal,
        OpCode::LoadLocal,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::CallBuiltin,
        OpCode::Pop,
        OpCode::Jump,
        OpCode::JumpIfFalse,
    ];

    /// Convert a byte to an opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            HALT => Some(OpCode::Halt),

            LOAD_CONST => Some(OpCode::LoadConst),
            STORE_LOCAL => Some(OpCode::StoreLocal),
            LOAD_LOCAL => Some(OpCode::LoadLocal),

            ADD => Some(OpCode::Add),
            SUB => Some(OpCode::Sub),
            MUL => Some(OpCode::Mul),
            DIV => Some(OpCode::Div),

            CALL_BUILTIN => Some(OpCode::CallBuiltin),
            POP => Some(OpCode::Pop),

            JUMP => Some(OpCode::Jump),
            JUMP_IF_FALSE => Some(OpCode::JumpIfFalse),

            _ => None,
        }
    }

    /// Convert an opcode to a byte
    pub fn to_byte(&self) -> u8 {
        *self as u8
    }

    /// Width in bytes of the inline operand that follows the opcode byte
    pub fn operand_width(&self) -> usize {
        match self {
            OpCode::LoadConst |
            OpCode::StoreLocal | OpCode::LoadLocal |
            OpCode::Jump | OpCode::JumpIfFalse => 2,

            OpCode::CallBuiltin => 1,

            OpCode::Halt |
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div |
            OpCode::Pop => 0,
        }
    }

    /// Operand addresses an instruction (must be shifted when code moves)
    pub fn is_jump(&self) -> bool {
        matches!(self, OpCode::Jump | OpCode::JumpIfFalse)
    }

    /// Operand addresses a local slot
    pub fn is_slot_access(&self) -> bool {
        matches!(self, OpCode::StoreLocal | OpCode::LoadLocal)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::from_byte(byte).ok_or(byte)
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        opcode.to_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_byte_values() {
        assert_eq!(OpCode::Halt.to_byte(), 0x00);
        assert_eq!(OpCode::LoadConst.to_byte(), 0x01);
        assert_eq!(OpCode::StoreLocal.to_byte(), 0x02);
        assert_eq!(OpCode::LoadLocal.to_byte(), 0x03);
        assert_eq!(OpCode::Add.to_byte(), 0x04);
        assert_eq!(OpCode::Div.to_byte(), 0x07);
        assert_eq!(OpCode::CallBuiltin.to_byte(), 0x08);
        assert_eq!(OpCode::Pop.to_byte(), 0x09);
        assert_eq!(OpCode::Jump.to_byte(), 0x0A);
        assert_eq!(OpCode::JumpIfFalse.to_byte(), 0x0B);
    }

    #[test]
    fn test_all_is_in_byte_order_and_round_trips() {
        for (i, opcode) in OpCode::ALL.iter().enumerate() {
            assert_eq!(opcode.to_byte() as usize, i);
            assert_eq!(OpCode::from_byte(opcode.to_byte()), Some(*opcode));
        }
    }

    #[test]
    fn test_unknown_bytes() {
        assert_eq!(OpCode::from_byte(0x0C), None);
        assert_eq!(OpCode::from_byte(0xFF), None);
        assert_eq!(OpCode::try_from(0x42u8), Err(0x42));
    }

    #[test]
    fn test_operand_widths() {
        assert_eq!(OpCode::Halt.operand_width(), 0);
        assert_eq!(OpCode::Add.operand_width(), 0);
        assert_eq!(OpCode::Pop.operand_width(), 0);
        assert_eq!(OpCode::CallBuiltin.operand_width(), 1);
        assert_eq!(OpCode::LoadConst.operand_width(), 2);
        assert_eq!(OpCode::StoreLocal.operand_width(), 2);
        assert_eq!(OpCode::LoadLocal.operand_width(), 2);
        assert_eq!(OpCode::Jump.operand_width(), 2);
        assert_eq!(OpCode::JumpIfFalse.operand_width(), 2);
    }

    #[test]
    fn test_relocation_classes() {
        assert!(OpCode::Jump.is_jump());
        assert!(OpCode::JumpIfFalse.is_jump());
        assert!(!OpCode::LoadConst.is_jump());
        assert!(OpCode::StoreLocal.is_slot_access());
        assert!(OpCode::LoadLocal.is_slot_access());
        assert!(!OpCode::LoadConst.is_slot_access());
    }

    #[test]
    fn test_into_u8_trait() {
        let byte: u8 = OpCode::CallBuiltin.into();
        assert_eq!(byte, 0x08);
    }
}
