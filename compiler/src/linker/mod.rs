//! Merges module blobs into one program blob.
//!
//! Every module is relocated against what has been merged so far:
//! constant indices by the merged pool length, slot indices by the slots
//! already allocated, jump targets by the merged code length. A module's
//! trailing `Halt` is dropped and one `Halt` closes the linked program.
//! Modules whose content hash (SHA-256) was already seen are skipped.

use crate::codegen::{compile_module, CompileError};
use gravel_runtime::bytecode::{
    BytecodeModule, CodecError, Constant, DecodeError, Instruction, OpCode,
};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

/// Largest index a u16 operand can carry, plus one
const OPERAND_RANGE: usize = u16::MAX as usize + 1;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Failed to compile module: {0}")]
    Compile(#[from] CompileError),

    #[error("Malformed module blob: {0}")]
    Codec(#[from] CodecError),

    #[error("Cannot relocate module code: {0}")]
    Decode(#[from] DecodeError),

    #[error("Constant pool overflow: {0} constants do not fit u16 indices")]
    ConstantOverflow(usize),

    #[error("Slot overflow: slot {0} does not fit a u16 operand")]
    SlotOverflow(usize),

    #[error("Jump target overflow: address {0} does not fit a u16 operand")]
    JumpOverflow(usize),
}

/// One module to link, in link order
#[derive(Debug, Clone, Copy)]
pub enum LinkInput<'a> {
    /// Source text; hashed as text, compiled only if not a duplicate
    Source(&'a str),
    /// An already compiled blob; hashed as bytes
    Blob(&'a [u8]),
}

/// Counters reported once linking finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub modules: usize,
    pub skipped: usize,
    pub constants: usize,
    pub code_len: usize,
}

/// Accumulator for one link run. Dropping it discards everything merged.
#[derive(Default)]
pub struct Linker {
    code: Vec<u8>,
    constants: Vec<Constant>,
    slot_count: usize,
    seen: HashSet<[u8; 32]>,
    stats: LinkStats,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and merge a source module unless identical text was linked before
    pub fn add_source(&mut self, source: &str) -> Result<bool, LinkError> {
        if !self.first_sighting(source.as_bytes()) {
            return Ok(false);
        }
        let blob = compile_module(source)?;
        self.merge(&blob)?;
        Ok(true)
    }

    /// Merge a compiled blob unless an identical blob was linked before
    pub fn add_blob(&mut self, blob: &[u8]) -> Result<bool, LinkError> {
        if !self.first_sighting(blob) {
            return Ok(false);
        }
        self.merge(blob)?;
        Ok(true)
    }

    pub fn add(&mut self, input: LinkInput<'_>) -> Result<bool, LinkError> {
        match input {
            LinkInput::Source(source) => self.add_source(source),
            LinkInput::Blob(blob) => self.add_blob(blob),
        }
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            constants: self.constants.len(),
            code_len: self.code.len(),
            ..self.stats
        }
    }

    /// Close the program with `Halt` and encode it
    pub fn finish(mut self) -> Result<Vec<u8>, LinkError> {
        Instruction::new(OpCode::Halt).encode_into(&mut self.code);
        let stats = self.stats();
        let blob = BytecodeModule::new(self.code, self.constants).to_bytes()?;
        info!(
            modules = stats.modules,
            skipped = stats.skipped,
            constants = stats.constants,
            code_len = stats.code_len,
            "Linked"
        );
        Ok(blob)
    }

    fn first_sighting(&mut self, content: &[u8]) -> bool {
        let digest: [u8; 32] = Sha256::digest(content).into();
        if self.seen.insert(digest) {
            true
        } else {
            debug!(hash = %hex(&digest), "Skipping duplicate module");
            self.stats.skipped += 1;
            false
        }
    }

    fn merge(&mut self, blob: &[u8]) -> Result<(), LinkError> {
        let module = BytecodeModule::from_bytes(blob)?;

        let constant_offset = self.constants.len();
        let code_offset = self.code.len();
        let slot_offset = self.slot_count;

        let merged_constants = constant_offset + module.constants.len();
        if merged_constants > OPERAND_RANGE {
            return Err(LinkError::ConstantOverflow(merged_constants));
        }

        let (code, slots_used) = relocate(module.code, constant_offset, slot_offset, code_offset)?;

        debug!(
            constants = module.constants.len(),
            code_len = code.len(),
            slots = slots_used,
            constant_offset,
            code_offset,
            slot_offset,
            "Merging module"
        );

        self.constants.extend(module.constants);
        self.code.extend_from_slice(&code);
        self.slot_count += slots_used;
        self.stats.modules += 1;
        Ok(())
    }
}

/// Rewrite one module's code for its place in the merged program.
///
/// Returns the rewritten code with any trailing `Halt` removed, and the
/// number of slots the module uses (one past its highest slot index).
fn relocate(
    mut code: Vec<u8>,
    constant_offset: usize,
    slot_offset: usize,
    code_offset: usize,
) -> Result<(Vec<u8>, usize), LinkError> {
    let mut offset = 0;
    let mut last = None;
    let mut slots_used = 0;

    while offset < code.len() {
        let instruction = Instruction::decode(&code, offset)?;
        let operand = instruction.operand as usize;

        let opcode = instruction.opcode;
        let relocated = if opcode == OpCode::LoadConst {
            Some(shift(operand, constant_offset, LinkError::ConstantOverflow)?)
        } else if opcode.is_slot_access() {
            slots_used = slots_used.max(operand + 1);
            Some(shift(operand, slot_offset, LinkError::SlotOverflow)?)
        } else if opcode.is_jump() {
            Some(shift(operand, code_offset, LinkError::JumpOverflow)?)
        } else {
            None
        };
        if let Some(operand) = relocated {
            Instruction::patch_operand(&mut code, offset, operand);
        }

        last = Some((offset, instruction.opcode));
        offset += instruction.encoded_len();
    }

    if let Some((halt_offset, OpCode::Halt)) = last {
        code.truncate(halt_offset);
    }

    Ok((code, slots_used))
}

fn shift(operand: usize, by: usize, overflow: fn(usize) -> LinkError) -> Result<u16, LinkError> {
    let shifted = operand + by;
    u16::try_from(shifted).map_err(|_| overflow(shifted))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Link an ordered module list in one go
pub fn link(inputs: &[LinkInput<'_>]) -> Result<Vec<u8>, LinkError> {
    let mut linker = Linker::new();
    for input in inputs {
        linker.add(*input)?;
    }
    linker.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravel_runtime::bytecode::disassemble;
    use gravel_runtime::runtime::{Runtime, RuntimeError};
    use gravel_runtime::vm::VMError;

    fn assemble(instructions: &[Instruction]) -> Vec<u8> {
        let mut code = Vec::new();
        for instruction in instructions {
            instruction.encode_into(&mut code);
        }
        code
    }

    fn op_with(opcode: OpCode, operand: u16) -> Instruction {
        Instruction::new(opcode).with_operand(operand)
    }

    fn listing(blob: &[u8]) -> Vec<String> {
        let module = BytecodeModule::from_bytes(blob).unwrap();
        disassemble(&module.code)
            .unwrap()
            .into_iter()
            .map(|(_, instruction)| instruction.to_string())
            .collect()
    }

    fn run(blob: &[u8]) -> Result<String, RuntimeError> {
        let mut out = Vec::new();
        Runtime::new().execute_bytes_to(blob, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_single_module_round_trips() {
        let linked = link(&[LinkInput::Source("let x = 1 + 2; print(x);")]).unwrap();
        assert_eq!(run(&linked).unwrap(), "3\n");
        assert_eq!(
            BytecodeModule::from_bytes(&linked).unwrap().code,
            BytecodeModule::from_bytes(&compile_module("let x = 1 + 2; print(x);").unwrap())
                .unwrap()
                .code
        );
    }

    #[test]
    fn test_identical_sources_are_linked_once() {
        let source = "print(\"same\" + \"text\")";
        let once = link(&[LinkInput::Source(source)]).unwrap();
        let twice = link(&[LinkInput::Source(source), LinkInput::Source(source)]).unwrap();
        assert_eq!(once, twice);

        let mut linker = Linker::new();
        assert!(linker.add_source(source).unwrap());
        assert!(!linker.add_source(source).unwrap());
        assert_eq!(linker.stats().modules, 1);
        assert_eq!(linker.stats().skipped, 1);
    }

    #[test]
    fn test_duplicate_source_is_not_compiled() {
        let mut linker = Linker::new();
        assert!(linker.add_source("print(1)").unwrap());
        // Same bytes as the first; skipped before reaching the compiler
        assert!(!linker.add_source("print(1)").unwrap());
        assert!(linker.add_source("print(undefined)").is_err());
    }

    #[test]
    fn test_identical_blobs_are_linked_once() {
        let blob = compile_module("print(5)").unwrap();
        let linked = link(&[LinkInput::Blob(&blob), LinkInput::Blob(&blob)]).unwrap();
        assert_eq!(run(&linked).unwrap(), "5\n");
    }

    #[test]
    fn test_terminators_are_stripped() {
        let linked = link(&[LinkInput::Source("print(1)"), LinkInput::Source("print(2)")]).unwrap();
        assert_eq!(run(&linked).unwrap(), "1\n2\n");

        let listing = listing(&linked);
        assert_eq!(listing.iter().filter(|line| *line == "Halt").count(), 1);
        assert_eq!(listing.last().map(String::as_str), Some("Halt"));
    }

    #[test]
    fn test_constant_indices_are_offset() {
        let linked = link(&[LinkInput::Source("print(1)"), LinkInput::Source("print(\"two\")")]).unwrap();
        assert_eq!(
            listing(&linked),
            vec!["LoadConst 0", "CallBuiltin 1", "Pop", "LoadConst 1", "CallBuiltin 1", "Pop", "Halt"]
        );
        let module = BytecodeModule::from_bytes(&linked).unwrap();
        assert_eq!(module.constants, vec![Constant::Float(1.0), Constant::String("two".to_string())]);
    }

    #[test]
    fn test_slots_are_separate_per_module() {
        let linked = link(&[
            LinkInput::Source("let x = 1; print(x)"),
            LinkInput::Source("let x = 2; print(x)"),
        ])
        .unwrap();
        assert_eq!(run(&linked).unwrap(), "1\n2\n");

        let listing = listing(&linked);
        assert!(listing.contains(&"StoreLocal 0".to_string()));
        assert!(listing.contains(&"StoreLocal 1".to_string()));
        assert!(listing.contains(&"LoadLocal 1".to_string()));
    }

    #[test]
    fn test_module_cannot_see_another_modules_slot() {
        // Reads slot 0 without writing it; after linking it points at its own slot 1.
        let reader = BytecodeModule::new(
            assemble(&[op_with(OpCode::LoadLocal, 0), op_with(OpCode::CallBuiltin, 1), Instruction::new(OpCode::Halt)]),
            vec![],
        )
        .to_bytes()
        .unwrap();
        let linked = link(&[LinkInput::Source("let x = 1"), LinkInput::Blob(&reader)]).unwrap();
        assert!(matches!(
            run(&linked),
            Err(RuntimeError::VMError(VMError::UninitializedLocal(1)))
        ));
    }

    #[test]
    fn test_jump_targets_are_offset() {
        // 0: Jump 6 | 3: LoadLocal 9 (never runs) | 6: LoadConst 0 | 9: CallBuiltin 1 | 11: Pop | 12: Halt
        let jumper = BytecodeModule::new(
            assemble(&[
                op_with(OpCode::Jump, 6),
                op_with(OpCode::LoadLocal, 9),
                op_with(OpCode::LoadConst, 0),
                op_with(OpCode::CallBuiltin, 1),
                Instruction::new(OpCode::Pop),
                Instruction::new(OpCode::Halt),
            ]),
            vec![Constant::String("jumped".to_string())],
        )
        .to_bytes()
        .unwrap();

        let first = compile_module("print(0)").unwrap();
        let first_len = BytecodeModule::from_bytes(&first).unwrap().code.len() - 1;

        let linked = link(&[LinkInput::Blob(&first), LinkInput::Blob(&jumper)]).unwrap();
        assert_eq!(run(&linked).unwrap(), "0\njumped\n");

        let listing = listing(&linked);
        assert!(listing.contains(&format!("Jump {}", 6 + first_len)));
    }

    #[test]
    fn test_empty_module_contributes_nothing() {
        let linked = link(&[LinkInput::Source(""), LinkInput::Source("print(3)")]).unwrap();
        assert_eq!(listing(&linked), vec!["LoadConst 0", "CallBuiltin 1", "Pop", "Halt"]);
    }

    #[test]
    fn test_no_modules_links_to_halt() {
        let linked = link(&[]).unwrap();
        assert_eq!(listing(&linked), vec!["Halt"]);
        assert_eq!(run(&linked).unwrap(), "");
    }

    #[test]
    fn test_unknown_opcode_aborts_link() {
        let bad = BytecodeModule::new(vec![0xEE], vec![]).to_bytes().unwrap();
        assert!(matches!(
            link(&[LinkInput::Source("print(1)"), LinkInput::Blob(&bad)]),
            Err(LinkError::Decode(DecodeError::UnknownOpcode { opcode: 0xEE, offset: 0 }))
        ));
    }

    #[test]
    fn test_truncated_blob_aborts_link() {
        let blob = compile_module("print(1)").unwrap();
        assert!(matches!(link(&[LinkInput::Blob(&blob[..3])]), Err(LinkError::Codec(_))));
    }

    #[test]
    fn test_compile_error_aborts_link() {
        assert!(matches!(
            link(&[LinkInput::Source("print(1)"), LinkInput::Source("nope(1)")]),
            Err(LinkError::Compile(CompileError::UnknownFunction(_)))
        ));
    }

    #[test]
    fn test_jump_overflow() {
        let jumper = BytecodeModule::new(assemble(&[op_with(OpCode::Jump, u16::MAX)]), vec![])
            .to_bytes()
            .unwrap();
        let first = compile_module("print(1)").unwrap();
        assert!(matches!(
            link(&[LinkInput::Blob(&first), LinkInput::Blob(&jumper)]),
            Err(LinkError::JumpOverflow(_))
        ));
    }

    #[test]
    fn test_slot_overflow() {
        let high_slot = BytecodeModule::new(
            assemble(&[op_with(OpCode::LoadLocal, u16::MAX)]),
            vec![],
        )
        .to_bytes()
        .unwrap();
        let first = compile_module("let a = 1").unwrap();
        assert!(matches!(
            link(&[LinkInput::Blob(&first), LinkInput::Blob(&high_slot)]),
            Err(LinkError::SlotOverflow(65536))
        ));
    }

    #[test]
    fn test_stats() {
        let mut linker = Linker::new();
        linker.add_source("print(1)").unwrap();
        linker.add_source("print(1)").unwrap();
        linker.add_source("print(\"x\")").unwrap();
        let stats = linker.stats();
        assert_eq!(stats.modules, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.constants, 2);
        assert_eq!(stats.code_len, 12);
        assert!(linker.finish().is_ok());
    }
}
