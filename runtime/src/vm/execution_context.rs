use rustc_hash::FxHashMap;
use tracing::trace;
use crate::bytecode::{BytecodeModule, Instruction};
use crate::vm::{Value, VMError, VMResult};

/// The execution context for one run of a module
///
/// Owns the operand stack, the slot table and the program counter. Nothing
/// here is shared between runs.
pub struct ExecutionContext<'m> {
    module: &'m BytecodeModule,
    pc: usize,
    stack: Vec<Value>,
    locals: FxHashMap<u16, Value>,
    max_stack_depth: usize,
    stack_trace_enabled: bool,
}

impl<'m> ExecutionContext<'m> {
    pub fn new(module: &'m BytecodeModule, max_stack_depth: usize) -> Self {
        Self {
            module,
            pc: 0,
            stack: Vec::with_capacity(64),
            locals: FxHashMap::default(),
            max_stack_depth,
            stack_trace_enabled: false,
        }
    }

    /// Get the loaded bytecode module
    pub fn module(&self) -> &BytecodeModule {
        self.module
    }

    /// Get the current program counter
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Set the program counter
    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    /// Decode the instruction at the program counter and advance past it
    pub fn fetch(&mut self) -> VMResult<Instruction> {
        if self.pc >= self.module.code.len() {
            return Err(VMError::InvalidProgramCounter(self.pc));
        }
        let instruction = Instruction::decode(&self.module.code, self.pc)?;
        if self.stack_trace_enabled {
            trace!(pc = self.pc, %instruction, depth = self.stack.len(), "execute");
        }
        self.pc += instruction.encoded_len();
        Ok(instruction)
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: Value) -> VMResult<()> {
        if self.stack.len() >= self.max_stack_depth {
            return Err(VMError::StackOverflow(self.max_stack_depth));
        }
        if self.stack_trace_enabled {
            trace!("PUSH: {}", value);
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> VMResult<Value> {
        match self.stack.pop() {
            Some(value) => {
                if self.stack_trace_enabled {
                    trace!("POP: {}", value);
                }
                Ok(value)
            }
            None => Err(VMError::StackUnderflow(self.pc)),
        }
    }

    /// Pop `count` values, returned in the order they were pushed
    pub fn pop_many(&mut self, count: usize) -> VMResult<Vec<Value>> {
        if self.stack.len() < count {
            return Err(VMError::StackUnderflow(self.pc));
        }
        let split = self.stack.len() - count;
        Ok(self.stack.split_off(split))
    }

    /// Store a value in a local slot
    pub fn store_local(&mut self, slot: u16, value: Value) {
        if self.stack_trace_enabled {
            trace!("STORE LOCAL {}: {}", slot, value);
        }
        self.locals.insert(slot, value);
    }

    /// Load a value from a local slot
    pub fn load_local(&self, slot: u16) -> VMResult<Value> {
        self.locals
            .get(&slot)
            .cloned()
            .ok_or(VMError::UninitializedLocal(slot))
    }

    /// Get the constant at the specified index
    pub fn get_constant(&self, index: u16) -> VMResult<Value> {
        self.module
            .constants
            .get(index as usize)
            .map(Value::from)
            .ok_or(VMError::InvalidConstantIndex(index))
    }

    /// Enable or disable stack trace logging
    pub fn set_stack_trace(&mut self, enabled: bool) {
        self.stack_trace_enabled = enabled;
    }

    /// Get the current stack depth
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Snapshot of the slot table, sorted by slot
    pub fn locals(&self) -> Vec<(u16, Value)> {
        let mut locals: Vec<(u16, Value)> = self.locals.iter().map(|(k, v)| (*k, v.clone())).collect();
        locals.sort_by_key(|(slot, _)| *slot);
        locals
    }
}
