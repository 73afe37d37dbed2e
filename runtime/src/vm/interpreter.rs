use std::io::{self, Write};
use tracing::trace;
use crate::bytecode::{BytecodeModule, OpCode};
use crate::vm::{ExecutionContext, Value, VMError, VMResult};

/// Default operand stack limit
pub const DEFAULT_MAX_STACK_DEPTH: usize = 4096;

/// The Virtual Machine that executes bytecode instructions
///
/// `print` output goes to `out`, which is stdout unless a writer is supplied.
pub struct VM<W: Write = io::Stdout> {
    out: W,
    stack_trace_enabled: bool,
    max_stack_depth: usize,
}

impl VM<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for VM<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> VM<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            out,
            stack_trace_enabled: false,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
        }
    }

    /// Enable or disable stack tracing
    pub fn set_stack_trace(&mut self, enabled: bool) {
        self.stack_trace_enabled = enabled;
    }

    pub fn set_max_stack_depth(&mut self, depth: usize) {
        self.max_stack_depth = depth;
    }

    /// Give back the output writer
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run a module from offset 0 until `Halt` or the first fault
    pub fn execute(&mut self, module: &BytecodeModule) -> VMResult<()> {
        let mut context = ExecutionContext::new(module, self.max_stack_depth);
        context.set_stack_trace(self.stack_trace_enabled);
        self.run(&mut context)
    }

    /// Execute instructions in an execution context
    pub fn run(&mut self, context: &mut ExecutionContext<'_>) -> VMResult<()> {
        loop {
            let instruction = context.fetch()?;

            match instruction.opcode {
                OpCode::Halt => {
                    if self.stack_trace_enabled {
                        trace!(depth = context.stack_depth(), "halt");
                    }
                    return Ok(());
                }

                OpCode::LoadConst => {
                    let value = context.get_constant(instruction.operand)?;
                    context.push(value)?;
                }

                OpCode::StoreLocal => {
                    let value = context.pop()?;
                    context.store_local(instruction.operand, value);
                }

                OpCode::LoadLocal => {
                    let value = context.load_local(instruction.operand)?;
                    context.push(value)?;
                }

                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                    let right = context.pop()?;
                    let left = context.pop()?;
                    context.push(arithmetic(instruction.opcode, left, right)?)?;
                }

                OpCode::CallBuiltin => {
                    let args = context.pop_many(instruction.operand as usize)?;
                    self.print(&args)?;
                    context.push(Value::Nil)?;
                }

                OpCode::Pop => {
                    context.pop()?;
                }

                OpCode::Jump => {
                    context.set_pc(instruction.operand as usize);
                }

                OpCode::JumpIfFalse => {
                    let condition = context.pop()?;
                    if condition.is_falsy() {
                        context.set_pc(instruction.operand as usize);
                    }
                }
            }
        }
    }

    fn print(&mut self, args: &[Value]) -> VMResult<()> {
        let line = args
            .iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(self.out, "{}", line)?;
        Ok(())
    }
}

fn arithmetic(op: OpCode, left: Value, right: Value) -> VMResult<Value> {
    match (op, left, right) {
        (OpCode::Add, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (OpCode::Sub, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        (OpCode::Mul, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (OpCode::Div, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
        (OpCode::Add, Value::Text(a), Value::Text(b)) => Ok(Value::Text(a + &b)),
        (op, left, right) => Err(VMError::TypeError {
            op,
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}
