use crate::parser::{parse_source, BinaryOp, Expr, ParseError, Stmt};
use gravel_runtime::bytecode::{BytecodeModule, CodecError, Constant, Instruction, OpCode};
use std::collections::HashMap;
use thiserror::Error;

/// The one host function callable from source
pub const PRINT_BUILTIN: &str = "print";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Too many constants: a module holds at most 65536")]
    TooManyConstants,

    #[error("Too many local slots: a module holds at most 65536")]
    TooManySlots,

    #[error("Too many arguments in call to '{callee}': {count}, at most 255")]
    TooManyArguments { callee: String, count: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Code generator for turning a statement list into one bytecode module
///
/// Emits straight into a byte buffer; there is no intermediate IR.
#[derive(Default)]
pub struct CodeGenerator {
    code: Vec<u8>,
    constants: Vec<Constant>,
    slots: HashMap<String, u16>,
    next_slot: u32,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a module from a parsed program, terminated by one `Halt`
    pub fn generate(mut self, program: &[Stmt]) -> Result<BytecodeModule, CompileError> {
        for statement in program {
            self.generate_statement(statement)?;
        }
        self.emit(OpCode::Halt);
        Ok(BytecodeModule::new(self.code, self.constants))
    }

    fn generate_statement(&mut self, statement: &Stmt) -> Result<(), CompileError> {
        match statement {
            Stmt::Let { name, value } => {
                // The name is bound after its value, so `let x = x + 1` reads the previous `x`
                self.generate_expression(value)?;
                let slot = self.allocate_slot()?;
                self.slots.insert(name.clone(), slot);
                self.emit_with(OpCode::StoreLocal, slot);
            }
            Stmt::Expression(expr) => {
                self.generate_expression(expr)?;
                self.emit(OpCode::Pop);
            }
        }
        Ok(())
    }

    fn generate_expression(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Number(n) => {
                let index = self.add_constant(Constant::Integer(*n))?;
                self.emit_with(OpCode::LoadConst, index);
            }
            Expr::String(s) => {
                let index = self.add_constant(Constant::String(s.clone()))?;
                self.emit_with(OpCode::LoadConst, index);
            }
            Expr::Identifier(name) => {
                let slot = *self
                    .slots
                    .get(name)
                    .ok_or_else(|| CompileError::UnknownIdentifier(name.clone()))?;
                self.emit_with(OpCode::LoadLocal, slot);
            }
            Expr::Binary { left, operator, right } => {
                self.generate_expression(left)?;
                self.generate_expression(right)?;
                self.emit(match operator {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Subtract => OpCode::Sub,
                    BinaryOp::Multiply => OpCode::Mul,
                    BinaryOp::Divide => OpCode::Div,
                });
            }
            Expr::Call { callee, arguments } => {
                for argument in arguments {
                    self.generate_expression(argument)?;
                }
                if callee != PRINT_BUILTIN {
                    return Err(CompileError::UnknownFunction(callee.clone()));
                }
                let argc = u8::try_from(arguments.len()).map_err(|_| CompileError::TooManyArguments {
                    callee: callee.clone(),
                    count: arguments.len(),
                })?;
                self.emit_with(OpCode::CallBuiltin, u16::from(argc));
            }
        }
        Ok(())
    }

    /// Intern a constant, reusing an equal one already in the pool
    fn add_constant(&mut self, constant: Constant) -> Result<u16, CompileError> {
        if let Some(index) = self.constants.iter().position(|c| *c == constant) {
            // position < len <= 65536, so it fits
            return u16::try_from(index).map_err(|_| CompileError::TooManyConstants);
        }
        let index = u16::try_from(self.constants.len()).map_err(|_| CompileError::TooManyConstants)?;
        self.constants.push(constant);
        Ok(index)
    }

    fn allocate_slot(&mut self) -> Result<u16, CompileError> {
        let slot = u16::try_from(self.next_slot).map_err(|_| CompileError::TooManySlots)?;
        self.next_slot += 1;
        Ok(slot)
    }

    fn emit(&mut self, opcode: OpCode) {
        Instruction::new(opcode).encode_into(&mut self.code);
    }

    fn emit_with(&mut self, opcode: OpCode, operand: u16) {
        Instruction::new(opcode).with_operand(operand).encode_into(&mut self.code);
    }
}

/// Compile a parsed program into a module
pub fn compile_program(program: &[Stmt]) -> Result<BytecodeModule, CompileError> {
    CodeGenerator::new().generate(program)
}

/// Lex, parse and compile one source text into a blob
pub fn compile_module(source: &str) -> Result<Vec<u8>, CompileError> {
    let program = parse_source(source)?;
    let module = compile_program(&program)?;
    Ok(module.to_bytes()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravel_runtime::bytecode::disassemble;
    use gravel_runtime::runtime::Runtime;

    fn compile(source: &str) -> BytecodeModule {
        compile_program(&parse_source(source).unwrap()).unwrap()
    }

    fn listing(module: &BytecodeModule) -> Vec<String> {
        disassemble(&module.code)
            .unwrap()
            .into_iter()
            .map(|(_, instruction)| instruction.to_string())
            .collect()
    }

    fn run(source: &str) -> String {
        let blob = compile_module(source).unwrap();
        let mut out = Vec::new();
        Runtime::new().execute_bytes_to(&blob, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_let_and_print() {
        let module = compile("let x = 1 + 2; print(x);");
        assert_eq!(
            listing(&module),
            vec![
                "LoadConst 0",
                "LoadConst 1",
                "Add",
                "StoreLocal 0",
                "LoadLocal 0",
                "CallBuiltin 1",
                "Pop",
                "Halt",
            ]
        );
        assert_eq!(module.constants, vec![Constant::Integer(1), Constant::Integer(2)]);
    }

    #[test]
    fn test_constants_are_deduplicated() {
        let module = compile("print(2 * 2); print(\"a\"); print(\"a\" + \"b\")");
        assert_eq!(
            module.constants,
            vec![
                Constant::Integer(2),
                Constant::String("a".to_string()),
                Constant::String("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_each_let_gets_a_new_slot() {
        let module = compile("let x = 1; let x = x + 1; print(x)");
        assert_eq!(
            listing(&module),
            vec![
                "LoadConst 0",
                "StoreLocal 0",
                "LoadLocal 0",
                "LoadConst 0",
                "Add",
                "StoreLocal 1",
                "LoadLocal 1",
                "CallBuiltin 1",
                "Pop",
                "Halt",
            ]
        );
    }

    #[test]
    fn test_empty_program_is_just_halt() {
        assert_eq!(listing(&compile("")), vec!["Halt"]);
    }

    #[test]
    fn test_unknown_identifier() {
        assert!(matches!(compile_module("print(y);"), Err(CompileError::UnknownIdentifier(name)) if name == "y"));
        assert!(matches!(compile_module("let y = y;"), Err(CompileError::UnknownIdentifier(_))));
        // Bare `print` is not a value
        assert!(matches!(compile_module("print"), Err(CompileError::UnknownIdentifier(_))));
    }

    #[test]
    fn test_unknown_function() {
        assert!(matches!(compile_module("foo(1)"), Err(CompileError::UnknownFunction(name)) if name == "foo"));
    }

    #[test]
    fn test_parse_error_is_wrapped() {
        assert!(matches!(compile_module("let = 3"), Err(CompileError::Parse(_))));
    }

    #[test]
    fn test_too_many_constants() {
        let program: Vec<Stmt> = (0..=65536)
            .map(|n| Stmt::Expression(Expr::Number(n)))
            .collect();
        assert!(matches!(compile_program(&program), Err(CompileError::TooManyConstants)));

        let program: Vec<Stmt> = (0..65536)
            .map(|n| Stmt::Expression(Expr::Number(n)))
            .collect();
        assert_eq!(compile_program(&program).unwrap().constants.len(), 65536);
    }

    #[test]
    fn test_too_many_arguments() {
        let call = Expr::Call {
            callee: PRINT_BUILTIN.to_string(),
            arguments: vec![Expr::Number(1); 256],
        };
        assert!(matches!(
            compile_program(&[Stmt::Expression(call)]),
            Err(CompileError::TooManyArguments { count: 256, .. })
        ));
    }

    #[test]
    fn test_end_to_end_output() {
        assert_eq!(run("let x = 1 + 2; print(x);"), "3\n");
        assert_eq!(run("print(\"a\" + \"b\");"), "ab\n");
        assert_eq!(run("print(1 / 0);"), "inf\n");
        assert_eq!(run("print(7 / 2) print(2 - 5 * 2)"), "3.5\n-8\n");
        assert_eq!(run("print()"), "\n");
        assert_eq!(run("print(print(1))"), "1\nnil\n");
    }
}
