pub mod lexer;
pub mod parser;
pub mod codegen;
pub mod linker;
pub mod project;
pub mod cli;

pub use lexer::{tokenize, Lexer, Token, TokenType};
pub use parser::{parse_source, BinaryOp, Expr, ParseError, Parser, Stmt};
pub use codegen::{compile_module, compile_program, CodeGenerator, CompileError};
pub use linker::{link, LinkError, LinkInput, LinkStats, Linker};
pub use gravel_runtime::runtime::execute;
