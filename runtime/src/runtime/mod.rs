mod executor;
mod config;

pub use executor::{execute, Runtime};
pub use config::RuntimeConfig;

use std::io;
use thiserror::Error;

/// Errors that can occur in the runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("VM error: {0}")]
    VMError(#[from] crate::vm::VMError),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Bytecode decoding error: {0}")]
    CodecError(#[from] crate::bytecode::CodecError),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
