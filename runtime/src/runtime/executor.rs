use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;
use crate::bytecode::{disassemble, BytecodeModule};
use crate::vm::VM;
use crate::runtime::{RuntimeConfig, RuntimeResult};

/// The Runtime is the main entry point for running blobs on the bytecode VM
#[derive(Clone, Debug, Default)]
pub struct Runtime {
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a new runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Decode and run a blob, printing to stdout
    pub fn execute_bytes(&self, blob: &[u8]) -> RuntimeResult<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.execute_bytes_to(blob, &mut lock)
    }

    /// Decode and run a blob, printing to `out`
    pub fn execute_bytes_to<W: Write>(&self, blob: &[u8], out: &mut W) -> RuntimeResult<()> {
        let module = BytecodeModule::from_bytes(blob)?;

        if self.config.debug_mode {
            debug!(
                constants = module.constants.len(),
                code_bytes = module.code.len(),
                "Loaded module"
            );
            if let Ok(listing) = disassemble(&module.code) {
                for (offset, instruction) in listing {
                    debug!("{:04}: {}", offset, instruction);
                }
            }
        }

        let mut vm = VM::with_output(out);
        vm.set_stack_trace(self.config.stack_trace);
        vm.set_max_stack_depth(self.config.max_stack_depth);
        vm.execute(&module)?;
        vm.into_output().flush()?;
        Ok(())
    }

    /// Read a blob from disk and run it
    pub fn execute_file<P: AsRef<Path>>(&self, path: P) -> RuntimeResult<()> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Executing blob file");
        let blob = fs::read(path)?;
        self.execute_bytes(&blob)
    }
}

/// Run a blob with the default configuration
pub fn execute(blob: &[u8]) -> RuntimeResult<()> {
    Runtime::new().execute_bytes(blob)
}
