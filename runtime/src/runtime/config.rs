//! Runtime configuration options

use crate::vm::DEFAULT_MAX_STACK_DEPTH;

/// Configuration options for the Gravel runtime
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub debug_mode: bool,
    pub stack_trace: bool,
    pub max_stack_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            stack_trace: false,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug mode
    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    /// Enable or disable stack trace
    pub fn with_stack_trace(mut self, stack_trace: bool) -> Self {
        self.stack_trace = stack_trace;
        self
    }

    /// Set the operand stack limit
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }
}
