//! Runtime configuration types.

/// Where `print` writes its lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Write to stdout as lines are printed
    #[default]
    Stdout,
    /// Buffer lines for the embedder to collect
    Capture,
}

/// Runtime configuration for the interpreter
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Nested calls allowed before failing with a stack overflow
    pub max_call_depth: usize,
    /// Log every protocol dispatch at info level
    pub trace_protocol: bool,
    pub output: OutputMode,
}

impl RuntimeConfig {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            trace_protocol: false,
            output: OutputMode::Stdout,
        }
    }
}
