//! Hashlit - extensible collection literals
//!
//! `Ctor#[a, b]` and `Ctor#{k: v}` are rewritten into calls of
//! `Ctor[Symbol.sequenceLiteral]` and `Ctor[Symbol.mappingLiteral]` with a
//! lazy producer of the elements. This library provides the front end,
//! the desugaring pass and a small interpreter that runs the result.

pub mod compiler;
pub mod config;
pub mod interp;
pub mod package;

// Re-export commonly used types
pub use compiler::{
    CompileError, Error, check_file, compile_source, desugar_file, desugar_source, run_file,
    run_source,
};
pub use config::{OutputMode, RuntimeConfig};
pub use interp::{Interpreter, LiteralProtocol, Producer, RuntimeError, Value};
