pub mod ast;
pub mod desugar;
pub mod dump;
pub mod lexer;
pub mod parser;

pub use lexer::{LexError, Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};

use std::path::Path;
use std::time::Instant;

use thiserror::Error;
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::interp::{Interpreter, RuntimeError};
use ast::Program;

/// Errors from the front end.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::Lex(err) => err.span(),
            CompileError::Parse(err) => err.span(),
        }
    }
}

/// Any failure of the full pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl Error {
    fn span(&self) -> Option<Span> {
        match self {
            Error::Io { .. } => None,
            Error::Compile(err) => Some(err.span()),
            Error::Runtime(err) => Some(err.span()),
        }
    }

    /// Format for the terminal, pointing at the offending location.
    pub fn render(&self, filename: &str) -> String {
        match self.span() {
            Some(span) => format!(
                "error: {}\n  --> {}:{}:{}",
                self, filename, span.line, span.column
            ),
            None => format!("error: {}", self),
        }
    }
}

/// Lex and parse without desugaring. Literal nodes are still present.
pub fn parse_source(source: &str) -> Result<Program, CompileError> {
    let start = Instant::now();
    let tokens = lexer::tokenize(source)?;
    debug!(tokens = tokens.len(), elapsed = ?start.elapsed(), "lexed");

    let start = Instant::now();
    let program = parser::parse_tokens(tokens)?;
    debug!(statements = program.statements.len(), elapsed = ?start.elapsed(), "parsed");
    Ok(program)
}

/// Lex, parse and desugar. The result contains no literal nodes.
pub fn compile_source(source: &str) -> Result<Program, CompileError> {
    let program = parse_source(source)?;
    let start = Instant::now();
    let program = desugar::desugar_program(program);
    debug!(elapsed = ?start.elapsed(), "desugared");
    debug_assert!(!desugar::contains_literal(&program));
    Ok(program)
}

/// Desugar and print back as plain source.
pub fn desugar_source(source: &str) -> Result<String, CompileError> {
    let program = compile_source(source)?;
    Ok(dump::program_to_source(&program))
}

/// Compile and run the given source code.
pub fn run_source(source: &str, config: &RuntimeConfig) -> Result<(), Error> {
    let program = compile_source(source)?;
    let mut interp = Interpreter::with_config(config.clone());
    let start = Instant::now();
    interp.run(&program)?;
    debug!(elapsed = ?start.elapsed(), "executed");
    Ok(())
}

fn read_source(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Compile and run a file.
pub fn run_file(path: &Path, config: &RuntimeConfig) -> Result<(), Error> {
    debug!(path = %path.display(), "running");
    let source = read_source(path)?;
    run_source(&source, config)
}

/// Lex and parse a file without desugaring or running it.
pub fn check_file(path: &Path) -> Result<(), Error> {
    let source = read_source(path)?;
    parse_source(&source)?;
    Ok(())
}

/// Desugar a file and return the printed result.
pub fn desugar_file(path: &Path) -> Result<String, Error> {
    let source = read_source(path)?;
    Ok(desugar_source(&source)?)
}

/// Tokenize a file.
pub fn tokenize_file(path: &Path) -> Result<Vec<Token>, Error> {
    let source = read_source(path)?;
    Ok(lexer::tokenize(&source).map_err(CompileError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_removes_literals() {
        let program = compile_source("let m = Map#{1: Array#[2]};").unwrap();
        assert!(!desugar::contains_literal(&program));
    }

    #[test]
    fn test_detached_hash_is_a_comment() {
        let err = compile_source("let x = A# [1];").unwrap_err();
        // `A#` followed by a space is a comment; the statement is unterminated.
        assert!(matches!(err, CompileError::Parse(_)));

        let err = Error::from(compile_source("let x = A#(1);").unwrap_err());
        let rendered = err.render("main.hl");
        assert!(rendered.starts_with("error: "));
        assert!(rendered.contains("--> main.hl:1:"));
    }

    #[test]
    fn test_runtime_error_render() {
        let err = run_source("print(1 / 0);", &RuntimeConfig::default()).unwrap_err();
        assert_eq!(err.render("t.hl"), "error: runtime error: division by zero\n  --> t.hl:1:7");
    }
}
