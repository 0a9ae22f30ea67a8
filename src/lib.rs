//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and composable so they can be evolved independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge, resolves names against the
//!   `env::Environment` and returns the `ast::Program`.
//! - `sema` assigns every expression its `ty::Type` and lays out frames.
//! - `codegen` lowers the checked program into x86-64 Intel-syntax assembly.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod ast;
pub mod codegen;
pub mod env;
pub mod error;
pub mod parser;
pub mod sema;
pub mod tokenizer;
pub mod ty;

use log::debug;

pub use codegen::Assembly;
pub use error::{CompileError, CompileResult, ErrorKind};

/// Run every stage over `source` and return the emitted program.
pub fn compile(source: &str) -> CompileResult<Assembly> {
  let tokens = tokenizer::tokenize(source)?;
  let (mut program, mut env) = parser::parse(tokens, source)?;
  sema::check(&mut program, &mut env)?;
  let asm = codegen::generate(&program, &env)?;
  debug!(
    "compiled {} functions, {} string literals, {} globals",
    program.functions().count(),
    asm.string_literals.len(),
    asm.globals.len()
  );
  Ok(asm)
}

/// Compile a source string into the assembly text handed to the assembler.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  compile(source).map(|asm| asm.to_string())
}
