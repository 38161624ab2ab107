//! The template compiler.
//!
//! `compiler` drives tag dispatch and block body extraction, `expr`
//! compiles expression text into IR, and `output` owns the instruction
//! buffer and the inheritance override resolution.

mod compiler;
mod expr;
mod output;

pub use compiler::Compiler;
pub use output::{OutputBuffer, OutputDisallowed};
