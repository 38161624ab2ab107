//! Core types for the weft template engine.
//!
//! This crate provides foundational types used throughout the weft compiler
//! and runtime:
//! - Tokens produced by the tokenizer framework
//! - Runtime values and the reflection trait for host objects
//! - The compiled instruction tree and expression IR
//! - The error taxonomy

pub mod error;
pub mod ir;
pub mod token;
pub mod value;

// Re-export commonly used types at crate root
pub use error::{CompileError, Error, RuntimeError, TokenizeError};
pub use ir::{
    AssignOp, Body, Expr, FilterCall, Instr, OverrideMode, RegionOverride, Template,
    apply_override, substitute_parent,
};
pub use token::Token;
pub use value::{Reflect, Value};
