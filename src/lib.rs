//! weft - a template-language compiler and runtime.
//!
//! Templates embed an expression/block syntax in `{ ... }` tags: computed
//! values with filters, conditionals, loops, inheritance with overridable
//! blocks, and user-defined functions. Sources compile once into immutable
//! artifacts that render against a variable scope.
//!
//! This crate re-exports the public surface of the workspace; the
//! [`Engine`] in [`weft_session`] is the main entry point.
//!
//! ```
//! use weft::{Engine, InMemoryLoader, Value};
//!
//! let loader = InMemoryLoader::new()
//!     .with("hello.tpl", "Hello {$name|upper}!");
//! let engine = Engine::new(loader);
//!
//! let out = engine
//!     .render("hello.tpl", [("name".to_string(), Value::from("joe"))])
//!     .unwrap();
//! assert_eq!(out, "Hello JOE!");
//! ```

pub use weft_core::{
    CompileError, Error, Reflect, RuntimeError, Template, Token, TokenizeError, Value,
};
pub use weft_lang::{
    Block, Compiler, Function, HostFunctions, Renderer, TemplateContext, TemplateEnv,
};
pub use weft_session::{Engine, EngineConfig, Fingerprint, TemplateCache};
pub use weft_source::{DirLoader, InMemoryLoader, ResourceLoader, SourceError};
pub use weft_stdlib::{
    register_standard, register_standard_blocks, register_standard_functions,
    register_standard_operators,
};
