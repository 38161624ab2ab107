//! The tokenizer framework.
//!
//! A [`Tokenizer`] scans text character by character, offering the pending
//! buffer to a list of [`Symbol`] matchers in registration order. A match
//! consumes the matched span (possibly scanning ahead for a nested close
//! delimiter) and emits tokens; no match extends the buffer by one
//! character. The same framework builds every tokenizer in the engine: the
//! syntax-tag tokenizer, string and array tokenizers, the operator
//! splitters and the small signature tokenizers.

mod presets;
mod symbol;
mod tokenizer;

pub use presets::{
    args_tokenizer, array_tokenizer, filter_tokenizer, operator_tokenizer, signature_tokenizer,
    string_literal_tokenizer, string_tokenizer, tag_tokenizer,
};
pub use symbol::{NestedSymbol, SimpleSymbol, Symbol};
pub use tokenizer::Tokenizer;
