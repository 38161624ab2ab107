//! The tokenizers the compiler is built from.
//!
//! Every tokenizer in the engine is assembled from the same symbol
//! framework; these constructors are the specific assemblies the compiler
//! uses. The string tokenizer doubles as the guard protecting close
//! delimiters and operators inside string literals.

use super::symbol::Symbol;
use super::tokenizer::Tokenizer;

/// String spans: double or single quoted, each with `\` escaping.
/// Non-strict, so a lone quote falls through as plain text. Escapes are
/// left in place: this tokenizer guards other tokenizers, whose operands
/// flatten back to source text and must re-tokenize byte-for-byte.
pub fn string_tokenizer() -> Tokenizer {
    Tokenizer::new(vec![
        Symbol::nested("\"", "\"").escape('\\').into(),
        Symbol::nested("'", "'").escape('\\').into(),
    ])
}

/// Like [`string_tokenizer`], but escape sequences are stripped from the
/// matched content. Used where a string literal is finally consumed.
pub fn string_literal_tokenizer() -> Tokenizer {
    Tokenizer::new(vec![
        Symbol::nested("\"", "\"").escape('\\').strip_escapes().into(),
        Symbol::nested("'", "'").escape('\\').strip_escapes().into(),
    ])
}

/// The top-level syntax-tag tokenizer: `{* ... *}` comments and
/// `{ ... }` tags. The tag interior stays raw (blocks re-tokenize their
/// signatures), but string literals guard the close search so a `}`
/// inside a quoted argument does not end the tag.
pub fn tag_tokenizer() -> Tokenizer {
    Tokenizer::new(vec![
        Symbol::nested("{*", "*}").strict().into(),
        Symbol::nested("{", "}")
            .strict()
            .guard(string_tokenizer())
            .not_followed_by(['*'])
            .into(),
    ])
}

/// Splits expression text on operator syntaxes at the top nesting level.
/// Strings, bracket groups and paren groups pass through untouched.
pub fn operator_tokenizer(syntaxes: &[String]) -> Tokenizer {
    let mut symbols = guards();
    symbols.push(Symbol::simple(syntaxes.iter().cloned()).into());
    Tokenizer::new(symbols)
}

/// Splits a value on `|` filter pipes. `||` is registered so the longest
/// match keeps a logical-or from being read as two pipes.
pub fn filter_tokenizer() -> Tokenizer {
    let mut symbols = guards();
    symbols.push(Symbol::simple(["||", "|"]).into());
    Tokenizer::new(symbols)
}

/// Splits an array literal interior on `,` and `key = value` pairs.
/// The comparison operators are registered so `==` and friends never
/// split as assignments.
pub fn array_tokenizer() -> Tokenizer {
    let mut symbols = guards();
    symbols.push(
        Symbol::simple([",", "===", "!==", "==", "!=", ">=", "<=", "~=", "="]).into(),
    );
    Tokenizer::new(symbols)
}

/// Splits a call-argument list on top-level commas.
pub fn args_tokenizer() -> Tokenizer {
    let mut symbols = guards();
    symbols.push(Symbol::simple([","]).into());
    Tokenizer::new(symbols)
}

/// Splits a block signature on literal keywords (` as `, ` with `, ...).
pub fn signature_tokenizer(keywords: &[&str]) -> Tokenizer {
    let mut symbols = guards();
    symbols.push(Symbol::simple(keywords.iter().copied()).into());
    Tokenizer::new(symbols)
}

/// The nesting guards shared by every expression-level tokenizer:
/// strings, bracket groups and paren groups. Parens are non-strict since
/// an opening paren is not necessarily a call.
fn guards() -> Vec<Symbol> {
    vec![
        Symbol::nested("\"", "\"").escape('\\').into(),
        Symbol::nested("'", "'").escape('\\').into(),
        Symbol::nested("[", "]").guard(string_tokenizer()).into(),
        Symbol::nested("(", ")").guard(string_tokenizer()).into(),
    ]
}
