use weft_core::error::TokenizeError;
use weft_core::token::Token;

use super::symbol::Symbol;

/// A character-by-character scanner driven by a list of symbols.
///
/// The scanner keeps an in-process buffer; after each appended character it
/// offers the buffer to every symbol in registration order. The first
/// symbol that recognizes the buffer as ending in one of its delimiters
/// consumes the matched span, emits its tokens and resets the buffer.
/// Unconsumed trailing text becomes a final plain token.
#[derive(Clone, Debug, Default)]
pub struct Tokenizer {
    symbols: Vec<Symbol>,
}

impl Tokenizer {
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            symbols: symbols.into_iter().collect(),
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Tokenize `text` into a flat sequence of tokens.
    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut buf_start = 0usize;
        let mut pos = 0usize;

        'scan: while pos < text.len() {
            let ch = match text[pos..].chars().next() {
                Some(c) => c,
                None => break,
            };
            pos += ch.len_utf8();
            let buf = &text[buf_start..pos];

            for symbol in &self.symbols {
                match symbol {
                    // Simple symbols resolve together after the nested
                    // ones, so the longest delimiter wins across symbols
                    // (`==` before `=`).
                    Symbol::Simple(_) => continue,
                    Symbol::Nested(nested) => {
                        let open = nested.open_delimiter();
                        if !buf.ends_with(open) {
                            continue;
                        }
                        let before = &buf[..buf.len() - open.len()];
                        if nested.open_is_escaped(before) {
                            continue;
                        }
                        if !nested.allows_leading_text() && !before.is_empty() {
                            continue;
                        }
                        if let Some(next) = text[pos..].chars().next() {
                            if nested.declines_before(next) {
                                continue;
                            }
                        }
                        match nested.find_close(text, pos) {
                            Ok(close_at) => {
                                if !before.is_empty() {
                                    tokens.push(Token::Text(before.to_string()));
                                }
                                let interior = &text[pos..close_at];
                                let mut group =
                                    vec![Token::Text(open.to_string())];
                                group.extend(nested.interior_tokens(interior)?);
                                group.push(Token::Text(
                                    nested.close_delimiter().to_string(),
                                ));
                                tokens.push(Token::Group(group));
                                pos = close_at + nested.close_delimiter().len();
                                buf_start = pos;
                                continue 'scan;
                            }
                            Err(err) if nested.is_strict() => return Err(err),
                            Err(_) => continue,
                        }
                    }
                }
            }

            if let Some(delimiter) = self.match_simple(buf, &text[pos..]) {
                let before = &buf[..buf.len() - delimiter.len()];
                if !before.is_empty() {
                    tokens.push(Token::Text(before.to_string()));
                }
                if self.delimiter_included(&delimiter) {
                    tokens.push(Token::Text(delimiter));
                }
                buf_start = pos;
            }
        }

        if buf_start < text.len() {
            tokens.push(Token::Text(text[buf_start..].to_string()));
        }

        let mut tokens = tokens;
        for symbol in &self.symbols {
            tokens = symbol.post_tokenize(tokens);
        }
        Ok(tokens)
    }

    /// Find the span a nested symbol of this tokenizer claims at `at`,
    /// returning the offset just past its close delimiter. Used by outer
    /// nested symbols to keep delimiters inside claimed spans (string
    /// literals, mostly) from terminating their close search.
    pub fn guarded_span(&self, text: &str, at: usize) -> Option<usize> {
        for symbol in &self.symbols {
            let Symbol::Nested(nested) = symbol else {
                continue;
            };
            let open = nested.open_delimiter();
            if !text[at..].starts_with(open) {
                continue;
            }
            if let Ok(close_at) = nested.find_close(text, at + open.len()) {
                return Some(close_at + nested.close_delimiter().len());
            }
        }
        None
    }

    /// Match the longest simple delimiter across all simple symbols,
    /// deferring when upcoming input could complete a longer one.
    fn match_simple(&self, buf: &str, rest: &str) -> Option<String> {
        let mut best: Option<&str> = None;
        for symbol in &self.symbols {
            let Symbol::Simple(simple) = symbol else {
                continue;
            };
            for delimiter in simple.delimiters() {
                if buf.ends_with(delimiter.as_str())
                    && best.is_none_or(|b| delimiter.len() > b.len())
                {
                    best = Some(delimiter);
                }
            }
        }
        let best = best?;
        if self.should_defer(buf, rest, best.len()) {
            return None;
        }
        Some(best.to_string())
    }

    /// Check whether a longer registered delimiter could still complete
    /// with upcoming input, overlapping the current match.
    fn should_defer(&self, buf: &str, rest: &str, matched_len: usize) -> bool {
        for symbol in &self.symbols {
            let Symbol::Simple(simple) = symbol else {
                continue;
            };
            for longer in simple.delimiters() {
                if longer.len() <= matched_len {
                    continue;
                }
                for split in matched_len..longer.len() {
                    if !longer.is_char_boundary(split) {
                        continue;
                    }
                    if buf.ends_with(&longer[..split]) && rest.starts_with(&longer[split..]) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn delimiter_included(&self, delimiter: &str) -> bool {
        self.symbols.iter().any(|symbol| match symbol {
            Symbol::Simple(simple) => {
                simple.delimiters().iter().any(|d| d == delimiter) && simple.includes_delimiter()
            }
            Symbol::Nested(_) => false,
        })
    }
}
