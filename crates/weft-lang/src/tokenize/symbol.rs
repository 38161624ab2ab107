use weft_core::error::TokenizeError;
use weft_core::token::Token;

use super::tokenizer::Tokenizer;

/// A literal delimiter matcher.
///
/// Matches when the pending buffer ends with one of its delimiters. The
/// text before the delimiter is emitted as a plain token; the delimiter
/// itself is emitted as its own token unless the symbol discards it.
#[derive(Clone, Debug)]
pub struct SimpleSymbol {
    delimiters: Vec<String>,
    include: bool,
}

impl SimpleSymbol {
    pub fn new(delimiters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            delimiters: delimiters.into_iter().map(Into::into).collect(),
            include: true,
        }
    }

    /// Drop matched delimiters instead of emitting them.
    pub fn discard(mut self) -> Self {
        self.include = false;
        self
    }

    pub fn delimiters(&self) -> &[String] {
        &self.delimiters
    }

    pub fn includes_delimiter(&self) -> bool {
        self.include
    }
}

/// A nested-delimiter matcher.
///
/// Matches when the pending buffer ends with the open delimiter, then
/// scans ahead for the correctly nested close delimiter, accounting for
/// same-delimiter recursion and escaping. The matched span becomes a
/// group token carrying both delimiters as its first and last leaves.
#[derive(Clone, Debug)]
pub struct NestedSymbol {
    open: String,
    close: String,
    escape: Option<char>,
    strip: bool,
    sub: Option<Tokenizer>,
    tokenize_interior: bool,
    strict: bool,
    allow_leading: bool,
    not_followed_by: Vec<char>,
}

impl NestedSymbol {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            escape: None,
            strip: false,
            sub: None,
            tokenize_interior: false,
            strict: false,
            allow_leading: true,
            not_followed_by: Vec::new(),
        }
    }

    /// Set the escape character. An escape immediately before a delimiter
    /// suppresses it; a doubled escape re-enables it.
    pub fn escape(mut self, escape: char) -> Self {
        self.escape = Some(escape);
        self
    }

    /// Strip escape sequences from matched groups in the post-tokenize
    /// pass. Splitter tokenizers leave escapes in place so flattened
    /// operands re-tokenize byte-for-byte; only the final consumer of a
    /// string literal strips them.
    pub fn strip_escapes(mut self) -> Self {
        self.strip = true;
        self
    }

    /// An unmatched open delimiter is a tokenize error instead of
    /// silently declining the match.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Require the open delimiter to begin the scan unit: any preceding
    /// buffered text declines the match.
    pub fn no_leading_text(mut self) -> Self {
        self.allow_leading = false;
        self
    }

    /// Decline the match when the open delimiter is immediately followed
    /// by one of these characters (lets a longer symbol claim the span).
    pub fn not_followed_by(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.not_followed_by.extend(chars);
        self
    }

    /// Tokenize the interior with a sub-tokenizer. The sub-tokenizer's
    /// nested symbols also guard the close-delimiter search, so a close
    /// delimiter inside a string literal does not terminate the span.
    pub fn sub_tokenizer(mut self, sub: Tokenizer) -> Self {
        self.sub = Some(sub);
        self.tokenize_interior = true;
        self
    }

    /// Like [`sub_tokenizer`](Self::sub_tokenizer), but the interior is
    /// kept as raw text; the sub-tokenizer only guards the close search.
    pub fn guard(mut self, sub: Tokenizer) -> Self {
        self.sub = Some(sub);
        self.tokenize_interior = false;
        self
    }

    pub fn open_delimiter(&self) -> &str {
        &self.open
    }

    pub fn close_delimiter(&self) -> &str {
        &self.close
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn allows_leading_text(&self) -> bool {
        self.allow_leading
    }

    pub fn declines_before(&self, c: char) -> bool {
        self.not_followed_by.contains(&c)
    }

    /// Check whether the open delimiter at the end of `before + open` is
    /// suppressed by an odd run of escape characters.
    pub fn open_is_escaped(&self, before: &str) -> bool {
        match self.escape {
            Some(esc) => trailing_run(before, esc) % 2 == 1,
            None => false,
        }
    }

    /// Find the correctly nested close delimiter, scanning `text` from
    /// byte offset `from` (just past the open delimiter). Returns the
    /// byte offset where the close delimiter starts.
    pub fn find_close(&self, text: &str, from: usize) -> Result<usize, TokenizeError> {
        let mut depth = 1usize;
        let mut i = from;
        let recursive = self.open != self.close;

        while i < text.len() {
            // An escape character suppresses whatever follows it.
            if let Some(esc) = self.escape {
                if text[i..].starts_with(esc) {
                    i += esc.len_utf8();
                    if let Some(c) = text[i..].chars().next() {
                        i += c.len_utf8();
                    }
                    continue;
                }
            }

            // Spans claimed by the sub-tokenizer's nested symbols (string
            // literals, mostly) cannot open or close this symbol.
            if let Some(sub) = &self.sub {
                if let Some(end) = sub.guarded_span(text, i) {
                    i = end;
                    continue;
                }
            }

            if text[i..].starts_with(self.close.as_str()) {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
                i += self.close.len();
                continue;
            }

            if recursive && text[i..].starts_with(self.open.as_str()) {
                depth += 1;
                i += self.open.len();
                continue;
            }

            match text[i..].chars().next() {
                Some(c) => i += c.len_utf8(),
                None => break,
            }
        }

        Err(TokenizeError::new(
            from.saturating_sub(self.open.len()),
            format!("unmatched `{}`", self.open),
        ))
    }

    /// Produce the interior tokens for a matched span.
    pub fn interior_tokens(&self, interior: &str) -> Result<Vec<Token>, TokenizeError> {
        match (&self.sub, self.tokenize_interior) {
            (Some(sub), true) => sub.tokenize(interior),
            _ => {
                if interior.is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![Token::Text(interior.to_string())])
                }
            }
        }
    }

    /// Post-tokenize hook: strip escape sequences inside groups this
    /// symbol produced, identified by their delimiter leaves.
    pub fn post_tokenize(&self, tokens: Vec<Token>) -> Vec<Token> {
        if !self.strip {
            return tokens;
        }
        let Some(esc) = self.escape else {
            return tokens;
        };
        tokens
            .into_iter()
            .map(|tok| self.strip_group(tok, esc))
            .collect()
    }

    fn strip_group(&self, token: Token, esc: char) -> Token {
        let Token::Group(inner) = token else {
            return token;
        };
        let ours = inner.first().and_then(Token::as_text) == Some(self.open.as_str())
            && inner.last().and_then(Token::as_text) == Some(self.close.as_str());
        let len = inner.len();
        let inner = inner
            .into_iter()
            .enumerate()
            .map(|(i, tok)| {
                let is_delimiter = i == 0 || i + 1 == len;
                match tok {
                    Token::Text(s) if ours && !is_delimiter => {
                        Token::Text(self.unescape(&s, esc))
                    }
                    other => self.strip_group(other, esc),
                }
            })
            .collect();
        Token::Group(inner)
    }

    /// Remove escape characters before delimiters; a doubled escape
    /// collapses to a single literal escape character.
    fn unescape(&self, text: &str, esc: char) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c != esc {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some(&next) if next == esc => {
                    out.push(esc);
                    chars.next();
                }
                Some(&next) => {
                    let delim = self.open.starts_with(next) || self.close.starts_with(next);
                    if !delim {
                        out.push(esc);
                    }
                    out.push(next);
                    chars.next();
                }
                None => out.push(esc),
            }
        }
        out
    }
}

/// A composable symbol matcher.
#[derive(Clone, Debug)]
pub enum Symbol {
    Simple(SimpleSymbol),
    Nested(NestedSymbol),
}

impl Symbol {
    /// A literal delimiter symbol.
    pub fn simple(delimiters: impl IntoIterator<Item = impl Into<String>>) -> SimpleSymbol {
        SimpleSymbol::new(delimiters)
    }

    /// A nested-delimiter symbol.
    pub fn nested(open: impl Into<String>, close: impl Into<String>) -> NestedSymbol {
        NestedSymbol::new(open, close)
    }

    pub fn post_tokenize(&self, tokens: Vec<Token>) -> Vec<Token> {
        match self {
            Symbol::Simple(_) => tokens,
            Symbol::Nested(n) => n.post_tokenize(tokens),
        }
    }
}

impl From<SimpleSymbol> for Symbol {
    fn from(s: SimpleSymbol) -> Self {
        Symbol::Simple(s)
    }
}

impl From<NestedSymbol> for Symbol {
    fn from(n: NestedSymbol) -> Self {
        Symbol::Nested(n)
    }
}

/// Count the trailing run of `c` at the end of `text`.
fn trailing_run(text: &str, c: char) -> usize {
    text.chars().rev().take_while(|&x| x == c).count()
}
