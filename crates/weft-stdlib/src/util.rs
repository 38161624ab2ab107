//! Small signature-parsing helpers shared by the standard blocks.

/// When `text` is exactly one quoted string, return its content.
pub(crate) fn quoted(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let quote = match chars.next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return None,
    };
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == quote => {
                // the close quote must end the text
                if i + c.len_utf8() == text.len() {
                    return Some(out);
                }
                return None;
            }
            c => out.push(c),
        }
    }
    None
}

/// When `text` starts with a `( ... )` group, return its interior and
/// the rest. Quoted spans are skipped.
pub(crate) fn paren_group(text: &str) -> Option<(&str, &str)> {
    if !text.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&text[1..i], &text[i + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// Find a top-level `=` that is not part of a comparison operator,
/// outside quotes and brackets. Returns the byte offset.
pub(crate) fn top_level_eq(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { 0 };
                let next = bytes.get(i + 1).copied().unwrap_or(0);
                if !matches!(prev, b'=' | b'!' | b'<' | b'>' | b'~') && next != b'=' {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// The leading `[A-Za-z_][A-Za-z0-9_]*` identifier of a fragment.
pub(crate) fn leading_ident(text: &str) -> &str {
    let mut end = 0;
    for (i, c) in text.char_indices() {
        let ok = if i == 0 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        end = i + c.len_utf8();
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_accepts_both_quote_styles() {
        assert_eq!(quoted("\"base.tpl\"").as_deref(), Some("base.tpl"));
        assert_eq!(quoted("'base.tpl'").as_deref(), Some("base.tpl"));
        assert_eq!(quoted("\"a\\\"b\"").as_deref(), Some("a\"b"));
    }

    #[test]
    fn quoted_rejects_trailing_text_and_expressions() {
        assert_eq!(quoted("\"a\" ~ $x"), None);
        assert_eq!(quoted("$x"), None);
        assert_eq!(quoted("\"unclosed"), None);
    }

    #[test]
    fn paren_group_splits_interior_and_rest() {
        assert_eq!(paren_group("($a, $b) rest"), Some(("$a, $b", " rest")));
        assert_eq!(paren_group("(a(b))"), Some(("a(b)", "")));
        assert_eq!(paren_group("(\")\")"), Some(("\")\"", "")));
        assert_eq!(paren_group("no parens"), None);
    }

    #[test]
    fn top_level_eq_skips_comparisons() {
        assert_eq!(top_level_eq("$a == 1"), None);
        assert_eq!(top_level_eq("$a != 1"), None);
        assert_eq!(top_level_eq("$a >= 1"), None);
        assert_eq!(top_level_eq("$a = 1"), Some(3));
        assert_eq!(top_level_eq("f($x = 1)"), None);
        assert_eq!(top_level_eq("\"a=b\""), None);
    }
}
