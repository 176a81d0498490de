//! String unescaping for cooked and raw literals.
//!
//! Invalid escapes never abort: they push a [`DecodeError`] into the
//! accumulator and substitute U+FFFD, so the caller always gets a value.

use nabla_syntax::Span;

/// A value-decoding error with a source span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError {
    pub span: Span,
    pub message: &'static str,
}

impl DecodeError {
    fn new(start: u32, end: u32, message: &'static str) -> Self {
        DecodeError {
            span: Span::new(start, end),
            message,
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for DecodeError {}

/// Unescape a cooked string chunk.
///
/// Recognized escapes: `\x` (2 hex, byte), `\u` (up to 4 hex), `\U`
/// (up to 8 hex, at most U+10FFFF), octal (up to 3 digits, ≤ 255),
/// the C letter escapes `n t r e b f v a`, and the quotable literals
/// `\\ \' \" \$ \``. A backslash before a newline is a line
/// continuation: it consumes the newline (or CR/LF pair) and any
/// following indentation. Literal `\r` and `\r\n` normalize to `\n`.
///
/// Fast path: returns `None` when the chunk needs no rewriting, so the
/// caller can use the source slice directly.
pub fn unescape_cooked(
    content: &str,
    base_offset: u32,
    errors: &mut Vec<DecodeError>,
) -> Option<String> {
    if !content.contains('\\') && !content.contains('\r') {
        return None;
    }

    let mut result = String::with_capacity(content.len());
    let bytes = content.as_bytes();
    let mut chars = content.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at = |j: usize| base_offset + j as u32;
        match c {
            '\r' => {
                // \r and \r\n normalize to \n.
                if let Some(&(_, '\n')) = chars.peek() {
                    chars.next();
                }
                result.push('\n');
            }
            '\\' => {
                let Some((j, esc)) = chars.next() else {
                    errors.push(DecodeError::new(at(i), at(i) + 1, "truncated escape"));
                    result.push('\u{FFFD}');
                    break;
                };
                match esc {
                    'n' => result.push('\n'),
                    't' => result.push('\t'),
                    'r' => result.push('\r'),
                    'e' => result.push('\u{1B}'),
                    'b' => result.push('\u{8}'),
                    'f' => result.push('\u{C}'),
                    'v' => result.push('\u{B}'),
                    'a' => result.push('\u{7}'),
                    '\\' | '\'' | '"' | '$' | '`' => result.push(esc),
                    'x' => {
                        let (value, consumed) = take_hex(bytes, j + 1, 2);
                        if consumed == 0 {
                            errors.push(DecodeError::new(
                                at(i),
                                at(j) + 1,
                                "\\x needs hex digits",
                            ));
                            result.push('\u{FFFD}');
                        } else {
                            push_scalar(&mut result, value);
                        }
                        skip_n(&mut chars, consumed);
                    }
                    'u' => {
                        let (value, consumed) = take_hex(bytes, j + 1, 4);
                        if consumed == 0 {
                            errors.push(DecodeError::new(
                                at(i),
                                at(j) + 1,
                                "\\u needs hex digits",
                            ));
                            result.push('\u{FFFD}');
                        } else {
                            push_scalar(&mut result, value);
                        }
                        skip_n(&mut chars, consumed);
                    }
                    'U' => {
                        let (value, consumed) = take_hex(bytes, j + 1, 8);
                        if consumed == 0 || value > 0x10FFFF {
                            errors.push(DecodeError::new(
                                at(i),
                                at(j) + 1 + consumed as u32,
                                "invalid \\U escape",
                            ));
                            result.push('\u{FFFD}');
                        } else {
                            push_scalar(&mut result, value);
                        }
                        skip_n(&mut chars, consumed);
                    }
                    '0'..='7' => {
                        let mut value = esc as u32 - '0' as u32;
                        let mut consumed = 0usize;
                        while consumed < 2 {
                            match chars.peek() {
                                Some(&(_, d @ '0'..='7')) => {
                                    value = value * 8 + (d as u32 - '0' as u32);
                                    chars.next();
                                    consumed += 1;
                                }
                                _ => break,
                            }
                        }
                        if value > 255 {
                            errors.push(DecodeError::new(
                                at(i),
                                at(j) + 1 + consumed as u32,
                                "octal escape exceeds \\377",
                            ));
                            result.push('\u{FFFD}');
                        } else {
                            push_scalar(&mut result, value);
                        }
                    }
                    '\n' | '\r' => {
                        // Line continuation: swallow the newline (CR/LF
                        // counts as one) and any following indentation.
                        if esc == '\r' {
                            if let Some(&(_, '\n')) = chars.peek() {
                                chars.next();
                            }
                        }
                        while let Some(&(_, w)) = chars.peek() {
                            if w == ' ' || w == '\t' {
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                    other => {
                        errors.push(DecodeError::new(
                            at(i),
                            at(j) + other.len_utf8() as u32,
                            "invalid escape sequence",
                        ));
                        result.push('\u{FFFD}');
                    }
                }
            }
            _ => result.push(c),
        }
    }

    Some(result)
}

/// Unescape a raw string chunk.
///
/// Raw contents are the identity except when backslashes directly escape
/// the delimiter: a run of `n` backslashes followed by `delim` becomes
/// `n/2` backslashes plus the delimiter; a run of `n` backslashes at the
/// end of the content (immediately before the closing delimiter) becomes
/// `n/2` backslashes.
pub fn unescape_raw(content: &str, delim: char) -> std::borrow::Cow<'_, str> {
    if !content.contains('\\') {
        return std::borrow::Cow::Borrowed(content);
    }
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let mut run = 1usize;
        while let Some(&'\\') = chars.peek() {
            chars.next();
            run += 1;
        }
        match chars.peek() {
            Some(&next) if next == delim => {
                chars.next();
                for _ in 0..run / 2 {
                    result.push('\\');
                }
                result.push(delim);
            }
            None => {
                // Run abuts the closing delimiter.
                for _ in 0..run / 2 {
                    result.push('\\');
                }
            }
            Some(_) => {
                for _ in 0..run {
                    result.push('\\');
                }
            }
        }
    }
    std::borrow::Cow::Owned(result)
}

/// Read up to `max` hex digits starting at byte `from`.
fn take_hex(bytes: &[u8], from: usize, max: usize) -> (u32, usize) {
    let mut value = 0u32;
    let mut consumed = 0usize;
    while consumed < max {
        match bytes.get(from + consumed) {
            Some(b) if b.is_ascii_hexdigit() => {
                value = value * 16 + u32::from((*b as char).to_digit(16).expect("hex digit"));
                consumed += 1;
            }
            _ => break,
        }
    }
    (value, consumed)
}

fn push_scalar(result: &mut String, value: u32) {
    result.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
}

fn skip_n<I: Iterator>(iter: &mut std::iter::Peekable<I>, n: usize) {
    for _ in 0..n {
        iter.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cook(content: &str) -> (String, Vec<DecodeError>) {
        let mut errors = Vec::new();
        let cooked = unescape_cooked(content, 0, &mut errors)
            .unwrap_or_else(|| content.to_string());
        (cooked, errors)
    }

    #[test]
    fn fast_path_borrows() {
        let mut errors = Vec::new();
        assert_eq!(unescape_cooked("plain text", 0, &mut errors), None);
        assert!(errors.is_empty());
    }

    #[test]
    fn letter_escapes() {
        let (s, e) = cook(r"a\nb\tc\e");
        assert_eq!(s, "a\nb\tc\u{1B}");
        assert!(e.is_empty());
    }

    #[test]
    fn quotable_escapes() {
        let (s, e) = cook(r#"\"\$\\\`"#);
        assert_eq!(s, "\"$\\`");
        assert!(e.is_empty());
    }

    #[test]
    fn hex_escapes() {
        let (s, e) = cook(r"\x41\x7f");
        assert_eq!(s, "A\u{7f}");
        assert!(e.is_empty());

        let (s, e) = cook(r"\xg");
        assert_eq!(s, "\u{FFFD}g");
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn unicode_escapes() {
        let (s, e) = cook(r"\u3b1\U1F600");
        assert_eq!(s, "α😀");
        assert!(e.is_empty());

        let (_, e) = cook(r"\U110000");
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn octal_escapes() {
        let (s, e) = cook(r"\101\0");
        assert_eq!(s, "A\0");
        assert!(e.is_empty());

        let (_, e) = cook(r"\777");
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn line_continuation() {
        let (s, e) = cook("a\\\n    b");
        assert_eq!(s, "ab");
        assert!(e.is_empty());

        let (s, _) = cook("a\\\r\n\tb");
        assert_eq!(s, "ab");
    }

    #[test]
    fn cr_normalizes() {
        let (s, _) = cook("a\rb");
        assert_eq!(s, "a\nb");
        let (s, _) = cook("a\r\nb");
        assert_eq!(s, "a\nb");
    }

    #[test]
    fn invalid_escape_replaces() {
        let (s, e) = cook(r"\q");
        assert_eq!(s, "\u{FFFD}");
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].span, Span::new(0, 2));
    }

    #[test]
    fn raw_is_identity_without_delim_escapes() {
        assert_eq!(unescape_raw(r"a\nb", '"'), r"a\nb");
        assert_eq!(unescape_raw(r"C:\path\file", '"'), r"C:\path\file");
    }

    #[test]
    fn raw_delimiter_halving() {
        // One backslash escapes the quote.
        assert_eq!(unescape_raw(r#"a\"b"#, '"'), r#"a"b"#);
        // Three backslashes: one escaped backslash plus escaped quote.
        assert_eq!(unescape_raw(r#"a\\\"b"#, '"'), r#"a\"b"#);
        // Run at end of content (before the closing delimiter) halves.
        assert_eq!(unescape_raw(r"a\\", '"'), r"a\");
        assert_eq!(unescape_raw(r"a\\\\", '"'), r"a\\");
    }
}
