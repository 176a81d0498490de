//! Literal value decoders.
//!
//! Decoding is separate from scanning: the lexer records lossless byte
//! ranges, and these functions turn token text into values on demand.

mod dedent;
mod numeric;
mod unescape;

pub use dedent::dedent_pieces;
pub use numeric::{decode_bin, decode_float, decode_hex, decode_int, decode_oct, FloatValue, IntValue};
pub use unescape::{unescape_cooked, unescape_raw, DecodeError};

use nabla_syntax::Span;

/// Decode a character literal token (text including the quotes).
///
/// Returns the character; malformed literals (empty, multi-character)
/// push a [`DecodeError`] and yield U+FFFD.
pub fn decode_char(text: &str, base_offset: u32, errors: &mut Vec<DecodeError>) -> char {
    let inner = text
        .strip_prefix('\'')
        .map_or(text, |t| t.strip_suffix('\'').unwrap_or(t));
    let cooked = match unescape_cooked(inner, base_offset + 1, errors) {
        Some(cooked) => cooked,
        None => inner.to_string(),
    };
    let mut chars = cooked.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        (None, _) => {
            errors.push(DecodeError {
                span: Span::new(base_offset, base_offset + text.len() as u32),
                message: "empty character literal",
            });
            '\u{FFFD}'
        }
        (Some(_), Some(_)) => {
            errors.push(DecodeError {
                span: Span::new(base_offset, base_offset + text.len() as u32),
                message: "character literal contains multiple characters",
            });
            '\u{FFFD}'
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_char_basic() {
        let mut errors = Vec::new();
        assert_eq!(decode_char("'a'", 0, &mut errors), 'a');
        assert_eq!(decode_char(r"'\n'", 0, &mut errors), '\n');
        assert_eq!(decode_char(r"'\x41'", 0, &mut errors), 'A');
        assert_eq!(decode_char("'λ'", 0, &mut errors), 'λ');
        assert!(errors.is_empty());
    }

    #[test]
    fn decode_char_malformed() {
        let mut errors = Vec::new();
        assert_eq!(decode_char("''", 0, &mut errors), '\u{FFFD}');
        assert_eq!(decode_char("'ab'", 0, &mut errors), '\u{FFFD}');
        assert_eq!(errors.len(), 2);
    }
}
