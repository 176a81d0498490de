//! Triple-quoted string dedenting.
//!
//! The common indentation of a triple string is computed across the text
//! pieces between interpolations, then stripped from the start of every
//! line. The computation runs before `\r` → `\n` normalization so newline
//! handling stays single-pass.

/// Dedent the chunk pieces of one triple-quoted string.
///
/// Rules:
/// - A newline immediately after the opening delimiter is dropped.
/// - The dedent width is the longest common space/tab prefix over all
///   non-empty lines; text on the opening-delimiter line does not
///   participate. A line holding only an interpolation participates with
///   the prefix before it.
/// - If the last piece ends with `\n` or `\r`, the dedent is zero
///   (trailing-newline rule).
/// - The dedent is applied at the first byte of every line. Pieces after
///   an interpolation resume mid-line and are untouched until their next
///   newline.
pub fn dedent_pieces(pieces: &[&str]) -> Vec<String> {
    if pieces.is_empty() {
        return Vec::new();
    }

    let mut pieces: Vec<&str> = pieces.to_vec();
    let mut starts_line = false;
    if let Some(first) = pieces.first_mut() {
        for prefix in ["\r\n", "\n", "\r"] {
            if let Some(rest) = first.strip_prefix(prefix) {
                *first = rest;
                starts_line = true;
                break;
            }
        }
    }

    let indent = common_indent(&pieces, starts_line);

    let mut out = Vec::with_capacity(pieces.len());
    let mut at_line_start = starts_line;
    let mut to_strip = if starts_line { indent } else { 0 };
    for (idx, piece) in pieces.iter().enumerate() {
        let mut result = String::with_capacity(piece.len());
        for c in piece.chars() {
            if at_line_start {
                if to_strip > 0 && (c == ' ' || c == '\t') {
                    to_strip -= 1;
                    continue;
                }
                at_line_start = false;
            }
            result.push(c);
            if c == '\n' || c == '\r' {
                at_line_start = true;
                to_strip = indent;
            }
        }
        out.push(result);
        // The boundary to the next piece is an interpolation: mid-line.
        if idx + 1 < pieces.len() {
            at_line_start = false;
        }
    }
    out
}

/// Longest common space/tab prefix over participating lines.
fn common_indent(pieces: &[&str], first_starts_line: bool) -> usize {
    // Trailing-newline rule: a final piece ending in a newline means the
    // closing delimiter starts its own column-zero line.
    if let Some(last) = pieces.last() {
        if last.ends_with('\n') || last.ends_with('\r') {
            return 0;
        }
    }

    let mut common: Option<Vec<char>> = None;
    let mut fold = |prefix: &[char], common: &mut Option<Vec<char>>| {
        *common = Some(match common.take() {
            None => prefix.to_vec(),
            Some(existing) => existing
                .iter()
                .zip(prefix.iter())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| *a)
                .collect(),
        });
    };

    let mut at_line_start = first_starts_line;
    let mut prefix: Vec<char> = Vec::new();
    let mut in_prefix = first_starts_line;

    for (idx, piece) in pieces.iter().enumerate() {
        for c in piece.chars() {
            if in_prefix {
                match c {
                    ' ' | '\t' => {
                        prefix.push(c);
                        continue;
                    }
                    '\n' | '\r' => {
                        // Whitespace-only line: it participates.
                        if !prefix.is_empty() {
                            fold(&prefix, &mut common);
                        }
                        prefix.clear();
                        at_line_start = true;
                        continue;
                    }
                    _ => {
                        fold(&prefix, &mut common);
                        prefix.clear();
                        in_prefix = false;
                        at_line_start = false;
                        continue;
                    }
                }
            }
            if at_line_start {
                match c {
                    '\n' | '\r' => {} // empty line: skip
                    ' ' | '\t' => {
                        in_prefix = true;
                        prefix.push(c);
                    }
                    _ => {
                        // Flush-left content: the common prefix is empty.
                        fold(&[], &mut common);
                        at_line_start = false;
                    }
                }
                continue;
            }
            if c == '\n' || c == '\r' {
                at_line_start = true;
            }
        }

        if idx + 1 < pieces.len() {
            // An interpolation follows: the current line has content.
            if in_prefix {
                fold(&prefix, &mut common);
                prefix.clear();
                in_prefix = false;
            } else if at_line_start {
                fold(&[], &mut common);
            }
            at_line_start = false;
        }
    }

    // A whitespace-only final line (the indentation of the closing
    // delimiter) participates.
    if in_prefix {
        fold(&prefix, &mut common);
    }

    common.map_or(0, |p| p.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(pieces: &[&str]) -> String {
        dedent_pieces(pieces).concat()
    }

    #[test]
    fn two_space_dedent() {
        // """\n  a\n  b\n  """ → "a\nb\n"
        assert_eq!(joined(&["\n  a\n  b\n  "]), "a\nb\n");
    }

    #[test]
    fn no_dedent_when_flush() {
        assert_eq!(joined(&["\na\nb\n"]), "a\nb\n");
    }

    #[test]
    fn trailing_newline_means_zero_dedent() {
        // Last piece ends with a newline: closing delimiter is flush left.
        assert_eq!(joined(&["\n  a\n"]), "  a\n");
    }

    #[test]
    fn tabs_participate() {
        assert_eq!(joined(&["\n\ta\n\tb\n\t"]), "a\nb\n");
        // Mixed tab/space prefixes only share the common part.
        assert_eq!(joined(&["\n\t a\n\tb\n\t"]), " a\nb\n");
    }

    #[test]
    fn empty_lines_do_not_constrain() {
        assert_eq!(joined(&["\n  a\n\n  b\n  "]), "a\n\nb\n");
    }

    #[test]
    fn pieces_resume_mid_line() {
        // "  x$(y) tail" style: the piece after the interpolation starts
        // mid-line and must not be stripped there.
        assert_eq!(
            dedent_pieces(&["\n  x", " tail\n  z\n  "]),
            vec!["x".to_string(), " tail\nz\n".to_string()]
        );
    }

    #[test]
    fn interpolation_only_line_participates() {
        // The line holding only the interpolation is flush left, so the
        // common prefix collapses to zero.
        assert_eq!(
            dedent_pieces(&["\n  a\n", "\n  b\n  "]),
            vec!["  a\n".to_string(), "\n  b\n  ".to_string()]
        );
    }

    #[test]
    fn text_on_delimiter_line() {
        // Text before the first newline participates in nothing.
        assert_eq!(joined(&["head\n  a\n  "]), "head\na\n");
    }

    #[test]
    fn crlf_counts_once() {
        assert_eq!(joined(&["\r\n  a\r\n  "]), "a\r\n");
    }

    #[test]
    fn empty_input() {
        assert!(dedent_pieces(&[]).is_empty());
        assert_eq!(dedent_pieces(&[""]), vec![String::new()]);
    }
}
