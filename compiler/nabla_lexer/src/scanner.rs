//! Hand-written lossless tokenizer.
//!
//! The scanner walks a sentinel-terminated [`Cursor`] with a 256-way byte
//! dispatch; each arm is a focused method that advances the cursor and
//! returns one [`RawToken`]. Consecutive token spans tile the source
//! exactly, and the final `EndMarker` repeats forever.
//!
//! String literals are lexed as *piece* tokens (open delimiter, text
//! chunks, `$` interpolation entries, close delimiter). A stack of
//! [`StringState`] records tracks delimiter kind, rawness, and the
//! parenthesis depth of an active `$( … )` interpolation, so strings can
//! nest inside interpolations to any depth.
//!
//! Errors never abort the scan: a malformed token keeps its kind and
//! carries an [`ErrCode`].

use nabla_syntax::{keyword, ErrCode, Kind, RawToken, Span};

use crate::source::{Cursor, SourceBuffer};

/// One open string literal.
#[derive(Clone, Copy, Debug)]
struct StringState {
    /// `DQuote`, `TripleDQuote`, `Backtick`, or `TripleBacktick`.
    delim: Kind,
    /// String-macro or `var` prefix: no interpolation, raw escapes.
    raw: bool,
    /// Parenthesis depth of an active `$( … )` interpolation; 0 while in
    /// string content mode.
    paren_depth: u32,
    /// Set after emitting `$`: the next token is lexed normally and
    /// decides between identifier and parenthesized interpolation.
    interp_pending: bool,
}

impl StringState {
    fn delim_byte(self) -> u8 {
        match self.delim {
            Kind::Backtick | Kind::TripleBacktick => b'`',
            _ => b'"',
        }
    }

    fn triple(self) -> bool {
        matches!(self.delim, Kind::TripleDQuote | Kind::TripleBacktick)
    }

    fn chunk_kind(self) -> Kind {
        match self.delim {
            Kind::Backtick | Kind::TripleBacktick => Kind::CmdChunk,
            _ => Kind::StringChunk,
        }
    }
}

/// The tokenizer. Produces an infinite lazy token sequence terminating in
/// an idempotent `EndMarker`.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    strings: Vec<StringState>,
    /// Kind of the last significant token, for `'` adjoint and string-macro
    /// disambiguation.
    last_kind: Kind,
    /// End byte of the last significant token.
    last_end: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(buffer: &'a SourceBuffer) -> Self {
        Lexer {
            cursor: buffer.cursor(),
            strings: Vec::new(),
            last_kind: Kind::Nothing,
            last_end: 0,
        }
    }

    /// Produce the next token. Returns `EndMarker` (zero-width) at end of
    /// input, forever.
    pub fn next_token(&mut self) -> RawToken {
        let token = self.scan();
        if !token.kind.is_trivia() && token.kind != Kind::EndMarker {
            self.last_kind = token.kind;
            self.last_end = token.span.end;
        }
        token
    }

    fn scan(&mut self) -> RawToken {
        if let Some(state) = self.strings.last().copied() {
            if state.interp_pending {
                self.strings.last_mut().expect("checked above").interp_pending = false;
                let token = self.scan_normal();
                if token.kind == Kind::LParen {
                    self.strings.last_mut().expect("still open").paren_depth = 1;
                }
                return token;
            }
            if state.paren_depth == 0 {
                return self.scan_string_content(state);
            }
        }
        self.scan_normal()
    }

    // ─── Normal mode ────────────────────────────────────────────────────

    fn scan_normal(&mut self) -> RawToken {
        let start = self.cursor.pos();
        match self.cursor.current() {
            0 if self.cursor.is_eof() => RawToken::new(Kind::EndMarker, Span::point(start)),
            b' ' | b'\t' | b'\r' | b'\n' => self.whitespace(start),
            b'#' => self.comment(start),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(start),
            b'0'..=b'9' => self.number(start),
            b'"' => self.string_open(start, false),
            b'`' => self.string_open(start, true),
            b'\'' => self.quote_or_char(start),
            b'(' => self.left_paren(start),
            b')' => self.right_paren(start),
            b'[' => self.single(start, Kind::LBracket),
            b']' => self.single(start, Kind::RBracket),
            b'{' => self.single(start, Kind::LBrace),
            b'}' => self.single(start, Kind::RBrace),
            b',' => self.single(start, Kind::Comma),
            b';' => self.single(start, Kind::Semicolon),
            b'@' => self.single(start, Kind::At),
            b'$' => self.single(start, Kind::Dollar),
            b'\\' => self.single(start, Kind::BackslashOp),
            b'.' => self.dot(start),
            _ => self.operator_or_unknown(start),
        }
    }

    /// Single-byte token.
    fn single(&mut self, start: u32, kind: Kind) -> RawToken {
        self.cursor.advance();
        RawToken::new(kind, Span::new(start, self.cursor.pos()))
    }

    fn token(&self, start: u32, kind: Kind) -> RawToken {
        RawToken::new(kind, Span::new(start, self.cursor.pos()))
    }

    // ─── Trivia ─────────────────────────────────────────────────────────

    fn whitespace(&mut self, start: u32) -> RawToken {
        let mut saw_newline = false;
        loop {
            match self.cursor.current() {
                b' ' | b'\t' | b'\r' => self.cursor.advance(),
                b'\n' => {
                    saw_newline = true;
                    self.cursor.advance();
                }
                _ => break,
            }
        }
        let kind = if saw_newline {
            Kind::NewlineWs
        } else {
            Kind::Whitespace
        };
        self.token(start, kind)
    }

    fn comment(&mut self, start: u32) -> RawToken {
        self.cursor.advance(); // '#'
        if self.cursor.current() == b'=' {
            return self.multiline_comment(start);
        }
        self.cursor.eat_until_newline_or_eof();
        self.token(start, Kind::Comment)
    }

    /// `#= … =#`, nestable.
    fn multiline_comment(&mut self, start: u32) -> RawToken {
        self.cursor.advance(); // '='
        let mut depth = 1u32;
        while depth > 0 {
            match self.cursor.current() {
                0 if self.cursor.is_eof() => {
                    return self.token(start, Kind::Comment).with_err(ErrCode::EofMultiComment);
                }
                b'=' if self.cursor.peek() == b'#' => {
                    self.cursor.advance_n(2);
                    depth -= 1;
                }
                b'#' if self.cursor.peek() == b'=' => {
                    self.cursor.advance_n(2);
                    depth += 1;
                }
                _ => self.cursor.advance(),
            }
        }
        self.token(start, Kind::Comment)
    }

    // ─── Identifiers & keywords ─────────────────────────────────────────

    fn identifier(&mut self, start: u32) -> RawToken {
        self.cursor.advance();
        self.eat_ident_continue();
        let text = self.cursor.slice(start, self.cursor.pos());
        let kind = keyword(text).unwrap_or(Kind::Identifier);
        self.token(start, kind)
    }

    fn eat_ident_continue(&mut self) {
        loop {
            let b = self.cursor.current();
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => self.cursor.advance(),
                // `!` belongs to the identifier unless it begins `!=`.
                b'!' if self.cursor.peek() != b'=' => self.cursor.advance(),
                0x80.. => {
                    let c = self.cursor.current_char();
                    if unicode_ident::is_xid_continue(c) || is_op_suffix_char(c) {
                        self.cursor.advance_char();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    // ─── Numbers ────────────────────────────────────────────────────────

    fn number(&mut self, start: u32) -> RawToken {
        let first = self.cursor.current();
        self.cursor.advance();

        if first == b'0' {
            match self.cursor.current() {
                b'x' | b'X' => return self.radix_number(start, Kind::HexInt),
                b'o' | b'O' => return self.radix_number(start, Kind::OctInt),
                b'b' | b'B' => return self.radix_number(start, Kind::BinInt),
                _ => {}
            }
        }

        self.eat_digits(is_dec_digit);

        let mut kind = Kind::Integer;
        // Fractional part: a dot followed by a digit. `1..2` and `1.x`
        // leave the dot for the next token.
        if self.cursor.current() == b'.' && self.cursor.peek().is_ascii_digit() {
            self.cursor.advance();
            self.eat_digits(is_dec_digit);
            kind = Kind::Float;
        }
        // Exponent: only consumed when digits actually follow, so `1end`
        // lexes as `1` then the keyword.
        if matches!(self.cursor.current(), b'e' | b'E' | b'f' | b'F') {
            let sign = matches!(self.cursor.peek(), b'+' | b'-');
            let digit_ahead = if sign {
                self.cursor.peek2().is_ascii_digit()
            } else {
                self.cursor.peek().is_ascii_digit()
            };
            if digit_ahead {
                self.cursor.advance();
                if sign {
                    self.cursor.advance();
                }
                self.eat_digits(is_dec_digit);
                kind = Kind::Float;
            }
        }

        let mut token = self.token(start, kind);
        if self.trailing_underscore(start) {
            token = token.with_err(ErrCode::InvalidNumericConstant);
        }
        token
    }

    /// `0x`/`0o`/`0b` literals. Maximal munch respects valid digits only:
    /// `0xenomorph` is `0xe` followed by the identifier `nomorph`.
    fn radix_number(&mut self, start: u32, kind: Kind) -> RawToken {
        self.cursor.advance(); // radix letter
        let digits_start = self.cursor.pos();
        match kind {
            Kind::HexInt => self.eat_digits(is_hex_digit),
            Kind::OctInt => self.eat_digits(is_oct_digit),
            _ => self.eat_digits(is_bin_digit),
        }

        // Hex float: 0x1.8p3
        if kind == Kind::HexInt && self.cursor.current() == b'.' && is_hex_digit(self.cursor.peek())
        {
            self.cursor.advance();
            self.eat_digits(is_hex_digit);
            if matches!(self.cursor.current(), b'p' | b'P') {
                self.cursor.advance();
                if matches!(self.cursor.current(), b'+' | b'-') {
                    self.cursor.advance();
                }
                let exp_start = self.cursor.pos();
                self.eat_digits(is_dec_digit);
                let token = self.token(start, Kind::Float);
                if self.cursor.pos() == exp_start {
                    return token.with_err(ErrCode::InvalidNumericConstant);
                }
                return token;
            }
            return self
                .token(start, Kind::Float)
                .with_err(ErrCode::InvalidNumericConstant);
        }

        let mut token = self.token(start, kind);
        if self.cursor.pos() == digits_start || self.trailing_underscore(start) {
            token = token.with_err(ErrCode::InvalidNumericConstant);
        }
        token
    }

    fn eat_digits(&mut self, pred: impl Fn(u8) -> bool) {
        self.cursor.eat_while(|b| pred(b) || b == b'_');
    }

    fn trailing_underscore(&self, start: u32) -> bool {
        let end = self.cursor.pos();
        end > start && self.cursor.slice(start, end).ends_with('_')
    }

    // ─── Strings ────────────────────────────────────────────────────────

    fn string_open(&mut self, start: u32, cmd: bool) -> RawToken {
        let delim_byte = if cmd { b'`' } else { b'"' };
        let triple =
            self.cursor.peek() == delim_byte && self.cursor.peek2() == delim_byte;
        let delim = match (cmd, triple) {
            (false, false) => Kind::DQuote,
            (false, true) => Kind::TripleDQuote,
            (true, false) => Kind::Backtick,
            (true, true) => Kind::TripleBacktick,
        };
        self.cursor.advance_n(if triple { 3 } else { 1 });

        // A string immediately after an identifier is a string-macro
        // argument (`r"…"`, `var"…"`): raw contents, no interpolation.
        let raw = self.last_kind == Kind::Identifier && self.last_end == start;

        self.strings.push(StringState {
            delim,
            raw,
            paren_depth: 0,
            interp_pending: false,
        });
        self.token(start, delim)
    }

    fn scan_string_content(&mut self, state: StringState) -> RawToken {
        let start = self.cursor.pos();
        let delim_byte = state.delim_byte();

        // Closing delimiter directly at the cursor?
        if self.cursor.current() == delim_byte {
            if !state.triple() {
                self.strings.pop();
                return self.single(start, state.delim);
            }
            let run = self.quote_run(delim_byte);
            if run >= 3 {
                // In a run of more than three quotes the *last* three close
                // the string; leading extras are content.
                if run == 3 {
                    self.strings.pop();
                    self.cursor.advance_n(3);
                    return self.token(start, state.delim);
                }
                self.cursor.advance_n(run - 3);
                return self.token(start, state.chunk_kind());
            }
            // Short run: the quotes are content, fall through to chunk scan.
        }

        // Interpolation entry?
        if self.cursor.current() == b'$' && !state.raw {
            self.cursor.advance();
            let next = self.cursor.current();
            let valid = next == b'(' || is_interp_ident_start(next, &self.cursor);
            let token = self.token(start, Kind::Dollar);
            if valid {
                self.strings.last_mut().expect("string open").interp_pending = true;
                return token;
            }
            return token.with_err(ErrCode::InvalidInterpolationTerminator);
        }

        if self.cursor.is_eof() {
            // Unterminated string: report end of input; the parser emits
            // the missing-delimiter diagnostic.
            self.strings.pop();
            return RawToken::new(Kind::EndMarker, Span::point(start));
        }

        // Text chunk: scan to the next interesting byte.
        loop {
            let b = self.cursor.skip_to_string_delim(delim_byte);
            match b {
                0 => break,
                b'\\' => {
                    // An escape never terminates a chunk; skip the pair so
                    // `\"` and `\\` stay inside. Raw strings keep the same
                    // skip rule (backslash-delimiter runs are resolved by
                    // the decoder).
                    self.cursor.advance();
                    if !self.cursor.is_eof() {
                        self.cursor.advance_char();
                    }
                }
                b'$' => {
                    if state.raw {
                        self.cursor.advance();
                        continue;
                    }
                    break;
                }
                _ if b == delim_byte => {
                    if !state.triple() {
                        break;
                    }
                    let run = self.quote_run(delim_byte);
                    if run >= 3 {
                        break;
                    }
                    self.cursor.advance_n(run);
                }
                _ => unreachable!("skip_to_string_delim stops only at delim, backslash, or $"),
            }
        }
        self.token(start, state.chunk_kind())
    }

    /// Length of the run of `byte` at the cursor.
    fn quote_run(&self, byte: u8) -> u32 {
        let mut probe = self.cursor;
        let start = probe.pos();
        probe.eat_while(|b| b == byte);
        probe.pos() - start
    }

    // ─── Char literal / adjoint ─────────────────────────────────────────

    fn quote_or_char(&mut self, start: u32) -> RawToken {
        // `'` directly after an operand is the adjoint operator.
        if self.last_kind.closes_operand() && self.last_end == start {
            return self.single(start, Kind::Prime);
        }
        self.cursor.advance(); // opening '
        loop {
            match self.cursor.current() {
                b'\'' => {
                    self.cursor.advance();
                    return self.token(start, Kind::Char);
                }
                b'\\' => {
                    self.cursor.advance();
                    if !self.cursor.is_eof() {
                        self.cursor.advance_char();
                    }
                }
                b'\n' => {
                    return self.token(start, Kind::Char).with_err(ErrCode::EofChar);
                }
                0 if self.cursor.is_eof() => {
                    return self.token(start, Kind::Char).with_err(ErrCode::EofChar);
                }
                _ => self.cursor.advance_char(),
            }
        }
    }

    // ─── Parens (interpolation-aware) ───────────────────────────────────

    fn left_paren(&mut self, start: u32) -> RawToken {
        if let Some(state) = self.strings.last_mut() {
            if state.paren_depth > 0 {
                state.paren_depth += 1;
            }
        }
        self.single(start, Kind::LParen)
    }

    fn right_paren(&mut self, start: u32) -> RawToken {
        if let Some(state) = self.strings.last_mut() {
            if state.paren_depth > 0 {
                state.paren_depth -= 1;
            }
        }
        self.single(start, Kind::RParen)
    }

    // ─── Operators ──────────────────────────────────────────────────────

    /// `.`: field access, ranges, splat, leading-dot floats, or a dotted
    /// (broadcast) operator.
    fn dot(&mut self, start: u32) -> RawToken {
        if self.cursor.peek().is_ascii_digit() {
            // Leading-dot float: `.5`
            self.cursor.advance();
            self.eat_digits(is_dec_digit);
            if matches!(self.cursor.current(), b'e' | b'E' | b'f' | b'F')
                && (self.cursor.peek().is_ascii_digit()
                    || (matches!(self.cursor.peek(), b'+' | b'-')
                        && self.cursor.peek2().is_ascii_digit()))
            {
                self.cursor.advance();
                if matches!(self.cursor.current(), b'+' | b'-') {
                    self.cursor.advance();
                }
                self.eat_digits(is_dec_digit);
            }
            let mut token = self.token(start, Kind::Float);
            if self.trailing_underscore(start) {
                token = token.with_err(ErrCode::InvalidNumericConstant);
            }
            return token;
        }

        if self.cursor.peek() == b'.' {
            self.cursor.advance_n(2);
            if self.cursor.current() == b'.' {
                self.cursor.advance();
                return self.suffixed(start, RawToken::new(Kind::DotDotDot, Span::default()));
            }
            return self.suffixed(start, RawToken::new(Kind::DotDot, Span::default()));
        }

        // Broadcast dot: `.` followed by an operator character.
        let mut probe = self.cursor;
        probe.advance();
        if is_operator_char(probe.current_char()) {
            self.cursor.advance(); // '.'
            let mut token = self.raw_operator(start);
            token.dotted = true;
            if !token.kind.is_dottable() {
                token.err = ErrCode::InvalidOperator;
            }
            return self.suffixed(start, token);
        }

        self.single(start, Kind::Dot)
    }

    fn operator_or_unknown(&mut self, start: u32) -> RawToken {
        let token = self.raw_operator(start);
        if token.err.is_err() {
            return token;
        }
        self.suffixed(start, token)
    }

    /// Longest-match operator scan. The span on the returned token is
    /// provisional; [`suffixed`](Self::suffixed) finalizes it.
    fn raw_operator(&mut self, start: u32) -> RawToken {
        let kind = match self.cursor.current() {
            b'=' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'=' => {
                        self.cursor.advance();
                        if self.cursor.current() == b'=' {
                            self.cursor.advance();
                            Kind::EqEqEq
                        } else {
                            Kind::EqEq
                        }
                    }
                    b'>' => {
                        self.cursor.advance();
                        Kind::FatArrow
                    }
                    _ => Kind::Eq,
                }
            }
            b'<' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'=' => {
                        self.cursor.advance();
                        Kind::LtEq
                    }
                    b':' => {
                        self.cursor.advance();
                        Kind::Subtype
                    }
                    b'|' => {
                        self.cursor.advance();
                        Kind::LtPipe
                    }
                    b'<' => {
                        self.cursor.advance();
                        if self.cursor.current() == b'=' {
                            self.cursor.advance();
                            Kind::LtLtEq
                        } else {
                            Kind::LtLt
                        }
                    }
                    _ => Kind::Lt,
                }
            }
            b'>' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'=' => {
                        self.cursor.advance();
                        Kind::GtEq
                    }
                    b':' => {
                        self.cursor.advance();
                        Kind::Supertype
                    }
                    b'>' => {
                        self.cursor.advance();
                        match self.cursor.current() {
                            b'=' => {
                                self.cursor.advance();
                                Kind::GtGtEq
                            }
                            b'>' => {
                                self.cursor.advance();
                                if self.cursor.current() == b'=' {
                                    self.cursor.advance();
                                    Kind::GtGtGtEq
                                } else {
                                    Kind::GtGtGt
                                }
                            }
                            _ => Kind::GtGt,
                        }
                    }
                    _ => Kind::Gt,
                }
            }
            b'+' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'=' => {
                        self.cursor.advance();
                        Kind::PlusEq
                    }
                    b'+' => {
                        self.cursor.advance();
                        Kind::PlusPlus
                    }
                    _ => Kind::Plus,
                }
            }
            b'-' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'=' => {
                        self.cursor.advance();
                        Kind::MinusEq
                    }
                    b'>' => {
                        self.cursor.advance();
                        Kind::Arrow
                    }
                    _ => Kind::Minus,
                }
            }
            b'*' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    Kind::StarEq
                } else {
                    Kind::Star
                }
            }
            b'/' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'=' => {
                        self.cursor.advance();
                        Kind::SlashEq
                    }
                    b'/' => {
                        self.cursor.advance();
                        if self.cursor.current() == b'=' {
                            self.cursor.advance();
                            Kind::SlashSlashEq
                        } else {
                            Kind::SlashSlash
                        }
                    }
                    _ => Kind::Slash,
                }
            }
            b'%' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    Kind::PercentEq
                } else {
                    Kind::Percent
                }
            }
            b'^' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    Kind::CaretEq
                } else {
                    Kind::Caret
                }
            }
            b'!' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    if self.cursor.current() == b'=' {
                        self.cursor.advance();
                        Kind::NotEqEq
                    } else {
                        Kind::NotEq
                    }
                } else {
                    Kind::Bang
                }
            }
            b'&' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'&' => {
                        self.cursor.advance();
                        Kind::AndAnd
                    }
                    b'=' => {
                        self.cursor.advance();
                        Kind::AmpEq
                    }
                    _ => Kind::Amp,
                }
            }
            b'|' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'|' => {
                        self.cursor.advance();
                        Kind::OrOr
                    }
                    b'=' => {
                        self.cursor.advance();
                        Kind::PipeEq
                    }
                    b'>' => {
                        self.cursor.advance();
                        Kind::PipeGt
                    }
                    _ => Kind::Pipe,
                }
            }
            b'~' => {
                self.cursor.advance();
                Kind::Tilde
            }
            b'?' => {
                self.cursor.advance();
                Kind::Question
            }
            b':' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b':' => {
                        self.cursor.advance();
                        Kind::ColonColon
                    }
                    b'=' => {
                        self.cursor.advance();
                        Kind::ColonEq
                    }
                    _ => Kind::Colon,
                }
            }
            0x80.. => return self.unicode_operator(start),
            _ => {
                // Unclassifiable byte.
                self.cursor.advance();
                return self
                    .token(start, Kind::Error)
                    .with_err(ErrCode::Unknown);
            }
        };
        self.token(start, kind)
    }

    fn unicode_operator(&mut self, start: u32) -> RawToken {
        let c = self.cursor.current_char();
        let kind = match c {
            '≤' => Kind::LtEq,
            '≥' => Kind::GtEq,
            '≠' => Kind::NotEq,
            '∈' => Kind::ElementOf,
            '∉' => Kind::NotElementOf,
            '∪' => Kind::Union,
            '∩' => Kind::Intersect,
            '±' => Kind::PlusMinus,
            '⊻' => Kind::Xor,
            '÷' => Kind::IntDiv,
            '×' => Kind::Times,
            '√' => Kind::Sqrt,
            _ => {
                if unicode_ident::is_xid_start(c) {
                    self.cursor.advance_char();
                    self.eat_ident_continue();
                    let text = self.cursor.slice(start, self.cursor.pos());
                    let kind = keyword(text).unwrap_or(Kind::Identifier);
                    return self.token(start, kind);
                }
                self.cursor.advance_char();
                return self
                    .token(start, Kind::Error)
                    .with_err(ErrCode::Unknown);
            }
        };
        // `÷=` and `⊻=` updating forms.
        self.cursor.advance_char();
        if self.cursor.current() == b'=' && self.cursor.peek() != b'=' {
            match kind {
                Kind::IntDiv => {
                    self.cursor.advance();
                    return self.token(start, Kind::IntDivEq);
                }
                Kind::Xor => {
                    self.cursor.advance();
                    return self.token(start, Kind::XorEq);
                }
                _ => {}
            }
        }
        self.token(start, kind)
    }

    /// Absorb trailing sub/superscript characters on suffixable operators.
    fn suffixed(&mut self, start: u32, mut token: RawToken) -> RawToken {
        if is_suffixable(token.kind) {
            let mut saw = false;
            loop {
                let c = self.cursor.current_char();
                if self.cursor.current() >= 0x80 && is_op_suffix_char(c) {
                    self.cursor.advance_char();
                    saw = true;
                } else {
                    break;
                }
            }
            if saw {
                token.suffixed = true;
            }
        }
        token.span = Span::new(start, self.cursor.pos());
        token
    }
}

// ─── Character classes ──────────────────────────────────────────────────

fn is_dec_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

fn is_oct_digit(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

fn is_bin_digit(b: u8) -> bool {
    b == b'0' || b == b'1'
}

/// Characters that can begin an operator reachable through a broadcast dot.
fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '=' | '<'
            | '>'
            | '+'
            | '-'
            | '*'
            | '/'
            | '%'
            | '^'
            | '!'
            | '&'
            | '|'
            | '~'
            | '≤'
            | '≥'
            | '≠'
            | '∈'
            | '∉'
            | '∪'
            | '∩'
            | '±'
            | '⊻'
            | '÷'
            | '×'
            | '√'
    )
}

/// Identifier-start check for `$x` interpolation, byte-level first.
fn is_interp_ident_start(b: u8, cursor: &Cursor<'_>) -> bool {
    match b {
        b'a'..=b'z' | b'A'..=b'Z' | b'_' => true,
        0x80.. => unicode_ident::is_xid_start(cursor.current_char()),
        _ => false,
    }
}

/// Operators that may carry Unicode sub/superscript suffixes.
fn is_suffixable(kind: Kind) -> bool {
    kind.is_prec_comparison()
        || kind.is_prec_additive()
        || kind.is_prec_multiplicative()
        || kind.is_prec_shift()
        || matches!(kind, Kind::Caret | Kind::SlashSlash)
}

/// Unicode sub/superscript characters that extend operator names.
fn is_op_suffix_char(c: char) -> bool {
    matches!(c,
        '\u{00B2}' | '\u{00B3}' | '\u{00B9}'        // ² ³ ¹
        | '\u{2032}'..='\u{2037}' | '\u{2057}'      // primes
        | '\u{2070}'..='\u{209C}'                   // superscripts & subscripts
    )
}

/// Tokenize a source string and collect all tokens, excluding the final
/// `EndMarker`.
pub fn tokenize(source: &str) -> Vec<RawToken> {
    let buffer = SourceBuffer::new(source);
    let mut lexer = Lexer::new(&buffer);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        if token.kind == Kind::EndMarker {
            break;
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Kind> {
        tokenize(source).iter().map(|t| t.kind).collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokenize(source)
            .iter()
            .map(|t| source[t.span.to_range()].to_string())
            .collect()
    }

    #[test]
    fn tokens_tile_the_source() {
        let sources = [
            "",
            "x",
            "a + b",
            "f(x) = 2x^2 .+ y'",
            "\"interp $(a + b) done\"",
            "\"\"\"\n  multi\n  line\n  \"\"\"",
            "# comment\n#= nested #= deeper =# =#\n",
            "[1 2; 3 4]",
            "x .≤ y₁",
        ];
        for source in sources {
            let tokens = tokenize(source);
            let mut pos = 0u32;
            for token in &tokens {
                assert_eq!(token.span.start, pos, "gap in {source:?}");
                pos = token.span.end;
            }
            assert_eq!(pos as usize, source.len(), "coverage of {source:?}");
        }
    }

    #[test]
    fn end_marker_is_idempotent() {
        let buffer = SourceBuffer::new("x");
        let mut lexer = Lexer::new(&buffer);
        assert_eq!(lexer.next_token().kind, Kind::Identifier);
        for _ in 0..4 {
            let token = lexer.next_token();
            assert_eq!(token.kind, Kind::EndMarker);
            assert!(token.span.is_empty());
        }
    }

    #[test]
    fn whitespace_coalesces() {
        assert_eq!(kinds("  \t "), vec![Kind::Whitespace]);
        assert_eq!(kinds(" \n "), vec![Kind::NewlineWs]);
        assert_eq!(kinds("\r\n"), vec![Kind::NewlineWs]);
        assert_eq!(kinds("a \t b"), vec![Kind::Identifier, Kind::Whitespace, Kind::Identifier]);
    }

    #[test]
    fn comments() {
        assert_eq!(kinds("# hi"), vec![Kind::Comment]);
        assert_eq!(kinds("#= a #= b =# c =#"), vec![Kind::Comment]);
        let tokens = tokenize("#= open");
        assert_eq!(tokens[0].kind, Kind::Comment);
        assert_eq!(tokens[0].err, ErrCode::EofMultiComment);
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(kinds("if x end"), vec![
            Kind::If,
            Kind::Whitespace,
            Kind::Identifier,
            Kind::Whitespace,
            Kind::End,
        ]);
        // Contextual keywords lex as identifiers.
        assert_eq!(kinds("mutable"), vec![Kind::Identifier]);
        assert_eq!(kinds("outer"), vec![Kind::Identifier]);
        // `!` is part of the identifier unless it begins `!=`.
        assert_eq!(texts("push!(a)"), vec!["push!", "(", "a", ")"]);
        assert_eq!(kinds("a!=b"), vec![Kind::Identifier, Kind::NotEq, Kind::Identifier]);
    }

    #[test]
    fn unicode_identifiers() {
        assert_eq!(kinds("αβ = 1"), vec![
            Kind::Identifier,
            Kind::Whitespace,
            Kind::Eq,
            Kind::Whitespace,
            Kind::Integer,
        ]);
        assert_eq!(kinds("x₁"), vec![Kind::Identifier]);
    }

    #[test]
    fn numbers() {
        assert_eq!(kinds("42"), vec![Kind::Integer]);
        assert_eq!(kinds("1_000"), vec![Kind::Integer]);
        assert_eq!(kinds("0xFF"), vec![Kind::HexInt]);
        assert_eq!(kinds("0o755"), vec![Kind::OctInt]);
        assert_eq!(kinds("0b1010"), vec![Kind::BinInt]);
        assert_eq!(kinds("3.5"), vec![Kind::Float]);
        assert_eq!(kinds("2.5e10"), vec![Kind::Float]);
        assert_eq!(kinds("1e-3"), vec![Kind::Float]);
        assert_eq!(kinds("2.5f2"), vec![Kind::Float]);
        assert_eq!(kinds(".5"), vec![Kind::Float]);
        assert_eq!(kinds("0x1.8p3"), vec![Kind::Float]);
    }

    #[test]
    fn hex_maximal_munch_respects_digits() {
        // `0xenomorph`: `e` is a hex digit, `n` is not.
        assert_eq!(texts("0xenomorph"), vec!["0xe", "nomorph"]);
        assert_eq!(kinds("0xenomorph"), vec![Kind::HexInt, Kind::Identifier]);
    }

    #[test]
    fn numeric_errors() {
        let tokens = tokenize("100_");
        assert_eq!(tokens[0].err, ErrCode::InvalidNumericConstant);
        let tokens = tokenize("0x");
        assert_eq!(tokens[0].err, ErrCode::InvalidNumericConstant);
        // `1end` is a juxtaposition, not an error.
        assert_eq!(kinds("1end"), vec![Kind::Integer, Kind::End]);
        // Exponent without digits leaves the `e` to the next token.
        assert_eq!(kinds("1e"), vec![Kind::Integer, Kind::Identifier]);
    }

    #[test]
    fn range_does_not_eat_float_dot() {
        assert_eq!(kinds("1..2"), vec![Kind::Integer, Kind::DotDot, Kind::Integer]);
        assert_eq!(kinds("1...x"), vec![Kind::Integer, Kind::DotDotDot, Kind::Identifier]);
    }

    #[test]
    fn operators() {
        assert_eq!(kinds("a == b"), vec![
            Kind::Identifier,
            Kind::Whitespace,
            Kind::EqEq,
            Kind::Whitespace,
            Kind::Identifier,
        ]);
        assert_eq!(kinds("==="), vec![Kind::EqEqEq]);
        assert_eq!(kinds("!=="), vec![Kind::NotEqEq]);
        assert_eq!(kinds("<:"), vec![Kind::Subtype]);
        assert_eq!(kinds(">:"), vec![Kind::Supertype]);
        assert_eq!(kinds(">>>="), vec![Kind::GtGtGtEq]);
        assert_eq!(kinds("|>"), vec![Kind::PipeGt]);
        assert_eq!(kinds("=>"), vec![Kind::FatArrow]);
        assert_eq!(kinds("->"), vec![Kind::Arrow]);
        assert_eq!(kinds("::"), vec![Kind::ColonColon]);
        assert_eq!(kinds(":="), vec![Kind::ColonEq]);
        assert_eq!(kinds("//"), vec![Kind::SlashSlash]);
        assert_eq!(kinds("//="), vec![Kind::SlashSlashEq]);
    }

    #[test]
    fn unicode_operators() {
        assert_eq!(kinds("a ≤ b"), vec![
            Kind::Identifier,
            Kind::Whitespace,
            Kind::LtEq,
            Kind::Whitespace,
            Kind::Identifier,
        ]);
        assert_eq!(kinds("∈"), vec![Kind::ElementOf]);
        assert_eq!(kinds("÷="), vec![Kind::IntDivEq]);
        assert_eq!(kinds("⊻"), vec![Kind::Xor]);
    }

    #[test]
    fn dotted_operators() {
        let tokens = tokenize(".+");
        assert_eq!(tokens[0].kind, Kind::Plus);
        assert!(tokens[0].dotted);
        assert_eq!(tokens[0].span, Span::new(0, 2));

        let tokens = tokenize("a .= b");
        assert_eq!(tokens[2].kind, Kind::Eq);
        assert!(tokens[2].dotted);

        let tokens = tokenize(".==");
        assert_eq!(tokens[0].kind, Kind::EqEq);
        assert!(tokens[0].dotted);

        // `.` alone is field access.
        let tokens = tokenize("a.b");
        assert_eq!(tokens[1].kind, Kind::Dot);
        assert!(!tokens[1].dotted);
    }

    #[test]
    fn invalid_dotted_operator() {
        let tokens = tokenize(".->");
        assert_eq!(tokens[0].kind, Kind::Arrow);
        assert!(tokens[0].dotted);
        assert_eq!(tokens[0].err, ErrCode::InvalidOperator);
    }

    #[test]
    fn suffixed_operators() {
        let tokens = tokenize("a +₁ b");
        assert_eq!(tokens[2].kind, Kind::Plus);
        assert!(tokens[2].suffixed);
        assert_eq!(&"a +₁ b"[tokens[2].span.to_range()], "+₁");

        let tokens = tokenize("x ⊻² y");
        assert_eq!(tokens[2].kind, Kind::Xor);
        assert!(tokens[2].suffixed);
    }

    #[test]
    fn plain_string_pieces() {
        assert_eq!(kinds(r#""hi""#), vec![Kind::DQuote, Kind::StringChunk, Kind::DQuote]);
        assert_eq!(kinds(r#""""#), vec![Kind::DQuote, Kind::DQuote]);
        // Escaped quote stays inside.
        assert_eq!(kinds(r#""a\"b""#), vec![Kind::DQuote, Kind::StringChunk, Kind::DQuote]);
    }

    #[test]
    fn string_interpolation_pieces() {
        assert_eq!(kinds(r#""a$x b""#), vec![
            Kind::DQuote,
            Kind::StringChunk,
            Kind::Dollar,
            Kind::Identifier,
            Kind::StringChunk,
            Kind::DQuote,
        ]);
        assert_eq!(kinds(r#""$(a + b)""#), vec![
            Kind::DQuote,
            Kind::Dollar,
            Kind::LParen,
            Kind::Identifier,
            Kind::Whitespace,
            Kind::Plus,
            Kind::Whitespace,
            Kind::Identifier,
            Kind::RParen,
            Kind::DQuote,
        ]);
    }

    #[test]
    fn nested_string_in_interpolation() {
        assert_eq!(kinds(r#""a$(f("x"))b""#), vec![
            Kind::DQuote,
            Kind::StringChunk,
            Kind::Dollar,
            Kind::LParen,
            Kind::Identifier,
            Kind::LParen,
            Kind::DQuote,
            Kind::StringChunk,
            Kind::DQuote,
            Kind::RParen,
            Kind::RParen,
            Kind::StringChunk,
            Kind::DQuote,
        ]);
    }

    #[test]
    fn invalid_interpolation() {
        let tokens = tokenize(r#""$ x""#);
        let dollar = tokens.iter().find(|t| t.kind == Kind::Dollar).expect("dollar");
        assert_eq!(dollar.err, ErrCode::InvalidInterpolationTerminator);
    }

    #[test]
    fn triple_string_pieces() {
        assert_eq!(kinds("\"\"\"\n a\n \"\"\""), vec![
            Kind::TripleDQuote,
            Kind::StringChunk,
            Kind::TripleDQuote,
        ]);
        // Single quotes inside a triple string are content.
        assert_eq!(kinds("\"\"\"a \" b\"\"\""), vec![
            Kind::TripleDQuote,
            Kind::StringChunk,
            Kind::TripleDQuote,
        ]);
    }

    #[test]
    fn quad_quote_leaves_content() {
        // `""""x""""`: first extra quote is content of the opening run?
        // No: triple-open, then content `x`, then four closing quotes —
        // the first is content, the last three close.
        let tokens = tokenize("\"\"\"x\"\"\"\"");
        let kinds: Vec<Kind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds[0], Kind::TripleDQuote);
        assert_eq!(*kinds.last().expect("nonempty"), Kind::TripleDQuote);
        let text: String = tokens
            .iter()
            .filter(|t| t.kind == Kind::StringChunk)
            .map(|t| &"\"\"\"x\"\"\"\""[t.span.to_range()])
            .collect();
        assert_eq!(text, "x\"");
    }

    #[test]
    fn command_strings() {
        assert_eq!(kinds("`ls -l`"), vec![Kind::Backtick, Kind::CmdChunk, Kind::Backtick]);
        assert_eq!(kinds("`echo $x`"), vec![
            Kind::Backtick,
            Kind::CmdChunk,
            Kind::Dollar,
            Kind::Identifier,
            Kind::Backtick,
        ]);
    }

    #[test]
    fn string_macro_is_raw() {
        // After an adjacent identifier, `$` and escapes are plain content.
        assert_eq!(kinds(r#"r"a$b""#), vec![
            Kind::Identifier,
            Kind::DQuote,
            Kind::StringChunk,
            Kind::DQuote,
        ]);
        assert_eq!(kinds(r#"var"x""#), vec![
            Kind::Identifier,
            Kind::DQuote,
            Kind::StringChunk,
            Kind::DQuote,
        ]);
    }

    #[test]
    fn char_literals() {
        assert_eq!(kinds("'a'"), vec![Kind::Char]);
        assert_eq!(kinds(r"'\n'"), vec![Kind::Char]);
        assert_eq!(kinds("'λ'"), vec![Kind::Char]);
        let tokens = tokenize("'a");
        assert_eq!(tokens[0].kind, Kind::Char);
        assert_eq!(tokens[0].err, ErrCode::EofChar);
    }

    #[test]
    fn adjoint_after_operand() {
        assert_eq!(kinds("a'"), vec![Kind::Identifier, Kind::Prime]);
        assert_eq!(kinds("(a)'"), vec![
            Kind::LParen,
            Kind::Identifier,
            Kind::RParen,
            Kind::Prime,
        ]);
        // With a space it's a char literal again.
        assert_eq!(kinds("a 'b'"), vec![
            Kind::Identifier,
            Kind::Whitespace,
            Kind::Char,
        ]);
    }

    #[test]
    fn unterminated_string_hits_end_marker() {
        let buffer = SourceBuffer::new("\"abc");
        let mut lexer = Lexer::new(&buffer);
        assert_eq!(lexer.next_token().kind, Kind::DQuote);
        assert_eq!(lexer.next_token().kind, Kind::StringChunk);
        assert_eq!(lexer.next_token().kind, Kind::EndMarker);
        assert_eq!(lexer.next_token().kind, Kind::EndMarker);
    }

    #[test]
    fn unknown_byte_is_error_token() {
        let tokens = tokenize("a § b");
        let err = tokens.iter().find(|t| t.kind == Kind::Error).expect("error token");
        assert_eq!(err.err, ErrCode::Unknown);
    }

    #[test]
    fn semicolons_stay_single() {
        assert_eq!(kinds(";;"), vec![Kind::Semicolon, Kind::Semicolon]);
    }
}
