//! The parse stream: lookahead, trivia routing, and event emission.
//!
//! The stream sits between the lexer and the grammar productions. It
//! buffers raw tokens for lookahead, routes trivia (whitespace, comments,
//! and conditionally newlines) around the significant tokens the grammar
//! sees, and records an append-only buffer of [`Event`]s that the tree
//! builder later folds into a CST.
//!
//! Events support retroactive reshaping — [`ParseStream::reset_node`],
//! [`ParseStream::bump_glue`], [`ParseStream::bump_split`],
//! [`ParseStream::bump_invisible`] — which is how the grammar resolves
//! context-sensitive lexical ambiguity without unbounded lookahead.

use std::collections::VecDeque;

use nabla_diagnostic::Diagnostic;
use nabla_lexer::{Lexer, SourceBuffer};
use nabla_syntax::{GrammarVersion, Kind, NodeFlags, RawToken, Span, SyntaxHead, SyntaxToken};

/// One record in the event buffer: a head, the byte range it covers, and
/// the start mark that recovers nesting during the tree fold.
///
/// For a leaf event at buffer index `i`, `start_mark == i + 1`. For an
/// interior event, `start_mark` is the index of the first event it
/// covers; the fold makes every event from there up to (but excluding)
/// the interior event itself a child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub head: SyntaxHead,
    pub span: Span,
    pub start_mark: u32,
}

/// A recorded stream position: the next input byte and the current event
/// count. Passed to [`ParseStream::emit`] to demarcate the start of a
/// composite span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseStreamPosition {
    pub byte: u32,
    pub event_index: u32,
}

/// The only unrecoverable failures in the front-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseFatal {
    /// A production looped without consuming input; the watchdog tripped.
    StuckParser,
    /// The event buffer held several toplevel events and the tree builder
    /// was given no wrapper kind.
    MultipleToplevel,
}

impl std::fmt::Display for ParseFatal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFatal::StuckParser => write!(f, "parser failed to make progress"),
            ParseFatal::MultipleToplevel => {
                write!(f, "multiple toplevel expressions with no wrapper kind")
            }
        }
    }
}

impl std::error::Error for ParseFatal {}

/// Lookahead ceiling between bumps. A grammar production that peeks this
/// many times without consuming a token is stuck.
const MAX_PEEKS_WITHOUT_PROGRESS: u32 = 100_000;

/// A piece of a [`ParseStream::bump_split`]: byte length, new kind, flags.
pub type SplitSpec = (u32, Kind, NodeFlags);

/// The parse stream. Exclusively owned by the running parser; strictly
/// single-threaded.
pub struct ParseStream<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    lookahead: VecDeque<RawToken>,
    events: Vec<Event>,
    diagnostics: Vec<Diagnostic>,
    next_byte: u32,
    peek_count: u32,
    version: GrammarVersion,
    fatal: Option<ParseFatal>,
}

impl<'a> ParseStream<'a> {
    pub fn new(buffer: &'a SourceBuffer, version: GrammarVersion) -> Self {
        ParseStream {
            source: buffer.as_str(),
            lexer: Lexer::new(buffer),
            lookahead: VecDeque::with_capacity(8),
            events: Vec::new(),
            diagnostics: Vec::new(),
            next_byte: 0,
            peek_count: 0,
            version,
            fatal: None,
        }
    }

    /// The source text the stream is parsing.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Grammar version the productions should honor.
    pub fn version(&self) -> GrammarVersion {
        self.version
    }

    /// The fatal error, if the stream aborted.
    pub fn fatal(&self) -> Option<&ParseFatal> {
        self.fatal.as_ref()
    }

    // ─── Lookahead ──────────────────────────────────────────────────────

    fn pull(&mut self) {
        let token = self.lexer.next_token();
        self.lookahead.push_back(token);
    }

    fn token_at(&mut self, index: usize) -> RawToken {
        while index >= self.lookahead.len() {
            self.pull();
        }
        self.lookahead[index]
    }

    fn is_skipped(kind: Kind, skip_newlines: bool) -> bool {
        match kind {
            Kind::Whitespace | Kind::Comment => true,
            Kind::NewlineWs => skip_newlines,
            _ => false,
        }
    }

    /// Lookahead index of the `n`th (1-based) significant token under the
    /// given newline policy.
    fn significant_index(&mut self, n: usize, skip_newlines: bool) -> usize {
        debug_assert!(n >= 1, "lookahead is 1-based");
        let mut remaining = n;
        let mut index = 0usize;
        loop {
            let token = self.token_at(index);
            if !Self::is_skipped(token.kind, skip_newlines) {
                remaining -= 1;
                if remaining == 0 || token.kind == Kind::EndMarker {
                    return index;
                }
            }
            index += 1;
        }
    }

    fn note_peek(&mut self) {
        self.peek_count += 1;
        if self.peek_count > MAX_PEEKS_WITHOUT_PROGRESS && self.fatal.is_none() {
            tracing::debug!("parse stream watchdog tripped at byte {}", self.next_byte);
            self.diagnostics.push(Diagnostic::error(
                Span::point(self.next_byte),
                "parser stuck: no progress after 100000 lookaheads",
            ));
            self.fatal = Some(ParseFatal::StuckParser);
        }
    }

    /// Kind of the `n`th significant token ahead (1-based) without
    /// consuming it.
    ///
    /// After the stuck-parser watchdog trips this pins to `EndMarker` so
    /// drive loops drain; the fatal error surfaces from the entry point.
    pub fn peek(&mut self, n: usize, skip_newlines: bool) -> Kind {
        self.note_peek();
        if self.fatal.is_some() {
            return Kind::EndMarker;
        }
        let index = self.significant_index(n, skip_newlines);
        self.lookahead[index].kind
    }

    /// Full token view of the `n`th significant token ahead, with its
    /// leading-trivia summary.
    pub fn peek_token(&mut self, n: usize, skip_newlines: bool) -> SyntaxToken {
        self.note_peek();
        if self.fatal.is_some() {
            return SyntaxToken {
                raw: RawToken::new(Kind::EndMarker, Span::point(self.next_byte)),
                had_whitespace: false,
                had_newline: false,
            };
        }
        let index = self.significant_index(n, skip_newlines);
        let raw = self.lookahead[index];
        // Trivia between the previous significant token and this one.
        let mut had_whitespace = false;
        let mut had_newline = false;
        for i in (0..index).rev() {
            match self.lookahead[i].kind {
                Kind::Whitespace | Kind::Comment => had_whitespace = true,
                Kind::NewlineWs => {
                    had_whitespace = true;
                    had_newline = true;
                }
                _ => break,
            }
        }
        SyntaxToken {
            raw,
            had_whitespace,
            had_newline,
        }
    }

    /// Head of the most recently emitted event, optionally skipping
    /// trivia events.
    pub fn peek_behind(&self, skip_trivia: bool) -> Option<SyntaxHead> {
        self.events
            .iter()
            .rev()
            .find(|ev| !skip_trivia || !ev.head.flags.contains(NodeFlags::TRIVIA))
            .map(|ev| ev.head)
    }

    /// Compare the source text covered by the event just before `pos`
    /// against a literal string.
    pub fn peek_behind_str(&self, pos: ParseStreamPosition, text: &str) -> bool {
        let Some(index) = pos.event_index.checked_sub(1) else {
            return false;
        };
        let Some(event) = self.events.get(index as usize) else {
            return false;
        };
        &self.source[event.span.to_range()] == text
    }

    // ─── Position ───────────────────────────────────────────────────────

    /// The current stream position: next unconsumed input byte and the
    /// event count. Events emitted after this mark become the children of
    /// a later `emit(mark, …)`.
    pub fn position(&self) -> ParseStreamPosition {
        ParseStreamPosition {
            byte: self.next_byte,
            event_index: u32::try_from(self.events.len()).expect("event count fits in u32"),
        }
    }

    // ─── Emission ───────────────────────────────────────────────────────

    fn push_leaf(&mut self, head: SyntaxHead, span: Span) {
        let index = u32::try_from(self.events.len()).expect("event count fits in u32");
        self.events.push(Event {
            head,
            span,
            start_mark: index + 1,
        });
        self.next_byte = span.end.max(self.next_byte);
    }

    fn flush_one_trivia(&mut self, token: RawToken) {
        self.note_lex_error(token);
        let head = SyntaxHead::new(token.kind, token.head_flags());
        self.push_leaf(head, token.span);
    }

    /// Surface a lexer error as a diagnostic when the token is consumed.
    fn note_lex_error(&mut self, token: RawToken) {
        if token.err.is_err() {
            self.diagnostics
                .push(Diagnostic::error(token.span, token.err.message()));
        }
    }

    /// Consume trivia up to and including the next significant token,
    /// flushing everything into the event buffer.
    ///
    /// `flags` decorate the significant token's event in addition to the
    /// flags implied by the token itself (`TRIVIA`, `DOTOP`, `SUFFIXED`).
    pub fn bump(&mut self, flags: NodeFlags, skip_newlines: bool) {
        self.bump_impl(flags, skip_newlines, None);
    }

    /// [`bump`](Self::bump) with the significant token's kind replaced.
    /// Trivia is unaffected. Used to resolve contextual keywords.
    pub fn bump_remap(&mut self, kind: Kind, flags: NodeFlags, skip_newlines: bool) {
        self.bump_impl(flags, skip_newlines, Some(kind));
    }

    fn bump_impl(&mut self, flags: NodeFlags, skip_newlines: bool, remap: Option<Kind>) {
        self.peek_count = 0;
        loop {
            let token = self.token_at(0);
            if Self::is_skipped(token.kind, skip_newlines) {
                self.lookahead.pop_front();
                self.flush_one_trivia(token);
                continue;
            }
            if token.kind == Kind::EndMarker {
                // Nothing significant to consume.
                return;
            }
            self.lookahead.pop_front();
            self.note_lex_error(token);
            let kind = match remap {
                Some(kind) if kind != Kind::Nothing => kind,
                _ => token.kind,
            };
            let head = SyntaxHead::new(kind, token.head_flags().union(flags));
            self.push_leaf(head, token.span);
            return;
        }
    }

    /// Consume the next significant token and wrap it in an `error` node,
    /// pushing a diagnostic with the given message.
    pub fn bump_error(&mut self, skip_newlines: bool, message: &str) {
        tracing::debug!("error recovery at byte {}: {message}", self.next_byte);
        let mark = self.position();
        self.bump(NodeFlags::NONE, skip_newlines);
        self.emit(mark, Kind::Error, NodeFlags::NONE);
        self.diagnostics.push(Diagnostic::error(
            Span::new(mark.byte, self.next_byte),
            message,
        ));
    }

    /// Flush pending trivia only; the next significant token stays in the
    /// lookahead.
    pub fn bump_trivia(&mut self, skip_newlines: bool) {
        loop {
            let token = self.token_at(0);
            if Self::is_skipped(token.kind, skip_newlines) {
                self.lookahead.pop_front();
                self.flush_one_trivia(token);
            } else {
                return;
            }
        }
    }

    /// Emit a zero-width event at the current position. Used for implicit
    /// tokens (`2x` gets an invisible `*`) and for placeholder error
    /// nodes. Returns the position just after the new event.
    pub fn bump_invisible(&mut self, kind: Kind, flags: NodeFlags) -> ParseStreamPosition {
        self.peek_count = 0;
        let head = SyntaxHead::new(kind, flags);
        self.push_leaf(head, Span::point(self.next_byte));
        self.position()
    }

    /// Merge the next `n` lookahead tokens into one event of the given
    /// kind spanning their byte union. Trivia handling is the caller's
    /// responsibility: the tokens are taken verbatim from the lookahead.
    pub fn bump_glue(&mut self, kind: Kind, flags: NodeFlags, n: usize) -> ParseStreamPosition {
        debug_assert!(n >= 1);
        self.peek_count = 0;
        let first = self.token_at(0);
        let mut span = first.span;
        for i in 1..n {
            span = span.merge(self.token_at(i).span);
        }
        for _ in 0..n {
            let token = self.lookahead.pop_front().expect("lookahead filled above");
            self.note_lex_error(token);
        }
        self.push_leaf(SyntaxHead::new(kind, flags), span);
        self.position()
    }

    /// Take the next lookahead token and emit several events tiling its
    /// byte range. Used for tokens whose lexical identity is grammar
    /// dependent (`...` as three dots in an import path).
    pub fn bump_split(&mut self, splits: &[SplitSpec]) {
        self.peek_count = 0;
        let token = self.token_at(0);
        self.lookahead.pop_front();
        self.note_lex_error(token);
        debug_assert_eq!(
            splits.iter().map(|(len, _, _)| *len).sum::<u32>(),
            token.span.len(),
            "split lengths must tile the token"
        );
        let mut at = token.span.start;
        for &(len, kind, flags) in splits {
            self.push_leaf(SyntaxHead::new(kind, flags), Span::new(at, at + len));
            at += len;
        }
        self.next_byte = token.span.end;
    }

    /// Create an interior event covering everything emitted since `mark`,
    /// declaring it their parent. Returns the position after the new
    /// event (a valid mark for an enclosing `emit`, and the handle
    /// [`reset_node`](Self::reset_node) takes).
    pub fn emit(
        &mut self,
        mark: ParseStreamPosition,
        kind: Kind,
        flags: NodeFlags,
    ) -> ParseStreamPosition {
        let span = Span::new(mark.byte, self.next_byte.max(mark.byte));
        self.events.push(Event {
            head: SyntaxHead::new(kind, flags),
            span,
            start_mark: mark.event_index,
        });
        self.position()
    }

    /// Replace the head of the event emitted just before `pos`.
    ///
    /// Needed where a later token re-types an earlier node without
    /// unbounded lookahead (`a = 1` inside a call becomes a `kw` node).
    pub fn reset_node(
        &mut self,
        pos: ParseStreamPosition,
        kind: Option<Kind>,
        flags: Option<NodeFlags>,
    ) {
        let index = pos.event_index.checked_sub(1).expect("position after an event") as usize;
        let event = &mut self.events[index];
        if let Some(kind) = kind {
            event.head.kind = kind;
        }
        if let Some(flags) = flags {
            event.head.flags = flags;
        }
    }

    // ─── Diagnostics ────────────────────────────────────────────────────

    pub fn emit_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Diagnostic at the next significant token's byte range.
    pub fn diagnostic_at_next(&mut self, skip_newlines: bool, message: &str) {
        let index = self.significant_index(1, skip_newlines);
        let span = self.lookahead[index].span;
        self.diagnostics.push(Diagnostic::error(span, message));
    }

    /// Zero-width diagnostic at a recorded mark.
    pub fn diagnostic_at_mark(&mut self, mark: ParseStreamPosition, message: &str) {
        self.diagnostics
            .push(Diagnostic::error(Span::point(mark.byte), message));
    }

    /// Diagnostic covering everything from `mark` to the current byte.
    pub fn diagnostic_over(&mut self, mark: ParseStreamPosition, message: &str) {
        self.diagnostics.push(Diagnostic::error(
            Span::new(mark.byte, self.next_byte.max(mark.byte)),
            message,
        ));
    }

    // ─── Output ─────────────────────────────────────────────────────────

    /// The event buffer, for the tree builder.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the stream into its event buffer and diagnostics.
    pub fn finish(self) -> (Vec<Event>, Vec<Diagnostic>) {
        (self.events, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_over(buffer: &SourceBuffer) -> ParseStream<'_> {
        ParseStream::new(buffer, GrammarVersion::LATEST)
    }

    #[test]
    fn peek_skips_trivia() {
        let buffer = SourceBuffer::new("a  # note\n b");
        let mut stream = stream_over(&buffer);
        assert_eq!(stream.peek(1, true), Kind::Identifier);
        assert_eq!(stream.peek(2, true), Kind::Identifier);
        assert_eq!(stream.peek(3, true), Kind::EndMarker);
        // Newlines significant: the second identifier hides behind one.
        assert_eq!(stream.peek(2, false), Kind::NewlineWs);
    }

    #[test]
    fn peek_token_summarizes_trivia() {
        let buffer = SourceBuffer::new("a  b\nc");
        let mut stream = stream_over(&buffer);
        let b = stream.peek_token(2, true);
        assert!(b.had_whitespace);
        assert!(!b.had_newline);
        let c = stream.peek_token(3, true);
        assert!(c.had_newline);
    }

    #[test]
    fn bump_flushes_preceding_trivia() {
        let buffer = SourceBuffer::new("  a");
        let mut stream = stream_over(&buffer);
        stream.bump(NodeFlags::NONE, true);
        let events = stream.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].head.kind, Kind::Whitespace);
        assert!(events[0].head.flags.contains(NodeFlags::TRIVIA));
        assert_eq!(events[1].head.kind, Kind::Identifier);
        assert_eq!(events[1].span, Span::new(2, 3));
    }

    #[test]
    fn leaf_events_tile_source() {
        let buffer = SourceBuffer::new("a + b * c");
        let mut stream = stream_over(&buffer);
        while stream.peek(1, true) != Kind::EndMarker {
            stream.bump(NodeFlags::NONE, true);
        }
        stream.bump_trivia(true);
        let mut pos = 0u32;
        for event in stream.events() {
            assert_eq!(event.span.start, pos);
            pos = event.span.end;
        }
        assert_eq!(pos, 9);
    }

    #[test]
    fn bump_remap_changes_kind() {
        let buffer = SourceBuffer::new("mutable");
        let mut stream = stream_over(&buffer);
        stream.bump_remap(Kind::Mutable, NodeFlags::NONE, true);
        assert_eq!(stream.events()[0].head.kind, Kind::Mutable);
    }

    #[test]
    fn bump_invisible_is_zero_width() {
        let buffer = SourceBuffer::new("2x");
        let mut stream = stream_over(&buffer);
        stream.bump(NodeFlags::NONE, true); // 2
        stream.bump_invisible(Kind::Star, NodeFlags::NONE);
        stream.bump(NodeFlags::NONE, true); // x
        let events = stream.events();
        assert_eq!(events[1].head.kind, Kind::Star);
        assert_eq!(events[1].span, Span::point(1));
        assert_eq!(events[2].span, Span::new(1, 2));
    }

    #[test]
    fn bump_glue_merges_tokens() {
        let buffer = SourceBuffer::new(";;");
        let mut stream = stream_over(&buffer);
        stream.bump_glue(Kind::Semicolon, NodeFlags::NONE, 2);
        let events = stream.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].span, Span::new(0, 2));
    }

    #[test]
    fn bump_split_tiles_token() {
        let buffer = SourceBuffer::new("...");
        let mut stream = stream_over(&buffer);
        stream.bump_split(&[
            (1, Kind::Dot, NodeFlags::NONE),
            (1, Kind::Dot, NodeFlags::NONE),
            (1, Kind::Dot, NodeFlags::NONE),
        ]);
        let events = stream.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].span, Span::new(0, 1));
        assert_eq!(events[2].span, Span::new(2, 3));
    }

    #[test]
    fn emit_marks_parentage() {
        let buffer = SourceBuffer::new("a b");
        let mut stream = stream_over(&buffer);
        let mark = stream.position();
        stream.bump(NodeFlags::NONE, true);
        stream.bump(NodeFlags::NONE, true);
        stream.emit(mark, Kind::Block, NodeFlags::NONE);
        let events = stream.events();
        let interior = events.last().expect("emitted");
        assert_eq!(interior.head.kind, Kind::Block);
        assert_eq!(interior.start_mark, 0);
        assert_eq!(interior.span, Span::new(0, 3));
    }

    #[test]
    fn reset_node_edits_event() {
        let buffer = SourceBuffer::new("a");
        let mut stream = stream_over(&buffer);
        let mark = stream.position();
        stream.bump(NodeFlags::NONE, true);
        let pos = stream.emit(mark, Kind::Call, NodeFlags::NONE);
        stream.reset_node(pos, Some(Kind::TupleNode), None);
        assert_eq!(stream.events().last().expect("event").head.kind, Kind::TupleNode);
    }

    #[test]
    fn peek_behind_sees_last_event() {
        let buffer = SourceBuffer::new("a  b");
        let mut stream = stream_over(&buffer);
        stream.bump(NodeFlags::NONE, true);
        stream.bump(NodeFlags::NONE, true);
        // Last event is the identifier b, trivia before it skipped or not.
        assert_eq!(
            stream.peek_behind(true).map(|h| h.kind),
            Some(Kind::Identifier)
        );
    }

    #[test]
    fn peek_behind_str_compares_source() {
        let buffer = SourceBuffer::new("doc x");
        let mut stream = stream_over(&buffer);
        stream.bump(NodeFlags::NONE, true);
        let pos = stream.position();
        assert!(stream.peek_behind_str(pos, "doc"));
        assert!(!stream.peek_behind_str(pos, "dog"));
    }

    #[test]
    fn lex_errors_become_diagnostics_on_bump() {
        let buffer = SourceBuffer::new("100_");
        let mut stream = stream_over(&buffer);
        stream.bump(NodeFlags::NONE, true);
        assert_eq!(stream.diagnostics().len(), 1);
        assert!(stream.diagnostics()[0].message.contains("numeric"));
    }

    #[test]
    fn watchdog_trips_without_progress() {
        let buffer = SourceBuffer::new("a");
        let mut stream = stream_over(&buffer);
        for _ in 0..(MAX_PEEKS_WITHOUT_PROGRESS + 2) {
            let _ = stream.peek(1, true);
        }
        assert_eq!(stream.fatal(), Some(&ParseFatal::StuckParser));
        // Pinned to EndMarker so loops drain.
        assert_eq!(stream.peek(1, true), Kind::EndMarker);
    }

    #[test]
    fn bump_resets_watchdog() {
        let buffer = SourceBuffer::new("a b c");
        let mut stream = stream_over(&buffer);
        for _ in 0..1000 {
            let _ = stream.peek(1, true);
        }
        stream.bump(NodeFlags::NONE, true);
        for _ in 0..1000 {
            let _ = stream.peek(1, true);
        }
        assert!(stream.fatal().is_none());
    }
}
