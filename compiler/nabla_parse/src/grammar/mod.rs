//! Recursive-descent grammar productions.
//!
//! The productions are clients of the [`ParseStream`]: they only peek and
//! bump tokens and emit events — no tree is built here. Error recovery is
//! localized: missing pieces become zero-width `error` events, stray
//! tokens are wrapped in `error` nodes, and every production leaves the
//! stream at a token boundary.

mod expr;

#[cfg(test)]
mod tests;

use nabla_syntax::{contextual_keyword, Kind, NodeFlags};

use crate::stream::ParseStream;

use expr::{parse_eq, parse_iteration};

/// Immutable parse context threaded through the productions.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Ctx {
    /// Newline policy for infix-continuation peeks. Operand positions
    /// always skip newlines; continuations honor this flag.
    pub skip_nl: bool,
    /// Inside an array literal: whitespace separates elements, so an
    /// additive operator with space before and none after starts a new
    /// element.
    pub space_sensitive: bool,
    /// A bare comma list builds a tuple (statement positions only).
    pub comma_tuple: bool,
    /// Inside a ternary then-branch: `:` is the branch separator, not a
    /// range operator.
    pub no_range_colon: bool,
    /// Inside indexing brackets: `end` is the last-index keyword, usable
    /// as an operand.
    pub end_ok: bool,
}

impl Ctx {
    pub fn stmt() -> Ctx {
        Ctx {
            skip_nl: false,
            space_sensitive: false,
            comma_tuple: true,
            no_range_colon: false,
            end_ok: false,
        }
    }

    pub fn paren() -> Ctx {
        Ctx {
            skip_nl: true,
            space_sensitive: false,
            comma_tuple: false,
            no_range_colon: false,
            end_ok: false,
        }
    }

    pub fn array() -> Ctx {
        Ctx {
            skip_nl: false,
            space_sensitive: true,
            comma_tuple: false,
            no_range_colon: false,
            end_ok: false,
        }
    }
}

/// Source text of a token still in the lookahead.
pub(crate) fn peek_text<'a>(p: &mut ParseStream<'a>, n: usize, skip_nl: bool) -> &'a str {
    let token = p.peek_token(n, skip_nl);
    &p.source()[token.span().to_range()]
}

/// Kinds that terminate a block body.
fn ends_block(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::End
            | Kind::Elseif
            | Kind::Else
            | Kind::Catch
            | Kind::Finally
            | Kind::EndMarker
            | Kind::RParen
            | Kind::RBracket
            | Kind::RBrace
    )
}

/// Parse the whole input into one `toplevel` event.
pub fn parse_toplevel(p: &mut ParseStream<'_>) {
    let mark = p.position();
    loop {
        p.bump_trivia(true);
        if p.peek(1, true) == Kind::EndMarker {
            break;
        }
        parse_toplevel_item(p);
    }
    p.bump_trivia(true);
    p.emit(mark, Kind::Toplevel, NodeFlags::NONE);
}

/// One newline-separated toplevel item; semicolon-joined statements are
/// grouped into a `block` carrying the toplevel-semicolon flag.
fn parse_toplevel_item(p: &mut ParseStream<'_>) {
    let mark = p.position();
    parse_stmt(p);
    if p.peek(1, false) != Kind::Semicolon {
        return;
    }
    loop {
        if p.peek(1, false) == Kind::Semicolon {
            p.bump(NodeFlags::NONE, false);
            continue;
        }
        match p.peek(1, false) {
            Kind::NewlineWs | Kind::EndMarker => break,
            _ => parse_stmt(p),
        }
    }
    p.emit(mark, Kind::Block, NodeFlags::TOPLEVEL_SEMI);
}

/// One statement: an expression at statement context.
pub(crate) fn parse_stmt(p: &mut ParseStream<'_>) {
    parse_eq(p, Ctx::stmt());
}

/// Statements until a block terminator; emits a `block` event (zero-width
/// when empty).
pub(crate) fn parse_block(p: &mut ParseStream<'_>) {
    let mark = p.position();
    parse_block_body(p);
    p.emit(mark, Kind::Block, NodeFlags::NONE);
}

fn parse_block_body(p: &mut ParseStream<'_>) {
    loop {
        p.bump_trivia(true);
        if ends_block(p.peek(1, true)) {
            break;
        }
        parse_stmt(p);
        while p.peek(1, false) == Kind::Semicolon {
            p.bump(NodeFlags::NONE, false);
        }
    }
}

/// Expect and consume `end`; recover with an error event and diagnostic
/// when it is missing.
pub(crate) fn expect_end(p: &mut ParseStream<'_>, what: &str) {
    if p.peek(1, true) == Kind::End {
        p.bump(NodeFlags::NONE, true);
    } else {
        let mark = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(mark, &format!("expected `end` to close {what}"));
    }
}

// ─── Keyword constructs ─────────────────────────────────────────────────
//
// All of these are reached from the expression grammar's atom dispatch,
// so `x = if cond … end` works without special cases.

pub(crate) fn parse_if(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // if
    parse_condition(p);
    parse_block(p);
    parse_if_rest(p);
    expect_end(p, "`if` block");
    p.emit(mark, Kind::If, NodeFlags::NONE);
}

fn parse_if_rest(p: &mut ParseStream<'_>) {
    match p.peek(1, true) {
        Kind::Elseif => {
            let mark = p.position();
            p.bump(NodeFlags::NONE, true);
            parse_condition(p);
            parse_block(p);
            parse_if_rest(p);
            p.emit(mark, Kind::Elseif, NodeFlags::NONE);
        }
        Kind::Else => {
            p.bump(NodeFlags::NONE, true);
            parse_block(p);
        }
        _ => {}
    }
}

/// An `if`/`while` condition; a missing condition (e.g. `if end`) leaves
/// a zero-width error event.
fn parse_condition(p: &mut ParseStream<'_>) {
    if matches!(p.peek(1, true), Kind::End | Kind::EndMarker) {
        let mark = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(mark, "missing condition");
        return;
    }
    let mut ctx = Ctx::stmt();
    ctx.comma_tuple = false;
    parse_eq(p, ctx);
}

pub(crate) fn parse_while(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    parse_condition(p);
    parse_block(p);
    expect_end(p, "`while` block");
    p.emit(mark, Kind::While, NodeFlags::NONE);
}

pub(crate) fn parse_for(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    parse_iteration(p);
    parse_block(p);
    expect_end(p, "`for` block");
    p.emit(mark, Kind::For, NodeFlags::NONE);
}

pub(crate) fn parse_let(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // let
    let bindings = p.position();
    if !matches!(p.peek(1, false), Kind::NewlineWs | Kind::Semicolon | Kind::EndMarker) {
        let mut ctx = Ctx::stmt();
        ctx.comma_tuple = false;
        parse_eq(p, ctx);
        while p.peek(1, false) == Kind::Comma {
            p.bump(NodeFlags::NONE, false);
            parse_eq(p, ctx);
        }
    }
    p.emit(bindings, Kind::Block, NodeFlags::NONE);
    parse_block(p);
    expect_end(p, "`let` block");
    p.emit(mark, Kind::Let, NodeFlags::NONE);
}

/// `begin … end` is a plain block.
pub(crate) fn parse_begin(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    parse_block_body(p);
    expect_end(p, "`begin` block");
    p.emit(mark, Kind::Block, NodeFlags::NONE);
}

pub(crate) fn parse_quote_block(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    parse_block(p);
    expect_end(p, "`quote` block");
    p.emit(mark, Kind::Quote, NodeFlags::NONE);
}

pub(crate) fn parse_function(p: &mut ParseStream<'_>, kind: Kind) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // function / macro
    let mut ctx = Ctx::stmt();
    ctx.comma_tuple = false;
    parse_eq(p, ctx); // signature
    parse_block(p);
    expect_end(p, "definition");
    p.emit(mark, kind, NodeFlags::NONE);
}

pub(crate) fn parse_struct(p: &mut ParseStream<'_>, mutable: bool) {
    let mark = p.position();
    let mut flags = NodeFlags::NONE;
    if mutable {
        p.bump_remap(Kind::Mutable, NodeFlags::NONE, true);
        flags = flags | NodeFlags::MUTABLE;
    }
    p.bump(NodeFlags::NONE, true); // struct
    let mut ctx = Ctx::stmt();
    ctx.comma_tuple = false;
    parse_eq(p, ctx); // Name{T} <: Super
    parse_block(p);
    expect_end(p, "`struct` definition");
    p.emit(mark, Kind::Struct, flags);
}

/// `abstract type T end` / `primitive type T n end`. The leading words
/// are contextual keywords resolved by remapping.
pub(crate) fn parse_type_decl(p: &mut ParseStream<'_>, kind: Kind) {
    let mark = p.position();
    p.bump_remap(kind, NodeFlags::NONE, true); // abstract / primitive
    p.bump_remap(Kind::Type, NodeFlags::NONE, true); // type
    let mut ctx = Ctx::stmt();
    ctx.comma_tuple = false;
    parse_eq(p, ctx);
    if kind == Kind::Primitive {
        // Bit width.
        if p.peek(1, true).is_number() {
            p.bump(NodeFlags::NONE, true);
        } else {
            let mark2 = p.position();
            p.bump_invisible(Kind::Error, NodeFlags::NONE);
            p.diagnostic_at_mark(mark2, "expected bit count for primitive type");
        }
    }
    expect_end(p, "type declaration");
    p.emit(mark, kind, NodeFlags::NONE);
}

pub(crate) fn parse_module(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    if p.peek(1, true) == Kind::Identifier {
        p.bump(NodeFlags::NONE, true);
    } else {
        let mark2 = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(mark2, "expected module name");
    }
    parse_block(p);
    expect_end(p, "`module` block");
    p.emit(mark, Kind::Module, NodeFlags::NONE);
}

pub(crate) fn parse_try(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // try
    parse_block(p);
    if p.peek(1, true) == Kind::Catch {
        p.bump(NodeFlags::NONE, true);
        // Optional exception binding on the same line.
        if p.peek(1, false) == Kind::Identifier {
            p.bump(NodeFlags::NONE, false);
        }
        parse_block(p);
    }
    if p.peek(1, true) == Kind::Else {
        if !p.version().allows(nabla_syntax::GrammarVersion::TRY_ELSE) {
            p.diagnostic_at_next(true, "`try`/`else` requires a newer grammar version");
        }
        p.bump(NodeFlags::NONE, true);
        parse_block(p);
    }
    if p.peek(1, true) == Kind::Finally {
        p.bump(NodeFlags::NONE, true);
        parse_block(p);
    }
    expect_end(p, "`try` block");
    p.emit(mark, Kind::Try, NodeFlags::NONE);
}

/// `return`, with an optional value on the same line.
pub(crate) fn parse_return(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    if !matches!(
        p.peek(1, false),
        Kind::NewlineWs | Kind::Semicolon | Kind::EndMarker | Kind::End | Kind::RParen
    ) {
        parse_eq(p, Ctx::stmt());
    }
    p.emit(mark, Kind::Return, NodeFlags::NONE);
}

pub(crate) fn parse_jump(p: &mut ParseStream<'_>, kind: Kind) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    p.emit(mark, kind, NodeFlags::NONE);
}

/// `const` / `global` / `local` declarations.
pub(crate) fn parse_decl_kw(p: &mut ParseStream<'_>, kind: Kind) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    parse_eq(p, Ctx::stmt());
    if kind == Kind::Const {
        let assigned = p
            .peek_behind(true)
            .map_or(false, |h| h.kind == Kind::Eq && h.flags.contains(NodeFlags::INFIX));
        if !assigned && !p.version().allows(nabla_syntax::GrammarVersion::BARE_CONST) {
            p.diagnostic_over(mark, "`const` without assignment requires a newer grammar version");
        }
    }
    p.emit(mark, kind, NodeFlags::NONE);
}

/// `import`/`using` with dotted paths, `:` item lists, and version-gated
/// `as` renaming. Leading `..`/`...` tokens are split into the path dots
/// they stand for.
pub(crate) fn parse_import(p: &mut ParseStream<'_>, kind: Kind) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // import / using
    let list_mark = p.position();
    parse_import_path(p);
    if p.peek(1, false) == Kind::Colon {
        // `import A: b, c` — the list node is headed by the colon.
        p.bump(NodeFlags::INFIX, false);
        parse_import_path(p);
        while p.peek(1, false) == Kind::Comma {
            p.bump(NodeFlags::NONE, false);
            parse_import_path(p);
        }
        p.emit(list_mark, Kind::Colon, NodeFlags::NONE);
    } else {
        while p.peek(1, false) == Kind::Comma {
            p.bump(NodeFlags::NONE, false);
            parse_import_path(p);
        }
    }
    p.emit(mark, kind, NodeFlags::NONE);
}

fn parse_import_path(p: &mut ParseStream<'_>) {
    let mark = p.position();
    // Leading relative-import dots. `..` and `...` lexed as range/splat
    // operators are really stacks of path dots.
    loop {
        match p.peek(1, true) {
            Kind::Dot => p.bump(NodeFlags::NONE, true),
            Kind::DotDot => {
                p.bump_trivia(true);
                p.bump_split(&[
                    (1, Kind::Dot, NodeFlags::NONE),
                    (1, Kind::Dot, NodeFlags::NONE),
                ]);
            }
            Kind::DotDotDot => {
                p.bump_trivia(true);
                p.bump_split(&[
                    (1, Kind::Dot, NodeFlags::NONE),
                    (1, Kind::Dot, NodeFlags::NONE),
                    (1, Kind::Dot, NodeFlags::NONE),
                ]);
            }
            _ => break,
        }
    }
    if p.peek(1, true) == Kind::Identifier {
        p.bump(NodeFlags::NONE, true);
        // Component separators: `.` followed by another name.
        while p.peek(1, false) == Kind::Dot && p.peek(2, false) == Kind::Identifier {
            p.bump(NodeFlags::INFIX, false); // separator dot, elided
            p.bump(NodeFlags::NONE, false);
        }
    } else {
        let mark2 = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(mark2, "expected a module path");
    }
    p.emit(mark, Kind::Dot, NodeFlags::NONE);
    // Version-gated renaming: `import A as B`.
    if p.peek(1, false) == Kind::Identifier && peek_text(p, 1, false) == "as" {
        if !p.version().allows(nabla_syntax::GrammarVersion::IMPORT_AS) {
            p.diagnostic_at_next(false, "`as` renaming requires a newer grammar version");
        }
        p.bump_remap(Kind::As, NodeFlags::INFIX, false);
        if p.peek(1, false) == Kind::Identifier {
            p.bump(NodeFlags::NONE, false);
        }
        p.emit(mark, Kind::As, NodeFlags::INFIX);
    }
}

pub(crate) fn parse_export(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    loop {
        match p.peek(1, false) {
            Kind::Identifier => p.bump(NodeFlags::NONE, false),
            k if k.is_operator() && !k.is_word_operator() => p.bump(NodeFlags::NONE, false),
            _ => {
                p.diagnostic_at_next(false, "expected an exported name");
                break;
            }
        }
        if p.peek(1, false) == Kind::Comma {
            p.bump(NodeFlags::NONE, false);
        } else {
            break;
        }
    }
    p.emit(mark, Kind::Export, NodeFlags::NONE);
}

/// Dispatch for identifiers that begin contextual-keyword constructs.
/// Returns `true` if a construct was parsed.
pub(crate) fn parse_contextual(p: &mut ParseStream<'_>) -> bool {
    let text = peek_text(p, 1, true);
    match contextual_keyword(text) {
        Some(Kind::Mutable) if p.peek(2, true) == Kind::Struct => {
            parse_struct(p, true);
            true
        }
        Some(kind @ (Kind::Abstract | Kind::Primitive))
            if p.peek(2, true) == Kind::Identifier && peek_text(p, 2, true) == "type" =>
        {
            parse_type_decl(p, kind);
            true
        }
        _ => false,
    }
}
