//! Expression grammar: the precedence tower, postfix forms, and atoms.
//!
//! Each level parses its operands from the level below and emits infix
//! events over a shared mark, so left association falls out of re-emitting
//! over the same mark and right association out of recursion. Operand
//! positions always skip newlines; infix continuation checks honor the
//! context's newline policy so statements still end at line breaks.

use nabla_syntax::{Kind, NodeFlags};

use crate::stream::{ParseStream, ParseStreamPosition};

use super::{
    parse_begin, parse_block, parse_contextual, parse_decl_kw, parse_export, parse_for,
    parse_function, parse_if, parse_import, parse_jump, parse_let, parse_module,
    parse_quote_block, parse_return, parse_struct, parse_try, parse_while, peek_text, Ctx,
};

/// Assignment level: `lhs = rhs` and the updating/broadcast forms,
/// right-associative, with bare-comma tuples on either side in statement
/// positions.
pub(crate) fn parse_eq(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    if ctx.comma_tuple {
        parse_comma(p, ctx);
    } else {
        parse_pair(p, ctx);
    }
    let tok = p.peek_token(1, ctx.skip_nl);
    let kind = tok.kind();
    if kind.is_prec_assignment() {
        let dotted = tok.raw.dotted;
        p.bump(NodeFlags::INFIX, ctx.skip_nl);
        parse_eq(p, ctx);
        let mut flags = NodeFlags::INFIX;
        if dotted {
            flags = flags | NodeFlags::DOTOP;
        }
        p.emit(mark, kind, flags);
    }
}

/// Bare comma tuples: `a, b = c, d` assigns pairwise.
fn parse_comma(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_pair(p, ctx);
    if p.peek(1, ctx.skip_nl) != Kind::Comma {
        return;
    }
    while p.peek(1, ctx.skip_nl) == Kind::Comma {
        p.bump(NodeFlags::NONE, ctx.skip_nl);
        let next = p.peek(1, ctx.skip_nl);
        if next.is_prec_assignment() || is_expr_terminator(next) {
            break;
        }
        parse_pair(p, ctx);
    }
    p.emit(mark, Kind::TupleNode, NodeFlags::NONE);
}

fn is_expr_terminator(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::EndMarker
            | Kind::End
            | Kind::NewlineWs
            | Kind::Semicolon
            | Kind::RParen
            | Kind::RBracket
            | Kind::RBrace
    )
}

/// `a => b`, right-associative.
fn parse_pair(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_cond(p, ctx);
    if p.peek_token(1, ctx.skip_nl).matches(Kind::FatArrow) {
        p.bump(NodeFlags::INFIX, ctx.skip_nl);
        parse_pair(p, ctx);
        p.emit(mark, Kind::FatArrow, NodeFlags::INFIX);
    }
}

/// Ternary conditional. Spacing around `?` is required; a missing space
/// is flagged but the ternary is still recognised.
fn parse_cond(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_arrow(p, ctx);
    let tok = p.peek_token(1, ctx.skip_nl);
    if !tok.matches(Kind::Question) {
        return;
    }
    if !tok.had_whitespace {
        let err = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(err, "space required before `?` in ternary expression");
    }
    p.bump(NodeFlags::NONE, true); // `?`
    let mut branch_ctx = ctx;
    branch_ctx.no_range_colon = true;
    parse_arrow(p, branch_ctx);
    if p.peek(1, true) == Kind::Colon {
        p.bump(NodeFlags::NONE, true); // `:`
        parse_cond(p, ctx);
    } else {
        let err = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(err, "expected `:` in ternary expression");
    }
    p.emit(mark, Kind::If, NodeFlags::NONE);
}

/// `args -> body`, right-associative.
fn parse_arrow(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_or(p, ctx);
    if p.peek_token(1, ctx.skip_nl).matches(Kind::Arrow) {
        p.bump(NodeFlags::INFIX, ctx.skip_nl);
        parse_arrow(p, ctx);
        p.emit(mark, Kind::Arrow, NodeFlags::INFIX);
    }
}

fn parse_or(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_and(p, ctx);
    if p.peek_token(1, ctx.skip_nl).matches(Kind::OrOr) {
        p.bump(NodeFlags::INFIX, ctx.skip_nl);
        parse_or(p, ctx);
        p.emit(mark, Kind::OrOr, NodeFlags::INFIX);
    }
}

fn parse_and(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_comparison(p, ctx);
    if p.peek_token(1, ctx.skip_nl).matches(Kind::AndAnd) {
        p.bump(NodeFlags::INFIX, ctx.skip_nl);
        parse_and(p, ctx);
        p.emit(mark, Kind::AndAnd, NodeFlags::INFIX);
    }
}

fn is_comparison_op(kind: Kind) -> bool {
    kind.is_prec_comparison() || matches!(kind, Kind::In | Kind::Isa)
}

/// Comparison chains fold into one `comparison` node; a single comparison
/// is an ordinary infix call, except `<:`/`>:` which keep their own head.
fn parse_comparison(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_pipe(p, ctx);
    let mut count = 0usize;
    let mut only_op = Kind::Nothing;
    let mut only_op_pos: Option<ParseStreamPosition> = None;
    while is_comparison_op(p.peek(1, ctx.skip_nl)) {
        let kind = p.peek(1, ctx.skip_nl);
        p.bump(NodeFlags::NONE, ctx.skip_nl);
        only_op = kind;
        only_op_pos = Some(p.position());
        parse_pipe(p, ctx);
        count += 1;
    }
    match count {
        0 => {}
        1 if matches!(only_op, Kind::Subtype | Kind::Supertype) => {
            // `(<: a b)`: the operator names the node, so its token is
            // retroactively demoted to a separator.
            if let Some(pos) = only_op_pos {
                p.reset_node(pos, None, Some(NodeFlags::INFIX));
            }
            p.emit(mark, only_op, NodeFlags::INFIX);
        }
        1 => {
            p.emit(mark, Kind::CallInfix, NodeFlags::INFIX);
        }
        _ => {
            p.emit(mark, Kind::Comparison, NodeFlags::NONE);
        }
    }
}

/// `|>` left-associative, `<|` right-associative.
fn parse_pipe(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_range(p, ctx);
    loop {
        let tok = p.peek_token(1, ctx.skip_nl);
        if tok.matches(Kind::PipeGt) {
            p.bump(NodeFlags::NONE, ctx.skip_nl);
            parse_range(p, ctx);
            p.emit(mark, Kind::CallInfix, NodeFlags::INFIX);
        } else if tok.matches(Kind::LtPipe) {
            p.bump(NodeFlags::NONE, ctx.skip_nl);
            parse_pipe(p, ctx);
            p.emit(mark, Kind::CallInfix, NodeFlags::INFIX);
            break;
        } else {
            break;
        }
    }
}

/// Ranges: `a:b`, `a:b:c`, `a..b` — n-ary in one node.
fn parse_range(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_plus(p, ctx);
    let mut any = false;
    loop {
        let tok = p.peek_token(1, ctx.skip_nl);
        let range_colon = tok.matches(Kind::Colon) && !ctx.no_range_colon;
        if range_colon || tok.matches(Kind::DotDot) {
            p.bump(NodeFlags::NONE, ctx.skip_nl);
            parse_plus(p, ctx);
            any = true;
        } else {
            break;
        }
    }
    if any {
        p.emit(mark, Kind::CallInfix, NodeFlags::INFIX);
    }
}

/// Operators that also read as unary signs; in space-sensitive contexts
/// `[a -b]` starts a new element rather than subtracting.
fn reads_as_sign(kind: Kind) -> bool {
    matches!(kind, Kind::Plus | Kind::Minus | Kind::PlusMinus)
}

/// Shared shape of the left-associative arithmetic levels. `chain`
/// selects operators that fold `a + b + c` into a single n-ary node.
fn infix_left(
    p: &mut ParseStream<'_>,
    ctx: Ctx,
    operand: fn(&mut ParseStream<'_>, Ctx),
    is_op: fn(Kind) -> bool,
    chain: fn(Kind) -> bool,
) {
    let mark = p.position();
    operand(p, ctx);
    loop {
        let tok = p.peek_token(1, ctx.skip_nl);
        let kind = tok.kind();
        if !is_op(kind) {
            break;
        }
        if ctx.space_sensitive
            && reads_as_sign(kind)
            && tok.had_whitespace
            && !p.peek_token(2, false).had_whitespace
        {
            break;
        }
        let undecorated = !tok.raw.dotted && !tok.raw.suffixed;
        p.bump(NodeFlags::NONE, ctx.skip_nl);
        operand(p, ctx);
        if undecorated && chain(kind) {
            while p.peek_token(1, ctx.skip_nl).matches(kind) {
                p.bump(NodeFlags::NONE, ctx.skip_nl);
                operand(p, ctx);
            }
        }
        p.emit(mark, Kind::CallInfix, NodeFlags::INFIX);
    }
}

fn parse_plus(p: &mut ParseStream<'_>, ctx: Ctx) {
    infix_left(p, ctx, parse_times, Kind::is_prec_additive, |k| {
        matches!(k, Kind::Plus | Kind::PlusPlus)
    });
}

fn parse_times(p: &mut ParseStream<'_>, ctx: Ctx) {
    infix_left(p, ctx, parse_rational, Kind::is_prec_multiplicative, |k| {
        k == Kind::Star
    });
}

fn parse_rational(p: &mut ParseStream<'_>, ctx: Ctx) {
    infix_left(p, ctx, parse_shift, |k| k == Kind::SlashSlash, |_| false);
}

fn parse_shift(p: &mut ParseStream<'_>, ctx: Ctx) {
    infix_left(p, ctx, parse_unary, Kind::is_prec_shift, |_| false);
}

/// Prefix operators: `(call - x)`.
fn parse_unary(p: &mut ParseStream<'_>, ctx: Ctx) {
    let tok = p.peek_token(1, true);
    let kind = tok.kind();
    if matches!(
        kind,
        Kind::Plus | Kind::Minus | Kind::Bang | Kind::Tilde | Kind::Sqrt | Kind::PlusMinus
    ) && !tok.raw.suffixed
    {
        let mark = p.position();
        let dotted = tok.raw.dotted;
        p.bump(NodeFlags::NONE, true);
        parse_unary(p, ctx);
        let flags = if dotted {
            NodeFlags::DOTOP
        } else {
            NodeFlags::NONE
        };
        p.emit(mark, Kind::Call, flags);
        return;
    }
    parse_juxtapose(p, ctx);
}

/// Number of non-trivia events appended since `before`, and whether the
/// single one is a numeric literal.
fn lone_number_since(p: &ParseStream<'_>, before: usize) -> bool {
    let mut count = 0usize;
    let mut numeric = false;
    for event in &p.events()[before..] {
        if event.head.flags.contains(NodeFlags::TRIVIA) {
            continue;
        }
        count += 1;
        numeric = event.head.kind.is_number();
    }
    count == 1 && numeric
}

/// Juxtaposition: a numeric literal directly followed by an identifier or
/// parenthesized expression multiplies implicitly, via an invisible `*`.
fn parse_juxtapose(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    let before = p.events().len();
    parse_factor(p, ctx);
    let mut prev_numeric = lone_number_since(p, before);
    let mut any = false;
    loop {
        if !prev_numeric {
            break;
        }
        let tok = p.peek_token(1, false);
        if tok.had_whitespace || !matches!(tok.kind(), Kind::Identifier | Kind::LParen) {
            break;
        }
        p.bump_invisible(Kind::Star, NodeFlags::NONE);
        let before = p.events().len();
        parse_factor(p, ctx);
        prev_numeric = lone_number_since(p, before);
        any = true;
    }
    if any {
        p.emit(mark, Kind::CallInfix, NodeFlags::INFIX);
    }
}

/// Power, right-associative, binding tighter than unary on the left and
/// admitting a sign on the right (`-2^2` is `-(2^2)`, `2^-3` works).
fn parse_factor(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_where_level(p, ctx);
    let tok = p.peek_token(1, ctx.skip_nl);
    if tok.kind() == Kind::Caret {
        p.bump(NodeFlags::NONE, ctx.skip_nl);
        parse_unary(p, ctx);
        p.emit(mark, Kind::CallInfix, NodeFlags::INFIX);
    }
}

/// `expr where T`, with an optional brace list of type variables.
fn parse_where_level(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_decl(p, ctx);
    while p.peek_token(1, ctx.skip_nl).matches(Kind::Where) {
        p.bump(NodeFlags::INFIX, ctx.skip_nl);
        if p.peek(1, true) == Kind::LBrace {
            parse_braces(p);
        } else {
            parse_decl(p, ctx);
        }
        p.emit(mark, Kind::Where, NodeFlags::INFIX);
    }
}

/// Type declarations: `x::T`.
fn parse_decl(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    parse_call(p, ctx);
    while p.peek_token(1, ctx.skip_nl).matches(Kind::ColonColon) {
        p.bump(NodeFlags::INFIX, ctx.skip_nl);
        parse_call(p, ctx);
        p.emit(mark, Kind::ColonColon, NodeFlags::INFIX);
    }
}

/// Postfix chain: calls, indexing, curly instantiation, field access,
/// adjoint, splat, string macros, and `do` blocks.
fn parse_call(p: &mut ParseStream<'_>, ctx: Ctx) {
    let mark = p.position();
    let before = p.events().len();
    parse_atom(p, ctx);
    // A numeric literal is never a callee: `2(x)` is juxtaposition.
    let numeric = lone_number_since(p, before);
    loop {
        let tok = p.peek_token(1, false);
        match tok.kind() {
            Kind::LParen if !tok.had_whitespace && !numeric => {
                p.bump(NodeFlags::NONE, false);
                parse_call_args(p, Kind::RParen, Ctx::paren());
                p.emit(mark, Kind::Call, NodeFlags::NONE);
                if p.peek(1, false) == Kind::Do {
                    parse_do_tail(p, mark);
                }
            }
            Kind::LBracket if !tok.had_whitespace && !numeric => {
                p.bump(NodeFlags::NONE, false);
                let mut actx = Ctx::paren();
                actx.end_ok = true;
                parse_call_args(p, Kind::RBracket, actx);
                p.emit(mark, Kind::Ref, NodeFlags::NONE);
            }
            Kind::LBrace if !tok.had_whitespace && !numeric => {
                p.bump(NodeFlags::NONE, false);
                parse_call_args(p, Kind::RBrace, Ctx::paren());
                p.emit(mark, Kind::Curly, NodeFlags::NONE);
            }
            Kind::Dot => match p.peek(2, false) {
                Kind::LParen => {
                    // Broadcast call `f.(x)`.
                    p.bump(NodeFlags::INFIX, false);
                    p.bump(NodeFlags::NONE, false);
                    parse_call_args(p, Kind::RParen, Ctx::paren());
                    p.emit(mark, Kind::Call, NodeFlags::DOTOP);
                }
                Kind::Identifier => {
                    p.bump(NodeFlags::INFIX, false);
                    p.bump(NodeFlags::NONE, false);
                    p.emit(mark, Kind::Dot, NodeFlags::INFIX);
                }
                k if k.is_operator() && !k.is_word_operator() => {
                    // Quoted operator reference `a.+`.
                    p.bump(NodeFlags::INFIX, false);
                    p.bump(NodeFlags::NONE, false);
                    p.emit(mark, Kind::Dot, NodeFlags::INFIX);
                }
                _ => break,
            },
            Kind::Prime => {
                p.bump(NodeFlags::INFIX, false);
                p.emit(mark, Kind::Prime, NodeFlags::INFIX);
            }
            Kind::DotDotDot => {
                // Splat: `xs...`.
                p.bump(NodeFlags::INFIX, false);
                p.emit(mark, Kind::DotDotDot, NodeFlags::INFIX);
            }
            k if k.is_string_delim() && !tok.had_whitespace => {
                // String macro `r"…"`: retype the name identifier.
                let behind = p.peek_behind(false);
                if behind.map_or(false, |h| h.kind == Kind::Identifier) {
                    p.reset_node(p.position(), Some(Kind::StringMacroName), None);
                    parse_string(p, ctx);
                    p.emit(mark, Kind::MacroCall, NodeFlags::NONE);
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
}

/// Arguments between a call/ref/curly opener and `closer`. Keyword
/// arguments (`f(x; a=1)`) after a `;` collect into a `parameters` node;
/// `name = value` arguments are retyped to `kw` nodes.
fn parse_call_args(p: &mut ParseStream<'_>, closer: Kind, ctx: Ctx) {
    let mut first = true;
    loop {
        p.bump_trivia(true);
        let kind = p.peek(1, true);
        if kind == closer {
            p.bump(NodeFlags::NONE, true);
            return;
        }
        match kind {
            Kind::EndMarker => {
                let mark = p.position();
                p.bump_invisible(Kind::Error, NodeFlags::NONE);
                p.diagnostic_at_mark(mark, "missing closing delimiter");
                return;
            }
            Kind::Semicolon => {
                let pmark = p.position();
                p.bump(NodeFlags::NONE, true);
                loop {
                    p.bump_trivia(true);
                    let k = p.peek(1, true);
                    if k == closer || k == Kind::EndMarker {
                        break;
                    }
                    parse_arg(p, ctx);
                    if p.peek(1, true) == Kind::Comma {
                        p.bump(NodeFlags::NONE, true);
                    }
                }
                p.emit(pmark, Kind::Parameters, NodeFlags::NONE);
            }
            Kind::Comma => {
                p.bump_error(true, "unexpected `,`");
            }
            _ => {
                let amark = p.position();
                parse_arg(p, ctx);
                if first && p.peek(1, true) == Kind::For {
                    // `f(x^2 for x in xs)`
                    parse_generator_tail(p, amark);
                }
                if p.peek(1, true) == Kind::Comma {
                    p.bump(NodeFlags::NONE, true);
                }
            }
        }
        first = false;
    }
}

fn parse_arg(p: &mut ParseStream<'_>, ctx: Ctx) {
    parse_eq(p, ctx);
    let is_assignment = p
        .peek_behind(true)
        .map_or(false, |h| {
            h.kind == Kind::Eq
                && h.flags.contains(NodeFlags::INFIX)
                && !h.flags.contains(NodeFlags::DOTOP)
        });
    if is_assignment {
        p.reset_node(p.position(), Some(Kind::Kw), Some(NodeFlags::NONE));
    }
}

/// `f(args) do x, y … end` — trailing function argument.
fn parse_do_tail(p: &mut ParseStream<'_>, mark: ParseStreamPosition) {
    p.bump(NodeFlags::NONE, false); // do
    let args = p.position();
    if !matches!(p.peek(1, false), Kind::NewlineWs | Kind::Semicolon) {
        let mut ctx = Ctx::stmt();
        ctx.comma_tuple = false;
        parse_eq(p, ctx);
        while p.peek(1, false) == Kind::Comma {
            p.bump(NodeFlags::NONE, false);
            parse_eq(p, ctx);
        }
    }
    p.emit(args, Kind::TupleNode, NodeFlags::NONE);
    parse_block(p);
    super::expect_end(p, "`do` block");
    p.emit(mark, Kind::Do, NodeFlags::NONE);
}

/// One `for` iteration: `pattern in collection` (also `=`, `∈`).
pub(crate) fn parse_iteration(p: &mut ParseStream<'_>) {
    let mark = p.position();
    let ctx = Ctx {
        skip_nl: false,
        space_sensitive: false,
        comma_tuple: false,
        no_range_colon: false,
        end_ok: false,
    };
    parse_pipe(p, ctx);
    let kind = p.peek(1, true);
    match kind {
        Kind::In | Kind::Eq | Kind::ElementOf => {
            p.bump(NodeFlags::INFIX, true);
            parse_pipe(p, ctx);
            p.emit(mark, kind, NodeFlags::INFIX);
        }
        _ => {
            let err = p.position();
            p.bump_invisible(Kind::Error, NodeFlags::NONE);
            p.diagnostic_at_mark(err, "expected `in` in iteration");
        }
    }
}

/// The `for …` tail of a generator; `mark` covers the element expression.
fn parse_generator_tail(p: &mut ParseStream<'_>, mark: ParseStreamPosition) {
    p.bump(NodeFlags::NONE, true); // for
    parse_iteration(p);
    while p.peek(1, true) == Kind::Comma {
        p.bump(NodeFlags::NONE, true);
        parse_iteration(p);
    }
    if p.peek(1, true) == Kind::If {
        // Filter clause.
        p.bump(NodeFlags::NONE, true);
        parse_eq(p, Ctx::paren());
    }
    p.emit(mark, Kind::Generator, NodeFlags::NONE);
}

// ─── Atoms ──────────────────────────────────────────────────────────────

fn parse_atom(p: &mut ParseStream<'_>, ctx: Ctx) {
    // Align the lookahead on the significant token so the adjacency
    // checks below (`var"…"`, `:sym`) see the right neighbors.
    p.bump_trivia(true);
    let tok = p.peek_token(1, true);
    match tok.kind() {
        Kind::Integer
        | Kind::HexInt
        | Kind::OctInt
        | Kind::BinInt
        | Kind::Float
        | Kind::Char
        | Kind::True
        | Kind::False => p.bump(NodeFlags::NONE, true),
        Kind::Identifier => {
            let text = peek_text(p, 1, true);
            let next = p.peek_token(2, false);
            if text == "var" && next.kind() == Kind::DQuote && !next.had_whitespace {
                parse_var_quoted(p);
            } else if !parse_contextual(p) {
                p.bump(NodeFlags::NONE, true);
            }
        }
        Kind::If => parse_if(p),
        Kind::While => parse_while(p),
        Kind::For => parse_for(p),
        Kind::Let => parse_let(p),
        Kind::Begin => parse_begin(p),
        Kind::Quote => parse_quote_block(p),
        Kind::Function => parse_function(p, Kind::Function),
        Kind::Macro => parse_function(p, Kind::Macro),
        Kind::Struct => parse_struct(p, false),
        Kind::Module => parse_module(p),
        Kind::Try => parse_try(p),
        Kind::Return => parse_return(p),
        Kind::Break => parse_jump(p, Kind::Break),
        Kind::Continue => parse_jump(p, Kind::Continue),
        Kind::Const => parse_decl_kw(p, Kind::Const),
        Kind::Global => parse_decl_kw(p, Kind::Global),
        Kind::Local => parse_decl_kw(p, Kind::Local),
        Kind::Import => parse_import(p, Kind::Import),
        Kind::Using => parse_import(p, Kind::Using),
        Kind::Export => parse_export(p),
        Kind::LParen => parse_paren(p),
        Kind::LBracket => parse_cat(p),
        Kind::LBrace => parse_braces(p),
        k if k.is_string_delim() => parse_string(p, ctx),
        Kind::Colon => parse_quote_atom(p),
        Kind::At => parse_macrocall(p),
        Kind::Dollar => {
            // Interpolation in quoted code: `$x`.
            let mark = p.position();
            p.bump(NodeFlags::NONE, true);
            parse_atom(p, ctx);
            p.emit(mark, Kind::Dollar, NodeFlags::NONE);
        }
        Kind::End if ctx.end_ok => p.bump(NodeFlags::NONE, true),
        Kind::EndMarker => {
            let err = p.position();
            p.bump_invisible(Kind::Error, NodeFlags::NONE);
            p.diagnostic_at_mark(err, "premature end of input");
        }
        _ => {
            p.bump_error(true, "unexpected token");
        }
    }
}

/// `var"…"` quoted identifier.
fn parse_var_quoted(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump_remap(Kind::Var, NodeFlags::NONE, true);
    p.bump(NodeFlags::NONE, false); // opening "
    if p.peek(1, false) == Kind::StringChunk {
        p.bump(NodeFlags::NONE, false);
    }
    if p.peek(1, false) == Kind::DQuote {
        p.bump(NodeFlags::NONE, false);
    } else {
        let err = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(err, "unterminated quoted identifier");
    }
    p.emit(mark, Kind::Var, NodeFlags::NONE);
}

/// Parenthesized forms: `()` `(a)` `(a, b)` `(a; b)` `(x for x in xs)`.
fn parse_paren(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // (
    if p.peek(1, true) == Kind::RParen {
        p.bump(NodeFlags::NONE, true);
        p.emit(mark, Kind::TupleNode, NodeFlags::NONE);
        return;
    }
    let ctx = Ctx::paren();
    parse_eq(p, ctx);
    match p.peek(1, true) {
        Kind::For => {
            parse_generator_tail(p, mark);
            expect_closer(p, Kind::RParen);
        }
        Kind::Comma => {
            while p.peek(1, true) == Kind::Comma {
                p.bump(NodeFlags::NONE, true);
                if p.peek(1, true) == Kind::RParen {
                    break;
                }
                parse_eq(p, ctx);
            }
            expect_closer(p, Kind::RParen);
            p.emit(mark, Kind::TupleNode, NodeFlags::NONE);
        }
        Kind::Semicolon => {
            while p.peek(1, true) == Kind::Semicolon {
                p.bump(NodeFlags::NONE, true);
                if p.peek(1, true) == Kind::RParen {
                    break;
                }
                parse_eq(p, ctx);
            }
            expect_closer(p, Kind::RParen);
            p.emit(mark, Kind::Block, NodeFlags::NONE);
        }
        _ => {
            // Plain grouping: the parens stay as leaves of the enclosing
            // node.
            expect_closer(p, Kind::RParen);
        }
    }
}

fn expect_closer(p: &mut ParseStream<'_>, closer: Kind) {
    if p.peek(1, true) == closer {
        p.bump(NodeFlags::NONE, true);
    } else {
        let err = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(
            err,
            &format!("expected `{}`", closer.lexeme().unwrap_or("closing delimiter")),
        );
    }
}

/// `{a, b}` braces list.
fn parse_braces(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // {
    parse_call_args(p, Kind::RBrace, Ctx::paren());
    p.emit(mark, Kind::Curly, NodeFlags::NONE);
}

/// Array literals: `[a, b]` vect, `[a b]` hcat, `[a; b]` vcat,
/// `[x y ;; z w]` n-dimensional ncat, `[x for x in xs]` comprehension.
///
/// Newlines inside the brackets separate rows like `;`. Consecutive
/// semicolons are glued into one separator token whose length is the
/// concatenation dimension; between lone elements such a separator
/// continues a single logical row (`[x ;; y]` is an hcat).
fn parse_cat(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // [
    p.bump_trivia(true);
    if p.peek(1, true) == Kind::RBracket {
        p.bump(NodeFlags::NONE, true);
        p.emit(mark, Kind::Vect, NodeFlags::NONE);
        return;
    }

    let actx = Ctx::array();
    let first_row_mark = p.position();
    parse_eq(p, actx);

    match p.peek(1, true) {
        Kind::For => {
            parse_generator_tail(p, first_row_mark);
            expect_closer(p, Kind::RBracket);
            p.emit(mark, Kind::Comprehension, NodeFlags::NONE);
            return;
        }
        Kind::Comma => {
            while p.peek(1, true) == Kind::Comma {
                p.bump(NodeFlags::NONE, true);
                if p.peek(1, true) == Kind::RBracket {
                    break;
                }
                parse_eq(p, actx);
            }
            expect_closer(p, Kind::RBracket);
            p.emit(mark, Kind::Vect, NodeFlags::NONE);
            return;
        }
        _ => {}
    }

    // Matrix path: space-separated elements form rows; `;`-runs and
    // newlines separate rows (and higher dimensions).
    let mut row_mark = first_row_mark;
    let mut nelems = 1usize;
    let mut nrows = 0usize;
    let mut max_dim = 0u8;
    let mut saw_dim1 = false;
    let mut any_multi_row = false;
    let mut lone_row_pos: Option<ParseStreamPosition> = None;
    let mut lone_row_len = 1usize;

    loop {
        match p.peek(1, false) {
            Kind::RBracket | Kind::EndMarker => {
                close_row(
                    p,
                    row_mark,
                    nelems,
                    &mut nrows,
                    &mut any_multi_row,
                    &mut lone_row_pos,
                    &mut lone_row_len,
                );
                break;
            }
            Kind::Semicolon => {
                close_row(
                    p,
                    row_mark,
                    nelems,
                    &mut nrows,
                    &mut any_multi_row,
                    &mut lone_row_pos,
                    &mut lone_row_len,
                );
                // Count the adjacent semicolon run; its length is the
                // concatenation dimension.
                let mut run = 1usize;
                while p.peek(run + 1, false) == Kind::Semicolon
                    && !p.peek_token(run + 1, false).had_whitespace
                {
                    run += 1;
                }
                p.bump_trivia(false);
                if run > 1 {
                    p.bump_glue(Kind::Semicolon, NodeFlags::NONE, run);
                } else {
                    p.bump(NodeFlags::NONE, false);
                    saw_dim1 = true;
                }
                max_dim = max_dim.max(u8::try_from(run).unwrap_or(u8::MAX));
                row_mark = p.position();
                nelems = 0;
            }
            Kind::NewlineWs => {
                if p.peek(1, true) == Kind::RBracket {
                    // Trailing newline before the closer.
                    p.bump_trivia(true);
                    continue;
                }
                close_row(
                    p,
                    row_mark,
                    nelems,
                    &mut nrows,
                    &mut any_multi_row,
                    &mut lone_row_pos,
                    &mut lone_row_len,
                );
                max_dim = max_dim.max(1);
                saw_dim1 = true;
                p.bump_trivia(true);
                row_mark = p.position();
                nelems = 0;
            }
            _ => {
                parse_eq(p, actx);
                nelems += 1;
            }
        }
    }

    expect_closer(p, Kind::RBracket);

    if nrows <= 1 && max_dim == 0 {
        if lone_row_len > 1 {
            // A single space-separated row is an hcat of its elements,
            // not a one-row matrix: the row node folds away.
            if let Some(pos) = lone_row_pos {
                p.reset_node(pos, Some(Kind::Tombstone), None);
            }
            p.emit(mark, Kind::Hcat, NodeFlags::NONE);
        } else {
            p.emit(mark, Kind::Vect, NodeFlags::NONE);
        }
    } else if max_dim <= 1 {
        p.emit(mark, Kind::Vcat, NodeFlags::NONE);
    } else if !any_multi_row && !saw_dim1 {
        // `[x ;; y]`: separator runs of dimension two or more between
        // lone elements continue a single logical row — an hcat.
        p.emit(mark, Kind::Hcat, NodeFlags::NONE);
    } else {
        p.emit(mark, Kind::Ncat, NodeFlags::NONE.with_dim(max_dim));
    }
}

#[allow(clippy::too_many_arguments)]
fn close_row(
    p: &mut ParseStream<'_>,
    row_mark: ParseStreamPosition,
    nelems: usize,
    nrows: &mut usize,
    any_multi_row: &mut bool,
    lone_row_pos: &mut Option<ParseStreamPosition>,
    lone_row_len: &mut usize,
) {
    if nelems == 0 {
        return;
    }
    *nrows += 1;
    if nelems > 1 {
        *any_multi_row = true;
        let pos = p.emit(row_mark, Kind::Row, NodeFlags::NONE);
        if *nrows == 1 {
            *lone_row_pos = Some(pos);
        }
    }
    if *nrows == 1 {
        *lone_row_len = nelems;
    }
}

/// Strings with interpolation: open delimiter, chunk/`$` pieces, close.
fn parse_string(p: &mut ParseStream<'_>, _ctx: Ctx) {
    let open = p.peek(1, true);
    let mark = p.position();
    p.bump(NodeFlags::NONE, true);
    loop {
        match p.peek(1, false) {
            Kind::StringChunk | Kind::CmdChunk => p.bump(NodeFlags::NONE, false),
            Kind::Dollar => {
                p.bump(NodeFlags::NONE, false);
                match p.peek(1, false) {
                    Kind::Identifier => p.bump(NodeFlags::NONE, false),
                    Kind::LParen => {
                        p.bump(NodeFlags::NONE, false);
                        parse_eq(p, Ctx::paren());
                        expect_closer(p, Kind::RParen);
                    }
                    // The lexer already flagged the `$`.
                    _ => {}
                }
            }
            k if k == open => {
                p.bump(NodeFlags::NONE, false);
                break;
            }
            _ => {
                let err = p.position();
                p.bump_invisible(Kind::Error, NodeFlags::NONE);
                p.diagnostic_at_mark(err, "unterminated string literal");
                break;
            }
        }
    }
    let kind = match open {
        Kind::TripleDQuote => Kind::StringTriple,
        Kind::Backtick | Kind::TripleBacktick => Kind::CmdString,
        _ => Kind::StringNode,
    };
    p.emit(mark, kind, NodeFlags::NONE);
}

/// `:x` quoted symbol.
fn parse_quote_atom(p: &mut ParseStream<'_>) {
    let next = p.peek_token(2, false);
    let quotable = !next.had_whitespace
        && (matches!(next.kind(), Kind::Identifier)
            || next.kind().is_keyword()
            || next.kind().is_operator()
            || next.kind().is_literal());
    if quotable {
        let mark = p.position();
        p.bump(NodeFlags::NONE, true); // `:`
        p.bump(NodeFlags::NONE, false);
        p.emit(mark, Kind::Quote, NodeFlags::NONE);
    } else {
        p.bump_error(true, "unexpected `:`");
    }
}

/// `@name args` / `@name(args)` macro invocation.
fn parse_macrocall(p: &mut ParseStream<'_>) {
    let mark = p.position();
    p.bump(NodeFlags::NONE, true); // @
    if p.peek(1, false) == Kind::Identifier {
        p.bump_remap(Kind::MacroName, NodeFlags::NONE, false);
    } else {
        let err = p.position();
        p.bump_invisible(Kind::Error, NodeFlags::NONE);
        p.diagnostic_at_mark(err, "expected macro name after `@`");
        p.emit(mark, Kind::MacroCall, NodeFlags::NONE);
        return;
    }
    let next = p.peek_token(1, false);
    if next.kind() == Kind::LParen && !next.had_whitespace {
        p.bump(NodeFlags::NONE, false);
        parse_call_args(p, Kind::RParen, Ctx::paren());
    } else {
        // Space-separated arguments to end of line.
        let mut ctx = Ctx::stmt();
        ctx.comma_tuple = false;
        loop {
            match p.peek(1, false) {
                Kind::NewlineWs
                | Kind::Semicolon
                | Kind::EndMarker
                | Kind::End
                | Kind::RParen
                | Kind::RBracket
                | Kind::RBrace
                | Kind::Comma => break,
                _ => parse_eq(p, ctx),
            }
        }
    }
    p.emit(mark, Kind::MacroCall, NodeFlags::NONE);
}
