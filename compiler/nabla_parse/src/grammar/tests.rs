//! Grammar tests: literal source → S-expression of the CST.

use nabla_syntax::{GrammarVersion, Kind, NodeFlags};

use crate::{parse, ParseOutput, SyntaxNode};

fn output(source: &str) -> ParseOutput {
    parse(source, GrammarVersion::LATEST).expect("parse is structurally total")
}

/// S-expression of the whole tree (with the implicit toplevel wrapper).
fn toplevel(source: &str) -> String {
    output(source).tree.sexpr(source)
}

/// S-expression of the single toplevel statement.
fn stmt(source: &str) -> String {
    let out = output(source);
    let kids: Vec<&SyntaxNode> = out.tree.non_trivia_children().collect();
    assert_eq!(kids.len(), 1, "expected one statement in {source:?}: {}", out.tree.sexpr(source));
    kids[0].sexpr(source)
}

/// Leaf spans must tile the source exactly.
fn assert_lossless(source: &str) {
    fn walk(node: &SyntaxNode, leaves: &mut Vec<(u32, u32)>) {
        if node.is_leaf() {
            leaves.push((node.span.start, node.span.end));
        } else {
            for child in &node.children {
                walk(child, leaves);
            }
        }
    }
    let out = output(source);
    let mut leaves = Vec::new();
    walk(&out.tree, &mut leaves);
    let mut pos = 0u32;
    for (start, end) in leaves {
        assert!(start >= pos, "overlapping leaves in {source:?}");
        assert_eq!(start, pos, "gap before byte {start} in {source:?}");
        pos = end;
    }
    assert_eq!(pos as usize, source.len(), "coverage of {source:?}");
}

// ─── Sequencing ─────────────────────────────────────────────────────────

#[test]
fn semicolon_block() {
    assert_eq!(stmt("a;b;c"), "(block a b c)");
    assert_lossless("a;b;c");
}

#[test]
fn toplevel_semi_flag_is_set() {
    let out = output("a;b");
    let block = out.tree.non_trivia_children().next().expect("block");
    assert!(block.head.flags.contains(NodeFlags::TOPLEVEL_SEMI));
}

#[test]
fn newline_separates_statements() {
    assert_eq!(toplevel("a\nb"), "(toplevel a b)");
}

// ─── Assignment ─────────────────────────────────────────────────────────

#[test]
fn assignment() {
    assert_eq!(stmt("a = b"), "(= a b)");
    assert_lossless("a = b");
}

#[test]
fn broadcast_assignment() {
    assert_eq!(stmt("a .= b"), "(.= a b)");
    assert_lossless("a .= b");
}

#[test]
fn tuple_assignment() {
    assert_eq!(stmt("a, b = c, d"), "(= (tuple a b) (tuple c d))");
}

#[test]
fn chained_assignment_is_right_associative() {
    assert_eq!(stmt("a = b = c"), "(= a (= b c))");
}

#[test]
fn updating_assignment() {
    assert_eq!(stmt("a += 1"), "(+= a 1)");
    assert_eq!(stmt("a <<= 2"), "(<<= a 2)");
}

#[test]
fn short_form_function() {
    assert_eq!(stmt("f(x) = 2x"), "(= (call f x) (call-i 2 * x))");
}

// ─── Juxtaposition ──────────────────────────────────────────────────────

#[test]
fn juxtaposition_inserts_invisible_times() {
    assert_eq!(stmt("2x"), "(call-i 2 * x)");
    assert_lossless("2x");
}

#[test]
fn juxtaposition_star_is_zero_width() {
    let out = output("2x");
    fn find_star(node: &SyntaxNode) -> Option<(u32, u32)> {
        if node.is_leaf() && node.kind() == Kind::Star {
            return Some((node.span.start, node.span.end));
        }
        node.children.iter().find_map(find_star)
    }
    let (start, end) = find_star(&out.tree).expect("invisible star");
    assert_eq!(start, end);
    assert_eq!(start, 1);
}

#[test]
fn juxtaposition_with_parens() {
    assert_eq!(stmt("2(a)"), "(call-i 2 * a)");
}

#[test]
fn juxtaposition_binds_power_first() {
    // 2x^2 is 2*(x^2)
    assert_eq!(stmt("2x^2"), "(call-i 2 * (call-i x ^ 2))");
}

#[test]
fn no_juxtaposition_across_space() {
    assert_eq!(toplevel("2 x"), "(toplevel 2 x)");
}

#[test]
fn hex_maximal_munch_juxtaposes() {
    // `0xenomorph` is `0xe` next to `nomorph`.
    assert_eq!(stmt("0xenomorph"), "(call-i 0xe * nomorph)");
}

// ─── Operators ──────────────────────────────────────────────────────────

#[test]
fn comparison_chain() {
    assert_eq!(stmt("x < y < z"), "(comparison x < y < z)");
    assert_eq!(stmt("x == y < z"), "(comparison x == y < z)");
    assert_lossless("x < y < z");
}

#[test]
fn single_comparison_is_infix_call() {
    assert_eq!(stmt("x < y"), "(call-i x < y)");
    assert_eq!(stmt("a in b"), "(call-i a in b)");
}

#[test]
fn subtype_has_its_own_head() {
    assert_eq!(stmt("a <: b"), "(<: a b)");
    assert_eq!(stmt("a >: b"), "(>: a b)");
}

#[test]
fn plus_chains_into_one_call() {
    assert_eq!(stmt("a + b + c"), "(call-i a + b + c)");
    // Minus does not chain.
    assert_eq!(stmt("a - b - c"), "(call-i (call-i a - b) - c)");
}

#[test]
fn precedence_tower() {
    assert_eq!(stmt("a + b * c"), "(call-i a + (call-i b * c))");
    assert_eq!(stmt("a * b + c"), "(call-i (call-i a * b) + c)");
    assert_eq!(stmt("-2^2"), "(call - (call-i 2 ^ 2))");
    assert_eq!(stmt("2^3^4"), "(call-i 2 ^ (call-i 3 ^ 4))");
}

#[test]
fn dotted_operator_stays_on_token() {
    assert_eq!(stmt("a .+ b"), "(call-i a .+ b)");
    assert_lossless("a .+ b");
}

#[test]
fn lazy_boolean_is_right_associative() {
    assert_eq!(stmt("a && b && c"), "(&& a (&& b c))");
    assert_eq!(stmt("a && b || c"), "(|| (&& a b) c)");
}

#[test]
fn ranges_are_n_ary() {
    assert_eq!(stmt("1:10"), "(call-i 1 : 10)");
    assert_eq!(stmt("1:2:10"), "(call-i 1 : 2 : 10)");
}

#[test]
fn pipes() {
    assert_eq!(stmt("a |> f"), "(call-i a |> f)");
}

#[test]
fn pair_operator() {
    assert_eq!(stmt("a => b"), "(=> a b)");
}

#[test]
fn arrow_lambda() {
    assert_eq!(stmt("x -> x + 1"), "(-> x (call-i x + 1))");
}

#[test]
fn where_clause() {
    assert_eq!(stmt("x::T where T"), "(where (:: x T) T)");
    assert_eq!(stmt("f where {T, S}"), "(where f (curly T S))");
}

#[test]
fn unary_operators() {
    assert_eq!(stmt("-x"), "(call - x)");
    assert_eq!(stmt("!x"), "(call ! x)");
    assert_eq!(stmt("√x"), "(call √ x)");
}

#[test]
fn adjoint_postfix() {
    assert_eq!(stmt("a'"), "(' a)");
    assert_eq!(stmt("a' + b"), "(call-i (' a) + b)");
}

#[test]
fn splat_postfix() {
    assert_eq!(stmt("f(xs...)"), "(call f (... xs))");
}

// ─── Ternary ────────────────────────────────────────────────────────────

#[test]
fn ternary() {
    assert_eq!(stmt("a ? b : c"), "(if a b c)");
}

#[test]
fn ternary_missing_space_recovers() {
    let source = "a? b : c";
    assert_eq!(stmt(source), "(if a (error) b c)");
    let out = output(source);
    assert!(out.has_errors());
    assert_lossless(source);
}

#[test]
fn ternary_nested() {
    assert_eq!(stmt("a ? b : c ? d : e"), "(if a b (if c d e))");
}

// ─── Control flow ───────────────────────────────────────────────────────

#[test]
fn if_block() {
    assert_eq!(stmt("if c\nx\nend"), "(if c (block x))");
    assert_eq!(
        stmt("if c\nx\nelseif d\ny\nelse\nz\nend"),
        "(if c (block x) (elseif d (block y) (block z)))"
    );
}

#[test]
fn if_end_recovers() {
    let source = "if end";
    assert_eq!(stmt(source), "(if (error) (block))");
    assert!(output(source).has_errors());
    assert_lossless(source);
}

#[test]
fn while_loop() {
    assert_eq!(stmt("while x\ny\nend"), "(while x (block y))");
}

#[test]
fn for_loop() {
    assert_eq!(stmt("for i in xs\nf(i)\nend"), "(for (in i xs) (block (call f i)))");
    assert_eq!(stmt("for i = 1:3\nend"), "(for (= i (call-i 1 : 3)) (block))");
}

#[test]
fn let_block() {
    assert_eq!(stmt("let x = 1\nx\nend"), "(let (block (= x 1)) (block x))");
}

#[test]
fn begin_block() {
    assert_eq!(stmt("begin\na\nb\nend"), "(block a b)");
}

#[test]
fn quote_block() {
    assert_eq!(stmt("quote\nx\nend"), "(quote (block x))");
}

#[test]
fn try_catch() {
    assert_eq!(
        stmt("try\nf()\ncatch e\ng()\nend"),
        "(try (block (call f)) e (block (call g)))"
    );
}

#[test]
fn try_else_is_version_gated() {
    let source = "try\nf()\ncatch\nelse\ng()\nend";
    let new = parse(source, GrammarVersion::LATEST).expect("parses");
    assert!(!new.has_errors());
    let old = parse(source, GrammarVersion(7)).expect("parses");
    assert!(old.has_errors());
}

#[test]
fn returns_and_jumps() {
    assert_eq!(stmt("return x"), "(return x)");
    assert_eq!(stmt("return"), "(return)");
    assert_eq!(stmt("break"), "(break)");
    assert_eq!(stmt("continue"), "(continue)");
}

// ─── Definitions ────────────────────────────────────────────────────────

#[test]
fn function_definition() {
    assert_eq!(
        stmt("function f(x)\nx\nend"),
        "(function (call f x) (block x))"
    );
}

#[test]
fn macro_definition() {
    assert_eq!(stmt("macro m(x)\nx\nend"), "(macro (call m x) (block x))");
}

#[test]
fn struct_definition() {
    assert_eq!(stmt("struct P\nx\ny\nend"), "(struct P (block x y))");
    assert_eq!(
        stmt("struct P <: Q\nx\nend"),
        "(struct (<: P Q) (block x))"
    );
}

#[test]
fn mutable_struct_sets_flag() {
    let source = "mutable struct P\nend";
    assert_eq!(stmt(source), "(struct P (block))");
    let out = output(source);
    let node = out.tree.non_trivia_children().next().expect("struct");
    assert!(node.head.flags.contains(NodeFlags::MUTABLE));
}

#[test]
fn abstract_and_primitive_types() {
    assert_eq!(stmt("abstract type T end"), "(abstract T)");
    assert_eq!(stmt("primitive type F 64 end"), "(primitive F 64)");
}

#[test]
fn module_definition() {
    assert_eq!(stmt("module M\nx\nend"), "(module M (block x))");
}

#[test]
fn const_and_scope_declarations() {
    assert_eq!(stmt("const x = 1"), "(const (= x 1))");
    assert_eq!(stmt("global y = 2"), "(global (= y 2))");
    assert_eq!(stmt("local z"), "(local z)");
}

#[test]
fn bare_const_is_version_gated() {
    let old = parse("const x", GrammarVersion(7)).expect("parses");
    assert!(old.has_errors());
    let new = parse("const x", GrammarVersion::LATEST).expect("parses");
    assert!(!new.has_errors());
}

// ─── Imports ────────────────────────────────────────────────────────────

#[test]
fn import_relative_dots_split() {
    assert_eq!(stmt("import ...A"), "(import (. . . . A))");
    assert_eq!(stmt("import ..A"), "(import (. . . A))");
    assert_lossless("import ...A");
}

#[test]
fn import_path_components() {
    assert_eq!(stmt("import A.B.C"), "(import (. A B C))");
    assert_eq!(stmt("using A, B"), "(using (. A) (. B))");
}

#[test]
fn import_item_list() {
    assert_eq!(stmt("import A.B: c, d"), "(import (: (. A B) (. c) (. d)))");
}

#[test]
fn import_as_is_version_gated() {
    assert_eq!(stmt("import A as B"), "(import (as (. A) B))");
    let old = parse("import A as B", GrammarVersion(5)).expect("parses");
    assert!(old.has_errors());
}

#[test]
fn export_list() {
    assert_eq!(stmt("export a, b"), "(export a b)");
}

// ─── Calls ──────────────────────────────────────────────────────────────

#[test]
fn calls() {
    assert_eq!(stmt("f()"), "(call f)");
    assert_eq!(stmt("f(x, y)"), "(call f x y)");
}

#[test]
fn keyword_arguments_retype_to_kw() {
    assert_eq!(stmt("f(x, a = 1)"), "(call f x (kw a 1))");
    assert_eq!(stmt("f(x; a = 1)"), "(call f x (parameters (kw a 1)))");
}

#[test]
fn ref_and_curly() {
    assert_eq!(stmt("a[1]"), "(ref a 1)");
    assert_eq!(stmt("a[end]"), "(ref a end)");
    assert_eq!(stmt("T{Int}"), "(curly T Int)");
}

#[test]
fn field_access() {
    assert_eq!(stmt("a.b"), "(. a b)");
    assert_eq!(stmt("a.b.c"), "(. (. a b) c)");
}

#[test]
fn broadcast_call() {
    assert_eq!(stmt("f.(x)"), "(.call f x)");
}

#[test]
fn do_block() {
    assert_eq!(
        stmt("map(xs) do x\nx\nend"),
        "(do (call map xs) (tuple x) (block x))"
    );
}

#[test]
fn macro_calls() {
    assert_eq!(stmt("@m x 2"), "(macrocall @m x 2)");
    assert_eq!(stmt("@m(x, y)"), "(macrocall @m x y)");
}

// ─── Arrays ─────────────────────────────────────────────────────────────

#[test]
fn vector_literal() {
    assert_eq!(stmt("[a, b]"), "(vect a b)");
    assert_eq!(stmt("[]"), "(vect)");
    assert_eq!(stmt("[a]"), "(vect a)");
}

#[test]
fn hcat_and_vcat() {
    assert_eq!(stmt("[a b]"), "(hcat a b)");
    assert_eq!(stmt("[a; b]"), "(vcat a b)");
    assert_eq!(stmt("[a b; c d]"), "(vcat (row a b) (row c d))");
    assert_lossless("[a b; c d]");
}

#[test]
fn newline_separates_rows() {
    assert_eq!(stmt("[a b\nc d]"), "(vcat (row a b) (row c d))");
}

#[test]
fn double_semicolon_continues_the_row() {
    // ` ;; ` between lone elements stays inside one logical row.
    assert_eq!(stmt("[x ;; y]"), "(hcat x y)");
    assert_eq!(stmt("[x ;; y ;; z]"), "(hcat x y z)");
    assert_lossless("[x ;; y]");
}

#[test]
fn ncat_with_rows() {
    // Policy: hcat-row continuation without a newline is a 2-d ncat.
    assert_eq!(stmt("[x y ;; z w]"), "(ncat-2 (row x y) (row z w))");
}

#[test]
fn space_sensitive_unary_in_arrays() {
    // `[a -b]` is two elements; `[a - b]` is one subtraction.
    assert_eq!(stmt("[a -b]"), "(hcat a (call - b))");
    assert_eq!(stmt("[a - b]"), "(vect (call-i a - b))");
}

#[test]
fn comprehension() {
    assert_eq!(
        stmt("[f(i) for i in xs]"),
        "(comprehension (generator (call f i) (in i xs)))"
    );
}

#[test]
fn generator_in_call() {
    assert_eq!(
        stmt("sum(x^2 for x in xs)"),
        "(call sum (generator (call-i x ^ 2) (in x xs)))"
    );
}

// ─── Tuples & parens ────────────────────────────────────────────────────

#[test]
fn tuples() {
    assert_eq!(stmt("()"), "(tuple)");
    assert_eq!(stmt("(a, b)"), "(tuple a b)");
    assert_eq!(stmt("(a,)"), "(tuple a)");
}

#[test]
fn parens_group_without_node() {
    assert_eq!(stmt("(a + b) * c"), "(call-i (call-i a + b) * c)");
    assert_lossless("(a + b) * c");
}

#[test]
fn paren_block() {
    assert_eq!(stmt("(a; b)"), "(block a b)");
}

// ─── Strings ────────────────────────────────────────────────────────────

#[test]
fn plain_string() {
    assert_eq!(stmt(r#""hi""#), r#"(string "hi")"#);
}

#[test]
fn interpolated_string() {
    assert_eq!(stmt(r#""a $x b""#), r#"(string "a " x " b")"#);
    assert_eq!(stmt(r#""$(a + b)""#), "(string (call-i a + b))");
    assert_lossless(r#""a $x b""#);
}

#[test]
fn nested_interpolation() {
    assert_eq!(
        stmt(r#""x$(f("y"))z""#),
        r#"(string "x" (call f (string "y")) "z")"#
    );
}

#[test]
fn triple_string_node() {
    let source = "\"\"\"\n  a\n  b\n  \"\"\"";
    // The chunk is lossless; dedenting happens in the value decoder.
    assert_eq!(stmt(source), "(string-triple \"\n  a\n  b\n  \")");
    assert_lossless(source);
}

#[test]
fn command_string() {
    assert_eq!(stmt("`ls -l`"), r#"(cmdstring "ls -l")"#);
}

#[test]
fn string_macro() {
    assert_eq!(stmt(r#"r"ab+""#), r#"(macrocall @r_str (string "ab+"))"#);
}

#[test]
fn var_quoted_identifier() {
    assert_eq!(stmt(r#"var"x""#), "(var x)");
}

#[test]
fn var_quoted_then_error() {
    let source = "var\"x\"end";
    // The quoted identifier parses; the stray `end` is wrapped in an
    // error node.
    assert_eq!(toplevel(source), "(toplevel (var x) (error end))");
    assert!(output(source).has_errors());
    assert_lossless(source);
}

// ─── Quoting ────────────────────────────────────────────────────────────

#[test]
fn quoted_symbol() {
    assert_eq!(stmt(":x"), "(quote x)");
    assert_eq!(stmt(":+"), "(quote +)");
}

// ─── Recovery ───────────────────────────────────────────────────────────

#[test]
fn stray_token_becomes_error_node() {
    let source = "a )";
    assert_eq!(toplevel(source), "(toplevel a (error))");
    assert!(output(source).has_errors());
    assert_lossless(source);
}

#[test]
fn unterminated_call_recovers() {
    let source = "f(x";
    assert!(output(source).has_errors());
    assert_lossless(source);
}

#[test]
fn lex_error_tokens_are_absorbed() {
    let source = "x = 100_";
    assert_eq!(stmt(source), "(= x 100_)");
    assert!(output(source).has_errors());
    assert_lossless(source);
}

#[test]
fn errors_never_lose_bytes() {
    for source in [
        "", " ", "\n\n", "a? b : c", "if end", "[x ;; y", "((", "\"open",
        "f(,)", "1 +", "a..", "import", "@", "'x", "#= open", "a $ b",
    ] {
        assert_lossless(source);
    }
}
