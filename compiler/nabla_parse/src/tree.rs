//! Folding the event buffer into a concrete syntax tree.
//!
//! A single depth-first pass over the events recovers nesting from each
//! event's start mark alone. Byte overlap cannot do this job: two
//! zero-width invisible events at the same position are ambiguous by
//! bytes, but their start marks order them uniquely.

use nabla_syntax::{Kind, NodeFlags, Span, SyntaxHead};

use crate::stream::{Event, ParseFatal, ParseStream};

/// Node construction hook for [`build_tree`].
///
/// The one polymorphic seam of the front-end: callers produce either the
/// default owned [`SyntaxNode`] or any richer node type by implementing
/// the two constructors.
pub trait TreeBuilder {
    type Node;

    /// Construct a terminal node.
    fn leaf(&mut self, head: SyntaxHead, span: Span) -> Self::Node;

    /// Construct an interior node from children in source order.
    fn interior(&mut self, head: SyntaxHead, span: Span, children: Vec<Self::Node>) -> Self::Node;
}

/// Owned CST node: head, byte span, ordered children. Leaves have no
/// children; consumers re-walk from the root (no parent pointers).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxNode {
    pub head: SyntaxHead,
    pub span: Span,
    pub children: Vec<SyntaxNode>,
    leaf: bool,
}

impl SyntaxNode {
    pub fn kind(&self) -> Kind {
        self.head.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    /// The node's source text.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.to_range()]
    }

    /// Children with trivia filtered out.
    pub fn non_trivia_children(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children
            .iter()
            .filter(|c| !c.head.flags.contains(NodeFlags::TRIVIA))
    }

    /// Compact S-expression rendering, for tests and debugging.
    ///
    /// Purely syntactic tokens are elided so the output reads like an
    /// abstract summary: trivia always; reserved and contextual keyword
    /// leaves; delimiters and string delimiters; leaves the grammar
    /// flagged `INFIX` (separator and operator tokens that repeat the
    /// node head, so `(= a b)` has no second `=`); and the `?`/`:` of a
    /// ternary. Operator leaves inside `call-i`/`comparison` nodes are
    /// kept — there they carry the meaning.
    pub fn sexpr(&self, source: &str) -> String {
        let mut out = String::new();
        self.write_sexpr(source, &mut out);
        out
    }

    fn write_sexpr(&self, source: &str, out: &mut String) {
        if self.is_leaf() {
            self.write_leaf(source, out);
            return;
        }
        out.push('(');
        out.push_str(&head_name(self.head));
        for child in &self.children {
            if self.elide(child) {
                continue;
            }
            out.push(' ');
            if self.kind() == Kind::Var && child.kind() == Kind::StringChunk {
                // A quoted identifier reads as a plain name.
                out.push_str(child.text(source));
                continue;
            }
            child.write_sexpr(source, out);
        }
        out.push(')');
    }

    fn write_leaf(&self, source: &str, out: &mut String) {
        let kind = self.kind();
        if kind == Kind::Error {
            out.push_str("(error)");
            return;
        }
        if kind == Kind::StringChunk || kind == Kind::CmdChunk {
            out.push('"');
            out.push_str(self.text(source));
            out.push('"');
            return;
        }
        if kind == Kind::MacroName {
            out.push('@');
            out.push_str(self.text(source));
            return;
        }
        if kind == Kind::StringMacroName {
            out.push('@');
            out.push_str(self.text(source));
            out.push_str("_str");
            return;
        }
        if self.span.is_empty() {
            out.push_str(kind.lexeme().unwrap_or(kind.name()));
            return;
        }
        out.push_str(self.text(source));
    }

    fn elide(&self, child: &SyntaxNode) -> bool {
        if !child.is_leaf() {
            return false;
        }
        let kind = child.kind();
        let flags = child.head.flags;
        if flags.contains(NodeFlags::TRIVIA) {
            return true;
        }
        // Separator and head-repeating operator tokens are flagged by the
        // grammar when it bumps them.
        if flags.contains(NodeFlags::INFIX) {
            return true;
        }
        match kind {
            k if k.is_string_delim() => true,
            Kind::LParen
            | Kind::RParen
            | Kind::LBracket
            | Kind::RBracket
            | Kind::LBrace
            | Kind::RBrace
            | Kind::Comma
            | Kind::Semicolon
            | Kind::At
            | Kind::Dollar => true,
            k if k.is_contextual_keyword() => true,
            // `end` is structure when it closes a block, but an operand
            // inside indexing brackets.
            Kind::End => matches!(
                self.kind(),
                Kind::If
                    | Kind::Elseif
                    | Kind::While
                    | Kind::For
                    | Kind::Let
                    | Kind::Function
                    | Kind::Macro
                    | Kind::Struct
                    | Kind::Module
                    | Kind::Try
                    | Kind::Quote
                    | Kind::Block
                    | Kind::Do
                    | Kind::Abstract
                    | Kind::Primitive
            ),
            // Word operators read as operands in comparisons; reserved
            // keywords are structure.
            k if k.is_keyword() && !k.is_word_operator() => true,
            Kind::Question | Kind::Colon if self.kind() == Kind::If => true,
            Kind::Colon if self.kind() == Kind::Quote => true,
            _ => false,
        }
    }
}

/// Spell an interior head for S-expression output.
fn head_name(head: SyntaxHead) -> String {
    let base = match head.kind {
        Kind::Toplevel => "toplevel".to_string(),
        Kind::Block => "block".to_string(),
        Kind::Call => "call".to_string(),
        Kind::CallInfix => "call-i".to_string(),
        Kind::TupleNode => "tuple".to_string(),
        Kind::Parameters => "parameters".to_string(),
        Kind::Kw => "kw".to_string(),
        Kind::Vect => "vect".to_string(),
        Kind::Vcat => "vcat".to_string(),
        Kind::Hcat => "hcat".to_string(),
        Kind::Row => "row".to_string(),
        Kind::Ncat => format!("ncat-{}", head.flags.dim()),
        Kind::Nrow => format!("nrow-{}", head.flags.dim()),
        Kind::Generator => "generator".to_string(),
        Kind::Filter => "filter".to_string(),
        Kind::Comprehension => "comprehension".to_string(),
        Kind::Flatten => "flatten".to_string(),
        Kind::Curly => "curly".to_string(),
        Kind::Ref => "ref".to_string(),
        Kind::MacroCall => "macrocall".to_string(),
        Kind::StringNode => "string".to_string(),
        Kind::StringTriple => "string-triple".to_string(),
        Kind::CmdString => "cmdstring".to_string(),
        Kind::Comparison => "comparison".to_string(),
        Kind::Error => "error".to_string(),
        Kind::Var => "var".to_string(),
        other => other.lexeme().unwrap_or(other.name()).to_string(),
    };
    if head.flags.contains(NodeFlags::DOTOP) {
        format!(".{base}")
    } else {
        base
    }
}

/// Default [`TreeBuilder`] producing owned [`SyntaxNode`]s.
#[derive(Default)]
pub struct SyntaxNodeBuilder;

impl TreeBuilder for SyntaxNodeBuilder {
    type Node = SyntaxNode;

    fn leaf(&mut self, head: SyntaxHead, span: Span) -> SyntaxNode {
        SyntaxNode {
            head,
            span,
            children: Vec::new(),
            leaf: true,
        }
    }

    fn interior(&mut self, head: SyntaxHead, span: Span, children: Vec<SyntaxNode>) -> SyntaxNode {
        debug_assert!(
            children.iter().all(|c| span.contains_span(c.span)),
            "child spans must be contained in the parent span"
        );
        debug_assert!(
            children.windows(2).all(|w| w[0].span.start <= w[1].span.start),
            "child byte ranges must be non-decreasing"
        );
        SyntaxNode {
            head,
            span,
            children,
            leaf: false,
        }
    }
}

/// Fold a finished stream's event buffer into a tree.
///
/// If several toplevel events remain, they are wrapped in
/// `wrap_toplevel`; with no wrapper kind that situation is fatal.
pub fn build_tree<B: TreeBuilder>(
    builder: &mut B,
    stream: &ParseStream<'_>,
    wrap_toplevel: Option<Kind>,
) -> Result<B::Node, ParseFatal> {
    build_tree_from_events(builder, stream.events(), wrap_toplevel)
}

/// [`build_tree`] over a raw event slice.
pub fn build_tree_from_events<B: TreeBuilder>(
    builder: &mut B,
    events: &[Event],
    wrap_toplevel: Option<Kind>,
) -> Result<B::Node, ParseFatal> {
    struct Entry<N> {
        /// Index of the first event this node covers (itself, for a leaf).
        first_event: u32,
        span: Span,
        node: N,
    }

    let mut stack: Vec<Entry<B::Node>> = Vec::new();
    for (index, event) in events.iter().enumerate() {
        if event.head.kind == Kind::Tombstone {
            continue;
        }
        let index = u32::try_from(index).expect("event index fits in u32");
        if event.start_mark > index {
            // Leaf: covers nothing before itself.
            stack.push(Entry {
                first_event: index,
                span: event.span,
                node: builder.leaf(event.head, event.span),
            });
        } else {
            // Interior: adopt every node whose first event is at or past
            // the start mark.
            let split = stack
                .iter()
                .rposition(|e| e.first_event < event.start_mark)
                .map_or(0, |i| i + 1);
            let children: Vec<B::Node> = stack.drain(split..).map(|e| e.node).collect();
            stack.push(Entry {
                first_event: event.start_mark.min(index),
                span: event.span,
                node: builder.interior(event.head, event.span, children),
            });
        }
    }

    match stack.len() {
        1 => Ok(stack.pop().expect("len checked").node),
        0 => match wrap_toplevel {
            Some(kind) => Ok(builder.interior(
                SyntaxHead::new(kind, NodeFlags::NONE),
                Span::point(0),
                Vec::new(),
            )),
            None => Err(ParseFatal::MultipleToplevel),
        },
        _ => match wrap_toplevel {
            Some(kind) => {
                let span = stack
                    .iter()
                    .map(|e| e.span)
                    .reduce(Span::merge)
                    .expect("stack non-empty");
                let children = stack.drain(..).map(|e| e.node).collect();
                Ok(builder.interior(SyntaxHead::new(kind, NodeFlags::NONE), span, children))
            }
            None => Err(ParseFatal::MultipleToplevel),
        },
    }
}
