//! Source-preserving parser front-end for Nabla.
//!
//! The pipeline: source bytes → [`nabla_lexer::Lexer`] → raw tokens →
//! [`ParseStream`] (lookahead with trivia routing) → grammar productions
//! consume tokens and emit events → event buffer → [`build_tree`] → a
//! lossless CST of uniform [`SyntaxNode`]s.
//!
//! The stream is the primary contract surface; the grammar productions in
//! [`grammar`] are clients of it. Everything is strictly single-threaded
//! and synchronous; the only fatal failures are the stuck-parser watchdog
//! and a missing toplevel wrapper ([`ParseFatal`]).
//!
//! # Example
//!
//! ```
//! use nabla_parse::parse;
//! use nabla_syntax::GrammarVersion;
//!
//! let out = parse("x + y", GrammarVersion::LATEST).unwrap();
//! assert_eq!(out.tree.sexpr("x + y"), "(toplevel (call-i x + y))");
//! assert!(out.diagnostics.is_empty());
//! ```

pub mod grammar;
mod stream;
mod tree;

pub use stream::{Event, ParseFatal, ParseStream, ParseStreamPosition, SplitSpec};
pub use tree::{build_tree, build_tree_from_events, SyntaxNode, SyntaxNodeBuilder, TreeBuilder};

use nabla_diagnostic::Diagnostic;
use nabla_lexer::SourceBuffer;
use nabla_syntax::{GrammarVersion, Kind};

/// Result of a successful parse: the CST plus recovered diagnostics.
///
/// "Successful" means structurally complete — the tree spans all input
/// bytes even when `diagnostics` contains errors.
#[derive(Debug)]
pub struct ParseOutput {
    pub tree: SyntaxNode,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Render all diagnostics with source-line context.
    pub fn render_diagnostics(&self, source: &str, colors: nabla_diagnostic::ColorMode) -> String {
        let renderer = nabla_diagnostic::Renderer::new(source, colors);
        self.diagnostics
            .iter()
            .map(|d| renderer.render(d))
            .collect()
    }
}

/// Parse a whole source text into a `toplevel` tree.
pub fn parse(source: &str, version: GrammarVersion) -> Result<ParseOutput, ParseFatal> {
    let buffer = SourceBuffer::new(source);
    let mut stream = ParseStream::new(&buffer, version);
    grammar::parse_toplevel(&mut stream);
    if let Some(fatal) = stream.fatal() {
        return Err(fatal.clone());
    }
    let tree = build_tree(&mut SyntaxNodeBuilder, &stream, Some(Kind::Toplevel))?;
    let (_, diagnostics) = stream.finish();
    Ok(ParseOutput { tree, diagnostics })
}
