//! Shared syntax vocabulary for the Nabla compiler.
//!
//! This crate is the leaf dependency of the front-end: the closed [`Kind`]
//! catalog (one tag space for tokens and tree nodes), byte [`Span`]s, the
//! token types ([`RawToken`], [`SyntaxToken`]), node heads and flags, lex
//! error codes, and the grammar version gates.
//!
//! The keyword lookup table and the operator-to-text reverse map
//! ([`Kind::lexeme`]) are the only process-wide state, built once on first
//! use.

mod kind;
mod span;
mod token;
mod version;

pub use kind::{contextual_keyword, keyword, Kind};
pub use span::Span;
pub use token::{ErrCode, NodeFlags, RawToken, SyntaxHead, SyntaxToken};
pub use version::GrammarVersion;
