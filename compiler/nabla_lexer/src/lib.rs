//! Lossless tokenizer for Nabla source.
//!
//! The lexer produces a stream of byte-range [`RawToken`]s over UTF-8
//! source: operators (including dotted broadcast and suffixed forms),
//! string pieces with interpolation entry and exit, numeric literals,
//! identifiers and keywords, trivia, and delimiters. Lex errors are
//! flagged on tokens ([`nabla_syntax::ErrCode`]); the lexer never aborts.
//!
//! # Modules
//!
//! - [`source`]: sentinel-terminated buffer and byte cursor
//! - [`scanner`]: the tokenizer itself
//! - [`decode`]: numeric parsing, string unescaping, triple-string dedent
//!
//! # Example
//!
//! ```
//! use nabla_lexer::{tokenize, SourceBuffer, Lexer};
//! use nabla_syntax::Kind;
//!
//! let tokens = tokenize("x .+ 1");
//! assert_eq!(tokens.len(), 5); // x, ws, .+, ws, 1
//! assert!(tokens[2].dotted);
//!
//! let buffer = SourceBuffer::new("a");
//! let mut lexer = Lexer::new(&buffer);
//! assert_eq!(lexer.next_token().kind, Kind::Identifier);
//! assert_eq!(lexer.next_token().kind, Kind::EndMarker);
//! ```

pub mod decode;
mod scanner;
mod source;

pub use scanner::{tokenize, Lexer};
pub use source::{Cursor, SourceBuffer};
