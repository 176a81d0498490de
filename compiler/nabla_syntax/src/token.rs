//! Token and node-head types shared between the lexer and the parser.
//!
//! The canonical definitions live here so the parse stream can access
//! token flags without depending on the lexer crate.

use std::fmt;

use crate::{Kind, Span};

/// Lexing error attached to a token.
///
/// The lexer never fails: a malformed token keeps its kind (so the parser
/// can still absorb it) and carries one of these codes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrCode {
    /// No error.
    #[default]
    None = 0,
    /// Unterminated `#= =#` comment ran into end of input.
    EofMultiComment = 1,
    /// Unterminated character literal ran into end of input or newline.
    EofChar = 2,
    /// Malformed numeric literal (stray `_`, empty exponent, bad digit).
    InvalidNumericConstant = 3,
    /// Dotted or suffixed composite that is not a known operator.
    InvalidOperator = 4,
    /// `$` not followed by an identifier or `(` inside a string.
    InvalidInterpolationTerminator = 5,
    /// Catch-all for bytes the lexer cannot classify.
    Unknown = 6,
}

impl ErrCode {
    #[inline]
    pub fn is_err(self) -> bool {
        self != ErrCode::None
    }

    /// Message text for diagnostics.
    pub fn message(self) -> &'static str {
        match self {
            ErrCode::None => "no error",
            ErrCode::EofMultiComment => "unterminated multi-line comment `#=`",
            ErrCode::EofChar => "unterminated character literal",
            ErrCode::InvalidNumericConstant => "invalid numeric constant",
            ErrCode::InvalidOperator => "invalid operator",
            ErrCode::InvalidInterpolationTerminator => {
                "`$` must be followed by an identifier or `(` inside a string"
            }
            ErrCode::Unknown => "unknown character",
        }
    }
}

/// Bitset of head flags recorded on tokens and tree nodes.
///
/// The low byte holds boolean flags; the high byte carries the dimension
/// for `Ncat`/`Nrow` heads.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeFlags(pub u16);

impl NodeFlags {
    pub const NONE: NodeFlags = NodeFlags(0);
    /// Whitespace, comment, or newline event.
    pub const TRIVIA: NodeFlags = NodeFlags(1 << 0);
    /// Operator written with a leading broadcast dot.
    pub const DOTOP: NodeFlags = NodeFlags(1 << 1);
    /// Operator extended by Unicode sub/superscript characters.
    pub const SUFFIXED: NodeFlags = NodeFlags(1 << 2);
    /// Infix node head (operator between its children).
    pub const INFIX: NodeFlags = NodeFlags(1 << 3);
    /// Toplevel block whose children were separated by `;`.
    pub const TOPLEVEL_SEMI: NodeFlags = NodeFlags(1 << 4);
    /// Raw (uncooked) string contents.
    pub const RAW_STRING: NodeFlags = NodeFlags(1 << 5);
    /// `mutable struct` discriminator.
    pub const MUTABLE: NodeFlags = NodeFlags(1 << 6);

    /// Store an `ncat`/`nrow` dimension in the high byte.
    #[inline]
    #[must_use]
    pub fn with_dim(self, dim: u8) -> NodeFlags {
        NodeFlags((self.0 & 0x00FF) | (u16::from(dim) << 8))
    }

    /// Dimension stored by [`with_dim`](Self::with_dim); 0 if none.
    #[inline]
    pub fn dim(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub fn union(self, other: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for NodeFlags {
    type Output = NodeFlags;
    fn bitor(self, rhs: NodeFlags) -> NodeFlags {
        self.union(rhs)
    }
}

impl fmt::Debug for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(NodeFlags::TRIVIA) {
            names.push("TRIVIA");
        }
        if self.contains(NodeFlags::DOTOP) {
            names.push("DOTOP");
        }
        if self.contains(NodeFlags::SUFFIXED) {
            names.push("SUFFIXED");
        }
        if self.contains(NodeFlags::INFIX) {
            names.push("INFIX");
        }
        if self.contains(NodeFlags::TOPLEVEL_SEMI) {
            names.push("TOPLEVEL_SEMI");
        }
        if self.contains(NodeFlags::RAW_STRING) {
            names.push("RAW_STRING");
        }
        if self.contains(NodeFlags::MUTABLE) {
            names.push("MUTABLE");
        }
        write!(f, "NodeFlags({})", names.join("|"))?;
        if self.dim() != 0 {
            write!(f, "+dim{}", self.dim())?;
        }
        Ok(())
    }
}

/// Kind plus flags: everything the tree builder needs to tag a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SyntaxHead {
    pub kind: Kind,
    pub flags: NodeFlags,
}

impl SyntaxHead {
    #[inline]
    pub const fn new(kind: Kind, flags: NodeFlags) -> Self {
        SyntaxHead { kind, flags }
    }
}

/// Raw token produced by the lexer.
///
/// Lossless: consecutive token spans tile the source exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawToken {
    pub kind: Kind,
    pub span: Span,
    pub err: ErrCode,
    /// Operator written with a leading broadcast `.`.
    pub dotted: bool,
    /// Operator extended by trailing sub/superscript characters.
    pub suffixed: bool,
}

impl RawToken {
    #[inline]
    pub fn new(kind: Kind, span: Span) -> Self {
        RawToken {
            kind,
            span,
            err: ErrCode::None,
            dotted: false,
            suffixed: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_err(mut self, err: ErrCode) -> Self {
        self.err = err;
        self
    }

    /// Flags implied by this token for its leaf event.
    pub fn head_flags(&self) -> NodeFlags {
        let mut flags = NodeFlags::NONE;
        if self.kind.is_trivia() {
            flags = flags | NodeFlags::TRIVIA;
        }
        if self.dotted {
            flags = flags | NodeFlags::DOTOP;
        }
        if self.suffixed {
            flags = flags | NodeFlags::SUFFIXED;
        }
        flags
    }
}

/// Size assertion: tokens are copied into the lookahead queue, keep them small.
const _: () = assert!(std::mem::size_of::<RawToken>() <= 16);

/// A significant token as seen by the parser, with its leading-trivia
/// summary.
///
/// `had_whitespace`/`had_newline` reflect *all* trivia between the previous
/// significant token and this one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyntaxToken {
    pub raw: RawToken,
    pub had_whitespace: bool,
    pub had_newline: bool,
}

impl SyntaxToken {
    #[inline]
    pub fn kind(&self) -> Kind {
        self.raw.kind
    }

    #[inline]
    pub fn span(&self) -> Span {
        self.raw.span
    }

    /// True when the token is this kind *and* undecorated (no broadcast
    /// dot, no suffix). Matching a bare kind must not silently match a
    /// decorated operator.
    #[inline]
    pub fn matches(&self, kind: Kind) -> bool {
        self.raw.kind == kind && !self.raw.dotted && !self.raw.suffixed
    }
}

impl PartialEq<Kind> for SyntaxToken {
    fn eq(&self, other: &Kind) -> bool {
        self.matches(*other)
    }
}
