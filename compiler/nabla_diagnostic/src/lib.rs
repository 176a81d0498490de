//! Diagnostics for the Nabla front-end.
//!
//! A [`Diagnostic`] is a byte range plus a [`Severity`] and message.
//! [`LineIndex`] maps byte offsets to line/column positions, and
//! [`Renderer`] produces terminal output with source-line context.

mod diagnostic;
mod line_index;
mod render;

pub use diagnostic::{Diagnostic, Severity};
pub use line_index::LineIndex;
pub use render::{ColorMode, Renderer};
