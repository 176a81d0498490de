//! Terminal rendering of diagnostics with source-line context.
//!
//! Shows at least two lines of leading and one line of trailing context.
//! Compact ranges (same or adjacent lines) are highlighted contiguously;
//! long ranges show the start and end windows elided by `…`. Empty ranges
//! are expanded one code point to each side before rendering.

use std::fmt::Write;

use nabla_syntax::Span;

use crate::{Diagnostic, LineIndex, Severity};

/// ANSI color codes.
mod colors {
    pub const ERROR: &str = "\x1b[1;31m";
    pub const WARNING: &str = "\x1b[1;33m";
    pub const NOTE: &str = "\x1b[1;36m";
    pub const INFO: &str = "\x1b[1;32m";
    pub const GUTTER: &str = "\x1b[1;34m";
    pub const RESET: &str = "\x1b[0m";
}

/// Color output mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Colors when stderr is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn enabled(self) -> bool {
        match self {
            ColorMode::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Lines of leading context shown before the highlighted range.
const LEADING_CONTEXT: u32 = 2;
/// Lines of trailing context shown after it.
const TRAILING_CONTEXT: u32 = 1;

/// Renders diagnostics against one source text.
pub struct Renderer<'a> {
    source: &'a str,
    index: LineIndex,
    colors: bool,
}

impl<'a> Renderer<'a> {
    pub fn new(source: &'a str, mode: ColorMode) -> Self {
        Renderer {
            source,
            index: LineIndex::build(source),
            colors: mode.enabled(),
        }
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colors {
            format!("{color}{text}{}", colors::RESET)
        } else {
            text.to_string()
        }
    }

    fn severity_color(severity: Severity) -> &'static str {
        match severity {
            Severity::Error => colors::ERROR,
            Severity::Warning => colors::WARNING,
            Severity::Note => colors::NOTE,
            Severity::Info => colors::INFO,
        }
    }

    /// Render one diagnostic to a string.
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let span = self.expand_empty(diagnostic.span);
        let (start_line, start_col) = self.index.line_col(self.source, span.start);
        let (end_line, end_col_excl) = self.index.line_col(self.source, span.end);

        let mut out = String::new();
        let head = self.paint(
            &diagnostic.severity.to_string(),
            Self::severity_color(diagnostic.severity),
        );
        let _ = writeln!(out, "{head}: {}", diagnostic.message);
        let _ = writeln!(out, " --> {start_line}:{start_col}");

        let gutter_width = digits(self.index.line_count().min(end_line + TRAILING_CONTEXT));

        if end_line - start_line <= 1 {
            // Compact: one contiguous window.
            let first = start_line.saturating_sub(LEADING_CONTEXT).max(1);
            let last = (end_line + TRAILING_CONTEXT).min(self.index.line_count());
            for line in first..=last {
                self.render_line(&mut out, line, gutter_width);
                if line >= start_line && line <= end_line {
                    self.render_underline(
                        &mut out,
                        line,
                        gutter_width,
                        (line == start_line).then_some(start_col),
                        (line == end_line).then_some(end_col_excl),
                        diagnostic.severity,
                    );
                }
            }
        } else {
            // Long range: start window, elision, end window.
            let first = start_line.saturating_sub(LEADING_CONTEXT).max(1);
            for line in first..=start_line {
                self.render_line(&mut out, line, gutter_width);
            }
            self.render_underline(
                &mut out,
                start_line,
                gutter_width,
                Some(start_col),
                None,
                diagnostic.severity,
            );
            let _ = writeln!(out, "{:width$} …", "", width = gutter_width as usize);
            let last = (end_line + TRAILING_CONTEXT).min(self.index.line_count());
            for line in end_line..=last {
                self.render_line(&mut out, line, gutter_width);
                if line == end_line {
                    self.render_underline(
                        &mut out,
                        line,
                        gutter_width,
                        None,
                        Some(end_col_excl),
                        diagnostic.severity,
                    );
                }
            }
        }
        out
    }

    fn render_line(&self, out: &mut String, line: u32, gutter_width: u32) {
        let text = self.index.line_text(self.source, line).unwrap_or("");
        let gutter = self.paint(
            &format!("{line:>width$} |", width = gutter_width as usize),
            colors::GUTTER,
        );
        let _ = writeln!(out, "{gutter} {text}");
    }

    /// Caret underline under `line`, from `from_col` (or line start) to
    /// `to_col_excl` (or line end).
    fn render_underline(
        &self,
        out: &mut String,
        line: u32,
        gutter_width: u32,
        from_col: Option<u32>,
        to_col_excl: Option<u32>,
        severity: Severity,
    ) {
        let text = self.index.line_text(self.source, line).unwrap_or("");
        let line_chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        let from = from_col.unwrap_or(1);
        let to = to_col_excl.unwrap_or(line_chars + 1).max(from + 1);

        let mut underline = String::new();
        for _ in 1..from {
            underline.push(' ');
        }
        for _ in from..to {
            underline.push('^');
        }
        let gutter = self.paint(
            &format!("{:>width$} |", "", width = gutter_width as usize),
            colors::GUTTER,
        );
        let painted = self.paint(&underline, Self::severity_color(severity));
        let _ = writeln!(out, "{gutter} {painted}");
    }

    /// Expand an empty range one code point to each side.
    fn expand_empty(&self, span: Span) -> Span {
        if !span.is_empty() {
            return span;
        }
        let bytes = self.source.as_bytes();
        let mut start = span.start as usize;
        while start > 0 && !self.source.is_char_boundary(start - 1) {
            start -= 1;
        }
        start = start.saturating_sub(1);
        while start > 0 && !self.source.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = (span.end as usize).min(bytes.len());
        if end < bytes.len() {
            end += 1;
            while end < bytes.len() && !self.source.is_char_boundary(end) {
                end += 1;
            }
        }
        Span::new(
            u32::try_from(start).expect("start fits"),
            u32::try_from(end).expect("end fits"),
        )
    }
}

fn digits(n: u32) -> u32 {
    let mut n = n.max(1);
    let mut count = 0;
    while n > 0 {
        n /= 10;
        count += 1;
    }
    count
}
