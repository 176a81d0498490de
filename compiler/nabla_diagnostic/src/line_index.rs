//! Line offset table for byte-offset → line/column lookup.
//!
//! Built once per source with a memchr newline scan; lookups are binary
//! searches.

/// Pre-computed byte offsets of line starts.
#[derive(Clone, Debug, Default)]
pub struct LineIndex {
    /// `offsets[i]` is the byte offset where 1-based line `i + 1` starts.
    offsets: Vec<u32>,
}

impl LineIndex {
    /// Scan `source` once for newlines.
    pub fn build(source: &str) -> Self {
        let mut offsets = vec![0u32];
        let bytes = source.as_bytes();
        let mut from = 0usize;
        while let Some(pos) = memchr::memchr(b'\n', &bytes[from..]) {
            let absolute = from + pos + 1;
            offsets.push(u32::try_from(absolute).expect("source fits in u32"));
            from = absolute;
        }
        LineIndex { offsets }
    }

    /// 1-based line number containing `offset`.
    pub fn line_of(&self, offset: u32) -> u32 {
        let idx = match self.offsets.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert.saturating_sub(1),
        };
        u32::try_from(idx).expect("line count fits in u32") + 1
    }

    /// 1-based (line, column), column counted in characters.
    pub fn line_col(&self, source: &str, offset: u32) -> (u32, u32) {
        let line = self.line_of(offset);
        let start = self.line_start(line).unwrap_or(0) as usize;
        let upto = (offset as usize).min(source.len());
        let col = u32::try_from(source[start..upto].chars().count()).unwrap_or(u32::MAX - 1) + 1;
        (line, col)
    }

    /// Byte offset where 1-based `line` starts.
    pub fn line_start(&self, line: u32) -> Option<u32> {
        if line == 0 {
            return None;
        }
        self.offsets.get(line as usize - 1).copied()
    }

    /// Text of 1-based `line`, without its trailing newline.
    pub fn line_text<'a>(&self, source: &'a str, line: u32) -> Option<&'a str> {
        let start = self.line_start(line)? as usize;
        let end = self
            .line_start(line + 1)
            .map_or(source.len(), |next| (next as usize).saturating_sub(1));
        // Trim a carriage return left by CRLF endings.
        let text = &source[start..end];
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Number of lines (at least 1, even for empty sources).
    pub fn line_count(&self) -> u32 {
        u32::try_from(self.offsets.len()).expect("line count fits in u32")
    }
}
