//! Sentinel-terminated source buffer and byte cursor.
//!
//! The buffer guarantees a `0x00` sentinel byte after the source content,
//! so the scanner detects end of input without bounds checks in the common
//! case. The allocation is rounded up to the next 64-byte boundary, which
//! also makes `peek`/`peek2` safe near the end of the content.

/// Cache line size in bytes, used for buffer padding.
const CACHE_LINE: usize = 64;

/// Sentinel-terminated copy of the source.
///
/// # Layout
///
/// ```text
/// [source_bytes..., 0x00, zero padding to 64-byte boundary]
/// ```
#[derive(Clone, Debug)]
pub struct SourceBuffer {
    buf: Vec<u8>,
    source_len: u32,
}

impl SourceBuffer {
    /// Copy `source` into a sentinel-terminated buffer.
    ///
    /// Sources larger than `u32::MAX` bytes are not supported; spans are
    /// `u32` to keep tokens compact.
    pub fn new(source: &str) -> Self {
        let bytes = source.as_bytes();
        let source_len = u32::try_from(bytes.len()).expect("source exceeds u32::MAX bytes");

        let padded = (bytes.len() + 1 + CACHE_LINE - 1) & !(CACHE_LINE - 1);
        let mut buf = vec![0u8; padded];
        buf[..bytes.len()].copy_from_slice(bytes);

        SourceBuffer { buf, source_len }
    }

    /// The source text.
    ///
    /// The buffer was constructed from `&str`, so the content is valid
    /// UTF-8 by construction.
    pub fn as_str(&self) -> &str {
        debug_assert!(std::str::from_utf8(&self.buf[..self.source_len as usize]).is_ok());
        // SAFETY: content bytes were copied verbatim from a `&str`.
        unsafe { std::str::from_utf8_unchecked(&self.buf[..self.source_len as usize]) }
    }

    /// Length of the source content in bytes.
    pub fn len(&self) -> u32 {
        self.source_len
    }

    pub fn is_empty(&self) -> bool {
        self.source_len == 0
    }

    /// A [`Cursor`] positioned at byte 0.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            buf: &self.buf,
            pos: 0,
            source_len: self.source_len,
        }
    }
}

/// Byte cursor over a sentinel-terminated buffer.
///
/// `Copy`, enabling cheap snapshots for backtracking. The sentinel means
/// `current()` returns `0x00` at end of input; an interior null byte is
/// distinguished by comparing `pos` against the source length.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: u32,
    source_len: u32,
}

impl<'a> Cursor<'a> {
    /// Byte at the current position (`0x00` at end of input).
    #[inline]
    pub fn current(&self) -> u8 {
        self.buf[self.pos as usize]
    }

    /// Byte one ahead. Safe at any position thanks to the padding.
    #[inline]
    pub fn peek(&self) -> u8 {
        self.buf[self.pos as usize + 1]
    }

    /// Byte two ahead.
    #[inline]
    pub fn peek2(&self) -> u8 {
        self.buf[self.pos as usize + 2]
    }

    #[inline]
    pub fn advance(&mut self) {
        self.pos += 1;
    }

    #[inline]
    pub fn advance_n(&mut self, n: u32) {
        self.pos += n;
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.current() == 0 && self.pos >= self.source_len
    }

    #[inline]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Decode the UTF-8 character at the current position.
    ///
    /// Returns the replacement character for stray bytes; the source was
    /// valid UTF-8 so this only happens past the sentinel.
    pub fn current_char(&self) -> char {
        let rest = &self.buf[self.pos as usize..self.source_len.max(self.pos) as usize];
        if rest.is_empty() {
            return '\0';
        }
        // Decode at most 4 bytes.
        let take = rest.len().min(4);
        match std::str::from_utf8(&rest[..take]) {
            Ok(s) => s.chars().next().unwrap_or('\0'),
            Err(e) if e.valid_up_to() > 0 => {
                // SAFETY: the prefix up to valid_up_to is valid UTF-8.
                let s = unsafe { std::str::from_utf8_unchecked(&rest[..e.valid_up_to()]) };
                s.chars().next().unwrap_or('\0')
            }
            Err(_) => '\u{FFFD}',
        }
    }

    /// Advance past one full UTF-8 character.
    #[inline]
    pub fn advance_char(&mut self) {
        let width = match self.current() {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        self.advance_n(width);
    }

    /// Advance while `pred` holds for the current byte.
    ///
    /// `pred(0)` must return `false` so the sentinel terminates the loop.
    #[inline]
    pub fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while pred(self.buf[self.pos as usize]) {
            self.pos += 1;
        }
    }

    /// Advance to the next `\n` or end of input (memchr-accelerated).
    pub fn eat_until_newline_or_eof(&mut self) {
        let remaining = &self.buf[self.pos as usize..self.source_len as usize];
        match memchr::memchr(b'\n', remaining) {
            Some(offset) => self.pos += u32::try_from(offset).expect("offset fits in u32"),
            None => self.pos = self.source_len,
        }
    }

    /// Advance past ordinary string content to the next interesting byte
    /// and return it (0 at end of input).
    ///
    /// Interesting bytes: the delimiter byte, `\`, and `$`.
    pub fn skip_to_string_delim(&mut self, delim: u8) -> u8 {
        let remaining = &self.buf[self.pos as usize..self.source_len as usize];
        match memchr::memchr3(delim, b'\\', b'$', remaining) {
            Some(offset) => {
                self.pos += u32::try_from(offset).expect("offset fits in u32");
                self.buf[self.pos as usize]
            }
            None => {
                self.pos = self.source_len;
                0
            }
        }
    }

    /// Extract a source substring.
    ///
    /// `start..end` must fall on UTF-8 boundaries within the content; the
    /// scanner's token boundaries guarantee this.
    pub fn slice(&self, start: u32, end: u32) -> &'a str {
        debug_assert!(start <= end && end <= self.source_len);
        // SAFETY: content comes from a `&str`; token boundaries are char
        // boundaries.
        unsafe { std::str::from_utf8_unchecked(&self.buf[start as usize..end as usize]) }
    }
}
