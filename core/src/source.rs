//! Immutable source bytes plus a prebuilt line-start index, shared by the
//! parser facade (C2), comment scanner (C3), static analyzer (C4), and
//! instrumenter (C7) so none of them re-scan the file to answer "what line
//! is this byte offset on".

use crate::path::FileKey;

/// Source file contents plus the byte offset of the start of every line.
/// `content_hash` is a SeaHash digest of `bytes`, used as the key for every
/// content-addressed cache in the engine.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    key: FileKey,
    bytes: Vec<u8>,
    /// Byte offset of the first character of each line (1-indexed lines,
    /// so `line_starts[0]` is the offset of line 1).
    line_starts: Vec<usize>,
    content_hash: u64,
}

impl SourceBuffer {
    pub fn new(key: FileKey, bytes: Vec<u8>) -> Self {
        let content_hash = seahash::hash(&bytes);
        let mut line_starts = vec![0usize];
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            key,
            bytes,
            line_starts,
            content_hash,
        }
    }

    pub fn key(&self) -> &FileKey {
        &self.key
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Returns the byte range `[start, end)` of `line` (1-indexed), or
    /// `None` if `line` is out of range.
    pub fn line_span(&self, line: u32) -> Option<(usize, usize)> {
        let idx = line.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .copied()
            .unwrap_or(self.bytes.len());
        Some((start, end))
    }

    /// Returns the text of `line` (1-indexed) with its trailing newline
    /// stripped, or `None` if out of range or not valid UTF-8.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let (start, end) = self.line_span(line)?;
        let mut slice = &self.bytes[start..end];
        if slice.last() == Some(&b'\n') {
            slice = &slice[..slice.len() - 1];
        }
        if slice.last() == Some(&b'\r') {
            slice = &slice[..slice.len() - 1];
        }
        std::str::from_utf8(slice).ok()
    }

    /// Maps a byte offset to its 1-indexed line number in amortized O(1) via
    /// binary search over the prebuilt `line_starts` index — never
    /// re-scans the source.
    pub fn position_to_line(&self, byte_offset: usize) -> u32 {
        match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => (idx + 1) as u32,
            Err(idx) => idx as u32, // idx is the count of starts <= offset
        }
        .max(1)
    }

    pub fn lines(&self) -> impl Iterator<Item = (u32, &str)> {
        (1..=self.line_count()).filter_map(move |l| self.line_text(l).map(|t| (l, t)))
    }
}
