//! C3: line-accurate multiline comment state.
//!
//! A single forward pass over the source bytes, maintaining the state spec
//! §4.3 calls for: `in_block_comment` and `in_long_string`. The AST produced
//! by the parser facade (C2) doesn't carry trivia spans, so this is the only
//! place that knows whether a given line's bytes sit inside a `--[[ ... ]]`
//! block comment or a `[[ ... ]]` long-bracket string — both of which can
//! span many lines and must not be misclassified as CODE by the static
//! analyzer (C4).

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    /// Rest of the current physical line is a `--` comment; doesn't carry
    /// across a newline.
    LineComment,
    /// Inside `--[=*[ ... ]=*]`, `level` is the number of `=` in the
    /// opening bracket.
    BlockComment { level: usize },
    /// Inside a long-bracket string literal `[=*[ ... ]=*]` that wasn't
    /// introduced by `--`.
    LongString { level: usize },
}

/// Per-line output of the comment scanner: true iff any non-whitespace byte
/// on that line sits inside a block comment.
pub type CommentMap = HashMap<u32, bool>;

/// Scans `source` and returns, for every line 1..=line_count, whether that
/// line is (at least partially) inside a block comment.
pub fn scan_comments(source: &[u8]) -> CommentMap {
    let mut map = CommentMap::new();
    let mut state = ScanState::Normal;
    let mut line: u32 = 1;
    let mut line_saw_block_comment_byte = false;
    let mut line_has_any_non_ws = false;

    let mut i = 0usize;
    let n = source.len();
    while i < n {
        let b = source[i];

        if b == b'\n' {
            map.insert(line, line_saw_block_comment_byte && line_has_any_non_ws);
            line += 1;
            line_saw_block_comment_byte = false;
            line_has_any_non_ws = false;
            if state == ScanState::LineComment {
                state = ScanState::Normal;
            }
            i += 1;
            continue;
        }

        if !b.is_ascii_whitespace() {
            line_has_any_non_ws = true;
        }

        match state {
            ScanState::Normal => {
                if let Some(level) = long_bracket_open(&source[i..]) {
                    // Does this immediately follow `--`? Walk back over the
                    // open bracket we just matched to see if `--` preceded
                    // it with nothing in between.
                    if i >= 2 && &source[i - 2..i] == b"--" {
                        state = ScanState::BlockComment { level };
                        line_saw_block_comment_byte = true;
                        i += level + 2;
                        continue;
                    } else {
                        state = ScanState::LongString { level };
                        i += level + 2;
                        continue;
                    }
                }
                if b == b'-' && source.get(i + 1) == Some(&b'-') {
                    // Peek past `--` for a long-bracket open; if present it
                    // was already handled above on a subsequent byte scan,
                    // but we must not treat `--` as a line comment if the
                    // very next bytes are `[=*[` — check directly here so a
                    // same-line `--[[` doesn't get misread as line comment
                    // first.
                    if long_bracket_open(&source[i + 2..]).is_some() {
                        // Let the loop re-enter Normal state at i+2 and the
                        // branch above will catch the bracket.
                        i += 2;
                        continue;
                    }
                    state = ScanState::LineComment;
                    i += 2;
                    continue;
                }
                i += 1;
            }
            ScanState::LineComment => {
                i += 1;
            }
            ScanState::BlockComment { level } => {
                line_saw_block_comment_byte = true;
                if long_bracket_close(&source[i..], level) {
                    i += level + 2;
                    state = ScanState::Normal;
                    continue;
                }
                i += 1;
            }
            ScanState::LongString { level } => {
                if long_bracket_close(&source[i..], level) {
                    i += level + 2;
                    state = ScanState::Normal;
                    continue;
                }
                i += 1;
            }
        }
    }

    // Final (possibly partial) line, if the source doesn't end in `\n`.
    if line_has_any_non_ws || !source.is_empty() {
        map.entry(line)
            .or_insert(line_saw_block_comment_byte && line_has_any_non_ws);
    }

    map
}

/// Matches `[=*[` at the start of `bytes`, returning the number of `=`s.
fn long_bracket_open(bytes: &[u8]) -> Option<usize> {
    if bytes.first() != Some(&b'[') {
        return None;
    }
    let mut level = 0;
    while bytes.get(1 + level) == Some(&b'=') {
        level += 1;
    }
    if bytes.get(1 + level) == Some(&b'[') {
        Some(level)
    } else {
        None
    }
}

/// Matches `]=*]` (with exactly `level` `=`s) at the start of `bytes`.
fn long_bracket_close(bytes: &[u8], level: usize) -> bool {
    if bytes.first() != Some(&b']') {
        return false;
    }
    for k in 0..level {
        if bytes.get(1 + k) != Some(&b'=') {
            return false;
        }
    }
    bytes.get(1 + level) == Some(&b']')
}

/// Convenience accessor with the conservative default (not a comment) for
/// lines the scanner didn't visit (e.g. one past EOF).
pub fn is_in_block_comment(map: &CommentMap, line: u32) -> bool {
    map.get(&line).copied().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_comment_is_not_block_comment() {
        let map = scan_comments(b"-- hello\nlocal x = 1\n");
        assert!(!is_in_block_comment(&map, 1));
        assert!(!is_in_block_comment(&map, 2));
    }

    #[test]
    fn block_comment_spans_multiple_lines() {
        let src = b"--[[\nthis is all\ncomment\n]]\nlocal x = 1\n";
        let map = scan_comments(src);
        assert!(is_in_block_comment(&map, 1));
        assert!(is_in_block_comment(&map, 2));
        assert!(is_in_block_comment(&map, 3));
        assert!(is_in_block_comment(&map, 4));
        assert!(!is_in_block_comment(&map, 5));
    }

    #[test]
    fn long_bracket_level_must_match_to_close() {
        let src = b"--[==[\nstill open ]]\nnow closes ]==]\nlocal y = 2\n";
        let map = scan_comments(src);
        assert!(is_in_block_comment(&map, 1));
        assert!(is_in_block_comment(&map, 2));
        assert!(is_in_block_comment(&map, 3));
        assert!(!is_in_block_comment(&map, 4));
    }

    #[test]
    fn line_comment_before_block_open_is_inert() {
        // The `--` starts a line comment; the `[[` after it never opens a
        // real block because it's just text inside that line comment.
        let src = b"-- see [[ example ]] above\nlocal z = 3\n";
        let map = scan_comments(src);
        assert!(!is_in_block_comment(&map, 1));
        assert!(!is_in_block_comment(&map, 2));
    }

    #[test]
    fn long_string_is_not_reported_as_block_comment() {
        let src = b"local s = [[\nmultiline\nstring\n]]\n";
        let map = scan_comments(src);
        assert!(!is_in_block_comment(&map, 1));
        assert!(!is_in_block_comment(&map, 2));
    }
}
