//! C10: error translator. Rewrites `file:line:` locations an instrumented
//! file's runtime error carries back to the line in the original,
//! un-instrumented source, using the [`SourceMap`] the instrumenter (C7)
//! built for that file. Passes the message through unchanged when no
//! sourcemap is available (an un-instrumented or hook-tracked file).

use crate::instrumenter::SourceMap;
use crate::path::FileKey;

/// Maps a single instrumented-source line back to its original line. Falls
/// back to the identity mapping when `sourcemap` is `None` or doesn't cover
/// `instrumented_line` (a line the rewriter itself introduced that somehow
/// wasn't recorded — should not happen, but a missing entry is not grounds
/// to fail the caller's error path).
pub fn translate_line(instrumented_line: u32, sourcemap: Option<&SourceMap>) -> u32 {
    match sourcemap.and_then(|m| m.instrumented_to_original.get(&instrumented_line)) {
        Some(mapping) => mapping.original_line,
        None => instrumented_line,
    }
}

/// Rewrites every `"{file}:{line}:"` occurrence of `file` in `message` to use
/// the original line number. `file` is matched literally (the `FileKey`'s
/// normalized form), since that's what the rewriter's `activate_file`/
/// `track_line` calls, and therefore a runtime's error strings, embed.
pub fn translate_message(message: &str, file: &FileKey, sourcemap: Option<&SourceMap>) -> String {
    let Some(sourcemap) = sourcemap else {
        return message.to_string();
    };

    let needle = format!("{}:", file.as_str());
    let mut out = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(pos) = rest.find(&needle) {
        out.push_str(&rest[..pos]);
        out.push_str(&needle);
        let after_file = &rest[pos + needle.len()..];
        match split_leading_line_number(after_file) {
            Some((line, remainder)) => {
                let original = translate_line(line, Some(sourcemap));
                out.push_str(&original.to_string());
                rest = remainder;
            }
            None => {
                rest = after_file;
            }
        }
    }
    out.push_str(rest);
    out
}

/// If `text` starts with an ASCII-digit run, returns that number and the
/// remainder of `text` following it.
fn split_leading_line_number(text: &str) -> Option<(u32, &str)> {
    let digit_count = text.chars().take_while(|c| c.is_ascii_digit()).count();
    if digit_count == 0 {
        return None;
    }
    let (digits, remainder) = text.split_at(digit_count);
    digits.parse().ok().map(|line| (line, remainder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrumenter::{InstrumentedToOriginal, SourceMapLineKind};
    use std::collections::HashMap;

    fn sourcemap_with(instrumented: u32, original: u32) -> SourceMap {
        let mut instrumented_to_original = HashMap::new();
        instrumented_to_original.insert(
            instrumented,
            InstrumentedToOriginal { kind: SourceMapLineKind::LineTracking, original_line: original },
        );
        SourceMap { original_to_instrumented: HashMap::new(), instrumented_to_original }
    }

    #[test]
    fn passthrough_without_sourcemap() {
        let msg = "src/foo.lua:12: attempt to index a nil value";
        assert_eq!(translate_message(msg, &FileKey::normalize("/src/foo.lua").unwrap(), None), msg);
    }

    #[test]
    fn rewrites_matching_file_line() {
        let key = FileKey::normalize("/src/foo.lua").unwrap();
        let map = sourcemap_with(14, 7);
        let msg = "/src/foo.lua:14: attempt to call a nil value";
        let out = translate_message(msg, &key, Some(&map));
        assert_eq!(out, "/src/foo.lua:7: attempt to call a nil value");
    }

    #[test]
    fn leaves_unmapped_line_unchanged() {
        let key = FileKey::normalize("/src/foo.lua").unwrap();
        let map = sourcemap_with(14, 7);
        let msg = "/src/foo.lua:99: some other error";
        let out = translate_message(msg, &key, Some(&map));
        assert_eq!(out, "/src/foo.lua:99: some other error");
    }

    #[test]
    fn ignores_unrelated_file_names() {
        let key = FileKey::normalize("/src/foo.lua").unwrap();
        let map = sourcemap_with(14, 7);
        let msg = "/src/bar.lua:14: different file";
        let out = translate_message(msg, &key, Some(&map));
        assert_eq!(out, msg);
    }
}
