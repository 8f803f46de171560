//! C7: source-to-source instrumenter. Rewrites a [`SourceBuffer`] so that
//! executing it calls back into the tracker (C6), and builds the
//! [`SourceMap`] the error translator (C10) and patch-up (C8) both consult.

use std::collections::HashMap;

use crate::analyzer::{CodeMap, LineType};
use crate::cache::ContentCache;
use crate::config::InstrumentationConfig;
use crate::error::{CoverageError, Result};
use crate::path::FileKey;
use crate::source::SourceBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMapLineKind {
    Original,
    LineTracking,
    FunctionTracking,
    BlockTracking,
}

#[derive(Debug, Clone, Copy)]
pub struct OriginalToInstrumented {
    pub instrumented_line: u32,
    pub has_tracking: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct InstrumentedToOriginal {
    pub kind: SourceMapLineKind,
    pub original_line: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    pub original_to_instrumented: HashMap<u32, OriginalToInstrumented>,
    pub instrumented_to_original: HashMap<u32, InstrumentedToOriginal>,
}

impl SourceMap {
    fn record(&mut self, instrumented_line: u32, kind: SourceMapLineKind, original_line: u32, has_tracking: bool) {
        self.instrumented_to_original
            .insert(instrumented_line, InstrumentedToOriginal { kind, original_line });
        let entry = self
            .original_to_instrumented
            .entry(original_line)
            .or_insert(OriginalToInstrumented { instrumented_line, has_tracking });
        if has_tracking {
            entry.has_tracking = true;
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstrumentOutput {
    pub source: Vec<u8>,
    pub sourcemap: SourceMap,
    /// Set when the syntax validator had to append a repair sequence.
    pub repaired: bool,
}

const PREAMBLE_STATIC: &str =
    "local __coverage = require(\"coverage_tracker\")\nlocal __cov_activate_file, __cov_track_line, __cov_track_function, __cov_track_block = __coverage.activate_file, __coverage.track_line, __coverage.track_function, __coverage.track_block\n";

fn call_prefix(config: &InstrumentationConfig) -> &'static str {
    if config.static_imports {
        "__cov"
    } else {
        "coverage_tracker"
    }
}

fn activate_call(prefix: &str, key: &str) -> String {
    qualify(prefix, "activate_file", &format!("(\"{key}\")"))
}

fn track_line_call(prefix: &str, key: &str, line: u32) -> String {
    qualify(prefix, "track_line", &format!("(\"{key}\", {line})"))
}

fn track_function_call(prefix: &str, key: &str, line: u32) -> String {
    qualify(prefix, "track_function", &format!("(\"{key}\", {line})"))
}

fn qualify(prefix: &str, name: &str, args: &str) -> String {
    if prefix == "__cov" {
        format!("__cov_{name}{args}")
    } else {
        format!("{prefix}.{name}{args}")
    }
}

fn indent_of(line: &str) -> String {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
}

/// Produces instrumented source bytes + sourcemap for `source`, given its
/// already-computed `code_map`. Returns `InstrumentationTooLarge` if the
/// caller should use the large-file shim instead (checked by the caller,
/// not here, since the caller also decides hook-mode registration).
pub fn instrument(
    source: &SourceBuffer,
    code_map: &CodeMap,
    structural_is_executable: bool,
    config: &InstrumentationConfig,
    cache: &mut ContentCache<InstrumentOutput>,
) -> Result<InstrumentOutput> {
    if config.cache_enabled {
        if let Some(cached) = cache.get(source.key(), source.content_hash()) {
            return Ok(cached.clone());
        }
    }

    let key = source.key().as_str().to_string();
    let prefix = call_prefix(config);
    let mut out_lines: Vec<String> = Vec::new();
    let mut sourcemap = SourceMap::default();

    if config.static_imports {
        for preamble_line in PREAMBLE_STATIC.lines() {
            out_lines.push(preamble_line.to_string());
        }
    }

    for line in 1..=code_map.line_count {
        let text = source.line_text(line).unwrap_or("").to_string();
        let executable = code_map.is_executable_line(line, structural_is_executable);
        let line_type = code_map.line_type(line);

        // COMMENT/BLANK lines are never executable and always pass through.
        // A STRUCTURE line only reaches the shape rules below when the
        // caller's policy counts structural lines as executable; otherwise
        // it passes through like a comment.
        if line_type == LineType::Comment || line_type == LineType::Blank || !executable {
            let out_line_no = out_lines.len() as u32 + 1;
            out_lines.push(text);
            sourcemap.record(out_line_no, SourceMapLineKind::Original, line, false);
            continue;
        }

        let trimmed = text.trim();
        let indent = indent_of(&text);

        if trimmed == "do" || trimmed == "repeat" {
            let out_line_no = out_lines.len() as u32 + 1;
            out_lines.push(text.clone());
            sourcemap.record(out_line_no, SourceMapLineKind::Original, line, false);
            let body_indent = format!("{indent}  ");
            let call = track_line_call(prefix, &key, line);
            let tracking_no = out_lines.len() as u32 + 1;
            out_lines.push(format!("{body_indent}{call}"));
            sourcemap.record(tracking_no, SourceMapLineKind::LineTracking, line, true);
        } else if trimmed == "end" || trimmed == "else" || trimmed.starts_with("until") {
            let out_line_no = out_lines.len() as u32 + 1;
            out_lines.push(text.clone());
            sourcemap.record(out_line_no, SourceMapLineKind::Original, line, false);
            let call = track_line_call(prefix, &key, line);
            let tracking_no = out_lines.len() as u32 + 1;
            out_lines.push(format!("{indent}{call}"));
            sourcemap.record(tracking_no, SourceMapLineKind::LineTracking, line, true);
        } else if trimmed.ends_with("then") || trimmed.ends_with(" do") {
            let call = track_line_call(prefix, &key, line);
            let out_line_no = out_lines.len() as u32 + 1;
            out_lines.push(format!("{text} {call}"));
            sourcemap.record(out_line_no, SourceMapLineKind::LineTracking, line, true);
        } else if let Some(func) = code_map.function_by_start_line(line) {
            let out_line_no = out_lines.len() as u32 + 1;
            out_lines.push(text.clone());
            sourcemap.record(out_line_no, SourceMapLineKind::Original, line, false);
            let body_indent = format!("{indent}  ");
            let call = track_function_call(prefix, &key, func.start_line);
            let tracking_no = out_lines.len() as u32 + 1;
            out_lines.push(format!("{body_indent}{call}"));
            sourcemap.record(tracking_no, SourceMapLineKind::FunctionTracking, line, true);
        } else if trimmed.ends_with('{') {
            let call = track_line_call(prefix, &key, line);
            let before_no = out_lines.len() as u32 + 1;
            out_lines.push(format!("{indent}{call}"));
            sourcemap.record(before_no, SourceMapLineKind::LineTracking, line, true);
            let out_line_no = out_lines.len() as u32 + 1;
            out_lines.push(text);
            sourcemap.record(out_line_no, SourceMapLineKind::Original, line, false);
        } else {
            let activate = activate_call(prefix, &key);
            let track = track_line_call(prefix, &key, line);
            let before_no = out_lines.len() as u32 + 1;
            out_lines.push(format!("{indent}{activate}; {track}"));
            sourcemap.record(before_no, SourceMapLineKind::LineTracking, line, true);
            let out_line_no = out_lines.len() as u32 + 1;
            out_lines.push(text);
            sourcemap.record(out_line_no, SourceMapLineKind::Original, line, false);
        }
    }

    let mut body = out_lines.join("\n");
    body.push('\n');
    let repaired = repair_syntax(&mut body)?;

    let output = InstrumentOutput {
        source: body.into_bytes(),
        sourcemap,
        repaired,
    };
    if config.cache_enabled {
        cache.insert(source.key(), source.content_hash(), output.clone());
    }
    Ok(output)
}

/// Large-file fallback (§4.7): a minimal shim instead of full rewriting.
pub fn large_file_shim(source: &SourceBuffer) -> Vec<u8> {
    let key = source.key().as_str();
    format!(
        "coverage_tracker.activate_file(\"{key}\")\nreturn loadstring_original_source(\"{key}\")\n"
    )
    .into_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Paren,
    Brace,
    Bracket,
    Keyword,
}

/// Balanced-delimiter + keyword-pair scanner, suppressing recognition
/// inside strings/comments/coverage-call spans. Appends the minimal closing
/// sequence (most-nested first) for anything still open at EOF.
fn repair_syntax(body: &mut String) -> Result<bool> {
    use crate::parser::lexer::{tokenize, Keyword, TokenKind};

    let tokens = match tokenize(body.as_bytes()) {
        Ok(t) => t,
        // The rewriter itself never introduces a lexical error into
        // otherwise-valid source; if tokenization fails here the rewrite is
        // unsafe to use as-is.
        Err(_) => return Err(CoverageError::InstrumentationUnsafe {
            file: String::new(),
            reason: "rewritten output failed to tokenize".to_string(),
        }),
    };

    // `while`/`for` push their own opener already; their trailing `do` is
    // part of the same construct and must not push a second one. Only a
    // `do` that stands on its own (a bare do-block) opens independently.
    let mut awaiting_do = false;
    let mut stack: Vec<Delim> = Vec::new();
    for tok in &tokens {
        match tok.kind {
            TokenKind::LParen => stack.push(Delim::Paren),
            TokenKind::LBrace => stack.push(Delim::Brace),
            TokenKind::LBracket => stack.push(Delim::Bracket),
            TokenKind::RParen => {
                if stack.pop() != Some(Delim::Paren) {
                    return Err(unsafe_err("unmatched ')'"));
                }
            }
            TokenKind::RBrace => {
                if stack.pop() != Some(Delim::Brace) {
                    return Err(unsafe_err("unmatched '}'"));
                }
            }
            TokenKind::RBracket => {
                if stack.pop() != Some(Delim::Bracket) {
                    return Err(unsafe_err("unmatched ']'"));
                }
            }
            TokenKind::Keyword(Keyword::While | Keyword::For) => {
                stack.push(Delim::Keyword);
                awaiting_do = true;
            }
            TokenKind::Keyword(Keyword::If | Keyword::Function) => stack.push(Delim::Keyword),
            TokenKind::Keyword(Keyword::Repeat) => stack.push(Delim::Keyword),
            TokenKind::Keyword(Keyword::Do) => {
                if awaiting_do {
                    awaiting_do = false;
                } else {
                    stack.push(Delim::Keyword);
                }
            }
            TokenKind::Keyword(Keyword::End | Keyword::Until) => {
                if stack.pop() != Some(Delim::Keyword) {
                    return Err(unsafe_err("unmatched block terminator"));
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        return Ok(false);
    }

    for delim in stack.iter().rev() {
        let closer = match delim {
            Delim::Paren => ")",
            Delim::Brace => "}",
            Delim::Bracket => "]",
            Delim::Keyword => "end",
        };
        body.push_str(closer);
        body.push('\n');
    }
    Ok(true)
}

fn unsafe_err(reason: &str) -> CoverageError {
    CoverageError::InstrumentationUnsafe {
        file: String::new(),
        reason: reason.to_string(),
    }
}
