//! C8: patch-up pass. Runs after a file's code map and execution data have
//! both settled (post-analysis, or periodically during a long-lived run) to
//! reconcile state the analyzer or a live tracker callback could have left
//! inconsistent: orphaned block parentage, a function marked executed whose
//! own lines never individually fired, and executability drift between a
//! [`CodeMap`]'s classification and the [`LineRecord`]s built from it.
//!
//! `patch_up` is idempotent: a second call on an already-patched file is a
//! no-op, since every correction it makes is gated on the specific
//! inconsistency it exists to fix.

use crate::analyzer::ROOT_BLOCK;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use crate::error::{CoverageError, Result};
use crate::path::FileKey;
use crate::store::CoverageData;

/// Runs every patch-up correction for `key` against `data`.
pub fn patch_up(data: &mut CoverageData, key: &FileKey) -> Result<()> {
    reattach_orphaned_blocks(data, key)?;
    resync_line_classification(data, key)?;
    propagate_function_execution(data, key)?;
    Ok(())
}

/// A block is orphaned when its `parent_id` doesn't point at a real block,
/// or points at one that doesn't list it as a child — both can happen when
/// the analyzer's node budget cut the walk short mid-tree (its truncation
/// path still returns whatever blocks it had already built). Orphans are
/// reattached under [`ROOT_BLOCK`].
fn reattach_orphaned_blocks(data: &mut CoverageData, key: &FileKey) -> Result<()> {
    let record = data
        .get_file_mut(key)
        .ok_or_else(|| CoverageError::InvariantViolation(format!("unknown file '{key}'")))?;
    let Some(code_map) = record.code_map.as_mut() else {
        return Ok(());
    };

    let block_count = code_map.blocks.len();
    let mut to_reattach = Vec::new();
    for (id, block) in code_map.blocks.iter().enumerate() {
        if id == ROOT_BLOCK {
            continue;
        }
        let orphaned = match block.parent_id {
            None => true,
            Some(parent) => {
                parent >= block_count || !code_map.blocks[parent].children.contains(&id)
            }
        };
        if orphaned {
            to_reattach.push(id);
        }
    }

    for id in &to_reattach {
        code_map.blocks[*id].parent_id = Some(ROOT_BLOCK);
        if !code_map.blocks[ROOT_BLOCK].children.contains(id) {
            code_map.blocks[ROOT_BLOCK].children.push(*id);
        }
    }

    if !to_reattach.is_empty() {
        record.relationships_fixed += to_reattach.len() as u64;
        record.diagnostics.push(Diagnostic::new(
            Severity::Warning,
            DiagnosticCode::OrphanedBlockReattached,
            format!("reattached {} orphaned block(s) under the root block", to_reattach.len()),
        ));
    }
    Ok(())
}

/// Re-derives every line's `executable` flag from the attached code map.
/// This is the same transition `CoverageData::attach_code_map` already
/// applies on first attach; re-running it here catches drift introduced by
/// `set_line_classification` calls made outside the normal attach path (a
/// host reclassifying a line after a dynamic `loadstring`, for instance).
fn resync_line_classification(data: &mut CoverageData, key: &FileKey) -> Result<()> {
    let Some(record) = data.get_file(key) else {
        return Ok(());
    };
    let Some(code_map) = record.code_map.clone() else {
        return Ok(());
    };
    for line in 1..=code_map.line_count {
        data.set_line_classification(key, line, code_map.line_type(line))?;
    }
    Ok(())
}

/// If a [`crate::store::FunctionRecord`] is executed but one of its lines
/// never individually fired — e.g. a hook-mode call event arrived without a
/// matching line event — back-fill that line's execution rather than let the
/// function/line views disagree. Also promotes a function to `covered` once
/// any of its body lines is covered, since line coverage is the only source
/// of truth for "covered" and nothing else derives the function-level flag.
fn propagate_function_execution(data: &mut CoverageData, key: &FileKey) -> Result<()> {
    let Some(record) = data.get_file(key) else {
        return Ok(());
    };
    let mut lines_to_mark = Vec::new();
    for func in record.functions.values() {
        if !func.executed {
            continue;
        }
        if let Some(&first_line) = func.lines.first() {
            let already = record
                .lines
                .get(&first_line)
                .map(|l| l.executed)
                .unwrap_or(false);
            if !already {
                lines_to_mark.push(first_line);
            }
        }
    }
    for line in lines_to_mark {
        data.mark_line_executed(key, line)?;
    }

    let Some(record) = data.get_file_mut(key) else {
        return Ok(());
    };
    let mut funcs_to_cover = Vec::new();
    for (func_id, func) in &record.functions {
        if !func.covered
            && func
                .lines
                .iter()
                .any(|l| record.lines.get(l).map(|line| line.covered).unwrap_or(false))
        {
            funcs_to_cover.push(func_id.clone());
        }
    }
    for func_id in funcs_to_cover {
        if let Some(func) = record.functions.get_mut(&func_id) {
            func.covered = true;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{self, BlockKind};
    use crate::comment_scanner::scan_comments;
    use crate::config::AnalyzerConfig;
    use crate::parser;
    use crate::source::SourceBuffer;

    fn setup(src: &str) -> (CoverageData, FileKey) {
        let key = FileKey::normalize("/f.lua").unwrap();
        let buf = SourceBuffer::new(key.clone(), src.as_bytes().to_vec());
        let ast = parser::parse(&buf).unwrap();
        let comments = scan_comments(buf.bytes());
        let code_map = analyzer::analyze(&buf, &ast, &comments, &AnalyzerConfig::default());
        let mut data = CoverageData::create(true);
        data.initialize_file(&key, &buf);
        data.attach_code_map(&key, code_map);
        (data, key)
    }

    #[test]
    fn orphaned_block_is_reattached_to_root() {
        let (mut data, key) = setup("if a then\n  b()\nend\n");
        {
            let record = data.get_file_mut(&key).unwrap();
            let code_map = record.code_map.as_mut().unwrap();
            let then_id = code_map
                .blocks
                .iter()
                .position(|b| matches!(b.kind, BlockKind::ThenBlock))
                .unwrap();
            code_map.blocks[then_id].parent_id = Some(9999);
        }
        patch_up(&mut data, &key).unwrap();
        let record = data.get_file(&key).unwrap();
        assert_eq!(record.relationships_fixed, 1);
        let code_map = record.code_map.as_ref().unwrap();
        let then_id = code_map
            .blocks
            .iter()
            .position(|b| matches!(b.kind, BlockKind::ThenBlock))
            .unwrap();
        assert_eq!(code_map.blocks[then_id].parent_id, Some(ROOT_BLOCK));
        assert!(code_map.blocks[ROOT_BLOCK].children.contains(&then_id));
    }

    #[test]
    fn patch_up_is_idempotent() {
        let (mut data, key) = setup("local function f(x)\n  return x\nend\nf(1)\n");
        let func_id = data
            .get_file(&key)
            .unwrap()
            .code_map
            .as_ref()
            .unwrap()
            .functions[0]
            .func_id
            .clone();
        data.register_function(&key, &func_id, 1, 3);
        data.mark_function_executed(&key, &func_id).unwrap();

        patch_up(&mut data, &key).unwrap();
        let after_first = data.get_file(&key).unwrap().lines[&1].execution_count;
        patch_up(&mut data, &key).unwrap();
        let after_second = data.get_file(&key).unwrap().lines[&1].execution_count;
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn function_execution_backfills_its_first_line() {
        let (mut data, key) = setup("local function f(x)\n  return x\nend\nf(1)\n");
        let func_id = data
            .get_file(&key)
            .unwrap()
            .code_map
            .as_ref()
            .unwrap()
            .functions[0]
            .func_id
            .clone();
        data.register_function(&key, &func_id, 1, 3);
        data.mark_function_executed(&key, &func_id).unwrap();
        assert!(!data.get_file(&key).unwrap().lines[&1].executed);

        patch_up(&mut data, &key).unwrap();
        assert!(data.get_file(&key).unwrap().lines[&1].executed);
    }

    #[test]
    fn function_is_covered_once_any_of_its_lines_is_covered() {
        let (mut data, key) = setup("local function f(x)\n  return x\nend\nf(1)\n");
        let func_id = data
            .get_file(&key)
            .unwrap()
            .code_map
            .as_ref()
            .unwrap()
            .functions[0]
            .func_id
            .clone();
        data.register_function(&key, &func_id, 1, 3);
        data.mark_function_executed(&key, &func_id).unwrap();
        data.mark_line_executed(&key, 2).unwrap();
        data.mark_line_covered(&key, 2).unwrap();
        assert!(!data.get_file(&key).unwrap().functions[&func_id].covered);

        patch_up(&mut data, &key).unwrap();
        assert!(data.get_file(&key).unwrap().functions[&func_id].covered);
    }
}
