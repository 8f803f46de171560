//! C5: runtime data store. Thread-hostile (single-writer, §5) in-process
//! state holding per-file line/function/block/condition records, with the
//! three-state line model (executable, executed, covered) and the
//! invariants tying them together enforced on every mutating operation.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::analyzer::{BlockId, CodeMap, ConditionId, LineType};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use crate::error::{CoverageError, Result};
use crate::path::FileKey;
use crate::source::SourceBuffer;

#[derive(Debug, Clone, Default)]
pub struct LineRecord {
    pub executable: bool,
    pub executed: bool,
    pub covered: bool,
    pub execution_count: u64,
    pub line_type: LineType,
    pub content: String,
}

impl LineRecord {
    fn check_invariants(&self) -> Result<()> {
        if matches!(self.line_type, LineType::Comment | LineType::Blank)
            && (self.executable || self.executed || self.covered)
        {
            return Err(CoverageError::InvariantViolation(
                "comment/blank line cannot be executable, executed, or covered".to_string(),
            ));
        }
        if self.executed && !self.executable {
            return Err(CoverageError::InvariantViolation(
                "executed line must be executable".to_string(),
            ));
        }
        if self.covered && !self.executed {
            return Err(CoverageError::InvariantViolation(
                "covered line must be executed".to_string(),
            ));
        }
        if self.execution_count > 0 && !self.executed {
            return Err(CoverageError::InvariantViolation(
                "a line with a nonzero execution count must be executed".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionRecord {
    pub executed: bool,
    pub covered: bool,
    pub execution_count: u64,
    pub lines: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct BlockRecord {
    pub executed: bool,
    pub execution_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConditionRecord {
    pub executed: bool,
    pub executed_true: bool,
    pub executed_false: bool,
    pub execution_count: u64,
}

/// Soft growth bound for auto-created [`LineRecord`]s via
/// `mark_line_executed` on an unseen line number (§4.5). Large enough that
/// legitimate dynamically-generated `loadstring` chunks aren't rejected,
/// small enough that a garbage line number can't balloon a FileRecord.
const LINE_AUTO_CREATE_BOUND: u32 = 1_000_000;

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub key: FileKey,
    pub lines: BTreeMap<u32, LineRecord>,
    pub functions: HashMap<String, FunctionRecord>,
    pub blocks: HashMap<BlockId, BlockRecord>,
    pub conditions: HashMap<ConditionId, ConditionRecord>,
    pub code_map: Option<CodeMap>,
    pub diagnostics: Vec<Diagnostic>,
    pub relationships_fixed: u64,
    structural_is_executable: bool,
}

impl FileRecord {
    fn new(key: FileKey, structural_is_executable: bool) -> Self {
        Self {
            key,
            lines: BTreeMap::new(),
            functions: HashMap::new(),
            blocks: HashMap::new(),
            conditions: HashMap::new(),
            code_map: None,
            diagnostics: Vec::new(),
            relationships_fixed: 0,
            structural_is_executable,
        }
    }

    pub fn executable_lines(&self) -> u64 {
        self.lines.values().filter(|l| l.executable).count() as u64
    }

    pub fn executed_lines(&self) -> u64 {
        self.lines.values().filter(|l| l.executed).count() as u64
    }

    pub fn covered_lines(&self) -> u64 {
        self.lines.values().filter(|l| l.covered).count() as u64
    }

    pub fn total_functions(&self) -> u64 {
        self.functions.len() as u64
    }

    pub fn executed_functions(&self) -> u64 {
        self.functions.values().filter(|f| f.executed).count() as u64
    }

    pub fn covered_functions(&self) -> u64 {
        self.functions.values().filter(|f| f.covered).count() as u64
    }

    pub fn is_covered(&self) -> bool {
        self.covered_lines() > 0
    }
}

fn line_is_executable(line_type: LineType, structural_is_executable: bool) -> bool {
    match line_type {
        LineType::Code => true,
        LineType::Structure => structural_is_executable,
        LineType::Comment | LineType::Blank => false,
    }
}

/// A single file's contribution to [`CoverageData::diff`]: lines that
/// became executed in one run but weren't in the baseline it's compared
/// against.
#[derive(Debug, Clone)]
pub struct FileCoverageDiff {
    pub key: FileKey,
    pub newly_executed_lines: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryCounters {
    pub executable_lines: u64,
    pub executed_lines: u64,
    pub covered_lines: u64,
    pub total_functions: u64,
    pub executed_functions: u64,
    pub covered_functions: u64,
    pub total_files: u64,
    pub covered_files: u64,
    pub line_coverage: f64,
    pub execution_coverage: f64,
    pub function_coverage: f64,
    pub file_coverage: f64,
    pub overall_coverage: f64,
}

#[derive(Debug)]
pub struct CoverageData {
    files: HashMap<FileKey, FileRecord>,
    summary: SummaryCounters,
    /// Whether the tracker is currently running. `reset()` refuses while
    /// true (§4.5: "Only when tracker is stopped.").
    active: bool,
    structural_is_executable: bool,
    /// Diagnostics that describe the run as a whole rather than any single
    /// file, e.g. a summary recomputation correcting a stale total.
    run_diagnostics: Vec<Diagnostic>,
}

impl CoverageData {
    pub fn create(structural_is_executable: bool) -> Self {
        Self {
            files: HashMap::new(),
            summary: SummaryCounters::default(),
            active: true,
            structural_is_executable,
            run_diagnostics: Vec::new(),
        }
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn summary(&self) -> &SummaryCounters {
        &self.summary
    }

    pub fn set_summary(&mut self, summary: SummaryCounters) {
        self.summary = summary;
    }

    pub fn push_run_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.run_diagnostics.push(diagnostic);
    }

    pub fn run_diagnostics(&self) -> &[Diagnostic] {
        &self.run_diagnostics
    }

    pub fn get_file(&self, key: &FileKey) -> Option<&FileRecord> {
        self.files.get(key)
    }

    pub fn get_file_mut(&mut self, key: &FileKey) -> Option<&mut FileRecord> {
        self.files.get_mut(key)
    }

    pub fn iter_files(&self) -> impl Iterator<Item = (&FileKey, &FileRecord)> {
        self.files.iter()
    }

    pub fn iter_files_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.files.values_mut()
    }

    /// Idempotent: re-initializing an already-seeded file leaves it
    /// unchanged (§8 "initialize_file(k,s); initialize_file(k,s) leaves
    /// FileRecord unchanged").
    pub fn initialize_file(&mut self, key: &FileKey, source: &SourceBuffer) {
        if self.files.contains_key(key) {
            return;
        }
        let mut record = FileRecord::new(key.clone(), self.structural_is_executable);
        for line in 1..=source.line_count() {
            record.lines.insert(
                line,
                LineRecord {
                    executable: false,
                    executed: false,
                    covered: false,
                    execution_count: 0,
                    line_type: LineType::Code,
                    content: source.line_text(line).unwrap_or("").to_string(),
                },
            );
        }
        self.files.insert(key.clone(), record);
    }

    /// Applies every line's classification from `code_map` via the same
    /// path `set_line_classification` uses, then stores the map itself for
    /// `mark_block_executed`/`mark_condition_outcome` to walk.
    pub fn attach_code_map(&mut self, key: &FileKey, code_map: CodeMap) {
        if let Some(record) = self.files.get_mut(key) {
            for line in 1..=code_map.line_count {
                let _ = Self::set_line_classification_inner(record, line, code_map.line_type(line));
            }
            record.code_map = Some(code_map);
        }
    }

    fn set_line_classification_inner(
        record: &mut FileRecord,
        line: u32,
        line_type: LineType,
    ) -> Result<()> {
        let executable = line_is_executable(line_type, record.structural_is_executable);
        let entry = record
            .lines
            .entry(line)
            .or_insert_with(LineRecord::default);
        let was_executable = entry.executable;
        entry.line_type = line_type;
        entry.executable = executable;
        if was_executable && !executable {
            entry.executed = false;
            entry.covered = false;
            entry.execution_count = 0;
            record.diagnostics.push(
                Diagnostic::new(
                    Severity::Info,
                    DiagnosticCode::LineClassificationReset,
                    format!("line {line} reclassified to a non-executable type; execution state reset"),
                )
                .with_line(line),
            );
        }
        entry.check_invariants()
    }

    pub fn set_line_classification(&mut self, key: &FileKey, line: u32, line_type: LineType) -> Result<()> {
        let record = self
            .files
            .get_mut(key)
            .ok_or_else(|| CoverageError::InvariantViolation(format!("unknown file '{}'", key)))?;
        Self::set_line_classification_inner(record, line, line_type)
    }

    pub fn mark_line_executed(&mut self, key: &FileKey, line: u32) -> Result<()> {
        let record = self
            .files
            .get_mut(key)
            .ok_or_else(|| CoverageError::InvariantViolation(format!("unknown file '{}'", key)))?;

        let max_known = record.lines.keys().copied().max().unwrap_or(0);
        if !record.lines.contains_key(&line) {
            if line > max_known + LINE_AUTO_CREATE_BOUND {
                return Err(CoverageError::InvariantViolation(format!(
                    "line {line} is outside the auto-create growth bound"
                )));
            }
            record.lines.insert(
                line,
                LineRecord {
                    executable: true,
                    executed: false,
                    covered: false,
                    execution_count: 0,
                    line_type: LineType::Code,
                    content: String::new(),
                },
            );
        }

        let entry = record.lines.get_mut(&line).unwrap();
        if matches!(entry.line_type, LineType::Comment | LineType::Blank) {
            return Err(CoverageError::InvariantViolation(format!(
                "line {line} is a comment/blank line and cannot be marked executed"
            )));
        }
        // A firing tracker callback is stronger evidence than static
        // classification; promote to executable rather than drop the event,
        // matching the "executability inferred when static analysis was
        // unavailable" behavior named in the purpose statement.
        entry.executable = true;
        entry.execution_count += 1;
        entry.executed = true;
        entry.check_invariants()
    }

    pub fn mark_line_covered(&mut self, key: &FileKey, line: u32) -> Result<()> {
        let record = self
            .files
            .get_mut(key)
            .ok_or_else(|| CoverageError::InvariantViolation(format!("unknown file '{}'", key)))?;
        let entry = record
            .lines
            .get_mut(&line)
            .ok_or_else(|| CoverageError::InvariantViolation(format!("line {line} has no record")))?;
        if !entry.executed || !entry.executable {
            return Err(CoverageError::InvariantViolation(format!(
                "line {line} cannot be covered before it is executed"
            )));
        }
        entry.covered = true;
        Ok(())
    }

    pub fn register_function(
        &mut self,
        key: &FileKey,
        func_id: &str,
        start: u32,
        end: u32,
    ) {
        if let Some(record) = self.files.get_mut(key) {
            record
                .functions
                .entry(func_id.to_string())
                .or_insert_with(|| FunctionRecord {
                    executed: false,
                    covered: false,
                    execution_count: 0,
                    lines: (start..=end).collect(),
                });
        }
    }

    pub fn mark_function_executed(&mut self, key: &FileKey, func_id: &str) -> Result<()> {
        let record = self
            .files
            .get_mut(key)
            .ok_or_else(|| CoverageError::InvariantViolation(format!("unknown file '{}'", key)))?;
        let entry = record
            .functions
            .get_mut(func_id)
            .ok_or_else(|| CoverageError::InvariantViolation(format!("unknown function '{func_id}'")))?;
        entry.execution_count += 1;
        entry.executed = true;
        Ok(())
    }

    pub fn mark_block_executed(&mut self, key: &FileKey, block_id: BlockId) -> Result<()> {
        let record = self
            .files
            .get_mut(key)
            .ok_or_else(|| CoverageError::InvariantViolation(format!("unknown file '{}'", key)))?;
        let mut current = Some(block_id);
        let code_map = record
            .code_map
            .clone()
            .ok_or_else(|| CoverageError::InvariantViolation("code map not attached".to_string()))?;
        while let Some(id) = current {
            let entry = record.blocks.entry(id).or_insert_with(BlockRecord::default);
            if id == block_id {
                entry.execution_count += 1;
            }
            entry.executed = true;
            current = code_map.blocks.get(id).and_then(|b| b.parent_id);
        }
        Ok(())
    }

    pub fn mark_condition_outcome(&mut self, key: &FileKey, cond_id: ConditionId, outcome: bool) -> Result<()> {
        let record = self
            .files
            .get_mut(key)
            .ok_or_else(|| CoverageError::InvariantViolation(format!("unknown file '{}'", key)))?;
        let code_map = record
            .code_map
            .clone()
            .ok_or_else(|| CoverageError::InvariantViolation("code map not attached".to_string()))?;

        let entry = record.conditions.entry(cond_id).or_insert_with(ConditionRecord::default);
        entry.execution_count += 1;
        entry.executed = true;
        if outcome {
            entry.executed_true = true;
        } else {
            entry.executed_false = true;
        }

        // Propagate "executed" up through compound conditions this one is a
        // component of. The specific true/false combination of a compound
        // ancestor depends on short-circuit evaluation semantics the data
        // store doesn't model; only `executed` is propagated.
        for (id, cond) in code_map.conditions.iter().enumerate() {
            if cond.is_compound && cond.components.contains(&cond_id) {
                let ancestor = record.conditions.entry(id).or_insert_with(ConditionRecord::default);
                ancestor.executed = true;
            }
        }
        Ok(())
    }

    /// Per-file delta against `baseline`: lines newly executed in `self`
    /// that weren't executed in `baseline`. Used to report what a single
    /// test run added on top of a suite's accumulated coverage.
    pub fn diff(&self, baseline: &CoverageData) -> Vec<FileCoverageDiff> {
        let mut out = Vec::new();
        for (key, file) in &self.files {
            let baseline_file = baseline.files.get(key);
            let mut newly_executed_lines = Vec::new();
            for (&line, record) in &file.lines {
                let was_executed = baseline_file
                    .and_then(|f| f.lines.get(&line))
                    .map(|l| l.executed)
                    .unwrap_or(false);
                if record.executed && !was_executed {
                    newly_executed_lines.push(line);
                }
            }
            if !newly_executed_lines.is_empty() {
                out.push(FileCoverageDiff { key: key.clone(), newly_executed_lines });
            }
        }
        out
    }

    /// Only permitted once the tracker has stopped (§4.5).
    pub fn reset(&mut self) -> Result<()> {
        if self.active {
            return Err(CoverageError::InvariantViolation(
                "cannot reset CoverageData while the tracker is active".to_string(),
            ));
        }
        self.files.clear();
        self.summary = SummaryCounters::default();
        self.run_diagnostics.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::comment_scanner::scan_comments;
    use crate::config::AnalyzerConfig;
    use crate::parser;

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
    fn initialize_file_is_idempotent() {
        let (mut data, key) = setup("local x = 1\n");
        let before = data.get_file(&key).unwrap().lines.len();
        let buf = SourceBuffer::new(key.clone(), b"local x = 1\n".to_vec());
        data.initialize_file(&key, &buf);
        assert_eq!(data.get_file(&key).unwrap().lines.len(), before);
    }

    #[test]
    fn mark_line_covered_requires_executed() {
        let (mut data, key) = setup("local x = 1\nlocal y = 2\n");
        let err = data.mark_line_covered(&key, 1).unwrap_err();
        assert!(matches!(err, CoverageError::InvariantViolation(_)));
        data.mark_line_executed(&key, 1).unwrap();
        data.mark_line_covered(&key, 1).unwrap();
        assert!(data.get_file(&key).unwrap().lines[&1].covered);
    }

    #[test]
    fn mark_line_executed_auto_creates_within_bound() {
        let (mut data, key) = setup("local x = 1\n");
        data.mark_line_executed(&key, 5).unwrap();
        let line = &data.get_file(&key).unwrap().lines[&5];
        assert!(line.executable);
        assert!(line.executed);
    }

    #[test]
    fn reset_fails_while_active() {
        let (mut data, _key) = setup("local x = 1\n");
        assert!(data.reset().is_err());
        data.stop();
        assert!(data.reset().is_ok());
    }

    #[test]
    fn comment_line_cannot_become_executable() {
        let (mut data, key) = setup("-- a comment\n");
        let line = &data.get_file(&key).unwrap().lines[&1];
        assert!(!line.executable);
        assert_eq!(line.line_type, LineType::Comment);
    }

    #[test]
    fn reclassifying_to_non_executable_resets_state() {
        let (mut data, key) = setup("local x = 1\n");
        data.mark_line_executed(&key, 1).unwrap();
        data.set_line_classification(&key, 1, LineType::Blank).unwrap();
        let line = &data.get_file(&key).unwrap().lines[&1];
        assert!(!line.executable);
        assert!(!line.executed);
        assert_eq!(line.execution_count, 0);
    }

    #[test]
    fn diff_reports_only_newly_executed_lines() {
        let (mut baseline, key) = setup("local x = 1\nlocal y = 2\n");
        baseline.set_line_classification(&key, 1, LineType::Code).unwrap();
        baseline.mark_line_executed(&key, 1).unwrap();

        let (mut current, _) = setup("local x = 1\nlocal y = 2\n");
        current.set_line_classification(&key, 1, LineType::Code).unwrap();
        current.set_line_classification(&key, 2, LineType::Code).unwrap();
        current.mark_line_executed(&key, 1).unwrap();
        current.mark_line_executed(&key, 2).unwrap();

        let diff = current.diff(&baseline);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].newly_executed_lines, vec![2]);
    }

    #[test]
    fn block_execution_propagates_to_ancestors() {
        let (mut data, key) = setup("if a then\n  b()\nend\n");
        let then_block = data
            .get_file(&key)
            .unwrap()
            .code_map
            .as_ref()
            .unwrap()
            .blocks
            .iter()
            .position(|b| matches!(b.kind, crate::analyzer::BlockKind::ThenBlock))
            .unwrap();
        data.mark_block_executed(&key, then_block).unwrap();
        let file = data.get_file(&key).unwrap();
        assert!(file.blocks[&crate::analyzer::ROOT_BLOCK].executed);
    }
}
