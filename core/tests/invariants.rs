//! Property tests for the data store's universally-quantified invariants:
//! these must hold after *any* sequence of data-store operations, not just
//! the handful of example sequences the unit tests in `store.rs` exercise
//! directly.

use coverage_core::analyzer::{self, LineType};
use coverage_core::comment_scanner::scan_comments;
use coverage_core::config::AnalyzerConfig;
use coverage_core::parser;
use coverage_core::path::FileKey;
use coverage_core::source::SourceBuffer;
use coverage_core::store::CoverageData;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    MarkExecuted(u32),
    MarkCovered(u32),
    MarkFunctionExecuted(usize),
    MarkBlockExecuted(usize),
    MarkConditionOutcome(usize, bool),
    Reclassify(u32, LineType),
}

fn op_strategy(line_count: u32, func_count: usize, block_count: usize, cond_count: usize) -> impl Strategy<Value = Op> {
    let line_range = 1..=line_count.max(1);
    prop_oneof![
        line_range.clone().prop_map(Op::MarkExecuted),
        line_range.clone().prop_map(Op::MarkCovered),
        (0..func_count.max(1)).prop_map(Op::MarkFunctionExecuted),
        (0..block_count.max(1)).prop_map(Op::MarkBlockExecuted),
        (0..cond_count.max(1), any::<bool>()).prop_map(|(c, o)| Op::MarkConditionOutcome(c, o)),
        (line_range, prop_oneof![
            Just(LineType::Code),
            Just(LineType::Comment),
            Just(LineType::Blank),
            Just(LineType::Structure),
        ])
            .prop_map(|(l, t)| Op::Reclassify(l, t)),
    ]
}

/// Builds a `CoverageData` with a real, analyzed code map attached for
/// `src`, returning it alongside the counts needed to bound generated ops.
fn data_for(src: &str) -> (CoverageData, FileKey, usize, usize, usize) {
    let key = FileKey::normalize("/f.lua").unwrap();
    let buf = SourceBuffer::new(key.clone(), src.as_bytes().to_vec());
    let ast = parser::parse(&buf).unwrap();
    let comments = scan_comments(buf.bytes());
    let code_map = analyzer::analyze(&buf, &ast, &comments, &AnalyzerConfig::default());
    let (funcs, blocks, conds) = (code_map.functions.len(), code_map.blocks.len(), code_map.conditions.len());

    let mut data = CoverageData::create(true);
    data.initialize_file(&key, &buf);
    for func in &code_map.functions {
        data.register_function(&key, &func.func_id, func.start_line, func.end_line);
    }
    data.attach_code_map(&key, code_map);
    (data, key, funcs.max(1), blocks.max(1), conds.max(1))
}

fn func_id_at(data: &CoverageData, key: &FileKey, index: usize) -> Option<String> {
    data.get_file(key)
        .and_then(|f| f.code_map.as_ref())
        .and_then(|cm| cm.functions.get(index))
        .map(|f| f.func_id.clone())
}

fn apply(data: &mut CoverageData, key: &FileKey, op: &Op) {
    match op {
        Op::MarkExecuted(line) => {
            let _ = data.mark_line_executed(key, *line);
        }
        Op::MarkCovered(line) => {
            let _ = data.mark_line_covered(key, *line);
        }
        Op::MarkFunctionExecuted(idx) => {
            if let Some(func_id) = func_id_at(data, key, *idx) {
                let _ = data.mark_function_executed(key, &func_id);
            }
        }
        Op::MarkBlockExecuted(idx) => {
            let _ = data.mark_block_executed(key, *idx);
        }
        Op::MarkConditionOutcome(idx, outcome) => {
            let _ = data.mark_condition_outcome(key, *idx, *outcome);
        }
        Op::Reclassify(line, line_type) => {
            let _ = data.set_line_classification(key, *line, *line_type);
        }
    }
}

/// Checks invariants directly against each `LineRecord`/`FunctionRecord`/
/// `ConditionRecord`; every `Op` above only ever goes through the public
/// data-store API an external collaborator would use.
fn assert_line_and_function_invariants(data: &CoverageData, key: &FileKey) {
    let file = data.get_file(key).unwrap();
    for (line, record) in &file.lines {
        assert!(
            !record.covered || (record.executed && record.executable),
            "line {line}: covered without executed+executable"
        );
        assert!(
            record.execution_count == 0 || record.executed,
            "line {line}: nonzero execution_count without executed"
        );
        if matches!(record.line_type, LineType::Comment | LineType::Blank) {
            assert!(
                !record.executable && !record.executed && !record.covered,
                "line {line}: comment/blank line carries execution state"
            );
        }
    }
    for (func_id, func) in &file.functions {
        assert!(!func.covered || func.executed, "function {func_id}: covered without executed");
    }
    for (cond_id, cond) in &file.conditions {
        assert!(
            !(cond.executed_true || cond.executed_false) || cond.executed,
            "condition {cond_id}: an outcome fired without executed"
        );
    }
}

/// Invariant 5: any block with an executed child is itself executed.
/// Checked via the code map's own parent/child tree rather than recomputing
/// it, since the tree itself isn't under test here.
fn assert_block_propagation(data: &CoverageData, key: &FileKey) {
    let file = data.get_file(key).unwrap();
    let Some(code_map) = file.code_map.as_ref() else { return };
    for (id, block) in code_map.blocks.iter().enumerate() {
        let any_child_executed = block
            .children
            .iter()
            .any(|c| file.blocks.get(c).map(|b| b.executed).unwrap_or(false));
        if any_child_executed {
            let parent_executed = file.blocks.get(&id).map(|b| b.executed).unwrap_or(false);
            assert!(parent_executed, "block {id}: executed child but parent not executed");
        }
    }
}

fn check_all_invariants(data: &CoverageData, key: &FileKey) {
    assert_line_and_function_invariants(data, key);
    assert_block_propagation(data, key);
}

const NESTED_CONTROL_FLOW: &str = test_utils::fixtures::NESTED_CONTROL_FLOW;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn invariants_hold_after_any_operation_sequence(
        ops in {
            let (_, _, funcs, blocks, conds) = data_for(NESTED_CONTROL_FLOW);
            let line_count = NESTED_CONTROL_FLOW.lines().count() as u32;
            proptest::collection::vec(op_strategy(line_count, funcs, blocks, conds), 0..64)
        }
    ) {
        let (mut data, key, _, _, _) = data_for(NESTED_CONTROL_FLOW);
        for op in &ops {
            apply(&mut data, &key, op);
            check_all_invariants(&data, &key);
        }
    }

    #[test]
    fn marking_covered_without_executed_is_always_rejected(line in 1u32..40) {
        let (mut data, key, _, _, _) = data_for(NESTED_CONTROL_FLOW);
        let was_executed = data.get_file(&key).unwrap().lines.get(&line).map(|l| l.executed).unwrap_or(false);
        let result = data.mark_line_covered(&key, line);
        if !was_executed {
            prop_assert!(result.is_err());
        }
        check_all_invariants(&data, &key);
    }
}
