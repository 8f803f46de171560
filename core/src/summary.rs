//! C9: summarizer. Rolls every [`FileRecord`](crate::store::FileRecord) up
//! into the five coverage percentages the engine reports. Each file's own
//! `executable_lines`/`executed_lines`/etc. accessors are recomputed fresh
//! from its lines rather than trusted from a cached value, so a file can't
//! silently stay "covered" after every one of its covered lines was
//! reclassified away. When the freshly recomputed totals disagree with the
//! last computed summary, a diagnostic records the correction.

use crate::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use crate::store::{CoverageData, SummaryCounters};

const LINE_WEIGHT: f64 = 0.7;
const FUNCTION_WEIGHT: f64 = 0.2;
const FILE_WEIGHT: f64 = 0.1;

fn percent(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

/// Recomputes and stores [`SummaryCounters`] from every file currently in
/// `data`, pushing a [`DiagnosticCode::SummaryMismatchCorrected`] run
/// diagnostic if the result differs from what was stored before.
pub fn summarize(data: &mut CoverageData) {
    let mut executable_lines = 0u64;
    let mut executed_lines = 0u64;
    let mut covered_lines = 0u64;
    let mut total_functions = 0u64;
    let mut executed_functions = 0u64;
    let mut covered_functions = 0u64;
    let mut total_files = 0u64;
    let mut covered_files = 0u64;

    for (_key, file) in data.iter_files() {
        executable_lines += file.executable_lines();
        executed_lines += file.executed_lines();
        covered_lines += file.covered_lines();
        total_functions += file.total_functions();
        executed_functions += file.executed_functions();
        covered_functions += file.covered_functions();
        total_files += 1;
        if file.is_covered() {
            covered_files += 1;
        }
    }

    let line_coverage = percent(covered_lines, executable_lines);
    let execution_coverage = percent(executed_lines, executable_lines);
    let function_coverage = percent(covered_functions, total_functions);
    let file_coverage = percent(covered_files, total_files);
    let overall_coverage =
        LINE_WEIGHT * line_coverage + FUNCTION_WEIGHT * function_coverage + FILE_WEIGHT * file_coverage;

    let recomputed = SummaryCounters {
        executable_lines,
        executed_lines,
        covered_lines,
        total_functions,
        executed_functions,
        covered_functions,
        total_files,
        covered_files,
        line_coverage,
        execution_coverage,
        function_coverage,
        file_coverage,
        overall_coverage,
    };

    let previous = data.summary().clone();
    // `total_files == 0` means no summary has been computed yet, so there's
    // nothing to have drifted from; only a later recomputation that disagrees
    // with the last one counts as a correction worth flagging.
    if previous.total_files > 0 && previous != recomputed {
        data.push_run_diagnostic(Diagnostic::new(
            Severity::Info,
            DiagnosticCode::SummaryMismatchCorrected,
            format!(
                "summary recomputation corrected stale totals (overall coverage {:.2}% -> {:.2}%)",
                previous.overall_coverage, recomputed.overall_coverage
            ),
        ));
    }

    data.set_summary(recomputed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FileKey;
    use crate::source::SourceBuffer;

    fn data_with_one_file() -> (CoverageData, FileKey) {
        let key = FileKey::normalize("/f.lua").unwrap();
        let buf = SourceBuffer::new(key.clone(), b"local x = 1\nlocal y = 2\n".to_vec());
        let mut data = CoverageData::create(true);
        data.initialize_file(&key, &buf);
        (data, key)
    }

    #[test]
    fn no_files_yields_zero_percentages() {
        let mut data = CoverageData::create(true);
        summarize(&mut data);
        let summary = data.summary();
        assert_eq!(summary.line_coverage, 0.0);
        assert_eq!(summary.overall_coverage, 0.0);
    }

    #[test]
    fn overall_coverage_uses_the_weighted_formula() {
        let (mut data, key) = data_with_one_file();
        data.set_line_classification(&key, 1, crate::analyzer::LineType::Code).unwrap();
        data.set_line_classification(&key, 2, crate::analyzer::LineType::Code).unwrap();
        data.mark_line_executed(&key, 1).unwrap();
        data.mark_line_covered(&key, 1).unwrap();

        summarize(&mut data);
        let summary = data.summary();
        assert_eq!(summary.executable_lines, 2);
        assert_eq!(summary.covered_lines, 1);
        assert!((summary.line_coverage - 50.0).abs() < f64::EPSILON);
        let expected_overall = 0.7 * 50.0 + 0.2 * 0.0 + 0.1 * 0.0;
        assert!((summary.overall_coverage - expected_overall).abs() < 1e-9);
    }

    #[test]
    fn recomputation_mismatch_emits_a_diagnostic() {
        let (mut data, key) = data_with_one_file();
        data.set_line_classification(&key, 1, crate::analyzer::LineType::Code).unwrap();
        data.set_line_classification(&key, 2, crate::analyzer::LineType::Code).unwrap();
        summarize(&mut data);
        assert!(data.run_diagnostics().is_empty());

        data.mark_line_executed(&key, 1).unwrap();
        data.mark_line_covered(&key, 1).unwrap();
        summarize(&mut data);
        assert_eq!(
            data.run_diagnostics()
                .iter()
                .filter(|d| d.code == crate::diagnostics::DiagnosticCode::SummaryMismatchCorrected)
                .count(),
            1
        );
    }

    #[test]
    fn repeated_summarize_with_no_changes_emits_no_diagnostic() {
        let (mut data, key) = data_with_one_file();
        data.set_line_classification(&key, 1, crate::analyzer::LineType::Code).unwrap();
        summarize(&mut data);
        summarize(&mut data);
        assert!(data.run_diagnostics().is_empty());
    }

    #[test]
    fn fully_covered_file_counts_toward_file_coverage() {
        let (mut data, key) = data_with_one_file();
        data.set_line_classification(&key, 1, crate::analyzer::LineType::Code).unwrap();
        data.mark_line_executed(&key, 1).unwrap();
        data.mark_line_covered(&key, 1).unwrap();

        summarize(&mut data);
        let summary = data.summary();
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.covered_files, 1);
        assert_eq!(summary.file_coverage, 100.0);
    }
}
