//! Per-file diagnostics, attached to [`crate::store::CoverageData`] and
//! surfaced to whatever report renderer the host process uses. The engine
//! never fails a whole run over a recoverable problem; instead it downgrades
//! the problem to one of these and keeps going.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticCode {
    AnalysisTruncated,
    LineClassificationReset,
    InstrumentationRepaired,
    InstrumentationFallback,
    OrphanedBlockReattached,
    SummaryMismatchCorrected,
    ParseFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            line: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{:?} ({:?}) at line {}: {}", self.severity, self.code, line, self.message),
            None => write!(f, "{:?} ({:?}): {}", self.severity, self.code, self.message),
        }
    }
}
