//! Top-level engine. `Engine::new` builds every component eagerly from an
//! [`EngineConfig`] — no lazy, first-use module-level initialization. `start`
//! hands back an [`EngineHandle`] the caller threads through the rest of a
//! run; dropping the engine itself doesn't stop tracking, only calling
//! [`EngineHandle::stop`] does.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::analyzer::{self, CodeMap};
use crate::cache::ContentCache;
use crate::comment_scanner::scan_comments;
use crate::config::{EligibilityFilter, EngineConfig};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use crate::error::{CoverageError, Result};
use crate::instrumenter::{self, InstrumentOutput, SourceMap};
use crate::parser;
use crate::patchup::patch_up;
use crate::path::FileKey;
use crate::source::SourceBuffer;
use crate::store::{CoverageData, FileCoverageDiff, SummaryCounters};
use crate::summary::summarize;
use crate::tracker::{Tracker, TrackingMode};

/// Output of [`Engine::process_file`]: the bytes the caller should actually
/// load in place of the original, plus whether they were rewritten at all.
pub struct ProcessedFile {
    pub key: FileKey,
    pub mode: TrackingMode,
    pub source_to_load: Vec<u8>,
}

pub struct Engine {
    config: EngineConfig,
    filter: EligibilityFilter,
    data: Rc<RefCell<CoverageData>>,
    tracker: Rc<Tracker>,
    instrument_cache: RefCell<ContentCache<InstrumentOutput>>,
    analysis_cache: RefCell<ContentCache<(Rc<CodeMap>, bool)>>,
    sourcemaps: RefCell<std::collections::HashMap<FileKey, SourceMap>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let filter = config.compile_globs()?;
        let data = Rc::new(RefCell::new(CoverageData::create(config.structural_is_executable)));
        let tracker = Rc::new(Tracker::new(Rc::clone(&data)));
        Ok(Self {
            config,
            filter,
            data,
            tracker,
            instrument_cache: RefCell::new(ContentCache::new()),
            analysis_cache: RefCell::new(ContentCache::new()),
            sourcemaps: RefCell::new(std::collections::HashMap::new()),
        })
    }

    /// Returns a handle the caller keeps for the lifetime of the run. Safe
    /// to call more than once; each handle shares the same underlying state.
    pub fn start(&self) -> EngineHandle {
        EngineHandle {
            data: Rc::clone(&self.data),
            tracker: Rc::clone(&self.tracker),
        }
    }

    pub fn is_eligible(&self, path: &str) -> bool {
        self.filter.is_eligible(path)
    }

    /// Runs a file through parse → analyze → instrument (or hook-mode
    /// registration), returning the bytes the caller should execute instead
    /// of the original. Never fails outright on a bad file: a parse error
    /// downgrades to a conservative code map plus a
    /// `ParseFailed` diagnostic, and oversized files fall back to the
    /// tracking shim rather than the full rewrite.
    pub fn process_file(&self, path: &str, bytes: Vec<u8>) -> Result<ProcessedFile> {
        let key = FileKey::normalize(path)?;
        let size = bytes.len() as u64;
        let buffer = SourceBuffer::new(key.clone(), bytes);

        {
            let mut data = self.data.borrow_mut();
            data.initialize_file(&key, &buffer);
        }

        let (code_map, parse_ok) = self.analyze_file(&key, &buffer);
        {
            let mut data = self.data.borrow_mut();
            data.attach_code_map(&key, (*code_map).clone());
        }

        let mode = Tracker::select_mode(&self.config, &key, size, parse_ok);
        self.tracker.set_mode(&key, mode);

        let source_to_load = match mode {
            TrackingMode::Instrumented => {
                let mut cache = self.instrument_cache.borrow_mut();
                match instrumenter::instrument(
                    &buffer,
                    &code_map,
                    self.config.structural_is_executable,
                    &self.config.instrumentation,
                    &mut cache,
                ) {
                    Ok(output) => {
                        self.sourcemaps.borrow_mut().insert(key.clone(), output.sourcemap.clone());
                        if output.repaired {
                            let mut data = self.data.borrow_mut();
                            if let Some(file) = data.get_file_mut(&key) {
                                file.diagnostics.push(Diagnostic::new(
                                    Severity::Warning,
                                    DiagnosticCode::InstrumentationRepaired,
                                    "rewritten output needed a closing-sequence repair",
                                ));
                            }
                        }
                        output.source
                    }
                    Err(CoverageError::InstrumentationUnsafe { reason, .. }) => {
                        warn!(file = %key, reason, "falling back to the tracking shim");
                        self.tracker.set_mode(&key, TrackingMode::Hook);
                        let mut data = self.data.borrow_mut();
                        if let Some(file) = data.get_file_mut(&key) {
                            file.diagnostics.push(Diagnostic::new(
                                Severity::Warning,
                                DiagnosticCode::InstrumentationFallback,
                                format!("instrumentation unsafe, using hook mode: {reason}"),
                            ));
                        }
                        instrumenter::large_file_shim(&buffer)
                    }
                    Err(other) => return Err(other),
                }
            }
            TrackingMode::Hook => {
                debug!(file = %key, "tracking via hook mode");
                instrumenter::large_file_shim(&buffer)
            }
        };

        Ok(ProcessedFile { key, mode, source_to_load })
    }

    /// Returns the file's [`CodeMap`] alongside whether `parser::parse`
    /// actually succeeded on it. A genuine parse failure still produces a
    /// usable `CodeMap::conservative()` shape, so that shape alone can't be
    /// used to tell a real parse from a failed one.
    fn analyze_file(&self, key: &FileKey, buffer: &SourceBuffer) -> (Rc<CodeMap>, bool) {
        if let Some((cached, parsed)) = self.analysis_cache.borrow().get(key, buffer.content_hash()) {
            return (Rc::clone(cached), *parsed);
        }

        let (code_map, parsed) = match parser::parse(buffer) {
            Ok(ast) => {
                let comments = scan_comments(buffer.bytes());
                (analyzer::analyze(buffer, &ast, &comments, &self.config.analyzer), true)
            }
            Err(CoverageError::ParseError { line, message, .. }) => {
                warn!(file = %key, line, message, "parse failed, using conservative code map");
                let mut data = self.data.borrow_mut();
                if let Some(file) = data.get_file_mut(key) {
                    file.diagnostics.push(
                        Diagnostic::new(Severity::Warning, DiagnosticCode::ParseFailed, message).with_line(line),
                    );
                }
                (CodeMap::conservative(buffer.line_count()), false)
            }
            Err(_) => (CodeMap::conservative(buffer.line_count()), false),
        };

        if code_map.truncated {
            let mut data = self.data.borrow_mut();
            if let Some(file) = data.get_file_mut(key) {
                file.diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    DiagnosticCode::AnalysisTruncated,
                    "analysis hit its node/time budget before finishing",
                ));
            }
        }

        let code_map = Rc::new(code_map);
        self.analysis_cache
            .borrow_mut()
            .insert(key, buffer.content_hash(), (Rc::clone(&code_map), parsed));
        (code_map, parsed)
    }

    /// Runs patch-up and the summarizer over every tracked file. Typically
    /// called once at the end of a run, after [`EngineHandle::stop`].
    pub fn finalize(&self) -> Result<()> {
        let keys: Vec<FileKey> = self.data.borrow().iter_files().map(|(k, _)| k.clone()).collect();
        for key in &keys {
            patch_up(&mut self.data.borrow_mut(), key)?;
        }
        summarize(&mut self.data.borrow_mut());
        Ok(())
    }

    pub fn summary(&self) -> SummaryCounters {
        self.data.borrow().summary().clone()
    }

    pub fn diff(&self, baseline: &CoverageData) -> Vec<FileCoverageDiff> {
        self.data.borrow().diff(baseline)
    }

    pub fn translate_message(&self, file: &FileKey, message: &str) -> String {
        let sourcemaps = self.sourcemaps.borrow();
        crate::translate::translate_message(message, file, sourcemaps.get(file))
    }
}

/// A live run's handle: shared access to the tracker callbacks and the
/// underlying data, independent of the [`Engine`] that created it.
pub struct EngineHandle {
    data: Rc<RefCell<CoverageData>>,
    tracker: Rc<Tracker>,
}

impl EngineHandle {
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn data(&self) -> Rc<RefCell<CoverageData>> {
        Rc::clone(&self.data)
    }

    /// Stops tracking (§4.5: only after this is `CoverageData::reset`
    /// permitted).
    pub fn stop(&self) {
        self.data.borrow_mut().stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processes_a_small_file_as_instrumented() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let handle = engine.start();
        let processed = engine
            .process_file("/src/f.lua", b"local function f(x)\n  return x\nend\nf(1)\n".to_vec())
            .unwrap();
        assert_eq!(processed.mode, TrackingMode::Instrumented);
        let text = std::str::from_utf8(&processed.source_to_load).unwrap();
        assert!(text.contains("track_line") || text.contains("track_function"));
        handle.stop();
        engine.finalize().unwrap();
        assert!(engine.summary().total_files >= 1);
    }

    #[test]
    fn oversized_file_falls_back_to_hook_mode() {
        let mut config = EngineConfig::default();
        config.instrumentation.max_file_size = 4;
        let engine = Engine::new(config).unwrap();
        let processed = engine
            .process_file("/src/big.lua", b"local x = 1\n".to_vec())
            .unwrap();
        assert_eq!(processed.mode, TrackingMode::Hook);
        let text = std::str::from_utf8(&processed.source_to_load).unwrap();
        assert!(text.contains("activate_file"));
    }

    #[test]
    fn eligibility_filter_is_exposed() {
        let mut config = EngineConfig::default();
        config.include = vec!["src/**/*.lua".to_string()];
        let engine = Engine::new(config).unwrap();
        assert!(engine.is_eligible("src/foo.lua"));
        assert!(!engine.is_eligible("vendor/foo.lua"));
    }

    #[test]
    fn parse_failure_falls_back_to_conservative_code_map() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let processed = engine.process_file("/src/bad.lua", b"local x = (\n".to_vec()).unwrap();
        assert_eq!(processed.mode, TrackingMode::Hook);
        let text = std::str::from_utf8(&processed.source_to_load).unwrap();
        assert!(text.contains("activate_file"));
        let data = engine.data.borrow();
        let file = data.get_file(&processed.key).unwrap();
        assert!(file.diagnostics.iter().any(|d| d.code == DiagnosticCode::ParseFailed));
    }
}
