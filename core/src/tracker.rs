//! C6: execution tracker. Exposes the stable callback surface instrumented
//! source calls into (§6 "Tracker callbacks"), plus a trace-hook fallback
//! for files that weren't instrumented.
//!
//! Single-writer per §5: [`Tracker`] holds its [`CoverageData`] behind an
//! `Rc<RefCell<_>>` rather than `Arc<Mutex<_>>` — the engine is explicitly
//! "thread-hostile," cooperative single-threaded execution within one
//! process, so the cheaper single-owner primitives are the right fit.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::path::FileKey;
use crate::store::CoverageData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    Instrumented,
    Hook,
}

/// A trace-hook event as the fallback path would receive it from the
/// target-language runtime's per-line/per-call hook.
#[derive(Debug, Clone)]
pub enum HookEvent {
    Line { file: FileKey, line: u32 },
    Call { file: FileKey, line: u32, func_id: String, start: u32, end: u32 },
    Return,
}

/// Fixed denylist of files the tracker itself depends on; instrumenting
/// them would create the require-cycle §9 calls out as needing
/// architectural avoidance. Keyed by suffix match against `FileKey`.
const ENGINE_DENYLIST_SUFFIXES: &[&str] = &["/coverage_tracker.lua", "/coverage_bootstrap.lua"];

pub struct Tracker {
    data: Rc<RefCell<CoverageData>>,
    reentrant: Cell<bool>,
    modes: RefCell<HashMap<FileKey, TrackingMode>>,
    active_files: RefCell<HashSet<FileKey>>,
    call_stack: RefCell<Vec<(FileKey, u32)>>,
}

impl Tracker {
    pub fn new(data: Rc<RefCell<CoverageData>>) -> Self {
        Self {
            data,
            reentrant: Cell::new(false),
            modes: RefCell::new(HashMap::new()),
            active_files: RefCell::new(HashSet::new()),
            call_stack: RefCell::new(Vec::new()),
        }
    }

    pub fn data(&self) -> Rc<RefCell<CoverageData>> {
        Rc::clone(&self.data)
    }

    /// §4.6 mode selection: instrumented iff the file is under the size
    /// cap, parsed successfully, and isn't the engine's own denylisted
    /// support code.
    pub fn select_mode(config: &EngineConfig, key: &FileKey, file_size: u64, parse_ok: bool) -> TrackingMode {
        let denylisted = ENGINE_DENYLIST_SUFFIXES
            .iter()
            .any(|suffix| key.as_str().ends_with(suffix));
        if !denylisted && parse_ok && file_size <= config.instrumentation.max_file_size {
            TrackingMode::Instrumented
        } else {
            TrackingMode::Hook
        }
    }

    pub fn set_mode(&self, key: &FileKey, mode: TrackingMode) {
        self.modes.borrow_mut().insert(key.clone(), mode);
    }

    pub fn mode_of(&self, key: &FileKey) -> Option<TrackingMode> {
        self.modes.borrow().get(key).copied()
    }

    // --- Instrumented-mode callbacks (§6) ---

    pub fn activate_file(&self, key: &FileKey) {
        self.active_files.borrow_mut().insert(key.clone());
    }

    pub fn track_line(&self, key: &FileKey, line: u32) -> Result<()> {
        self.activate_file(key);
        self.data.borrow_mut().mark_line_executed(key, line)
    }

    pub fn track_function(&self, key: &FileKey, line: u32) -> Result<()> {
        let func_id = {
            let data = self.data.borrow();
            data.get_file(key)
                .and_then(|f| f.code_map.as_ref())
                .and_then(|cm| cm.function_by_start_line(line))
                .map(|f| f.func_id.clone())
        };
        match func_id {
            Some(func_id) => self.data.borrow_mut().mark_function_executed(key, &func_id),
            None => Ok(()),
        }
    }

    pub fn track_block(&self, key: &FileKey, _line: u32, block_id: usize, _kind: &str) -> Result<()> {
        self.data.borrow_mut().mark_block_executed(key, block_id)
    }

    // --- Hook-mode fallback (§4.6b) ---

    /// Processes a single trace-hook event. Reentrancy-guarded: if a hook
    /// is already executing (we're inside one of its own callbacks, e.g.
    /// because a `__index` metamethod the hook touches itself triggers a
    /// line event), the event is dropped rather than recursing.
    pub fn handle_hook_event(&self, event: HookEvent) -> Result<()> {
        if self.reentrant.get() {
            return Ok(());
        }
        self.reentrant.set(true);
        let result = self.handle_hook_event_inner(event);
        self.reentrant.set(false);
        result
    }

    fn handle_hook_event_inner(&self, event: HookEvent) -> Result<()> {
        match event {
            HookEvent::Line { file, line } => {
                self.activate_file(&file);
                self.data.borrow_mut().mark_line_executed(&file, line)
            }
            HookEvent::Call { file, line, func_id, start, end } => {
                self.call_stack.borrow_mut().push((file.clone(), line));
                {
                    let mut data = self.data.borrow_mut();
                    data.register_function(&file, &func_id, start, end);
                }
                self.data.borrow_mut().mark_function_executed(&file, &func_id)
            }
            HookEvent::Return => {
                self.call_stack.borrow_mut().pop();
                Ok(())
            }
        }
    }

    /// Error-line tracking wrapper (§4.6): marks the raising line as
    /// executed before the caller re-raises, compensating for hook gaps on
    /// the exact fault line.
    pub fn mark_raising_line(&self, key: &FileKey, line: u32) -> Result<()> {
        self.data.borrow_mut().mark_line_executed(key, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::source::SourceBuffer;
    use crate::store::CoverageData;

    fn tracker_with_file(src: &str) -> (Tracker, FileKey) {
        let key = FileKey::normalize("/f.lua").unwrap();
        let buf = SourceBuffer::new(key.clone(), src.as_bytes().to_vec());
        let data = Rc::new(RefCell::new(CoverageData::create(true)));
        data.borrow_mut().initialize_file(&key, &buf);
        (Tracker::new(data), key)
    }

    #[test]
    fn track_line_marks_executed() {
        let (tracker, key) = tracker_with_file("local x = 1\n");
        tracker.track_line(&key, 1).unwrap();
        let data = tracker.data();
        assert!(data.borrow().get_file(&key).unwrap().lines[&1].executed);
    }

    #[test]
    fn reentrant_hook_events_are_dropped() {
        let (tracker, key) = tracker_with_file("local x = 1\n");
        tracker.reentrant.set(true);
        tracker
            .handle_hook_event(HookEvent::Line { file: key.clone(), line: 1 })
            .unwrap();
        let data = tracker.data();
        assert!(!data.borrow().get_file(&key).unwrap().lines[&1].executed);
    }

    #[test]
    fn mode_selection_picks_hook_for_oversized_files() {
        let config = EngineConfig::default();
        let key = FileKey::normalize("/big.lua").unwrap();
        let mode = Tracker::select_mode(&config, &key, config.instrumentation.max_file_size + 1, true);
        assert_eq!(mode, TrackingMode::Hook);
    }

    #[test]
    fn mode_selection_picks_hook_for_denylisted_file() {
        let config = EngineConfig::default();
        let key = FileKey::normalize("/engine/coverage_tracker.lua").unwrap();
        let mode = Tracker::select_mode(&config, &key, 10, true);
        assert_eq!(mode, TrackingMode::Hook);
    }

    #[test]
    fn call_return_balances_stack() {
        let (tracker, key) = tracker_with_file("local function f() end\n");
        tracker
            .handle_hook_event(HookEvent::Call {
                file: key.clone(),
                line: 1,
                func_id: "f:1-1".to_string(),
                start: 1,
                end: 1,
            })
            .unwrap();
        assert_eq!(tracker.call_stack.borrow().len(), 1);
        tracker.handle_hook_event(HookEvent::Return).unwrap();
        assert!(tracker.call_stack.borrow().is_empty());
    }
}
