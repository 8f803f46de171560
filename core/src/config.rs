//! Configuration recognized by the engine. Loading these values from a file
//! on disk is an external collaborator's job; this module only defines and
//! validates the shape, without deciding when the caller loads it.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::error::{CoverageError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Bytes; files over this are hook-tracked instead of instrumented.
    pub max_file_size: u64,
    pub cache_enabled: bool,
    pub static_imports: bool,
    pub sourcemap_enabled: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            cache_enabled: true,
            static_imports: false,
            sourcemap_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub node_budget: u64,
    pub time_budget_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            node_budget: 100_000,
            time_budget_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub source_dirs: Vec<String>,
    pub track_all_executed: bool,
    pub structural_is_executable: bool,
    pub instrumentation: InstrumentationConfig,
    pub analyzer: AnalyzerConfig,
    pub auto_fix_block_relationships: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            source_dirs: Vec::new(),
            track_all_executed: false,
            structural_is_executable: true,
            instrumentation: InstrumentationConfig::default(),
            analyzer: AnalyzerConfig::default(),
            auto_fix_block_relationships: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Compiles `include`/`exclude` into matchable [`GlobSet`]s.
    pub fn compile_globs(&self) -> Result<EligibilityFilter> {
        EligibilityFilter::new(&self.include, &self.exclude)
    }
}

/// A compiled `include[]`/`exclude[]` filter: a file is eligible iff at
/// least one `include` pattern matches and `exclude` takes precedence over
/// `include`.
pub struct EligibilityFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl EligibilityFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_glob_set(include)?)
        };
        let exclude = build_glob_set(exclude)?;
        Ok(Self { include, exclude })
    }

    /// A file is eligible iff it's not excluded and (there is no `include`
    /// list, or it matches one of the `include` patterns).
    pub fn is_eligible(&self, path: &str) -> bool {
        if self.exclude.is_match(path) {
            return false;
        }
        match &self.include {
            Some(set) => set.is_match(path),
            None => true,
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| CoverageError::InvalidPath(format!("bad glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CoverageError::InvalidPath(format!("failed to compile globs: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert!(cfg.structural_is_executable);
        assert_eq!(cfg.instrumentation.max_file_size, 1024 * 1024);
        assert!(cfg.auto_fix_block_relationships);
    }

    #[test]
    fn exclude_beats_include() {
        let filter = EligibilityFilter::new(
            &["src/**/*.lua".to_string()],
            &["src/vendor/**".to_string()],
        )
        .unwrap();
        assert!(filter.is_eligible("src/foo.lua"));
        assert!(!filter.is_eligible("src/vendor/lib.lua"));
        assert!(!filter.is_eligible("other/foo.lua"));
    }

    #[test]
    fn empty_include_means_everything_eligible() {
        let filter = EligibilityFilter::new(&[], &["**/*_test.lua".to_string()]).unwrap();
        assert!(filter.is_eligible("src/foo.lua"));
        assert!(!filter.is_eligible("src/foo_test.lua"));
    }

    #[test]
    fn parses_from_json() {
        let json = br#"{"include": ["src/**/*.lua"], "structural_is_executable": false}"#;
        let cfg = EngineConfig::from_json(json).unwrap();
        assert_eq!(cfg.include, vec!["src/**/*.lua".to_string()]);
        assert!(!cfg.structural_is_executable);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.instrumentation.max_file_size, 1024 * 1024);
    }
}
