//! Runner configuration
//!
//! Defaults mirror a local developer run; [`RunnerConfig::resolve`] applies the
//! CI adjustments (retries, worker count, `forbid_only`) when the `CI`
//! environment flag is set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{QaError, QaResult};

/// Output produced after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    /// One line per test on stdout
    List,
    /// Static HTML report
    Html,
    /// Machine-readable JSON results
    Json,
}

/// Runner configuration, as written in the `[runner]` table of a suite config
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Budget for a single test attempt
    pub test_timeout_ms: u64,

    /// Time a timed-out attempt gets to close its resources before it is aborted
    pub teardown_grace_ms: u64,

    /// Budget for a single auto-retrying expectation
    pub expect_timeout_ms: u64,

    /// Run every test independently instead of file-by-file
    pub fully_parallel: bool,

    /// Fail the run when a spec marks a test `only` under CI
    pub forbid_only: Option<bool>,

    /// Retry count (None = 2 under CI, 0 locally)
    pub retries: Option<u32>,

    /// Worker count (None = `ci_workers` under CI, half the cores locally)
    pub workers: Option<usize>,

    /// Worker count used under CI when `workers` is unset (None = suite default)
    pub ci_workers: Option<usize>,

    /// Only run tests whose full title matches this regex
    pub grep: Option<String>,

    /// Only run tests carrying this tag
    pub tag: Option<String>,

    /// Reporters to run after the suite
    pub reporters: Vec<ReporterKind>,

    /// Directory for per-test artifacts and `results.json`
    pub output_dir: PathBuf,

    /// Directory for the HTML report
    pub report_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_timeout_ms: 30_000,
            teardown_grace_ms: 10_000,
            expect_timeout_ms: 10_000,
            fully_parallel: true,
            forbid_only: None,
            retries: None,
            workers: None,
            ci_workers: None,
            grep: None,
            tag: None,
            reporters: vec![ReporterKind::List, ReporterKind::Html, ReporterKind::Json],
            output_dir: PathBuf::from("test-results"),
            report_dir: PathBuf::from("qa-report"),
        }
    }
}

/// Load a suite config file, falling back to defaults when no path is given
pub fn load_toml<T: DeserializeOwned + Default>(path: Option<&Path>) -> QaResult<T> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                QaError::Config(format!("failed to read {}: {}", path.display(), e))
            })?;
            Ok(toml::from_str(&content)?)
        }
        None => Ok(T::default()),
    }
}

impl RunnerConfig {
    /// Fix every environment-dependent setting.
    ///
    /// `suite_ci_workers` is the suite's worker count under CI unless the
    /// config names one.
    pub fn resolve(&self, ci: bool, suite_ci_workers: usize) -> QaResult<ResolvedRunnerConfig> {
        let workers = match self.workers {
            Some(0) => return Err(QaError::Config("workers must be at least 1".into())),
            Some(n) => n,
            None if ci => self.ci_workers.unwrap_or(suite_ci_workers).max(1),
            None => default_local_workers(),
        };

        let grep = self
            .grep
            .as_deref()
            .map(regex::Regex::new)
            .transpose()?;

        Ok(ResolvedRunnerConfig {
            test_timeout: Duration::from_millis(self.test_timeout_ms),
            teardown_grace: Duration::from_millis(self.teardown_grace_ms),
            expect_timeout: Duration::from_millis(self.expect_timeout_ms),
            fully_parallel: self.fully_parallel,
            forbid_only: self.forbid_only.unwrap_or(ci),
            retries: self.retries.unwrap_or(if ci { 2 } else { 0 }),
            workers,
            grep,
            tag: self.tag.clone(),
            reporters: self.reporters.clone(),
            output_dir: self.output_dir.clone(),
            report_dir: self.report_dir.clone(),
        })
    }
}

/// Runner settings with CI defaults applied
#[derive(Debug, Clone)]
pub struct ResolvedRunnerConfig {
    pub test_timeout: Duration,
    pub teardown_grace: Duration,
    pub expect_timeout: Duration,
    pub fully_parallel: bool,
    pub forbid_only: bool,
    pub retries: u32,
    pub workers: usize,
    pub grep: Option<regex::Regex>,
    pub tag: Option<String>,
    pub reporters: Vec<ReporterKind>,
    pub output_dir: PathBuf,
    pub report_dir: PathBuf,
}

/// Half the available cores, at least one
fn default_local_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() / 2).max(1))
        .unwrap_or(1)
}
