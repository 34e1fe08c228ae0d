//! QA Common Library
//!
//! Shared infrastructure for the Dog CEO API suite and the blog search suite:
//! - Runner configuration with CI-aware defaults
//! - Declarative YAML spec files, one `describe` block per file
//! - A parallel runner with per-test timeouts, retries and soft assertions
//! - List, JSON and HTML reporters
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Suite binary                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SpecFile<Step>::load_all(dir)                              │
//! │    └── one TestCase per test (× browser project)            │
//! │  Runner::run(cases) -> SuiteReport                          │
//! │    ├── worker semaphore, one task per attempt               │
//! │    ├── per-test timeout, retries, soft assertions           │
//! │    └── results in declaration order                         │
//! │  report::write_reports(report)                              │
//! │    └── list | json | html                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod runner;
pub mod spec;

pub use config::{load_toml, ReporterKind, ResolvedRunnerConfig, RunnerConfig};
pub use error::{ensure, QaError, QaResult};
pub use runner::{CaseResult, CaseStatus, Runner, SoftAssertions, SuiteReport, TestCase, TestInfo};
pub use spec::{CaseSpec, SpecFile};

/// Whether the `CI` environment flag is set to a truthy value
pub fn ci_from_env_value(value: Option<&str>) -> bool {
    match value {
        Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "0" | "false"),
        None => false,
    }
}
