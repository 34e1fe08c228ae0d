//! Parallel test runner
//!
//! Cases are independent: each attempt runs in its own task with a fresh
//! [`TestInfo`], bounded by the per-test timeout. A worker semaphore caps how
//! many cases run at once.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ResolvedRunnerConfig;
use crate::error::{QaError, QaResult};

type CaseBody = Arc<dyn Fn(TestInfo) -> BoxFuture<'static, QaResult<()>> + Send + Sync>;

/// A runnable test: metadata plus an async body invoked once per attempt
#[derive(Clone)]
pub struct TestCase {
    /// Group title (the spec file's `describe`)
    pub suite: String,
    pub title: String,
    /// Browser project or other run variant
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub only: bool,
    pub skip: bool,
    body: CaseBody,
}

impl TestCase {
    pub fn new<F, Fut>(suite: impl Into<String>, title: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QaResult<()>> + Send + 'static,
    {
        Self {
            suite: suite.into(),
            title: title.into(),
            project: None,
            tags: Vec::new(),
            only: false,
            skip: false,
            body: Arc::new(move |info| Box::pin(body(info))),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_only(mut self, only: bool) -> Self {
        self.only = only;
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Title used for filtering and reporting
    pub fn full_title(&self) -> String {
        match &self.project {
            Some(project) => format!("[{}] {} > {}", project, self.suite, self.title),
            None => format!("{} > {}", self.suite, self.title),
        }
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("title", &self.full_title())
            .field("only", &self.only)
            .field("skip", &self.skip)
            .finish()
    }
}

/// Soft assertion recorder shared with a running attempt
#[derive(Debug, Clone, Default)]
pub struct SoftAssertions {
    failures: Arc<Mutex<Vec<String>>>,
}

impl SoftAssertions {
    /// Record an assertion failure without failing the test.
    ///
    /// Returns `Ok(true)` when the check passed. Errors that are not assertion
    /// failures still propagate.
    pub fn check(&self, result: QaResult<()>) -> QaResult<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_assertion() => {
                warn!("Soft assertion failed: {}", e);
                self.failures.lock().push(e.to_string());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }
}

/// Per-attempt context handed to a test body
#[derive(Debug, Clone)]
pub struct TestInfo {
    pub title: String,
    pub project: Option<String>,
    /// Zero for the first run, incremented per retry
    pub attempt: u32,
    /// Artifact directory for this attempt (not created eagerly)
    pub output_dir: PathBuf,
    pub expect_timeout: Duration,
    pub soft: SoftAssertions,
    /// Cancelled when the attempt exceeds the test timeout. The body then has
    /// the teardown grace period to release what it holds before it is aborted.
    pub cancel: CancellationToken,
}

impl TestInfo {
    /// Context for code running outside the runner (tools, tests)
    pub fn standalone(title: impl Into<String>, expect_timeout: Duration) -> Self {
        let title = title.into();
        Self {
            output_dir: std::env::temp_dir().join(slug(&title)),
            title,
            project: None,
            attempt: 0,
            expect_timeout,
            soft: SoftAssertions::default(),
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    /// Passed after at least one failed attempt
    Flaky,
    Failed,
    TimedOut,
    Skipped,
}

impl CaseStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, CaseStatus::Failed | CaseStatus::TimedOut)
    }
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub title: String,
    pub suite: String,
    pub project: Option<String>,
    pub status: CaseStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
    #[serde(default)]
    pub soft_failures: Vec<String>,
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// RFC 3339 start time of the run
    pub started_at: String,
    pub total: usize,
    pub passed: usize,
    pub flaky: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteReport {
    fn from_results(results: Vec<CaseResult>, started_at: String, duration_ms: u64) -> Self {
        let count = |status: CaseStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            started_at,
            total: results.len(),
            passed: count(CaseStatus::Passed),
            flaky: count(CaseStatus::Flaky),
            failed: results.iter().filter(|r| r.status.is_failure()).count(),
            skipped: count(CaseStatus::Skipped),
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

struct AttemptSettings {
    test_timeout: Duration,
    teardown_grace: Duration,
    expect_timeout: Duration,
    retries: u32,
    output_dir: PathBuf,
}

/// Main test runner
pub struct Runner {
    config: ResolvedRunnerConfig,
}

impl Runner {
    pub fn new(config: ResolvedRunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedRunnerConfig {
        &self.config
    }

    /// Apply `grep`, `tag` and `only` filtering
    pub fn select(&self, cases: Vec<TestCase>) -> QaResult<Vec<TestCase>> {
        let cases: Vec<TestCase> = match &self.config.grep {
            Some(grep) => cases
                .into_iter()
                .filter(|c| grep.is_match(&c.full_title()))
                .collect(),
            None => cases,
        };
        let cases: Vec<TestCase> = match &self.config.tag {
            Some(tag) => cases.into_iter().filter(|c| c.tags.contains(tag)).collect(),
            None => cases,
        };

        let focused: Vec<&TestCase> = cases.iter().filter(|c| c.only).collect();
        if focused.is_empty() {
            return Ok(cases);
        }
        if self.config.forbid_only {
            return Err(QaError::Config(format!(
                "test marked `only` while forbid_only is set: {}",
                focused[0].full_title()
            )));
        }
        Ok(cases.into_iter().filter(|c| c.only).collect())
    }

    /// Run the selected cases and collect results in declaration order
    pub async fn run(&self, cases: Vec<TestCase>) -> QaResult<SuiteReport> {
        let start = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        let cases = self.select(cases)?;

        info!(
            "Running {} test(s) using {} worker(s)",
            cases.len(),
            self.config.workers
        );

        let settings = Arc::new(AttemptSettings {
            test_timeout: self.config.test_timeout,
            teardown_grace: self.config.teardown_grace,
            expect_timeout: self.config.expect_timeout,
            retries: self.config.retries,
            output_dir: self.config.output_dir.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut results: Vec<(usize, CaseResult)> = Vec::with_capacity(cases.len());
        let mut set = JoinSet::new();

        for group in self.groups(cases) {
            let settings = settings.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let mut out = Vec::with_capacity(group.len());
                for (index, case) in group {
                    out.push((index, run_case(index, &case, &settings).await));
                }
                out
            });
        }

        while let Some(joined) = set.join_next().await {
            let group = joined.map_err(|e| QaError::Config(format!("runner task failed: {}", e)))?;
            results.extend(group);
        }
        results.sort_by_key(|(index, _)| *index);

        let report = SuiteReport::from_results(
            results.into_iter().map(|(_, r)| r).collect(),
            started_at,
            start.elapsed().as_millis() as u64,
        );

        info!(
            "Test Results: {} passed, {} flaky, {} failed, {} skipped ({} ms)",
            report.passed, report.flaky, report.failed, report.skipped, report.duration_ms
        );
        Ok(report)
    }

    /// Units of sequential work: one case each, or one spec file each
    fn groups(&self, cases: Vec<TestCase>) -> Vec<Vec<(usize, TestCase)>> {
        if self.config.fully_parallel {
            return cases.into_iter().enumerate().map(|c| vec![c]).collect();
        }

        let mut order: Vec<(Option<String>, String)> = Vec::new();
        let mut groups: HashMap<(Option<String>, String), Vec<(usize, TestCase)>> = HashMap::new();
        for (index, case) in cases.into_iter().enumerate() {
            let key = (case.project.clone(), case.suite.clone());
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push((index, case));
        }
        order
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .collect()
    }
}

enum AttemptOutcome {
    Passed,
    Failed(String),
    TimedOut,
}

async fn run_case(index: usize, case: &TestCase, settings: &AttemptSettings) -> CaseResult {
    let start = Instant::now();
    let title = case.full_title();

    let mut result = CaseResult {
        title: case.title.clone(),
        suite: case.suite.clone(),
        project: case.project.clone(),
        status: CaseStatus::Skipped,
        attempts: 0,
        duration_ms: 0,
        error: None,
        soft_failures: Vec::new(),
    };

    if case.skip {
        debug!("Skipping test: {}", title);
        return result;
    }

    for attempt in 0..=settings.retries {
        result.attempts = attempt + 1;

        // the index keeps titles that slug alike apart
        let mut dir_name = format!("{}-{}", slug(&title), index);
        if attempt > 0 {
            dir_name.push_str(&format!("-retry{}", attempt));
        }
        let info = TestInfo {
            title: title.clone(),
            project: case.project.clone(),
            attempt,
            output_dir: settings.output_dir.join(dir_name),
            expect_timeout: settings.expect_timeout,
            soft: SoftAssertions::default(),
            cancel: CancellationToken::new(),
        };
        let soft = info.soft.clone();

        debug!("Running test: {} (attempt {})", title, attempt + 1);
        let outcome = run_attempt(case, info, settings).await;
        result.soft_failures = soft.failures();

        match outcome {
            AttemptOutcome::Passed => {
                result.status = if attempt == 0 {
                    CaseStatus::Passed
                } else {
                    CaseStatus::Flaky
                };
                result.error = None;
                break;
            }
            AttemptOutcome::Failed(reason) => {
                result.status = CaseStatus::Failed;
                result.error = Some(reason);
            }
            AttemptOutcome::TimedOut => {
                result.status = CaseStatus::TimedOut;
                result.error = Some(format!(
                    "Test timeout of {}ms exceeded",
                    settings.test_timeout.as_millis()
                ));
            }
        }

        if attempt < settings.retries {
            warn!(
                "Retrying {} ({}): {}",
                title,
                attempt + 1,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    match result.status {
        CaseStatus::Passed | CaseStatus::Flaky => info!("✓ {} ({} ms)", title, result.duration_ms),
        _ => error!(
            "✗ {} - {}",
            title,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
    result
}

/// Run one attempt in its own task so a panic or timeout stays contained
async fn run_attempt(case: &TestCase, info: TestInfo, settings: &AttemptSettings) -> AttemptOutcome {
    let cancel = info.cancel.clone();
    let mut handle = tokio::spawn((case.body)(info));

    match tokio::time::timeout(settings.test_timeout, &mut handle).await {
        Ok(Ok(Ok(()))) => AttemptOutcome::Passed,
        Ok(Ok(Err(e))) => AttemptOutcome::Failed(e.to_string()),
        Ok(Err(join_error)) if join_error.is_panic() => {
            let payload = join_error.into_panic();
            let reason = payload
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "test panicked".to_string());
            AttemptOutcome::Failed(reason)
        }
        Ok(Err(join_error)) => AttemptOutcome::Failed(join_error.to_string()),
        Err(_) => {
            cancel.cancel();
            if tokio::time::timeout(settings.teardown_grace, &mut handle)
                .await
                .is_err()
            {
                warn!(
                    "Test body ignored cancellation for {} ms, aborting",
                    settings.teardown_grace.as_millis()
                );
                handle.abort();
            }
            AttemptOutcome::TimedOut
        }
    }
}

/// File-system friendly form of a test title
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn runner(config: RunnerConfig) -> Runner {
        Runner::new(config.resolve(false, 2).unwrap())
    }

    fn passing(title: &str) -> TestCase {
        TestCase::new("suite", title, |_| async { Ok(()) })
    }

    #[tokio::test]
    async fn test_results_keep_declaration_order() {
        let cases = vec![
            TestCase::new("suite", "slow", |_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            }),
            passing("fast"),
        ];
        let report = runner(RunnerConfig {
            workers: Some(2),
            ..Default::default()
        })
        .run(cases)
        .await
        .unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 2);
        assert_eq!(report.results[0].title, "slow");
        assert_eq!(report.results[1].title, "fast");
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_failure_is_retried_and_reported_flaky() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let case = TestCase::new("suite", "flaky", move |info| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if info.attempt == 0 {
                    Err(QaError::assertion("status", "200", 500))
                } else {
                    Ok(())
                }
            }
        });

        let report = runner(RunnerConfig {
            retries: Some(2),
            ..Default::default()
        })
        .run(vec![case])
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.results[0].status, CaseStatus::Flaky);
        assert_eq!(report.results[0].attempts, 2);
        assert_eq!(report.flaky, 1);
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_failure_without_retries() {
        let case = TestCase::new("suite", "broken", |_| async {
            Err(QaError::assertion("message", "non-empty list", "[]"))
        });
        let report = runner(RunnerConfig::default()).run(vec![case]).await.unwrap();

        let result = &report.results[0];
        assert_eq!(result.status, CaseStatus::Failed);
        assert_eq!(result.attempts, 1);
        assert!(result.error.as_ref().unwrap().contains("message"));
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_timeout_marks_timed_out() {
        let case = TestCase::new("suite", "hangs", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let report = runner(RunnerConfig {
            test_timeout_ms: 20,
            teardown_grace_ms: 20,
            ..Default::default()
        })
        .run(vec![case])
        .await
        .unwrap();

        assert_eq!(report.results[0].status, CaseStatus::TimedOut);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_panic_is_a_failure() {
        let case = TestCase::new("suite", "panics", |_| async {
            if true {
                panic!("boom");
            }
            Ok(())
        });
        let report = runner(RunnerConfig::default()).run(vec![case]).await.unwrap();
        assert_eq!(report.results[0].status, CaseStatus::Failed);
        assert_eq!(report.results[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_skip_and_only() {
        let cases = vec![
            passing("a").with_skip(true),
            passing("b").with_only(true),
            passing("c"),
        ];
        let r = runner(RunnerConfig::default());
        let selected = r.select(cases).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].title, "b");

        let report = r
            .run(vec![passing("a").with_skip(true), passing("c")])
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.results[0].status, CaseStatus::Skipped);
        assert_eq!(report.results[0].attempts, 0);
    }

    #[test]
    fn test_forbid_only_rejects_focused_tests() {
        let r = runner(RunnerConfig {
            forbid_only: Some(true),
            ..Default::default()
        });
        let err = r.select(vec![passing("a").with_only(true)]).unwrap_err();
        assert!(matches!(err, QaError::Config(_)));
    }

    #[test]
    fn test_grep_matches_full_title() {
        let r = runner(RunnerConfig {
            grep: Some("chromium.*search".into()),
            ..Default::default()
        });
        let cases = vec![
            TestCase::new("Blog search", "valid search", |_| async { Ok(()) })
                .with_project("chromium"),
            TestCase::new("Blog search", "valid search", |_| async { Ok(()) })
                .with_project("firefox"),
        ];
        let selected = r.select(cases).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].project.as_deref(), Some("chromium"));
    }

    #[test]
    fn test_tag_filter() {
        let r = runner(RunnerConfig {
            tag: Some("smoke".into()),
            ..Default::default()
        });
        let cases = vec![
            passing("tagged").with_tags(vec!["api".into(), "smoke".into()]),
            passing("untagged"),
        ];
        let selected = r.select(cases).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].title, "tagged");
    }

    #[tokio::test]
    async fn test_soft_failures_do_not_fail_the_case() {
        let case = TestCase::new("suite", "soft", |info| async move {
            info.soft
                .check(Err(QaError::assertion("empty-state message", "visible", "hidden")))?;
            Ok(())
        });
        let report = runner(RunnerConfig::default()).run(vec![case]).await.unwrap();
        let result = &report.results[0];
        assert_eq!(result.status, CaseStatus::Passed);
        assert_eq!(result.soft_failures.len(), 1);
    }

    #[test]
    fn test_soft_check_propagates_harness_errors() {
        let soft = SoftAssertions::default();
        assert!(soft.check(Ok(())).unwrap());
        assert!(soft.check(Err(QaError::Bridge("gone".into()))).is_err());
        assert!(soft.failures().is_empty());
    }

    #[tokio::test]
    async fn test_file_groups_run_sequentially() {
        let running = Arc::new(AtomicU32::new(0));
        let overlap = Arc::new(AtomicU32::new(0));
        let make = |title: &str| {
            let running = running.clone();
            let overlap = overlap.clone();
            TestCase::new("same file", title, move |_| {
                let running = running.clone();
                let overlap = overlap.clone();
                async move {
                    if running.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        let report = runner(RunnerConfig {
            fully_parallel: false,
            workers: Some(4),
            ..Default::default()
        })
        .run(vec![make("one"), make("two"), make("three")])
        .await
        .unwrap();

        assert_eq!(report.passed, 3);
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timed_out_body_gets_to_clean_up() {
        let cleaned = Arc::new(AtomicU32::new(0));
        let flag = cleaned.clone();
        let case = TestCase::new("suite", "hangs then cleans up", move |info| {
            let flag = flag.clone();
            async move {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(60)) => {}
                    _ = info.cancel.cancelled() => {}
                }
                flag.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let report = runner(RunnerConfig {
            test_timeout_ms: 50,
            teardown_grace_ms: 5_000,
            ..Default::default()
        })
        .run(vec![case])
        .await
        .unwrap();

        assert_eq!(report.results[0].status, CaseStatus::TimedOut);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_artifact_dirs_are_distinct_per_case() {
        let dirs = Arc::new(Mutex::new(Vec::new()));
        let make = |title: &str| {
            let dirs = dirs.clone();
            TestCase::new("Blog", title, move |info| {
                let dirs = dirs.clone();
                async move {
                    dirs.lock().push(info.output_dir.clone());
                    Ok(())
                }
            })
            .with_project("chromium")
        };
        assert_eq!(
            slug("[chromium] Blog > busca: conta digital"),
            slug("[chromium] Blog > busca conta-digital")
        );

        runner(RunnerConfig::default())
            .run(vec![make("busca: conta digital"), make("busca conta-digital")])
            .await
            .unwrap();

        let dirs = dirs.lock();
        assert_eq!(dirs.len(), 2);
        assert_ne!(dirs[0], dirs[1]);
    }

    #[test]
    fn test_slug() {
        assert_eq!(
            slug("[chromium] Blog do Agi - Pesquisa > Pesquisa válida"),
            "chromium-blog-do-agi-pesquisa-pesquisa-v-lida"
        );
    }
}
