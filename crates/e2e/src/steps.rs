//! Declarative web steps and their executor

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use qa_common::{QaError, QaResult, SpecFile, TestCase, TestInfo};

use crate::consent::dismiss_consent_if_present;
use crate::page::Page;
use crate::pages::{HomePage, ResultsPage};
use crate::playwright::{PlaywrightSession, WebConfig};

/// A single step in a web test.
///
/// Search terms may contain `{timestamp}`, replaced by the attempt's start
/// time in milliseconds so every run searches for a fresh term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WebStep {
    /// Navigate to the home page
    Open,

    /// Accept the cookie banner if one shows up
    DismissConsent,

    Search { term: String },

    ExpectUrlHasQuery { term: String },

    /// At least one result card
    ExpectResults,

    /// Zero result cards, soft-checking the empty-state message
    ExpectNoResults,

    OpenFirstResult,

    ExpectArticleVisible,
}

impl WebStep {
    fn name(&self) -> String {
        match self {
            WebStep::Open => "open".to_string(),
            WebStep::DismissConsent => "dismiss_consent".to_string(),
            WebStep::Search { term } => format!("search:{}", term),
            WebStep::ExpectUrlHasQuery { term } => format!("expect_url_has_query:{}", term),
            WebStep::ExpectResults => "expect_results".to_string(),
            WebStep::ExpectNoResults => "expect_no_results".to_string(),
            WebStep::OpenFirstResult => "open_first_result".to_string(),
            WebStep::ExpectArticleVisible => "expect_article_visible".to_string(),
        }
    }
}

/// Executes steps against one page
pub struct WebScenario<'a> {
    home: HomePage<'a>,
    results: ResultsPage<'a>,
    page: &'a dyn Page,
    info: &'a TestInfo,
    timestamp: i64,
}

impl<'a> WebScenario<'a> {
    pub fn new(page: &'a dyn Page, base_url: &str, info: &'a TestInfo) -> Self {
        Self {
            home: HomePage::new(page),
            results: ResultsPage::new(page, base_url, info.expect_timeout),
            page,
            info,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Substitute `{timestamp}` in a term
    pub fn render(&self, term: &str) -> String {
        term.replace("{timestamp}", &self.timestamp.to_string())
    }

    pub async fn run(&self, steps: &[WebStep]) -> QaResult<()> {
        for step in steps {
            self.run_step(step).await?;
        }
        Ok(())
    }

    pub async fn run_step(&self, step: &WebStep) -> QaResult<()> {
        debug!("Executing step: {}", step.name());

        match step {
            WebStep::Open => self.home.open().await,
            WebStep::DismissConsent => {
                if let Some(selector) = dismiss_consent_if_present(self.page).await {
                    debug!("Dismissed consent banner via {}", selector);
                }
                Ok(())
            }
            WebStep::Search { term } => self.home.search(&self.render(term)).await.map(|_| ()),
            WebStep::ExpectUrlHasQuery { term } => {
                self.results.expect_url_has_query(&self.render(term)).await
            }
            WebStep::ExpectResults => self.results.expect_results().await,
            WebStep::ExpectNoResults => self.results.expect_no_results(&self.info.soft).await,
            WebStep::OpenFirstResult => self.results.open_first_result().await,
            WebStep::ExpectArticleVisible => self.results.expect_article_visible().await,
        }
    }
}

/// Run `steps` on `page`, then close it with the attempt's outcome.
///
/// A cancelled attempt stops at the current step and closes the page as
/// failed, so a timed-out test still finishes its trace, screenshot and video.
pub async fn run_and_close(
    page: &dyn Page,
    base_url: &str,
    steps: &[WebStep],
    info: &TestInfo,
) -> QaResult<()> {
    let scenario = WebScenario::new(page, base_url, info);
    let result = tokio::select! {
        result = scenario.run(steps) => result,
        _ = info.cancel.cancelled() => Err(QaError::Cancelled),
    };

    match page.close(result.is_err()).await {
        Ok(files) => {
            for file in files {
                debug!("Artifact: {}", file.display());
            }
        }
        Err(e) => warn!("Failed to finish browser artifacts: {}", e),
    }
    result
}

/// One test case per spec test and browser project
pub fn build_cases(specs: Vec<SpecFile<WebStep>>, config: &WebConfig) -> Vec<TestCase> {
    let config = Arc::new(config.clone());
    let mut cases = Vec::new();

    for browser in &config.browsers {
        for spec in &specs {
            for case in &spec.tests {
                let browser = *browser;
                let steps = Arc::new(case.steps.clone());
                let config = config.clone();
                let mut tags = spec.tags.clone();
                tags.extend(case.tags.iter().cloned());

                cases.push(
                    TestCase::new(spec.describe.clone(), case.name.clone(), move |info| {
                        let steps = steps.clone();
                        let config = config.clone();
                        async move {
                            let session =
                                PlaywrightSession::launch(&config, browser, &info.output_dir)
                                    .await?;
                            run_and_close(&session, &config.base_url, &steps, &info).await
                        }
                    })
                    .with_project(browser.as_str())
                    .with_tags(tags)
                    .with_only(case.only)
                    .with_skip(case.skip),
                );
            }
        }
    }
    cases
}
