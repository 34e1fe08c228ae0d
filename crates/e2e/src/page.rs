//! Browser page abstraction and candidate locators

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use qa_common::QaResult;

/// Page lifecycle event to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Load,
    DomContentLoaded,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
        }
    }
}

/// Options for actions that may trigger a navigation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOptions {
    /// Action timeout; the browser default applies when unset
    pub timeout: Option<Duration>,
    /// Wait for this load state together with the action
    pub wait_for: Option<LoadState>,
}

impl ActionOptions {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            wait_for: None,
        }
    }

    pub fn waiting_for(state: LoadState) -> Self {
        Self {
            timeout: None,
            wait_for: Some(state),
        }
    }
}

/// One browser tab.
///
/// Selectors follow Playwright syntax. Actions on a selector address its
/// first match; `count` addresses every match. Relative URLs resolve against
/// the configured base URL.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str, wait_until: LoadState) -> QaResult<()>;

    async fn count(&self, selector: &str) -> QaResult<usize>;

    /// Whether the first match is visible; no match is not an error
    async fn is_visible(&self, selector: &str) -> QaResult<bool>;

    async fn click(&self, selector: &str, options: ActionOptions) -> QaResult<()>;

    async fn fill(&self, selector: &str, value: &str) -> QaResult<()>;

    /// Type key by key, like a user
    async fn type_text(&self, selector: &str, text: &str) -> QaResult<()>;

    async fn press(&self, selector: &str, key: &str, options: ActionOptions) -> QaResult<()>;

    async fn url(&self) -> QaResult<String>;

    /// Whether text matching `pattern` (case-insensitive) is visible
    async fn text_visible(&self, pattern: &str) -> QaResult<bool>;

    /// Close the page, finishing configured artifacts; returns the files kept
    async fn close(&self, failed: bool) -> QaResult<Vec<PathBuf>>;
}

/// Ordered candidate selectors for one control, most specific first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    candidates: Vec<String>,
}

impl Locator {
    pub fn any_of(selectors: &[&str]) -> Self {
        Self {
            candidates: selectors.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// All candidates as one selector list, matching each element once
    pub fn union(&self) -> String {
        self.candidates.join(", ")
    }

    /// First candidate with at least one match
    pub async fn first_present(&self, page: &dyn Page) -> QaResult<Option<&str>> {
        for candidate in &self.candidates {
            if page.count(candidate).await? > 0 {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// First candidate whose first match is visible
    pub async fn first_visible(&self, page: &dyn Page) -> QaResult<Option<&str>> {
        for candidate in &self.candidates {
            if page.is_visible(candidate).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}
