//! Blog home page and its header search

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use qa_common::QaResult;

use crate::page::{ActionOptions, LoadState, Locator, Page};

/// Magnifier button that reveals the header search box
pub const SEARCH_TOGGLE: [&str; 7] = [
    "button.ast-search-menu-icon",
    "button.ast-header-search",
    "button[aria-label*=\"Search\" i]",
    "button[aria-label*=\"Pesquisar\" i]",
    "a[aria-label*=\"Search\" i]",
    "a[aria-label*=\"Pesquisar\" i]",
    ".ast-search-icon",
];

pub const SEARCH_INPUT: [&str; 2] = ["input[type=\"search\"]", "input[name=\"s\"]"];

pub const SEARCH_SUBMIT: [&str; 4] = [
    "form[role=\"search\"] button[type=\"submit\"]",
    "form.search-form button[type=\"submit\"]",
    ".ast-search-box__submit",
    "button[type=\"submit\"][aria-label*=\"Pesquisar\" i]",
];

const TOGGLE_CLICK_TIMEOUT: Duration = Duration::from_secs(2);
const INPUT_SETTLE: Duration = Duration::from_secs(1);
const INPUT_POLL: Duration = Duration::from_millis(100);
const NAVIGATION_RETRY_DELAY: Duration = Duration::from_millis(400);

/// How a search reached the results page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPath {
    /// Typed into the header search box
    Ui,
    /// Navigated to `/?s=term`
    Direct,
}

pub struct HomePage<'a> {
    page: &'a dyn Page,
    toggle: Locator,
    input: Locator,
    submit: Locator,
}

impl<'a> HomePage<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self {
            page,
            toggle: Locator::any_of(&SEARCH_TOGGLE),
            input: Locator::any_of(&SEARCH_INPUT),
            submit: Locator::any_of(&SEARCH_SUBMIT),
        }
    }

    pub async fn open(&self) -> QaResult<()> {
        self.page.goto("/", LoadState::Load).await
    }

    /// Click the search toggle when the input is hidden.
    ///
    /// A failed visibility probe counts as hidden, and a failed toggle click is
    /// ignored; [`HomePage::search`] falls back to direct navigation.
    pub async fn reveal_search_if_hidden(&self) -> QaResult<()> {
        let visible = match self.input.first_visible(self.page).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                debug!("Search input probe failed: {}", e);
                false
            }
        };
        if visible {
            return Ok(());
        }

        if let Some(toggle) = self.toggle.first_present(self.page).await? {
            debug!("Opening search with {}", toggle);
            if let Err(e) = self
                .page
                .click(toggle, ActionOptions::timeout(TOGGLE_CLICK_TIMEOUT))
                .await
            {
                warn!("Search toggle click failed: {}", e);
            }
        }
        Ok(())
    }

    /// Search for `term`, through the UI when possible
    pub async fn search(&self, term: &str) -> QaResult<SearchPath> {
        self.reveal_search_if_hidden().await?;

        if let Some(input) = self.wait_for_input().await? {
            self.page.fill(input, "").await?;
            self.page.type_text(input, term).await?;

            let submitted = ActionOptions::waiting_for(LoadState::DomContentLoaded);
            match self.submit.first_visible(self.page).await? {
                Some(submit) => self.page.click(submit, submitted).await?,
                None => self.page.press(input, "Enter", submitted).await?,
            }
            info!("Searched for {:?} through the search box", term);
            return Ok(SearchPath::Ui);
        }

        let url = format!("/?s={}", urlencoding::encode(term));
        if let Err(e) = self.page.goto(&url, LoadState::DomContentLoaded).await {
            warn!("Navigation to {} failed, retrying once: {}", url, e);
            tokio::time::sleep(NAVIGATION_RETRY_DELAY).await;
            self.page.goto(&url, LoadState::DomContentLoaded).await?;
        }
        info!("Searched for {:?} through {}", term, url);
        Ok(SearchPath::Direct)
    }

    /// Visible search input, allowing the toggle animation to finish
    async fn wait_for_input(&self) -> QaResult<Option<&str>> {
        let deadline = Instant::now() + INPUT_SETTLE;
        loop {
            if let Some(input) = self.input.first_visible(self.page).await? {
                return Ok(Some(input));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(INPUT_POLL).await;
        }
    }
}
