//! Search results page

use std::time::Duration;

use regex::Regex;

use qa_common::{QaResult, SoftAssertions};

use crate::expect;
use crate::page::{ActionOptions, Locator, Page};

/// Article cards of the result listing, per theme layout
pub const RESULT_CARD_CANDIDATES: [&str; 3] =
    ["#content article", "main article", ".site-main article"];

pub const FIRST_RESULT_LINK: &str = "article a";

pub const ARTICLE: &str = "article";

/// Localized WordPress empty-state messages
pub const EMPTY_STATE_TEXT: &str =
    "(não foram encontrados resultados|nenhum resultado|nada foi encontrado|desculpe, mas nada)";

const NO_RESULTS_TIMEOUT: Duration = Duration::from_secs(10);
const EMPTY_STATE_TIMEOUT: Duration = Duration::from_secs(3);

/// Every layout's cards at once, each element counted a single time
pub fn result_cards() -> Locator {
    Locator::any_of(&RESULT_CARD_CANDIDATES)
}

pub struct ResultsPage<'a> {
    page: &'a dyn Page,
    cards: String,
    base_url: String,
    expect_timeout: Duration,
}

impl<'a> ResultsPage<'a> {
    pub fn new(page: &'a dyn Page, base_url: &str, expect_timeout: Duration) -> Self {
        Self {
            page,
            cards: result_cards().union(),
            base_url: base_url.trim_end_matches('/').to_string(),
            expect_timeout,
        }
    }

    /// URL carries `s=` with the encoded term
    pub async fn expect_url_has_query(&self, term: &str) -> QaResult<()> {
        let pattern = query_pattern(term)?;
        expect::to_have_url(self.page, &pattern, self.expect_timeout).await
    }

    /// At least one result card is visible
    pub async fn expect_results(&self) -> QaResult<()> {
        expect::to_be_visible(self.page, &self.cards, self.expect_timeout).await
    }

    /// Zero result cards; the empty-state message is only a soft check
    pub async fn expect_no_results(&self, soft: &SoftAssertions) -> QaResult<()> {
        expect::to_have_count(self.page, &self.cards, 0, NO_RESULTS_TIMEOUT).await?;
        soft.check(
            expect::text_to_be_visible(self.page, EMPTY_STATE_TEXT, EMPTY_STATE_TIMEOUT).await,
        )?;
        Ok(())
    }

    /// Open the first result and check an article loads on the same site
    pub async fn open_first_result(&self) -> QaResult<()> {
        self.page
            .click(FIRST_RESULT_LINK, ActionOptions::default())
            .await?;
        let origin = Regex::new(&format!("(?i)^{}/", regex::escape(&self.base_url)))?;
        expect::to_have_url(self.page, &origin, self.expect_timeout).await?;
        self.expect_article_visible().await
    }

    pub async fn expect_article_visible(&self) -> QaResult<()> {
        expect::to_be_visible(self.page, ARTICLE, self.expect_timeout).await
    }
}

/// `[?&]s=.*{encoded term}`, case-insensitive
pub fn query_pattern(term: &str) -> QaResult<Regex> {
    let encoded = urlencoding::encode(term);
    Ok(Regex::new(&format!("(?i)[?&]s=.*{}", regex::escape(&encoded)))?)
}
