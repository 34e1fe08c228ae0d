//! In-memory blog used in place of a browser

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use qa_common::{QaError, QaResult};
use qa_e2e::page::{ActionOptions, LoadState, Page};
use qa_e2e::pages::home::{SEARCH_INPUT, SEARCH_SUBMIT, SEARCH_TOGGLE};
use qa_e2e::pages::results::{result_cards, ARTICLE, FIRST_RESULT_LINK};

pub const BASE_URL: &str = "https://blog.agibank.com.br";
pub const CONSENT_BUTTON: &str = "button#onetrust-accept-btn-handler";

/// How the header search box shows up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBox {
    Visible,
    BehindToggle,
    Missing,
}

/// Shape of the simulated site
#[derive(Debug, Clone)]
pub struct FakeBlog {
    pub search_box: SearchBox,
    pub submit_button: bool,
    pub consent_banner: bool,
    /// Terms (lowercase substrings) that have matching posts
    pub known_terms: Vec<String>,
    pub empty_state_message: bool,
    /// Navigations to `/?s=` that fail before one succeeds
    pub search_goto_failures: usize,
    /// Where the first result links to
    pub article_url: String,
    pub broken_probes: bool,
    /// Toggle and consent clicks time out without effect
    pub broken_clicks: bool,
    /// Every navigation stalls this long first
    pub goto_delay: Option<Duration>,
}

impl Default for FakeBlog {
    fn default() -> Self {
        Self {
            search_box: SearchBox::Visible,
            submit_button: true,
            consent_banner: false,
            known_terms: vec!["agi".into()],
            empty_state_message: true,
            search_goto_failures: 0,
            article_url: format!("{}/conta-digital/", BASE_URL),
            broken_probes: false,
            broken_clicks: false,
            goto_delay: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Blank,
    Home,
    Results(String),
    Article,
}

#[derive(Debug)]
struct State {
    location: Location,
    url: String,
    search_open: bool,
    typed: String,
    consent_visible: bool,
    goto_failures_left: usize,
    calls: Vec<String>,
    closed: Option<bool>,
}

pub struct FakePage {
    blog: FakeBlog,
    state: Mutex<State>,
}

impl FakePage {
    pub fn new(blog: FakeBlog) -> Self {
        let state = State {
            location: Location::Blank,
            url: "about:blank".into(),
            search_open: false,
            typed: String::new(),
            consent_visible: blog.consent_banner,
            goto_failures_left: blog.search_goto_failures,
            calls: Vec::new(),
            closed: None,
        };
        Self {
            blog,
            state: Mutex::new(state),
        }
    }

    /// Every action performed, as `op:argument`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.state.lock().calls.iter().any(|c| c == call)
    }

    pub fn current_url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn closed_as_failed(&self) -> Option<bool> {
        self.state.lock().closed
    }

    fn has_results(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.blog.known_terms.iter().any(|k| term.contains(k.as_str()))
    }

    fn input_visible(&self, state: &State) -> bool {
        state.location == Location::Home
            && match self.blog.search_box {
                SearchBox::Visible => true,
                SearchBox::BehindToggle => state.search_open,
                SearchBox::Missing => false,
            }
    }

    fn result_count(&self, state: &State) -> usize {
        match &state.location {
            Location::Results(term) if self.has_results(term) => 3,
            _ => 0,
        }
    }

    fn show_results(&self, state: &mut State, term: String) {
        state.url = format!("{}/?s={}", BASE_URL, urlencoding::encode(&term));
        state.location = Location::Results(term);
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str, wait_until: LoadState) -> QaResult<()> {
        if let Some(delay) = self.blog.goto_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        state.calls.push(format!("goto:{}:{}", url, wait_until.as_str()));

        if let Some(query) = url.strip_prefix("/?s=") {
            if state.goto_failures_left > 0 {
                state.goto_failures_left -= 1;
                return Err(QaError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_ABORTED".into(),
                });
            }
            let term = urlencoding::decode(query)
                .map(|t| t.into_owned())
                .unwrap_or_else(|_| query.to_string());
            self.show_results(&mut state, term);
        } else if url == "/" {
            state.url = format!("{}/", BASE_URL);
            state.location = Location::Home;
        } else {
            return Err(QaError::Navigation {
                url: url.to_string(),
                reason: "unexpected url".into(),
            });
        }
        Ok(())
    }

    async fn count(&self, selector: &str) -> QaResult<usize> {
        let state = self.state.lock();
        let count = if selector == result_cards().union() {
            self.result_count(&state)
        } else if selector == SEARCH_TOGGLE[0] {
            usize::from(self.blog.search_box == SearchBox::BehindToggle)
        } else if selector == ARTICLE {
            match state.location {
                Location::Article => 1,
                _ => self.result_count(&state),
            }
        } else {
            0
        };
        Ok(count)
    }

    async fn is_visible(&self, selector: &str) -> QaResult<bool> {
        if self.blog.broken_probes {
            return Err(QaError::Browser {
                action: "is_visible".into(),
                reason: "Target closed".into(),
            });
        }
        let state = self.state.lock();
        let visible = if selector == SEARCH_INPUT[0] {
            self.input_visible(&state)
        } else if selector == SEARCH_SUBMIT[0] {
            self.blog.submit_button && self.input_visible(&state)
        } else if selector == CONSENT_BUTTON {
            state.consent_visible
        } else if selector == result_cards().union() {
            self.result_count(&state) > 0
        } else if selector == ARTICLE {
            state.location == Location::Article || self.result_count(&state) > 0
        } else {
            false
        };
        Ok(visible)
    }

    async fn click(&self, selector: &str, _options: ActionOptions) -> QaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("click:{}", selector));

        let breakable = selector == SEARCH_TOGGLE[0] || selector == CONSENT_BUTTON;
        if self.blog.broken_clicks && breakable {
            return Err(QaError::Browser {
                action: "click".into(),
                reason: format!("Timeout waiting for {} to be stable", selector),
            });
        }

        if selector == SEARCH_TOGGLE[0] {
            state.search_open = true;
        } else if selector == CONSENT_BUTTON {
            state.consent_visible = false;
        } else if selector == SEARCH_SUBMIT[0] {
            let term = state.typed.clone();
            self.show_results(&mut state, term);
        } else if selector == FIRST_RESULT_LINK && self.result_count(&state) > 0 {
            state.url = self.blog.article_url.clone();
            state.location = Location::Article;
        } else {
            return Err(QaError::Browser {
                action: "click".into(),
                reason: format!("Timeout waiting for {}", selector),
            });
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> QaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("fill:{}:{}", selector, value));
        state.typed = value.to_string();
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> QaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("type:{}:{}", selector, text));
        state.typed.push_str(text);
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str, _options: ActionOptions) -> QaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("press:{}:{}", selector, key));
        if key == "Enter" {
            let term = state.typed.clone();
            self.show_results(&mut state, term);
        }
        Ok(())
    }

    async fn url(&self) -> QaResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn text_visible(&self, _pattern: &str) -> QaResult<bool> {
        let state = self.state.lock();
        Ok(self.blog.empty_state_message
            && matches!(&state.location, Location::Results(term) if !self.has_results(term)))
    }

    async fn close(&self, failed: bool) -> QaResult<Vec<PathBuf>> {
        self.state.lock().closed = Some(failed);
        Ok(Vec::new())
    }
}
