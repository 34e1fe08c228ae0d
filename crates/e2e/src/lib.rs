//! Agibank Blog Search Suite
//!
//! Drives the blog's search through a real browser:
//! - Controls Playwright through a long-lived Node.js bridge process
//! - Page objects for the home page and the search results
//! - Best-effort consent banner dismissal
//! - Declarative YAML steps, one test case per browser project
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  blog-search-suite (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  build_cases(specs, WebConfig) -> [TestCase]                │
//! │    └── per attempt:                                         │
//! │          PlaywrightSession::launch() -> impl Page           │
//! │          run_and_close(steps), until done or cancelled      │
//! │            ├── open / dismiss_consent / search              │
//! │            ├── expect_* on ResultsPage                      │
//! │            └── close(failed) -> trace, screenshot, video    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page (trait)                                               │
//! │    ├── goto, count, is_visible, click, fill, type, press    │
//! │    └── url, text_visible, close                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod consent;
pub mod expect;
pub mod page;
pub mod pages;
pub mod playwright;
pub mod steps;

pub use consent::dismiss_consent_if_present;
pub use page::{ActionOptions, LoadState, Locator, Page};
pub use pages::{HomePage, ResultsPage, SearchPath};
pub use playwright::{check_playwright_installed, Browser, CaptureMode, PlaywrightSession, WebConfig};
pub use steps::{build_cases, run_and_close, WebScenario, WebStep};

/// Worker count under CI
pub const CI_WORKERS: usize = 2;
