//! Auto-retrying expectations
//!
//! Each expectation polls the page until it holds or the timeout elapses,
//! then fails with the last observed value.

use std::future::Future;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

use qa_common::{QaError, QaResult};

use crate::page::Page;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `probe` until it returns `Ok(true)`.
///
/// `probe` reports the observed value through `actual`. Errors end polling
/// immediately.
async fn poll<F, Fut>(
    what: &str,
    expected: &str,
    timeout: Duration,
    mut probe: F,
) -> QaResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = QaResult<(bool, String)>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let (ok, actual) = probe().await?;
        if ok {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(QaError::assertion(
                format!("{} (within {:?})", what, timeout),
                expected,
                actual,
            ));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub async fn to_be_visible(page: &dyn Page, selector: &str, timeout: Duration) -> QaResult<()> {
    poll(selector, "visible", timeout, move || async move {
        let visible = page.is_visible(selector).await?;
        Ok((visible, if visible { "visible" } else { "hidden" }.to_string()))
    })
    .await
}

pub async fn to_have_count(
    page: &dyn Page,
    selector: &str,
    expected: usize,
    timeout: Duration,
) -> QaResult<()> {
    poll(
        &format!("count of {}", selector),
        &expected.to_string(),
        timeout,
        move || async move {
            let count = page.count(selector).await?;
            Ok((count == expected, count.to_string()))
        },
    )
    .await
}

pub async fn to_have_url(page: &dyn Page, pattern: &Regex, timeout: Duration) -> QaResult<()> {
    poll(
        "page url",
        &format!("to match /{}/", pattern.as_str()),
        timeout,
        move || async move {
            let url = page.url().await?;
            Ok((pattern.is_match(&url), format!("{:?}", url)))
        },
    )
    .await
}

/// Text matching `pattern` (case-insensitive) becomes visible
pub async fn text_to_be_visible(page: &dyn Page, pattern: &str, timeout: Duration) -> QaResult<()> {
    poll(
        &format!("text /{}/i", pattern),
        "visible",
        timeout,
        move || async move {
            let visible = page.text_visible(pattern).await?;
            Ok((visible, if visible { "visible" } else { "not visible" }.to_string()))
        },
    )
    .await
}
