//! Best-effort cookie banner dismissal

use std::time::Duration;

use tracing::{debug, warn};

use crate::page::{ActionOptions, Page};

/// Accept buttons of the consent banners seen on the site, most specific first
pub const CONSENT_SELECTORS: [&str; 4] = [
    "button#onetrust-accept-btn-handler",
    "button[aria-label*=\"Aceitar\" i]",
    "button:has-text(\"Aceitar\"), button:has-text(\"Accept\")",
    ".cc-allow",
];

const CLICK_TIMEOUT: Duration = Duration::from_secs(1);

/// Click the first visible accept button, if any.
///
/// Never fails: a probe or click error counts as "no banner". Returns the
/// selector that was clicked.
pub async fn dismiss_consent_if_present(page: &dyn Page) -> Option<&'static str> {
    for selector in CONSENT_SELECTORS {
        let visible = match page.is_visible(selector).await {
            Ok(visible) => visible,
            Err(e) => {
                debug!("Consent probe {} failed: {}", selector, e);
                false
            }
        };
        if !visible {
            continue;
        }

        if let Err(e) = page
            .click(selector, ActionOptions::timeout(CLICK_TIMEOUT))
            .await
        {
            warn!("Consent button {} did not accept the click: {}", selector, e);
        }
        return Some(selector);
    }
    None
}
