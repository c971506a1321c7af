//! Bot-verification handling.
//!
//! Google Scholar sometimes interposes a reCAPTCHA page. The crate does not
//! try to solve it; it waits for the checkbox, clicks it, and leaves the rest
//! to the site (or to a human watching the visible browser window).

use crate::browser::{BrowserSession, Locator};
use crate::config::Config;
use crate::error::{Result, ScholarMailError};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

/// Element id of the reCAPTCHA checkbox
pub const VERIFICATION_ELEMENT_ID: &str = "recaptcha-anchor";

/// Page text Google Scholar shows alongside its challenge
const CHALLENGE_PHRASES: &[&str] = &[
    "unusual traffic",
    "Solving the above CAPTCHA",
    "not a robot",
];

/// Wait up to `timeout` for the verification element, then click it.
///
/// Returns whether a click happened. Never fails: a missing element is the
/// common case and is only logged.
pub async fn wait_and_click_verification(
    session: &mut dyn BrowserSession,
    config: &Config,
    timeout: Duration,
) -> bool {
    let locator = Locator::id(VERIFICATION_ELEMENT_ID);
    match try_click(session, config, &locator, timeout).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, timeout_ms = timeout.as_millis() as u64, "Verification element not clicked");
            false
        }
    }
}

async fn try_click(
    session: &mut dyn BrowserSession,
    config: &Config,
    locator: &Locator,
    timeout: Duration,
) -> Result<()> {
    let element = session.wait_until_clickable(locator, timeout).await?;
    info!("Verification element found, clicking");
    config.pacing.verification_settle.pause().await;
    session.click(element).await?;
    config.pacing.verification_followup.pause().await;
    Ok(())
}

/// Whether `html` looks like a bot-verification page.
pub fn detect_challenge(html: &str) -> Result<bool> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(
        "#recaptcha-anchor, #captcha-form, iframe[src*=\"recaptcha\"], div.g-recaptcha",
    )
    .map_err(|e| ScholarMailError::Parse(e.to_string()))?;

    if document.select(&selector).next().is_some() {
        return Ok(true);
    }

    let text: String = document.root_element().text().collect();
    Ok(CHALLENGE_PHRASES.iter().any(|phrase| text.contains(phrase)))
}
