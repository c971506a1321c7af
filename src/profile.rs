//! Google Scholar profile search.
//!
//! Drives the Scholar search box with a researcher's display name and opens
//! the first profile result.

use crate::browser::{BrowserSession, Locator};
use crate::config::Config;
use crate::error::Result;
use crate::verification::{detect_challenge, wait_and_click_verification};
use tracing::{debug, info, warn};

/// Search box on the Scholar home page
const SEARCH_BOX_NAME: &str = "q";

/// First "User profiles for ..." result
const PROFILE_LINK_SELECTOR: &str = "h4.gs_rt2 a";

/// Where the profile search left the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOutcome {
    /// The profile page is open
    Opened,
    /// The profile link never appeared; the browser is wherever it ended up
    NotFound,
}

/// Search Scholar for `display_name` and navigate to the first profile.
///
/// A missing profile link is retried with a verification click in between.
/// Exhaustion is not an error: the caller continues with the browser in its
/// current state.
///
/// # Errors
///
/// Fails if the home page or its search box cannot be reached.
pub async fn open_profile(
    session: &mut dyn BrowserSession,
    config: &Config,
    display_name: &str,
) -> Result<ProfileOutcome> {
    let home = config.scholar_home()?;
    info!(name = display_name, url = %home, "Searching Scholar profile");

    session.navigate(home.as_str()).await?;
    config.pacing.page_load.pause().await;

    let search_box = session.find_element(&Locator::name(SEARCH_BOX_NAME)).await?;
    session.send_keys(search_box, display_name).await?;
    session.submit(search_box).await?;
    config.pacing.page_load.pause().await;

    let policy = config.profile_retry();
    let profile_link = Locator::css(PROFILE_LINK_SELECTOR);

    for attempt in policy.attempts() {
        // A click swallowed by a challenge overlay is retried like a missing link
        let reached = match session.find_element(&profile_link).await {
            Ok(link) => session.click(link).await,
            Err(e) => Err(e),
        };
        match reached {
            Ok(()) => {
                info!(name = display_name, attempt = attempt.number, "Navigated to profile");
                return Ok(ProfileOutcome::Opened);
            }
            Err(e) => {
                let challenged = match session.page_source().await {
                    Ok(html) => detect_challenge(&html).unwrap_or(false),
                    Err(_) => false,
                };
                warn!(
                    name = display_name,
                    attempt = attempt.number,
                    challenged,
                    error = %e,
                    "Profile link not reached, attempting verification"
                );
                wait_and_click_verification(session, config, config.profile_verification_timeout())
                    .await;
            }
        }
        if !attempt.is_last {
            policy.backoff().await;
        }
    }

    warn!(
        name = display_name,
        attempts = policy.max_attempts(),
        "Profile not reached, continuing with current page"
    );
    debug!("Article enumeration will run against whatever page is open");
    Ok(ProfileOutcome::NotFound)
}
