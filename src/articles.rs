//! Article enumeration and document link extraction from a Scholar profile.

use crate::browser::{BrowserSession, Locator};
use crate::config::Config;
use crate::error::Result;
use serde::Serialize;
use tracing::{debug, info};

/// Article title links in the profile's publication table
const ARTICLE_SELECTOR: &str = ".gsc_a_at";

/// Substrings that mark an href as a downloadable document
const DOCUMENT_MARKERS: &[&str] = &[".pdf", "viewFile"];

/// A document URL found on one article's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleLink {
    /// 0-based position of the article in the profile table
    pub article_index: usize,
    pub url: String,
}

/// Whether an href points at something worth downloading.
pub fn is_document_href(href: &str) -> bool {
    DOCUMENT_MARKERS.iter().any(|marker| href.contains(marker))
}

/// Walk the open profile's articles in page order and collect at most one
/// document link per article, stopping once `config.max_articles` articles
/// have produced a link.
///
/// Articles without a matching anchor are skipped and do not count toward the
/// cap. Links are not deduplicated.
pub async fn collect_document_links(
    session: &mut dyn BrowserSession,
    config: &Config,
) -> Result<Vec<ArticleLink>> {
    let article_locator = Locator::css(ARTICLE_SELECTOR);
    let anchor_locator = Locator::tag("a");

    let total = session.find_elements(&article_locator).await?.len();
    info!(articles = total, cap = config.max_articles, "Enumerating profile articles");

    let mut links = Vec::new();

    for index in 0..total {
        if links.len() >= config.max_articles {
            break;
        }

        // Re-query after every back navigation and address by position
        let articles = session.find_elements(&article_locator).await?;
        let Some(&article) = articles.get(index) else {
            debug!(index, remaining = articles.len(), "Article list shrank, stopping");
            break;
        };

        session.click(article).await?;
        config.pacing.page_load.pause().await;

        let mut found = None;
        for anchor in session.find_elements(&anchor_locator).await? {
            if let Some(href) = session.attribute(anchor, "href").await? {
                if is_document_href(&href) {
                    found = Some(href);
                    break;
                }
            }
        }

        match found {
            Some(url) => {
                info!(index, url = %url, "Found document link");
                links.push(ArticleLink {
                    article_index: index,
                    url,
                });
            }
            None => debug!(index, "No document link on this article"),
        }

        session.go_back().await?;
        config.pacing.back_navigation.pause().await;
    }

    info!(links = links.len(), "Article enumeration complete");
    Ok(links)
}
