//! Acquisition pipeline: profile search, link extraction and downloads for
//! each author record.

use crate::articles::{collect_document_links, ArticleLink};
use crate::authors::{is_safe_identifier, AuthorRecord};
use crate::browser::{BrowserLauncher, LaunchOptions, SessionGuard};
use crate::config::Config;
use crate::download::{DownloadReport, Downloader};
use crate::error::{Result, ScholarMailError};
use crate::profile::{open_profile, ProfileOutcome};
use serde::Serialize;
use tracing::{error, info};

/// Result of acquiring one author.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AcquisitionOutcome {
    /// The author directory already existed; nothing was touched
    Skipped,
    Acquired {
        profile_found: bool,
        links: Vec<ArticleLink>,
        report: DownloadReport,
    },
}

/// Counts from a per-record loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drives acquisition for author records, one at a time.
pub struct Acquirer<'a> {
    launcher: &'a dyn BrowserLauncher,
    config: &'a Config,
}

impl<'a> Acquirer<'a> {
    pub fn new(launcher: &'a dyn BrowserLauncher, config: &'a Config) -> Self {
        Self { launcher, config }
    }

    /// Acquire documents for one author.
    ///
    /// If `<download_root>/<identifier>` exists the author is skipped without
    /// launching a browser or writing anything.
    pub async fn acquire(&self, author: &AuthorRecord) -> Result<AcquisitionOutcome> {
        if !is_safe_identifier(&author.identifier) {
            return Err(ScholarMailError::Config(format!(
                "identifier '{}' does not name a single directory",
                author.identifier
            )));
        }
        let directory = self.config.author_dir(&author.identifier);
        if directory.exists() {
            info!(identifier = %author.identifier, directory = ?directory, "Already acquired, skipping");
            return Ok(AcquisitionOutcome::Skipped);
        }

        let (profile, links) = {
            let mut session = SessionGuard::open(self.launcher, &LaunchOptions::browsing()).await?;
            let found = self.search(&mut session, author).await;
            session.close().await;
            found?
        };

        info!(
            identifier = %author.identifier,
            links = links.len(),
            "Document links collected"
        );
        for link in &links {
            info!(identifier = %author.identifier, url = %link.url, "Document link");
        }

        let report = Downloader::new(self.launcher, self.config)
            .download_all(&links, &directory)
            .await?;

        Ok(AcquisitionOutcome::Acquired {
            profile_found: profile == ProfileOutcome::Opened,
            links,
            report,
        })
    }

    async fn search(
        &self,
        session: &mut SessionGuard,
        author: &AuthorRecord,
    ) -> Result<(ProfileOutcome, Vec<ArticleLink>)> {
        let profile = open_profile(&mut **session, self.config, &author.researcher_name).await?;
        let links = collect_document_links(&mut **session, self.config).await?;
        Ok((profile, links))
    }

    /// Acquire every record, isolating failures per author.
    pub async fn run(&self, authors: &[AuthorRecord]) -> RunSummary {
        let mut summary = RunSummary::default();

        for (i, author) in authors.iter().enumerate() {
            info!(
                index = i + 1,
                total = authors.len(),
                identifier = %author.identifier,
                name = %author.researcher_name,
                "Processing author"
            );
            match self.acquire(author).await {
                Ok(AcquisitionOutcome::Skipped) => summary.skipped += 1,
                Ok(AcquisitionOutcome::Acquired { .. }) => summary.processed += 1,
                Err(e) => {
                    error!(
                        identifier = %author.identifier,
                        name = %author.researcher_name,
                        error = %e,
                        "Acquisition failed for author"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Acquisition run complete"
        );
        summary
    }
}
