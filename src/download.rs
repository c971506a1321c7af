//! Retry downloader.
//!
//! Each link gets its own browser session pointed at the author's directory.
//! Success is judged by what is on disk afterwards, not by the browser.

use crate::articles::ArticleLink;
use crate::browser::{BrowserLauncher, LaunchOptions, SessionGuard};
use crate::config::{Config, DownloadDetection};
use crate::error::Result;
use crate::verification::wait_and_click_verification;
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Suffix of files the downloader waits for
const DOCUMENT_SUFFIX: &str = ".pdf";

/// What happened to an author's links.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub directory: PathBuf,
    /// Links after which a document was detected
    pub downloaded: Vec<String>,
    /// Links given up after every attempt
    pub abandoned: Vec<String>,
}

/// Names of `*.pdf` entries directly inside `dir`.
pub fn document_files(dir: &Path) -> Result<HashSet<OsString>> {
    let mut names = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(DOCUMENT_SUFFIX) {
            names.insert(entry.file_name());
        }
    }
    Ok(names)
}

/// Whether any `*.pdf` exists in `dir`. Unreadable directories count as empty.
pub fn has_document(dir: &Path) -> bool {
    document_files(dir).map(|names| !names.is_empty()).unwrap_or(false)
}

/// Downloads document links into one author directory.
pub struct Downloader<'a> {
    launcher: &'a dyn BrowserLauncher,
    config: &'a Config,
}

impl<'a> Downloader<'a> {
    pub fn new(launcher: &'a dyn BrowserLauncher, config: &'a Config) -> Self {
        Self { launcher, config }
    }

    /// Download every link into `directory`, creating it first.
    ///
    /// Links are independent: one link's exhaustion or launch failure never
    /// stops the next. Only failing to create the directory is an error.
    pub async fn download_all(&self, links: &[ArticleLink], directory: &Path) -> Result<DownloadReport> {
        std::fs::create_dir_all(directory)?;

        let mut report = DownloadReport {
            directory: directory.to_path_buf(),
            ..DownloadReport::default()
        };

        for (i, link) in links.iter().enumerate() {
            let position = i + 1;
            match self.download_one(position, &link.url, directory).await {
                Ok(true) => report.downloaded.push(link.url.clone()),
                Ok(false) => report.abandoned.push(link.url.clone()),
                Err(e) => {
                    error!(position, url = %link.url, error = %e, "Download session failed");
                    report.abandoned.push(link.url.clone());
                }
            }
        }

        info!(
            directory = ?directory,
            downloaded = report.downloaded.len(),
            abandoned = report.abandoned.len(),
            "Downloads finished"
        );
        Ok(report)
    }

    /// Attempt one link; `Ok(false)` once every attempt and the manual
    /// verification window have passed without a detected file.
    async fn download_one(&self, position: usize, url: &str, directory: &Path) -> Result<bool> {
        let baseline = match self.config.download_detection {
            DownloadDetection::Any => HashSet::new(),
            DownloadDetection::New => document_files(directory)?,
        };

        let mut session =
            SessionGuard::open(self.launcher, &LaunchOptions::downloading_to(directory)).await?;
        let policy = self.config.download_retry();
        let mut success = false;

        for attempt in policy.attempts() {
            info!(position, url, attempt = attempt.number, "Attempting download");

            match session.navigate(url).await {
                Ok(()) => {}
                // Navigations that turn into downloads are often reported as aborted
                Err(e) => warn!(position, url, attempt = attempt.number, error = %e, "Navigation error"),
            }
            self.config.pacing.download_settle.pause().await;

            if self.detected(directory, &baseline) {
                info!(position, url, "Download detected");
                success = true;
                break;
            }
            debug!(position, url, attempt = attempt.number, "No document detected");

            if attempt.is_last {
                warn!(position, url, "Manual verification required");
                wait_and_click_verification(
                    &mut *session,
                    self.config,
                    self.config.manual_verification_timeout(),
                )
                .await;
            } else {
                policy.backoff().await;
            }
        }

        session.close().await;

        if !success {
            warn!(position, url, attempts = policy.max_attempts(), "Giving up on link");
        }
        Ok(success)
    }

    fn detected(&self, directory: &Path, baseline: &HashSet<OsString>) -> bool {
        match self.config.download_detection {
            DownloadDetection::Any => has_document(directory),
            DownloadDetection::New => document_files(directory)
                .map(|now| now.difference(baseline).next().is_some())
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeScholar, FakeWeb};
    use tempfile::TempDir;

    fn link(url: &str) -> ArticleLink {
        ArticleLink {
            article_index: 0,
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_creates_directory_and_downloads() -> Result<()> {
        let root = TempDir::new()?;
        let dir = root.path().join("57190000000");
        let web = FakeWeb::new(FakeScholar::default().download("https://a.org/p.pdf", "p.pdf", 1));
        let config = Config::unpaced(root.path());

        let report = Downloader::new(&web, &config)
            .download_all(&[link("https://a.org/p.pdf")], &dir)
            .await?;

        assert!(dir.join("p.pdf").exists());
        assert_eq!(report.downloaded, vec!["https://a.org/p.pdf".to_string()]);
        assert!(report.abandoned.is_empty());
        assert_eq!(web.visits("https://a.org/p.pdf"), 1);
        assert_eq!(
            web.launch_options(),
            vec![LaunchOptions::downloading_to(&dir)]
        );
        assert_eq!(web.quits(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_retries_until_file_appears() -> Result<()> {
        let root = TempDir::new()?;
        let web = FakeWeb::new(FakeScholar::default().download("https://a.org/slow.pdf", "slow.pdf", 3));
        let config = Config::unpaced(root.path());

        let report = Downloader::new(&web, &config)
            .download_all(&[link("https://a.org/slow.pdf")], root.path())
            .await?;

        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(web.visits("https://a.org/slow.pdf"), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_link_is_abandoned_and_next_continues() -> Result<()> {
        let root = TempDir::new()?;
        let mut site = FakeScholar::default().download("https://b.org/ok.pdf", "ok.pdf", 1);
        site.failing_navigation.insert("https://a.org/broken.pdf".to_string());
        let web = FakeWeb::new(site);
        let config = Config::unpaced(root.path());

        let report = Downloader::new(&web, &config)
            .download_all(
                &[link("https://a.org/broken.pdf"), link("https://b.org/ok.pdf")],
                root.path(),
            )
            .await?;

        assert_eq!(report.abandoned, vec!["https://a.org/broken.pdf".to_string()]);
        assert_eq!(report.downloaded, vec!["https://b.org/ok.pdf".to_string()]);
        assert_eq!(web.visits("https://a.org/broken.pdf"), 5);
        // One session per link, each torn down
        assert_eq!(web.launches(), 2);
        assert_eq!(web.quits(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_manual_window_clicks_verification() -> Result<()> {
        let root = TempDir::new()?;
        let web = FakeWeb::new(FakeScholar {
            verification_present: true,
            ..FakeScholar::default()
        });
        let config = Config::unpaced(root.path());

        let report = Downloader::new(&web, &config)
            .download_all(&[link("https://a.org/never.pdf")], root.path())
            .await?;

        assert_eq!(report.abandoned.len(), 1);
        // Only the final attempt escalates
        assert_eq!(web.verification_clicks(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_any_detection_is_directory_wide() -> Result<()> {
        let root = TempDir::new()?;
        std::fs::write(root.path().join("earlier.pdf"), b"%PDF")?;
        let web = FakeWeb::new(FakeScholar::default());
        let config = Config::unpaced(root.path());

        let report = Downloader::new(&web, &config)
            .download_all(&[link("https://a.org/never.pdf")], root.path())
            .await?;

        // The earlier file masks the failed download
        assert_eq!(report.downloaded.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_new_detection_ignores_existing_files() -> Result<()> {
        let root = TempDir::new()?;
        std::fs::write(root.path().join("earlier.pdf"), b"%PDF")?;
        let web = FakeWeb::new(FakeScholar::default());
        let config = Config {
            download_detection: DownloadDetection::New,
            ..Config::unpaced(root.path())
        };

        let report = Downloader::new(&web, &config)
            .download_all(&[link("https://a.org/never.pdf")], root.path())
            .await?;

        assert_eq!(report.abandoned.len(), 1);
        assert_eq!(web.visits("https://a.org/never.pdf"), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_launch_failure_abandons_link() -> Result<()> {
        let root = TempDir::new()?;
        let web = FakeWeb::new(FakeScholar {
            fail_launch: true,
            ..FakeScholar::default()
        });
        let config = Config::unpaced(root.path());

        let report = Downloader::new(&web, &config)
            .download_all(&[link("https://a.org/p.pdf"), link("https://b.org/q.pdf")], root.path())
            .await?;
        assert_eq!(report.abandoned.len(), 2);
        Ok(())
    }

    #[test]
    fn test_has_document_checks_suffix() -> Result<()> {
        let dir = TempDir::new()?;
        assert!(!has_document(dir.path()));
        std::fs::write(dir.path().join("paper.pdf.crdownload"), b"")?;
        assert!(!has_document(dir.path()));
        std::fs::write(dir.path().join("paper.pdf"), b"")?;
        assert!(has_document(dir.path()));
        Ok(())
    }
}
