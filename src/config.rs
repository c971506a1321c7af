//! Runtime configuration.
//!
//! A single [`Config`] value is built once (defaults, then an optional JSON
//! file, then CLI overrides) and passed by reference into every component.

use crate::error::{Result, ScholarMailError};
use crate::retry::{Pacing, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com/";

/// Default root for downloaded documents
pub const DEFAULT_DOWNLOAD_ROOT: &str = "./pdfs";

/// Default Apache Tika server
pub const DEFAULT_TIKA_URL: &str = "http://localhost:9998";

/// Config file looked up in the home directory when `--config` is absent
const CONFIG_FILE_NAME: &str = ".scholarmail.json";

/// How the downloader decides that a link produced a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DownloadDetection {
    /// Any `*.pdf` in the author directory counts, including earlier links' files.
    #[default]
    Any,
    /// Only a `*.pdf` that was absent before this link's first attempt counts.
    New,
}

/// Text extraction backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// In-process PDF text extraction
    #[default]
    Pdf,
    /// Apache Tika server
    Tika,
}

/// Human-pacing delays between browser steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub page_load: Pacing,
    pub back_navigation: Pacing,
    pub download_settle: Pacing,
    pub download_retry: Pacing,
    pub verification_settle: Pacing,
    pub verification_followup: Pacing,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_load: Pacing::between_secs(2, 4),
            back_navigation: Pacing::between_secs(2, 3),
            download_settle: Pacing::between_secs(3, 5),
            download_retry: Pacing::fixed_secs(5),
            verification_settle: Pacing::fixed_secs(2),
            verification_followup: Pacing::fixed_secs(5),
        }
    }
}

impl PacingConfig {
    /// No delays at all. Used by tests and dry runs.
    pub fn none() -> Self {
        Self {
            page_load: Pacing::NONE,
            back_navigation: Pacing::NONE,
            download_settle: Pacing::NONE,
            download_retry: Pacing::NONE,
            verification_settle: Pacing::NONE,
            verification_followup: Pacing::NONE,
        }
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window. Manual verification needs a visible one.
    pub headless: bool,
    /// Explicit Chrome/Chromium binary
    pub chrome_executable: Option<PathBuf>,
    /// Profile directory; a temporary one per session when unset
    pub user_data_dir: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root holding one directory per author identifier
    pub download_root: PathBuf,
    /// Scholar home page driven by the profile search
    pub scholar_url: String,
    /// Maximum number of articles that may contribute a link
    pub max_articles: usize,
    /// Attempts to locate the profile link
    pub profile_attempts: u32,
    /// Attempts per download link
    pub download_attempts: u32,
    /// Wait for the verification element during profile search
    pub profile_verification_timeout_ms: u64,
    /// Wait for manual verification after the last download attempt
    pub manual_verification_timeout_ms: u64,
    pub download_detection: DownloadDetection,
    pub pacing: PacingConfig,
    pub browser: BrowserSettings,
    pub extractor: ExtractorKind,
    pub tika_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from(DEFAULT_DOWNLOAD_ROOT),
            scholar_url: DEFAULT_SCHOLAR_URL.to_string(),
            max_articles: 10,
            profile_attempts: 5,
            download_attempts: 5,
            profile_verification_timeout_ms: 1_000,
            manual_verification_timeout_ms: 120_000,
            download_detection: DownloadDetection::Any,
            pacing: PacingConfig::default(),
            browser: BrowserSettings::default(),
            extractor: ExtractorKind::Pdf,
            tika_url: DEFAULT_TIKA_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, or from `~/.scholarmail.json`
    /// when present, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => dirs::home_dir()
                .map(|home| home.join(CONFIG_FILE_NAME))
                .filter(|p| p.exists()),
        };

        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    ScholarMailError::Config(format!("Cannot read {:?}: {}", path, e))
                })?;
                let config: Config = serde_json::from_str(&content)?;
                info!(path = ?path, "Loaded configuration");
                config
            }
            None => {
                debug!("No config file, using defaults");
                Config::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipelines cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.scholar_home()?;
        Url::parse(&self.tika_url)
            .map_err(|e| ScholarMailError::Config(format!("Invalid Tika URL '{}': {}", self.tika_url, e)))?;
        if self.profile_attempts == 0 || self.download_attempts == 0 {
            return Err(ScholarMailError::Config(
                "attempt counts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed Scholar home URL
    pub fn scholar_home(&self) -> Result<Url> {
        Url::parse(&self.scholar_url).map_err(|e| {
            ScholarMailError::Config(format!("Invalid Scholar URL '{}': {}", self.scholar_url, e))
        })
    }

    /// Directory holding one author's documents
    pub fn author_dir(&self, identifier: &str) -> PathBuf {
        self.download_root.join(identifier)
    }

    /// Profile-link lookup retries; no delay between attempts beyond the
    /// verification wait itself.
    pub fn profile_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.profile_attempts, Pacing::NONE)
    }

    /// Per-link download retries
    pub fn download_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.download_attempts, self.pacing.download_retry)
    }

    pub fn profile_verification_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_verification_timeout_ms)
    }

    pub fn manual_verification_timeout(&self) -> Duration {
        Duration::from_millis(self.manual_verification_timeout_ms)
    }

    /// Configuration with every pause removed, rooted at `download_root`.
    pub fn unpaced(download_root: impl Into<PathBuf>) -> Self {
        Self {
            download_root: download_root.into(),
            pacing: PacingConfig::none(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_articles, 10);
        assert_eq!(config.profile_attempts, 5);
        assert_eq!(config.download_attempts, 5);
        assert_eq!(config.download_detection, DownloadDetection::Any);
        assert_eq!(config.author_dir("123"), PathBuf::from("./pdfs").join("123"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"download_root": "/data/pdfs", "download_detection": "new", "pacing": {{"page_load": {{"min_ms": 10, "max_ms": 20}}}}}}"#
        )?;

        let config = Config::load(Some(file.path()))?;
        assert_eq!(config.download_root, PathBuf::from("/data/pdfs"));
        assert_eq!(config.download_detection, DownloadDetection::New);
        assert_eq!(config.pacing.page_load, Pacing { min_ms: 10, max_ms: 20 });
        // Untouched sections keep their defaults
        assert_eq!(config.pacing.download_retry, Pacing::fixed_secs(5));
        assert_eq!(config.max_articles, 10);
        Ok(())
    }

    #[test]
    fn test_invalid_scholar_url() {
        let config = Config {
            scholar_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ScholarMailError::Config(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = Config {
            download_attempts: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
