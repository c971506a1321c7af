//! Document text extraction and email lexing.
//!
//! Text extraction sits behind [`TextExtractor`] so that the email pass can
//! run over any backend (in-process PDF parsing or an Apache Tika server).

use crate::config::{Config, ExtractorKind};
use crate::error::{Result, ScholarMailError};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Email lexical pattern (ASCII, case-sensitive)
const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";

/// Turns a document on disk into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> Result<String>;
}

/// In-process PDF text extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let owned = path.to_path_buf();
        let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned)).await;
        match joined {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ScholarMailError::Extraction {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
            Err(e) => Err(ScholarMailError::Extraction {
                path: path.to_path_buf(),
                reason: format!("extraction task failed: {}", e),
            }),
        }
    }
}

/// Apache Tika server client (`PUT /tika`, plain-text response).
pub struct TikaExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl TikaExtractor {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ScholarMailError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/tika", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TextExtractor for TikaExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let response = self
            .client
            .put(&self.endpoint)
            .header("Accept", "text/plain")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScholarMailError::Extraction {
                path: path.to_path_buf(),
                reason: format!("Tika returned HTTP {}", status),
            });
        }
        Ok(response.text().await?)
    }
}

/// Build the extractor selected in the configuration.
pub fn extractor_from_config(config: &Config) -> Result<Box<dyn TextExtractor>> {
    match config.extractor {
        ExtractorKind::Pdf => Ok(Box::new(PdfTextExtractor)),
        ExtractorKind::Tika => Ok(Box::new(TikaExtractor::new(&config.tika_url)?)),
    }
}

/// Compiled email pattern.
pub struct EmailMatcher {
    pattern: Regex,
}

impl EmailMatcher {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(EMAIL_PATTERN).map_err(|e| ScholarMailError::Parse(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// Every match in order of appearance, duplicates and case kept.
    pub fn find_all(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Email-like substrings of `text`, in order of appearance.
pub fn extract_emails(text: &str) -> Result<Vec<String>> {
    Ok(EmailMatcher::new()?.find_all(text))
}

/// A document skipped because extraction failed.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Emails found across one author's documents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub identifier: String,
    pub documents_scanned: usize,
    /// All matches, document by document, duplicates retained
    pub emails: Vec<String>,
    pub failures: Vec<DocumentFailure>,
}

/// `*.pdf` regular files (suffix case-insensitive) directly inside `dir`,
/// sorted by file name.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_pdf = entry
            .file_name()
            .to_string_lossy()
            .to_lowercase()
            .ends_with(".pdf");
        if is_pdf && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Extract every email from the documents under `<root>/<identifier>`.
///
/// A document that fails extraction is skipped and recorded in
/// [`ExtractionReport::failures`].
///
/// # Errors
///
/// Fails if the identifier's directory cannot be listed.
pub async fn collect_emails(
    root: &Path,
    identifier: &str,
    extractor: &dyn TextExtractor,
) -> Result<ExtractionReport> {
    let dir = root.join(identifier);
    let documents = list_documents(&dir)?;
    let matcher = EmailMatcher::new()?;

    info!(identifier, documents = documents.len(), "Extracting emails");

    let mut report = ExtractionReport {
        identifier: identifier.to_string(),
        ..ExtractionReport::default()
    };

    for path in documents {
        report.documents_scanned += 1;
        match extractor.extract_text(&path).await {
            Ok(text) => {
                let found = matcher.find_all(&text);
                debug!(path = ?path, emails = found.len(), "Document processed");
                report.emails.extend(found);
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Text extraction failed, skipping document");
                report.failures.push(DocumentFailure {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    if !report.failures.is_empty() {
        warn!(
            identifier,
            failed = report.failures.len(),
            scanned = report.documents_scanned,
            "Some documents could not be read"
        );
    }
    Ok(report)
}
