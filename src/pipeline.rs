//! Extraction & ranking pipeline.
//!
//! Combines document text extraction, frequency statistics and similarity
//! ranking into one [`EmailReport`] per author, and writes reports to disk.

use crate::acquisition::RunSummary;
use crate::authors::AuthorRecord;
use crate::error::{Result, ScholarMailError};
use crate::extract::{collect_emails, DocumentFailure, ExtractionReport, TextExtractor};
use crate::similarity::{find_closest_email, ClosestEmail};
use crate::stats::{email_statistics, EmailCount};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Everything learned about one author's emails.
#[derive(Debug, Clone, Serialize)]
pub struct EmailReport {
    pub identifier: String,
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub documents_scanned: usize,
    pub most_frequent: Option<EmailCount>,
    pub ranked: Vec<EmailCount>,
    /// `None` when no email was found
    pub closest: Option<ClosestEmail>,
    pub failures: Vec<DocumentFailure>,
    /// Flat extraction order the similarity vector refers to
    #[serde(skip)]
    pub emails: Vec<String>,
}

/// One CSV row: a distinct email with its count and similarity.
#[derive(Debug, Serialize)]
struct EmailRow<'a> {
    identifier: &'a str,
    email: &'a str,
    count: usize,
    similarity: f64,
    closest: bool,
}

/// Build the report for one author from documents on disk.
///
/// An author whose documents contain no email gets a report with empty
/// rankings rather than an error.
pub async fn build_report(
    root: &Path,
    identifier: &str,
    name: &str,
    extractor: &dyn TextExtractor,
) -> Result<EmailReport> {
    let extraction = collect_emails(root, identifier, extractor).await?;
    report_from_extraction(extraction, name)
}

/// Rank an extraction's emails against `name`.
pub fn report_from_extraction(extraction: ExtractionReport, name: &str) -> Result<EmailReport> {
    let identifier = extraction.identifier.as_str();
    let (most_frequent, ranked) = email_statistics(&extraction.emails);

    let closest = match find_closest_email(&extraction.emails, name) {
        Ok(closest) => Some(closest),
        Err(ScholarMailError::EmptyInput) => {
            info!(identifier, "No emails found in documents");
            None
        }
        Err(ScholarMailError::EmptyVocabulary) => {
            warn!(identifier, name, "Name and local-parts share no terms, similarity skipped");
            None
        }
        Err(e) => return Err(e),
    };

    if let Some(c) = &closest {
        info!(identifier, email = %c.email, score = c.score, "Closest email");
    }

    Ok(EmailReport {
        identifier: extraction.identifier.clone(),
        name: name.to_string(),
        generated_at: Utc::now(),
        documents_scanned: extraction.documents_scanned,
        most_frequent,
        ranked,
        closest,
        failures: extraction.failures,
        emails: extraction.emails,
    })
}

impl EmailReport {
    /// Similarity of a distinct email, taken from its first occurrence.
    pub fn similarity_of(&self, email: &str) -> f64 {
        let Some(closest) = &self.closest else {
            return 0.0;
        };
        self.emails
            .iter()
            .position(|e| e == email)
            .and_then(|i| closest.similarities.get(i).copied())
            .unwrap_or(0.0)
    }
}

/// Write `<output>/<identifier>_emails.csv` (and `.json` when asked).
pub fn save_report(
    output_dir: &Path,
    report: &EmailReport,
    with_json: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    let csv_path = output_dir.join(format!("{}_emails.csv", report.identifier));
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(&csv_path)?;
    let closest_email = report.closest.as_ref().map(|c| c.email.as_str());
    for entry in &report.ranked {
        wtr.serialize(EmailRow {
            identifier: &report.identifier,
            email: &entry.email,
            count: entry.count,
            similarity: report.similarity_of(&entry.email),
            closest: closest_email == Some(entry.email.as_str()),
        })?;
    }
    wtr.flush()?;
    info!(path = ?csv_path, rows = report.ranked.len(), "Saved email ranking");
    written.push(csv_path);

    if with_json {
        let json_path = output_dir.join(format!("{}_emails.json", report.identifier));
        std::fs::write(&json_path, serde_json::to_string_pretty(report)?)?;
        info!(path = ?json_path, "Saved email report");
        written.push(json_path);
    }

    Ok(written)
}

/// Build and optionally save reports for every author with documents on disk.
///
/// Authors without a directory are skipped; any other failure is logged and
/// the loop moves on.
pub async fn run_extraction(
    root: &Path,
    authors: &[AuthorRecord],
    extractor: &dyn TextExtractor,
    output_dir: Option<&Path>,
    with_json: bool,
) -> (RunSummary, Vec<EmailReport>) {
    let mut summary = RunSummary::default();
    let mut reports = Vec::new();

    for author in authors {
        if !root.join(&author.identifier).is_dir() {
            info!(identifier = %author.identifier, "No documents directory, skipping");
            summary.skipped += 1;
            continue;
        }

        let result = async {
            let report = build_report(root, &author.identifier, &author.researcher_name, extractor).await?;
            if let Some(dir) = output_dir {
                save_report(dir, &report, with_json)?;
            }
            Ok::<_, ScholarMailError>(report)
        }
        .await;

        match result {
            Ok(report) => {
                summary.processed += 1;
                reports.push(report);
            }
            Err(e) => {
                error!(identifier = %author.identifier, error = %e, "Email extraction failed for author");
                summary.failed += 1;
            }
        }
    }

    info!(
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        "Extraction run complete"
    );
    (summary, reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::canned;
    use tempfile::TempDir;

    fn author_dir(root: &Path, identifier: &str, files: &[&str]) -> Result<()> {
        let dir = root.join(identifier);
        std::fs::create_dir_all(&dir)?;
        for name in files {
            std::fs::write(dir.join(name), b"%PDF")?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_report_ranks_and_matches() -> Result<()> {
        let root = TempDir::new()?;
        author_dir(root.path(), "57190000000", &["a.pdf", "b.pdf"])?;
        let extractor = canned(&[
            ("a.pdf", "Corresponding author: alahyane.m@univ.fr, editor foo@bar.com"),
            ("b.pdf", "foo@bar.com foo@bar.com"),
        ]);

        let report = build_report(root.path(), "57190000000", "Alahyane M", &extractor).await?;

        assert_eq!(report.documents_scanned, 2);
        assert_eq!(
            report.most_frequent,
            Some(EmailCount { email: "foo@bar.com".to_string(), count: 3 })
        );
        let closest = report.closest.as_ref().expect("closest email");
        assert_eq!(closest.email, "alahyane.m@univ.fr");
        assert_eq!(closest.similarities.len(), 4);
        assert!(report.similarity_of("alahyane.m@univ.fr") > report.similarity_of("foo@bar.com"));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_emails_gives_empty_report() -> Result<()> {
        let root = TempDir::new()?;
        author_dir(root.path(), "1", &["a.pdf"])?;
        let extractor = canned(&[("a.pdf", "no contact details at all")]);

        let report = build_report(root.path(), "1", "Jane Doe", &extractor).await?;
        assert!(report.most_frequent.is_none());
        assert!(report.ranked.is_empty());
        assert!(report.closest.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_report_writes_csv_and_json() -> Result<()> {
        let root = TempDir::new()?;
        let out = TempDir::new()?;
        author_dir(root.path(), "7", &["a.pdf"])?;
        let extractor = canned(&[("a.pdf", "jane.doe@x.org office@x.org jane.doe@x.org")]);

        let report = build_report(root.path(), "7", "Jane Doe", &extractor).await?;
        let written = save_report(out.path(), &report, true)?;
        assert_eq!(written.len(), 2);

        let mut rdr = csv::Reader::from_path(&written[0])?;
        let rows: Vec<csv::StringRecord> = rdr.records().collect::<std::result::Result<_, _>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "jane.doe@x.org");
        assert_eq!(&rows[0][2], "2");
        assert_eq!(&rows[0][4], "true");
        assert_eq!(&rows[1][4], "false");

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&written[1])?)?;
        assert_eq!(json["closest"]["email"], "jane.doe@x.org");
        assert!(json.get("emails").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_isolates_and_skips() -> Result<()> {
        let root = TempDir::new()?;
        author_dir(root.path(), "ok", &["a.pdf"])?;
        std::fs::create_dir(root.path().join("broken-dir"))?;
        std::fs::write(root.path().join("broken-dir").join("x.pdf"), b"")?;
        let extractor = canned(&[("a.pdf", "jane@x.org")]);

        let authors = vec![
            AuthorRecord::new("missing", "Nobody"),
            AuthorRecord::new("ok", "Jane"),
            AuthorRecord::new("broken-dir", "Unreadable"),
        ];
        let (summary, reports) = run_extraction(root.path(), &authors, &extractor, None, false).await;

        assert_eq!(summary, RunSummary { processed: 2, skipped: 1, failed: 0 });
        assert_eq!(reports[0].identifier, "ok");
        // Extraction failures are reported, not fatal
        assert_eq!(reports[1].failures.len(), 1);
        Ok(())
    }
}
