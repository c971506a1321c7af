//! Author table loading.
//!
//! The input is a CSV file with a header row. Columns are read by position:
//! column 0 is the identifier, column 1 the display name; anything after is
//! ignored.

use crate::error::Result;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One researcher to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRecord {
    /// Stable key naming the author's output directory
    pub identifier: String,
    /// Name typed into the Scholar search box
    pub researcher_name: String,
}

impl AuthorRecord {
    pub fn new(identifier: &str, researcher_name: &str) -> Self {
        Self {
            identifier: identifier.trim().to_string(),
            researcher_name: researcher_name.trim().to_string(),
        }
    }
}

/// Whether `identifier` names exactly one directory under the download root.
pub fn is_safe_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains(['/', '\\'])
}

/// Load author records from a CSV file.
pub fn load_authors(path: &Path) -> Result<Vec<AuthorRecord>> {
    let file = std::fs::File::open(path)?;
    let records = read_authors(file)?;
    info!(path = ?path, count = records.len(), "Loaded author table");
    Ok(records)
}

/// Read author records from any CSV source.
///
/// Rows with fewer than two columns, a blank identifier/name, or an
/// identifier that would escape the download root are skipped.
pub fn read_authors<R: Read>(reader: R) -> Result<Vec<AuthorRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let (Some(identifier), Some(name)) = (record.get(0), record.get(1)) else {
            warn!(row = row + 1, "Skipping row with fewer than two columns");
            continue;
        };
        let author = AuthorRecord::new(identifier, name);
        if author.identifier.is_empty() || author.researcher_name.is_empty() {
            warn!(row = row + 1, "Skipping row with blank identifier or name");
            continue;
        }
        if !is_safe_identifier(&author.identifier) {
            warn!(row = row + 1, identifier = %author.identifier, "Skipping row with unsafe identifier");
            continue;
        }
        records.push(author);
    }
    Ok(records)
}
