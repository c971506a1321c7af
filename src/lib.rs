//! # scholarmail
//!
//! Google Scholar document acquisition and author email mining.
//!
//! ## Modules
//!
//! - [`browser`] - Browser boundary and the Chromium driver
//! - [`profile`] - Author profile search
//! - [`articles`] - Article enumeration and document link collection
//! - [`download`] - Per-link download sessions with retry
//! - [`acquisition`] - Per-author acquisition loop
//! - [`extract`] - Document text extraction and email lexing
//! - [`stats`] - Email frequency ranking
//! - [`similarity`] - TF-IDF name/email similarity
//! - [`pipeline`] - Extraction & ranking reports
//! - [`server`] - HTTP interface
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholarmail::{config::Config, extract::PdfTextExtractor, pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let report = pipeline::build_report(
//!         &config.download_root,
//!         "57190000000",
//!         "Alahyane M",
//!         &PdfTextExtractor,
//!     )
//!     .await?;
//!     println!("Closest: {:?}", report.closest.map(|c| c.email));
//!     Ok(())
//! }
//! ```

pub mod acquisition;
pub mod articles;
pub mod authors;
pub mod browser;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod profile;
pub mod retry;
pub mod server;
pub mod similarity;
pub mod stats;
pub mod verification;

pub use error::{Result, ScholarMailError};
