//! Measuring how much the APIs of a catalog are used.
//!
//! [`Crawler`] walks one component and counts the references it makes to types and members
//! defined elsewhere, keyed by documentation id. [`crawl_files`] does this for many files in
//! parallel, and [`UsageAggregator`] turns the per-file results into the usage fractions a
//! catalog stores: the share of crawled files that reference an API.
//!
//! Catalog APIs are identified by fingerprint rather than documentation id;
//! [`fingerprint_of`] derives one from the other.
//!
//! # Examples
//!
//! ```rust,no_run
//! use apiscope::usage::crawl_files;
//! use std::path::PathBuf;
//!
//! let paths = vec![PathBuf::from("App.dll"), PathBuf::from("Library.dll")];
//! let summary = crawl_files(&paths);
//! for (fingerprint, usage) in summary.aggregator.fractions() {
//!     println!("{}: {:.1}%", fingerprint, usage * 100.0);
//! }
//! ```

mod aggregator;
mod crawler;

pub use aggregator::UsageAggregator;
pub use crawler::{crawl_files, CrawlSummary, Crawler, CrawlerResults};

use md5::{Digest, Md5};

/// The fingerprint of the API with documentation id `doc_id`: the MD5 hash of its UTF-8
/// bytes, laid out as a GUID.
#[must_use]
pub fn fingerprint_of(doc_id: &str) -> uguid::Guid {
    let mut hasher = Md5::new();
    hasher.update(doc_id.as_bytes());

    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&hasher.finalize());
    uguid::Guid::from_bytes(bytes)
}
