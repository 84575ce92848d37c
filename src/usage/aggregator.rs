use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use dashmap::DashMap;

use crate::usage::{fingerprint_of, CrawlerResults};

/// Turns per-file crawl results into usage fractions.
///
/// The usage of an API is the share of crawled files that reference it at least once, so a
/// file calling `Console.WriteLine` a hundred times counts the same as a file calling it once.
/// Results can be added from several threads.
#[derive(Debug, Default)]
pub struct UsageAggregator {
    referencing: DashMap<String, u32>,
    files: AtomicUsize,
}

impl UsageAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for the results of one file.
    pub fn add(&self, results: &CrawlerResults) {
        for (id, _) in results.iter() {
            *self.referencing.entry(id.to_string()).or_insert(0) += 1;
        }
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of files added.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.load(Ordering::Relaxed)
    }

    /// Number of files referencing `id`.
    #[must_use]
    pub fn file_count_of(&self, id: &str) -> u32 {
        self.referencing.get(id).map_or(0, |count| *count)
    }

    /// Share of files referencing `id`, `None` before any file was added.
    #[must_use]
    pub fn usage(&self, id: &str) -> Option<f32> {
        let files = self.file_count();
        if files == 0 {
            return None;
        }
        Some(self.file_count_of(id) as f32 / files as f32)
    }

    /// Usage fractions of every referenced API, keyed by the fingerprint of its documentation
    /// id.
    #[must_use]
    pub fn fractions(&self) -> HashMap<uguid::Guid, f32> {
        let files = self.file_count();
        if files == 0 {
            return HashMap::new();
        }

        self.referencing
            .iter()
            .map(|entry| (fingerprint_of(entry.key()), *entry.value() as f32 / files as f32))
            .collect()
    }
}
