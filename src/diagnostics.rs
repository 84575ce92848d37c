//! Non-fatal problems found while building a catalog.
//!
//! Index documents produced from thousands of assemblies are rarely perfectly consistent: an
//! API may name a parent that no document defined, an assembly may be declared twice, a
//! framework may list an assembly that was never indexed. The lenient builder drops the
//! offending entity and records a [`Diagnostic`] instead of failing the whole run.
//!
//! [`Diagnostics`] is an append-only container backed by `boxcar::Vec`, so it can be shared
//! through an `Arc` and written to from several threads without locking.
//!
//! # Examples
//!
//! ```rust
//! use apiscope::diagnostics::{DiagnosticCategory, Diagnostics};
//! use std::sync::Arc;
//!
//! let diagnostics = Arc::new(Diagnostics::new());
//! diagnostics.error(DiagnosticCategory::Api, "API with unknown parent dropped");
//! diagnostics.info(DiagnosticCategory::Usage, "usage for unknown API skipped");
//!
//! assert!(diagnostics.has_errors());
//! assert_eq!(diagnostics.count(), 2);
//! for entry in diagnostics.iter() {
//!     println!("{}", entry);
//! }
//! ```

use std::fmt;

use strum::Display;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum DiagnosticSeverity {
    /// Expected gaps in the input, such as usage data for APIs that aren't cataloged
    #[strum(to_string = "INFO")]
    Info,
    /// Suspicious input that was still used
    #[strum(to_string = "WARN")]
    Warning,
    /// Inconsistent input that was dropped
    #[strum(to_string = "ERROR")]
    Error,
}

/// The kind of entity a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DiagnosticCategory {
    /// API definitions
    Api,
    /// Assembly documents
    Assembly,
    /// Declaration syntax
    Declaration,
    /// Obsoletion, platform, preview and experimental annotations
    Annotation,
    /// Extension method records
    Extension,
    /// Framework documents
    Framework,
    /// Package documents
    Package,
    /// Usage data
    Usage,
    /// Metadata read from binary components
    Metadata,
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: DiagnosticSeverity,
    /// What the diagnostic is about
    pub category: DiagnosticCategory,
    /// Human readable description
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)
    }
}

/// Thread-safe, append-only collection of [`Diagnostic`]s.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational diagnostic.
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Record a warning.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            category,
            message,
        ));
    }

    /// Record an error.
    pub fn error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            category,
            message,
        ));
    }

    /// Record `diagnostic`.
    pub fn push(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            DiagnosticSeverity::Info => tracing::info!("{}", diagnostic),
            DiagnosticSeverity::Warning => tracing::warn!("{}", diagnostic),
            DiagnosticSeverity::Error => tracing::error!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    /// Number of recorded diagnostics.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Returns `true` if any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.iter()
            .any(|entry| entry.severity == DiagnosticSeverity::Error)
    }

    /// Number of recorded errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.iter()
            .filter(|entry| entry.severity == DiagnosticSeverity::Error)
            .count()
    }

    /// Recorded diagnostics, in order of recording.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Recorded diagnostics of `category`.
    pub fn by_category(&self, category: DiagnosticCategory) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(move |entry| entry.category == category)
    }

    /// Human readable summary, one diagnostic per line.
    #[must_use]
    pub fn summary(&self) -> String {
        self.iter().map(|entry| format!("{}\n", entry)).collect()
    }
}
