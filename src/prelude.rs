//! # apiscope Prelude
//!
//! Re-exports the types most programs need: the metadata object model, the usage crawler
//! and the catalog pipeline. Import it with `use apiscope::prelude::*;`.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all apiscope operations
pub use crate::Error;

/// The result type used throughout apiscope
pub use crate::Result;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// The object model of one component
pub use crate::metadata::model::{
    Accessibility, AssemblyReference, CustomAttribute, EventDefinition, FieldDefinition,
    MemberReference, MetadataFile, MetadataModule, MetadataType, MethodDefinition,
    MethodSpecification, NamedType, Namespace, PropertyDefinition, TypeDefinition, TypeKind,
    TypeReference,
};

/// Documentation ids
pub use crate::metadata::docid;

/// Custom attribute values
pub use crate::metadata::customattributes::{CustomAttributeArgument, CustomAttributeValue};

// ================================================================================================
// Usage
// ================================================================================================

/// Reference crawling and aggregation
pub use crate::usage::{
    crawl_files, fingerprint_of, CrawlSummary, Crawler, CrawlerResults, UsageAggregator,
};

// ================================================================================================
// Catalog
// ================================================================================================

/// Building and writing catalogs
pub use crate::catalog::{BuilderConfig, CatalogBuilder, CatalogWriter, IntermediateCatalog};

/// Reading catalogs
pub use crate::catalog::{
    ApiCatalog, ApiKind, ApiView, AssemblyView, CatalogStatistics, DeclarationView,
    FrameworkView, PackageView, PlatformView, SyntaxTokenKind, UsageSourceView,
};

/// Problems found while building a catalog
pub use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};
