//! The API catalog: building, writing and reading.
//!
//! A catalog records the APIs of many assemblies across frameworks and packages, with the
//! declaration syntax of every API in every assembly, their obsoletion, platform support,
//! preview and experimental annotations, and how much they are used.
//!
//! The pipeline has three stages:
//!
//! 1. [`CatalogBuilder`] ingests XML index documents into an [`IntermediateCatalog`],
//!    dropping inconsistent entries (or failing, with [`BuilderConfig::strict`]).
//! 2. [`CatalogWriter`] serializes the graph into heaps and fixed-width tables behind a
//!    small header, with a brotli compressed body.
//! 3. [`ApiCatalog`] loads such a file and answers queries through handle-addressed views.
//!
//! # Examples
//!
//! ```rust
//! use apiscope::catalog::{ApiCatalog, CatalogBuilder, CatalogWriter};
//!
//! let mut builder = CatalogBuilder::new();
//! builder.index_str(
//!     r#"<assembly fingerprint="11111111-1111-1111-1111-111111111111" name="Lib" version="1.0.0.0">
//!          <api fingerprint="22222222-2222-2222-2222-222222222222" kind="Namespace" name="Lib" />
//!          <api fingerprint="33333333-3333-3333-3333-333333333333" kind="Class"
//!               parent="22222222-2222-2222-2222-222222222222" name="Widget" />
//!          <syntax id="33333333-3333-3333-3333-333333333333"><k>public</k> <k>class</k> Widget</syntax>
//!        </assembly>"#,
//! )?;
//!
//! let bytes = CatalogWriter::to_bytes(&builder.build()?)?;
//! let catalog = ApiCatalog::from_bytes(&bytes)?;
//!
//! let namespace = catalog.root_apis()?[0];
//! let widget = namespace.children()?[0];
//! assert_eq!(widget.declarations()?[0].text()?, "public class Widget");
//! # Ok::<(), apiscope::Error>(())
//! ```

mod builder;
mod format;
mod intermediate;
mod reader;
mod writer;

pub use builder::{BuilderConfig, CatalogBuilder};
pub use format::{ApiKind, CatalogTable, SyntaxTokenKind, CATALOG_MAGIC, FORMAT_VERSION};
pub use intermediate::{
    IntermediateAnnotations, IntermediateApi, IntermediateAssembly, IntermediateCatalog,
    IntermediateDeclaration, IntermediateExperimental, IntermediateExtension,
    IntermediateFramework, IntermediateFrameworkAssembly, IntermediateObsoletion,
    IntermediatePackage, IntermediatePlatformSupport, IntermediatePreviewRequirement,
    IntermediateSyntaxToken, IntermediateUsageSource,
};
pub use reader::{
    ApiCatalog, ApiView, AssemblyView, CatalogStatistics, DeclarationView, Experimental,
    ExtensionMethodView, FrameworkAssembly, FrameworkView, Obsoletion, PackageView,
    PlatformSupport, PlatformView, PreviewRequirement, SyntaxToken, UsageSourceView,
};
pub use writer::CatalogWriter;
