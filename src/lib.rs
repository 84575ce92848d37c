// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # apiscope
//!
//! Catalogs the public API surface of a large corpus of .NET assemblies into one compact,
//! randomly accessible file, and measures how much of that surface is actually used.
//!
//! The crate has two halves:
//!
//! - A **metadata reader** that decodes types, members, signatures, custom attributes and IL
//!   operand tokens straight from the ECMA-335 tables of a component, without executing code
//!   and without resolving references across files. The [`usage`] crawler builds on it to
//!   count which external APIs a component references.
//! - A **catalog format**: XML index documents produced per assembly, framework and package
//!   are merged into a deduplicated intermediate graph, written as heaps and fixed-width
//!   tables behind a brotli compressed body, and read back through cheap views.
//!
//! ## Features
//!
//! - **Memory mapped input** - components and catalogs are read in place
//! - **Lazy object model** - relation indexes are built on first use and cached per module
//! - **Best-effort builds** - inconsistent index documents are logged to [`diagnostics`] and
//!   skipped, or rejected in strict mode
//! - **Parallel crawling** - many components are crawled at once with `rayon`
//!
//! ## Quick Start
//!
//! ### Reading metadata
//!
//! ```rust,no_run
//! use apiscope::prelude::*;
//! use std::path::Path;
//!
//! let file = MetadataFile::open(Path::new("System.Runtime.dll"))?;
//! println!("{} ({} modules)", file.name(), file.modules().count());
//! # Ok::<(), apiscope::Error>(())
//! ```
//!
//! ### Crawling usage
//!
//! ```rust,no_run
//! use apiscope::prelude::*;
//! use std::path::Path;
//!
//! let file = MetadataFile::open(Path::new("App.dll"))?;
//! let results = Crawler::crawl(&file);
//! for (id, count) in results.iter() {
//!     println!("{:>6} {}", count, id);
//! }
//! # Ok::<(), apiscope::Error>(())
//! ```
//!
//! ### Building and querying a catalog
//!
//! ```rust,no_run
//! use apiscope::prelude::*;
//! use std::path::Path;
//!
//! let mut builder = CatalogBuilder::new();
//! builder.index_file(Path::new("index/System.Runtime.xml"))?;
//! builder.index_file(Path::new("index/net9.0.xml"))?;
//! for diagnostic in builder.diagnostics().iter() {
//!     eprintln!("{}", diagnostic);
//! }
//!
//! CatalogWriter::write_file(&builder.build()?, Path::new("apicatalog.dat"))?;
//!
//! let catalog = ApiCatalog::open(Path::new("apicatalog.dat"))?;
//! println!("{}", catalog.statistics());
//! # Ok::<(), apiscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`metadata`] - ECMA-335 physical layer, decoders and the object model
//! - [`usage`] - Reference crawling and usage aggregation
//! - [`catalog`] - Catalog builder, writer and reader
//! - [`diagnostics`] - Non-fatal problems found while building a catalog
//! - [`Error`] and [`Result`] - Error handling

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use apiscope::prelude::*;
///
/// let catalog = ApiCatalog::open("apicatalog.dat".as_ref())?;
/// println!("{} APIs", catalog.statistics().apis);
/// # Ok::<(), apiscope::Error>(())
/// ```
pub mod prelude;

/// The API catalog.
///
/// See the module documentation for the build, write and read pipeline.
pub mod catalog;

/// Non-fatal problems found while building a catalog.
pub mod diagnostics;

/// Metadata reading based on ECMA-335.
///
/// This module reads components at three levels:
///
/// - **Physical**: the metadata root, heaps and the `#~` table stream
/// - **Decoders**: signatures, custom attribute values and serialized type names
/// - **Model**: a lazily built object graph of one component, with documentation ids
///
/// # Example
///
/// ```rust,no_run
/// use apiscope::metadata::model::MetadataFile;
/// use std::path::Path;
///
/// let file = MetadataFile::open(Path::new("System.Runtime.dll"))?;
/// for definition in file.manifest_module().types() {
///     println!("{}.{}", definition.namespace()?, definition.name()?);
/// }
/// # Ok::<(), apiscope::Error>(())
/// ```
pub mod metadata;

/// How much the cataloged APIs are used.
pub mod usage;

/// `apiscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust,no_run
/// use apiscope::{catalog::ApiCatalog, Result};
///
/// fn load(path: &str) -> Result<ApiCatalog> {
///     ApiCatalog::open(std::path::Path::new(path))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `apiscope` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust,no_run
/// use apiscope::{catalog::ApiCatalog, Error};
///
/// match ApiCatalog::open(std::path::Path::new("apicatalog.dat")) {
///     Ok(catalog) => println!("{} APIs", catalog.statistics().apis),
///     Err(Error::NotSupported) => println!("Catalog version not supported"),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Low-level file and memory parsing utilities.
///
/// [`File`] owns the bytes of a component, [`Parser`] is the bounds checked cursor every
/// decoder reads through.
///
/// # Example
///
/// ```rust
/// use apiscope::Parser;
///
/// let data = [0x81, 0x00, 0x2A];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_compressed_uint()?, 0x100);
/// assert_eq!(parser.read_le::<u8>()?, 0x2A);
/// # Ok::<(), apiscope::Error>(())
/// ```
pub use file::{parser::Parser, File};
