//! Reading ECMA-335 metadata out of managed components.
//!
//! The physical layer ([`root`], [`streams`], [`tables`], [`cor20header`]) parses the metadata
//! root, its heaps and the `#~` table stream of a PE image or bare metadata blob. On top of
//! it sit the decoders for [`signatures`], [`customattributes`] and serialized [`typename`]s,
//! and the [`model`], a lazily decoded object graph of one module. [`docid`] turns model
//! entities into documentation ids, the keys every other part of the crate uses for APIs.
//!
//! # Examples
//!
//! ```rust,no_run
//! use apiscope::metadata::{
//!     docid,
//!     model::{MetadataFile, NamedType},
//! };
//! use std::path::Path;
//!
//! let file = MetadataFile::open(Path::new("System.Runtime.dll"))?;
//! let module = file.manifest_module();
//! for definition in module.types() {
//!     if let Some(id) = docid::type_id(&NamedType::Definition(definition)) {
//!         println!("{}", id);
//!     }
//! }
//! # Ok::<(), apiscope::Error>(())
//! ```

/// The CLI header of PE images
pub mod cor20header;
/// Custom attribute value decoding
pub mod customattributes;
/// Documentation ids of types and members
pub mod docid;
/// Method bodies and IL operand scanning
pub mod method;
/// The object graph over a module's metadata
pub mod model;
/// The metadata root and stream directory
pub mod root;
/// Method, field, property and type signatures
pub mod signatures;
/// Metadata heaps and the table stream header
pub mod streams;
/// Metadata table schema and rows
pub mod tables;
/// Metadata tokens
pub mod token;
/// Serialized type names
pub mod typename;
