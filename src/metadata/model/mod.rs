//! A read-only, lazily materialized object graph over the metadata of a file.
//!
//! [`MetadataFile`] owns the bytes of one component and the [`MetadataModule`]s parsed from
//! them. Everything else in this module is a small `Copy` view holding a reference to its
//! module and a row id: type and member definitions, references, custom attributes, generic
//! parameters and namespaces. Views decode their row when asked, so walking a large assembly
//! only costs what is actually visited. Whole-table relations (nested types, attributes of
//! an entity, interfaces, generic parameters, property and event accessors) are indexed
//! once per module on first use.
//!
//! Signatures decode into [`MetadataType`] trees. Named types stay what the metadata says
//! they are: a [`TypeDefinition`] of this module or a [`TypeReference`] by name. References
//! are never resolved into other files.
//!
//! # Examples
//!
//! ```rust,no_run
//! use apiscope::metadata::model::MetadataFile;
//! use std::path::Path;
//!
//! let file = MetadataFile::open(Path::new("System.Runtime.dll"))?;
//! for module in file.modules() {
//!     for definition in module.types() {
//!         println!("{}.{}", definition.namespace()?, definition.name()?);
//!     }
//! }
//! # Ok::<(), apiscope::Error>(())
//! ```

/// Generates a `Copy` view over one row of a metadata table.
macro_rules! metadata_view {
    ($(#[$meta:meta])* $name:ident($table:ident, $raw:ident)) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name<'a> {
            module: &'a crate::metadata::model::MetadataModule<'a>,
            rid: u32,
        }

        impl<'a> $name<'a> {
            pub(crate) fn new(
                module: &'a crate::metadata::model::MetadataModule<'a>,
                rid: u32,
            ) -> $name<'a> {
                $name { module, rid }
            }

            /// The module this row belongs to.
            #[must_use]
            pub fn module(&self) -> &'a crate::metadata::model::MetadataModule<'a> {
                self.module
            }

            /// The 1-based row id.
            #[must_use]
            pub fn rid(&self) -> u32 {
                self.rid
            }

            /// The metadata token of the row.
            #[must_use]
            pub fn token(&self) -> crate::metadata::token::Token {
                crate::metadata::token::Token::from_parts(
                    crate::metadata::tables::TableId::$table,
                    self.rid,
                )
            }

            /// Decode the underlying row.
            ///
            /// # Errors
            /// Fails if the row is out of range or damaged.
            pub fn row(&self) -> crate::Result<crate::metadata::tables::$raw> {
                self.module
                    .tables()
                    .get::<crate::metadata::tables::$raw>(self.rid)
            }
        }

        impl PartialEq for $name<'_> {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(self.module, other.module) && self.rid == other.rid
            }
        }

        impl Eq for $name<'_> {}

        impl std::hash::Hash for $name<'_> {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.rid.hash(state);
            }
        }

        impl std::fmt::Debug for $name<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.token())
            }
        }
    };
}

mod attributes;
mod definitions;
mod file;
mod module;
mod namespaces;
mod provider;
mod references;
mod types;

pub use attributes::{AttributeConstructor, CustomAttribute};
pub use definitions::{
    Accessibility, EventDefinition, FieldAttributes, FieldDefinition, GenericParameter, Member,
    MethodAttributes, MethodDefinition, MethodSemanticsAttributes, Parameter,
    PropertyDefinition, TypeAttributes, TypeDefinition, TypeKind,
};
pub use file::MetadataFile;
pub use module::{MetadataModule, ModuleFile};
pub use namespaces::Namespace;
pub use provider::ModuleTypeProvider;
pub use references::{
    AssemblyReference, MemberReference, MemberReferenceKind, MemberReferenceParent,
    MethodReference, MethodSpecification, ResolutionScope, TypeReference,
};
pub use types::{
    arity_of, GenericContext, InstanceSegment, MetadataType, NamedType, TypeInstance,
};
