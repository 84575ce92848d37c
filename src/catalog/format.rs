use strum::{Display, EnumCount, EnumIter, EnumString, FromRepr};

/// `ACAT`, read as a little-endian `u32`.
pub const CATALOG_MAGIC: u32 = 0x5441_4341;

/// Version of the binary layout written by [`crate::catalog::CatalogWriter`].
pub const FORMAT_VERSION: u32 = 1;

/// Size of the uncompressed header: magic, version, table count and the table lengths.
pub const HEADER_SIZE: usize = 12 + 4 * CatalogTable::COUNT;

/// Handle value of absent references, strings and empty lists.
pub const NIL: i32 = -1;

/// Heaps and tables of a catalog body, in the order they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, Display)]
pub enum CatalogTable {
    /// Length prefixed UTF-8 strings
    StringHeap,
    /// Count prefixed lists and syntax streams
    BlobHeap,
    /// Platform names
    Platform,
    /// Frameworks and their assemblies
    Framework,
    /// Packages and their assemblies
    Package,
    /// Assemblies
    Assembly,
    /// Sources of usage data
    UsageSource,
    /// APIs
    Api,
    /// APIs without a parent
    RootApi,
    /// Extension methods
    ExtensionMethod,
    /// Obsoletion annotations
    Obsoletion,
    /// Platform support annotations
    PlatformSupport,
    /// Preview requirement annotations
    PreviewRequirement,
    /// Experimental annotations
    Experimental,
}

impl CatalogTable {
    /// Fixed row size, `None` for the heaps.
    #[must_use]
    pub fn row_size(&self) -> Option<usize> {
        match self {
            CatalogTable::StringHeap | CatalogTable::BlobHeap => None,
            CatalogTable::Platform | CatalogTable::RootApi => Some(4),
            CatalogTable::Framework | CatalogTable::UsageSource => Some(8),
            CatalogTable::Package => Some(28),
            CatalogTable::Assembly => Some(40),
            CatalogTable::Api => Some(37),
            CatalogTable::ExtensionMethod => Some(24),
            CatalogTable::Obsoletion => Some(21),
            CatalogTable::PlatformSupport => Some(12),
            CatalogTable::PreviewRequirement | CatalogTable::Experimental => Some(16),
        }
    }
}

/// What an API is.
///
/// The textual form is the one used by index documents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumString, Display, FromRepr,
)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ApiKind {
    Namespace = 0,
    Interface = 1,
    Delegate = 2,
    Enum = 3,
    Struct = 4,
    Class = 5,
    Constant = 6,
    EnumItem = 7,
    Field = 8,
    Constructor = 9,
    Destructor = 10,
    Property = 11,
    PropertyGetter = 12,
    PropertySetter = 13,
    Method = 14,
    Operator = 15,
    Event = 16,
    EventAdder = 17,
    EventRemover = 18,
    EventRaiser = 19,
}

impl ApiKind {
    /// Returns `true` for types.
    #[must_use]
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            ApiKind::Interface
                | ApiKind::Delegate
                | ApiKind::Enum
                | ApiKind::Struct
                | ApiKind::Class
        )
    }

    /// Returns `true` for property and event accessors.
    #[must_use]
    pub fn is_accessor(&self) -> bool {
        matches!(
            self,
            ApiKind::PropertyGetter
                | ApiKind::PropertySetter
                | ApiKind::EventAdder
                | ApiKind::EventRemover
                | ApiKind::EventRaiser
        )
    }

    /// Returns `true` for members of types.
    #[must_use]
    pub fn is_member(&self) -> bool {
        !matches!(self, ApiKind::Namespace) && !self.is_type()
    }
}

/// The role of a piece of declaration syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, FromRepr)]
#[repr(u8)]
pub enum SyntaxTokenKind {
    /// Whitespace and other unmarked text
    Text = 0,
    /// A keyword, `k` in index documents
    Keyword = 1,
    /// Punctuation, `p`
    Punctuation = 2,
    /// A literal value, `l`
    Literal = 3,
    /// The name of a type parameter or an unlinked type, `t`
    TypeName = 4,
    /// A name linked to an API, `r`
    Reference = 5,
}

impl SyntaxTokenKind {
    /// The kind of an index document markup element.
    #[must_use]
    pub fn from_element(name: &[u8]) -> Option<SyntaxTokenKind> {
        match name {
            b"k" => Some(SyntaxTokenKind::Keyword),
            b"p" => Some(SyntaxTokenKind::Punctuation),
            b"l" => Some(SyntaxTokenKind::Literal),
            b"t" => Some(SyntaxTokenKind::TypeName),
            b"r" => Some(SyntaxTokenKind::Reference),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn row_sizes() {
        let rows: Vec<_> = CatalogTable::iter().filter_map(|t| t.row_size()).collect();
        assert_eq!(rows, [4, 8, 28, 40, 8, 37, 4, 24, 21, 12, 16, 16]);
        assert_eq!(HEADER_SIZE, 68);
    }

    #[test]
    fn api_kinds() {
        assert_eq!(ApiKind::from_str("PropertyGetter").unwrap(), ApiKind::PropertyGetter);
        assert!(ApiKind::from_str("Type").is_err());
        for kind in ApiKind::iter() {
            assert_eq!(ApiKind::from_repr(kind as u8), Some(kind));
            assert_eq!(ApiKind::from_str(&kind.to_string()).unwrap(), kind);
        }

        assert!(ApiKind::Struct.is_type());
        assert!(ApiKind::EventAdder.is_accessor());
        assert!(ApiKind::Field.is_member());
        assert!(!ApiKind::Namespace.is_member());
    }
}
