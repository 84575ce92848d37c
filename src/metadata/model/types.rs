use std::ops::Range;

use crate::{
    metadata::{
        model::{GenericParameter, TypeDefinition, TypeReference},
        signatures::{MethodSignature, PrimitiveTypeCode},
    },
    Result,
};

/// Longest chain of containing types followed when partitioning instance arguments.
const MAX_NESTING: usize = 64;

/// A type declared in, or referenced by name from, a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedType<'a> {
    /// A `TypeDef` row
    Definition(TypeDefinition<'a>),
    /// A `TypeRef` row
    Reference(TypeReference<'a>),
}

impl<'a> NamedType<'a> {
    /// The simple name, including any arity suffix.
    ///
    /// # Errors
    /// Fails if the row or its name can't be read.
    pub fn name(&self) -> Result<&'a str> {
        match self {
            NamedType::Definition(definition) => definition.name(),
            NamedType::Reference(reference) => reference.name(),
        }
    }

    /// The namespace as stored in metadata; nested types usually have none.
    ///
    /// # Errors
    /// Fails if the row or its namespace can't be read.
    pub fn namespace(&self) -> Result<&'a str> {
        match self {
            NamedType::Definition(definition) => definition.namespace(),
            NamedType::Reference(reference) => reference.namespace(),
        }
    }

    /// The type this one is nested in.
    ///
    /// # Errors
    /// Fails if the nesting information can't be read.
    pub fn containing_type(&self) -> Result<Option<NamedType<'a>>> {
        match self {
            NamedType::Definition(definition) => {
                Ok(definition.containing_type().map(NamedType::Definition))
            }
            NamedType::Reference(reference) => {
                Ok(reference.containing_type()?.map(NamedType::Reference))
            }
        }
    }

    /// Number of generic parameters the type introduces itself, taken from the
    /// `` `n `` suffix of its name.
    ///
    /// # Errors
    /// Fails if the name can't be read.
    pub fn own_arity(&self) -> Result<usize> {
        Ok(arity_of(self.name()?))
    }

    /// Returns `true` if this is `namespace.name` at the top level.
    ///
    /// # Errors
    /// Fails if the name can't be read.
    pub fn is(&self, namespace: &str, name: &str) -> Result<bool> {
        Ok(self.name()? == name
            && self.namespace()? == namespace
            && self.containing_type()?.is_none())
    }

    /// Returns `true` for definitions, which belong to the module being read.
    #[must_use]
    pub fn is_definition(&self) -> bool {
        matches!(self, NamedType::Definition(_))
    }
}

/// The arity encoded as a `` `n `` suffix of a type name, 0 without one.
#[must_use]
pub fn arity_of(name: &str) -> usize {
    match name.rfind('`') {
        Some(tick) => name[tick + 1..].parse().unwrap_or(0),
        None => 0,
    }
}

/// The part of a [`TypeInstance`] belonging to one type of its nesting chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSegment<'a> {
    /// The generic type at this nesting level
    pub named: NamedType<'a>,
    /// Range of the instance arguments bound to this level's own parameters
    pub arguments: Range<usize>,
}

/// A generic type bound to type arguments.
///
/// Metadata stores the arguments of a nested generic type as one flattened list: the
/// arguments of the outermost containing type come first and the innermost type's own
/// arguments last. [`TypeInstance::new`] partitions that list back over the nesting chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInstance<'a> {
    generic: NamedType<'a>,
    arguments: Vec<MetadataType<'a>>,
    segments: Vec<InstanceSegment<'a>>,
}

impl<'a> TypeInstance<'a> {
    /// Bind `arguments` to `generic` and its containing types.
    ///
    /// Arities are accumulated walking outward from `generic`. Argument lists that are too
    /// short for the chain are tolerated: the outer levels simply receive fewer arguments.
    /// Surplus arguments are attributed to the outermost level.
    #[must_use]
    pub fn new(generic: NamedType<'a>, arguments: Vec<MetadataType<'a>>) -> TypeInstance<'a> {
        let mut segments = Vec::new();
        let mut end = arguments.len();
        let mut current = Some(generic);

        while let Some(named) = current {
            if segments.len() >= MAX_NESTING {
                break;
            }

            let arity = named.own_arity().unwrap_or(0);
            let start = end.saturating_sub(arity);
            segments.push(InstanceSegment {
                named,
                arguments: start..end,
            });
            end = start;
            current = named.containing_type().ok().flatten();
        }

        if let Some(outermost) = segments.last_mut() {
            outermost.arguments.start = 0;
        }
        segments.reverse();

        TypeInstance {
            generic,
            arguments,
            segments,
        }
    }

    /// The instantiated generic type.
    #[must_use]
    pub fn generic(&self) -> NamedType<'a> {
        self.generic
    }

    /// All arguments, outermost containing type first.
    #[must_use]
    pub fn arguments(&self) -> &[MetadataType<'a>] {
        &self.arguments
    }

    /// The nesting chain with each level's arguments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[InstanceSegment<'a>] {
        &self.segments
    }

    /// The arguments of `segment`.
    #[must_use]
    pub fn segment_arguments(&self, segment: &InstanceSegment<'a>) -> &[MetadataType<'a>] {
        self.arguments
            .get(segment.arguments.clone())
            .unwrap_or_default()
    }

    /// The arguments bound to the generic type's own parameters.
    #[must_use]
    pub fn own_arguments(&self) -> &[MetadataType<'a>] {
        match self.segments.last() {
            Some(segment) => self.segment_arguments(segment),
            None => &[],
        }
    }
}

/// A type expression as it appears in signatures.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataType<'a> {
    /// A built-in type
    Primitive(PrimitiveTypeCode),
    /// A named type, with the value type flag of the signature that produced it
    Named {
        /// The type
        named: NamedType<'a>,
        /// Encoded as `VALUETYPE` rather than `CLASS`
        value_type: bool,
    },
    /// A generic instantiation
    Instance(Box<TypeInstance<'a>>),
    /// An array; rank 0 is a single dimensional zero based array
    Array {
        /// The element type
        element: Box<MetadataType<'a>>,
        /// Number of dimensions, 0 for SZ arrays
        rank: u32,
        /// Known sizes, for a prefix of the dimensions
        sizes: Vec<u32>,
        /// Known lower bounds, for a prefix of the dimensions
        lower_bounds: Vec<i32>,
    },
    /// A managed reference
    ByRef(Box<MetadataType<'a>>),
    /// An unmanaged pointer
    Pointer(Box<MetadataType<'a>>),
    /// A pinned local
    Pinned(Box<MetadataType<'a>>),
    /// A function pointer
    FunctionPointer(Box<MethodSignature<MetadataType<'a>>>),
    /// A type with a custom modifier
    Modified {
        /// The modifier type
        modifier: Box<MetadataType<'a>>,
        /// The modified type
        unmodified: Box<MetadataType<'a>>,
        /// `modreq` rather than `modopt`
        required: bool,
    },
    /// A reference to a generic parameter
    GenericParameter {
        /// Position within the owner's parameter list
        index: u32,
        /// A method parameter (`!!n`) rather than a type parameter (`!n`)
        is_method: bool,
        /// The parameter declaration, if the decoding context knew it
        definition: Option<GenericParameter<'a>>,
    },
}

impl<'a> MetadataType<'a> {
    /// Convenience constructor for a named class type.
    #[must_use]
    pub fn class(named: NamedType<'a>) -> MetadataType<'a> {
        MetadataType::Named {
            named,
            value_type: false,
        }
    }

    /// The named type at the core of this expression, looking through arrays, pointers,
    /// references and modifiers.
    #[must_use]
    pub fn element_named_type(&self) -> Option<NamedType<'a>> {
        match self {
            MetadataType::Named { named, .. } => Some(*named),
            MetadataType::Instance(instance) => Some(instance.generic()),
            MetadataType::Array { element, .. }
            | MetadataType::ByRef(element)
            | MetadataType::Pointer(element)
            | MetadataType::Pinned(element) => element.element_named_type(),
            MetadataType::Modified { unmodified, .. } => unmodified.element_named_type(),
            MetadataType::Primitive(_)
            | MetadataType::FunctionPointer(_)
            | MetadataType::GenericParameter { .. } => None,
        }
    }
}

/// Types substituted for generic parameter references while decoding signatures.
///
/// Indexes without an entry decode to an unresolved [`MetadataType::GenericParameter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericContext<'a> {
    /// Substitutes for `!n`
    pub type_arguments: Vec<MetadataType<'a>>,
    /// Substitutes for `!!n`
    pub method_arguments: Vec<MetadataType<'a>>,
}

impl<'a> GenericContext<'a> {
    /// A context resolving nothing.
    #[must_use]
    pub fn empty() -> GenericContext<'a> {
        GenericContext::default()
    }

    /// The substitute for type parameter `index`.
    #[must_use]
    pub fn type_parameter(&self, index: u32) -> MetadataType<'a> {
        match self.type_arguments.get(index as usize) {
            Some(argument) => argument.clone(),
            None => MetadataType::GenericParameter {
                index,
                is_method: false,
                definition: None,
            },
        }
    }

    /// The substitute for method parameter `index`.
    #[must_use]
    pub fn method_parameter(&self, index: u32) -> MetadataType<'a> {
        match self.method_arguments.get(index as usize) {
            Some(argument) => argument.clone(),
            None => MetadataType::GenericParameter {
                index,
                is_method: true,
                definition: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_suffix() {
        assert_eq!(arity_of("List`1"), 1);
        assert_eq!(arity_of("Dictionary`2"), 2);
        assert_eq!(arity_of("String"), 0);
        assert_eq!(arity_of("Odd`"), 0);
        assert_eq!(arity_of("Odd`x"), 0);
    }

    #[test]
    fn unresolved_context() {
        let context = GenericContext {
            type_arguments: vec![MetadataType::Primitive(PrimitiveTypeCode::Int32)],
            method_arguments: Vec::new(),
        };

        assert_eq!(
            context.type_parameter(0),
            MetadataType::Primitive(PrimitiveTypeCode::Int32)
        );
        assert_eq!(
            context.type_parameter(1),
            MetadataType::GenericParameter {
                index: 1,
                is_method: false,
                definition: None
            }
        );
        assert_eq!(
            context.method_parameter(0),
            MetadataType::GenericParameter {
                index: 0,
                is_method: true,
                definition: None
            }
        );
    }
}
